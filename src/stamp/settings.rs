use serde::{Deserialize, Serialize};

/// Company switches of the fiscal stamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampSettings {
    /// The company charges the stamp at all.
    #[serde(default = "default_use_stamp")]
    pub use_stamp: bool,
    /// Applying the stamp requires a product line to attach it to; without
    /// this switch an empty invoice is stamped later, once it has lines.
    #[serde(default)]
    pub auto_compute: bool,
}

fn default_use_stamp() -> bool {
    true
}

impl Default for StampSettings {
    fn default() -> Self {
        Self {
            use_stamp: true,
            auto_compute: false,
        }
    }
}

/// Builder for [`StampSettings`].
///
/// ```
/// use fiscal_tn::stamp::StampSettingsBuilder;
///
/// let settings = StampSettingsBuilder::new().auto_compute(true).build();
/// assert!(settings.use_stamp);
/// assert!(settings.auto_compute);
/// ```
#[derive(Debug, Default)]
pub struct StampSettingsBuilder {
    settings: StampSettings,
}

impl StampSettingsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn use_stamp(mut self, enabled: bool) -> Self {
        self.settings.use_stamp = enabled;
        self
    }

    pub fn auto_compute(mut self, enabled: bool) -> Self {
        self.settings.auto_compute = enabled;
        self
    }

    pub fn build(self) -> StampSettings {
        self.settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stamp_enabled_by_default() {
        let settings = StampSettings::default();
        assert!(settings.use_stamp);
        assert!(!settings.auto_compute);
    }

    #[test]
    fn builder_disables_stamp() {
        let settings = StampSettingsBuilder::new().use_stamp(false).build();
        assert!(!settings.use_stamp);
    }
}
