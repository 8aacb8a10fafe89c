use serde::{Deserialize, Serialize};

use super::currencies::Currency;

/// Company policy for rounding tax amounts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RoundingMethod {
    /// Round each tax amount on each line.
    #[default]
    PerLine,
    /// Keep five extra digits per line and round the totals only.
    Globally,
}

/// Company-level tax configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSettings {
    /// Company currency.
    pub currency: Currency,
    /// Tax rounding policy.
    #[serde(default)]
    pub rounding_method: RoundingMethod,
    /// Give price-included percent taxes of equal rate equal amounts by
    /// computing them during the reverse pass.
    #[serde(default)]
    pub split_included_percent_evenly: bool,
}

impl Default for TaxSettings {
    fn default() -> Self {
        Self {
            currency: Currency::tnd(),
            rounding_method: RoundingMethod::PerLine,
            split_included_percent_evenly: false,
        }
    }
}

/// Builder for [`TaxSettings`].
///
/// # Example
///
/// ```
/// use fiscal_tn::core::{Currency, RoundingMethod, TaxSettingsBuilder};
///
/// let settings = TaxSettingsBuilder::new(Currency::tnd())
///     .rounding_method(RoundingMethod::Globally)
///     .build();
/// assert_eq!(settings.currency.code, "TND");
/// ```
pub struct TaxSettingsBuilder {
    settings: TaxSettings,
}

impl TaxSettingsBuilder {
    /// Start from the defaults with the given company currency.
    pub fn new(currency: Currency) -> Self {
        Self {
            settings: TaxSettings {
                currency,
                ..Default::default()
            },
        }
    }

    /// Set the rounding policy.
    pub fn rounding_method(mut self, method: RoundingMethod) -> Self {
        self.settings.rounding_method = method;
        self
    }

    /// Enable the equal split of included percent taxes.
    pub fn split_included_percent_evenly(mut self, enabled: bool) -> Self {
        self.settings.split_included_percent_evenly = enabled;
        self
    }

    pub fn build(self) -> TaxSettings {
        self.settings
    }
}
