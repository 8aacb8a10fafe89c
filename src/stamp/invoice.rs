use serde::{Deserialize, Serialize};
use tracing::info;

use super::settings::StampSettings;
use super::taxes::{MoveType, StampTaxes};
use crate::core::FiscalError;

/// Display type of an invoice line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineKind {
    Product,
    Section,
    Note,
}

/// The part of a host invoice line the stamp cares about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLine {
    pub id: u32,
    pub kind: LineKind,
    pub tax_ids: Vec<u32>,
}

impl InvoiceLine {
    pub fn product(id: u32, tax_ids: impl IntoIterator<Item = u32>) -> Self {
        Self {
            id,
            kind: LineKind::Product,
            tax_ids: tax_ids.into_iter().collect(),
        }
    }

    pub fn section(id: u32) -> Self {
        Self {
            id,
            kind: LineKind::Section,
            tax_ids: Vec::new(),
        }
    }

    pub fn note(id: u32) -> Self {
        Self {
            id,
            kind: LineKind::Note,
            tax_ids: Vec::new(),
        }
    }
}

/// A host invoice seen through its stamp fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StampableInvoice {
    pub move_type: MoveType,
    /// The invoice is subject to the stamp.
    pub tax_stamp: bool,
    /// The stamp was set by hand rather than by the company default.
    pub manually_apply_stamp: bool,
    pub lines: Vec<InvoiceLine>,
}

impl StampableInvoice {
    pub fn new(move_type: MoveType) -> Self {
        Self {
            move_type,
            tax_stamp: false,
            manually_apply_stamp: false,
            lines: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: InvoiceLine) -> Self {
        self.lines.push(line);
        self
    }

    fn has_product_lines(&self) -> bool {
        self.lines.iter().any(|l| l.kind == LineKind::Product)
    }
}

/// Attach the stamp tax of the invoice's side to its first product line.
///
/// Does nothing if the line already carries it. Fails when the invoice is
/// not subject to the stamp, when no stamp tax matches its side, or when it
/// has no product line.
pub fn add_stamp_line(invoice: &mut StampableInvoice, stamps: &StampTaxes) -> Result<(), FiscalError> {
    if !invoice.tax_stamp {
        return Err(FiscalError::Stamp(
            "fiscal stamp is not applicable to this invoice".into(),
        ));
    }
    let stamp = stamps.for_move(invoice.move_type)?;

    let line = invoice
        .lines
        .iter_mut()
        .find(|l| l.kind == LineKind::Product)
        .ok_or_else(|| FiscalError::Stamp("invoice is empty".into()))?;

    if !line.tax_ids.contains(&stamp.id) {
        line.tax_ids.push(stamp.id);
        info!(line = line.id, tax = %stamp.name, "fiscal stamp added");
    }
    Ok(())
}

/// Whether any line carries the stamp tax of the invoice's side.
pub fn has_stamp_line(invoice: &StampableInvoice, stamps: &StampTaxes) -> bool {
    match stamps.for_move(invoice.move_type) {
        Ok(stamp) => invoice.lines.iter().any(|l| l.tax_ids.contains(&stamp.id)),
        Err(_) => false,
    }
}

/// Strip the stamp tax from every line. Returns the number of lines changed.
pub fn remove_stamp_line(invoice: &mut StampableInvoice, stamps: &StampTaxes) -> usize {
    let Ok(stamp) = stamps.for_move(invoice.move_type) else {
        return 0;
    };

    let mut changed = 0;
    for line in &mut invoice.lines {
        let before = line.tax_ids.len();
        line.tax_ids.retain(|id| *id != stamp.id);
        if line.tax_ids.len() != before {
            changed += 1;
        }
    }
    if changed > 0 {
        info!(lines = changed, tax = %stamp.name, "fiscal stamp removed");
    }
    changed
}

/// Apply or withdraw the stamp by hand.
///
/// With `auto_compute` the stamp line is required immediately, so applying
/// it to an invoice without product lines fails. Otherwise an empty invoice
/// is only marked, and [`add_stamp_line`] is expected once lines exist.
pub fn toggle_stamp(
    invoice: &mut StampableInvoice,
    settings: &StampSettings,
    stamps: &StampTaxes,
    apply: bool,
) -> Result<(), FiscalError> {
    if !settings.use_stamp {
        return Err(FiscalError::Stamp(
            "fiscal stamp is disabled for this company".into(),
        ));
    }

    invoice.manually_apply_stamp = true;
    invoice.tax_stamp = apply;

    if !apply {
        remove_stamp_line(invoice, stamps);
        return Ok(());
    }

    if settings.auto_compute || invoice.has_product_lines() {
        if let Err(err) = add_stamp_line(invoice, stamps) {
            invoice.tax_stamp = false;
            return Err(err);
        }
    }
    Ok(())
}
