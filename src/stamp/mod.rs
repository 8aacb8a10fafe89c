//! Fiscal stamp ("timbre fiscal").
//!
//! Tunisian invoices carry a fixed stamp duty, charged once per invoice
//! whatever the quantities. The stamp is an ordinary fixed tax flagged with
//! [`is_fixed_quantity_override`](crate::core::TaxDefinition::is_fixed_quantity_override);
//! this module decides where it goes: the stamp tax of the invoice's side
//! (sale or purchase) is attached to the first product line, once.
//!
//! # Example
//!
//! ```
//! use fiscal_tn::core::*;
//! use fiscal_tn::stamp::*;
//! use rust_decimal_macros::dec;
//!
//! let catalog = vec![
//!     TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19)).build(),
//!     TaxDefinitionBuilder::stamp(2, "Timbre Fiscal Vente", dec!(1), TaxScope::Sale).build(),
//!     TaxDefinitionBuilder::stamp(3, "Timbre Fiscal Achat", dec!(1), TaxScope::Purchase).build(),
//! ];
//! let stamps = StampTaxes::from_catalog(&catalog);
//!
//! let mut invoice = StampableInvoice::new(MoveType::OutInvoice)
//!     .with_line(InvoiceLine::product(10, [1]));
//! toggle_stamp(&mut invoice, &StampSettings::default(), &stamps, true).unwrap();
//!
//! assert!(has_stamp_line(&invoice, &stamps));
//! assert_eq!(invoice.lines[0].tax_ids, [1, 2]);
//! ```

mod invoice;
mod settings;
mod taxes;

pub use invoice::{
    InvoiceLine, LineKind, StampableInvoice, add_stamp_line, has_stamp_line, remove_stamp_line,
    toggle_stamp,
};
pub use settings::{StampSettings, StampSettingsBuilder};
pub use taxes::{MoveType, StampTaxes, stamp_amount};
