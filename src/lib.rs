//! # fiscal-tn
//!
//! Tunisian fiscal extensions for an ERP ledger: the tax stack calculator,
//! the fiscal stamp ("timbre fiscal") and withholding tax ("retenue à la
//! source") documents.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//! Entities owned by the host ledger (partners, accounts, journals,
//! invoices) are passed in as plain data records; nothing is persisted here.
//!
//! ## Quick Start
//!
//! ```rust
//! use fiscal_tn::core::*;
//! use rust_decimal_macros::dec;
//!
//! let fodec = TaxDefinitionBuilder::percent(1, "FODEC 1%", dec!(1))
//!     .include_base_amount()
//!     .sequence(1)
//!     .build();
//! let vat = TaxDefinitionBuilder::percent(2, "TVA 19%", dec!(19))
//!     .sequence(2)
//!     .build();
//!
//! let request = TaxComputation::new(dec!(250), &TaxSettings::default()).quantity(dec!(4));
//! let result = compute_all(&[fodec, vat], &request).unwrap();
//!
//! assert_eq!(result.total_excluded, dec!(1000));
//! assert_eq!(result.amount_for(1), dec!(10));
//! assert_eq!(result.amount_for(2), dec!(191.9));
//! assert_eq!(result.total_included, dec!(1201.9));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Tax model, configuration validation, tax stack calculator |
//! | `stamp` | Fiscal stamp settings and stamp-line injection |
//! | `withholding` | Withholding documents, ledger entries, certificate data |
//! | `all` | Everything |
//!
//! ## Logging
//!
//! The crate emits [`tracing`] events and never installs a subscriber.

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "stamp")]
pub mod stamp;

#[cfg(feature = "withholding")]
pub mod withholding;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
