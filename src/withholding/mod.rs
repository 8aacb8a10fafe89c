//! Withholding tax ("retenue à la source").
//!
//! A payer deducts a percentage of the invoices it settles and remits it to
//! the tax authority. A [`WithholdingDocument`] groups the invoices of one
//! partner with the rates withheld on them; validating it produces the
//! [`JournalEntry`] the host posts, and [`WithholdingCertificate`] gathers
//! the data of the certificate handed to the beneficiary.
//!
//! The fiscal stamp included in each invoice total is not subject to
//! withholding. Pass its amount with [`WithholdingBuilder::stamp`]; with the
//! `stamp` feature, `fiscal_tn::stamp::stamp_amount` gives it.

mod certificate;
mod document;
mod numbering;
mod types;

pub use certificate::{CertificateParty, CertificateRow, MatriculeFiscal, WithholdingCertificate};
pub use document::{WithheldAmount, WithholdingBuilder, WithholdingDocument};
pub use numbering::ReferenceSequence;
pub use types::*;
