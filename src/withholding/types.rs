use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::AccountRef;

/// A withholding rate ("retenue à la source") and its accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithholdingTax {
    pub id: u32,
    pub name: String,
    /// Rate in percent, e.g. 1.5.
    pub rate: Decimal,
    pub account: AccountRef,
    pub refund_account: AccountRef,
}

impl WithholdingTax {
    /// A rate posting invoices and refunds to the same account.
    pub fn new(id: u32, name: impl Into<String>, rate: Decimal, account: AccountRef) -> Self {
        Self {
            id,
            name: name.into(),
            rate,
            refund_account: account.clone(),
            account,
        }
    }

    pub fn with_refund_account(mut self, account: AccountRef) -> Self {
        self.refund_account = account;
        self
    }
}

/// Who withholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WithholdingKind {
    /// The customer withheld on our invoices ("retenue client").
    #[serde(rename = "out_withholding")]
    Customer,
    /// We withhold on a supplier's bills ("retenue fournisseur").
    #[serde(rename = "in_withholding")]
    Supplier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum WithholdingState {
    #[default]
    Draft,
    Done,
}

/// Host partner with its default receivable and payable accounts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Partner {
    pub id: u32,
    pub name: String,
    /// Matricule fiscal.
    pub vat: Option<String>,
    pub receivable_account: AccountRef,
    pub payable_account: AccountRef,
}

/// Host journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalRef {
    pub id: u32,
    pub code: String,
}

impl JournalRef {
    pub fn new(id: u32, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }
}

/// A posted invoice subject to withholding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WithheldInvoice {
    pub id: u32,
    pub name: String,
    pub partner_id: u32,
    /// Total in the invoice currency, always positive.
    pub amount_total: Decimal,
    /// Total in company currency, negative for vendor bills.
    pub amount_total_signed: Decimal,
    /// Receivable or payable journal item of the invoice, if posted.
    #[serde(default)]
    pub counterpart_line_id: Option<u32>,
}

/// One line of a generated journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub name: String,
    pub account: AccountRef,
    pub partner_id: u32,
    pub debit: Decimal,
    pub credit: Decimal,
}

/// A journal item, either in the generated entry or owned by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerLineRef {
    /// Index into [`JournalEntry::lines`].
    Entry(usize),
    /// Host journal item id.
    Host(u32),
}

/// Partial reconciliation of the withholding with the invoice it settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartialReconcile {
    pub debit_line: LedgerLineRef,
    pub credit_line: LedgerLineRef,
    pub amount: Decimal,
    pub currency: String,
}

/// Ledger entry produced by validating a withholding document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Reference of the withholding document.
    pub reference: String,
    pub journal: JournalRef,
    pub date: NaiveDate,
    pub partner_id: u32,
    pub lines: Vec<JournalLine>,
    pub reconcile: Option<PartialReconcile>,
}

impl JournalEntry {
    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    pub fn is_balanced(&self) -> bool {
        self.total_debit() == self.total_credit()
    }
}
