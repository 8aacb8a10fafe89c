use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::numbering::ReferenceSequence;
use super::types::*;
use crate::core::{Currency, FiscalError};

/// Amount withheld for one rate of a document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WithheldAmount<'a> {
    pub tax: &'a WithholdingTax,
    /// Invoice totals the rate applies to, stamp excluded.
    pub base: Decimal,
    pub amount: Decimal,
}

/// A withholding document: the invoices of one partner, the rates withheld
/// on them and, once validated, the ledger entry recording the withholding.
///
/// Everything except the reference and the kind can be edited while the
/// document is a draft; [`validate`](Self::validate) freezes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WithholdingDocument {
    name: String,
    kind: WithholdingKind,
    state: WithholdingState,
    date: NaiveDate,
    journal: JournalRef,
    partner: Partner,
    currency: Currency,
    stamp: Decimal,
    invoices: Vec<WithheldInvoice>,
    taxes: Vec<WithholdingTax>,
    amount: Decimal,
    entry: Option<JournalEntry>,
}

impl WithholdingDocument {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> WithholdingKind {
        self.kind
    }

    pub fn state(&self) -> WithholdingState {
        self.state
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn journal(&self) -> &JournalRef {
        &self.journal
    }

    pub fn partner(&self) -> &Partner {
        &self.partner
    }

    pub fn currency(&self) -> &Currency {
        &self.currency
    }

    /// Fiscal stamp amount carried by each invoice.
    pub fn stamp(&self) -> Decimal {
        self.stamp
    }

    pub fn invoices(&self) -> &[WithheldInvoice] {
        &self.invoices
    }

    pub fn taxes(&self) -> &[WithholdingTax] {
        &self.taxes
    }

    /// Total withheld, the sum of the per-rate amounts.
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Ledger entry of a validated document.
    pub fn entry(&self) -> Option<&JournalEntry> {
        self.entry.as_ref()
    }

    /// Sum of the invoice totals, stamp included.
    pub fn gross_total(&self) -> Decimal {
        self.invoices.iter().map(|i| i.amount_total).sum()
    }

    /// Base of every rate: `Σ |amount_total_signed ∓ stamp|`.
    ///
    /// The stamp is not subject to withholding. Vendor bills carry a
    /// negative signed total, so the stamp is added back for suppliers and
    /// subtracted for customers.
    pub fn withholding_base(&self) -> Decimal {
        self.invoices
            .iter()
            .map(|inv| match self.kind {
                WithholdingKind::Supplier => (inv.amount_total_signed + self.stamp).abs(),
                WithholdingKind::Customer => (inv.amount_total_signed - self.stamp).abs(),
            })
            .sum()
    }

    /// Amount withheld per rate, each rounded to the document currency.
    pub fn tax_amounts(&self) -> Result<Vec<WithheldAmount<'_>>, FiscalError> {
        let base = self.withholding_base();
        self.taxes
            .iter()
            .map(|tax| {
                let gross = base.checked_mul(tax.rate).ok_or_else(|| {
                    FiscalError::Arithmetic(format!("{base} is too large to withhold {}", tax.name))
                })?;
                Ok(WithheldAmount {
                    tax,
                    base,
                    amount: self.currency.round(gross / Decimal::ONE_HUNDRED)?,
                })
            })
            .collect()
    }

    fn recompute(&mut self) -> Result<(), FiscalError> {
        self.amount = self.tax_amounts()?.iter().map(|t| t.amount).sum();
        Ok(())
    }

    fn ensure_draft(&self, action: &str) -> Result<(), FiscalError> {
        match self.state {
            WithholdingState::Draft => Ok(()),
            WithholdingState::Done => Err(FiscalError::InvalidState(format!(
                "cannot {action}: withholding {} is validated",
                self.name
            ))),
        }
    }

    /// Switch to another partner; the invoices of the previous one are dropped.
    pub fn change_partner(&mut self, partner: Partner) -> Result<(), FiscalError> {
        self.ensure_draft("change the partner")?;
        self.partner = partner;
        self.invoices.clear();
        self.recompute()?;
        Ok(())
    }

    pub fn add_invoice(&mut self, invoice: WithheldInvoice) -> Result<(), FiscalError> {
        self.ensure_draft("add an invoice")?;
        if invoice.partner_id != self.partner.id {
            return Err(FiscalError::Validation(format!(
                "invoice {} belongs to another partner than {}",
                invoice.name, self.partner.name
            )));
        }
        if self.invoices.iter().any(|i| i.id == invoice.id) {
            return Err(FiscalError::Validation(format!(
                "invoice {} is already withheld on {}",
                invoice.name, self.name
            )));
        }
        self.invoices.push(invoice);
        self.recompute()?;
        Ok(())
    }

    /// Detach an invoice. Returns whether it was attached.
    pub fn remove_invoice(&mut self, invoice_id: u32) -> Result<bool, FiscalError> {
        self.ensure_draft("remove an invoice")?;
        let before = self.invoices.len();
        self.invoices.retain(|i| i.id != invoice_id);
        self.recompute()?;
        Ok(self.invoices.len() != before)
    }

    pub fn set_taxes(&mut self, taxes: Vec<WithholdingTax>) -> Result<(), FiscalError> {
        self.ensure_draft("change the rates")?;
        self.taxes = taxes;
        self.recompute()?;
        Ok(())
    }

    pub fn set_stamp(&mut self, stamp: Decimal) -> Result<(), FiscalError> {
        self.ensure_draft("change the stamp")?;
        self.stamp = stamp;
        self.recompute()?;
        Ok(())
    }

    pub fn set_date(&mut self, date: NaiveDate) -> Result<(), FiscalError> {
        self.ensure_draft("change the date")?;
        self.date = date;
        Ok(())
    }

    /// Record the withholding in the ledger and freeze the document.
    ///
    /// The entry moves the total between the partner's payable (supplier,
    /// debit) or receivable (customer, credit) account and the accounts of
    /// the rates, one line per rate on the opposite side. When the first
    /// invoice is posted, the partner line is partially reconciled with it.
    pub fn validate(&mut self) -> Result<&JournalEntry, FiscalError> {
        self.ensure_draft("validate")?;
        if self.taxes.is_empty() {
            return Err(FiscalError::Validation(format!(
                "withholding {} has no withholding rate",
                self.name
            )));
        }
        if self.invoices.is_empty() {
            return Err(FiscalError::Validation(format!(
                "withholding {} has no invoice",
                self.name
            )));
        }
        if self.amount <= Decimal::ZERO {
            return Err(FiscalError::Validation(format!(
                "withholding {} has nothing to withhold",
                self.name
            )));
        }

        let partner_id = self.partner.id;
        let total = self.amount;
        let line = |account, debit, credit| JournalLine {
            name: self.name.clone(),
            account,
            partner_id,
            debit,
            credit,
        };

        let mut lines = Vec::with_capacity(self.taxes.len() + 1);
        match self.kind {
            WithholdingKind::Supplier => {
                lines.push(line(self.partner.payable_account.clone(), total, Decimal::ZERO));
                for t in self.tax_amounts()? {
                    lines.push(line(t.tax.account.clone(), Decimal::ZERO, t.amount));
                }
            }
            WithholdingKind::Customer => {
                lines.push(line(self.partner.receivable_account.clone(), Decimal::ZERO, total));
                for t in self.tax_amounts()? {
                    lines.push(line(t.tax.account.clone(), t.amount, Decimal::ZERO));
                }
            }
        }

        let reconcile = self
            .invoices
            .first()
            .and_then(|inv| inv.counterpart_line_id)
            .map(|invoice_line| {
                let (debit_line, credit_line) = match self.kind {
                    WithholdingKind::Supplier => {
                        (LedgerLineRef::Entry(0), LedgerLineRef::Host(invoice_line))
                    }
                    WithholdingKind::Customer => {
                        (LedgerLineRef::Host(invoice_line), LedgerLineRef::Entry(0))
                    }
                };
                PartialReconcile {
                    debit_line,
                    credit_line,
                    amount: total,
                    currency: self.currency.code.clone(),
                }
            });

        let entry = JournalEntry {
            reference: self.name.clone(),
            journal: self.journal.clone(),
            date: self.date,
            partner_id,
            lines,
            reconcile,
        };

        self.state = WithholdingState::Done;
        info!(
            reference = %self.name,
            amount = %total,
            lines = entry.lines.len(),
            "withholding validated"
        );
        Ok(&*self.entry.insert(entry))
    }

    /// Reopen a validated document.
    ///
    /// Returns the detached entry; the host unreconciles, cancels and
    /// deletes it.
    pub fn reset_to_draft(&mut self) -> Result<JournalEntry, FiscalError> {
        if self.state != WithholdingState::Done {
            return Err(FiscalError::InvalidState(format!(
                "withholding {} is not validated",
                self.name
            )));
        }
        let entry = self.entry.take().ok_or_else(|| {
            FiscalError::InvalidState(format!("withholding {} has no ledger entry", self.name))
        })?;
        self.state = WithholdingState::Draft;
        info!(reference = %self.name, "withholding reset to draft");
        Ok(entry)
    }

    /// Only drafts may be deleted.
    pub fn ensure_deletable(&self) -> Result<(), FiscalError> {
        match self.state {
            WithholdingState::Draft => Ok(()),
            WithholdingState::Done => Err(FiscalError::InvalidState(format!(
                "cannot delete validated withholding {}",
                self.name
            ))),
        }
    }
}

/// Builder for [`WithholdingDocument`].
///
/// # Example
///
/// ```
/// use chrono::NaiveDate;
/// use fiscal_tn::core::AccountRef;
/// use fiscal_tn::withholding::*;
/// use rust_decimal_macros::dec;
///
/// let partner = Partner {
///     id: 7,
///     name: "Sotupa SARL".into(),
///     vat: Some("1234567A/P/M/000".into()),
///     receivable_account: AccountRef::new(411, "411000"),
///     payable_account: AccountRef::new(401, "401000"),
/// };
/// let mut sequence = ReferenceSequence::new("RS", 2024);
/// let doc = WithholdingBuilder::new(
///     WithholdingKind::Supplier,
///     partner,
///     JournalRef::new(1, "OD"),
///     NaiveDate::from_ymd_opt(2024, 3, 15).unwrap(),
/// )
/// .stamp(dec!(1))
/// .tax(WithholdingTax::new(1, "RS 1.5%", dec!(1.5), AccountRef::new(4353, "4353")))
/// .invoice(WithheldInvoice {
///     id: 31,
///     name: "FACT/2024/0031".into(),
///     partner_id: 7,
///     amount_total: dec!(1001),
///     amount_total_signed: dec!(-1001),
///     counterpart_line_id: None,
/// })
/// .build(&mut sequence)
/// .unwrap();
///
/// assert_eq!(doc.name(), "RS2024-001");
/// assert_eq!(doc.amount(), dec!(15));
/// ```
pub struct WithholdingBuilder {
    kind: WithholdingKind,
    partner: Partner,
    journal: JournalRef,
    date: NaiveDate,
    currency: Currency,
    stamp: Decimal,
    invoices: Vec<WithheldInvoice>,
    taxes: Vec<WithholdingTax>,
}

impl WithholdingBuilder {
    pub fn new(kind: WithholdingKind, partner: Partner, journal: JournalRef, date: NaiveDate) -> Self {
        Self {
            kind,
            partner,
            journal,
            date,
            currency: Currency::tnd(),
            stamp: Decimal::ZERO,
            invoices: Vec::new(),
            taxes: Vec::new(),
        }
    }

    /// Company currency (default: TND).
    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    /// Fiscal stamp included in each invoice total.
    pub fn stamp(mut self, stamp: Decimal) -> Self {
        self.stamp = stamp;
        self
    }

    pub fn invoice(mut self, invoice: WithheldInvoice) -> Self {
        self.invoices.push(invoice);
        self
    }

    pub fn tax(mut self, tax: WithholdingTax) -> Self {
        self.taxes.push(tax);
        self
    }

    /// Take a reference from `sequence` and build a draft.
    pub fn build(self, sequence: &mut ReferenceSequence) -> Result<WithholdingDocument, FiscalError> {
        if let Some(inv) = self.invoices.iter().find(|i| i.partner_id != self.partner.id) {
            return Err(FiscalError::Validation(format!(
                "invoice {} belongs to another partner than {}",
                inv.name, self.partner.name
            )));
        }

        let name = sequence.reference_for(self.date)?;
        let mut doc = WithholdingDocument {
            name,
            kind: self.kind,
            state: WithholdingState::Draft,
            date: self.date,
            journal: self.journal,
            partner: self.partner,
            currency: self.currency,
            stamp: self.stamp,
            invoices: self.invoices,
            taxes: self.taxes,
            amount: Decimal::ZERO,
            entry: None,
        };
        doc.recompute()?;
        Ok(doc)
    }
}
