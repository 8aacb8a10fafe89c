use std::collections::BTreeSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a tax turns its base into an amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AmountType {
    /// `amount` percent of the base.
    Percent,
    /// `amount` per unit, independent of the base.
    Fixed,
    /// Percent of the price *including* the tax (`base / (1 - amount/100) - base`).
    Division,
    /// Computed by a registered [`CodeRule`](super::CodeRule).
    CodeComputed,
    /// Container for child taxes, replaced by its children before computation.
    Group,
}

/// When the tax becomes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Exigibility {
    /// Due when the invoice is posted.
    #[default]
    OnInvoice,
    /// Due when the invoice is paid (cash basis).
    OnPayment,
}

/// Side of the business a tax is used on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TaxScope {
    /// Customer invoices ("Vente").
    Sale,
    /// Vendor bills ("Achat").
    Purchase,
    /// Usable anywhere, typically as a group child.
    #[default]
    None,
}

/// Whether a repartition line splits the base or the tax amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RepartitionKind {
    /// Carries the base tags; never produces an amount.
    Base,
    /// Receives `factor` of the tax amount.
    Tax,
}

/// Ledger account reference owned by the host.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountRef {
    pub id: u32,
    /// Chart-of-accounts code, e.g. "4366".
    pub code: String,
}

impl AccountRef {
    pub fn new(id: u32, code: impl Into<String>) -> Self {
        Self {
            id,
            code: code.into(),
        }
    }
}

/// One fractional split of a tax amount towards a ledger account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepartitionLine {
    pub id: u32,
    /// Share of the tax amount, 1 = 100 %.
    pub factor: Decimal,
    pub kind: RepartitionKind,
    /// Target account; `None` makes the amount count towards `total_void`.
    pub account: Option<AccountRef>,
    /// Tax report tags applied to the generated journal item.
    #[serde(default)]
    pub tag_ids: BTreeSet<u32>,
    #[serde(default = "default_true")]
    pub use_in_tax_closing: bool,
}

impl RepartitionLine {
    /// Base line without tags.
    pub fn base(id: u32) -> Self {
        Self {
            id,
            factor: Decimal::ONE,
            kind: RepartitionKind::Base,
            account: None,
            tag_ids: BTreeSet::new(),
            use_in_tax_closing: false,
        }
    }

    /// Tax line sending `factor` of the amount to `account`.
    pub fn tax(id: u32, factor: Decimal, account: Option<AccountRef>) -> Self {
        Self {
            id,
            factor,
            kind: RepartitionKind::Tax,
            account,
            tag_ids: BTreeSet::new(),
            use_in_tax_closing: true,
        }
    }

    /// Add report tags.
    pub fn with_tags(mut self, tags: impl IntoIterator<Item = u32>) -> Self {
        self.tag_ids.extend(tags);
        self
    }
}

fn default_true() -> bool {
    true
}

/// A tax as configured in the host, in the order it is applied to a line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxDefinition {
    pub id: u32,
    pub name: String,
    /// Ordering key; ties keep the original order.
    pub sequence: i32,
    pub amount_type: AmountType,
    /// Percentage for percent/division taxes, per-unit value for fixed taxes.
    pub amount: Decimal,
    /// The amount is already embedded in the unit price.
    #[serde(default)]
    pub price_include: bool,
    /// The amount enlarges the base of the following taxes.
    #[serde(default)]
    pub include_base_amount: bool,
    /// The base is enlarged by preceding `include_base_amount` taxes.
    #[serde(default = "default_true")]
    pub is_base_affected: bool,
    pub invoice_repartition: Vec<RepartitionLine>,
    pub refund_repartition: Vec<RepartitionLine>,
    #[serde(default)]
    pub exigibility: Exigibility,
    /// Account used by on-payment taxes until the payment is registered.
    #[serde(default)]
    pub cash_basis_transition_account: Option<AccountRef>,
    /// Children of a [`AmountType::Group`] tax.
    #[serde(default)]
    pub children: Vec<TaxDefinition>,
    /// Registry key of the rule computing a [`AmountType::CodeComputed`] tax.
    #[serde(default)]
    pub code_rule: Option<String>,
    /// Always computed on a quantity of one (fiscal stamp).
    #[serde(default)]
    pub is_fixed_quantity_override: bool,
    #[serde(default)]
    pub scope: TaxScope,
    #[serde(default)]
    pub analytic: bool,
}

impl TaxDefinition {
    /// Repartition lines for the document direction.
    pub fn repartition(&self, is_refund: bool) -> &[RepartitionLine] {
        if is_refund {
            &self.refund_repartition
        } else {
            &self.invoice_repartition
        }
    }

    /// Tax-kind repartition lines for the document direction.
    pub fn tax_repartition(&self, is_refund: bool) -> impl Iterator<Item = &RepartitionLine> {
        self.repartition(is_refund)
            .iter()
            .filter(|l| l.kind == RepartitionKind::Tax)
    }

    /// Sum of the tax-kind factors, the multiplier applied to the raw amount.
    pub fn repartition_factor(&self, is_refund: bool) -> Decimal {
        self.tax_repartition(is_refund).map(|l| l.factor).sum()
    }

    /// Tags of the base-kind repartition lines.
    pub fn base_tags(&self, is_refund: bool) -> impl Iterator<Item = u32> + '_ {
        self.repartition(is_refund)
            .iter()
            .filter(|l| l.kind == RepartitionKind::Base)
            .flat_map(|l| l.tag_ids.iter().copied())
    }

    /// Quantity the tax is computed on.
    pub fn effective_quantity(&self, quantity: Decimal) -> Decimal {
        if self.is_fixed_quantity_override {
            Decimal::ONE
        } else {
            quantity
        }
    }
}

/// Group a flattened tax came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxGroupRef {
    pub id: u32,
    pub name: String,
}

/// Product being invoiced; its tags are copied onto every tax line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: u32,
    #[serde(default)]
    pub tag_ids: BTreeSet<u32>,
}

/// Invoiced partner, passed through to code rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartnerRef {
    pub id: u32,
    pub name: String,
    pub vat: Option<String>,
}

/// One journal-item candidate: a repartition line of one tax.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxLine {
    pub tax_id: u32,
    pub name: String,
    /// Signed amount of this repartition line.
    pub amount: Decimal,
    /// Signed base the tax was computed on.
    pub base: Decimal,
    pub sequence: i32,
    pub account: Option<AccountRef>,
    pub analytic: bool,
    pub use_in_tax_closing: bool,
    pub price_include: bool,
    pub exigibility: Exigibility,
    pub repartition_line_id: u32,
    pub group: Option<TaxGroupRef>,
    pub tag_ids: BTreeSet<u32>,
    /// Following taxes whose base includes this tax.
    pub tax_ids: Vec<u32>,
}

/// Output of one [`compute_all`](super::compute_all) call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComputationResult {
    /// Price without any tax.
    pub total_excluded: Decimal,
    /// Price with every tax.
    pub total_included: Decimal,
    /// Total excluded plus the amounts of repartition lines without an account.
    pub total_void: Decimal,
    /// Tags for the base journal item.
    pub base_tag_ids: BTreeSet<u32>,
    pub tax_lines: Vec<TaxLine>,
}

impl ComputationResult {
    /// Sum of all tax line amounts.
    pub fn tax_total(&self) -> Decimal {
        self.tax_lines.iter().map(|l| l.amount).sum()
    }

    /// Lines produced by one tax.
    pub fn lines_for(&self, tax_id: u32) -> impl Iterator<Item = &TaxLine> {
        self.tax_lines.iter().filter(move |l| l.tax_id == tax_id)
    }

    /// Sum of the lines produced by one tax.
    pub fn amount_for(&self, tax_id: u32) -> Decimal {
        self.lines_for(tax_id).map(|l| l.amount).sum()
    }
}
