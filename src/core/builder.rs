use rust_decimal::Decimal;

use super::types::*;

/// Builder for [`TaxDefinition`].
///
/// New taxes get one base line and one 100 % tax line, both for invoices
/// and refunds, without any account. Repartition line ids are derived from
/// the tax id (`id * 100 + n`) unless [`repartition`](Self::repartition)
/// supplies explicit lines.
///
/// ```
/// use fiscal_tn::core::*;
/// use rust_decimal_macros::dec;
///
/// let vat = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19))
///     .account(AccountRef::new(4366, "4366"))
///     .scope(TaxScope::Sale)
///     .build();
/// assert_eq!(vat.repartition_factor(false), dec!(1));
/// ```
pub struct TaxDefinitionBuilder {
    tax: TaxDefinition,
}

impl TaxDefinitionBuilder {
    pub fn new(id: u32, name: impl Into<String>, amount_type: AmountType, amount: Decimal) -> Self {
        let (invoice_repartition, refund_repartition) = if amount_type == AmountType::Group {
            (Vec::new(), Vec::new())
        } else {
            let base = id * 100;
            (
                vec![
                    RepartitionLine::base(base),
                    RepartitionLine::tax(base + 1, Decimal::ONE, None),
                ],
                vec![
                    RepartitionLine::base(base + 2),
                    RepartitionLine::tax(base + 3, Decimal::ONE, None),
                ],
            )
        };

        Self {
            tax: TaxDefinition {
                id,
                name: name.into(),
                sequence: 1,
                amount_type,
                amount,
                price_include: false,
                include_base_amount: false,
                is_base_affected: true,
                invoice_repartition,
                refund_repartition,
                exigibility: Exigibility::OnInvoice,
                cash_basis_transition_account: None,
                children: Vec::new(),
                code_rule: None,
                is_fixed_quantity_override: false,
                scope: TaxScope::None,
                analytic: false,
            },
        }
    }

    /// `rate` percent of the base.
    pub fn percent(id: u32, name: impl Into<String>, rate: Decimal) -> Self {
        Self::new(id, name, AmountType::Percent, rate)
    }

    /// `amount` per unit.
    pub fn fixed(id: u32, name: impl Into<String>, amount: Decimal) -> Self {
        Self::new(id, name, AmountType::Fixed, amount)
    }

    /// `rate` percent of the tax-included price.
    pub fn division(id: u32, name: impl Into<String>, rate: Decimal) -> Self {
        Self::new(id, name, AmountType::Division, rate)
    }

    /// Amount computed by the rule registered under `rule`.
    pub fn code(id: u32, name: impl Into<String>, rule: impl Into<String>) -> Self {
        let mut builder = Self::new(id, name, AmountType::CodeComputed, Decimal::ZERO);
        builder.tax.code_rule = Some(rule.into());
        builder
    }

    /// Group of `children`, applied at the group's sequence.
    pub fn group(id: u32, name: impl Into<String>, children: Vec<TaxDefinition>) -> Self {
        let mut builder = Self::new(id, name, AmountType::Group, Decimal::ZERO);
        builder.tax.children = children;
        builder
    }

    /// Fiscal stamp: a fixed amount charged once per line whatever the quantity.
    pub fn stamp(id: u32, name: impl Into<String>, amount: Decimal, scope: TaxScope) -> Self {
        Self::fixed(id, name, amount)
            .fixed_quantity_override()
            .scope(scope)
    }

    pub fn sequence(mut self, sequence: i32) -> Self {
        self.tax.sequence = sequence;
        self
    }

    pub fn price_include(mut self) -> Self {
        self.tax.price_include = true;
        self
    }

    pub fn include_base_amount(mut self) -> Self {
        self.tax.include_base_amount = true;
        self
    }

    pub fn is_base_affected(mut self, affected: bool) -> Self {
        self.tax.is_base_affected = affected;
        self
    }

    pub fn exigibility(mut self, exigibility: Exigibility) -> Self {
        self.tax.exigibility = exigibility;
        self
    }

    pub fn cash_basis_account(mut self, account: AccountRef) -> Self {
        self.tax.cash_basis_transition_account = Some(account);
        self
    }

    /// Send every tax line, invoice and refund, to `account`.
    pub fn account(mut self, account: AccountRef) -> Self {
        for line in self
            .tax
            .invoice_repartition
            .iter_mut()
            .chain(self.tax.refund_repartition.iter_mut())
            .filter(|l| l.kind == RepartitionKind::Tax)
        {
            line.account = Some(account.clone());
        }
        self
    }

    /// Replace the repartition lines.
    pub fn repartition(mut self, invoice: Vec<RepartitionLine>, refund: Vec<RepartitionLine>) -> Self {
        self.tax.invoice_repartition = invoice;
        self.tax.refund_repartition = refund;
        self
    }

    /// Add tags to the base lines (invoice and refund).
    pub fn base_tags(mut self, tags: impl IntoIterator<Item = u32> + Clone) -> Self {
        for line in self
            .tax
            .invoice_repartition
            .iter_mut()
            .chain(self.tax.refund_repartition.iter_mut())
            .filter(|l| l.kind == RepartitionKind::Base)
        {
            line.tag_ids.extend(tags.clone());
        }
        self
    }

    /// Add tags to the tax lines (invoice and refund).
    pub fn tax_tags(mut self, tags: impl IntoIterator<Item = u32> + Clone) -> Self {
        for line in self
            .tax
            .invoice_repartition
            .iter_mut()
            .chain(self.tax.refund_repartition.iter_mut())
            .filter(|l| l.kind == RepartitionKind::Tax)
        {
            line.tag_ids.extend(tags.clone());
        }
        self
    }

    pub fn fixed_quantity_override(mut self) -> Self {
        self.tax.is_fixed_quantity_override = true;
        self
    }

    pub fn scope(mut self, scope: TaxScope) -> Self {
        self.tax.scope = scope;
        self
    }

    pub fn analytic(mut self) -> Self {
        self.tax.analytic = true;
        self
    }

    pub fn build(self) -> TaxDefinition {
        self.tax
    }
}
