//! Pluggable collaborators of the calculator.
//!
//! The calculator never evaluates configuration code. Taxes of type
//! [`AmountType::CodeComputed`] name a [`CodeRule`] registered in a
//! [`RuleRegistry`]; every other type uses the fixed formulas of
//! [`standard_amount`].

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;

use super::error::{FiscalError, RuleError};
use super::types::*;

/// What an amount computation sees of the line being taxed.
#[derive(Debug, Clone, Copy)]
pub struct AmountContext<'a> {
    /// Base the tax applies to (always non-negative in the calculator).
    pub base_amount: Decimal,
    /// Unit price with the sign of the line.
    pub price_unit: Decimal,
    /// Quantity after the fixed-quantity override.
    pub quantity: Decimal,
    pub fixed_multiplicator: Decimal,
    /// Whether the amount is to be extracted from `base_amount`.
    pub price_include: bool,
    pub product: Option<&'a ProductRef>,
    pub partner: Option<&'a PartnerRef>,
}

/// Amount formula of a code-computed tax.
pub trait CodeRule: Send + Sync {
    /// Whether the tax applies to this line at all.
    fn is_applicable(&self, _ctx: &AmountContext<'_>) -> Result<bool, RuleError> {
        Ok(true)
    }

    /// Tax amount for `ctx.base_amount`.
    fn compute(&self, ctx: &AmountContext<'_>) -> Result<Decimal, RuleError>;
}

/// [`CodeRule`] backed by closures.
pub struct FnRule<C, A = fn(&AmountContext<'_>) -> Result<bool, RuleError>> {
    compute: C,
    applicable: Option<A>,
}

impl<C> FnRule<C>
where
    C: Fn(&AmountContext<'_>) -> Result<Decimal, RuleError> + Send + Sync,
{
    pub fn new(compute: C) -> Self {
        Self {
            compute,
            applicable: None,
        }
    }
}

impl<C, A> FnRule<C, A>
where
    C: Fn(&AmountContext<'_>) -> Result<Decimal, RuleError> + Send + Sync,
    A: Fn(&AmountContext<'_>) -> Result<bool, RuleError> + Send + Sync,
{
    /// Restrict the rule with an applicability predicate.
    pub fn when<B>(self, applicable: B) -> FnRule<C, B>
    where
        B: Fn(&AmountContext<'_>) -> Result<bool, RuleError> + Send + Sync,
    {
        FnRule {
            compute: self.compute,
            applicable: Some(applicable),
        }
    }
}

impl<C, A> CodeRule for FnRule<C, A>
where
    C: Fn(&AmountContext<'_>) -> Result<Decimal, RuleError> + Send + Sync,
    A: Fn(&AmountContext<'_>) -> Result<bool, RuleError> + Send + Sync,
{
    fn is_applicable(&self, ctx: &AmountContext<'_>) -> Result<bool, RuleError> {
        match &self.applicable {
            Some(predicate) => predicate(ctx),
            None => Ok(true),
        }
    }

    fn compute(&self, ctx: &AmountContext<'_>) -> Result<Decimal, RuleError> {
        (self.compute)(ctx)
    }
}

/// Code rules keyed by the tag stored in [`TaxDefinition::code_rule`].
#[derive(Default)]
pub struct RuleRegistry {
    rules: HashMap<String, Box<dyn CodeRule>>,
}

impl fmt::Debug for RuleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.rules.keys().collect();
        keys.sort();
        f.debug_struct("RuleRegistry").field("rules", &keys).finish()
    }
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `rule` under `key`, replacing any previous rule.
    pub fn register(&mut self, key: impl Into<String>, rule: impl CodeRule + 'static) -> &mut Self {
        self.rules.insert(key.into(), Box::new(rule));
        self
    }

    pub fn get(&self, key: &str) -> Option<&dyn CodeRule> {
        self.rules.get(key).map(|r| r.as_ref())
    }

    fn rule_for(&self, tax: &TaxDefinition) -> Result<&dyn CodeRule, FiscalError> {
        let key = tax
            .code_rule
            .as_deref()
            .ok_or_else(|| FiscalError::configuration(&tax.name, "no code rule configured"))?;
        self.get(key).ok_or_else(|| {
            FiscalError::configuration(&tax.name, format!("no code rule registered as '{key}'"))
        })
    }
}

/// Computes tax amounts for the calculator.
pub trait TaxAmountComputer {
    /// Whether `tax` applies to the line; only code-computed taxes may say no.
    fn is_applicable(&self, _tax: &TaxDefinition, _ctx: &AmountContext<'_>) -> Result<bool, FiscalError> {
        Ok(true)
    }

    /// Raw (unrounded) amount of `tax` on `ctx.base_amount`.
    fn compute_amount(&self, tax: &TaxDefinition, ctx: &AmountContext<'_>) -> Result<Decimal, FiscalError>;
}

/// Host formulas plus registered code rules.
#[derive(Debug, Default)]
pub struct StandardAmounts {
    pub rules: RuleRegistry,
}

impl StandardAmounts {
    pub fn new(rules: RuleRegistry) -> Self {
        Self { rules }
    }
}

impl TaxAmountComputer for StandardAmounts {
    fn is_applicable(&self, tax: &TaxDefinition, ctx: &AmountContext<'_>) -> Result<bool, FiscalError> {
        if tax.amount_type != AmountType::CodeComputed {
            return Ok(true);
        }
        self.rules
            .rule_for(tax)?
            .is_applicable(ctx)
            .map_err(|e| FiscalError::configuration(&tax.name, e))
    }

    fn compute_amount(&self, tax: &TaxDefinition, ctx: &AmountContext<'_>) -> Result<Decimal, FiscalError> {
        match tax.amount_type {
            AmountType::CodeComputed => self
                .rules
                .rule_for(tax)?
                .compute(ctx)
                .map_err(|e| FiscalError::configuration(&tax.name, e)),
            _ => standard_amount(tax, ctx),
        }
    }
}

/// Percent, fixed and division formulas.
///
/// Group and code-computed taxes have no formula of their own and yield zero.
pub fn standard_amount(tax: &TaxDefinition, ctx: &AmountContext<'_>) -> Result<Decimal, FiscalError> {
    let hundred = Decimal::ONE_HUNDRED;
    let base = ctx.base_amount;
    let rate = tax.amount;

    let amount = match (tax.amount_type, ctx.price_include) {
        (AmountType::Fixed, _) => {
            let quantity = if base.is_zero() {
                ctx.quantity
            } else if base.is_sign_negative() {
                -ctx.quantity.abs()
            } else {
                ctx.quantity.abs()
            };
            let per_unit = checked_mul(rate, ctx.fixed_multiplicator.abs(), &tax.name)?;
            checked_mul(quantity, per_unit, &tax.name)?
        }
        (AmountType::Percent, false) => checked_mul(base, rate, &tax.name)? / hundred,
        (AmountType::Percent, true) => {
            let divisor = Decimal::ONE + rate / hundred;
            base - checked_div(base, divisor, &tax.name)?
        }
        (AmountType::Division, false) => {
            let divisor = Decimal::ONE - rate / hundred;
            if divisor.is_zero() {
                Decimal::ZERO
            } else {
                checked_div(base, divisor, &tax.name)? - base
            }
        }
        (AmountType::Division, true) => base - checked_mul(base, rate / hundred, &tax.name)?,
        (AmountType::CodeComputed | AmountType::Group, _) => Decimal::ZERO,
    };
    Ok(amount)
}

pub(crate) fn checked_div(value: Decimal, divisor: Decimal, what: &str) -> Result<Decimal, FiscalError> {
    value
        .checked_div(divisor)
        .ok_or_else(|| FiscalError::Arithmetic(format!("cannot divide {value} by {divisor} ({what})")))
}

pub(crate) fn checked_mul(value: Decimal, by: Decimal, what: &str) -> Result<Decimal, FiscalError> {
    value
        .checked_mul(by)
        .ok_or_else(|| FiscalError::Arithmetic(format!("cannot multiply {value} by {by} ({what})")))
}

/// Resolves the ledger account of a generated tax line.
pub trait AccountResolver {
    fn target_account(
        &self,
        tax: &TaxDefinition,
        line: &RepartitionLine,
        cash_basis: bool,
    ) -> Option<AccountRef>;
}

/// The repartition line's own account; on-payment taxes go through their
/// cash-basis transition account unless cash basis is forced.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepartitionAccounts;

impl AccountResolver for RepartitionAccounts {
    fn target_account(
        &self,
        tax: &TaxDefinition,
        line: &RepartitionLine,
        cash_basis: bool,
    ) -> Option<AccountRef> {
        if tax.exigibility == Exigibility::OnPayment && !cash_basis {
            tax.cash_basis_transition_account.clone()
        } else {
            line.account.clone()
        }
    }
}
