//! Tax stack computation.
//!
//! Given a unit price, a quantity and the taxes of a line, [`compute_all`]
//! finds the price without taxes, the amount of every tax and the price with
//! all taxes, such that the rounded tax lines reconcile exactly with the
//! totals.
//!
//! The computation walks the flattened taxes twice:
//!
//! 1. in reverse order, peeling price-included taxes off the price to find
//!    the total excluded, and remembering for each group of included taxes
//!    the price they must add back up to (the *checkpoint*);
//! 2. in order, assigning each tax its base and amount, spreading the amount
//!    over the repartition lines and growing the base of the following taxes.
//!
//! ```text
//!     tax  |  base  |  amount  |
//! /\ ---------------------------
//! || tax_1 |  XXXX  |          | <- total excluded, found by pass 1
//! || tax_2 |   ..   |          |
//! || tax_3 |   ..   |          |
//! ||  ...  |   ..   |    ..    |
//! ```

use std::collections::{BTreeSet, HashMap};

use rust_decimal::Decimal;
use tracing::{debug, trace, warn};

use super::currencies::round_to_increment;
use super::error::FiscalError;
use super::flatten::{FlatTax, flatten_taxes};
use super::request::TaxComputation;
use super::rules::{
    AccountResolver, AmountContext, RepartitionAccounts, RuleRegistry, StandardAmounts,
    TaxAmountComputer, checked_div, checked_mul,
};
use super::types::*;

/// Compute the taxes of one line with the default collaborators.
///
/// ```
/// use fiscal_tn::core::*;
/// use rust_decimal_macros::dec;
///
/// let vat = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19)).build();
/// let request = TaxComputation::new(dec!(100), &TaxSettings::default());
/// let result = compute_all(&[vat], &request).unwrap();
///
/// assert_eq!(result.total_excluded, dec!(100));
/// assert_eq!(result.tax_lines[0].amount, dec!(19));
/// assert_eq!(result.total_included, dec!(119));
/// ```
pub fn compute_all(
    taxes: &[TaxDefinition],
    request: &TaxComputation,
) -> Result<ComputationResult, FiscalError> {
    TaxCalculator::new().compute_all(taxes, request)
}

/// Tax stack calculator with injected amount and account collaborators.
///
/// The calculator holds no mutable state; one instance can serve
/// concurrent computations.
#[derive(Debug)]
pub struct TaxCalculator<A = StandardAmounts, R = RepartitionAccounts> {
    amounts: A,
    accounts: R,
}

impl TaxCalculator {
    /// Standard formulas, no code rules, repartition-line accounts.
    pub fn new() -> Self {
        Self::with_rules(RuleRegistry::new())
    }

    /// Standard formulas plus the given code rules.
    pub fn with_rules(rules: RuleRegistry) -> Self {
        Self::with_collaborators(StandardAmounts::new(rules), RepartitionAccounts)
    }
}

impl Default for TaxCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Price-included contributions waiting to be removed from the base.
#[derive(Debug, Default)]
struct IncludedAmounts {
    /// `(tax index, rate, repartition factor)`.
    percent: Vec<(usize, Decimal, Decimal)>,
    /// Rate times repartition factor.
    division: Vec<Decimal>,
    /// Factorized amounts, already final.
    fixed: Decimal,
}

/// Amounts and bases already settled during the reverse pass, by tax index.
#[derive(Debug, Default)]
struct ReverseCache {
    bases: HashMap<usize, Decimal>,
    amounts: HashMap<usize, Decimal>,
}

impl IncludedAmounts {
    /// Remove the accumulated contributions from `base` and reset them:
    /// `(base - fixed) / (1 + percent/100) * (100 - division) / 100`.
    fn collapse(
        &mut self,
        base: Decimal,
        split_evenly: bool,
        precision: Decimal,
        cache: &mut ReverseCache,
    ) -> Result<Decimal, FiscalError> {
        let hundred = Decimal::ONE_HUNDRED;
        let what = "included percent taxes";
        let mut fixed = self.fixed;
        let division: Decimal = self.division.iter().sum();
        let mut percent: Decimal = self.percent.iter().map(|(_, rate, factor)| rate * factor).sum();

        if split_evenly {
            // Equal rates must give equal amounts: settle them here.
            let mut total = Decimal::ZERO;
            for &(i, rate, factor) in &self.percent {
                let amount = round_to_increment(
                    checked_div(checked_mul(base, rate, what)?, hundred + percent, what)?,
                    precision,
                )?;
                let factorized = round_to_increment(checked_mul(amount, factor, what)?, precision)?;
                total += factorized;
                fixed += factorized;
                cache.amounts.insert(i, amount);
            }
            for &(i, _, _) in &self.percent {
                cache.bases.insert(i, base - total);
            }
            percent = Decimal::ZERO;
        }

        self.percent.clear();
        self.division.clear();
        self.fixed = Decimal::ZERO;

        let without_percent = checked_div(base - fixed, Decimal::ONE + percent / hundred, what)?;
        Ok(checked_mul(without_percent, hundred - division, "included division taxes")? / hundred)
    }
}

impl<A: TaxAmountComputer, R: AccountResolver> TaxCalculator<A, R> {
    /// Custom amount computation and account resolution.
    pub fn with_collaborators(amounts: A, accounts: R) -> Self {
        Self { amounts, accounts }
    }

    /// Compute the taxes of one line.
    ///
    /// `taxes` may contain groups; they are flattened first. Code-computed
    /// taxes whose rule says they do not apply are left out.
    pub fn compute_all(
        &self,
        taxes: &[TaxDefinition],
        request: &TaxComputation,
    ) -> Result<ComputationResult, FiscalError> {
        let currency = &request.currency;
        if currency.rounding <= Decimal::ZERO {
            return Err(FiscalError::Validation(format!(
                "currency {} has a non-positive rounding increment",
                currency.code
            )));
        }
        let precision = request.precision();
        let round = |value: Decimal| round_to_increment(value, precision);

        let line_amount = request
            .price_unit
            .checked_mul(request.quantity)
            .ok_or_else(|| {
                FiscalError::Arithmetic(format!(
                    "{} x {} is out of range",
                    request.price_unit, request.quantity
                ))
            })?;

        let taxes = self.applicable_taxes(flatten_taxes(taxes), line_amount, request)?;
        let is_refund = request.is_refund;

        let mut base = if request.round_base {
            currency.round(line_amount)?
        } else {
            line_amount
        };

        // Work on the absolute value, the sign is put back on every output.
        let sign = if currency.is_zero(base) {
            if request.fixed_multiplicator < Decimal::ZERO {
                Decimal::NEGATIVE_ONE
            } else {
                Decimal::ONE
            }
        } else if base < Decimal::ZERO {
            base = -base;
            Decimal::NEGATIVE_ONE
        } else {
            Decimal::ONE
        };

        // Pass 1: reverse order, find the total excluded.
        let mut checkpoints: HashMap<usize, Decimal> = HashMap::new();
        let mut included = IncludedAmounts::default();
        let mut cache = ReverseCache::default();
        if request.handle_price_include {
            let mut store_checkpoint = true;
            let mut is_base_affected = true;

            for (i, flat) in taxes.iter().enumerate().rev() {
                let tax = flat.tax;
                let factor = tax.repartition_factor(is_refund);

                if tax.include_base_amount && is_base_affected {
                    base = included.collapse(
                        base,
                        request.split_included_percent_evenly,
                        precision,
                        &mut cache,
                    )?;
                    store_checkpoint = true;
                }

                if self.price_include(tax, request) {
                    let quantity = tax.effective_quantity(request.quantity);
                    match tax.amount_type {
                        AmountType::Percent => included.percent.push((i, tax.amount, factor)),
                        AmountType::Division => included.division.push(tax.amount * factor),
                        AmountType::Fixed => {
                            let per_unit = checked_mul(
                                tax.amount * factor,
                                request.fixed_multiplicator.abs(),
                                &tax.name,
                            )?;
                            included.fixed += checked_mul(quantity.abs(), per_unit, &tax.name)?;
                        }
                        AmountType::CodeComputed | AmountType::Group => {
                            // Cached before the factor: the forward pass applies it.
                            let ctx = self.context(request, base, sign, quantity, true);
                            let amount = round(self.amounts.compute_amount(tax, &ctx)?)?;
                            included.fixed += round(checked_mul(amount, factor, &tax.name)?)?;
                            cache.amounts.insert(i, amount);
                        }
                    }

                    // Zero-rate taxes add nothing, their checkpoint would be useless.
                    let has_amount = !tax.amount.is_zero()
                        || !matches!(
                            tax.amount_type,
                            AmountType::Percent | AmountType::Division | AmountType::Fixed
                        );
                    if store_checkpoint && has_amount {
                        checkpoints.insert(i, base);
                        store_checkpoint = false;
                    }
                }

                is_base_affected = tax.is_base_affected;
            }
        }

        let mut total_excluded = included.collapse(
            base,
            request.split_included_percent_evenly,
            precision,
            &mut cache,
        )?;
        if request.round_base {
            total_excluded = currency.round(total_excluded)?;
        }

        // Pass 2: in order, assign bases and amounts.
        let mut base = total_excluded;
        let mut total_included = total_excluded;
        let mut total_void = total_excluded;

        // Set once a price-excluded tax has grown the base: the checkpoints
        // no longer describe the running base.
        let mut skip_checkpoint = false;
        let mut cumulated_included = Decimal::ZERO;

        let product_tags: BTreeSet<u32> = request
            .product
            .as_ref()
            .map(|p| p.tag_ids.clone())
            .unwrap_or_default();

        let mut tax_lines = Vec::new();
        for (i, flat) in taxes.iter().enumerate() {
            let tax = flat.tax;
            let quantity = tax.effective_quantity(request.quantity);
            let price_include = self.price_include(tax, request);

            let tax_base = match cache.bases.get(&i) {
                Some(cached) if price_include => *cached,
                _ if price_include || tax.is_base_affected => base,
                _ => total_excluded,
            };

            let factor = tax.repartition_factor(is_refund);
            let checkpoint = checkpoints.get(&i).copied();

            let (tax_amount, factorized_amount) = match (cache.amounts.get(&i), checkpoint) {
                (Some(cached), _) if price_include => {
                    let tax_amount = round(*cached)?;
                    (tax_amount, round(checked_mul(tax_amount, factor, &tax.name)?)?)
                }
                (_, Some(target)) if !skip_checkpoint && price_include && !factor.is_zero() => {
                    // The total to reach is known, subtract to avoid rounding drift.
                    // The difference already carries the repartition factor.
                    let factorized = round(target - (base + cumulated_included))?;
                    cumulated_included = Decimal::ZERO;
                    (round(checked_div(factorized, factor, &tax.name)?)?, factorized)
                }
                _ => {
                    let ctx = self.context(request, tax_base, sign, quantity, false);
                    let tax_amount = round(self.amounts.compute_amount(tax, &ctx)?)?;
                    (tax_amount, round(checked_mul(tax_amount, factor, &tax.name)?)?)
                }
            };

            if price_include && checkpoint.is_none() {
                cumulated_included += factorized_amount;
            }

            // Lines of a base-affecting tax carry the base tags of the
            // taxes they affect, so the tax report sees the right totals.
            let (subsequent_ids, subsequent_tags) = if tax.include_base_amount {
                let subsequent: Vec<&TaxDefinition> = taxes[i + 1..]
                    .iter()
                    .map(|f| f.tax)
                    .filter(|t| t.is_base_affected)
                    .collect();
                let tags: BTreeSet<u32> = subsequent
                    .iter()
                    .filter(|t| request.include_caba_tags || t.exigibility != Exigibility::OnPayment)
                    .flat_map(|t| t.base_tags(is_refund))
                    .collect();
                (subsequent.iter().map(|t| t.id).collect::<Vec<_>>(), tags)
            } else {
                (Vec::new(), BTreeSet::new())
            };

            let repartition: Vec<&RepartitionLine> = tax.tax_repartition(is_refund).collect();
            let line_amounts =
                distribute(tax_amount, factorized_amount, &repartition, precision, &tax.name)?;
            let hide_own_tags =
                !request.include_caba_tags && tax.exigibility == Exigibility::OnPayment;
            let signed_base = round(sign * tax_base)?;

            trace!(
                tax = %tax.name,
                base = %tax_base,
                amount = %factorized_amount,
                price_include,
                "tax computed"
            );

            for (line, amount) in repartition.iter().zip(line_amounts) {
                let mut tag_ids = if hide_own_tags {
                    BTreeSet::new()
                } else {
                    line.tag_ids.clone()
                };
                tag_ids.extend(subsequent_tags.iter().copied());
                tag_ids.extend(product_tags.iter().copied());

                tax_lines.push(TaxLine {
                    tax_id: tax.id,
                    name: tax.name.clone(),
                    amount: sign * amount,
                    base: signed_base,
                    sequence: tax.sequence,
                    account: self
                        .accounts
                        .target_account(tax, line, request.include_caba_tags),
                    analytic: tax.analytic,
                    use_in_tax_closing: line.use_in_tax_closing,
                    price_include,
                    exigibility: tax.exigibility,
                    repartition_line_id: line.id,
                    group: flat.group_ref(),
                    tag_ids,
                    tax_ids: subsequent_ids.clone(),
                });

                if line.account.is_none() {
                    total_void += amount;
                }
            }

            if tax.include_base_amount {
                base += factorized_amount;
                if !price_include {
                    skip_checkpoint = true;
                }
            }

            total_included += factorized_amount;
        }

        let mut base_tag_ids: BTreeSet<u32> = taxes
            .iter()
            .map(|f| f.tax)
            .filter(|t| request.include_caba_tags || t.exigibility != Exigibility::OnPayment)
            .flat_map(|t| t.base_tags(is_refund))
            .collect();
        base_tag_ids.extend(product_tags);

        if total_void != total_excluded {
            warn!(
                void = %(total_void - total_excluded),
                "tax repartition lines without account"
            );
        }

        let result = ComputationResult {
            total_excluded: sign * total_excluded,
            total_included: sign * currency.round(total_included)?,
            total_void: sign * total_void,
            base_tag_ids,
            tax_lines,
        };

        debug!(
            taxes = taxes.len(),
            total_excluded = %result.total_excluded,
            total_included = %result.total_included,
            "computed line taxes"
        );

        Ok(result)
    }

    fn applicable_taxes<'t>(
        &self,
        flat: Vec<FlatTax<'t>>,
        line_amount: Decimal,
        request: &TaxComputation,
    ) -> Result<Vec<FlatTax<'t>>, FiscalError> {
        let mut applicable = Vec::with_capacity(flat.len());
        for f in flat {
            let ctx = AmountContext {
                base_amount: line_amount,
                price_unit: request.price_unit,
                quantity: f.tax.effective_quantity(request.quantity),
                fixed_multiplicator: request.fixed_multiplicator,
                price_include: self.price_include(f.tax, request),
                product: request.product.as_ref(),
                partner: request.partner.as_ref(),
            };
            if self.amounts.is_applicable(f.tax, &ctx)? {
                applicable.push(f);
            } else {
                debug!(tax = %f.tax.name, "tax not applicable to line");
            }
        }
        Ok(applicable)
    }

    fn price_include(&self, tax: &TaxDefinition, request: &TaxComputation) -> bool {
        request.force_price_include.unwrap_or(tax.price_include)
    }

    fn context<'r>(
        &self,
        request: &'r TaxComputation,
        base_amount: Decimal,
        sign: Decimal,
        quantity: Decimal,
        price_include: bool,
    ) -> AmountContext<'r> {
        AmountContext {
            base_amount,
            price_unit: sign * request.price_unit,
            quantity,
            fixed_multiplicator: request.fixed_multiplicator,
            price_include,
            product: request.product.as_ref(),
            partner: request.partner.as_ref(),
        }
    }
}

/// Split `tax_amount` over the repartition lines so that the rounded line
/// amounts add up to `factorized_amount` exactly.
///
/// Four 50 % lines on 0.03 give a factorized amount of 0.06, but each line
/// rounds 0.015 to 0.02; the 0.02 surplus is taken back one cent at a time
/// from the leading lines.
fn distribute(
    tax_amount: Decimal,
    factorized_amount: Decimal,
    lines: &[&RepartitionLine],
    precision: Decimal,
    tax_name: &str,
) -> Result<Vec<Decimal>, FiscalError> {
    let mut amounts = lines
        .iter()
        .map(|l| round_to_increment(checked_mul(tax_amount, l.factor, tax_name)?, precision))
        .collect::<Result<Vec<_>, _>>()?;
    if amounts.is_empty() || precision <= Decimal::ZERO {
        return Ok(amounts);
    }

    let mut error = round_to_increment(factorized_amount - amounts.iter().sum::<Decimal>(), precision)?;
    let step = if error < Decimal::ZERO { -precision } else { precision };
    let mut idx = 0;
    while !error.is_zero() {
        let slot = idx % amounts.len();
        amounts[slot] += step;
        error -= step;
        idx += 1;
    }
    Ok(amounts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{
        Currency, FnRule, RoundingMethod, RuleError, TaxDefinitionBuilder, TaxSettings,
    };
    use rust_decimal_macros::dec;

    fn request(price: Decimal) -> TaxComputation {
        TaxComputation::new(price, &TaxSettings::default())
    }

    fn eur(price: Decimal) -> TaxComputation {
        request(price).currency(Currency::eur())
    }

    #[test]
    fn excluded_percent() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19)).build();
        let res = compute_all(&[tax], &request(dec!(100))).unwrap();
        assert_eq!(res.total_excluded, dec!(100));
        assert_eq!(res.tax_lines.len(), 1);
        assert_eq!(res.tax_lines[0].amount, dec!(19));
        assert_eq!(res.tax_lines[0].base, dec!(100));
        assert_eq!(res.total_included, dec!(119));
    }

    #[test]
    fn included_percent() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19))
            .price_include()
            .build();
        let res = compute_all(&[tax], &request(dec!(119))).unwrap();
        assert_eq!(res.total_excluded, dec!(100.00));
        assert_eq!(res.tax_lines[0].amount, dec!(19.00));
        assert!(res.tax_lines[0].price_include);
        assert_eq!(res.total_included, dec!(119));
    }

    #[test]
    fn cascading_taxes() {
        let a = TaxDefinitionBuilder::percent(1, "A", dec!(10))
            .include_base_amount()
            .build();
        let b = TaxDefinitionBuilder::percent(2, "B", dec!(10)).build();
        let res = compute_all(&[a, b], &request(dec!(100))).unwrap();

        assert_eq!(res.tax_lines[0].amount, dec!(10));
        assert_eq!(res.tax_lines[0].base, dec!(100));
        assert_eq!(res.tax_lines[0].tax_ids, [2]);
        assert_eq!(res.tax_lines[1].amount, dec!(11));
        assert_eq!(res.tax_lines[1].base, dec!(110));
        assert_eq!(res.total_included, dec!(121));
    }

    #[test]
    fn unaffected_tax_keeps_excluded_base() {
        let a = TaxDefinitionBuilder::percent(1, "A", dec!(10))
            .include_base_amount()
            .build();
        let b = TaxDefinitionBuilder::percent(2, "B", dec!(10))
            .is_base_affected(false)
            .build();
        let res = compute_all(&[a, b], &request(dec!(100))).unwrap();
        assert_eq!(res.tax_lines[1].base, dec!(100));
        assert_eq!(res.tax_lines[1].amount, dec!(10));
        assert!(res.tax_lines[0].tax_ids.is_empty());
    }

    #[test]
    fn cascading_included_taxes_use_checkpoints() {
        let a = TaxDefinitionBuilder::percent(1, "A", dec!(10))
            .price_include()
            .include_base_amount()
            .build();
        let b = TaxDefinitionBuilder::percent(2, "B", dec!(10))
            .price_include()
            .build();
        let res = compute_all(&[a, b], &request(dec!(121))).unwrap();
        assert_eq!(res.total_excluded, dec!(100));
        assert_eq!(res.tax_lines[0].amount, dec!(10));
        assert_eq!(res.tax_lines[1].amount, dec!(11));
        assert_eq!(res.tax_lines[1].base, dec!(110));
        assert_eq!(res.total_included, dec!(121));
    }

    #[test]
    fn checkpoint_absorbs_rounding() {
        // 100.01 / 1.2 = 83.3416.. -> 83.34; 8.33 + 8.34 closes the gap.
        let a = TaxDefinitionBuilder::percent(1, "A", dec!(10)).price_include().build();
        let b = TaxDefinitionBuilder::percent(2, "B", dec!(10)).price_include().build();
        let res = compute_all(&[a, b], &eur(dec!(100.01))).unwrap();
        assert_eq!(res.total_excluded, dec!(83.34));
        assert_eq!(res.tax_lines[0].amount, dec!(8.33));
        assert_eq!(res.tax_lines[1].amount, dec!(8.34));
        assert_eq!(res.total_included, dec!(100.01));
    }

    #[test]
    fn even_split_of_included_percent_taxes() {
        let a = TaxDefinitionBuilder::percent(1, "CGST", dec!(10)).price_include().build();
        let b = TaxDefinitionBuilder::percent(2, "SGST", dec!(10)).price_include().build();
        let mut req = eur(dec!(100.01));
        req.split_included_percent_evenly = true;
        let res = compute_all(&[a, b], &req).unwrap();
        assert_eq!(res.total_excluded, dec!(83.35));
        assert_eq!(res.tax_lines[0].amount, dec!(8.33));
        assert_eq!(res.tax_lines[1].amount, dec!(8.33));
        assert_eq!(res.tax_lines[0].base, dec!(83.35));
        assert_eq!(res.total_included, dec!(100.01));
    }

    #[test]
    fn included_division() {
        let tax = TaxDefinitionBuilder::division(1, "div 20%", dec!(20))
            .price_include()
            .build();
        let res = compute_all(&[tax], &request(dec!(100))).unwrap();
        assert_eq!(res.total_excluded, dec!(80));
        assert_eq!(res.tax_lines[0].amount, dec!(20));
        assert_eq!(res.total_included, dec!(100));
    }

    #[test]
    fn included_fixed() {
        let tax = TaxDefinitionBuilder::fixed(1, "eco", dec!(2))
            .price_include()
            .build();
        let res = compute_all(&[tax], &request(dec!(10)).quantity(dec!(3))).unwrap();
        assert_eq!(res.total_excluded, dec!(24));
        assert_eq!(res.tax_lines[0].amount, dec!(6));
        assert_eq!(res.total_included, dec!(30));
    }

    #[test]
    fn stamp_is_charged_once() {
        let vat = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19)).build();
        let stamp = TaxDefinitionBuilder::stamp(2, "Timbre Fiscal Vente", dec!(1), TaxScope::Sale)
            .sequence(99)
            .build();
        let res = compute_all(&[vat, stamp], &request(dec!(100)).quantity(dec!(5))).unwrap();
        assert_eq!(res.total_excluded, dec!(500));
        assert_eq!(res.amount_for(1), dec!(95));
        assert_eq!(res.amount_for(2), dec!(1));
        assert_eq!(res.total_included, dec!(596));
    }

    #[test]
    fn regular_fixed_tax_scales_with_quantity() {
        let eco = TaxDefinitionBuilder::fixed(1, "eco", dec!(1)).build();
        let res = compute_all(&[eco], &request(dec!(100)).quantity(dec!(5))).unwrap();
        assert_eq!(res.amount_for(1), dec!(5));
    }

    #[test]
    fn negative_quantity_flips_every_amount() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 7%", dec!(7)).build();
        let res = compute_all(&[tax], &request(dec!(50)).quantity(dec!(-2))).unwrap();
        assert_eq!(res.total_excluded, dec!(-100));
        assert_eq!(res.tax_lines[0].amount, dec!(-7));
        assert_eq!(res.tax_lines[0].base, dec!(-100));
        assert_eq!(res.total_included, dec!(-107));
    }

    #[test]
    fn zero_base_sign_follows_multiplicator() {
        let tax = TaxDefinitionBuilder::fixed(1, "fixed", dec!(1)).build();
        let res = compute_all(
            &[tax],
            &request(dec!(0)).fixed_multiplicator(dec!(-1)),
        )
        .unwrap();
        assert_eq!(res.tax_lines[0].amount, dec!(-1));
        assert_eq!(res.total_included, dec!(-1));
    }

    #[test]
    fn rounding_error_is_spread() {
        let half = |id| RepartitionLine::tax(id, dec!(0.5), None);
        let tax = TaxDefinitionBuilder::percent(1, "split", dec!(3))
            .repartition(
                vec![RepartitionLine::base(10), half(11), half(12), half(13), half(14)],
                vec![RepartitionLine::base(20), half(21), half(22), half(23), half(24)],
            )
            .build();
        let res = compute_all(&[tax], &eur(dec!(1))).unwrap();
        let amounts: Vec<Decimal> = res.tax_lines.iter().map(|l| l.amount).collect();
        assert_eq!(amounts, [dec!(0.01), dec!(0.01), dec!(0.02), dec!(0.02)]);
        assert_eq!(res.tax_total(), dec!(0.06));
        assert_eq!(res.total_included, dec!(1.06));
    }

    #[test]
    fn distribute_closes_positive_gap() {
        let third = RepartitionLine::tax(1, dec!(0.3333), None);
        let lines = [&third, &third, &third];
        let amounts = distribute(dec!(0.10), dec!(0.10), &lines, dec!(0.01), "thirds").unwrap();
        // 3 x 0.03 = 0.09, one cent added to the first line
        assert_eq!(amounts, [dec!(0.04), dec!(0.03), dec!(0.03)]);
    }

    #[test]
    fn zero_factor_contributes_nothing() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19))
            .repartition(
                vec![
                    RepartitionLine::base(1),
                    RepartitionLine::tax(2, dec!(1), None),
                    RepartitionLine::tax(3, dec!(-1), None),
                ],
                vec![
                    RepartitionLine::base(4),
                    RepartitionLine::tax(5, dec!(1), None),
                    RepartitionLine::tax(6, dec!(-1), None),
                ],
            )
            .build();
        let res = compute_all(&[tax], &request(dec!(100))).unwrap();
        assert_eq!(res.tax_lines.len(), 2);
        assert_eq!(res.tax_lines[0].amount, dec!(19));
        assert_eq!(res.tax_lines[1].amount, dec!(-19));
        assert_eq!(res.total_included, dec!(100));
    }

    #[test]
    fn refund_uses_refund_repartition() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA", dec!(19))
            .repartition(
                vec![
                    RepartitionLine::base(1),
                    RepartitionLine::tax(2, dec!(1), Some(AccountRef::new(1, "4366"))),
                ],
                vec![
                    RepartitionLine::base(3),
                    RepartitionLine::tax(4, dec!(1), Some(AccountRef::new(2, "4367"))),
                ],
            )
            .build();
        let res = compute_all(&[tax], &request(dec!(100)).refund(true)).unwrap();
        assert_eq!(res.tax_lines[0].repartition_line_id, 4);
        assert_eq!(res.tax_lines[0].account.as_ref().unwrap().code, "4367");
    }

    #[test]
    fn total_void_counts_lines_without_account() {
        let with_account = TaxDefinitionBuilder::percent(1, "TVA", dec!(19))
            .account(AccountRef::new(1, "4366"))
            .build();
        let without_account = TaxDefinitionBuilder::percent(2, "FODEC", dec!(1)).build();
        let res = compute_all(&[with_account, without_account], &request(dec!(100))).unwrap();
        assert_eq!(res.total_included, dec!(120));
        assert_eq!(res.total_void, dec!(101));
    }

    #[test]
    fn group_members_report_their_group() {
        let group = TaxDefinitionBuilder::group(
            10,
            "TVA + FODEC",
            vec![
                TaxDefinitionBuilder::percent(1, "FODEC", dec!(1))
                    .include_base_amount()
                    .sequence(1)
                    .build(),
                TaxDefinitionBuilder::percent(2, "TVA 19%", dec!(19))
                    .sequence(2)
                    .build(),
            ],
        )
        .build();
        let res = compute_all(&[group], &request(dec!(100))).unwrap();
        assert_eq!(res.tax_lines.len(), 2);
        assert!(res.tax_lines.iter().all(|l| l.group.as_ref().unwrap().id == 10));
        assert_eq!(res.amount_for(1), dec!(1));
        assert_eq!(res.amount_for(2), dec!(19.19));
    }

    #[test]
    fn tags_flow_to_lines() {
        let fodec = TaxDefinitionBuilder::percent(1, "FODEC", dec!(1))
            .include_base_amount()
            .tax_tags([1])
            .base_tags([2])
            .build();
        let vat = TaxDefinitionBuilder::percent(2, "TVA", dec!(19))
            .tax_tags([3])
            .base_tags([4])
            .build();
        let product = ProductRef {
            id: 7,
            tag_ids: [9].into_iter().collect(),
        };
        let res = compute_all(&[fodec, vat], &request(dec!(100)).product(product)).unwrap();

        let fodec_tags: Vec<u32> = res.tax_lines[0].tag_ids.iter().copied().collect();
        assert_eq!(fodec_tags, [1, 4, 9]);
        let vat_tags: Vec<u32> = res.tax_lines[1].tag_ids.iter().copied().collect();
        assert_eq!(vat_tags, [3, 9]);
        let base_tags: Vec<u32> = res.base_tag_ids.iter().copied().collect();
        assert_eq!(base_tags, [2, 4, 9]);
    }

    #[test]
    fn cash_basis_tags_hidden_unless_requested() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA caba", dec!(19))
            .exigibility(Exigibility::OnPayment)
            .tax_tags([5])
            .base_tags([6])
            .build();
        let res = compute_all(std::slice::from_ref(&tax), &request(dec!(100))).unwrap();
        assert!(res.tax_lines[0].tag_ids.is_empty());
        assert!(res.base_tag_ids.is_empty());

        let res = compute_all(&[tax], &request(dec!(100)).include_caba_tags(true)).unwrap();
        assert!(res.tax_lines[0].tag_ids.contains(&5));
        assert!(res.base_tag_ids.contains(&6));
    }

    #[test]
    fn force_price_include_overrides_tax_flag() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19)).build();
        let res = compute_all(&[tax], &request(dec!(119)).force_price_include(true)).unwrap();
        assert_eq!(res.total_excluded, dec!(100));
        assert_eq!(res.total_included, dec!(119));
    }

    #[test]
    fn ignoring_price_include_uses_price_as_base() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19))
            .price_include()
            .build();
        let res = compute_all(&[tax], &request(dec!(100)).handle_price_include(false)).unwrap();
        assert_eq!(res.total_excluded, dec!(100));
        assert_eq!(res.tax_lines[0].amount, dec!(19));
    }

    #[test]
    fn global_rounding_keeps_extra_digits() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 7%", dec!(7)).build();
        let per_line = compute_all(std::slice::from_ref(&tax), &eur(dec!(10.01))).unwrap();
        assert_eq!(per_line.tax_lines[0].amount, dec!(0.70));

        let global = compute_all(
            &[tax],
            &eur(dec!(10.01)).rounding_method(RoundingMethod::Globally),
        )
        .unwrap();
        assert_eq!(global.tax_lines[0].amount, dec!(0.7007));
        assert_eq!(global.total_excluded, dec!(10.01));
        assert_eq!(global.total_included, dec!(10.71));
    }

    #[test]
    fn code_rule_amount() {
        let mut rules = RuleRegistry::new();
        rules.register(
            "half-percent",
            FnRule::new(|ctx: &AmountContext<'_>| Ok(ctx.base_amount * dec!(0.005))),
        );
        let calculator = TaxCalculator::with_rules(rules);
        let tax = TaxDefinitionBuilder::code(1, "TCL", "half-percent").build();
        let res = calculator.compute_all(&[tax], &request(dec!(1000))).unwrap();
        assert_eq!(res.amount_for(1), dec!(5));
    }

    #[test]
    fn inapplicable_code_tax_is_dropped() {
        let mut rules = RuleRegistry::new();
        rules.register(
            "big-lines",
            FnRule::new(|_: &AmountContext<'_>| Ok(dec!(3)))
                .when(|ctx: &AmountContext<'_>| Ok(ctx.base_amount >= dec!(1000))),
        );
        let calculator = TaxCalculator::with_rules(rules);
        let tax = TaxDefinitionBuilder::code(1, "big", "big-lines").build();

        let small = calculator
            .compute_all(std::slice::from_ref(&tax), &request(dec!(10)))
            .unwrap();
        assert!(small.tax_lines.is_empty());

        let big = calculator.compute_all(&[tax], &request(dec!(1000))).unwrap();
        assert_eq!(big.amount_for(1), dec!(3));
    }

    #[test]
    fn failing_rule_aborts_computation() {
        let mut rules = RuleRegistry::new();
        rules.register(
            "broken",
            FnRule::new(|_: &AmountContext<'_>| Err(RuleError::new("division by zero"))),
        );
        let calculator = TaxCalculator::with_rules(rules);
        let vat = TaxDefinitionBuilder::percent(1, "TVA", dec!(19)).build();
        let broken = TaxDefinitionBuilder::code(2, "Broken", "broken").build();
        let err = calculator
            .compute_all(&[vat, broken], &request(dec!(100)))
            .unwrap_err();
        assert!(matches!(
            err,
            FiscalError::Configuration { ref tax, ref cause } if tax == "Broken" && cause == "division by zero"
        ));
    }

    #[test]
    fn non_positive_rounding_is_rejected() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA", dec!(19)).build();
        let req = request(dec!(1)).currency(Currency::new("TND", dec!(0)));
        assert!(matches!(
            compute_all(&[tax], &req),
            Err(FiscalError::Validation(_))
        ));
    }

    #[test]
    fn singular_included_percent_is_an_arithmetic_error() {
        let tax = TaxDefinitionBuilder::percent(1, "bad", dec!(-100))
            .price_include()
            .build();
        assert!(matches!(
            compute_all(&[tax], &request(dec!(10))),
            Err(FiscalError::Arithmetic(_))
        ));
    }

    struct SuspenseAccount;

    impl AccountResolver for SuspenseAccount {
        fn target_account(&self, _: &TaxDefinition, _: &RepartitionLine, _: bool) -> Option<AccountRef> {
            Some(AccountRef::new(471, "471000"))
        }
    }

    #[test]
    fn custom_account_resolver() {
        let calculator =
            TaxCalculator::with_collaborators(StandardAmounts::new(RuleRegistry::new()), SuspenseAccount);
        let tax = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19)).build();
        let res = calculator.compute_all(&[tax], &request(dec!(100))).unwrap();
        assert_eq!(res.amount_for(1), dec!(19));
        assert_eq!(res.tax_lines[0].account.as_ref().map(|a| a.code.as_str()), Some("471000"));
        assert_eq!(res.total_void, dec!(100));
    }

    fn half_repartition() -> (Vec<RepartitionLine>, Vec<RepartitionLine>) {
        (
            vec![RepartitionLine::base(1), RepartitionLine::tax(2, dec!(0.5), None)],
            vec![RepartitionLine::base(3), RepartitionLine::tax(4, dec!(0.5), None)],
        )
    }

    #[test]
    fn included_code_tax_applies_repartition_factor() {
        let mut rules = RuleRegistry::new();
        rules.register("ten", FnRule::new(|_: &AmountContext<'_>| Ok(dec!(10))));
        let calculator = TaxCalculator::with_rules(rules);
        let (invoice, refund) = half_repartition();
        let tax = TaxDefinitionBuilder::code(1, "half", "ten")
            .price_include()
            .repartition(invoice, refund)
            .build();

        let res = calculator.compute_all(&[tax], &request(dec!(100))).unwrap();
        assert_eq!(res.total_excluded, dec!(95));
        assert_eq!(res.amount_for(1), dec!(5));
        assert_eq!(res.total_included, dec!(100));
    }

    #[test]
    fn included_percent_with_half_factor() {
        let (invoice, refund) = half_repartition();
        let tax = TaxDefinitionBuilder::percent(1, "half 20%", dec!(20))
            .price_include()
            .repartition(invoice, refund)
            .build();
        let res = compute_all(&[tax], &request(dec!(110))).unwrap();
        assert_eq!(res.total_excluded, dec!(100));
        assert_eq!(res.amount_for(1), dec!(10));
        assert_eq!(res.total_included, dec!(110));
    }

    #[test]
    fn even_split_applies_factor_once() {
        let (invoice, refund) = half_repartition();
        let a = TaxDefinitionBuilder::percent(1, "A", dec!(20))
            .price_include()
            .repartition(invoice.clone(), refund.clone())
            .build();
        let b = TaxDefinitionBuilder::percent(2, "B", dec!(20))
            .price_include()
            .repartition(invoice, refund)
            .build();
        let mut req = request(dec!(120));
        req.split_included_percent_evenly = true;
        let res = compute_all(&[a, b], &req).unwrap();
        assert_eq!(res.total_excluded, dec!(100));
        assert_eq!(res.amount_for(1), dec!(10));
        assert_eq!(res.amount_for(2), dec!(10));
        assert_eq!(res.total_included, dec!(120));
    }

    #[test]
    fn huge_price_rounds_globally() {
        let tax = TaxDefinitionBuilder::percent(1, "TVA 19%", dec!(19)).build();
        let req = request(dec!(100000000000000000000000))
            .rounding_method(RoundingMethod::Globally);
        let res = compute_all(&[tax], &req).unwrap();
        assert_eq!(res.total_excluded, dec!(100000000000000000000000));
        assert_eq!(res.total_included, dec!(119000000000000000000000));
    }

    #[test]
    fn overflowing_included_division_is_an_error() {
        let tax = TaxDefinitionBuilder::division(1, "div 50%", dec!(50))
            .price_include()
            .build();
        let req = request(dec!(70000000000000000000000000000));
        assert!(matches!(
            compute_all(&[tax], &req),
            Err(FiscalError::Arithmetic(_))
        ));
    }

    #[test]
    fn no_taxes() {
        let res = compute_all(&[], &request(dec!(12.3456))).unwrap();
        assert_eq!(res.total_excluded, dec!(12.346));
        assert_eq!(res.total_included, dec!(12.346));
        assert!(res.tax_lines.is_empty());
    }
}
