use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::currencies::Currency;
use super::settings::{RoundingMethod, TaxSettings};
use super::types::{PartnerRef, ProductRef};

/// Input of one tax computation: a priced quantity and the knobs the host
/// uses to steer rounding and price-included handling.
///
/// ```
/// use fiscal_tn::core::*;
/// use rust_decimal_macros::dec;
///
/// let request = TaxComputation::new(dec!(100), &TaxSettings::default())
///     .quantity(dec!(5))
///     .refund(true);
/// assert_eq!(request.quantity, dec!(5));
/// assert!(request.is_refund);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxComputation {
    pub price_unit: Decimal,
    pub quantity: Decimal,
    pub currency: Currency,
    /// Use the refund repartition lines.
    pub is_refund: bool,
    pub rounding_method: RoundingMethod,
    /// Treat every tax as price-included (`Some(true)`) or excluded (`Some(false)`).
    pub force_price_include: Option<bool>,
    /// When false, the price is the base of every tax, even included ones.
    pub handle_price_include: bool,
    /// Keep the tags of on-payment taxes.
    pub include_caba_tags: bool,
    /// Multiplier applied to fixed taxes; its sign decides the sign of a zero base.
    pub fixed_multiplicator: Decimal,
    /// Round the line base and the total excluded to the currency.
    pub round_base: bool,
    pub split_included_percent_evenly: bool,
    pub product: Option<ProductRef>,
    pub partner: Option<PartnerRef>,
}

impl TaxComputation {
    /// A quantity of one at `price_unit`, with the company settings applied.
    pub fn new(price_unit: Decimal, settings: &TaxSettings) -> Self {
        Self {
            price_unit,
            quantity: Decimal::ONE,
            currency: settings.currency.clone(),
            is_refund: false,
            rounding_method: settings.rounding_method,
            force_price_include: None,
            handle_price_include: true,
            include_caba_tags: false,
            fixed_multiplicator: Decimal::ONE,
            round_base: true,
            split_included_percent_evenly: settings.split_included_percent_evenly,
            product: None,
            partner: None,
        }
    }

    pub fn quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = quantity;
        self
    }

    pub fn currency(mut self, currency: Currency) -> Self {
        self.currency = currency;
        self
    }

    pub fn refund(mut self, is_refund: bool) -> Self {
        self.is_refund = is_refund;
        self
    }

    pub fn rounding_method(mut self, method: RoundingMethod) -> Self {
        self.rounding_method = method;
        self
    }

    pub fn force_price_include(mut self, force: bool) -> Self {
        self.force_price_include = Some(force);
        self
    }

    pub fn handle_price_include(mut self, handle: bool) -> Self {
        self.handle_price_include = handle;
        self
    }

    pub fn include_caba_tags(mut self, include: bool) -> Self {
        self.include_caba_tags = include;
        self
    }

    pub fn fixed_multiplicator(mut self, multiplicator: Decimal) -> Self {
        self.fixed_multiplicator = multiplicator;
        self
    }

    pub fn round_base(mut self, round: bool) -> Self {
        self.round_base = round;
        self
    }

    pub fn product(mut self, product: ProductRef) -> Self {
        self.product = Some(product);
        self
    }

    pub fn partner(mut self, partner: PartnerRef) -> Self {
        self.partner = Some(partner);
        self
    }

    /// Working precision: the currency increment, or 10⁻⁵ of it when
    /// rounding globally.
    pub fn precision(&self) -> Decimal {
        match self.rounding_method {
            RoundingMethod::PerLine => self.currency.rounding,
            RoundingMethod::Globally => self.currency.rounding * Decimal::new(1, 5),
        }
    }
}
