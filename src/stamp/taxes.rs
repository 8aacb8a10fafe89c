use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::core::{FiscalError, TaxDefinition, TaxScope};

/// Kind of accounting move, as the host names them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    OutInvoice,
    OutRefund,
    InInvoice,
    InRefund,
    /// Miscellaneous journal entry, never stamped.
    Entry,
}

impl MoveType {
    /// Tax scope of the side the move belongs to.
    pub fn scope(self) -> Option<TaxScope> {
        match self {
            Self::OutInvoice | Self::OutRefund => Some(TaxScope::Sale),
            Self::InInvoice | Self::InRefund => Some(TaxScope::Purchase),
            Self::Entry => None,
        }
    }

    pub fn is_refund(self) -> bool {
        matches!(self, Self::OutRefund | Self::InRefund)
    }
}

/// The stamp taxes of a company, resolved once by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StampTaxes {
    pub sale: Option<TaxDefinition>,
    pub purchase: Option<TaxDefinition>,
}

impl StampTaxes {
    pub fn new(sale: Option<TaxDefinition>, purchase: Option<TaxDefinition>) -> Self {
        Self { sale, purchase }
    }

    /// Pick the first fixed-quantity tax of each scope from a tax catalogue.
    pub fn from_catalog(catalog: &[TaxDefinition]) -> Self {
        let find = |scope: TaxScope| {
            catalog
                .iter()
                .find(|t| t.is_fixed_quantity_override && t.scope == scope)
                .cloned()
        };
        Self {
            sale: find(TaxScope::Sale),
            purchase: find(TaxScope::Purchase),
        }
    }

    /// Stamp tax for a move of the given type.
    pub fn for_move(&self, move_type: MoveType) -> Result<&TaxDefinition, FiscalError> {
        let tax = match move_type.scope() {
            Some(TaxScope::Sale) => self.sale.as_ref(),
            Some(TaxScope::Purchase) => self.purchase.as_ref(),
            _ => {
                return Err(FiscalError::Stamp(format!(
                    "{move_type:?} moves do not carry a fiscal stamp"
                )));
            }
        };
        tax.ok_or_else(|| {
            FiscalError::Stamp(format!(
                "no fiscal stamp tax configured for {move_type:?} moves"
            ))
        })
    }
}

/// Fixed amount of the stamp charged on a move, zero when none applies.
pub fn stamp_amount(stamps: &StampTaxes, move_type: MoveType) -> Decimal {
    stamps
        .for_move(move_type)
        .map(|tax| tax.amount)
        .unwrap_or(Decimal::ZERO)
}
