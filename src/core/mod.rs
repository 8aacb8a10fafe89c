//! Tax model, configuration validation and the tax stack calculator.
//!
//! This module provides the foundational types shared by the stamp and
//! withholding modules, and [`compute_all`], which turns a priced line and
//! its taxes into reconciled tax lines.

mod builder;
mod compute;
pub mod currencies;
mod error;
mod flatten;
mod request;
mod rules;
mod settings;
mod types;
mod validation;

pub use builder::*;
pub use compute::*;
pub use currencies::{Currency, round_to_increment};
pub use error::*;
pub use flatten::*;
pub use request::*;
pub use rules::*;
pub use settings::*;
pub use types::*;
pub use validation::*;
