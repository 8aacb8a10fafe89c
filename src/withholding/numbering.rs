use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::core::FiscalError;

/// Gapless reference sequence for withholding documents.
///
/// References have the form `{prefix}{year}-{sequential}`, e.g.
/// "RS2024-001". The counter restarts at 1 with each fiscal year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceSequence {
    prefix: String,
    year: i32,
    next_number: u64,
    zero_pad: usize,
}

impl ReferenceSequence {
    /// Create a new sequence starting at 1.
    pub fn new(prefix: impl Into<String>, year: i32) -> Self {
        Self::starting_at(prefix, year, 1)
    }

    /// Continue a sequence whose last issued number is `next_number - 1`.
    pub fn starting_at(prefix: impl Into<String>, year: i32, next_number: u64) -> Self {
        Self {
            prefix: prefix.into(),
            year,
            next_number,
            zero_pad: 3,
        }
    }

    /// Set zero-padding width (default: 3, so "001").
    pub fn with_padding(mut self, width: usize) -> Self {
        self.zero_pad = width;
        self
    }

    fn format(&self, number: u64) -> String {
        format!(
            "{}{}-{:0>width$}",
            self.prefix,
            self.year,
            number,
            width = self.zero_pad
        )
    }

    /// Issue the next reference of the current year.
    pub fn next_reference(&mut self) -> String {
        let reference = self.format(self.next_number);
        self.next_number += 1;
        reference
    }

    /// Issue the next reference for a document dated `date`.
    ///
    /// A date in a later year opens that year; a date before the current
    /// year is refused, its numbers can no longer be issued without a gap.
    pub fn reference_for(&mut self, date: NaiveDate) -> Result<String, FiscalError> {
        let year = date.year();
        if year < self.year {
            return Err(FiscalError::Numbering(format!(
                "cannot number a document of {year}, the sequence is in {}",
                self.year
            )));
        }
        if year > self.year {
            self.advance_year(year)?;
        }
        Ok(self.next_reference())
    }

    /// Preview the next reference without consuming it.
    pub fn peek(&self) -> String {
        self.format(self.next_number)
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    /// The next number that will be issued (without prefix/formatting).
    pub fn next_raw(&self) -> u64 {
        self.next_number
    }

    /// Move to a new year, resetting the counter to 1.
    pub fn advance_year(&mut self, new_year: i32) -> Result<(), FiscalError> {
        if new_year <= self.year {
            return Err(FiscalError::Numbering(format!(
                "new year {new_year} must be greater than current year {}",
                self.year
            )));
        }
        self.year = new_year;
        self.next_number = 1;
        Ok(())
    }
}
