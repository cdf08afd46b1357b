use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{BillingError, Result};
use crate::money::{Money, Rate};

/// weeks used to pro-rate an annual rate
const WEEKS_PER_YEAR: Decimal = dec!(52);

/// flat-rate simple interest calculator
///
/// All divisions truncate. `term_weeks * weekly_installment` may fall short of
/// `total_due` by up to `term_weeks - 1` minor units and that shortfall is
/// never added back to any installment.
pub struct AmortizationCalculator;

impl AmortizationCalculator {
    /// `floor(principal * (1 + rate * term_weeks / 52))`
    pub fn total_due(principal: Money, annual_rate: Rate, term_weeks: u32) -> Result<Money> {
        validate(principal, annual_rate, term_weeks)?;

        // numerator first so the only inexact step is the final division
        let factor = annual_rate
            .as_decimal()
            .checked_mul(Decimal::from(term_weeks))
            .and_then(|interest| interest.checked_add(WEEKS_PER_YEAR))
            .ok_or_else(|| BillingError::invalid_terms("interest factor overflows"))?;

        let total = principal
            .as_decimal()
            .checked_mul(factor)
            .and_then(|numerator| numerator.checked_div(WEEKS_PER_YEAR))
            .ok_or_else(|| BillingError::invalid_terms("total due overflows"))?
            .floor();

        total
            .to_i64()
            .map(Money::from_minor)
            .ok_or_else(|| BillingError::invalid_terms("total due exceeds representable amount"))
    }

    /// `floor(total_due / term_weeks)`
    pub fn weekly_installment(total_due: Money, term_weeks: u32) -> Money {
        if term_weeks == 0 {
            return Money::ZERO;
        }
        Money::from_minor(total_due.as_minor() / i64::from(term_weeks))
    }
}

fn validate(principal: Money, annual_rate: Rate, term_weeks: u32) -> Result<()> {
    if !principal.is_positive() {
        return Err(BillingError::invalid_terms(format!(
            "principal must be positive, got {}",
            principal
        )));
    }
    if annual_rate.is_negative() {
        return Err(BillingError::invalid_terms(format!(
            "interest rate must not be negative, got {}",
            annual_rate
        )));
    }
    if term_weeks == 0 {
        return Err(BillingError::invalid_terms("term must be at least one week"));
    }
    Ok(())
}

/// validated loan terms with their derived amounts
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub principal: Money,
    pub annual_rate: Rate,
    pub term_weeks: u32,
    total_due: Money,
    weekly_installment: Money,
}

impl LoanTerms {
    pub fn new(principal: Money, annual_rate: Rate, term_weeks: u32) -> Result<Self> {
        let total_due = AmortizationCalculator::total_due(principal, annual_rate, term_weeks)?;
        let weekly_installment = AmortizationCalculator::weekly_installment(total_due, term_weeks);

        Ok(Self {
            principal,
            annual_rate,
            term_weeks,
            total_due,
            weekly_installment,
        })
    }

    pub fn total_due(&self) -> Money {
        self.total_due
    }

    pub fn weekly_installment(&self) -> Money {
        self.weekly_installment
    }

    /// amount never collected because of truncation
    pub fn rounding_loss(&self) -> Money {
        self.total_due - self.weekly_installment.times(self.term_weeks)
    }

    /// sum of all scheduled installments
    pub fn scheduled_total(&self) -> Money {
        self.weekly_installment.times(self.term_weeks)
    }
}
