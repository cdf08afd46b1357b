use chrono::Duration;
use uuid::Uuid;

use crate::errors::{BillingError, Result};
use crate::models::{Installment, Loan};

use super::amortization::AmortizationCalculator;

/// builds the weekly installment schedule for a newly issued loan
pub struct ScheduleGenerator;

impl ScheduleGenerator {
    /// one unpaid installment per week, due `start_date + week * 7 days`
    ///
    /// Nothing is persisted here; the caller inserts the whole batch in the
    /// same unit of work as the loan. A schedule running past the last
    /// representable date is rejected before any row is built.
    pub fn generate(loan: &Loan) -> Result<Vec<Installment>> {
        let amount = AmortizationCalculator::weekly_installment(loan.total_due, loan.term_weeks);

        // due dates grow with the week, so checking the last one covers all
        due_date(loan, loan.term_weeks)?;

        (1..=loan.term_weeks)
            .map(|week| {
                Ok(Installment {
                    id: Uuid::new_v4(),
                    loan_id: loan.id,
                    sequence: week,
                    due_date: due_date(loan, week)?,
                    amount,
                    paid: false,
                })
            })
            .collect()
    }
}

fn due_date(loan: &Loan, week: u32) -> Result<chrono::DateTime<chrono::Utc>> {
    Duration::try_weeks(i64::from(week))
        .and_then(|offset| loan.start_date.checked_add_signed(offset))
        .ok_or_else(|| {
            BillingError::invalid_terms(format!(
                "week {} of the schedule falls beyond the supported date range",
                week
            ))
        })
}
