pub mod locks;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::delinquency::{DelinquencyEvaluator, DelinquencyVerdict};
use crate::errors::{BillingError, Result};
use crate::events::Event;
use crate::models::Payment;
use crate::money::Money;
use crate::store::{Ledger, Repository};
use crate::types::{BorrowerId, LoanId, LoanStatus};

pub use locks::LoanLocks;

/// result of a committed payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentOutcome {
    pub payment: Payment,
    pub borrower_id: BorrowerId,
    pub installment_sequence: u32,
    pub remaining_balance: Money,
    pub remaining_installments: usize,
    pub loan_closed: bool,
    pub verdict: DelinquencyVerdict,
    /// borrower flag differs from its value before the payment
    pub delinquency_changed: bool,
}

impl PaymentOutcome {
    pub fn events(&self) -> Vec<Event> {
        let timestamp = self.payment.paid_at;
        let mut events = vec![Event::PaymentApplied {
            loan_id: self.payment.loan_id,
            installment_id: self.payment.installment_id,
            sequence: self.installment_sequence,
            amount: self.payment.amount,
            remaining_balance: self.remaining_balance,
            timestamp,
        }];

        if self.loan_closed {
            events.push(Event::LoanClosed {
                loan_id: self.payment.loan_id,
                timestamp,
            });
        }

        if self.delinquency_changed {
            events.push(Event::DelinquencyChanged {
                borrower_id: self.borrower_id,
                loan_id: self.payment.loan_id,
                delinquent: self.verdict.delinquent,
                longest_streak: self.verdict.longest_streak,
                timestamp,
            });
        }

        events
    }
}

/// result of the read-only delinquency path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelinquencyCheck {
    pub loan_id: LoanId,
    pub borrower_id: BorrowerId,
    pub verdict: DelinquencyVerdict,
    /// the borrower flag went from false to true
    pub flag_raised: bool,
    pub as_of: DateTime<Utc>,
}

impl DelinquencyCheck {
    pub fn event(&self) -> Option<Event> {
        self.flag_raised.then(|| Event::DelinquencyChanged {
            borrower_id: self.borrower_id,
            loan_id: self.loan_id,
            delinquent: true,
            longest_streak: self.verdict.longest_streak,
            timestamp: self.as_of,
        })
    }
}

/// applies payments against the oldest unpaid installment
pub struct PaymentProcessor<R> {
    repository: Arc<R>,
    evaluator: DelinquencyEvaluator,
    locks: LoanLocks,
}

impl<R> PaymentProcessor<R>
where
    R: Repository,
{
    pub fn new(repository: Arc<R>, evaluator: DelinquencyEvaluator) -> Self {
        Self {
            repository,
            evaluator,
            locks: LoanLocks::new(),
        }
    }

    pub fn evaluator(&self) -> &DelinquencyEvaluator {
        &self.evaluator
    }

    /// apply one payment as a single unit of work
    ///
    /// Validation failures abort before any write. A failure after the ledger
    /// entry is written rolls back everything this call wrote.
    pub fn apply(&self, loan_id: LoanId, amount: Money, time_provider: &SafeTimeProvider) -> Result<PaymentOutcome> {
        let now = time_provider.now();
        debug!(%loan_id, %amount, "applying payment");

        let result = self.locks.with_lock(loan_id, || {
            self.repository
                .with_transaction(|ledger| self.apply_in(ledger, loan_id, amount, now))
        });

        match &result {
            Ok(outcome) => info!(
                %loan_id,
                %amount,
                sequence = outcome.installment_sequence,
                remaining = %outcome.remaining_balance,
                closed = outcome.loan_closed,
                delinquent = outcome.verdict.delinquent,
                "payment applied"
            ),
            Err(err) => warn!(%loan_id, %amount, error = %err, "payment rejected"),
        }

        result
    }

    fn apply_in(
        &self,
        ledger: &mut dyn Ledger,
        loan_id: LoanId,
        amount: Money,
        now: DateTime<Utc>,
    ) -> Result<PaymentOutcome> {
        let loan = ledger.loan(loan_id)?.ok_or(BillingError::LoanNotFound { id: loan_id })?;

        let unpaid = ledger.unpaid_installments(loan_id)?;
        let target = unpaid
            .first()
            .ok_or(BillingError::NoOutstandingInstallments { loan_id })?;

        if amount != target.amount {
            return Err(BillingError::AmountMismatch {
                expected: target.amount,
                provided: amount,
            });
        }

        let payment = Payment::new(loan_id, target.id, amount, now);
        ledger.insert_payment(payment.clone())?;
        ledger.set_installment_paid(target.id, true)?;

        let remaining_balance = loan.current_balance - amount;
        ledger.set_loan_balance(loan_id, remaining_balance)?;
        ledger.set_last_payment_date(loan_id, now)?;

        let remaining_installments = ledger.count_unpaid_installments(loan_id)?;
        let loan_closed = remaining_installments == 0;
        if loan_closed {
            ledger.set_loan_status(loan_id, LoanStatus::Closed)?;
        }

        let schedule = ledger.installments(loan_id)?;
        let verdict = self.evaluator.evaluate(&schedule, now);
        let was_delinquent = ledger
            .borrower(loan.borrower_id)?
            .ok_or(BillingError::BorrowerNotFound { id: loan.borrower_id })?
            .is_delinquent;
        ledger.set_borrower_delinquent(loan.borrower_id, verdict.delinquent)?;

        Ok(PaymentOutcome {
            payment,
            borrower_id: loan.borrower_id,
            installment_sequence: target.sequence,
            remaining_balance,
            remaining_installments,
            loan_closed,
            verdict,
            delinquency_changed: was_delinquent != verdict.delinquent,
        })
    }

    /// evaluate a loan and raise the borrower flag when it is delinquent
    ///
    /// Never clears the flag; only a payment may do that.
    pub fn check_delinquency(&self, loan_id: LoanId, as_of: DateTime<Utc>) -> Result<DelinquencyCheck> {
        let (borrower_id, verdict, already_flagged) = self.repository.read(|ledger| {
            let loan = ledger.loan(loan_id)?.ok_or(BillingError::LoanNotFound { id: loan_id })?;
            let schedule = ledger.installments(loan_id)?;
            let flagged = ledger
                .borrower(loan.borrower_id)?
                .map_or(false, |borrower| borrower.is_delinquent);
            Ok((loan.borrower_id, self.evaluator.evaluate(&schedule, as_of), flagged))
        })?;

        let flag_raised = verdict.delinquent && !already_flagged;
        if flag_raised {
            self.repository
                .with_transaction(|ledger| Ok(ledger.set_borrower_delinquent(borrower_id, true)?))?;
            info!(%loan_id, %borrower_id, streak = verdict.longest_streak, "borrower flagged delinquent");
        }

        Ok(DelinquencyCheck {
            loan_id,
            borrower_id,
            verdict,
            flag_raised,
            as_of,
        })
    }
}
