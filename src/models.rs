use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::money::{Money, Rate};
use crate::types::{BorrowerId, InstallmentId, LoanId, LoanStatus, PaymentId};

/// a person who borrows money
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Borrower {
    pub id: BorrowerId,
    pub name: String,
    pub contact_info: String,
    /// cached delinquency verdict, may lag the schedule between re-evaluations
    pub is_delinquent: bool,
    pub created_at: DateTime<Utc>,
}

impl Borrower {
    pub fn new(name: impl Into<String>, contact_info: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            contact_info: contact_info.into(),
            is_delinquent: false,
            created_at: now,
        }
    }
}

/// a loan issued to a borrower
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub principal: Money,
    pub interest_rate: Rate,
    pub term_weeks: u32,
    pub start_date: DateTime<Utc>,
    pub status: LoanStatus,
    pub total_due: Money,
    pub current_balance: Money,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Loan {
    pub fn is_active(&self) -> bool {
        self.status == LoanStatus::Active
    }

    pub fn amount_paid(&self) -> Money {
        self.total_due - self.current_balance
    }
}

/// one weekly obligation within a loan's schedule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub id: InstallmentId,
    pub loan_id: LoanId,
    /// 1-indexed position in the schedule
    pub sequence: u32,
    pub due_date: DateTime<Utc>,
    pub amount: Money,
    pub paid: bool,
}

impl Installment {
    /// unpaid and strictly before the reference instant
    pub fn is_past_due(&self, as_of: DateTime<Utc>) -> bool {
        !self.paid && self.due_date < as_of
    }
}

/// ledger entry settling exactly one installment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub loan_id: LoanId,
    pub installment_id: InstallmentId,
    pub amount: Money,
    pub paid_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(loan_id: LoanId, installment_id: InstallmentId, amount: Money, paid_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            loan_id,
            installment_id,
            amount,
            paid_at,
        }
    }
}
