/// serializable read models for loans
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Installment, Loan, Payment};
use crate::money::{Money, Rate};
use crate::types::{BorrowerId, LoanId, LoanStatus};

/// serializable view of a loan with its schedule and payment ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoanView {
    pub id: LoanId,
    pub borrower_id: BorrowerId,
    pub status: LoanStatus,
    pub start_date: DateTime<Utc>,
    pub financial: FinancialView,
    pub schedule: ScheduleView,
    pub payments: PaymentView,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinancialView {
    pub principal: Money,
    pub interest_rate: Rate,
    pub total_due: Money,
    pub current_balance: Money,
    pub amount_paid: Money,
    pub weekly_installment: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleView {
    pub term_weeks: u32,
    pub paid_installments: u32,
    pub unpaid_installments: u32,
    pub next_due_date: Option<DateTime<Utc>>,
    pub next_due_amount: Option<Money>,
    pub installments: Vec<Installment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentView {
    pub payment_count: u32,
    pub total_paid: Money,
    pub last_payment_date: Option<DateTime<Utc>>,
    pub last_payment_amount: Option<Money>,
    pub entries: Vec<Payment>,
}

impl LoanView {
    /// `installments` ordered by sequence, `payments` in ledger order
    pub fn from_parts(loan: &Loan, installments: Vec<Installment>, payments: Vec<Payment>) -> Self {
        let paid_installments = installments.iter().filter(|installment| installment.paid).count() as u32;
        let next = installments.iter().find(|installment| !installment.paid);

        LoanView {
            id: loan.id,
            borrower_id: loan.borrower_id,
            status: loan.status,
            start_date: loan.start_date,
            financial: FinancialView {
                principal: loan.principal,
                interest_rate: loan.interest_rate,
                total_due: loan.total_due,
                current_balance: loan.current_balance,
                amount_paid: loan.amount_paid(),
                weekly_installment: installments.first().map_or(Money::ZERO, |installment| installment.amount),
            },
            schedule: ScheduleView {
                term_weeks: loan.term_weeks,
                paid_installments,
                unpaid_installments: installments.len() as u32 - paid_installments,
                next_due_date: next.map(|installment| installment.due_date),
                next_due_amount: next.map(|installment| installment.amount),
                installments,
            },
            payments: PaymentView {
                payment_count: payments.len() as u32,
                total_paid: payments.iter().map(|payment| payment.amount).sum(),
                last_payment_date: loan.last_payment_date,
                last_payment_amount: payments.last().map(|payment| payment.amount),
                entries: payments,
            },
        }
    }

    /// convert to pretty-printed json string
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
