use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// unique identifier for a borrower
pub type BorrowerId = Uuid;

/// unique identifier for a loan
pub type LoanId = Uuid;

/// unique identifier for a schedule entry
pub type InstallmentId = Uuid;

/// unique identifier for a ledger entry
pub type PaymentId = Uuid;

/// loan lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    /// installments remain unpaid
    Active,
    /// every installment has been paid
    Closed,
}

impl LoanStatus {
    pub fn label(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
