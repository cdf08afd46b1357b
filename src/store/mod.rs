pub mod memory;

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::{Borrower, Installment, Loan, Payment};
use crate::money::Money;
use crate::types::{BorrowerId, InstallmentId, LoanId, LoanStatus};

pub use memory::MemoryRepository;

/// Error enumeration for storage failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, RepositoryError>;

/// Row-level access to borrowers, loans, installments and payments.
///
/// Every list keyed by loan comes back ordered by installment sequence (or
/// payment time for the ledger). Updates to a missing row fail with
/// [`RepositoryError::NotFound`].
pub trait Ledger {
    // borrowers
    fn borrower(&self, id: BorrowerId) -> StoreResult<Option<Borrower>>;
    fn borrowers(&self) -> StoreResult<Vec<Borrower>>;
    fn delinquent_borrowers(&self) -> StoreResult<Vec<Borrower>>;
    fn insert_borrower(&mut self, borrower: Borrower) -> StoreResult<()>;
    fn set_borrower_delinquent(&mut self, id: BorrowerId, delinquent: bool) -> StoreResult<()>;

    // loans
    fn loan(&self, id: LoanId) -> StoreResult<Option<Loan>>;
    fn loans_by_borrower(&self, borrower_id: BorrowerId) -> StoreResult<Vec<Loan>>;
    /// active loans with no payment at or after `paid_since`
    fn delinquency_candidates(&self, paid_since: DateTime<Utc>) -> StoreResult<Vec<Loan>>;
    fn insert_loan(&mut self, loan: Loan) -> StoreResult<()>;
    fn set_loan_status(&mut self, id: LoanId, status: LoanStatus) -> StoreResult<()>;
    fn set_loan_balance(&mut self, id: LoanId, balance: Money) -> StoreResult<()>;
    fn set_last_payment_date(&mut self, id: LoanId, paid_at: DateTime<Utc>) -> StoreResult<()>;

    // installments
    fn installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>>;
    fn unpaid_installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>>;
    fn count_unpaid_installments(&self, loan_id: LoanId) -> StoreResult<usize>;
    fn insert_installments(&mut self, installments: Vec<Installment>) -> StoreResult<()>;
    fn set_installment_paid(&mut self, id: InstallmentId, paid: bool) -> StoreResult<()>;

    // payments
    fn payments(&self, loan_id: LoanId) -> StoreResult<Vec<Payment>>;
    fn insert_payment(&mut self, payment: Payment) -> StoreResult<()>;
}

/// Storage abstraction the engine runs against.
///
/// `with_transaction` is all-or-nothing: when `work` returns an error none of
/// the writes it made through the ledger are visible afterwards.
pub trait Repository: Send + Sync {
    fn read<T>(&self, work: impl FnOnce(&dyn Ledger) -> Result<T>) -> Result<T>;

    fn with_transaction<T>(&self, work: impl FnOnce(&mut dyn Ledger) -> Result<T>) -> Result<T>;
}
