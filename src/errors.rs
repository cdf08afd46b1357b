use thiserror::Error;

use crate::money::Money;
use crate::store::RepositoryError;
use crate::types::{BorrowerId, LoanId};

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("invalid loan terms: {message}")]
    InvalidLoanTerms {
        message: String,
    },

    #[error("borrower not found: {id}")]
    BorrowerNotFound {
        id: BorrowerId,
    },

    #[error("loan not found: {id}")]
    LoanNotFound {
        id: LoanId,
    },

    #[error("no outstanding installments for loan {loan_id}")]
    NoOutstandingInstallments {
        loan_id: LoanId,
    },

    #[error("payment amount mismatch: expected {expected}, provided {provided}")]
    AmountMismatch {
        expected: Money,
        provided: Money,
    },

    #[error("persistence failure: {0}")]
    PersistenceFailure(#[from] RepositoryError),
}

impl BillingError {
    pub(crate) fn invalid_terms(message: impl Into<String>) -> Self {
        BillingError::InvalidLoanTerms {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BillingError>;
