//! Shared fixtures for unit tests.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::Result;
use crate::models::{Borrower, Installment, Loan, Payment};
use crate::money::{Money, Rate};
use crate::schedule::{LoanTerms, ScheduleGenerator};
use crate::store::{Ledger, MemoryRepository, Repository, RepositoryError, StoreResult};
use crate::types::{BorrowerId, InstallmentId, LoanId, LoanStatus};

/// insert a borrower, an active loan and its schedule starting at `start`
pub(crate) fn fixture_loan<R: Repository>(
    repository: &R,
    principal: Money,
    rate: Rate,
    term_weeks: u32,
    start: DateTime<Utc>,
) -> Loan {
    let terms = LoanTerms::new(principal, rate, term_weeks).unwrap();
    let borrower = Borrower::new("Test Borrower", "borrower@example.com", start);
    let loan = Loan {
        id: Uuid::new_v4(),
        borrower_id: borrower.id,
        principal,
        interest_rate: rate,
        term_weeks,
        start_date: start,
        status: LoanStatus::Active,
        total_due: terms.total_due(),
        current_balance: terms.total_due(),
        last_payment_date: None,
        created_at: start,
    };
    let schedule = ScheduleGenerator::generate(&loan).unwrap();

    repository
        .with_transaction(|ledger| {
            ledger.insert_borrower(borrower)?;
            ledger.insert_loan(loan.clone())?;
            ledger.insert_installments(schedule)?;
            Ok(())
        })
        .unwrap();
    loan
}

/// ledger operation that should fail
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    InsertPayment,
    SetInstallmentPaid,
    SetLoanBalance,
    SetLastPaymentDate,
    SetLoanStatus,
    SetBorrowerDelinquent,
    InsertInstallments,
    /// reading the schedule of one specific loan
    InstallmentsFor(LoanId),
}

/// memory repository whose ledger fails on one operation
pub(crate) struct FaultyRepository {
    inner: MemoryRepository,
    fault: Fault,
}

impl FaultyRepository {
    pub(crate) fn new(inner: MemoryRepository, fault: Fault) -> Self {
        Self { inner, fault }
    }
}

impl Repository for FaultyRepository {
    fn read<T>(&self, work: impl FnOnce(&dyn Ledger) -> Result<T>) -> Result<T> {
        self.inner.read(|ledger| {
            let faulty = FaultyLedger {
                access: Access::Read(ledger),
                fault: self.fault,
            };
            work(&faulty)
        })
    }

    fn with_transaction<T>(&self, work: impl FnOnce(&mut dyn Ledger) -> Result<T>) -> Result<T> {
        self.inner.with_transaction(|ledger| {
            let mut faulty = FaultyLedger {
                access: Access::Write(ledger),
                fault: self.fault,
            };
            work(&mut faulty)
        })
    }
}

enum Access<'a> {
    Read(&'a dyn Ledger),
    Write(&'a mut dyn Ledger),
}

struct FaultyLedger<'a> {
    access: Access<'a>,
    fault: Fault,
}

impl<'a> FaultyLedger<'a> {
    fn check(&self, operation: Fault) -> StoreResult<()> {
        if operation == self.fault {
            return Err(RepositoryError::Unavailable(format!("injected failure on {:?}", operation)));
        }
        Ok(())
    }

    fn get(&self) -> &(dyn Ledger + 'a) {
        match &self.access {
            Access::Read(ledger) => *ledger,
            Access::Write(ledger) => &**ledger,
        }
    }

    fn get_mut(&mut self) -> StoreResult<&mut (dyn Ledger + 'a)> {
        match &mut self.access {
            Access::Read(_) => Err(RepositoryError::Unavailable("read-only ledger".to_string())),
            Access::Write(ledger) => Ok(&mut **ledger),
        }
    }
}

impl<'a> Ledger for FaultyLedger<'a> {
    fn borrower(&self, id: BorrowerId) -> StoreResult<Option<Borrower>> {
        self.get().borrower(id)
    }

    fn borrowers(&self) -> StoreResult<Vec<Borrower>> {
        self.get().borrowers()
    }

    fn delinquent_borrowers(&self) -> StoreResult<Vec<Borrower>> {
        self.get().delinquent_borrowers()
    }

    fn insert_borrower(&mut self, borrower: Borrower) -> StoreResult<()> {
        self.get_mut()?.insert_borrower(borrower)
    }

    fn set_borrower_delinquent(&mut self, id: BorrowerId, delinquent: bool) -> StoreResult<()> {
        self.check(Fault::SetBorrowerDelinquent)?;
        self.get_mut()?.set_borrower_delinquent(id, delinquent)
    }

    fn loan(&self, id: LoanId) -> StoreResult<Option<Loan>> {
        self.get().loan(id)
    }

    fn loans_by_borrower(&self, borrower_id: BorrowerId) -> StoreResult<Vec<Loan>> {
        self.get().loans_by_borrower(borrower_id)
    }

    fn delinquency_candidates(&self, paid_since: DateTime<Utc>) -> StoreResult<Vec<Loan>> {
        self.get().delinquency_candidates(paid_since)
    }

    fn insert_loan(&mut self, loan: Loan) -> StoreResult<()> {
        self.get_mut()?.insert_loan(loan)
    }

    fn set_loan_status(&mut self, id: LoanId, status: LoanStatus) -> StoreResult<()> {
        self.check(Fault::SetLoanStatus)?;
        self.get_mut()?.set_loan_status(id, status)
    }

    fn set_loan_balance(&mut self, id: LoanId, balance: Money) -> StoreResult<()> {
        self.check(Fault::SetLoanBalance)?;
        self.get_mut()?.set_loan_balance(id, balance)
    }

    fn set_last_payment_date(&mut self, id: LoanId, paid_at: DateTime<Utc>) -> StoreResult<()> {
        self.check(Fault::SetLastPaymentDate)?;
        self.get_mut()?.set_last_payment_date(id, paid_at)
    }

    fn installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>> {
        self.check(Fault::InstallmentsFor(loan_id))?;
        self.get().installments(loan_id)
    }

    fn unpaid_installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>> {
        self.get().unpaid_installments(loan_id)
    }

    fn count_unpaid_installments(&self, loan_id: LoanId) -> StoreResult<usize> {
        self.get().count_unpaid_installments(loan_id)
    }

    fn insert_installments(&mut self, installments: Vec<Installment>) -> StoreResult<()> {
        self.check(Fault::InsertInstallments)?;
        self.get_mut()?.insert_installments(installments)
    }

    fn set_installment_paid(&mut self, id: InstallmentId, paid: bool) -> StoreResult<()> {
        self.check(Fault::SetInstallmentPaid)?;
        self.get_mut()?.set_installment_paid(id, paid)
    }

    fn payments(&self, loan_id: LoanId) -> StoreResult<Vec<Payment>> {
        self.get().payments(loan_id)
    }

    fn insert_payment(&mut self, payment: Payment) -> StoreResult<()> {
        self.check(Fault::InsertPayment)?;
        self.get_mut()?.insert_payment(payment)
    }
}
