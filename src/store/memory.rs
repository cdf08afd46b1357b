use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use crate::errors::Result;
use crate::models::{Borrower, Installment, Loan, Payment};
use crate::money::Money;
use crate::types::{BorrowerId, InstallmentId, LoanId, LoanStatus};

use super::{Ledger, Repository, RepositoryError, StoreResult};

/// In-process tables backing [`MemoryRepository`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryTables {
    borrowers: HashMap<BorrowerId, Borrower>,
    loans: HashMap<LoanId, Loan>,
    /// per loan, ordered by sequence
    schedules: HashMap<LoanId, Vec<Installment>>,
    installment_owner: HashMap<InstallmentId, LoanId>,
    /// per loan, in insertion order
    payments: HashMap<LoanId, Vec<Payment>>,
}

impl MemoryTables {
    pub fn loan_count(&self) -> usize {
        self.loans.len()
    }

    pub fn payment_count(&self) -> usize {
        self.payments.values().map(Vec::len).sum()
    }

    fn installment_mut(&mut self, id: InstallmentId) -> StoreResult<&mut Installment> {
        let loan_id = self.installment_owner.get(&id).ok_or(RepositoryError::NotFound)?;
        self.schedules
            .get_mut(loan_id)
            .and_then(|schedule| schedule.iter_mut().find(|installment| installment.id == id))
            .ok_or(RepositoryError::NotFound)
    }

    fn loan_mut(&mut self, id: LoanId) -> StoreResult<&mut Loan> {
        self.loans.get_mut(&id).ok_or(RepositoryError::NotFound)
    }
}

impl Ledger for MemoryTables {
    fn borrower(&self, id: BorrowerId) -> StoreResult<Option<Borrower>> {
        Ok(self.borrowers.get(&id).cloned())
    }

    fn borrowers(&self) -> StoreResult<Vec<Borrower>> {
        let mut borrowers: Vec<Borrower> = self.borrowers.values().cloned().collect();
        borrowers.sort_by_key(|borrower| (borrower.created_at, borrower.id));
        Ok(borrowers)
    }

    fn delinquent_borrowers(&self) -> StoreResult<Vec<Borrower>> {
        Ok(self
            .borrowers()?
            .into_iter()
            .filter(|borrower| borrower.is_delinquent)
            .collect())
    }

    fn insert_borrower(&mut self, borrower: Borrower) -> StoreResult<()> {
        if self.borrowers.contains_key(&borrower.id) {
            return Err(RepositoryError::Conflict);
        }
        self.borrowers.insert(borrower.id, borrower);
        Ok(())
    }

    fn set_borrower_delinquent(&mut self, id: BorrowerId, delinquent: bool) -> StoreResult<()> {
        let borrower = self.borrowers.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        borrower.is_delinquent = delinquent;
        Ok(())
    }

    fn loan(&self, id: LoanId) -> StoreResult<Option<Loan>> {
        Ok(self.loans.get(&id).cloned())
    }

    fn loans_by_borrower(&self, borrower_id: BorrowerId) -> StoreResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .loans
            .values()
            .filter(|loan| loan.borrower_id == borrower_id)
            .cloned()
            .collect();
        loans.sort_by_key(|loan| (loan.created_at, loan.id));
        Ok(loans)
    }

    fn delinquency_candidates(&self, paid_since: DateTime<Utc>) -> StoreResult<Vec<Loan>> {
        let mut loans: Vec<Loan> = self
            .loans
            .values()
            .filter(|loan| loan.is_active())
            .filter(|loan| loan.last_payment_date.map_or(true, |paid_at| paid_at < paid_since))
            .cloned()
            .collect();
        loans.sort_by_key(|loan| (loan.created_at, loan.id));
        Ok(loans)
    }

    fn insert_loan(&mut self, loan: Loan) -> StoreResult<()> {
        if self.loans.contains_key(&loan.id) {
            return Err(RepositoryError::Conflict);
        }
        self.loans.insert(loan.id, loan);
        Ok(())
    }

    fn set_loan_status(&mut self, id: LoanId, status: LoanStatus) -> StoreResult<()> {
        self.loan_mut(id)?.status = status;
        Ok(())
    }

    fn set_loan_balance(&mut self, id: LoanId, balance: Money) -> StoreResult<()> {
        self.loan_mut(id)?.current_balance = balance;
        Ok(())
    }

    fn set_last_payment_date(&mut self, id: LoanId, paid_at: DateTime<Utc>) -> StoreResult<()> {
        self.loan_mut(id)?.last_payment_date = Some(paid_at);
        Ok(())
    }

    fn installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>> {
        Ok(self.schedules.get(&loan_id).cloned().unwrap_or_default())
    }

    fn unpaid_installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>> {
        Ok(self
            .installments(loan_id)?
            .into_iter()
            .filter(|installment| !installment.paid)
            .collect())
    }

    fn count_unpaid_installments(&self, loan_id: LoanId) -> StoreResult<usize> {
        Ok(self
            .schedules
            .get(&loan_id)
            .map_or(0, |schedule| schedule.iter().filter(|installment| !installment.paid).count()))
    }

    fn insert_installments(&mut self, installments: Vec<Installment>) -> StoreResult<()> {
        // validate the whole batch before touching any table
        for (index, installment) in installments.iter().enumerate() {
            if self.installment_owner.contains_key(&installment.id) {
                return Err(RepositoryError::Conflict);
            }
            let duplicate_in_batch = installments[..index].iter().any(|earlier| {
                earlier.id == installment.id
                    || (earlier.loan_id == installment.loan_id && earlier.sequence == installment.sequence)
            });
            let duplicate_in_table = self.schedules.get(&installment.loan_id).map_or(false, |schedule| {
                schedule.iter().any(|existing| existing.sequence == installment.sequence)
            });
            if duplicate_in_batch || duplicate_in_table {
                return Err(RepositoryError::Conflict);
            }
        }

        let mut touched: Vec<LoanId> = Vec::new();
        for installment in installments {
            if !touched.contains(&installment.loan_id) {
                touched.push(installment.loan_id);
            }
            self.installment_owner.insert(installment.id, installment.loan_id);
            self.schedules.entry(installment.loan_id).or_default().push(installment);
        }
        for loan_id in touched {
            if let Some(schedule) = self.schedules.get_mut(&loan_id) {
                schedule.sort_by_key(|installment| installment.sequence);
            }
        }
        Ok(())
    }

    fn set_installment_paid(&mut self, id: InstallmentId, paid: bool) -> StoreResult<()> {
        self.installment_mut(id)?.paid = paid;
        Ok(())
    }

    fn payments(&self, loan_id: LoanId) -> StoreResult<Vec<Payment>> {
        Ok(self.payments.get(&loan_id).cloned().unwrap_or_default())
    }

    fn insert_payment(&mut self, payment: Payment) -> StoreResult<()> {
        let ledger = self.payments.entry(payment.loan_id).or_default();
        if ledger.iter().any(|existing| existing.id == payment.id) {
            return Err(RepositoryError::Conflict);
        }
        ledger.push(payment);
        Ok(())
    }
}

/// Mutex-guarded in-memory repository.
///
/// Units of work are serialized. Each write made inside a transaction logs
/// its inverse, and the log is replayed newest first when the work fails.
#[derive(Debug, Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<MemoryTables>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// copy of the current committed state
    pub fn snapshot(&self) -> StoreResult<MemoryTables> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryTables>> {
        self.tables
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl Repository for MemoryRepository {
    fn read<T>(&self, work: impl FnOnce(&dyn Ledger) -> Result<T>) -> Result<T> {
        let guard = self.lock()?;
        work(&*guard)
    }

    fn with_transaction<T>(&self, work: impl FnOnce(&mut dyn Ledger) -> Result<T>) -> Result<T> {
        let mut guard = self.lock()?;
        let mut transaction = Transaction {
            tables: &mut guard,
            undo: Vec::new(),
            committed: false,
        };

        let output = work(&mut transaction);
        transaction.committed = output.is_ok();
        output
    }
}

/// inverse of one committed write
#[derive(Debug)]
enum Undo {
    RemoveBorrower(BorrowerId),
    BorrowerDelinquent(BorrowerId, bool),
    RemoveLoan(LoanId),
    RestoreLoan(Box<Loan>),
    RemoveInstallments(Vec<InstallmentId>),
    InstallmentPaid(InstallmentId, bool),
    PopPayment(LoanId),
}

impl MemoryTables {
    fn revert(&mut self, undo: Undo) {
        match undo {
            Undo::RemoveBorrower(id) => {
                self.borrowers.remove(&id);
            }
            Undo::BorrowerDelinquent(id, previous) => {
                if let Some(borrower) = self.borrowers.get_mut(&id) {
                    borrower.is_delinquent = previous;
                }
            }
            Undo::RemoveLoan(id) => {
                self.loans.remove(&id);
            }
            Undo::RestoreLoan(loan) => {
                self.loans.insert(loan.id, *loan);
            }
            Undo::RemoveInstallments(ids) => {
                for id in ids {
                    let Some(loan_id) = self.installment_owner.remove(&id) else {
                        continue;
                    };
                    if let Some(schedule) = self.schedules.get_mut(&loan_id) {
                        schedule.retain(|installment| installment.id != id);
                        if schedule.is_empty() {
                            self.schedules.remove(&loan_id);
                        }
                    }
                }
            }
            Undo::InstallmentPaid(id, previous) => {
                if let Ok(installment) = self.installment_mut(id) {
                    installment.paid = previous;
                }
            }
            Undo::PopPayment(loan_id) => {
                if let Some(ledger) = self.payments.get_mut(&loan_id) {
                    ledger.pop();
                    if ledger.is_empty() {
                        self.payments.remove(&loan_id);
                    }
                }
            }
        }
    }
}

/// ledger handed to a unit of work, logging how to undo each write
///
/// Rolls back on drop unless the work committed, which also covers a panic
/// inside the work.
struct Transaction<'a> {
    tables: &'a mut MemoryTables,
    undo: Vec<Undo>,
    committed: bool,
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.committed {
            self.rollback();
        }
    }
}

impl Transaction<'_> {
    fn rollback(&mut self) {
        while let Some(undo) = self.undo.pop() {
            self.tables.revert(undo);
        }
    }

    fn update_loan(
        &mut self,
        id: LoanId,
        write: impl FnOnce(&mut MemoryTables) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let previous = self.tables.loans.get(&id).cloned().ok_or(RepositoryError::NotFound)?;
        write(&mut *self.tables)?;
        self.undo.push(Undo::RestoreLoan(Box::new(previous)));
        Ok(())
    }
}

impl Ledger for Transaction<'_> {
    fn borrower(&self, id: BorrowerId) -> StoreResult<Option<Borrower>> {
        self.tables.borrower(id)
    }

    fn borrowers(&self) -> StoreResult<Vec<Borrower>> {
        self.tables.borrowers()
    }

    fn delinquent_borrowers(&self) -> StoreResult<Vec<Borrower>> {
        self.tables.delinquent_borrowers()
    }

    fn insert_borrower(&mut self, borrower: Borrower) -> StoreResult<()> {
        let id = borrower.id;
        self.tables.insert_borrower(borrower)?;
        self.undo.push(Undo::RemoveBorrower(id));
        Ok(())
    }

    fn set_borrower_delinquent(&mut self, id: BorrowerId, delinquent: bool) -> StoreResult<()> {
        let previous = self
            .tables
            .borrowers
            .get(&id)
            .map(|borrower| borrower.is_delinquent)
            .ok_or(RepositoryError::NotFound)?;
        self.tables.set_borrower_delinquent(id, delinquent)?;
        self.undo.push(Undo::BorrowerDelinquent(id, previous));
        Ok(())
    }

    fn loan(&self, id: LoanId) -> StoreResult<Option<Loan>> {
        self.tables.loan(id)
    }

    fn loans_by_borrower(&self, borrower_id: BorrowerId) -> StoreResult<Vec<Loan>> {
        self.tables.loans_by_borrower(borrower_id)
    }

    fn delinquency_candidates(&self, paid_since: DateTime<Utc>) -> StoreResult<Vec<Loan>> {
        self.tables.delinquency_candidates(paid_since)
    }

    fn insert_loan(&mut self, loan: Loan) -> StoreResult<()> {
        let id = loan.id;
        self.tables.insert_loan(loan)?;
        self.undo.push(Undo::RemoveLoan(id));
        Ok(())
    }

    fn set_loan_status(&mut self, id: LoanId, status: LoanStatus) -> StoreResult<()> {
        self.update_loan(id, |tables| tables.set_loan_status(id, status))
    }

    fn set_loan_balance(&mut self, id: LoanId, balance: Money) -> StoreResult<()> {
        self.update_loan(id, |tables| tables.set_loan_balance(id, balance))
    }

    fn set_last_payment_date(&mut self, id: LoanId, paid_at: DateTime<Utc>) -> StoreResult<()> {
        self.update_loan(id, |tables| tables.set_last_payment_date(id, paid_at))
    }

    fn installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>> {
        self.tables.installments(loan_id)
    }

    fn unpaid_installments(&self, loan_id: LoanId) -> StoreResult<Vec<Installment>> {
        self.tables.unpaid_installments(loan_id)
    }

    fn count_unpaid_installments(&self, loan_id: LoanId) -> StoreResult<usize> {
        self.tables.count_unpaid_installments(loan_id)
    }

    fn insert_installments(&mut self, installments: Vec<Installment>) -> StoreResult<()> {
        let ids = installments.iter().map(|installment| installment.id).collect();
        self.tables.insert_installments(installments)?;
        self.undo.push(Undo::RemoveInstallments(ids));
        Ok(())
    }

    fn set_installment_paid(&mut self, id: InstallmentId, paid: bool) -> StoreResult<()> {
        let previous = self.tables.installment_mut(id)?.paid;
        self.tables.set_installment_paid(id, paid)?;
        self.undo.push(Undo::InstallmentPaid(id, previous));
        Ok(())
    }

    fn payments(&self, loan_id: LoanId) -> StoreResult<Vec<Payment>> {
        self.tables.payments(loan_id)
    }

    fn insert_payment(&mut self, payment: Payment) -> StoreResult<()> {
        let loan_id = payment.loan_id;
        self.tables.insert_payment(payment)?;
        self.undo.push(Undo::PopPayment(loan_id));
        Ok(())
    }
}
