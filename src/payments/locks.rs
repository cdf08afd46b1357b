use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::types::LoanId;

/// per-loan mutual exclusion for payment units of work
///
/// Payments on the same loan run one at a time; payments on different loans
/// never wait on each other. Entries are dropped once no caller holds them.
#[derive(Debug, Default)]
pub struct LoanLocks {
    locks: Mutex<HashMap<LoanId, Arc<Mutex<()>>>>,
}

impl LoanLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// run `work` while holding the lock for `loan_id`
    pub fn with_lock<T>(&self, loan_id: LoanId, work: impl FnOnce() -> T) -> T {
        let entry = self.register(loan_id);
        let _guard = entry.lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        work()
    }

    fn register(&self, loan_id: LoanId) -> Registration<'_> {
        let mut locks = self.map();
        let lock = Arc::clone(locks.entry(loan_id).or_default());
        Registration {
            locks: self,
            loan_id,
            lock,
        }
    }

    fn map(&self) -> MutexGuard<'_, HashMap<LoanId, Arc<Mutex<()>>>> {
        self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// loans with a lock currently registered
    pub fn tracked(&self) -> usize {
        self.map().len()
    }
}

/// one caller's claim on a loan lock, pruned from the registry on drop even
/// when the work panicked
struct Registration<'a> {
    locks: &'a LoanLocks,
    loan_id: LoanId,
    lock: Arc<Mutex<()>>,
}

impl Drop for Registration<'_> {
    fn drop(&mut self) {
        let mut locks = self.locks.map();
        // map + this caller
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.loan_id);
        }
    }
}
