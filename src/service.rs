use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use hourglass_rs::SafeTimeProvider;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::BillingConfig;
use crate::delinquency::DelinquencyEvaluator;
use crate::errors::{BillingError, Result};
use crate::events::{Event, EventStore};
use crate::models::{Borrower, Loan};
use crate::money::{Money, Rate};
use crate::payments::{PaymentOutcome, PaymentProcessor};
use crate::schedule::{LoanTerms, ScheduleGenerator};
use crate::store::Repository;
use crate::types::{BorrowerId, LoanId, LoanStatus};
use crate::views::LoanView;

/// entry point for borrowers, loans, payments and delinquency checks
///
/// Events from committed operations are collected in a bounded in-process
/// journal drained with [`LoanService::take_events`]. When nobody drains it
/// the oldest events are dropped.
pub struct LoanService<R> {
    repository: Arc<R>,
    processor: PaymentProcessor<R>,
    events: Mutex<EventStore>,
}

impl<R> LoanService<R>
where
    R: Repository,
{
    pub fn new(repository: Arc<R>) -> Self {
        Self::with_evaluator(repository, DelinquencyEvaluator::default())
    }

    pub fn with_evaluator(repository: Arc<R>, evaluator: DelinquencyEvaluator) -> Self {
        Self {
            processor: PaymentProcessor::new(Arc::clone(&repository), evaluator),
            repository,
            events: Mutex::new(EventStore::new()),
        }
    }

    pub fn from_config(repository: Arc<R>, config: &BillingConfig) -> Self {
        Self::with_evaluator(
            repository,
            DelinquencyEvaluator::new(config.delinquency.streak_threshold),
        )
        .with_event_capacity(config.event_capacity)
    }

    /// replace the journal with an empty one holding at most `capacity` events
    pub fn with_event_capacity(self, capacity: usize) -> Self {
        Self {
            events: Mutex::new(EventStore::with_capacity(capacity)),
            ..self
        }
    }

    pub fn repository(&self) -> &Arc<R> {
        &self.repository
    }

    // borrowers

    pub fn create_borrower(
        &self,
        name: impl Into<String>,
        contact_info: impl Into<String>,
        time_provider: &SafeTimeProvider,
    ) -> Result<Borrower> {
        let borrower = Borrower::new(name, contact_info, time_provider.now());
        self.repository
            .with_transaction(|ledger| Ok(ledger.insert_borrower(borrower.clone())?))?;

        info!(borrower_id = %borrower.id, "borrower registered");
        self.record([Event::BorrowerRegistered {
            borrower_id: borrower.id,
            timestamp: borrower.created_at,
        }]);
        Ok(borrower)
    }

    pub fn get_borrower(&self, id: BorrowerId) -> Result<Borrower> {
        self.repository
            .read(|ledger| ledger.borrower(id)?.ok_or(BillingError::BorrowerNotFound { id }))
    }

    pub fn list_borrowers(&self) -> Result<Vec<Borrower>> {
        self.repository.read(|ledger| Ok(ledger.borrowers()?))
    }

    pub fn delinquent_borrowers(&self) -> Result<Vec<Borrower>> {
        self.repository.read(|ledger| Ok(ledger.delinquent_borrowers()?))
    }

    pub fn borrower_loans(&self, borrower_id: BorrowerId) -> Result<Vec<Loan>> {
        self.repository.read(|ledger| {
            ledger
                .borrower(borrower_id)?
                .ok_or(BillingError::BorrowerNotFound { id: borrower_id })?;
            Ok(ledger.loans_by_borrower(borrower_id)?)
        })
    }

    // loans

    /// issue a loan starting now, together with its full schedule
    ///
    /// Terms are validated before the borrower is looked up.
    pub fn create_loan(
        &self,
        borrower_id: BorrowerId,
        principal: Money,
        annual_rate: Rate,
        term_weeks: u32,
        time_provider: &SafeTimeProvider,
    ) -> Result<Loan> {
        let terms = LoanTerms::new(principal, annual_rate, term_weeks)?;
        let now = time_provider.now();

        let loan = Loan {
            id: Uuid::new_v4(),
            borrower_id,
            principal,
            interest_rate: annual_rate,
            term_weeks,
            start_date: now,
            status: LoanStatus::Active,
            total_due: terms.total_due(),
            current_balance: terms.total_due(),
            last_payment_date: None,
            created_at: now,
        };
        let schedule = ScheduleGenerator::generate(&loan)?;

        self.repository.with_transaction(|ledger| {
            ledger
                .borrower(borrower_id)?
                .ok_or(BillingError::BorrowerNotFound { id: borrower_id })?;
            ledger.insert_loan(loan.clone())?;
            ledger.insert_installments(schedule)?;
            Ok(())
        })?;

        info!(
            loan_id = %loan.id,
            %borrower_id,
            %principal,
            rate = %annual_rate,
            term_weeks,
            total_due = %terms.total_due(),
            weekly = %terms.weekly_installment(),
            "loan issued"
        );
        if !terms.rounding_loss().is_zero() {
            debug!(loan_id = %loan.id, loss = %terms.rounding_loss(), "weekly installment truncation");
        }

        self.record([Event::LoanIssued {
            loan_id: loan.id,
            borrower_id,
            principal,
            total_due: terms.total_due(),
            weekly_installment: terms.weekly_installment(),
            term_weeks,
            timestamp: now,
        }]);
        Ok(loan)
    }

    pub fn get_loan(&self, id: LoanId) -> Result<Loan> {
        self.repository
            .read(|ledger| ledger.loan(id)?.ok_or(BillingError::LoanNotFound { id }))
    }

    /// loan with its schedule and payment ledger
    pub fn loan_view(&self, id: LoanId) -> Result<LoanView> {
        self.repository.read(|ledger| {
            let loan = ledger.loan(id)?.ok_or(BillingError::LoanNotFound { id })?;
            let installments = ledger.installments(id)?;
            let payments = ledger.payments(id)?;
            Ok(LoanView::from_parts(&loan, installments, payments))
        })
    }

    /// current balance, possibly non-zero on a closed loan
    pub fn get_outstanding(&self, loan_id: LoanId) -> Result<Money> {
        Ok(self.get_loan(loan_id)?.current_balance)
    }

    /// delinquency as of now; may raise the borrower flag, never clears it
    pub fn check_delinquent(&self, loan_id: LoanId, time_provider: &SafeTimeProvider) -> Result<bool> {
        self.check_delinquent_at(loan_id, time_provider.now())
    }

    pub fn check_delinquent_at(&self, loan_id: LoanId, as_of: DateTime<Utc>) -> Result<bool> {
        let check = self.processor.check_delinquency(loan_id, as_of)?;
        self.record(check.event());
        Ok(check.verdict.delinquent)
    }

    pub fn apply_payment(
        &self,
        loan_id: LoanId,
        amount: Money,
        time_provider: &SafeTimeProvider,
    ) -> Result<PaymentOutcome> {
        let outcome = self.processor.apply(loan_id, amount, time_provider)?;
        self.record(outcome.events());
        Ok(outcome)
    }

    /// active loans with no payment at or after `paid_since`
    pub fn delinquency_candidates(&self, paid_since: DateTime<Utc>) -> Result<Vec<Loan>> {
        self.repository
            .read(|ledger| Ok(ledger.delinquency_candidates(paid_since)?))
    }

    // events

    pub fn take_events(&self) -> Vec<Event> {
        self.journal().take_events()
    }

    /// events discarded from the journal since it was last drained
    pub fn dropped_events(&self) -> u64 {
        self.journal().dropped()
    }

    fn record(&self, events: impl IntoIterator<Item = Event>) {
        let mut journal = self.journal();
        let dropped = journal.dropped();
        journal.extend(events);
        if dropped == 0 && journal.dropped() > 0 {
            warn!(capacity = journal.capacity(), "event journal full, dropping oldest events");
        }
    }

    fn journal(&self) -> MutexGuard<'_, EventStore> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use hourglass_rs::TimeSource;
    use rust_decimal_macros::dec;

    use crate::store::MemoryRepository;
    use crate::testing::{Fault, FaultyRepository};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    }

    fn setup() -> (LoanService<MemoryRepository>, SafeTimeProvider, Borrower) {
        let service = LoanService::new(Arc::new(MemoryRepository::new()));
        let time = SafeTimeProvider::new(TimeSource::Test(start()));
        let borrower = service.create_borrower("Budi", "+62 812 0000 0000", &time).unwrap();
        (service, time, borrower)
    }

    #[test]
    fn test_create_loan_persists_schedule() {
        let (service, time, borrower) = setup();

        let loan = service
            .create_loan(borrower.id, Money::from_minor(5_000_000), Rate::from_percentage(dec!(10)), 50, &time)
            .unwrap();

        assert_eq!(loan.total_due, Money::from_minor(5_480_769));
        assert_eq!(service.get_outstanding(loan.id).unwrap(), Money::from_minor(5_480_769));

        let view = service.loan_view(loan.id).unwrap();
        assert_eq!(view.schedule.installments.len(), 50);
        assert_eq!(view.schedule.next_due_date, Some(start() + Duration::weeks(1)));
        assert_eq!(view.financial.weekly_installment, Money::from_minor(109_615));
        assert_eq!(service.borrower_loans(borrower.id).unwrap(), vec![loan]);
    }

    #[test]
    fn test_invalid_terms_are_rejected_before_borrower_lookup() {
        let (service, time, _) = setup();
        let unknown = Uuid::new_v4();

        let result = service.create_loan(unknown, Money::ZERO, Rate::ZERO, 10, &time);
        assert!(matches!(result, Err(BillingError::InvalidLoanTerms { .. })));

        let result = service.create_loan(unknown, Money::from_minor(1_000), Rate::ZERO, 10, &time);
        assert!(matches!(result, Err(BillingError::BorrowerNotFound { id }) if id == unknown));
    }

    #[test]
    fn test_loan_for_unknown_borrower_writes_nothing() {
        let (service, time, _) = setup();
        let before = service.repository().snapshot().unwrap();

        let result = service.create_loan(Uuid::new_v4(), Money::from_minor(1_000), Rate::ZERO, 4, &time);

        assert!(result.is_err());
        assert_eq!(service.repository().snapshot().unwrap(), before);
    }

    #[test]
    fn test_schedule_beyond_date_range_is_invalid_terms() {
        let service = LoanService::new(Arc::new(MemoryRepository::new()));
        let time = SafeTimeProvider::new(TimeSource::Test(DateTime::<Utc>::MAX_UTC - Duration::days(3)));
        let borrower = service.create_borrower("Wati", "wati@example.com", &time).unwrap();
        service.take_events();

        let result = service.create_loan(borrower.id, Money::from_minor(1_000), Rate::ZERO, 2, &time);

        assert!(matches!(result, Err(BillingError::InvalidLoanTerms { .. })));
        assert_eq!(service.repository().snapshot().unwrap().loan_count(), 0);
        assert!(service.take_events().is_empty());
    }

    #[test]
    fn test_failed_schedule_insert_leaves_no_loan() {
        let inner = MemoryRepository::new();
        let time = SafeTimeProvider::new(TimeSource::Test(start()));
        let borrower = LoanService::new(Arc::new(inner.clone()))
            .create_borrower("Dewi", "dewi@example.com", &time)
            .unwrap();
        let service = LoanService::new(Arc::new(FaultyRepository::new(inner.clone(), Fault::InsertInstallments)));

        let result = service.create_loan(borrower.id, Money::from_minor(1_000), Rate::ZERO, 4, &time);

        assert!(matches!(result, Err(BillingError::PersistenceFailure(_))));
        assert_eq!(inner.snapshot().unwrap().loan_count(), 0);
        assert!(service.take_events().is_empty());
    }

    #[test]
    fn test_lookups_of_missing_rows() {
        let (service, _, _) = setup();
        let missing = Uuid::new_v4();

        assert!(matches!(service.get_loan(missing), Err(BillingError::LoanNotFound { .. })));
        assert!(matches!(service.get_outstanding(missing), Err(BillingError::LoanNotFound { .. })));
        assert!(matches!(service.loan_view(missing), Err(BillingError::LoanNotFound { .. })));
        assert!(matches!(service.get_borrower(missing), Err(BillingError::BorrowerNotFound { .. })));
        assert!(matches!(
            service.check_delinquent_at(missing, start()),
            Err(BillingError::LoanNotFound { .. })
        ));
    }

    #[test]
    fn test_missed_weeks_then_catch_up() {
        let (service, time, borrower) = setup();
        let control = time.test_control().unwrap();
        let loan = service
            .create_loan(borrower.id, Money::from_minor(1_000_000), Rate::ZERO, 10, &time)
            .unwrap();

        control.advance(Duration::weeks(2) + Duration::days(1));
        assert!(service.check_delinquent(loan.id, &time).unwrap());
        assert_eq!(service.delinquent_borrowers().unwrap().len(), 1);

        service.apply_payment(loan.id, Money::from_minor(100_000), &time).unwrap();
        assert!(!service.get_borrower(borrower.id).unwrap().is_delinquent);
        assert!(!service.check_delinquent(loan.id, &time).unwrap());

        assert_eq!(
            service.get_outstanding(loan.id).unwrap(),
            Money::from_minor(900_000)
        );
    }

    #[test]
    fn test_events_follow_commits() {
        let (service, time, borrower) = setup();
        let control = time.test_control().unwrap();
        let loan = service
            .create_loan(borrower.id, Money::from_minor(1_000), Rate::ZERO, 2, &time)
            .unwrap();

        assert!(service.apply_payment(loan.id, Money::from_minor(1), &time).is_err());

        control.advance(Duration::days(3));
        service.apply_payment(loan.id, Money::from_minor(500), &time).unwrap();
        service.apply_payment(loan.id, Money::from_minor(500), &time).unwrap();

        let events = service.take_events();
        let kinds: Vec<&str> = events
            .iter()
            .map(|event| match event {
                Event::BorrowerRegistered { .. } => "borrower",
                Event::LoanIssued { .. } => "issued",
                Event::PaymentApplied { .. } => "payment",
                Event::LoanClosed { .. } => "closed",
                Event::DelinquencyChanged { .. } => "delinquency",
            })
            .collect();

        assert_eq!(kinds, vec!["borrower", "issued", "payment", "payment", "closed"]);
        assert!(service.take_events().is_empty());
        assert_eq!(service.get_loan(loan.id).unwrap().status, LoanStatus::Closed);
    }

    #[test]
    fn test_threshold_from_config() {
        let mut config = BillingConfig::default();
        config.delinquency.streak_threshold = 3;
        let service = LoanService::from_config(Arc::new(MemoryRepository::new()), &config);
        let time = SafeTimeProvider::new(TimeSource::Test(start()));
        let borrower = service.create_borrower("Sari", "sari@example.com", &time).unwrap();
        let loan = service
            .create_loan(borrower.id, Money::from_minor(1_000), Rate::ZERO, 5, &time)
            .unwrap();

        let two_missed = start() + Duration::weeks(2) + Duration::hours(1);
        assert!(!service.check_delinquent_at(loan.id, two_missed).unwrap());

        let three_missed = start() + Duration::weeks(3) + Duration::hours(1);
        assert!(service.check_delinquent_at(loan.id, three_missed).unwrap());
    }
}
