pub mod config;
pub mod delinquency;
pub mod errors;
pub mod events;
pub mod models;
pub mod money;
pub mod payments;
pub mod schedule;
pub mod scheduler;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod views;

#[cfg(test)]
mod testing;

// re-export key types
pub use config::{BillingConfig, ConfigError, DelinquencyConfig, SweepConfig, TelemetryConfig};
pub use delinquency::{DelinquencyEvaluator, DelinquencySweep, DelinquencyVerdict, SweepReport};
pub use errors::{BillingError, Result};
pub use events::{Event, EventStore};
pub use models::{Borrower, Installment, Loan, Payment};
pub use money::{Money, Rate};
pub use payments::{DelinquencyCheck, LoanLocks, PaymentOutcome, PaymentProcessor};
pub use schedule::{AmortizationCalculator, LoanTerms, ScheduleGenerator};
pub use scheduler::{next_run_after, SchedulerHandle, SweepScheduler};
pub use service::LoanService;
pub use store::{Ledger, MemoryRepository, Repository, RepositoryError};
pub use telemetry::TelemetryError;
pub use types::{BorrowerId, InstallmentId, LoanId, LoanStatus, PaymentId};
pub use views::LoanView;

// re-export external dependencies that users will need
pub use chrono;
pub use hourglass_rs::{SafeTimeProvider, TimeSource};
pub use rust_decimal::Decimal;
pub use uuid::Uuid;
