use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use hourglass_rs::{SafeTimeProvider, TimeSource};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::SweepConfig;
use crate::errors::Result;
use crate::service::LoanService;
use crate::store::Repository;

/// counts gathered by one sweep
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub as_of: DateTime<Utc>,
    /// candidates visited, including the ones that failed
    pub scanned: usize,
    pub delinquent: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// batch re-evaluation of delinquency across loans that look overdue
///
/// A loan whose check fails is logged and skipped; the sweep carries on with
/// the rest.
pub struct DelinquencySweep<R> {
    service: Arc<LoanService<R>>,
    config: SweepConfig,
}

impl<R> DelinquencySweep<R>
where
    R: Repository,
{
    pub fn new(service: Arc<LoanService<R>>, config: SweepConfig) -> Self {
        Self { service, config }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    /// sweep as of the system clock
    pub fn run_now(&self) -> Result<SweepReport> {
        let time = SafeTimeProvider::new(TimeSource::System);
        self.sweep(time.now())
    }

    pub fn sweep(&self, as_of: DateTime<Utc>) -> Result<SweepReport> {
        let started = Instant::now();
        info!(%as_of, "running delinquency sweep");

        let paid_since = as_of - self.config.lookback;
        let candidates = self.service.delinquency_candidates(paid_since)?;
        let total = candidates.len();
        info!(candidates = total, %paid_since, "found loans that may be delinquent");

        let batch_size = self.config.batch_size.max(1);
        let mut scanned = 0;
        let mut delinquent = 0;
        let mut failed = 0;

        for (index, batch) in candidates.chunks(batch_size).enumerate() {
            let first = index * batch_size;
            debug!(from = first, to = first + batch.len() - 1, total, "processing batch");

            for loan in batch {
                scanned += 1;
                match self.service.check_delinquent_at(loan.id, as_of) {
                    Ok(true) => {
                        delinquent += 1;
                        debug!(loan_id = %loan.id, "loan is delinquent");
                    }
                    Ok(false) => {}
                    Err(err) => {
                        failed += 1;
                        warn!(loan_id = %loan.id, error = %err, "delinquency check failed, skipping loan");
                    }
                }
            }

            if first + batch.len() < total && !self.config.batch_pause.is_zero() {
                std::thread::sleep(self.config.batch_pause);
            }
        }

        let report = SweepReport {
            as_of,
            scanned,
            delinquent,
            failed,
            elapsed: started.elapsed(),
        };
        info!(
            scanned = report.scanned,
            delinquent = report.delinquent,
            failed = report.failed,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "delinquency sweep completed"
        );

        Ok(report)
    }
}
