use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveTime, TimeZone, Utc};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::delinquency::{DelinquencySweep, SweepReport};
use crate::errors::Result;
use crate::store::Repository;

/// first daily run strictly after `now`
pub fn next_run_after(now: DateTime<Utc>, run_at: NaiveTime) -> DateTime<Utc> {
    let today = Utc.from_utc_datetime(&now.date_naive().and_time(run_at));
    if today > now {
        today
    } else {
        today + Duration::days(1)
    }
}

/// runs the delinquency sweep once a day
pub struct SweepScheduler<R> {
    sweep: Arc<DelinquencySweep<R>>,
    run_at: NaiveTime,
}

impl<R> SweepScheduler<R>
where
    R: Repository + 'static,
{
    pub fn new(sweep: Arc<DelinquencySweep<R>>) -> Self {
        let run_at = sweep.config().run_at;
        Self { sweep, run_at }
    }

    pub fn run_at(&self) -> NaiveTime {
        self.run_at
    }

    /// sweep immediately on the calling thread
    pub fn run_now(&self) -> Result<SweepReport> {
        self.sweep.run_now()
    }

    /// spawn the daily loop on the current tokio runtime
    ///
    /// The loop ends when the handle is stopped or dropped. A sweep already
    /// running is allowed to finish.
    pub fn start(&self) -> SchedulerHandle {
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let sweep = Arc::clone(&self.sweep);
        let run_at = self.run_at;

        let task = tokio::spawn(async move {
            info!(%run_at, "delinquency scheduler started");
            loop {
                let now = Utc::now();
                let next_run = next_run_after(now, run_at);
                let wait = (next_run - now).to_std().unwrap_or_default();
                info!(%next_run, "next delinquency sweep scheduled");

                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = tokio::time::sleep(wait) => {}
                }

                let sweep = Arc::clone(&sweep);
                match tokio::task::spawn_blocking(move || sweep.run_now()).await {
                    Ok(Ok(report)) => info!(
                        scanned = report.scanned,
                        delinquent = report.delinquent,
                        failed = report.failed,
                        "scheduled sweep finished"
                    ),
                    Ok(Err(err)) => error!(error = %err, "scheduled sweep failed"),
                    Err(err) => error!(error = %err, "scheduled sweep task aborted"),
                }
            }
            info!("delinquency scheduler stopped");
        });

        SchedulerHandle {
            shutdown: Some(shutdown_tx),
            task,
        }
    }
}

/// handle to a running [`SweepScheduler`] loop
pub struct SchedulerHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// signal the loop and wait for it to exit
    pub async fn stop(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Err(err) = (&mut self.task).await {
            warn!(error = %err, "delinquency scheduler ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
