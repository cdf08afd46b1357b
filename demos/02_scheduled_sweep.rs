/// scheduled sweep - config, tracing and the daily delinquency run
use std::sync::Arc;

use chrono::{Duration, Utc};
use loan_billing_rs::{
    telemetry, BillingConfig, DelinquencySweep, LoanService, MemoryRepository, Money, Rate, SafeTimeProvider,
    SweepScheduler, TimeSource,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = BillingConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let repository = Arc::new(MemoryRepository::new());
    let service = Arc::new(LoanService::from_config(Arc::clone(&repository), &config));

    // loans issued three weeks ago, nobody has paid
    let issued = SafeTimeProvider::new(TimeSource::Test(Utc::now() - Duration::weeks(3)));
    for name in ["Agus", "Rina", "Wayan"] {
        let borrower = service.create_borrower(name, format!("{}@example.com", name.to_lowercase()), &issued)?;
        service.create_loan(borrower.id, Money::from_minor(500_000), Rate::ZERO, 10, &issued)?;
    }

    let sweep = Arc::new(DelinquencySweep::new(Arc::clone(&service), config.sweep.clone()));
    let scheduler = SweepScheduler::new(Arc::clone(&sweep));
    let handle = scheduler.start();

    // the daily run is hours away, so sweep once by hand
    let report = tokio::task::spawn_blocking(move || sweep.run_now()).await??;
    println!(
        "scanned {}, delinquent {}, failed {}",
        report.scanned, report.delinquent, report.failed
    );
    println!("delinquent borrowers: {}", service.delinquent_borrowers()?.len());

    handle.stop().await;
    Ok(())
}
