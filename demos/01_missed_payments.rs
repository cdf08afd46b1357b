/// missed payments - delinquency with controlled time
use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};
use loan_billing_rs::{BillingError, LoanService, MemoryRepository, Money, Rate, SafeTimeProvider, TimeSource};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== missed payments example ===\n");

    let time = SafeTimeProvider::new(TimeSource::Test(
        Utc.with_ymd_and_hms(2024, 1, 1, 9, 0, 0).unwrap()
    ));
    let controller = time.test_control().unwrap();

    let service = LoanService::new(Arc::new(MemoryRepository::new()));
    let borrower = service.create_borrower("Sari Dewi", "+62 811 1234 5678", &time)?;
    let loan = service.create_loan(borrower.id, Money::from_minor(1_000_000), Rate::ZERO, 10, &time)?;
    println!("loan issued on {}", time.now().format("%Y-%m-%d"));

    // one missed week is not delinquent
    controller.advance(Duration::weeks(1) + Duration::days(1));
    println!("{}: delinquent = {}", time.now().format("%Y-%m-%d"), service.check_delinquent(loan.id, &time)?);

    // two in a row is
    controller.advance(Duration::weeks(1));
    println!("{}: delinquent = {}", time.now().format("%Y-%m-%d"), service.check_delinquent(loan.id, &time)?);

    // the amount must match the installment exactly
    match service.apply_payment(loan.id, Money::from_minor(50_000), &time) {
        Err(BillingError::AmountMismatch { expected, provided }) => {
            println!("rejected {}: expected {}", provided, expected);
        }
        other => println!("unexpected result: {:?}", other),
    }

    // catching up on the oldest week clears the flag
    let outcome = service.apply_payment(loan.id, Money::from_minor(100_000), &time)?;
    println!(
        "paid week {}, delinquent = {}, outstanding {}",
        outcome.installment_sequence,
        outcome.verdict.delinquent,
        outcome.remaining_balance
    );

    println!("\nevents:");
    for event in service.take_events() {
        println!("  {:?}", event);
    }

    Ok(())
}
