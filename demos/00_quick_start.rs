/// quick start - issue a loan and pay the first installment
use std::sync::Arc;

use loan_billing_rs::{LoanService, MemoryRepository, Money, Rate, SafeTimeProvider, TimeSource};
use rust_decimal_macros::dec;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let service = LoanService::new(Arc::new(MemoryRepository::new()));
    let time = SafeTimeProvider::new(TimeSource::System);

    // 5,000,000 at 10% over 50 weeks
    let borrower = service.create_borrower("Budi Santoso", "budi@example.com", &time)?;
    let loan = service.create_loan(
        borrower.id,
        Money::from_minor(5_000_000),
        Rate::from_percentage(dec!(10)),
        50,
        &time,
    )?;
    println!("total due: {}", loan.total_due);

    // pay exactly one weekly installment
    let outcome = service.apply_payment(loan.id, Money::from_minor(109_615), &time)?;
    println!("paid installment {}, outstanding {}", outcome.installment_sequence, outcome.remaining_balance);

    println!("{}", service.loan_view(loan.id)?.to_json_pretty()?);

    Ok(())
}
