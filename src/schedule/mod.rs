pub mod amortization;
pub mod generator;

pub use amortization::{AmortizationCalculator, LoanTerms};
pub use generator::ScheduleGenerator;
