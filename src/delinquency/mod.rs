pub mod evaluator;
pub mod sweep;

pub use evaluator::{DelinquencyEvaluator, DelinquencyVerdict, DEFAULT_STREAK_THRESHOLD};
pub use sweep::{DelinquencySweep, SweepReport};
