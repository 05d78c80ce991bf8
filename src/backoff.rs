use std::time::Duration;

use crate::BackoffStrategy;

/// Returns the wait before retry `attempt` (1-indexed).
///
/// - [`BackoffStrategy::Exponential`]: `factor * 2^(attempt - 1)`
/// - [`BackoffStrategy::Linear`]: `factor * attempt`
/// - [`BackoffStrategy::None`]: `factor`
///
/// There is no ceiling; capping the delay is left to the caller. Results
/// larger than [`Duration::MAX`] saturate to it. A zero `factor` always
/// yields a zero delay.
///
/// # Panics
///
/// Panics if `attempt` is `0`.
pub fn delay(attempt: u32, strategy: BackoffStrategy, factor: Duration) -> Duration {
    assert!(attempt >= 1, "retry attempts are 1-indexed, got attempt 0");

    match strategy {
        BackoffStrategy::Exponential => {
            let nanos = factor.as_nanos();
            let shift = attempt - 1;
            if nanos == 0 {
                return Duration::ZERO;
            }
            if shift >= nanos.leading_zeros() {
                return Duration::MAX;
            }
            duration_from_nanos(nanos << shift)
        }
        BackoffStrategy::Linear => factor.saturating_mul(attempt),
        BackoffStrategy::None => factor,
    }
}

fn duration_from_nanos(nanos: u128) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, (nanos % NANOS_PER_SEC) as u32),
        Err(_) => Duration::MAX,
    }
}
