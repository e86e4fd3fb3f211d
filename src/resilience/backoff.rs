//! Exponential backoff with jitter for supervisor restarts.

use std::time::Duration;

use rand::Rng;

const RESTART_BASE_MS: u64 = 100;
const RESTART_MAX_MS: u64 = 30_000;

/// Exponential backoff delay with up to 10% jitter. `attempt` starts at 1.
pub fn calculate_backoff(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let factor = 2u64.saturating_pow(attempt - 1);
    let capped = base_ms.saturating_mul(factor).min(max_ms);

    let jitter_range = capped / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped + jitter)
}

/// Delay before restarting a check loop that has panicked `restarts` times.
pub fn restart_delay(restarts: u32) -> Duration {
    calculate_backoff(restarts, RESTART_BASE_MS, RESTART_MAX_MS)
}
