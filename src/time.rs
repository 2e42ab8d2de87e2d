//! Monotonic timestamps

use std::{sync::OnceLock, time::Instant};

use nix::time::{clock_gettime, ClockId};

/// Microseconds since an arbitrary, fixed epoch
pub type AbsTime = u64;

/// Current monotonic time in microseconds; not wall-clock time
pub fn monotonic_timestamp() -> AbsTime {
    match clock_gettime(ClockId::CLOCK_MONOTONIC) {
        Ok(ts) => ts.tv_sec() as u64 * 1_000_000 + ts.tv_nsec() as u64 / 1_000,
        Err(_) => fallback_timestamp(),
    }
}

/// Microseconds elapsed since `then`
pub fn elapsed_since(then: AbsTime) -> AbsTime {
    monotonic_timestamp().saturating_sub(then)
}

fn fallback_timestamp() -> AbsTime {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_micros() as u64
}
