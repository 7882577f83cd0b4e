//! Injected dependencies.
//!
//! External effects the pipeline relies on sit behind small traits so tests
//! can substitute deterministic implementations.

use chrono::{DateTime, Utc};

/// Source of the current time.
///
/// Stores use it to stamp `created_at` on commit.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        assert!(clock.now() >= first);
    }
}
