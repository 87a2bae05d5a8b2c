//! Clock port (for testability)

/// Clock interface (allows mocking session expiry and timestamps in tests)
pub trait Clock: Send + Sync {
    /// Current time as Unix seconds
    fn now(&self) -> i64;
}

/// System clock (production)
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
