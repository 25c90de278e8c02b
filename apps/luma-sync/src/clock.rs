use crate::codec::{Ticks, ticks_from_datetime};
use time::OffsetDateTime;

/// Source of local wall-clock instants.
pub trait Clock: Send + Sync {
    fn now_ticks(&self) -> Ticks;
}

/// The host's UTC wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ticks(&self) -> Ticks {
        ticks_from_datetime(OffsetDateTime::now_utc()).unwrap_or(Ticks::MAX)
    }
}
