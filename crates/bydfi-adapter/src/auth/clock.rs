/*
[INPUT]:  Local wall clock and exchange server time samples
[OUTPUT]: Offset-corrected millisecond timestamps for signing
[POS]:    Auth layer - clock skew compensation
[UPDATE]: When changing how server time is sampled or applied
*/

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;

/// Thread-safe estimate of `server_time - local_time`
#[derive(Debug, Clone, Default)]
pub struct ServerClock {
    offset_ms: Arc<AtomicI64>,
}

impl ServerClock {
    /// Create a clock with zero offset
    pub fn new() -> Self {
        Self::default()
    }

    /// Local wall clock in epoch milliseconds
    pub fn local_ms() -> i64 {
        Utc::now().timestamp_millis()
    }

    /// Estimated exchange time in epoch milliseconds
    pub fn now_ms(&self) -> u64 {
        let now = Self::local_ms().saturating_add(self.offset_ms());
        u64::try_from(now).unwrap_or(0)
    }

    pub fn offset_ms(&self) -> i64 {
        self.offset_ms.load(Ordering::Relaxed)
    }

    pub fn set_offset_ms(&self, offset_ms: i64) {
        self.offset_ms.store(offset_ms, Ordering::Relaxed);
    }

    /// Record a server time sample taken between two local readings.
    ///
    /// The server is assumed to have stamped the response at the midpoint
    /// of the round trip. Returns the stored offset.
    pub fn record_sample(&self, local_before: i64, server_time: i64, local_after: i64) -> i64 {
        let midpoint = local_before + (local_after - local_before) / 2;
        let offset = server_time - midpoint;
        self.set_offset_ms(offset);
        offset
    }
}
