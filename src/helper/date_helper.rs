use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Offset, Utc};
use log::warn;

use crate::config::config::DeviceConfig;

pub fn offset_from_seconds(gmt_offset_sec: i32) -> FixedOffset {
    FixedOffset::east_opt(gmt_offset_sec).unwrap_or_else(|| {
        warn!("gmt offset {}s out of range, using UTC", gmt_offset_sec);
        Utc.fix()
    })
}

/// Bookkeeping around NTP synchronization: when the next sync is due and
/// which wall clock may be trusted in between.
#[derive(Debug, Clone)]
pub struct ClockState {
    update_interval: Duration,
    offset: FixedOffset,
    last_attempt: Option<Instant>,
    last_sync: Option<DateTime<Utc>>,
}

impl ClockState {
    pub fn new(config: &DeviceConfig) -> ClockState {
        ClockState {
            update_interval: Duration::from_millis(config.ntp_update_interval_ms),
            offset: offset_from_seconds(config.gmt_offset_sec),
            last_attempt: None,
            last_sync: None,
        }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn is_synchronized(&self) -> bool {
        self.last_sync.is_some()
    }

    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.last_sync
    }

    /// Always due until a first sync succeeds; after that once per interval.
    pub fn is_resync_due(&self, now: Instant) -> bool {
        match self.last_attempt {
            Some(attempt) if self.is_synchronized() => {
                now.saturating_duration_since(attempt) >= self.update_interval
            }
            _ => true,
        }
    }

    pub fn record_sync(&mut self, at: Instant, wall_clock: DateTime<Utc>) {
        self.last_attempt = Some(at);
        self.last_sync = Some(wall_clock);
    }

    /// A failed sync leaves the last known time untouched and waits a full
    /// interval before trying again.
    pub fn record_failure(&mut self, at: Instant) {
        self.last_attempt = Some(at);
    }

    /// Local wall clock, or `None` while no sync ever succeeded.
    pub fn local_time(&self, system_now: DateTime<Utc>) -> Option<DateTime<FixedOffset>> {
        self.last_sync?;
        Some(system_now.with_timezone(&self.offset))
    }
}
