use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Utc};
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::sntp::{EspSntp, SntpConf, SyncStatus};
use log::{info, warn};

use crate::config::config::DeviceConfig;
use crate::config::constants::NTP_SYNC_TIMEOUT_MS;
use crate::error::Error;
use crate::helper::date_helper::ClockState;

const SYNC_POLL_MS: u32 = 100;

pub struct ClockService {
    server: String,
    state: ClockState,
}

impl ClockService {
    pub fn new(config: &DeviceConfig) -> ClockService {
        ClockService {
            server: config.ntp_server.clone(),
            state: ClockState::new(config),
        }
    }

    pub fn is_synchronized(&self) -> bool {
        self.state.is_synchronized()
    }

    pub fn is_resync_due(&self) -> bool {
        self.state.is_resync_due(Instant::now())
    }

    /// On failure the system clock keeps running from the last sync.
    pub fn synchronize(&mut self) -> Result<(), Error> {
        let attempt = Instant::now();
        match synchronize_clock(&self.server) {
            Ok(()) => {
                let now = Utc::now();
                self.state.record_sync(attempt, now);
                info!(
                    "clock synchronized with {}: {}",
                    self.server,
                    now.with_timezone(&self.state.offset())
                );
                Ok(())
            }
            Err(e) => {
                self.state.record_failure(attempt);
                match self.state.last_sync() {
                    Some(last) => warn!("{}, keeping time from last sync at {}", e, last),
                    None => warn!("{}, clock was never synchronized", e),
                }
                Err(e)
            }
        }
    }

    pub fn local_time(&self) -> Option<DateTime<FixedOffset>> {
        self.state.local_time(Utc::now())
    }
}

fn synchronize_clock(server: &str) -> Result<(), Error> {
    let mut conf = SntpConf::default();
    conf.servers[0] = server;
    let sntp = EspSntp::new(&conf)?;
    info!("SNTP started against {}, waiting for status", server);

    let deadline = Duration::from_millis(NTP_SYNC_TIMEOUT_MS);
    let started = Instant::now();
    while sntp.get_sync_status() != SyncStatus::Completed {
        if started.elapsed() >= deadline {
            return Err(Error::SyncTimeout);
        }
        FreeRtos::delay_ms(SYNC_POLL_MS);
    }
    Ok(())
}
