use chrono::{DateTime, FixedOffset, SecondsFormat};
use serde::Serialize;

use crate::helper::dht_helper::DhtReading;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SensorReading {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    pub temperature: f32,
    pub humidity: f32,
}

impl SensorReading {
    pub fn new(reading: DhtReading, taken_at: Option<DateTime<FixedOffset>>) -> SensorReading {
        SensorReading {
            timestamp: taken_at.map(|time| time.to_rfc3339_opts(SecondsFormat::Secs, false)),
            temperature: reading.temperature,
            humidity: reading.humidity,
        }
    }

    pub fn to_payload(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
