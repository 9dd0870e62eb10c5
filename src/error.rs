use std::fmt;

/// Failures reported by the WiFi, MQTT, sensor and clock collaborators.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Network unreachable, association refused, broker not answering.
    Connection(String),
    /// Broker rejected the session credentials.
    Auth(String),
    /// The sensor stopped answering in the middle of a transfer.
    ReadTimeout,
    Checksum {
        expected: u8,
        actual: u8,
    },
    /// Frame passed the checksum but carries values the sensor cannot produce.
    InvalidData,
    SyncTimeout,
    /// Driver call rejected by ESP-IDF.
    Esp(String),
}

impl Error {
    /// Sensor faults that usually disappear on the next read.
    pub fn is_transient_sensor_fault(&self) -> bool {
        matches!(
            self,
            Error::ReadTimeout | Error::Checksum { .. } | Error::InvalidData
        )
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(reason) => write!(f, "connection error: {}", reason),
            Error::Auth(reason) => write!(f, "authentication error: {}", reason),
            Error::ReadTimeout => write!(f, "sensor read timed out"),
            Error::Checksum { expected, actual } => write!(
                f,
                "sensor checksum mismatch: expected {:#04x}, got {:#04x}",
                expected, actual
            ),
            Error::InvalidData => write!(f, "sensor returned out of range values"),
            Error::SyncTimeout => write!(f, "time synchronization timed out"),
            Error::Esp(reason) => write!(f, "esp-idf error: {}", reason),
        }
    }
}

impl std::error::Error for Error {}

#[cfg(target_os = "espidf")]
impl From<esp_idf_sys::EspError> for Error {
    fn from(e: esp_idf_sys::EspError) -> Self {
        Error::Esp(e.to_string())
    }
}
