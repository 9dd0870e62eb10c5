pub const DEFAULT_PASSWORD: &str = "";
pub const DEFAULT_MQTT_TOPIC: &str = "raw/sensor";
pub const DEFAULT_MQTT_PORT: u16 = 1883;
pub const DEFAULT_MQTT_USERNAME: &str = "";
pub const DEFAULT_MQTT_PASSWORD: &str = "";
// D2 on NodeMCU style boards
pub const DEFAULT_DHT_PIN: u8 = 4;
pub const DEFAULT_NTP_SERVER: &str = "pool.ntp.org";
pub const DEFAULT_GMT_OFFSET_SEC: i32 = 0;
pub const DEFAULT_NTP_UPDATE_INTERVAL_MS: u64 = 60_000;
pub const DEFAULT_SENSOR_POLL_INTERVAL_MS: u64 = 10_000;

// UTC-12 .. UTC+14
pub const MIN_GMT_OFFSET_SEC: i32 = -12 * 60 * 60;
pub const MAX_GMT_OFFSET_SEC: i32 = 14 * 60 * 60;

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_WPA_PASSWORD_LEN: usize = 64;

/// DHT22 datasheet: at most one conversion every two seconds.
pub const MIN_SENSOR_POLL_INTERVAL_MS: u64 = 2_000;
pub const MAX_SENSOR_POLL_INTERVAL_MS: u64 = 24 * 60 * 60 * 1_000;

/// GPIOs that can both drive and sample the single-wire bus.
/// 6..=11 are wired to the SPI flash and 34..=39 are input only.
pub const BIDIRECTIONAL_GPIOS: &[u8] = &[
    0, 1, 2, 3, 4, 5, 12, 13, 14, 15, 16, 17, 18, 19, 21, 22, 23, 25, 26, 27, 32, 33,
];

pub const WIFI_CONNECT_ATTEMPTS: u32 = 8;
pub const WIFI_BACKOFF_BASE_MS: u64 = 500;
pub const WIFI_BACKOFF_MAX_MS: u64 = 30_000;

pub const MQTT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const MQTT_BACKOFF_BASE_MS: u64 = 1_000;
pub const MQTT_BACKOFF_MAX_MS: u64 = 60_000;
pub const MQTT_CLIENT_ID_PREFIX: &str = "sensor-";

pub const NTP_SYNC_TIMEOUT_MS: u64 = 15_000;

pub const DHT_START_SIGNAL_US: u32 = 1_100;
pub const DHT_PHASE_TIMEOUT_US: u32 = 100;
pub const DHT_MIN_TEMPERATURE: f32 = -40.0;
pub const DHT_MAX_TEMPERATURE: f32 = 80.0;
pub const DHT_MAX_HUMIDITY: f32 = 100.0;
