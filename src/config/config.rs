use std::fmt;

use serde::Deserialize;

use super::constants::*;

// written by build.rs from cfg.toml (or the template when cfg.toml is missing)
const EMBEDDED_CONFIG: &str = include_str!(concat!(env!("OUT_DIR"), "/cfg.toml"));

/// Everything the firmware needs to know about its surroundings.
///
/// Loaded once at start with [`DeviceConfig::embedded`] and then only
/// handed out by reference, nothing mutates it at runtime.
#[derive(Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct DeviceConfig {
    pub ssid: String,

    #[serde(default = "default_password")]
    pub password: String,

    pub mqtt_broker: String,

    #[serde(default = "default_mqtt_topic")]
    pub mqtt_topic: String,

    #[serde(default = "default_mqtt_port")]
    pub mqtt_port: u16,

    #[serde(default = "default_mqtt_username")]
    pub mqtt_username: String,

    #[serde(default = "default_mqtt_password")]
    pub mqtt_password: String,

    #[serde(default)]
    pub mqtt_client_id: Option<String>,

    #[serde(default = "default_dht_pin")]
    pub dht_pin: u8,

    #[serde(default = "default_sensor_poll_interval_ms")]
    pub sensor_poll_interval_ms: u64,

    #[serde(default = "default_ntp_server")]
    pub ntp_server: String,

    #[serde(default = "default_gmt_offset_sec")]
    pub gmt_offset_sec: i32,

    #[serde(default = "default_ntp_update_interval_ms")]
    pub ntp_update_interval_ms: u64,
}

fn default_password() -> String {
    DEFAULT_PASSWORD.to_owned()
}

fn default_mqtt_topic() -> String {
    DEFAULT_MQTT_TOPIC.to_owned()
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_mqtt_username() -> String {
    DEFAULT_MQTT_USERNAME.to_owned()
}

fn default_mqtt_password() -> String {
    DEFAULT_MQTT_PASSWORD.to_owned()
}

fn default_dht_pin() -> u8 {
    DEFAULT_DHT_PIN
}

fn default_sensor_poll_interval_ms() -> u64 {
    DEFAULT_SENSOR_POLL_INTERVAL_MS
}

fn default_ntp_server() -> String {
    DEFAULT_NTP_SERVER.to_owned()
}

fn default_gmt_offset_sec() -> i32 {
    DEFAULT_GMT_OFFSET_SEC
}

fn default_ntp_update_interval_ms() -> u64 {
    DEFAULT_NTP_UPDATE_INTERVAL_MS
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    Parse(String),
    EmptySsid,
    SsidTooLong(usize),
    InvalidPassword(usize),
    EmptyBroker,
    InvalidBroker(String),
    InvalidTopic(String),
    InvalidPort,
    EmptyClientId,
    MqttPasswordWithoutUsername,
    InvalidPin(u8),
    PollIntervalTooShort(u64),
    PollIntervalTooLong(u64),
    EmptyNtpServer,
    GmtOffsetOutOfRange(i32),
    ZeroNtpUpdateInterval,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(message) => write!(f, "malformed configuration: {}", message),
            ConfigError::EmptySsid => write!(f, "ssid must not be empty"),
            ConfigError::SsidTooLong(len) => write!(
                f,
                "ssid is {} bytes long, at most {} are allowed",
                len, MAX_SSID_LEN
            ),
            ConfigError::InvalidPassword(len) => write!(
                f,
                "password is {} bytes long, at most {} are allowed",
                len, MAX_WPA_PASSWORD_LEN
            ),
            ConfigError::EmptyBroker => write!(f, "mqtt_broker must not be empty"),
            ConfigError::InvalidBroker(broker) => write!(
                f,
                "mqtt_broker {:?} must be a bare hostname or IP address",
                broker
            ),
            ConfigError::InvalidTopic(topic) => write!(
                f,
                "mqtt_topic {:?} must be non-empty and free of wildcards",
                topic
            ),
            ConfigError::InvalidPort => write!(f, "mqtt_port must not be 0"),
            ConfigError::EmptyClientId => write!(f, "mqtt_client_id must not be empty when set"),
            ConfigError::MqttPasswordWithoutUsername => {
                write!(f, "mqtt_password is set but mqtt_username is empty")
            }
            ConfigError::InvalidPin(pin) => {
                write!(f, "dht_pin {} is not a bidirectional GPIO", pin)
            }
            ConfigError::PollIntervalTooShort(interval) => write!(
                f,
                "sensor_poll_interval_ms {} is below the sensor limit of {}",
                interval, MIN_SENSOR_POLL_INTERVAL_MS
            ),
            ConfigError::PollIntervalTooLong(interval) => write!(
                f,
                "sensor_poll_interval_ms {} is above the limit of {}",
                interval, MAX_SENSOR_POLL_INTERVAL_MS
            ),
            ConfigError::EmptyNtpServer => write!(f, "ntp_server must not be empty"),
            ConfigError::GmtOffsetOutOfRange(offset) => write!(
                f,
                "gmt_offset_sec {} is outside {}..={}",
                offset, MIN_GMT_OFFSET_SEC, MAX_GMT_OFFSET_SEC
            ),
            ConfigError::ZeroNtpUpdateInterval => {
                write!(f, "ntp_update_interval_ms must be greater than 0")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl DeviceConfig {
    /// The configuration baked into this image.
    pub fn embedded() -> Result<DeviceConfig, ConfigError> {
        DeviceConfig::from_toml(EMBEDDED_CONFIG)
    }

    pub fn from_toml(source: &str) -> Result<DeviceConfig, ConfigError> {
        let config: DeviceConfig =
            toml::from_str(source).map_err(|e| ConfigError::Parse(e.message().to_owned()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ssid.is_empty() {
            return Err(ConfigError::EmptySsid);
        }
        if self.ssid.len() > MAX_SSID_LEN {
            return Err(ConfigError::SsidTooLong(self.ssid.len()));
        }
        if self.password.len() > MAX_WPA_PASSWORD_LEN {
            return Err(ConfigError::InvalidPassword(self.password.len()));
        }

        if self.mqtt_broker.is_empty() {
            return Err(ConfigError::EmptyBroker);
        }
        if self.mqtt_broker.contains("://") || self.mqtt_broker.contains(char::is_whitespace) {
            return Err(ConfigError::InvalidBroker(self.mqtt_broker.clone()));
        }
        if self.mqtt_topic.is_empty() || self.mqtt_topic.contains(['+', '#']) {
            return Err(ConfigError::InvalidTopic(self.mqtt_topic.clone()));
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if matches!(&self.mqtt_client_id, Some(id) if id.is_empty()) {
            return Err(ConfigError::EmptyClientId);
        }
        if self.mqtt_username.is_empty() && !self.mqtt_password.is_empty() {
            return Err(ConfigError::MqttPasswordWithoutUsername);
        }

        if !BIDIRECTIONAL_GPIOS.contains(&self.dht_pin) {
            return Err(ConfigError::InvalidPin(self.dht_pin));
        }
        if self.sensor_poll_interval_ms < MIN_SENSOR_POLL_INTERVAL_MS {
            return Err(ConfigError::PollIntervalTooShort(
                self.sensor_poll_interval_ms,
            ));
        }
        if self.sensor_poll_interval_ms > MAX_SENSOR_POLL_INTERVAL_MS {
            return Err(ConfigError::PollIntervalTooLong(
                self.sensor_poll_interval_ms,
            ));
        }

        if self.ntp_server.is_empty() {
            return Err(ConfigError::EmptyNtpServer);
        }
        if !(MIN_GMT_OFFSET_SEC..=MAX_GMT_OFFSET_SEC).contains(&self.gmt_offset_sec) {
            return Err(ConfigError::GmtOffsetOutOfRange(self.gmt_offset_sec));
        }
        if self.ntp_update_interval_ms == 0 {
            return Err(ConfigError::ZeroNtpUpdateInterval);
        }
        Ok(())
    }

    pub fn is_open_network(&self) -> bool {
        self.password.is_empty()
    }

    pub fn has_mqtt_credentials(&self) -> bool {
        !self.mqtt_username.is_empty()
    }

    /// Poll interval as the millisecond count FreeRTOS delays take.
    pub fn sensor_poll_interval_delay_ms(&self) -> u32 {
        u32::try_from(self.sensor_poll_interval_ms).unwrap_or(u32::MAX)
    }
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        "<empty>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for DeviceConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceConfig")
            .field("ssid", &self.ssid)
            .field("password", &redact(&self.password))
            .field("mqtt_broker", &self.mqtt_broker)
            .field("mqtt_topic", &self.mqtt_topic)
            .field("mqtt_port", &self.mqtt_port)
            .field("mqtt_username", &self.mqtt_username)
            .field("mqtt_password", &redact(&self.mqtt_password))
            .field("mqtt_client_id", &self.mqtt_client_id)
            .field("dht_pin", &self.dht_pin)
            .field("sensor_poll_interval_ms", &self.sensor_poll_interval_ms)
            .field("ntp_server", &self.ntp_server)
            .field("gmt_offset_sec", &self.gmt_offset_sec)
            .field("ntp_update_interval_ms", &self.ntp_update_interval_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = include_str!("../../cfg.example.toml");

    const MINIMAL: &str = r#"
        ssid = "Home"
        mqtt_broker = "broker.local"
    "#;

    fn minimal() -> DeviceConfig {
        DeviceConfig::from_toml(MINIMAL).unwrap()
    }

    #[test]
    fn template_values_are_kept_verbatim() {
        let config = DeviceConfig::from_toml(TEMPLATE).unwrap();
        assert_eq!(config.ssid, "MyNetwork");
        assert_eq!(config.password, "change-me-please");
        assert_eq!(config.mqtt_broker, "broker.local");
        assert_eq!(config.mqtt_topic, "raw/sensor");
        assert_eq!(config.mqtt_port, 1883);
        assert_eq!(config.mqtt_username, "test");
        assert_eq!(config.mqtt_password, "test");
        assert_eq!(config.mqtt_client_id, None);
        assert_eq!(config.dht_pin, 4);
        assert_eq!(config.sensor_poll_interval_ms, 10_000);
        assert_eq!(config.ntp_server, "pool.ntp.org");
        assert_eq!(config.gmt_offset_sec, 0);
        assert_eq!(config.ntp_update_interval_ms, 60_000);
    }

    #[test]
    fn omitted_fields_fall_back_to_defaults() {
        let config = minimal();
        assert_eq!(config.password, "");
        assert!(config.is_open_network());
        assert_eq!(config.mqtt_port, 1883);
        assert_eq!(config.mqtt_topic, "raw/sensor");
        assert_eq!(config.ntp_server, "pool.ntp.org");
        assert_eq!(config.ntp_update_interval_ms, 60_000);
        assert_eq!(config.gmt_offset_sec, 0);
        assert_eq!(config.dht_pin, DEFAULT_DHT_PIN);
        assert!(!config.has_mqtt_credentials());
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "10.0.0.2"
            mqtt_port = 8883
            mqtt_topic = "garden/greenhouse"
            ntp_server = "time.cloudflare.com"
            ntp_update_interval_ms = 3600000
            gmt_offset_sec = 3600
            "#,
        )
        .unwrap();
        assert_eq!(config.mqtt_port, 8883);
        assert_eq!(config.mqtt_topic, "garden/greenhouse");
        assert_eq!(config.ntp_server, "time.cloudflare.com");
        assert_eq!(config.ntp_update_interval_ms, 3_600_000);
        assert_eq!(config.gmt_offset_sec, 3600);
    }

    #[test]
    fn home_network_scenario() {
        let config = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            password = "secret"
            mqtt_broker = "broker.local"
            mqtt_port = 1883
            mqtt_topic = "raw/sensor"
            "#,
        )
        .unwrap();
        assert_eq!(config.ssid, "Home");
        assert_eq!(config.password, "secret");
        assert_eq!(config.mqtt_broker, "broker.local");
        assert_eq!(config.mqtt_port, 1883);
        assert_eq!(config.mqtt_topic, "raw/sensor");
        assert!(!config.is_open_network());
    }

    #[test]
    fn password_longer_than_64_bytes_is_rejected() {
        let mut config = minimal();
        config.password = "p".repeat(65);
        assert_eq!(config.validate(), Err(ConfigError::InvalidPassword(65)));
    }

    #[test]
    fn negative_gmt_offset_is_not_truncated() {
        let config = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "broker.local"
            gmt_offset_sec = -18000
            "#,
        )
        .unwrap();
        assert_eq!(config.gmt_offset_sec, -18000);
    }

    #[test]
    fn gmt_offset_outside_real_timezones_is_rejected() {
        let mut config = minimal();
        config.gmt_offset_sec = 15 * 3600;
        assert_eq!(
            config.validate(),
            Err(ConfigError::GmtOffsetOutOfRange(54_000))
        );
        config.gmt_offset_sec = MIN_GMT_OFFSET_SEC;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn zero_ntp_interval_is_rejected() {
        let mut config = minimal();
        config.ntp_update_interval_ms = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroNtpUpdateInterval));
    }

    #[test]
    fn empty_credentials_and_addresses_are_rejected() {
        let mut config = minimal();
        config.ssid.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptySsid));

        let mut config = minimal();
        config.mqtt_broker.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyBroker));

        let mut config = minimal();
        config.ntp_server.clear();
        assert_eq!(config.validate(), Err(ConfigError::EmptyNtpServer));

        let mut config = minimal();
        config.mqtt_client_id = Some(String::new());
        assert_eq!(config.validate(), Err(ConfigError::EmptyClientId));
    }

    #[test]
    fn ssid_longer_than_32_bytes_is_rejected() {
        let mut config = minimal();
        config.ssid = "x".repeat(33);
        assert_eq!(config.validate(), Err(ConfigError::SsidTooLong(33)));
    }

    #[test]
    fn broker_must_be_a_bare_host() {
        let mut config = minimal();
        config.mqtt_broker = "mqtt://broker.local".to_owned();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidBroker(_))
        ));
    }

    #[test]
    fn wildcard_topics_cannot_be_published_to() {
        for topic in ["raw/#", "raw/+/sensor", ""] {
            let mut config = minimal();
            config.mqtt_topic = topic.to_owned();
            assert_eq!(
                config.validate(),
                Err(ConfigError::InvalidTopic(topic.to_owned()))
            );
        }
    }

    #[test]
    fn port_zero_is_rejected() {
        let result = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "broker.local"
            mqtt_port = 0
            "#,
        );
        assert_eq!(result, Err(ConfigError::InvalidPort));
    }

    #[test]
    fn only_bidirectional_pins_drive_the_sensor() {
        for pin in [6, 11, 20, 34, 39, 40] {
            let mut config = minimal();
            config.dht_pin = pin;
            assert_eq!(config.validate(), Err(ConfigError::InvalidPin(pin)));
        }
        let mut config = minimal();
        config.dht_pin = 33;
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn sensor_cannot_be_polled_faster_than_it_converts() {
        let mut config = minimal();
        config.sensor_poll_interval_ms = 1_000;
        assert_eq!(
            config.validate(),
            Err(ConfigError::PollIntervalTooShort(1_000))
        );
    }

    #[test]
    fn poll_interval_must_fit_a_freertos_delay() {
        let parsed = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "broker.local"
            sensor_poll_interval_ms = 4294968296
            "#,
        );
        assert_eq!(parsed, Err(ConfigError::PollIntervalTooLong(4_294_968_296)));

        let mut config = minimal();
        config.sensor_poll_interval_ms = MAX_SENSOR_POLL_INTERVAL_MS;
        assert_eq!(config.validate(), Ok(()));
        assert_eq!(config.sensor_poll_interval_delay_ms(), 86_400_000);
    }

    #[test]
    fn mqtt_password_needs_a_username() {
        let parsed = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "broker.local"
            mqtt_password = "hunter2"
            "#,
        );
        assert_eq!(parsed, Err(ConfigError::MqttPasswordWithoutUsername));

        let mut config = minimal();
        config.mqtt_username = "greenhouse".to_owned();
        config.mqtt_password = "hunter2".to_owned();
        assert_eq!(config.validate(), Ok(()));
        assert!(config.has_mqtt_credentials());
    }

    #[test]
    fn unknown_keys_and_wrong_types_fail_to_parse() {
        let typo = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "broker.local"
            mqtt_prot = 1883
            "#,
        );
        assert!(matches!(typo, Err(ConfigError::Parse(_))));

        let port_overflow = DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "broker.local"
            mqtt_port = 70000
            "#,
        );
        assert!(matches!(port_overflow, Err(ConfigError::Parse(_))));

        let missing_ssid = DeviceConfig::from_toml(r#"mqtt_broker = "broker.local""#);
        assert!(matches!(missing_ssid, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config = DeviceConfig::from_toml(TEMPLATE).unwrap();
        let printed = format!("{:?}", config);
        assert!(printed.contains("MyNetwork"));
        assert!(!printed.contains("change-me-please"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn embedded_configuration_is_valid() {
        assert!(DeviceConfig::embedded().is_ok());
    }
}
