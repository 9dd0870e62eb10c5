use macaddr::MacAddr6;

use crate::config::config::DeviceConfig;
use crate::config::constants::MQTT_CLIENT_ID_PREFIX;
use crate::error::Error;

pub fn broker_url(config: &DeviceConfig) -> String {
    format!("mqtt://{}:{}", config.mqtt_broker, config.mqtt_port)
}

/// Configured client id, or one derived from the station MAC so that
/// several sensors can share a broker without clashing.
pub fn client_id(config: &DeviceConfig, mac: MacAddr6) -> String {
    match &config.mqtt_client_id {
        Some(id) => id.clone(),
        None => {
            let hex: String = mac
                .as_bytes()
                .iter()
                .map(|byte| format!("{:02x}", byte))
                .collect();
            format!("{}{}", MQTT_CLIENT_ID_PREFIX, hex)
        }
    }
}

/// CONNACK return codes that mean the credentials were not accepted.
pub const CONNACK_BAD_USERNAME_OR_PASSWORD: u32 = 4;
pub const CONNACK_NOT_AUTHORIZED: u32 = 5;

/// Session events as the client task reports them, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Connected,
    /// Transport level failure, the generic esp-mqtt error event.
    Failed(String),
    /// Broker answered the CONNECT with a non-zero return code.
    Refused(u32),
    Disconnected,
}

/// How the wait for the broker acknowledgement ended.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionOutcome {
    Connected,
    Refused(u32),
    /// Session closed before it was acknowledged; carries the transport
    /// error reported on the way, if any.
    Closed(Option<String>),
    TimedOut,
}

/// Folds the events of one connection attempt into its outcome.
#[derive(Debug, Default)]
pub struct SessionWatch {
    transport_error: Option<String>,
}

impl SessionWatch {
    /// Returns the outcome once an event settles the attempt.
    pub fn observe(&mut self, event: SessionEvent) -> Option<SessionOutcome> {
        match event {
            SessionEvent::Connected => Some(SessionOutcome::Connected),
            SessionEvent::Refused(code) => Some(SessionOutcome::Refused(code)),
            SessionEvent::Failed(reason) => {
                self.transport_error = Some(reason);
                None
            }
            SessionEvent::Disconnected => Some(SessionOutcome::Closed(self.transport_error.take())),
        }
    }
}

pub fn connect_error(outcome: &SessionOutcome) -> Option<Error> {
    match outcome {
        SessionOutcome::Connected => None,
        SessionOutcome::Refused(code @ (CONNACK_BAD_USERNAME_OR_PASSWORD | CONNACK_NOT_AUTHORIZED)) => {
            Some(Error::Auth(format!(
                "broker refused the credentials (return code {})",
                code
            )))
        }
        SessionOutcome::Refused(code) => Some(Error::Connection(format!(
            "broker refused the session (return code {})",
            code
        ))),
        SessionOutcome::TimedOut => Some(Error::Connection(
            "broker did not acknowledge the session in time".to_owned(),
        )),
        SessionOutcome::Closed(Some(transport_error)) => {
            Some(Error::Connection(transport_error.clone()))
        }
        SessionOutcome::Closed(None) => Some(Error::Connection(
            "broker closed the session before acknowledging it".to_owned(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DeviceConfig {
        DeviceConfig::from_toml(
            r#"
            ssid = "Home"
            mqtt_broker = "broker.local"
            "#,
        )
        .unwrap()
    }

    #[test]
    fn url_uses_broker_and_port() {
        let mut config = config();
        assert_eq!(broker_url(&config), "mqtt://broker.local:1883");
        config.mqtt_port = 1884;
        assert_eq!(broker_url(&config), "mqtt://broker.local:1884");
    }

    #[test]
    fn client_id_defaults_to_mac() {
        let mac = MacAddr6::new(0x24, 0x0a, 0xc4, 0x12, 0xab, 0xef);
        assert_eq!(client_id(&config(), mac), "sensor-240ac412abef");

        let mut config = config();
        config.mqtt_client_id = Some("greenhouse".to_owned());
        assert_eq!(client_id(&config, mac), "greenhouse");
    }

    fn settle(events: Vec<SessionEvent>) -> Option<SessionOutcome> {
        let mut watch = SessionWatch::default();
        events.into_iter().find_map(|event| watch.observe(event))
    }

    #[test]
    fn credential_refusal_is_an_auth_error() {
        // esp-mqtt reports the error event before the disconnect
        let outcome = settle(vec![
            SessionEvent::Failed("EspError(-1)".into()),
            SessionEvent::Refused(CONNACK_BAD_USERNAME_OR_PASSWORD),
            SessionEvent::Disconnected,
        ]);
        assert_eq!(outcome, Some(SessionOutcome::Refused(4)));
        assert!(matches!(
            connect_error(&SessionOutcome::Refused(4)),
            Some(Error::Auth(_))
        ));
        assert!(matches!(
            connect_error(&SessionOutcome::Refused(CONNACK_NOT_AUTHORIZED)),
            Some(Error::Auth(_))
        ));
    }

    #[test]
    fn other_refusals_are_connection_errors() {
        // 2: identifier rejected
        assert!(matches!(
            connect_error(&SessionOutcome::Refused(2)),
            Some(Error::Connection(_))
        ));
    }

    #[test]
    fn transport_failure_then_disconnect_is_a_connection_error() {
        let outcome = settle(vec![
            SessionEvent::Failed("EspError(-1)".into()),
            SessionEvent::Disconnected,
        ])
        .unwrap();
        assert_eq!(outcome, SessionOutcome::Closed(Some("EspError(-1)".into())));
        assert_eq!(
            connect_error(&outcome),
            Some(Error::Connection("EspError(-1)".to_owned()))
        );
    }

    #[test]
    fn acknowledged_session_is_not_an_error() {
        let outcome = settle(vec![SessionEvent::Connected]).unwrap();
        assert_eq!(connect_error(&outcome), None);
        assert_eq!(settle(vec![SessionEvent::Failed("x".into())]), None);
    }

    #[test]
    fn timeouts_and_silent_closes_are_connection_errors() {
        assert!(matches!(
            connect_error(&SessionOutcome::TimedOut),
            Some(Error::Connection(_))
        ));
        assert!(matches!(
            connect_error(&SessionOutcome::Closed(None)),
            Some(Error::Connection(_))
        ));
    }
}
