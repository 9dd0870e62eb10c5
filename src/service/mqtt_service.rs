use core::ffi::c_void;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use embedded_svc::mqtt::client::{EventPayload, QoS};
use esp_idf_svc::handle::RawHandle;
use esp_idf_svc::mqtt::client::{EspMqttClient, EspMqttConnection, MqttClientConfiguration};
use esp_idf_sys::{
    esp, esp_event_base_t, esp_mqtt_client_register_event,
    esp_mqtt_error_type_t_MQTT_ERROR_TYPE_CONNECTION_REFUSED, esp_mqtt_event_handle_t,
    esp_mqtt_event_id_t_MQTT_EVENT_ERROR,
};
use log::{debug, info, warn};
use macaddr::MacAddr6;

use crate::config::config::DeviceConfig;
use crate::config::constants::MQTT_CONNECT_TIMEOUT_MS;
use crate::error::Error;
use crate::helper::mqtt_helper::{
    broker_url, client_id, connect_error, SessionEvent, SessionOutcome, SessionWatch,
};

const PUMP_STACK_SIZE: usize = 6 * 1024;

// CONNACK return code of the last refused CONNECT, 0 while none is pending.
// The device runs a single MQTT client.
static CONNECT_REFUSAL: AtomicU32 = AtomicU32::new(0);

pub struct MqttService<'a> {
    client: EspMqttClient<'static>,
    connected: Arc<AtomicBool>,
    events: Receiver<SessionEvent>,
    config: &'a DeviceConfig,
}

impl<'a> MqttService<'a> {
    /// Starts the session in the background; use [`MqttService::ensure_connected`]
    /// to wait for the broker.
    pub fn new(config: &'a DeviceConfig, mac: MacAddr6) -> Result<MqttService<'a>, Error> {
        let url = broker_url(config);
        let client_id = client_id(config, mac);
        let conf = MqttClientConfiguration {
            client_id: Some(client_id.as_str()),
            username: config
                .has_mqtt_credentials()
                .then_some(config.mqtt_username.as_str()),
            password: config
                .has_mqtt_credentials()
                .then_some(config.mqtt_password.as_str()),
            ..Default::default()
        };

        info!("MQTT session {} as {:?}", url, client_id);
        let (client, connection) = EspMqttClient::new(url.as_str(), &conf)?;
        // the generic error payload drops the CONNACK code, read it from the raw event
        esp!(unsafe {
            esp_mqtt_client_register_event(
                client.handle(),
                esp_mqtt_event_id_t_MQTT_EVENT_ERROR,
                Some(record_connect_refusal),
                core::ptr::null_mut(),
            )
        })?;

        let connected = Arc::new(AtomicBool::new(false));
        let (sender, events) = mpsc::channel();
        spawn_event_pump(connection, connected.clone(), sender)?;

        Ok(MqttService {
            client,
            connected,
            events,
            config,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub fn ensure_connected(&mut self) -> Result<(), Error> {
        // anything queued describes sessions that are already over
        while self.events.try_recv().is_ok() {}
        if self.is_connected() {
            return Ok(());
        }

        match connect_error(&self.wait_for_session()) {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }

    /// Publishes on the configured topic with QoS 1, returns the message id.
    pub fn publish(&mut self, payload: &str) -> Result<u32, Error> {
        self.ensure_connected()?;
        let message_id = self
            .client
            .publish(
                &self.config.mqtt_topic,
                QoS::AtLeastOnce,
                false,
                payload.as_bytes(),
            )
            .map_err(|e| Error::Connection(e.to_string()))?;
        debug!("published #{} on {}", message_id, self.config.mqtt_topic);
        Ok(message_id)
    }

    fn wait_for_session(&self) -> SessionOutcome {
        let deadline = Instant::now() + Duration::from_millis(MQTT_CONNECT_TIMEOUT_MS);
        let mut watch = SessionWatch::default();
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.events.recv_timeout(remaining) {
                Ok(event) => {
                    if let Some(outcome) = watch.observe(event) {
                        return outcome;
                    }
                }
                Err(_) => return SessionOutcome::TimedOut,
            }
        }
    }
}

/// Runs on the esp-mqtt task for every error event.
unsafe extern "C" fn record_connect_refusal(
    _handler_arg: *mut c_void,
    _base: esp_event_base_t,
    _event_id: i32,
    event_data: *mut c_void,
) {
    let event = event_data as esp_mqtt_event_handle_t;
    if event.is_null() || (*event).error_handle.is_null() {
        return;
    }
    let codes = &*(*event).error_handle;
    if codes.error_type == esp_mqtt_error_type_t_MQTT_ERROR_TYPE_CONNECTION_REFUSED {
        CONNECT_REFUSAL.store(codes.connect_return_code as u32, Ordering::Release);
    }
}

fn spawn_event_pump(
    mut connection: EspMqttConnection,
    connected: Arc<AtomicBool>,
    sender: Sender<SessionEvent>,
) -> Result<(), Error> {
    thread::Builder::new()
        .name("mqtt-events".into())
        .stack_size(PUMP_STACK_SIZE)
        .spawn(move || {
            while let Ok(event) = connection.next() {
                let session_event = match event.payload() {
                    EventPayload::Connected(_) => {
                        info!("MQTT connected");
                        CONNECT_REFUSAL.store(0, Ordering::Release);
                        connected.store(true, Ordering::Release);
                        SessionEvent::Connected
                    }
                    EventPayload::Disconnected => {
                        warn!("MQTT disconnected");
                        connected.store(false, Ordering::Release);
                        // the error event carrying the refusal is fully handled by now
                        let refusal = CONNECT_REFUSAL.swap(0, Ordering::AcqRel);
                        if refusal != 0 {
                            warn!("broker refused the session, return code {}", refusal);
                            if sender.send(SessionEvent::Refused(refusal)).is_err() {
                                break;
                            }
                        }
                        SessionEvent::Disconnected
                    }
                    EventPayload::Error(e) => {
                        warn!("MQTT error: {:?}", e);
                        SessionEvent::Failed(format!("{:?}", e))
                    }
                    EventPayload::Published(id) => {
                        debug!("broker acknowledged #{}", id);
                        continue;
                    }
                    _ => continue,
                };
                // receiver gone means the service was dropped
                if sender.send(session_event).is_err() {
                    break;
                }
            }
            info!("MQTT connection closed");
        })
        .map_err(|e| Error::Esp(e.to_string()))?;
    Ok(())
}
