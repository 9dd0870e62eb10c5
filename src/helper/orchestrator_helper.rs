use esp_idf_svc::hal::delay::FreeRtos;
use log::{error, info, warn};

use crate::dto::sensor_reading::SensorReading;
use crate::helper::backoff_helper::Backoff;
use crate::service::clock_service::ClockService;
use crate::service::mqtt_service::MqttService;
use crate::service::sensor_service::SensorService;
use crate::service::wifi_service::WifiService;

pub fn connect_to_wifi_insistently(wifi: &mut WifiService<'_>, backoff: &mut Backoff) {
    while let Err(e) = wifi.connect() {
        let delay = backoff.next_delay();
        error!("{}, retrying in {:?}", e, delay);
        FreeRtos::delay_ms(delay.as_millis() as u32);
    }
    backoff.reset();
}

pub fn reconnect_to_wifi_if_needed(wifi: &mut WifiService<'_>) {
    if let Err(e) = wifi.reconnect_if_needed() {
        error!("WiFi still down: {}", e);
    }
}

pub fn sync_clock_if_necessary(clock: &mut ClockService) {
    if clock.is_resync_due() {
        // failure is already logged and the last known time stays in use
        let _ = clock.synchronize();
    }
}

/// One sensor poll + publish cycle. Transient faults skip the cycle, broker
/// failures back off before the next one.
pub fn publish_reading(
    sensor: &mut SensorService,
    mqtt: &mut MqttService<'_>,
    clock: &ClockService,
    mqtt_backoff: &mut Backoff,
) {
    let reading = match sensor.read() {
        Ok(reading) => reading,
        Err(e) if e.is_transient_sensor_fault() => {
            warn!("skipping cycle: {}", e);
            return;
        }
        Err(e) => {
            error!("sensor failure: {}", e);
            return;
        }
    };

    let payload = match SensorReading::new(reading, clock.local_time()).to_payload() {
        Ok(payload) => payload,
        Err(e) => {
            error!("could not serialize reading: {}", e);
            return;
        }
    };

    match mqtt.publish(&payload) {
        Ok(message_id) => {
            mqtt_backoff.reset();
            info!("-> #{} {}", message_id, payload);
        }
        Err(e) => {
            let delay = mqtt_backoff.next_delay();
            error!("publish failed: {}, backing off {:?}", e, delay);
            FreeRtos::delay_ms(delay.as_millis() as u32);
        }
    }
}
