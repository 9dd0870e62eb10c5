use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{delay::FreeRtos, peripherals::Peripherals},
    nvs::EspDefaultNvsPartition,
};
use log::{info, warn};

use crate::{
    config::{
        config::DeviceConfig,
        constants::{MQTT_BACKOFF_BASE_MS, MQTT_BACKOFF_MAX_MS, WIFI_BACKOFF_BASE_MS, WIFI_BACKOFF_MAX_MS},
    },
    helper::{
        backoff_helper::Backoff,
        orchestrator_helper::{
            connect_to_wifi_insistently, publish_reading, reconnect_to_wifi_if_needed,
            sync_clock_if_necessary,
        },
    },
    service::{
        clock_service::ClockService, mqtt_service::MqttService, sensor_service::SensorService,
        wifi_service::WifiService,
    },
};

pub fn orchestrate() -> anyhow::Result<()> {
    let config = DeviceConfig::embedded()?;
    info!("configuration: {:?}", config);

    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;

    let mut wifi = WifiService::new(peripherals.modem, sys_loop, nvs, &config)?;
    connect_to_wifi_insistently(
        &mut wifi,
        &mut Backoff::new(WIFI_BACKOFF_BASE_MS, WIFI_BACKOFF_MAX_MS),
    );

    let mac_address = wifi.mac_address()?;
    info!("WiFi MAC Address: {}", mac_address);

    let mut clock = ClockService::new(&config);
    sync_clock_if_necessary(&mut clock);
    if !clock.is_synchronized() {
        warn!("publishing without timestamps until the clock is synchronized");
    }

    let mut sensor = SensorService::new(&config)?;
    let mut mqtt = MqttService::new(&config, mac_address)?;
    if let Err(e) = mqtt.ensure_connected() {
        warn!("broker not reachable yet: {}", e);
    }

    let mut mqtt_backoff = Backoff::new(MQTT_BACKOFF_BASE_MS, MQTT_BACKOFF_MAX_MS);
    loop {
        reconnect_to_wifi_if_needed(&mut wifi);
        sync_clock_if_necessary(&mut clock);
        publish_reading(&mut sensor, &mut mqtt, &clock, &mut mqtt_backoff);

        FreeRtos::delay_ms(config.sensor_poll_interval_delay_ms());
    }
}
