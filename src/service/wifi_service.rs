use embedded_svc::wifi::{AuthMethod, ClientConfiguration, Configuration};
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::delay::FreeRtos;
use esp_idf_svc::hal::modem::Modem;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{BlockingWifi, EspWifi, WifiDeviceId};
use log::{info, warn};
use macaddr::MacAddr6;

use crate::config::config::DeviceConfig;
use crate::config::constants::{WIFI_BACKOFF_BASE_MS, WIFI_BACKOFF_MAX_MS, WIFI_CONNECT_ATTEMPTS};
use crate::error::Error;
use crate::helper::backoff_helper::Backoff;

pub struct WifiService<'a> {
    wifi: BlockingWifi<EspWifi<'static>>,
    config: &'a DeviceConfig,
}

impl<'a> WifiService<'a> {
    pub fn new(
        modem: Modem,
        sys_loop: EspSystemEventLoop,
        nvs: EspDefaultNvsPartition,
        config: &'a DeviceConfig,
    ) -> Result<WifiService<'a>, Error> {
        let esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs))?;
        let mut wifi = BlockingWifi::wrap(esp_wifi, sys_loop)?;
        wifi.set_configuration(&Configuration::Client(client_configuration(config)?))?;
        Ok(WifiService { wifi, config })
    }

    pub fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    /// Joins the configured network, backing off between attempts.
    pub fn connect(&mut self) -> Result<(), Error> {
        if !self.wifi.is_started()? {
            self.wifi.start()?;
        }

        let mut backoff = Backoff::new(WIFI_BACKOFF_BASE_MS, WIFI_BACKOFF_MAX_MS);
        let mut last_error = String::new();
        for attempt in 1..=WIFI_CONNECT_ATTEMPTS {
            info!(
                "joining {:?}, attempt {}/{}",
                self.config.ssid, attempt, WIFI_CONNECT_ATTEMPTS
            );
            match self.try_connect() {
                Ok(()) => {
                    info!("WiFi connected to {:?}", self.config.ssid);
                    return Ok(());
                }
                Err(e) => {
                    warn!("WiFi attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                }
            }
            // a half-open association blocks the next connect call
            let _ = self.wifi.disconnect();
            if attempt < WIFI_CONNECT_ATTEMPTS {
                FreeRtos::delay_ms(backoff.next_delay().as_millis() as u32);
            }
        }

        Err(Error::Connection(format!(
            "could not join {:?} after {} attempts: {}",
            self.config.ssid, WIFI_CONNECT_ATTEMPTS, last_error
        )))
    }

    pub fn reconnect_if_needed(&mut self) -> Result<(), Error> {
        if self.is_connected() {
            return Ok(());
        }
        warn!("WiFi link lost, reconnecting...");
        self.connect()
    }

    pub fn mac_address(&self) -> Result<MacAddr6, Error> {
        let mac = self.wifi.wifi().driver().get_mac(WifiDeviceId::Sta)?;
        Ok(MacAddr6::from(mac))
    }

    fn try_connect(&mut self) -> Result<(), Error> {
        self.wifi
            .connect()
            .map_err(|e| Error::Connection(e.to_string()))?;
        self.wifi
            .wait_netif_up()
            .map_err(|e| Error::Connection(e.to_string()))
    }
}

fn client_configuration(config: &DeviceConfig) -> Result<ClientConfiguration, Error> {
    let auth_method = if config.is_open_network() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    Ok(ClientConfiguration {
        ssid: config
            .ssid
            .as_str()
            .try_into()
            .map_err(|_| Error::Connection("ssid too long".to_owned()))?,
        password: config
            .password
            .as_str()
            .try_into()
            .map_err(|_| Error::Connection("password too long".to_owned()))?,
        auth_method,
        ..Default::default()
    })
}
