use std::time::Instant;

use esp_idf_svc::hal::delay::Ets;
use esp_idf_svc::hal::gpio::{AnyIOPin, InputOutput, PinDriver, Pull};
use esp_idf_svc::hal::interrupt;
use esp_idf_svc::timer::EspTaskTimerService;
use log::{debug, info};

use crate::config::config::DeviceConfig;
use crate::config::constants::DHT_START_SIGNAL_US;
use crate::error::Error;
use crate::helper::dht_helper::{decode_frame, read_frame, DhtLine, DhtReading, ReadingCache};

/// DHT22 on a single open-drain GPIO.
pub struct SensorService {
    pin: PinDriver<'static, AnyIOPin, InputOutput>,
    timer: EspTaskTimerService,
    cache: ReadingCache,
}

struct PinLine<'p> {
    pin: &'p PinDriver<'static, AnyIOPin, InputOutput>,
    timer: &'p EspTaskTimerService,
}

impl DhtLine for PinLine<'_> {
    fn is_high(&mut self) -> bool {
        self.pin.is_high()
    }

    fn micros(&mut self) -> i64 {
        self.timer.now().as_micros() as i64
    }
}

impl SensorService {
    pub fn new(config: &DeviceConfig) -> Result<SensorService, Error> {
        // SAFETY: dht_pin passed config validation and no other driver owns it
        let pin = unsafe { AnyIOPin::new(config.dht_pin as i32) };
        let mut pin = PinDriver::input_output_od(pin)?;
        pin.set_pull(Pull::Up)?;
        // idle bus is high
        pin.set_high()?;
        info!("DHT22 on GPIO{}", config.dht_pin);

        Ok(SensorService {
            pin,
            timer: EspTaskTimerService::new()?,
            cache: ReadingCache::default(),
        })
    }

    pub fn read(&mut self) -> Result<DhtReading, Error> {
        if let Some(reading) = self.cache.fresh(Instant::now()) {
            debug!("sensor still converting, reusing last reading");
            return Ok(reading);
        }

        self.pin.set_low()?;
        Ets::delay_us(DHT_START_SIGNAL_US);
        self.pin.set_high()?;

        let mut line = PinLine {
            pin: &self.pin,
            timer: &self.timer,
        };
        // bit timing is in the tens of microseconds, keep interrupts away
        let frame = interrupt::free(|| read_frame(&mut line))?;
        let reading = decode_frame(&frame)?;
        debug!(
            "DHT22: {:.1} C, {:.1} %RH",
            reading.temperature, reading.humidity
        );

        self.cache.store(Instant::now(), reading);
        Ok(reading)
    }
}
