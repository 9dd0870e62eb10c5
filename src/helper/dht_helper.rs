use std::time::{Duration, Instant};

use crate::config::constants::{
    DHT_MAX_HUMIDITY, DHT_MAX_TEMPERATURE, DHT_MIN_TEMPERATURE, DHT_PHASE_TIMEOUT_US,
    MIN_SENSOR_POLL_INTERVAL_MS,
};
use crate::error::Error;

pub const FRAME_BITS: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DhtReading {
    pub temperature: f32,
    pub humidity: f32,
}

/// Last good reading, reused while the sensor is still converting.
#[derive(Debug, Clone, Default)]
pub struct ReadingCache {
    last: Option<(Instant, DhtReading)>,
}

impl ReadingCache {
    /// The cached reading if it was taken less than the minimum poll interval before `now`.
    pub fn fresh(&self, now: Instant) -> Option<DhtReading> {
        let (taken_at, reading) = self.last?;
        let age = now.saturating_duration_since(taken_at);
        (age < Duration::from_millis(MIN_SENSOR_POLL_INTERVAL_MS)).then_some(reading)
    }

    pub fn store(&mut self, taken_at: Instant, reading: DhtReading) {
        self.last = Some((taken_at, reading));
    }
}

/// The data line as seen from the bit decoder.
pub trait DhtLine {
    fn is_high(&mut self) -> bool;
    /// Monotonic microsecond counter.
    fn micros(&mut self) -> i64;
}

/// Spins while the line stays at `level` and returns how long that took.
pub fn wait_while<L: DhtLine>(line: &mut L, level: bool, timeout_us: u32) -> Result<u32, Error> {
    let start = line.micros();
    loop {
        if line.is_high() != level {
            return Ok((line.micros() - start) as u32);
        }
        if line.micros() - start > timeout_us as i64 {
            return Err(Error::ReadTimeout);
        }
    }
}

/// Follows the sensor response once the host released the line after the
/// start signal and collects the five frame bytes.
pub fn read_frame<L: DhtLine>(line: &mut L) -> Result<[u8; 5], Error> {
    // pull-up holds the line high until the sensor answers
    wait_while(line, true, DHT_PHASE_TIMEOUT_US)?;
    // response: ~80us low, ~80us high
    wait_while(line, false, DHT_PHASE_TIMEOUT_US)?;
    wait_while(line, true, DHT_PHASE_TIMEOUT_US)?;

    let mut frame = [0u8; 5];
    for bit in 0..FRAME_BITS {
        let low = wait_while(line, false, DHT_PHASE_TIMEOUT_US)?;
        let high = wait_while(line, true, DHT_PHASE_TIMEOUT_US)?;
        if high > low {
            frame[bit / 8] |= 0x80 >> (bit % 8);
        }
    }
    Ok(frame)
}

pub fn checksum(frame: &[u8; 5]) -> u8 {
    frame[..4].iter().fold(0u8, |sum, byte| sum.wrapping_add(*byte))
}

pub fn decode_frame(frame: &[u8; 5]) -> Result<DhtReading, Error> {
    let expected = checksum(frame);
    if expected != frame[4] {
        return Err(Error::Checksum {
            expected,
            actual: frame[4],
        });
    }

    let humidity = u16::from_be_bytes([frame[0], frame[1]]) as f32 / 10.0;
    let magnitude = u16::from_be_bytes([frame[2] & 0x7f, frame[3]]) as f32 / 10.0;
    let temperature = if frame[2] & 0x80 != 0 {
        -magnitude
    } else {
        magnitude
    };

    if humidity > DHT_MAX_HUMIDITY
        || !(DHT_MIN_TEMPERATURE..=DHT_MAX_TEMPERATURE).contains(&temperature)
    {
        return Err(Error::InvalidData);
    }

    Ok(DhtReading {
        temperature,
        humidity,
    })
}
