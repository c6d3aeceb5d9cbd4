//! Conversion of raw sensor words to physical units.
//!
//! Coefficients are the SHT1x/SHT7x datasheet values for a 5 V supply with
//! 14-bit temperature and 12-bit humidity readings, which is what the sensor
//! reports after power-up. Results are not clamped: a reading outside 0-100 %RH
//! is returned as computed.

/// Temperature offset at 5 V, in degrees Celsius.
const D1: f32 = -40.1;
/// Temperature slope for 14-bit readings.
const D2: f32 = 0.01;

// Linear humidity, 12-bit
const C1: f32 = -2.0468;
const C2: f32 = 0.0367;
const C3: f32 = -1.5955e-6;

// Temperature compensation of humidity, 12-bit
const T1: f32 = 0.01;
const T2: f32 = 0.00008;

/// Reference temperature of the humidity calibration, in degrees Celsius.
const REFERENCE_TEMPERATURE: f32 = 25.0;

/// Converts a raw temperature word to degrees Celsius.
pub fn temperature_from_raw(raw: u16) -> f32 {
    f32::from(raw) * D2 + D1
}

/// Converts a raw humidity word to relative humidity in percent.
///
/// `temperature` is the temperature in degrees Celsius measured alongside the
/// humidity; it drives the compensation term, which vanishes at 25 °C.
pub fn humidity_from_raw(raw: u16, temperature: f32) -> f32 {
    let raw = f32::from(raw);
    let linear = C1 + C2 * raw + C3 * raw * raw;

    (temperature - REFERENCE_TEMPERATURE) * (T1 + T2 * raw) + linear
}
