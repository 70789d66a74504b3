//! Day/night target curves.
//!
//! Temperature follows a 24 h sinusoid, humidity mirrors it (scaled by 0.8)
//! and soil moisture decays linearly since the last irrigation, faster
//! during the day.

use std::f64::consts::PI;
use std::ops::RangeInclusive;

use time::OffsetDateTime;

use crate::measure::Measurements;

/// Peak deviation of the temperature curve from its baseline, °C.
pub const TEMPERATURE_AMPLITUDE: f64 = 5.0;
/// Humidity moves opposite to temperature by this fraction of the amplitude.
const HUMIDITY_COUPLING: f64 = 0.8;
/// Half-width of the uniform jitter the caller adds to the humidity target.
pub const HUMIDITY_JITTER: f64 = 2.0;

const SOIL_FLOOR: f64 = 45.0;
const DAYTIME_HOURS: RangeInclusive<f64> = 10.0..=18.0;
const DAY_DECAY_PER_HOUR: f64 = 0.15;
const NIGHT_DECAY_PER_HOUR: f64 = 0.05;

/// Hour of day with minutes as the fraction (`14:30` → `14.5`).
pub fn fractional_hour(t: OffsetDateTime) -> f64 {
    f64::from(t.hour()) + f64::from(t.minute()) / 60.0
}

/// Diurnal targets for the given time of day.
///
/// Pure: the humidity jitter is drawn by the caller and passed in, so this
/// can be evaluated any number of times per tick.
pub fn targets(
    baseline: &Measurements,
    hour: f64,
    hours_since_irrigation: f64,
    humidity_jitter: f64,
) -> Measurements {
    let cycle = (2.0 * PI * (hour - 6.0) / 24.0).sin();

    let temperature = baseline.temperature + TEMPERATURE_AMPLITUDE * cycle;
    let humidity =
        baseline.humidity - HUMIDITY_COUPLING * TEMPERATURE_AMPLITUDE * cycle + humidity_jitter;

    let decay = if DAYTIME_HOURS.contains(&hour) {
        DAY_DECAY_PER_HOUR
    } else {
        NIGHT_DECAY_PER_HOUR
    };
    let soil_moisture = (baseline.soil_moisture - decay * hours_since_irrigation).max(SOIL_FLOOR);

    Measurements::new(temperature, humidity, soil_moisture)
}
