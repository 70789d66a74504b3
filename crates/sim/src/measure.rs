//! The three measured quantities, their baselines and physical limits.

use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sensor kinds
// ---------------------------------------------------------------------------

/// One of the three sensors every plot reports.  The lowercase names are the
/// `sensor_type` values the ingestion backend accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    /// Air temperature, °C.
    Temperature,
    /// Relative air humidity, %.
    Humidity,
    /// Soil moisture, %.
    Moisture,
}

impl SensorKind {
    pub const ALL: [SensorKind; 3] = [Self::Temperature, Self::Humidity, Self::Moisture];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Humidity => "humidity",
            Self::Moisture => "moisture",
        }
    }

    /// Hard physical clamp applied after every tick.
    pub fn limits(self) -> RangeInclusive<f64> {
        match self {
            Self::Temperature => 5.0..=45.0,
            Self::Humidity => 15.0..=95.0,
            Self::Moisture => 25.0..=85.0,
        }
    }

    /// Values outside this band are flagged as out of range for display.
    /// Narrower than [`limits`](Self::limits).
    pub fn comfort_band(self) -> RangeInclusive<f64> {
        match self {
            Self::Temperature => 10.0..=32.0,
            Self::Humidity => 30.0..=85.0,
            Self::Moisture => 35.0..=75.0,
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Three-channel value
// ---------------------------------------------------------------------------

/// A value per sensor.  Used for current readings, drift offsets, diurnal
/// targets and the recovery snapshot alike.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Measurements {
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
}

/// Fixed baselines every plot oscillates around.
pub const BASELINE: Measurements = Measurements::new(23.0, 60.0, 65.0);

impl Measurements {
    pub const fn new(temperature: f64, humidity: f64, soil_moisture: f64) -> Self {
        Self {
            temperature,
            humidity,
            soil_moisture,
        }
    }

    pub fn get(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::Moisture => self.soil_moisture,
        }
    }

    pub fn get_mut(&mut self, kind: SensorKind) -> &mut f64 {
        match kind {
            SensorKind::Temperature => &mut self.temperature,
            SensorKind::Humidity => &mut self.humidity,
            SensorKind::Moisture => &mut self.soil_moisture,
        }
    }

    /// Every channel clamped to its physical limits.
    pub fn clamped(mut self) -> Self {
        for kind in SensorKind::ALL {
            let limits = kind.limits();
            let v = self.get_mut(kind);
            *v = v.clamp(*limits.start(), *limits.end());
        }
        self
    }

    /// Linear interpolation from `self` (t = 0) to `to` (t = 1).
    pub fn lerp(self, to: Self, t: f64) -> Self {
        let mut out = self;
        for kind in SensorKind::ALL {
            let from = self.get(kind);
            *out.get_mut(kind) = from + (to.get(kind) - from) * t;
        }
        out
    }
}
