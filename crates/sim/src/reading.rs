//! Emitted reading records and the optional in-memory history.

use serde::Serialize;
use time::OffsetDateTime;

use crate::measure::{Measurements, SensorKind};
use crate::mode::Mode;

/// One tick's output.  Values are rounded to two decimals.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub mode: Mode,
    pub temperature: f64,
    pub humidity: f64,
    pub soil_moisture: f64,
}

impl Reading {
    pub(crate) fn capture(timestamp: OffsetDateTime, mode: Mode, values: &Measurements) -> Self {
        Self {
            timestamp,
            mode,
            temperature: round2(values.temperature),
            humidity: round2(values.humidity),
            soil_moisture: round2(values.soil_moisture),
        }
    }

    pub fn value(&self, kind: SensorKind) -> f64 {
        match kind {
            SensorKind::Temperature => self.temperature,
            SensorKind::Humidity => self.humidity,
            SensorKind::Moisture => self.soil_moisture,
        }
    }

    /// `(kind, value)` pairs in ingestion order.
    pub fn values(&self) -> [(SensorKind, f64); 3] {
        SensorKind::ALL.map(|k| (k, self.value(k)))
    }

    /// Sensors whose value lies outside the display comfort band.
    pub fn alerts(&self) -> Vec<SensorKind> {
        SensorKind::ALL
            .into_iter()
            .filter(|k| !k.comfort_band().contains(&self.value(*k)))
            .collect()
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ---------------------------------------------------------------------------
// History
// ---------------------------------------------------------------------------

/// Column-wise record of every emitted reading, for plotting.  Grows without
/// bound; callers that run indefinitely should [`clear`](Self::clear) it.
#[derive(Debug, Clone, Default)]
pub struct History {
    pub timestamps: Vec<OffsetDateTime>,
    pub temperatures: Vec<f64>,
    pub humidities: Vec<f64>,
    pub moistures: Vec<f64>,
}

impl History {
    pub fn push(&mut self, reading: &Reading) {
        self.timestamps.push(reading.timestamp);
        self.temperatures.push(reading.temperature);
        self.humidities.push(reading.humidity);
        self.moistures.push(reading.soil_moisture);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn clear(&mut self) {
        self.timestamps.clear();
        self.temperatures.clear();
        self.humidities.clear();
        self.moistures.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anomaly::AnomalyKind;
    use time::macros::datetime;

    fn sample() -> Reading {
        Reading::capture(
            datetime!(2024-06-01 14:05:00 UTC),
            Mode::Anomaly(AnomalyKind::TempSpike),
            &Measurements::new(33.456_7, 28.001, 64.996),
        )
    }

    #[test]
    fn capture_rounds_to_two_decimals() {
        let r = sample();
        assert_eq!(r.temperature, 33.46);
        assert_eq!(r.humidity, 28.0);
        assert_eq!(r.soil_moisture, 65.0);
    }

    #[test]
    fn reading_serializes_with_flat_mode_and_rfc3339() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["mode"], "temp_spike");
        assert_eq!(json["timestamp"], "2024-06-01T14:05:00Z");
        assert_eq!(json["temperature"], 33.46);
        assert_eq!(json.as_object().unwrap().len(), 5);
    }

    #[test]
    fn values_follow_ingestion_order() {
        let kinds: Vec<SensorKind> = sample().values().iter().map(|(k, _)| *k).collect();
        assert_eq!(
            kinds,
            vec![SensorKind::Temperature, SensorKind::Humidity, SensorKind::Moisture]
        );
    }

    #[test]
    fn alerts_flag_out_of_band_values() {
        // 33.46 °C > 32, 28 % humidity < 30, 65 % soil in band.
        assert_eq!(
            sample().alerts(),
            vec![SensorKind::Temperature, SensorKind::Humidity]
        );

        let calm = Reading::capture(
            datetime!(2024-06-01 14:05:00 UTC),
            Mode::Normal,
            &Measurements::new(23.0, 60.0, 65.0),
        );
        assert!(calm.alerts().is_empty());
    }

    #[test]
    fn history_is_column_aligned() {
        let mut h = History::default();
        assert!(h.is_empty());
        h.push(&sample());
        h.push(&sample());
        assert_eq!(h.len(), 2);
        assert_eq!(h.temperatures, vec![33.46, 33.46]);
        assert_eq!(h.moistures.len(), 2);
        h.clear();
        assert!(h.is_empty());
        assert!(h.humidities.is_empty());
    }
}
