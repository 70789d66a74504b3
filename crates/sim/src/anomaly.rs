//! Anomaly kinds and the per-kind effect table.
//!
//! Each anomaly drives one *primary* channel, either converging toward a
//! fixed target or falling at a constant rate, and optionally nudges a
//! second channel (a *cross effect*).  The behaviour of every kind lives in
//! [`AnomalyKind::effect`]; the simulator never matches on individual kinds.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::measure::{Measurements, SensorKind};

/// Anomaly ramp-up is judged against this fixed window, independent of the
/// configured anomaly duration.
pub const RAMP_WINDOW_SECS: f64 = 10.0;

/// A converging ramp closes `progress / RAMP_DIVISOR` of the gap per tick.
const RAMP_DIVISOR: f64 = 5.0;

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    TempSpike,
    TempLow,
    HumiditySpike,
    HumidityDrop,
    MoistureDrop,
    MoistureLeak,
}

impl AnomalyKind {
    pub const ALL: [AnomalyKind; 6] = [
        Self::TempSpike,
        Self::TempLow,
        Self::HumiditySpike,
        Self::HumidityDrop,
        Self::MoistureDrop,
        Self::MoistureLeak,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::TempSpike => "temp_spike",
            Self::TempLow => "temp_low",
            Self::HumiditySpike => "humidity_spike",
            Self::HumidityDrop => "humidity_drop",
            Self::MoistureDrop => "moisture_drop",
            Self::MoistureLeak => "moisture_leak",
        }
    }

    /// The effect table.
    pub fn effect(self) -> AnomalyEffect {
        use SensorKind::{Humidity, Moisture, Temperature};

        let (channel, ramp, cross) = match self {
            Self::TempSpike => (Temperature, Ramp::Toward(38.0), (Humidity, -3.0 / 5.0)),
            Self::TempLow => (Temperature, Ramp::Toward(8.0), (Humidity, 2.0 / 5.0)),
            Self::HumiditySpike => (Humidity, Ramp::Toward(95.0), (Temperature, -1.0 / 5.0)),
            Self::HumidityDrop => (Humidity, Ramp::Toward(20.0), (Moisture, -2.0 / 5.0)),
            // No convergence target: an unbounded leak until the mode ends.
            Self::MoistureDrop => (Moisture, Ramp::Fall(35.0 / 3.0), (Humidity, -4.0 / 3.0)),
            Self::MoistureLeak => (Moisture, Ramp::Toward(85.0), (Humidity, 3.0 / 5.0)),
        };

        AnomalyEffect {
            channel,
            ramp,
            cross: CrossEffect {
                channel: cross.0,
                rate: cross.1,
            },
        }
    }
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known tags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag(pub String);

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown tag '{}'", self.0)
    }
}

impl std::error::Error for UnknownTag {}

impl FromStr for AnomalyKind {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Effects
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Ramp {
    /// Move `progress / 5` of the remaining gap toward the target.
    Toward(f64),
    /// Subtract `progress * rate` every tick.
    Fall(f64),
}

/// Secondary nudge: `progress * rate` added to `channel` every tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrossEffect {
    pub channel: SensorKind,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnomalyEffect {
    pub channel: SensorKind,
    pub ramp: Ramp,
    pub cross: CrossEffect,
}

impl AnomalyEffect {
    /// Apply one tick of this anomaly.  `progress` is expected in [0, 1].
    /// Values are left unclamped.
    pub fn apply(&self, values: &mut Measurements, progress: f64, cross_effects: bool) {
        let v = values.get_mut(self.channel);
        match self.ramp {
            Ramp::Toward(target) => *v += progress * (target - *v) / RAMP_DIVISOR,
            Ramp::Fall(rate) => *v -= progress * rate,
        }

        if cross_effects {
            *values.get_mut(self.cross.channel) += progress * self.cross.rate;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start() -> Measurements {
        Measurements::new(23.0, 60.0, 65.0)
    }

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    // -- Parsing ------------------------------------------------------------

    #[test]
    fn tags_round_trip_through_from_str() {
        for kind in AnomalyKind::ALL {
            assert_eq!(kind.as_str().parse::<AnomalyKind>(), Ok(kind));
        }
    }

    #[test]
    fn unknown_tag_rejected() {
        let err = "sensor_failure".parse::<AnomalyKind>().unwrap_err();
        assert_eq!(err, UnknownTag("sensor_failure".into()));
        assert_eq!(err.to_string(), "unknown tag 'sensor_failure'");
    }

    #[test]
    fn serde_uses_snake_case_tags() {
        let kind: AnomalyKind = serde_json::from_str(r#""humidity_drop""#).unwrap();
        assert_eq!(kind, AnomalyKind::HumidityDrop);
        assert_eq!(
            serde_json::to_string(&AnomalyKind::MoistureLeak).unwrap(),
            r#""moisture_leak""#
        );
    }

    // -- Effects ------------------------------------------------------------

    #[test]
    fn zero_progress_changes_nothing() {
        for kind in AnomalyKind::ALL {
            let mut v = start();
            kind.effect().apply(&mut v, 0.0, true);
            assert_eq!(v, start(), "{kind}");
        }
    }

    #[test]
    fn temp_spike_closes_a_fifth_of_the_gap() {
        let mut v = start();
        AnomalyKind::TempSpike.effect().apply(&mut v, 1.0, false);
        assert!(approx(v.temperature, 23.0 + (38.0 - 23.0) / 5.0));
        assert_eq!(v.humidity, 60.0);
    }

    #[test]
    fn cross_effect_only_when_enabled() {
        let mut off = start();
        AnomalyKind::TempSpike.effect().apply(&mut off, 1.0, false);
        let mut on = start();
        AnomalyKind::TempSpike.effect().apply(&mut on, 1.0, true);

        assert_eq!(off.humidity, 60.0);
        assert!(approx(on.humidity, 60.0 - 3.0 / 5.0));
    }

    #[test]
    fn moisture_drop_falls_linearly_without_target() {
        let mut v = Measurements::new(23.0, 60.0, 30.0);
        let effect = AnomalyKind::MoistureDrop.effect();
        effect.apply(&mut v, 1.0, true);
        assert!(approx(v.soil_moisture, 30.0 - 35.0 / 3.0));
        assert!(approx(v.humidity, 60.0 - 4.0 / 3.0));

        // Keeps falling below any plausible floor; clamping is the caller's job.
        effect.apply(&mut v, 1.0, false);
        assert!(v.soil_moisture < 25.0);
    }

    #[test]
    fn converging_anomalies_approach_their_target() {
        let cases = [
            (AnomalyKind::TempLow, SensorKind::Temperature, 8.0),
            (AnomalyKind::HumiditySpike, SensorKind::Humidity, 95.0),
            (AnomalyKind::HumidityDrop, SensorKind::Humidity, 20.0),
            (AnomalyKind::MoistureLeak, SensorKind::Moisture, 85.0),
        ];
        for (kind, channel, target) in cases {
            let mut v = start();
            for _ in 0..100 {
                kind.effect().apply(&mut v, 1.0, false);
            }
            assert!(
                (v.get(channel) - target).abs() < 0.01,
                "{kind}: {} did not reach {target}",
                v.get(channel)
            );
        }
    }

    #[test]
    fn cross_channels_differ_from_primary() {
        for kind in AnomalyKind::ALL {
            let effect = kind.effect();
            assert_ne!(effect.channel, effect.cross.channel, "{kind}");
        }
    }
}
