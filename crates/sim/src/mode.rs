//! Operating mode of a simulator and its flat string tag.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Serializer};

use crate::anomaly::{AnomalyKind, UnknownTag};

/// The simulator's operating regime.  Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Mode {
    #[default]
    Normal,
    /// Easing back from an anomaly toward the captured diurnal snapshot.
    Recovery,
    Anomaly(AnomalyKind),
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Recovery => "recovery",
            Self::Anomaly(kind) => kind.as_str(),
        }
    }

    pub fn anomaly(&self) -> Option<AnomalyKind> {
        match self {
            Self::Anomaly(kind) => Some(*kind),
            _ => None,
        }
    }

    pub fn is_anomaly(&self) -> bool {
        self.anomaly().is_some()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(Self::Normal),
            "recovery" => Ok(Self::Recovery),
            other => other.parse().map(Self::Anomaly),
        }
    }
}

/// Serialized as its flat string tag (`"normal"`, `"temp_spike"`, ...).
impl Serialize for Mode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_tags_are_flat() {
        assert_eq!(Mode::Normal.to_string(), "normal");
        assert_eq!(Mode::Recovery.to_string(), "recovery");
        assert_eq!(Mode::Anomaly(AnomalyKind::TempLow).to_string(), "temp_low");
    }

    #[test]
    fn mode_from_str() {
        assert_eq!("normal".parse::<Mode>(), Ok(Mode::Normal));
        assert_eq!("recovery".parse::<Mode>(), Ok(Mode::Recovery));
        assert_eq!(
            "moisture_drop".parse::<Mode>(),
            Ok(Mode::Anomaly(AnomalyKind::MoistureDrop))
        );
        assert!("idle".parse::<Mode>().is_err());
    }

    #[test]
    fn mode_serializes_as_string() {
        let json = serde_json::to_string(&Mode::Anomaly(AnomalyKind::HumiditySpike)).unwrap();
        assert_eq!(json, r#""humidity_spike""#);
    }

    #[test]
    fn default_is_normal() {
        assert_eq!(Mode::default(), Mode::Normal);
        assert!(!Mode::Recovery.is_anomaly());
        assert!(Mode::Anomaly(AnomalyKind::TempSpike).is_anomaly());
    }
}
