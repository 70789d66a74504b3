//! TOML config file loading and validation for the simulation settings and
//! the plot registry.

use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use plot_sim::{AnomalyKind, TimeMode};
use serde::Deserialize;

/// Plots simulated when no config file exists.
const FALLBACK_PLOTS: &[&str] = &["1", "2", "3"];

// ---------------------------------------------------------------------------
// Config file structures
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub simulation: SimulationSettings,
    #[serde(default)]
    pub plots: Vec<PlotEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Seconds between ticks.
    pub interval_sec: u64,
    /// Accelerated clock instead of real sleeps.
    pub fast: bool,
    pub speed_factor: f64,
    pub cross_effects: bool,
    /// Simulated minutes to run per plot; 0 runs until shutdown.
    pub run_minutes: u64,
    pub normal_min_sec: u64,
    pub normal_max_sec: u64,
    pub anomaly_min_sec: u64,
    pub anomaly_max_sec: u64,
    pub recovery_min_sec: u64,
    pub recovery_max_sec: u64,
    /// Give plots without an explicit scenario one scripted anomaly
    /// 30-90 minutes after start.
    pub random_scenario: bool,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            interval_sec: 300,
            fast: false,
            speed_factor: 1.0,
            cross_effects: false,
            run_minutes: 0,
            normal_min_sec: 2 * 3600,
            normal_max_sec: 3 * 3600,
            anomaly_min_sec: 3600,
            anomaly_max_sec: 2 * 3600,
            recovery_min_sec: 30 * 60,
            recovery_max_sec: 45 * 60,
            random_scenario: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlotEntry {
    pub id: String,
    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(default)]
    pub scenario: Vec<ScenarioEntry>,
}

/// A scripted anomaly, `after_sec` seconds after the plot starts.
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioEntry {
    pub after_sec: i64,
    pub anomaly: AnomalyKind,
    pub duration_sec: u64,
}

// ---------------------------------------------------------------------------
// Derived values
// ---------------------------------------------------------------------------

impl SimulationSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_sec)
    }

    pub fn time_mode(&self) -> TimeMode {
        if self.fast {
            TimeMode::Accelerated {
                speed_factor: self.speed_factor,
            }
        } else {
            TimeMode::Realtime
        }
    }

    /// Simulated run length, `None` for unbounded.
    pub fn run_for(&self) -> Option<Duration> {
        (self.run_minutes > 0).then(|| Duration::from_secs(self.run_minutes * 60))
    }
}

impl Config {
    fn fallback() -> Self {
        Self {
            simulation: SimulationSettings::default(),
            plots: FALLBACK_PLOTS
                .iter()
                .map(|id| PlotEntry {
                    id: (*id).to_string(),
                    seed: None,
                    scenario: Vec::new(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

impl Config {
    /// Validate all entries.  Returns `Ok(())` or an error listing every
    /// violation found.
    pub fn validate(&self) -> Result<()> {
        let mut errors: Vec<String> = Vec::new();

        self.validate_simulation(&mut errors);
        self.validate_plots(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            bail!(
                "config validation failed ({} error{}):\n  - {}",
                errors.len(),
                if errors.len() == 1 { "" } else { "s" },
                errors.join("\n  - ")
            );
        }
    }

    fn validate_simulation(&self, errors: &mut Vec<String>) {
        let s = &self.simulation;

        if s.interval_sec == 0 {
            errors.push("simulation: interval_sec must be positive".to_string());
        }
        if !(s.speed_factor.is_finite() && s.speed_factor > 0.0) {
            errors.push(format!(
                "simulation: speed_factor must be positive, got {}",
                s.speed_factor
            ));
        }

        let ranges = [
            ("normal", s.normal_min_sec, s.normal_max_sec),
            ("anomaly", s.anomaly_min_sec, s.anomaly_max_sec),
            ("recovery", s.recovery_min_sec, s.recovery_max_sec),
        ];
        for (name, min, max) in ranges {
            if min == 0 {
                errors.push(format!("simulation: {name}_min_sec must be positive"));
            }
            if min > max {
                errors.push(format!(
                    "simulation: {name}_min_sec ({min}) exceeds {name}_max_sec ({max})"
                ));
            }
        }
    }

    fn validate_plots(&self, errors: &mut Vec<String>) {
        let mut seen_ids: HashSet<&str> = HashSet::new();

        for (i, p) in self.plots.iter().enumerate() {
            let ctx = || {
                if p.id.is_empty() {
                    format!("plots[{i}]")
                } else {
                    format!("plot '{}'", p.id)
                }
            };

            if p.id.trim().is_empty() {
                errors.push(format!("{}: id is empty", ctx()));
            } else if !seen_ids.insert(&p.id) {
                errors.push(format!("{}: duplicate id", ctx()));
            }

            let mut prev_after: Option<i64> = None;
            for (j, e) in p.scenario.iter().enumerate() {
                if e.after_sec < 0 {
                    errors.push(format!(
                        "{}: scenario[{j}] after_sec must not be negative, got {}",
                        ctx(),
                        e.after_sec
                    ));
                }
                if e.duration_sec == 0 {
                    errors.push(format!(
                        "{}: scenario[{j}] duration_sec must be positive",
                        ctx()
                    ));
                }
                if prev_after.is_some_and(|prev| e.after_sec < prev) {
                    errors.push(format!(
                        "{}: scenario[{j}] is out of order (after_sec {} before previous entry)",
                        ctx(),
                        e.after_sec
                    ));
                }
                prev_after = Some(e.after_sec);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Read, parse, and validate a TOML config file.  A missing file yields the
/// defaults with the fallback plot list.
pub fn load(path: &str) -> Result<Config> {
    if !Path::new(path).exists() {
        tracing::warn!(path, plots = ?FALLBACK_PLOTS, "config file not found, using defaults");
        return Ok(Config::fallback());
    }

    let contents =
        std::fs::read_to_string(path).with_context(|| format!("failed to read config: {path}"))?;
    let mut config: Config =
        toml::from_str(&contents).with_context(|| format!("failed to parse config: {path}"))?;
    if config.plots.is_empty() {
        tracing::warn!(path, "config lists no plots, using fallback plot list");
        config.plots = Config::fallback().plots;
    }
    config
        .validate()
        .with_context(|| format!("invalid config: {path}"))?;

    tracing::info!(
        plots = config.plots.len(),
        interval_sec = config.simulation.interval_sec,
        fast = config.simulation.fast,
        "config loaded"
    );
    Ok(config)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_plot() -> PlotEntry {
        PlotEntry {
            id: "1".into(),
            seed: Some(42),
            scenario: vec![ScenarioEntry {
                after_sec: 600,
                anomaly: AnomalyKind::TempSpike,
                duration_sec: 900,
            }],
        }
    }

    fn valid_config() -> Config {
        Config {
            simulation: SimulationSettings::default(),
            plots: vec![valid_plot()],
        }
    }

    /// Assert validation fails and the error message contains `needle`.
    fn assert_validation_err(cfg: &Config, needle: &str) {
        let err = cfg.validate().unwrap_err();
        let msg = format!("{err:#}");
        assert!(
            msg.contains(needle),
            "expected error containing {needle:?}, got: {msg}"
        );
    }

    // -- Parsing ----------------------------------------------------------

    #[test]
    fn parse_example_config() {
        let config: Config = toml::from_str(include_str!("../generator.example.toml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.plots.len(), 3);
        assert_eq!(config.plots[2].scenario.len(), 2);
        assert_eq!(config.plots[2].scenario[0].anomaly, AnomalyKind::MoistureDrop);
        assert_eq!(config.plots[1].seed, Some(84));
    }

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.plots.is_empty());
        assert_eq!(config.simulation.interval_sec, 300);
        assert!(!config.simulation.fast);
        assert!(config.simulation.random_scenario);
    }

    #[test]
    fn parse_partial_simulation_table() {
        let config: Config = toml::from_str(
            r#"
[simulation]
interval_sec = 2
fast = true
speed_factor = 30.0
"#,
        )
        .unwrap();
        assert_eq!(config.simulation.interval(), Duration::from_secs(2));
        assert_eq!(
            config.simulation.time_mode(),
            TimeMode::Accelerated { speed_factor: 30.0 }
        );
        assert_eq!(config.simulation.recovery_max_sec, 45 * 60);
    }

    #[test]
    fn parse_unknown_anomaly_fails() {
        let res = toml::from_str::<Config>(
            r#"
[[plots]]
id = "1"
[[plots.scenario]]
after_sec = 10
anomaly = "sensor_failure"
duration_sec = 60
"#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn run_for_zero_is_unbounded() {
        let mut s = SimulationSettings::default();
        assert_eq!(s.run_for(), None);
        s.run_minutes = 15;
        assert_eq!(s.run_for(), Some(Duration::from_secs(900)));
        assert_eq!(s.time_mode(), TimeMode::Realtime);
    }

    #[test]
    fn fallback_has_three_plots() {
        let cfg = Config::fallback();
        let ids: Vec<&str> = cfg.plots.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "2", "3"]);
        cfg.validate().unwrap();
    }

    #[test]
    fn load_missing_file_falls_back() {
        let cfg = load("/nonexistent/generator.toml").unwrap();
        assert_eq!(cfg.plots.len(), 3);
    }

    // -- Validation: simulation -------------------------------------------

    #[test]
    fn valid_config_passes() {
        valid_config().validate().unwrap();
    }

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = valid_config();
        cfg.simulation.interval_sec = 0;
        assert_validation_err(&cfg, "interval_sec must be positive");
    }

    #[test]
    fn non_positive_speed_factor_rejected() {
        let mut cfg = valid_config();
        cfg.simulation.speed_factor = 0.0;
        assert_validation_err(&cfg, "speed_factor must be positive");
        cfg.simulation.speed_factor = f64::NAN;
        assert_validation_err(&cfg, "speed_factor must be positive");
    }

    #[test]
    fn inverted_duration_range_rejected() {
        let mut cfg = valid_config();
        cfg.simulation.anomaly_min_sec = 7200;
        cfg.simulation.anomaly_max_sec = 3600;
        assert_validation_err(&cfg, "anomaly_min_sec (7200) exceeds anomaly_max_sec (3600)");
    }

    #[test]
    fn zero_duration_min_rejected() {
        let mut cfg = valid_config();
        cfg.simulation.recovery_min_sec = 0;
        assert_validation_err(&cfg, "recovery_min_sec must be positive");
    }

    // -- Validation: plots ------------------------------------------------

    #[test]
    fn empty_plot_id_rejected() {
        let mut cfg = valid_config();
        cfg.plots[0].id = "  ".into();
        assert_validation_err(&cfg, "id is empty");
    }

    #[test]
    fn duplicate_plot_id_rejected() {
        let mut cfg = valid_config();
        cfg.plots.push(valid_plot());
        assert_validation_err(&cfg, "plot '1': duplicate id");
    }

    #[test]
    fn negative_after_sec_rejected() {
        let mut cfg = valid_config();
        cfg.plots[0].scenario[0].after_sec = -5;
        assert_validation_err(&cfg, "after_sec must not be negative");
    }

    #[test]
    fn zero_scenario_duration_rejected() {
        let mut cfg = valid_config();
        cfg.plots[0].scenario[0].duration_sec = 0;
        assert_validation_err(&cfg, "duration_sec must be positive");
    }

    #[test]
    fn out_of_order_scenario_rejected() {
        let mut cfg = valid_config();
        cfg.plots[0].scenario.push(ScenarioEntry {
            after_sec: 60,
            anomaly: AnomalyKind::TempLow,
            duration_sec: 60,
        });
        assert_validation_err(&cfg, "scenario[1] is out of order");
    }

    #[test]
    fn multiple_errors_collected() {
        let mut cfg = valid_config();
        cfg.simulation.interval_sec = 0;
        cfg.plots[0].id = "".into();
        cfg.plots[0].scenario[0].duration_sec = 0;

        let msg = format!("{:#}", cfg.validate().unwrap_err());
        assert!(msg.contains("3 errors"), "got: {msg}");
        assert!(msg.contains("plots[0]: id is empty"));
    }
}
