//! Stateful environmental sensor simulator for one plot.
//!
//! Each call to [`Simulator::generate_reading`] is one tick:
//! - mode transition check (scripted trigger, random anomaly, anomaly end,
//!   recovery end)
//! - drift random walk and irrigation check
//! - diurnal targets, then either smoothing toward them (normal/recovery) or
//!   the anomaly ramp
//! - clamp to physical limits and emit a rounded [`Reading`]
//!
//! All randomness comes from the simulator's own seeded generator, so two
//! simulators built from the same [`SimulatorConfig`] and stepped the same
//! way in accelerated mode produce identical readings.

use std::time::Duration;

use time::OffsetDateTime;
use tracing::info;

use crate::anomaly::{AnomalyKind, RAMP_WINDOW_SECS};
use crate::clock::{SimClock, TimeMode};
use crate::diurnal::{self, HUMIDITY_JITTER};
use crate::measure::{Measurements, SensorKind, BASELINE};
use crate::mode::Mode;
use crate::reading::{History, Reading};
use crate::scenario::{Scenario, ScriptedAnomaly};

// ---------------------------------------------------------------------------
// Tuning constants
// ---------------------------------------------------------------------------

/// Fraction of the gap to target closed per tick.
const SMOOTHING: Measurements = Measurements::new(0.15, 0.15, 0.10);
/// Half-width of the uniform per-tick noise.
const NOISE: Measurements = Measurements::new(0.3, 0.8, 0.15);

/// Half-width of the per-tick drift step.
const DRIFT_STEP: f64 = 0.005;
/// Drift offsets are bounded to this fraction of the baseline.
const DRIFT_BOUND: f64 = 0.2;

const IRRIGATION_BOOST_MIN: f64 = 15.0;
const IRRIGATION_BOOST_MAX: f64 = 25.0;
/// Irrigation never pushes soil moisture above this.
const IRRIGATION_CAP: f64 = 75.0;
const IRRIGATION_INTERVAL_HOURS: (f64, f64) = (12.0, 24.0);
/// The plot is assumed to have been irrigated this long before start.
const INITIAL_IRRIGATION_AGE_HOURS: i64 = 12;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// `None` seeds from entropy.
    pub seed: Option<u64>,
    pub time_mode: TimeMode,
    /// Initial simulated time.  `None` uses the wall clock.
    pub start: Option<OffsetDateTime>,
    pub cross_effects: bool,
    pub normal_duration: Duration,
    pub anomaly_duration: Duration,
    pub recovery_duration: Duration,
    pub scenario: Vec<ScriptedAnomaly>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            seed: None,
            time_mode: TimeMode::Realtime,
            start: None,
            cross_effects: false,
            normal_duration: Duration::from_secs(15 * 60),
            anomaly_duration: Duration::from_secs(10 * 60),
            recovery_duration: Duration::from_secs(5 * 60),
            scenario: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Recovery plan
// ---------------------------------------------------------------------------

/// Captured once when an anomaly ends: where the values were, and the
/// diurnal targets at that instant.  Both stay fixed for the whole recovery.
#[derive(Debug, Clone, Copy, PartialEq)]
struct RecoveryPlan {
    origin: Measurements,
    target: Measurements,
}

impl RecoveryPlan {
    fn goal_at(&self, progress: f64) -> Measurements {
        self.origin.lerp(self.target, progress)
    }
}

// ---------------------------------------------------------------------------
// Simulator
// ---------------------------------------------------------------------------

pub struct Simulator {
    plot_id: String,
    rng: fastrand::Rng,
    clock: SimClock,
    cross_effects: bool,

    baseline: Measurements,
    values: Measurements,
    drift: Measurements,

    last_irrigation: OffsetDateTime,
    irrigation_interval: Duration,

    mode: Mode,
    mode_start: OffsetDateTime,
    normal_duration: Duration,
    anomaly_duration: Duration,
    recovery_duration: Duration,
    recovery: Option<RecoveryPlan>,

    scenario: Scenario,
    history: History,
}

impl Simulator {
    pub fn new(plot_id: impl Into<String>, config: SimulatorConfig) -> Self {
        let mut rng = match config.seed {
            Some(seed) => fastrand::Rng::with_seed(seed),
            None => fastrand::Rng::new(),
        };
        let clock = match config.start {
            Some(start) => SimClock::starting_at(config.time_mode, start),
            None => SimClock::new(config.time_mode),
        };
        let now = clock.now();

        let values = Measurements::new(
            uniform(&mut rng, 20.0, 26.0),
            uniform(&mut rng, 55.0, 70.0),
            uniform(&mut rng, 55.0, 70.0),
        );
        let irrigation_interval = draw_irrigation_interval(&mut rng);

        Self {
            plot_id: plot_id.into(),
            rng,
            clock,
            cross_effects: config.cross_effects,
            baseline: BASELINE,
            values,
            drift: Measurements::default(),
            last_irrigation: now - time::Duration::hours(INITIAL_IRRIGATION_AGE_HOURS),
            irrigation_interval,
            mode: Mode::Normal,
            mode_start: now,
            normal_duration: config.normal_duration,
            anomaly_duration: config.anomaly_duration,
            recovery_duration: config.recovery_duration,
            recovery: None,
            scenario: Scenario::new(config.scenario),
            history: History::default(),
        }
    }

    // -- Accessors ----------------------------------------------------------

    pub fn plot_id(&self) -> &str {
        &self.plot_id
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn now(&self) -> OffsetDateTime {
        self.clock.now()
    }

    pub fn time_mode(&self) -> TimeMode {
        self.clock.mode()
    }

    /// Unrounded current values.
    pub fn values(&self) -> Measurements {
        self.values
    }

    pub fn drift(&self) -> Measurements {
        self.drift
    }

    pub fn last_irrigation(&self) -> OffsetDateTime {
        self.last_irrigation
    }

    pub fn irrigation_interval(&self) -> Duration {
        self.irrigation_interval
    }

    pub fn normal_duration(&self) -> Duration {
        self.normal_duration
    }

    pub fn anomaly_duration(&self) -> Duration {
        self.anomaly_duration
    }

    pub fn recovery_duration(&self) -> Duration {
        self.recovery_duration
    }

    /// Diurnal snapshot recovery is heading for; `Some` only in recovery.
    pub fn recovery_target(&self) -> Option<Measurements> {
        self.recovery.map(|plan| plan.target)
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn set_normal_duration(&mut self, d: Duration) {
        self.normal_duration = d;
    }

    pub fn set_anomaly_duration(&mut self, d: Duration) {
        self.anomaly_duration = d;
    }

    pub fn set_recovery_duration(&mut self, d: Duration) {
        self.recovery_duration = d;
    }

    // -- Tick ---------------------------------------------------------------

    /// Run one full tick and return the emitted reading.  The reading is
    /// also appended to [`history`](Self::history).
    pub fn generate_reading(&mut self) -> Reading {
        self.switch_mode_if_needed();
        self.update_values();

        let reading = Reading::capture(self.clock.now(), self.mode, &self.values);
        self.history.push(&reading);
        reading
    }

    /// Advance simulated time.  Blocks in real-time mode.
    pub fn advance_time(&mut self, interval: Duration) {
        self.clock.advance(interval);
    }

    /// Advance simulated time, suspending on the tokio timer in real-time
    /// mode.
    pub async fn advance_time_async(&mut self, interval: Duration) {
        self.clock.advance_async(interval).await;
    }

    // -- Mode state machine -------------------------------------------------

    fn switch_mode_if_needed(&mut self) {
        let now = self.clock.now();

        if self.mode == Mode::Normal {
            if let Some(entry) = self.scenario.take_due(now) {
                self.anomaly_duration = entry.duration;
                info!(
                    plot = %self.plot_id,
                    anomaly = %entry.kind,
                    duration_sec = entry.duration.as_secs(),
                    "scripted anomaly triggered"
                );
                self.enter(Mode::Anomaly(entry.kind), now);
                return;
            }
        }

        let elapsed = self.elapsed_in_mode();
        match self.mode {
            Mode::Normal if elapsed >= self.normal_duration.as_secs_f64() => {
                let kind = AnomalyKind::ALL[self.rng.usize(..AnomalyKind::ALL.len())];
                self.enter(Mode::Anomaly(kind), now);
            }
            Mode::Anomaly(_) if elapsed >= self.anomaly_duration.as_secs_f64() => {
                let target = self.diurnal_targets();
                self.recovery = Some(RecoveryPlan {
                    origin: self.values,
                    target,
                });
                self.enter(Mode::Recovery, now);
            }
            Mode::Recovery if elapsed >= self.recovery_duration.as_secs_f64() => {
                self.recovery = None;
                self.enter(Mode::Normal, now);
            }
            _ => {}
        }
    }

    fn enter(&mut self, next: Mode, now: OffsetDateTime) {
        info!(plot = %self.plot_id, from = %self.mode, to = %next, "mode change");
        self.mode = next;
        self.mode_start = now;
    }

    fn elapsed_in_mode(&self) -> f64 {
        (self.clock.now() - self.mode_start).as_seconds_f64()
    }

    fn recovery_progress(&self) -> f64 {
        let total = self.recovery_duration.as_secs_f64();
        if total <= 0.0 {
            return 1.0;
        }
        (self.elapsed_in_mode() / total).clamp(0.0, 1.0)
    }

    // -- Value update -------------------------------------------------------

    fn update_values(&mut self) {
        self.apply_drift();
        self.check_irrigation();

        let diurnal = self.diurnal_targets();

        match self.mode {
            Mode::Normal | Mode::Recovery => {
                let goal = match (self.mode, self.recovery) {
                    (Mode::Recovery, Some(plan)) => plan.goal_at(self.recovery_progress()),
                    _ => diurnal,
                };
                self.smooth_toward(goal);
            }
            Mode::Anomaly(kind) => {
                let progress = (self.elapsed_in_mode() / RAMP_WINDOW_SECS).clamp(0.0, 1.0);
                kind.effect()
                    .apply(&mut self.values, progress, self.cross_effects);
            }
        }

        self.values = self.values.clamped();
    }

    fn apply_drift(&mut self) {
        for kind in SensorKind::ALL {
            let bound = DRIFT_BOUND * self.baseline.get(kind);
            let step = jitter(&mut self.rng, DRIFT_STEP);
            let d = self.drift.get_mut(kind);
            *d = (*d + step).clamp(-bound, bound);
        }
    }

    /// Returns the soil moisture boost when an irrigation event fired.
    fn check_irrigation(&mut self) -> Option<f64> {
        let now = self.clock.now();
        let since = (now - self.last_irrigation).as_seconds_f64();
        if since < self.irrigation_interval.as_secs_f64() {
            return None;
        }

        let increase = uniform(&mut self.rng, IRRIGATION_BOOST_MIN, IRRIGATION_BOOST_MAX);
        let soil = self.values.soil_moisture;
        // The cap limits the boost; it never lowers an already wetter plot.
        self.values.soil_moisture = soil.max((soil + increase).min(IRRIGATION_CAP));
        self.last_irrigation = now;
        self.irrigation_interval = draw_irrigation_interval(&mut self.rng);

        info!(
            plot = %self.plot_id,
            increase = format_args!("{increase:.2}"),
            next_in_hours = format_args!("{:.1}", self.irrigation_interval.as_secs_f64() / 3600.0),
            "irrigation"
        );
        Some(increase)
    }

    fn diurnal_targets(&mut self) -> Measurements {
        let now = self.clock.now();
        let hours_since_irrigation = (now - self.last_irrigation).as_seconds_f64() / 3600.0;
        let humidity_jitter = jitter(&mut self.rng, HUMIDITY_JITTER);
        diurnal::targets(
            &self.baseline,
            diurnal::fractional_hour(now),
            hours_since_irrigation,
            humidity_jitter,
        )
    }

    fn smooth_toward(&mut self, goal: Measurements) {
        for kind in SensorKind::ALL {
            let noise = jitter(&mut self.rng, NOISE.get(kind));
            let drift = self.drift.get(kind);
            let v = self.values.get_mut(kind);
            *v += SMOOTHING.get(kind) * (goal.get(kind) - *v) + noise + drift;
        }
    }
}

// ---------------------------------------------------------------------------
// Random helpers
// ---------------------------------------------------------------------------

/// Uniform sample in `[lo, hi)`.
fn uniform(rng: &mut fastrand::Rng, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * rng.f64()
}

/// Uniform sample in `[-half_width, half_width)`.
fn jitter(rng: &mut fastrand::Rng, half_width: f64) -> f64 {
    uniform(rng, -half_width, half_width)
}

fn draw_irrigation_interval(rng: &mut fastrand::Rng) -> Duration {
    let (lo, hi) = IRRIGATION_INTERVAL_HOURS;
    Duration::from_secs_f64(uniform(rng, lo, hi) * 3600.0)
}

// ===========================================================================
// Tests
// ===========================================================================
