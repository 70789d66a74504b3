//! Per-plot tick loops and their supervisors.
//!
//! Every plot runs in its own tokio task that owns its simulator outright;
//! nothing is shared between plots except the status snapshot.  A
//! supervisor task restarts a plot's loop after a pause if it panics, so one
//! misbehaving plot never takes its siblings down.
//!
//! ```text
//! supervise ──spawn──▶ plot_loop: tick ─▶ sink ×3 ─▶ status ─▶ advance ─┐
//!     ▲                    ▲                                             │
//!     │ panic → wait 60 s  └─────────────────────────────────────────────┘
//!     └──────────── restart with a freshly planned simulator
//! ```

use std::time::Duration;

use plot_sim::{clock, AnomalyKind, ScriptedAnomaly, Simulator, SimulatorConfig, TimeMode};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{PlotEntry, SimulationSettings};
use crate::sink::Sink;
use crate::state::SharedState;

/// Pause before restarting a plot whose loop panicked.
const RESTART_DELAY: Duration = Duration::from_secs(60);

/// Only every n-th sink failure of a plot is logged.
const FAILURE_LOG_EVERY: u64 = 6;

/// History is cleared once it reaches this many readings.
const HISTORY_LIMIT: usize = 10_000;

/// Random scenarios fire this many minutes after start.
const RANDOM_SCENARIO_WINDOW_MIN: (f64, f64) = (30.0, 90.0);
const RANDOM_SCENARIO_DURATION: Duration = Duration::from_secs(3600);

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Everything a plot loop needs besides its simulator.
#[derive(Clone)]
pub struct RunContext {
    pub interval: Duration,
    pub run_for: Option<Duration>,
    pub sink: Sink,
    pub shared: SharedState,
    pub shutdown: watch::Receiver<bool>,
}

/// Build the simulator config for one plot: durations drawn from the
/// configured ranges, scenario anchored at the current wall-clock time.
pub fn plan_plot(
    entry: &PlotEntry,
    settings: &SimulationSettings,
    rng: &mut fastrand::Rng,
) -> SimulatorConfig {
    let start = clock::wall_clock();

    let scenario = if !entry.scenario.is_empty() {
        entry
            .scenario
            .iter()
            .map(|e| ScriptedAnomaly {
                at: start + time::Duration::seconds(e.after_sec),
                kind: e.anomaly,
                duration: Duration::from_secs(e.duration_sec),
            })
            .collect()
    } else if settings.random_scenario {
        let (lo, hi) = RANDOM_SCENARIO_WINDOW_MIN;
        let after_min = lo + (hi - lo) * rng.f64();
        vec![ScriptedAnomaly {
            at: start + time::Duration::seconds_f64(after_min * 60.0),
            kind: AnomalyKind::ALL[rng.usize(..AnomalyKind::ALL.len())],
            duration: RANDOM_SCENARIO_DURATION,
        }]
    } else {
        Vec::new()
    };

    SimulatorConfig {
        seed: entry.seed,
        time_mode: settings.time_mode(),
        start: Some(start),
        cross_effects: settings.cross_effects,
        normal_duration: draw_secs(rng, settings.normal_min_sec, settings.normal_max_sec),
        anomaly_duration: draw_secs(rng, settings.anomaly_min_sec, settings.anomaly_max_sec),
        recovery_duration: draw_secs(rng, settings.recovery_min_sec, settings.recovery_max_sec),
        scenario,
    }
}

fn draw_secs(rng: &mut fastrand::Rng, min: u64, max: u64) -> Duration {
    Duration::from_secs(rng.u64(min..=max))
}

// ---------------------------------------------------------------------------
// Supervisor
// ---------------------------------------------------------------------------

/// Run one plot until shutdown, restarting its loop after a panic.
/// Intended to be `tokio::spawn`-ed from main, once per plot.
pub async fn supervise(entry: PlotEntry, settings: SimulationSettings, mut ctx: RunContext) {
    let mut rng = entry
        .seed
        .map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);

    loop {
        let config = plan_plot(&entry, &settings, &mut rng);
        if let Some(next) = config.scenario.first() {
            info!(
                plot = %entry.id,
                anomaly = %next.kind,
                at = %next.at,
                "scripted anomaly planned"
            );
        }
        info!(
            plot = %entry.id,
            normal_min = config.normal_duration.as_secs() / 60,
            anomaly_min = config.anomaly_duration.as_secs() / 60,
            recovery_min = config.recovery_duration.as_secs() / 60,
            "plot configured"
        );

        let sim = Simulator::new(entry.id.clone(), config);
        let handle = tokio::spawn(plot_loop(sim, ctx.clone()));

        match handle.await {
            Ok(()) => break,
            Err(e) if e.is_panic() => {
                error!(plot = %entry.id, "plot loop panicked: {e}; restarting in {RESTART_DELAY:?}");
                ctx.shared
                    .write()
                    .await
                    .record_error(Some(&entry.id), format!("plot loop panicked: {e}"));

                tokio::select! {
                    _ = sleep(RESTART_DELAY) => {}
                    _ = ctx.shutdown.changed() => break,
                }
            }
            Err(e) => {
                warn!(plot = %entry.id, "plot loop cancelled: {e}");
                break;
            }
        }
    }

    info!(plot = %entry.id, "plot stopped");
}

// ---------------------------------------------------------------------------
// Tick loop
// ---------------------------------------------------------------------------

/// Tick, publish and advance until shutdown or the run length is reached.
pub async fn plot_loop(mut sim: Simulator, mut ctx: RunContext) {
    let plot_id = sim.plot_id().to_string();
    let end = ctx
        .run_for
        .map(|d| sim.now() + time::Duration::seconds_f64(d.as_secs_f64()));
    let accelerated = matches!(sim.time_mode(), TimeMode::Accelerated { .. });

    let mut mode = sim.mode();
    let mut last_irrigation = sim.last_irrigation();
    let mut failures: u64 = 0;

    loop {
        if *ctx.shutdown.borrow() {
            break;
        }
        if end.is_some_and(|end| sim.now() >= end) {
            info!(plot = %plot_id, "run length reached");
            break;
        }

        let reading = sim.generate_reading();

        if reading.mode != mode {
            ctx.shared
                .write()
                .await
                .record_mode_change(&plot_id, mode, reading.mode);
            mode = reading.mode;
        }
        if sim.last_irrigation() != last_irrigation {
            last_irrigation = sim.last_irrigation();
            ctx.shared
                .write()
                .await
                .record_irrigation(&plot_id, last_irrigation, reading.soil_moisture);
        }

        let alerts = reading.alerts();
        if alerts.is_empty() {
            debug!(
                plot = %plot_id,
                mode = %reading.mode,
                temperature = reading.temperature,
                humidity = reading.humidity,
                soil_moisture = reading.soil_moisture,
                "reading"
            );
        } else {
            warn!(
                plot = %plot_id,
                mode = %reading.mode,
                temperature = reading.temperature,
                humidity = reading.humidity,
                soil_moisture = reading.soil_moisture,
                out_of_range = ?alerts,
                "reading out of range"
            );
        }

        for (kind, value) in reading.values() {
            if let Err(e) = ctx.sink.send(&plot_id, reading.timestamp, kind, value).await {
                failures += 1;
                if failures % FAILURE_LOG_EVERY == 1 {
                    warn!(plot = %plot_id, failures, "sink error: {e:#}");
                }
                ctx.shared
                    .write()
                    .await
                    .record_send_failure(&plot_id, format!("{e:#}"));
            }
        }

        ctx.shared.write().await.record_reading(&plot_id, reading);

        if sim.history().len() >= HISTORY_LIMIT {
            sim.clear_history();
        }

        tokio::select! {
            _ = sim.advance_time_async(ctx.interval) => {}
            _ = ctx.shutdown.changed() => break,
        }
        if accelerated {
            tokio::task::yield_now().await;
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
