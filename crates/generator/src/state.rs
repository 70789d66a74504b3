use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use plot_sim::{Mode, Reading};

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<SystemState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

pub struct SystemState {
    pub started_at: Instant,
    pub mqtt_connected: bool,
    pub sink: String,
    pub plots: HashMap<String, PlotState>,
    pub events: VecDeque<SystemEvent>,
}

#[derive(Clone, Default, Serialize)]
pub struct PlotState {
    pub last_reading: Option<Reading>,
    pub ticks: u64,
    pub send_failures: u64,
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_irrigation: Option<OffsetDateTime>,
}

#[derive(Clone, Serialize)]
pub struct SystemEvent {
    #[serde(with = "time::serde::rfc3339")]
    pub ts: OffsetDateTime,
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot: Option<String>,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Mode,
    Irrigation,
    Error,
    System,
}

// ---------------------------------------------------------------------------
// JSON response (what the API returns)
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct StatusResponse {
    pub uptime_secs: u64,
    pub mqtt_connected: bool,
    pub sink: String,
    pub plots: HashMap<String, PlotState>,
    pub events: Vec<SystemEvent>,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl SystemState {
    pub fn new(plot_ids: &[String], sink: &str) -> Self {
        let plots = plot_ids
            .iter()
            .map(|id| (id.clone(), PlotState::default()))
            .collect();

        Self {
            started_at: Instant::now(),
            mqtt_connected: false,
            sink: sink.to_string(),
            plots,
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    /// Record the reading a plot emitted this tick.
    pub fn record_reading(&mut self, plot_id: &str, reading: Reading) {
        let plot = self.plots.entry(plot_id.to_string()).or_default();
        plot.ticks += 1;
        plot.last_reading = Some(reading);
    }

    /// Record a reading value the sink failed to accept.
    pub fn record_send_failure(&mut self, plot_id: &str, detail: String) {
        self.plots
            .entry(plot_id.to_string())
            .or_default()
            .send_failures += 1;
        self.push_event(EventKind::Error, Some(plot_id), detail);
    }

    pub fn record_mode_change(&mut self, plot_id: &str, from: Mode, to: Mode) {
        self.push_event(EventKind::Mode, Some(plot_id), format!("{from} -> {to}"));
    }

    pub fn record_irrigation(&mut self, plot_id: &str, at: OffsetDateTime, soil_moisture: f64) {
        self.plots
            .entry(plot_id.to_string())
            .or_default()
            .last_irrigation = Some(at);
        self.push_event(
            EventKind::Irrigation,
            Some(plot_id),
            format!("soil moisture now {soil_moisture:.2}%"),
        );
    }

    /// Record an error event.
    pub fn record_error(&mut self, plot_id: Option<&str>, detail: String) {
        self.push_event(EventKind::Error, plot_id, detail);
    }

    /// Record a generic system event.
    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, None, detail);
    }

    /// Build the JSON-serialisable status snapshot.
    pub fn to_status(&self) -> StatusResponse {
        StatusResponse {
            uptime_secs: self.started_at.elapsed().as_secs(),
            mqtt_connected: self.mqtt_connected,
            sink: self.sink.clone(),
            plots: self.plots.clone(),
            events: self.events.iter().rev().cloned().collect(),
        }
    }

    fn push_event(&mut self, kind: EventKind, plot_id: Option<&str>, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(SystemEvent {
            ts: OffsetDateTime::now_utc(),
            kind,
            plot: plot_id.map(str::to_string),
            detail,
        });
    }
}
