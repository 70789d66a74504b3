//! Synthetic environmental sensor simulator for agricultural plots.
//!
//! A [`Simulator`] produces a continuous stream of temperature, air
//! humidity and soil moisture [`Reading`]s following a diurnal cycle, slow
//! sensor drift, periodic irrigation, and scripted or random anomaly
//! episodes with a gradual recovery back to baseline.
//!
//! ```no_run
//! use std::time::Duration;
//! use plot_sim::{Simulator, SimulatorConfig, TimeMode};
//!
//! let mut sim = Simulator::new(
//!     "plot-1",
//!     SimulatorConfig {
//!         seed: Some(42),
//!         time_mode: TimeMode::Accelerated { speed_factor: 60.0 },
//!         ..SimulatorConfig::default()
//!     },
//! );
//! loop {
//!     let reading = sim.generate_reading();
//!     println!("{} {}", reading.mode, reading.temperature);
//!     sim.advance_time(Duration::from_secs(5));
//! }
//! ```

pub mod anomaly;
pub mod clock;
pub mod diurnal;
pub mod measure;
pub mod mode;
pub mod reading;
pub mod scenario;
pub mod simulator;

pub use anomaly::{AnomalyKind, UnknownTag};
pub use clock::{SimClock, TimeMode};
pub use measure::{Measurements, SensorKind, BASELINE};
pub use mode::Mode;
pub use reading::{History, Reading};
pub use scenario::{Scenario, ScriptedAnomaly};
pub use simulator::{Simulator, SimulatorConfig};
