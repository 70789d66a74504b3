//! Ingestion sink: where each tick's sensor values go.
//!
//! `Mqtt` publishes one JSON message per sensor value to
//! `tele/<plot>/reading`; `Log` only logs (display-only runs).

use std::time::Duration;

use anyhow::{Context, Result};
use plot_sim::SensorKind;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use serde::Serialize;
use time::OffsetDateTime;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::state::SharedState;

/// Delay before polling again after an MQTT connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct IngestMsg<'a> {
    ts: i64,
    plot: &'a str,
    sensor_type: SensorKind,
    value: f64,
    source: &'static str,
}

/// Topic a plot's readings are published on.
pub fn topic_for(plot_id: &str) -> String {
    format!("tele/{plot_id}/reading")
}

// ---------------------------------------------------------------------------
// Sink
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub enum Sink {
    Mqtt(AsyncClient),
    Log,
}

impl Sink {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Mqtt(_) => "mqtt",
            Self::Log => "log",
        }
    }

    /// Deliver one sensor value without blocking.  A full or closed MQTT
    /// queue is an error for the caller to log; it never stalls the tick.
    pub async fn send(
        &self,
        plot_id: &str,
        ts: OffsetDateTime,
        kind: SensorKind,
        value: f64,
    ) -> Result<()> {
        match self {
            Self::Mqtt(client) => {
                let msg = IngestMsg {
                    ts: ts.unix_timestamp(),
                    plot: plot_id,
                    sensor_type: kind,
                    value,
                    source: "simulator",
                };
                let payload = serde_json::to_vec(&msg)?;
                // Never wait for room in the request queue: while the broker
                // is unreachable the event loop stops draining it.
                client
                    .try_publish(topic_for(plot_id), QoS::AtLeastOnce, false, payload)
                    .with_context(|| format!("publish {kind} for plot {plot_id}"))?;
                Ok(())
            }
            Self::Log => {
                debug!(plot = %plot_id, sensor = %kind, value, "reading");
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// MQTT connection
// ---------------------------------------------------------------------------

pub fn connect_mqtt(host: &str, port: u16) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new("plot-generator", host, port);
    options.set_keep_alive(Duration::from_secs(30));
    AsyncClient::new(options, 20)
}

/// Poll the MQTT event loop forever so publishes are flushed and the
/// connection is kept alive.  Intended to be `tokio::spawn`-ed from main.
pub async fn drive_event_loop(mut eventloop: EventLoop, shared: SharedState) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                info!("mqtt connected");
                let mut st = shared.write().await;
                st.mqtt_connected = true;
                st.record_system("mqtt connected".to_string());
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                warn!("mqtt disconnected");
                let mut st = shared.write().await;
                st.mqtt_connected = false;
                st.record_system("mqtt disconnected".to_string());
            }
            Ok(_) => {}
            Err(e) => {
                warn!("mqtt error: {e}. reconnecting...");
                let mut st = shared.write().await;
                if st.mqtt_connected {
                    st.record_error(None, format!("mqtt error: {e}"));
                }
                st.mqtt_connected = false;
                drop(st);

                sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
