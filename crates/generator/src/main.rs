mod config;
mod runner;
mod sink;
mod state;
mod web;

use anyhow::{Context, Result};
use std::{env, sync::Arc, time::Duration};
use tokio::sync::{watch, RwLock};
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use runner::RunContext;
use sink::Sink;
use state::SystemState;

/// Plot tasks are started this far apart so their ticks do not line up.
const PLOT_STAGGER: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // ── Env config ──────────────────────────────────────────────────
    let config_path = env::var("CONFIG_PATH").unwrap_or_else(|_| "generator.toml".to_string());
    let broker = env::var("MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = env::var("MQTT_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1883);
    let web_port: u16 = env::var("WEB_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let sink_kind = env::var("SINK").unwrap_or_else(|_| "mqtt".to_string());

    // ── Config file (settings + plot registry) ───────────────────────
    let cfg = config::load(&config_path)?;
    let plot_ids: Vec<String> = cfg.plots.iter().map(|p| p.id.clone()).collect();

    // ── Sink ────────────────────────────────────────────────────────
    let (sink, eventloop) = if sink_kind.eq_ignore_ascii_case("log") {
        (Sink::Log, None)
    } else {
        let (client, eventloop) = sink::connect_mqtt(&broker, port);
        (Sink::Mqtt(client), Some(eventloop))
    };

    // ── Shared state (ephemeral, for the status API) ────────────────
    let shared = Arc::new(RwLock::new(SystemState::new(&plot_ids, sink.name())));
    shared.write().await.record_system(format!(
        "generator started ({} plot(s), sink: {})",
        plot_ids.len(),
        sink.name()
    ));

    if let Some(eventloop) = eventloop {
        info!(broker = %broker, port, "publishing readings over mqtt");
        tokio::spawn(sink::drive_event_loop(eventloop, Arc::clone(&shared)));
    }

    // ── Status API ──────────────────────────────────────────────────
    let web_state = Arc::clone(&shared);
    tokio::spawn(async move {
        if let Err(e) = web::serve(web_state, web_port).await {
            error!("status api stopped: {e:#}");
        }
    });

    // ── Plots ───────────────────────────────────────────────────────
    let (stop_tx, stop_rx) = watch::channel(false);
    let ctx = RunContext {
        interval: cfg.simulation.interval(),
        run_for: cfg.simulation.run_for(),
        sink,
        shared: Arc::clone(&shared),
        shutdown: stop_rx,
    };

    info!(
        plots = plot_ids.len(),
        interval_sec = cfg.simulation.interval_sec,
        fast = cfg.simulation.fast,
        cross_effects = cfg.simulation.cross_effects,
        "starting simulators"
    );

    let mut tasks = JoinSet::new();
    for (i, entry) in cfg.plots.into_iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(PLOT_STAGGER).await;
        }
        tasks.spawn(runner::supervise(entry, cfg.simulation.clone(), ctx.clone()));
    }

    // ── Wait for Ctrl-C or for every plot to finish ─────────────────
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("failed to listen for ctrl-c")?;
            info!("shutdown requested, stopping after current tick");
            shared.write().await.record_system("shutdown requested".to_string());
            let _ = stop_tx.send(true);
        }
        _ = async { while tasks.join_next().await.is_some() {} } => {
            info!("all plots finished");
        }
    }

    while let Some(res) = tasks.join_next().await {
        if let Err(e) = res {
            warn!("plot supervisor ended abnormally: {e}");
        }
    }

    Ok(())
}
