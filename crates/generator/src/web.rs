use anyhow::{Context, Result};
use axum::extract::State;
use axum::response::{IntoResponse, Json};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::info;

use crate::state::SharedState;

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn router(state: SharedState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/status", get(api_status))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn api_status(State(state): State<SharedState>) -> impl IntoResponse {
    let st = state.read().await;
    Json(st.to_status())
}

// ---------------------------------------------------------------------------
// Server entry-point
// ---------------------------------------------------------------------------

pub async fn serve(state: SharedState, port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind web port {port}"))?;

    info!("status api listening on http://{addr}/api/status");

    axum::serve(listener, router(state))
        .await
        .context("web server error")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::SystemState;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tokio::sync::RwLock;
    use tower::ServiceExt;

    fn test_state() -> SharedState {
        Arc::new(RwLock::new(SystemState::new(&["1".to_string()], "log")))
    }

    async fn get_body(state: SharedState, uri: &str) -> (StatusCode, Vec<u8>) {
        let resp = router(state)
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = resp.into_body().collect().await.unwrap().to_bytes();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn healthz_ok() {
        let (status, body) = get_body(test_state(), "/healthz").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"ok");
    }

    #[tokio::test]
    async fn status_reports_plots_and_events() {
        let state = test_state();
        state.write().await.record_system("generator started".into());

        let (status, body) = get_body(state, "/api/status").await;
        assert_eq!(status, StatusCode::OK);

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["sink"], "log");
        assert_eq!(json["mqtt_connected"], false);
        assert_eq!(json["plots"]["1"]["ticks"], 0);
        assert_eq!(json["events"][0]["detail"], "generator started");
    }

    #[tokio::test]
    async fn unknown_route_is_404() {
        let (status, _) = get_body(test_state(), "/api/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
