// apiserver.rs

use std::{
    net,
    sync::{atomic::Ordering, Arc},
    time::Duration,
};

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use log::*;
use serde::Serialize;
use tokio::time::{sleep, Instant};

use crate::*;

#[derive(Clone, Debug, Serialize)]
pub struct Uptime {
    pub uptime: u64,
    pub uptime_s: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct FanStatus {
    pub duty_cycle_percent: u8,
    pub frequency_hz: f32,
    pub rpm: f32,
    /// Seconds left on a remote duty override.
    pub override_left: Option<u64>,
}

#[derive(Clone, Debug, Serialize)]
pub struct LinkReport {
    pub ip_addr: Option<String>,
    pub links: Vec<LinkStatus>,
}

pub fn api_router(state: Arc<MyState>) -> Router {
    Router::new()
        .route("/uptime", get(get_uptime))
        .route("/telemetry", get(get_telemetry))
        .route("/fan", get(get_fan))
        .route("/links", get(get_links))
        .route("/config", get(get_config))
        .with_state(state)
}

pub async fn run_api_server(state: Arc<MyState>) -> anyhow::Result<()> {
    if !state.config.api_enable {
        info!("API server is disabled.");
        // must not return, tokio::select in main() would exit
        loop {
            sleep(Duration::from_secs(3600)).await;
        }
    }

    loop {
        if state.wifi_up().await {
            break;
        }
        sleep(Duration::from_secs(1)).await;
    }

    let listen = format!("0.0.0.0:{}", state.config.port);
    let addr = listen.parse::<net::SocketAddr>()?;
    let app = api_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening to {listen}");
    Ok(axum::serve(listener, app.into_make_service()).await?)
}

pub async fn get_uptime(State(state): State<Arc<MyState>>) -> (StatusCode, Json<Uptime>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_uptime()");

    let uptime = state.uptime();
    let uptime_s = format!(
        "{}d {}h {}m {}s",
        uptime / 86400,
        uptime % 86400 / 3600,
        uptime % 3600 / 60,
        uptime % 60
    );
    (StatusCode::OK, Json(Uptime { uptime, uptime_s }))
}

pub async fn get_telemetry(State(state): State<Arc<MyState>>) -> (StatusCode, Json<Snapshot>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_telemetry()");
    (StatusCode::OK, Json(state.telemetry.snapshot().await))
}

pub async fn get_fan(State(state): State<Arc<MyState>>) -> (StatusCode, Json<FanStatus>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_fan()");

    let fan = state.telemetry.snapshot().await.fan;
    let now = Instant::now();
    let override_left = state
        .duty_override
        .read()
        .await
        .filter(|o| o.until > now)
        .map(|o| o.until.duration_since(now).as_secs());
    let status = FanStatus {
        duty_cycle_percent: fan.duty_cycle_percent,
        frequency_hz: fan.frequency_hz,
        rpm: rpm(fan.frequency_hz, state.config.pulses_per_rev),
        override_left,
    };
    (StatusCode::OK, Json(status))
}

pub async fn get_links(State(state): State<Arc<MyState>>) -> (StatusCode, Json<LinkReport>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_links()");

    let report = LinkReport {
        ip_addr: state.ip_addr.read().await.clone(),
        links: state.links.read().await.clone(),
    };
    (StatusCode::OK, Json(report))
}

pub async fn get_config(State(state): State<Arc<MyState>>) -> (StatusCode, Json<FanConfig>) {
    let cnt = state.api_cnt.fetch_add(1, Ordering::Relaxed);
    info!("#{cnt} get_config()");
    (StatusCode::OK, Json(state.config.clone()))
}


// EOF
