// state.rs

use std::sync::atomic::AtomicU64;

use tokio::{sync::RwLock, time::Instant};

use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DutyOverride {
    pub percent: u8,
    pub until: Instant,
}

/// State shared between the scheduler and the status API.
pub struct MyState {
    pub config: FanConfig,
    pub started: Instant,
    pub api_cnt: AtomicU64,
    pub telemetry: TelemetryStore,
    pub links: RwLock<Vec<LinkStatus>>,
    pub ip_addr: RwLock<Option<String>>,
    pub duty_override: RwLock<Option<DutyOverride>>,
}

impl MyState {
    pub fn new(config: FanConfig) -> Self {
        MyState {
            config,
            started: Instant::now(),
            api_cnt: AtomicU64::new(0),
            telemetry: TelemetryStore::new(),
            links: RwLock::new(Vec::new()),
            ip_addr: RwLock::new(None),
            duty_override: RwLock::new(None),
        }
    }

    pub async fn wifi_up(&self) -> bool {
        self.links
            .read()
            .await
            .iter()
            .any(|l| l.link == LinkId::Wifi && l.state == LinkState::Up)
    }

    pub fn uptime(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}

// EOF
