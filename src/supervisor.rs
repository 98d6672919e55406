// supervisor.rs

//! Link state machines for WiFi, broker and dashboard.
//!
//! ```text
//!   Down ──(prerequisite Up, retry due)──▶ Connecting ──ok──▶ Up
//!    ▲                                        │               │
//!    └──────────── failure, retry after backoff ◀─────────────┘
//! ```
//!
//! The backoff is a fixed interval, there is no growth between attempts.
//! Broker and dashboard need WiFi `Up`; losing WiFi drops them too.
//! There is no terminal state.

use std::{fmt, time::Duration};

use log::*;
use serde::Serialize;
use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkId {
    Wifi,
    Broker,
    Dashboard,
}

impl LinkId {
    pub const ALL: [LinkId; 3] = [LinkId::Wifi, LinkId::Broker, LinkId::Dashboard];

    pub fn prerequisite(&self) -> Option<LinkId> {
        match self {
            LinkId::Wifi => None,
            LinkId::Broker | LinkId::Dashboard => Some(LinkId::Wifi),
        }
    }

    fn index(&self) -> usize {
        match self {
            LinkId::Wifi => 0,
            LinkId::Broker => 1,
            LinkId::Dashboard => 2,
        }
    }
}

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LinkId::Wifi => "wifi",
            LinkId::Broker => "broker",
            LinkId::Dashboard => "dashboard",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Down,
    Connecting,
    Up,
}

/// A link's state as seen together with WiFi.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    WifiDown,
    WifiUpLinkDown,
    LinkUp,
}

#[derive(Clone, Copy, Debug)]
struct LinkEntry {
    enabled: bool,
    state: LinkState,
    retry_at: Instant,
    checked_at: Instant,
    failures: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct LinkStatus {
    pub link: LinkId,
    pub enabled: bool,
    pub state: LinkState,
    pub connectivity: Connectivity,
    pub failures: u32,
}

#[derive(Clone, Debug)]
pub struct Supervisor {
    backoff: Duration,
    ping_interval: Duration,
    links: [LinkEntry; 3],
}

impl Supervisor {
    /// All links start `Down` and may be attempted right away.
    pub fn new(backoff: Duration, ping_interval: Duration, now: Instant) -> Self {
        let entry = LinkEntry {
            enabled: true,
            state: LinkState::Down,
            retry_at: now,
            checked_at: now,
            failures: 0,
        };
        Self {
            backoff,
            ping_interval,
            links: [entry; 3],
        }
    }

    /// A disabled link stays `Down` and is never attempted.
    pub fn set_enabled(&mut self, link: LinkId, enabled: bool) {
        self.links[link.index()].enabled = enabled;
    }

    pub fn state(&self, link: LinkId) -> LinkState {
        self.links[link.index()].state
    }

    pub fn is_up(&self, link: LinkId) -> bool {
        self.state(link) == LinkState::Up
    }

    pub fn connectivity(&self, link: LinkId) -> Connectivity {
        if !self.is_up(LinkId::Wifi) {
            Connectivity::WifiDown
        } else if self.is_up(link) {
            Connectivity::LinkUp
        } else {
            Connectivity::WifiUpLinkDown
        }
    }

    pub fn retry_at(&self, link: LinkId) -> Instant {
        self.links[link.index()].retry_at
    }

    pub fn should_attempt(&self, link: LinkId, now: Instant) -> bool {
        let e = &self.links[link.index()];
        e.enabled
            && e.state == LinkState::Down
            && now >= e.retry_at
            && link.prerequisite().map_or(true, |p| self.is_up(p))
    }

    pub fn begin_attempt(&mut self, link: LinkId) {
        let e = &mut self.links[link.index()];
        if e.state == LinkState::Down {
            info!("{link} connecting...");
            e.state = LinkState::Connecting;
        }
    }

    pub fn attempt_succeeded(&mut self, link: LinkId, now: Instant) {
        let e = &mut self.links[link.index()];
        if e.state != LinkState::Connecting {
            warn!("{link} connected while {:?}, ignored", e.state);
            return;
        }
        info!("{link} up.");
        e.state = LinkState::Up;
        e.checked_at = now;
        e.failures = 0;
    }

    /// Force the link `Down` and schedule the next attempt one backoff from now.
    pub fn mark_down(&mut self, link: LinkId, now: Instant) {
        let backoff = self.backoff;
        let e = &mut self.links[link.index()];
        if e.state != LinkState::Down {
            error!("{link} down, retry in {}s", backoff.as_secs());
        }
        e.state = LinkState::Down;
        e.retry_at = now + backoff;
        e.failures = e.failures.saturating_add(1);

        if link == LinkId::Wifi {
            for dep in [LinkId::Broker, LinkId::Dashboard] {
                if self.state(dep) != LinkState::Down {
                    self.mark_down(dep, now);
                }
            }
        }
    }

    /// Whether an `Up` link is due for its liveness check.
    pub fn check_due(&self, link: LinkId, now: Instant) -> bool {
        let e = &self.links[link.index()];
        let every = match link {
            LinkId::Broker => self.ping_interval,
            LinkId::Wifi | LinkId::Dashboard => Duration::ZERO,
        };
        e.state == LinkState::Up && now.duration_since(e.checked_at) >= every
    }

    pub fn checked(&mut self, link: LinkId, now: Instant) {
        self.links[link.index()].checked_at = now;
    }

    pub fn status(&self) -> Vec<LinkStatus> {
        LinkId::ALL
            .iter()
            .map(|&link| {
                let e = &self.links[link.index()];
                LinkStatus {
                    link,
                    enabled: e.enabled,
                    state: e.state,
                    connectivity: self.connectivity(link),
                    failures: e.failures,
                }
            })
            .collect()
    }
}


// EOF
