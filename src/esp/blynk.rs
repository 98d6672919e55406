// esp/blynk.rs

//! Dashboard over the Blynk HTTP API.
//!
//! The HTTP client lives on its own worker thread; requests are awaited, so
//! a slow or unreachable server never stalls the control loop.

use std::time::Duration;

use embedded_svc::{http::client::Client as HttpClient, utils::io};
use esp_idf_svc::http::client::{Configuration as HttpConfiguration, EspHttpConnection};
use log::*;

use crate::{channel, DashboardClient, InboundWrite, LinkError, LinkId, Offload, Sink, SinkError};

const WORKER_STACK: usize = 8192;

type Http = HttpClient<EspHttpConnection>;

pub struct BlynkHttp {
    base_url: String,
    token: String,
    http: Offload<Option<Http>>,
    connected: bool,
    /// Last duty value seen on the override channel, written by either side.
    last_duty: Option<f32>,
}

fn connection() -> Result<Http, String> {
    let conn = EspHttpConnection::new(&HttpConfiguration {
        timeout: Some(Duration::from_secs(10)),
        crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
        ..Default::default()
    })
    .map_err(|e| format!("{e:?}"))?;
    Ok(HttpClient::wrap(conn))
}

fn fetch(client: &mut Http, url: &str) -> Result<String, String> {
    let mut resp = client
        .get(url)
        .and_then(|req| req.submit())
        .map_err(|e| format!("{e:?}"))?;
    let status = resp.status();
    let mut buf = [0u8; 128];
    let n = io::try_read_full(&mut resp, &mut buf).map_err(|(e, _)| format!("{e:?}"))?;
    let body = String::from_utf8_lossy(&buf[..n]).trim().to_string();
    if status != 200 {
        return Err(format!("HTTP {status}: {body}"));
    }
    Ok(body)
}

/// Runs on the worker. A failed request drops the client; the next one
/// starts a fresh connection.
fn http_get(slot: &mut Option<Http>, url: &str) -> Result<String, String> {
    if slot.is_none() {
        *slot = Some(connection()?);
    }
    let Some(client) = slot.as_mut() else {
        return Err("no HTTP client".into());
    };
    let res = fetch(client, url);
    if res.is_err() {
        *slot = None;
    }
    res
}

impl BlynkHttp {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.into(),
            token: token.into(),
            http: Offload::spawn("blynk-http", WORKER_STACK, || None)?,
            connected: false,
            last_duty: None,
        })
    }

    async fn request(&mut self, query: String) -> Result<String, String> {
        let url = format!("{}/external/api/{query}", self.base_url);
        let res = self
            .http
            .run(move |slot| http_get(slot, &url))
            .await
            .unwrap_or_else(|e| Err(e.to_string()));
        if res.is_err() {
            self.connected = false;
        }
        res
    }
}

impl DashboardClient for BlynkHttp {
    async fn connect(&mut self) -> Result<(), LinkError> {
        let query = format!("isHardwareConnected?token={}", self.token);
        self.request(query)
            .await
            .map_err(|e| LinkError::new(LinkId::Dashboard, e))?;
        self.connected = true;
        info!("Dashboard ready.");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn virtual_write(&mut self, ch: u8, value: f32) -> Result<(), SinkError> {
        let query = format!("update?token={}&V{ch}={value:.2}", self.token);
        self.request(query)
            .await
            .map_err(|e| SinkError::new(Sink::Dashboard, e))?;
        if ch == channel::FAN_DUTY {
            self.last_duty = Some(value);
        }
        Ok(())
    }

    async fn poll_inbound(&mut self) -> Result<Vec<InboundWrite>, LinkError> {
        let query = format!("get?token={}&V{}", self.token, channel::FAN_DUTY);
        let body = self
            .request(query)
            .await
            .map_err(|e| LinkError::new(LinkId::Dashboard, e))?;
        let Ok(value) = body.parse::<f32>() else {
            return Ok(Vec::new());
        };

        let previous = self.last_duty.replace(value);
        match previous {
            // first read only establishes the baseline
            None => Ok(Vec::new()),
            Some(p) if (p - value).abs() < 0.5 => Ok(Vec::new()),
            Some(_) => Ok(vec![InboundWrite {
                channel: channel::FAN_DUTY,
                value: body,
            }]),
        }
    }
}

// EOF
