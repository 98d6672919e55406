// config.rs

use std::time::Duration;

use anyhow::bail;
use serde::{Deserialize, Serialize};

use crate::SensorAddress;

const DEFAULT_API_PORT: u16 = 80;
const DEFAULT_SENSOR_RETRIES: u32 = 4;
const DEFAULT_SAMPLE_DELAY: u64 = 10;
const DEFAULT_CONVERSION_MS: u64 = 750;

const DEFAULT_SET_POINT: f32 = 25.0;
const DEFAULT_HIGH_DUTY: u8 = 75;
const DEFAULT_INITIAL_DUTY: u8 = 50;
const DEFAULT_RATED_FLOW: f32 = 3.0;
const DEFAULT_PULSES_PER_REV: u32 = 2;

const DEFAULT_BACKOFF_SECS: u64 = 5;
const DEFAULT_PING_SECS: u64 = 30;
const DEFAULT_SUPERVISE_MS: u64 = 1000;
const DEFAULT_DASHBOARD_POLL_MS: u64 = 2000;
const DEFAULT_OVERRIDE_SECS: u64 = 600;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FanConfig {
    pub port: u16,
    pub api_enable: bool,
    pub retries: u32,
    /// Seconds between sampling cycles.
    pub delay: u64,
    /// DS18B20 conversion time at 12 bit resolution.
    pub conversion_ms: u64,

    #[serde(skip_serializing)]
    pub wifi_ssid: String,
    #[serde(skip_serializing)]
    pub wifi_pass: String,

    pub set_point: f32,
    pub high_duty: u8,
    pub initial_duty: u8,
    pub rated_flow: f32,
    pub fixed_temp_in: Option<f32>,
    pub pulses_per_rev: u32,

    pub probe_in: Option<SensorAddress>,
    pub probe_out: Option<SensorAddress>,
    pub probe_panel: Option<SensorAddress>,

    pub backoff_secs: u64,
    pub ping_secs: u64,
    pub supervise_ms: u64,

    pub mqtt_enable: bool,
    pub mqtt_url: String,
    pub mqtt_topic: String,

    pub dashboard_enable: bool,
    pub dashboard_url: String,
    #[serde(skip_serializing)]
    pub dashboard_token: String,
    pub dashboard_poll_ms: u64,
    pub override_secs: u64,
}

impl Default for FanConfig {
    fn default() -> Self {
        let dashboard_token: String = option_env!("DASHBOARD_TOKEN").unwrap_or("").into();
        Self {
            port: option_env!("API_PORT")
                .unwrap_or("-")
                .parse()
                .unwrap_or(DEFAULT_API_PORT),
            api_enable: true,
            retries: DEFAULT_SENSOR_RETRIES,
            delay: DEFAULT_SAMPLE_DELAY,
            conversion_ms: DEFAULT_CONVERSION_MS,

            wifi_ssid: option_env!("WIFI_SSID").unwrap_or("internet").into(),
            wifi_pass: option_env!("WIFI_PASS").unwrap_or("password").into(),

            set_point: DEFAULT_SET_POINT,
            high_duty: DEFAULT_HIGH_DUTY,
            initial_duty: DEFAULT_INITIAL_DUTY,
            rated_flow: DEFAULT_RATED_FLOW,
            fixed_temp_in: None,
            pulses_per_rev: DEFAULT_PULSES_PER_REV,

            probe_in: None,
            probe_out: None,
            probe_panel: None,

            backoff_secs: DEFAULT_BACKOFF_SECS,
            ping_secs: DEFAULT_PING_SECS,
            supervise_ms: DEFAULT_SUPERVISE_MS,

            mqtt_enable: true,
            mqtt_url: option_env!("MQTT_URL")
                .unwrap_or("mqtt://mqtt.local:1883")
                .into(),
            mqtt_topic: "solarfan".into(),

            dashboard_enable: !dashboard_token.is_empty(),
            dashboard_url: "https://blynk.cloud".into(),
            dashboard_token,
            dashboard_poll_ms: DEFAULT_DASHBOARD_POLL_MS,
            override_secs: DEFAULT_OVERRIDE_SECS,
        }
    }
}

impl FanConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.high_duty > 100 {
            bail!("high_duty {} must be within 0..=100", self.high_duty);
        }
        if self.initial_duty > 100 {
            bail!("initial_duty {} must be within 0..=100", self.initial_duty);
        }
        if self.delay == 0 {
            bail!("sampling delay must be at least one second");
        }
        if self.conversion_ms >= self.delay * 1000 {
            bail!(
                "conversion time {}ms does not fit in the {}s sampling delay",
                self.conversion_ms,
                self.delay
            );
        }
        if !self.rated_flow.is_finite() || self.rated_flow < 0.0 {
            bail!("rated_flow {} must be a non-negative number", self.rated_flow);
        }
        if !self.set_point.is_finite() {
            bail!("set_point must be a finite temperature");
        }
        if self.pulses_per_rev == 0 {
            bail!("pulses_per_rev must be positive");
        }
        if self.backoff_secs == 0 || self.supervise_ms == 0 || self.dashboard_poll_ms == 0 {
            bail!("backoff, supervision and dashboard poll periods must be positive");
        }
        if self.mqtt_enable && self.mqtt_topic.is_empty() {
            bail!("mqtt_topic is empty");
        }
        if self.dashboard_enable && self.dashboard_token.is_empty() {
            bail!("dashboard is enabled but has no auth token");
        }
        Ok(())
    }

    pub fn sample_period(&self) -> Duration {
        Duration::from_secs(self.delay)
    }

    pub fn conversion_delay(&self) -> Duration {
        Duration::from_millis(self.conversion_ms)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_secs)
    }

    pub fn supervise_period(&self) -> Duration {
        Duration::from_millis(self.supervise_ms)
    }

    pub fn dashboard_poll(&self) -> Duration {
        Duration::from_millis(self.dashboard_poll_ms)
    }

    pub fn override_hold(&self) -> Duration {
        Duration::from_secs(self.override_secs)
    }
}


// EOF
