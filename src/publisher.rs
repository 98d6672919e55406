// publisher.rs

use std::fmt;

use log::*;
use serde::Serialize;

use crate::*;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sink {
    Dashboard,
    Broker,
}

impl Sink {
    pub fn link(&self) -> LinkId {
        match self {
            Sink::Dashboard => LinkId::Dashboard,
            Sink::Broker => LinkId::Broker,
        }
    }
}

impl fmt::Display for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Sink::Dashboard => "dashboard",
            Sink::Broker => "broker",
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Delivery {
    Delivered,
    /// Link not up or sink disabled; nothing was attempted.
    Skipped,
    Failed(SinkError),
}

#[derive(Clone, Debug, PartialEq)]
pub struct PublishReport {
    pub dashboard: Delivery,
    pub broker: Delivery,
}

impl PublishReport {
    pub fn failed(&self) -> impl Iterator<Item = Sink> + '_ {
        [(Sink::Dashboard, &self.dashboard), (Sink::Broker, &self.broker)]
            .into_iter()
            .filter(|(_, d)| matches!(d, Delivery::Failed(_)))
            .map(|(s, _)| s)
    }
}

/// Pushes snapshots to the sinks. No backlog: a failed delivery is logged
/// and dropped, the next cycle sends fresh values.
#[derive(Clone, Debug)]
pub struct Publisher {
    topic: String,
}

impl Publisher {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Sinks passed as `None` are skipped.
    pub async fn publish<B, D>(
        &self,
        snapshot: &Snapshot,
        broker: Option<&mut B>,
        dashboard: Option<&mut D>,
    ) -> PublishReport
    where
        B: BrokerClient,
        D: DashboardClient,
    {
        let dashboard = match dashboard {
            None => Delivery::Skipped,
            Some(d) => match Self::to_dashboard(d, snapshot).await {
                Ok(()) => Delivery::Delivered,
                Err(e) => {
                    error!("Publish failed: {e}");
                    Delivery::Failed(e)
                }
            },
        };

        let broker = match broker {
            None => Delivery::Skipped,
            Some(b) => match self.to_broker(b, snapshot).await {
                Ok(()) => Delivery::Delivered,
                Err(e) => {
                    error!("Publish failed: {e}");
                    Delivery::Failed(e)
                }
            },
        };

        PublishReport { dashboard, broker }
    }

    async fn to_broker<B: BrokerClient>(&self, broker: &mut B, snapshot: &Snapshot) -> Result<(), SinkError> {
        let payload = serde_json::to_value(TelemetryPayload::from(snapshot))
            .map_err(|e| SinkError::new(Sink::Broker, format!("payload: {e}")))?;
        info!("MQTT sending {}", self.topic);
        broker.publish(&self.topic, &payload).await
    }

    /// Stops at the first failed write; the rest of this cycle is dropped.
    async fn to_dashboard<D: DashboardClient>(dashboard: &mut D, s: &Snapshot) -> Result<(), SinkError> {
        let values = [
            (channel::TEMP_IN, s.temperatures.temp_in),
            (channel::TEMP_OUT, s.temperatures.temp_out),
            (channel::TEMP_PANEL, s.temperatures.temp_panel),
            (channel::FAN_FREQUENCY, Some(s.fan.frequency_hz)),
            (channel::FAN_DUTY, Some(s.fan.duty_cycle_percent as f32)),
            (channel::AMBIENT_TEMP, s.ambient.temperature),
            (channel::AMBIENT_HUMIDITY, s.ambient.humidity),
            (channel::POWER, s.power_watts),
        ];
        for (ch, value) in values {
            if let Some(v) = value {
                dashboard.virtual_write(ch, v).await?;
            }
        }
        Ok(())
    }
}


// EOF
