// esp/mqtt.rs

use std::time::Duration;

use esp_idf_svc::mqtt::client::{
    EspAsyncMqttClient, EspAsyncMqttConnection, EventPayload, MqttClientConfiguration, QoS,
};
use log::*;
use tokio::{
    sync::watch,
    task::{spawn_local, JoinHandle},
    time::timeout,
};

use crate::{BrokerClient, LinkError, LinkId, Sink, SinkError};

const CONNECT_WAIT: Duration = Duration::from_secs(10);

/// MQTT session. The event loop runs as a local task next to the scheduler,
/// so the firmware drives the runtime through a `LocalSet`.
pub struct EspBroker {
    url: String,
    client_id: String,
    client: Option<EspAsyncMqttClient>,
    session: watch::Receiver<bool>,
    events: Option<JoinHandle<()>>,
}

impl EspBroker {
    pub fn new(url: impl Into<String>, client_id: impl Into<String>) -> Self {
        let (_, session) = watch::channel(false);
        Self {
            url: url.into(),
            client_id: client_id.into(),
            client: None,
            session,
            events: None,
        }
    }
}

async fn event_loop(mut conn: EspAsyncMqttConnection, session: watch::Sender<bool>) {
    while let Ok(event) = Box::pin(conn.next()).await {
        match event.payload() {
            EventPayload::Connected(_) => {
                session.send_replace(true);
            }
            EventPayload::Disconnected => {
                warn!("MQTT disconnected.");
                session.send_replace(false);
            }
            EventPayload::Error(e) => error!("MQTT error: {e:?}"),
            p => debug!("MQTT received: {p:?}"),
        }
    }
    session.send_replace(false);
    error!("MQTT connection closed.");
}

impl BrokerClient for EspBroker {
    async fn connect(&mut self) -> Result<(), LinkError> {
        if let Some(events) = self.events.take() {
            events.abort();
        }
        self.client = None;

        info!("MQTT connecting to {}...", self.url);
        let (client, conn) = EspAsyncMqttClient::new(
            &self.url,
            &MqttClientConfiguration {
                client_id: Some(&self.client_id),
                keep_alive_interval: Some(Duration::from_secs(25)),
                ..Default::default()
            },
        )
        .map_err(|e| LinkError::new(LinkId::Broker, format!("{e:?}")))?;

        let (tx, mut rx) = watch::channel(false);
        self.events = Some(spawn_local(event_loop(conn, tx)));
        self.client = Some(client);
        self.session = rx.clone();

        match timeout(CONNECT_WAIT, rx.wait_for(|up| *up)).await {
            Ok(Ok(_)) => {
                info!("MQTT connected.");
                Ok(())
            }
            Ok(Err(_)) => Err(LinkError::new(LinkId::Broker, "connection closed")),
            Err(_) => Err(LinkError::new(LinkId::Broker, "no CONNACK from broker")),
        }
    }

    async fn ping(&mut self) -> Result<(), LinkError> {
        match self.client.is_some() && *self.session.borrow() {
            true => Ok(()),
            false => Err(LinkError::new(LinkId::Broker, "session lost")),
        }
    }

    async fn publish(&mut self, topic: &str, payload: &serde_json::Value) -> Result<(), SinkError> {
        let client = self
            .client
            .as_mut()
            .ok_or_else(|| SinkError::new(Sink::Broker, "not connected"))?;
        let data = serde_json::to_vec(payload).map_err(|e| SinkError::new(Sink::Broker, e.to_string()))?;
        client
            .publish(topic, QoS::AtLeastOnce, false, &data)
            .await
            .map_err(|e| SinkError::new(Sink::Broker, format!("{e:?}")))?;
        Ok(())
    }
}

// EOF
