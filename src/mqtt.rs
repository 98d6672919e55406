// mqtt.rs

use crate::{LinkError, SinkError};

/// Message broker session.
#[allow(async_fn_in_trait)]
pub trait BrokerClient {
    async fn connect(&mut self) -> Result<(), LinkError>;
    /// Liveness check of an established session.
    async fn ping(&mut self) -> Result<(), LinkError>;
    async fn publish(&mut self, topic: &str, payload: &serde_json::Value) -> Result<(), SinkError>;
}

// EOF
