// dashboard.rs

use serde::Serialize;

use crate::{LinkError, SinkError};

/// Virtual pins of the remote dashboard.
pub mod channel {
    pub const TEMP_IN: u8 = 0;
    pub const TEMP_OUT: u8 = 1;
    pub const FAN_FREQUENCY: u8 = 2;
    /// Written by us with the applied duty, and by the remote side as an override.
    pub const FAN_DUTY: u8 = 3;
    pub const AMBIENT_TEMP: u8 = 4;
    pub const AMBIENT_HUMIDITY: u8 = 5;
    pub const POWER: u8 = 6;
    pub const TEMP_PANEL: u8 = 7;
}

/// A value the remote side wrote to one of our channels.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct InboundWrite {
    pub channel: u8,
    pub value: String,
}

impl InboundWrite {
    /// Duty percent from a dashboard slider value, `None` unless within 0..=100.
    pub fn duty_percent(&self) -> Option<u8> {
        let v: f32 = self.value.trim().parse().ok()?;
        if !(0.0..=100.0).contains(&v) {
            return None;
        }
        Some(v.round() as u8)
    }
}

#[allow(async_fn_in_trait)]
pub trait DashboardClient {
    async fn connect(&mut self) -> Result<(), LinkError>;
    fn is_connected(&self) -> bool;
    async fn virtual_write(&mut self, channel: u8, value: f32) -> Result<(), SinkError>;
    /// Writes received from the remote side since the last call.
    async fn poll_inbound(&mut self) -> Result<Vec<InboundWrite>, LinkError>;
}


// EOF
