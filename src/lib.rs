// lib.rs

//! Solar air collector fan controller.
//!
//! Samples the collector temperatures and the fan tachometer, runs a
//! two-point thermostat on the panel temperature, estimates the heat output
//! and relays everything to a dashboard and an MQTT broker. Hardware and
//! network sit behind the collaborator traits in [`sensor`], [`wifi`],
//! [`mqtt`] and [`dashboard`]; the `espidf` feature provides the ESP32
//! implementations.

#![warn(clippy::large_futures)]

mod error;
pub use error::*;

mod config;
pub use config::*;

mod pulse;
pub use pulse::*;

pub mod sensor;
pub use sensor::*;

mod ambient;
pub use ambient::*;

mod fan;
pub use fan::*;

pub mod thermostat;
pub use thermostat::Thermostat;

mod power;
pub use power::*;

mod telemetry;
pub use telemetry::*;

pub mod wifi;
pub use wifi::*;

pub mod mqtt;
pub use mqtt::*;

pub mod dashboard;
pub use dashboard::*;

mod offload;
pub use offload::*;

mod publisher;
pub use publisher::*;

mod supervisor;
pub use supervisor::*;

mod state;
pub use state::*;

mod scheduler;
pub use scheduler::*;

mod apiserver;
pub use apiserver::*;

#[cfg(feature = "espidf")]
pub mod esp;

pub const FW_VERSION: &str = env!("CARGO_PKG_VERSION");

// EOF
