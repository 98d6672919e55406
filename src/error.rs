// error.rs

//! Error kinds of the control core.
//!
//! Nothing here is fatal. Each kind is caught at a defined boundary:
//! sensor errors become absent readings, pulse/fan/power errors skip the
//! affected derived value, link errors go to the supervisor backoff and sink
//! errors drop one delivery.

use thiserror::Error;

use crate::{LinkId, SensorAddress, Sink};

/// Transient read errors from temperature probes.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SensorError {
    #[error("CRC mismatch reading probe {0}")]
    Crc(SensorAddress),
    #[error("bus error: {0}")]
    Bus(String),
    #[error("no probe found")]
    NotFound,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PulseError {
    #[error("measurement window has zero length")]
    InvalidWindow,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FanError {
    #[error("duty cycle {0}% out of range 0..=100")]
    OutOfRange(u8),
    #[error("PWM write failed: {0}")]
    Pwm(String),
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum PowerError {
    #[error("inlet and outlet temperatures are both required")]
    InsufficientData,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{link} link failure: {reason}")]
pub struct LinkError {
    pub link: LinkId,
    pub reason: String,
}

impl LinkError {
    pub fn new(link: LinkId, reason: impl Into<String>) -> Self {
        Self {
            link,
            reason: reason.into(),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{sink} delivery failed: {reason}")]
pub struct SinkError {
    pub sink: Sink,
    pub reason: String,
}

impl SinkError {
    pub fn new(sink: Sink, reason: impl Into<String>) -> Self {
        Self {
            sink,
            reason: reason.into(),
        }
    }
}

/// The worker thread behind an [`Offload`](crate::Offload) has exited.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("worker thread stopped")]
pub struct WorkerStopped;

/// Anything that aborts the rest of a sampling cycle.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum CycleError {
    #[error(transparent)]
    Fan(#[from] FanError),
}

// EOF
