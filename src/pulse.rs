// pulse.rs

//! Tachometer pulse counting.
//!
//! The falling-edge interrupt calls [`PulseCounter::on_edge`], which is a
//! single lock-free `fetch_add`. The sampler takes the count with one atomic
//! `swap(0)`, so every edge lands in exactly one window. The window start is
//! only ever touched by the sampler.

use std::cell::Cell;
use std::sync::atomic::{AtomicU32, Ordering};

use critical_section::Mutex;
use tokio::time::Instant;

use crate::PulseError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PulseSample {
    pub count: u32,
    pub elapsed_ms: u64,
}

impl PulseSample {
    pub fn frequency(&self) -> Result<f32, PulseError> {
        frequency(self.count, self.elapsed_ms)
    }

    pub fn rpm(&self, pulses_per_rev: u32) -> Result<f32, PulseError> {
        Ok(rpm(self.frequency()?, pulses_per_rev))
    }
}

/// Shaft speed from edge frequency; 4-pin PC fans give two edges per turn.
pub fn rpm(frequency_hz: f32, pulses_per_rev: u32) -> f32 {
    frequency_hz * 60.0 / pulses_per_rev.max(1) as f32
}

/// Edge frequency in Hz over a window of `elapsed_ms`.
pub fn frequency(count: u32, elapsed_ms: u64) -> Result<f32, PulseError> {
    if elapsed_ms == 0 {
        return Err(PulseError::InvalidWindow);
    }
    Ok(count as f32 / (elapsed_ms as f32 / 1000.0))
}

pub struct PulseCounter {
    edges: AtomicU32,
    window_start: Mutex<Cell<Instant>>,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self {
            edges: AtomicU32::new(0),
            window_start: Mutex::new(Cell::new(Instant::now())),
        }
    }

    /// Interrupt path. Bounded and non-blocking.
    #[inline]
    pub fn on_edge(&self) {
        self.edges.fetch_add(1, Ordering::Relaxed);
    }

    /// Edges counted so far in the current window, without resetting.
    pub fn pending(&self) -> u32 {
        self.edges.load(Ordering::Relaxed)
    }

    pub fn sample_and_reset(&self) -> Result<PulseSample, PulseError> {
        critical_section::with(|cs| {
            let start = self.window_start.borrow(cs);
            let now = Instant::now();
            let elapsed_ms = now.duration_since(start.get()).as_millis() as u64;
            if elapsed_ms == 0 {
                // keep counting into the same window
                return Err(PulseError::InvalidWindow);
            }
            let count = self.edges.swap(0, Ordering::AcqRel);
            start.set(now);
            Ok(PulseSample { count, elapsed_ms })
        })
    }
}

impl Default for PulseCounter {
    fn default() -> Self {
        Self::new()
    }
}


// EOF
