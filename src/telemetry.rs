// telemetry.rs

use serde::Serialize;
use tokio::sync::RwLock;

use crate::TempLabel;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct TempSet {
    pub temp_in: Option<f32>,
    pub temp_out: Option<f32>,
    pub temp_panel: Option<f32>,
}

impl TempSet {
    pub fn get(&self, label: TempLabel) -> Option<f32> {
        match label {
            TempLabel::TempIn => self.temp_in,
            TempLabel::TempOut => self.temp_out,
            TempLabel::TempPanel => self.temp_panel,
        }
    }

    pub fn set(&mut self, label: TempLabel, value: Option<f32>) {
        match label {
            TempLabel::TempIn => self.temp_in = value,
            TempLabel::TempOut => self.temp_out = value,
            TempLabel::TempPanel => self.temp_panel = value,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct FanState {
    pub duty_cycle_percent: u8,
    pub frequency_hz: f32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct AmbientReading {
    pub temperature: Option<f32>,
    pub humidity: Option<f32>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub temperatures: TempSet,
    pub fan: FanState,
    pub ambient: AmbientReading,
    pub power_watts: Option<f32>,
    pub timestamp: i64,
    pub sequence: u64,
}

/// Fields of one cycle to merge into the stored snapshot.
/// Anything left unset keeps its previous value.
#[derive(Clone, Debug, Default)]
pub struct TelemetryUpdate {
    temperatures: Vec<(TempLabel, Option<f32>)>,
    duty: Option<u8>,
    frequency: Option<f32>,
    ambient: Option<AmbientReading>,
    power: Option<f32>,
    timestamp: Option<i64>,
}

impl TelemetryUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, label: TempLabel, reading: Option<f32>) -> Self {
        self.temperatures.push((label, reading));
        self
    }

    pub fn temperatures(mut self, temps: &TempSet) -> Self {
        for label in TempLabel::ALL {
            self.temperatures.push((label, temps.get(label)));
        }
        self
    }

    pub fn duty_cycle(mut self, percent: u8) -> Self {
        self.duty = Some(percent);
        self
    }

    pub fn frequency(mut self, hz: f32) -> Self {
        self.frequency = Some(hz);
        self
    }

    pub fn ambient(mut self, reading: AmbientReading) -> Self {
        self.ambient = Some(reading);
        self
    }

    pub fn power(mut self, watts: f32) -> Self {
        self.power = Some(watts);
        self
    }

    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp = Some(ts);
        self
    }

    fn apply(self, s: &mut Snapshot) {
        for (label, reading) in self.temperatures {
            s.temperatures.set(label, reading);
        }
        if let Some(d) = self.duty {
            s.fan.duty_cycle_percent = d;
        }
        if let Some(f) = self.frequency {
            s.fan.frequency_hz = f;
        }
        if let Some(a) = self.ambient {
            s.ambient = a;
        }
        if let Some(p) = self.power {
            s.power_watts = Some(p);
        }
        if let Some(ts) = self.timestamp {
            s.timestamp = ts;
        }
        s.sequence += 1;
    }
}

/// Latest telemetry. Writers merge a whole cycle under one write lock,
/// readers get a copy.
#[derive(Debug, Default)]
pub struct TelemetryStore {
    current: RwLock<Snapshot>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn update(&self, update: TelemetryUpdate) -> Snapshot {
        let mut current = self.current.write().await;
        update.apply(&mut current);
        current.clone()
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.current.read().await.clone()
    }
}

/// Flat broker payload, one key per telemetry value.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TelemetryPayload {
    pub temp_in: Option<f32>,
    pub temp_out: Option<f32>,
    pub temp_panel: Option<f32>,
    pub fan_duty_cycle: u8,
    pub fan_frequency: f32,
    pub power: Option<f32>,
}

impl From<&Snapshot> for TelemetryPayload {
    fn from(s: &Snapshot) -> Self {
        Self {
            temp_in: s.temperatures.temp_in,
            temp_out: s.temperatures.temp_out,
            temp_panel: s.temperatures.temp_panel,
            fan_duty_cycle: s.fan.duty_cycle_percent,
            fan_frequency: s.fan.frequency_hz,
            power: s.power_watts,
        }
    }
}


// EOF
