// sensor.rs

use std::{collections::BTreeMap, fmt, time::Duration};

use log::*;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;

use crate::{SensorError, TempSet};

/// 64-bit one-wire ROM code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorAddress(pub u64);

impl fmt::Display for SensorAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TempLabel {
    TempIn,
    TempOut,
    TempPanel,
}

impl TempLabel {
    /// Scan-order assignment: the first unclaimed probe found becomes `temp_in`.
    pub const ALL: [TempLabel; 3] = [TempLabel::TempIn, TempLabel::TempOut, TempLabel::TempPanel];

    pub fn as_str(&self) -> &'static str {
        match self {
            TempLabel::TempIn => "temp_in",
            TempLabel::TempOut => "temp_out",
            TempLabel::TempPanel => "temp_panel",
        }
    }
}

impl fmt::Display for TempLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One-wire bus with DS18B20-style probes.
pub trait OneWireBus {
    fn scan(&mut self) -> Result<Vec<SensorAddress>, SensorError>;
    /// Start a temperature conversion on every probe of the bus.
    fn convert(&mut self) -> Result<(), SensorError>;
    fn read_temp(&mut self, address: SensorAddress) -> Result<f32, SensorError>;
}

/// I2C temperature/humidity sensor.
pub trait AmbientSensor {
    fn temperature(&mut self) -> Result<f32, SensorError>;
    fn humidity(&mut self) -> Result<f32, SensorError>;
}

pub struct SensorReader<B> {
    bus: B,
    conversion_delay: Duration,
    assigned: BTreeMap<TempLabel, SensorAddress>,
}

impl<B: OneWireBus> SensorReader<B> {
    pub fn new(bus: B, conversion_delay: Duration) -> Self {
        Self {
            bus,
            conversion_delay,
            assigned: BTreeMap::new(),
        }
    }

    pub fn assign(&mut self, label: TempLabel, address: SensorAddress) {
        info!("Probe {address} assigned to {label}");
        self.assigned.insert(label, address);
    }

    pub fn address(&self, label: TempLabel) -> Option<SensorAddress> {
        self.assigned.get(&label).copied()
    }

    /// Scan the bus and bind probes to labels.
    ///
    /// Labels listed in `fixed` get their configured address when it shows up
    /// on the bus. Remaining labels take the unclaimed probes in scan order.
    /// Scanning stops early once every label is bound.
    pub fn assign_from_scan(
        &mut self,
        fixed: &[(TempLabel, Option<SensorAddress>)],
        retries: u32,
    ) -> usize {
        let mut found = Vec::new();
        for attempt in 1..=retries.max(1) {
            match self.bus.scan() {
                Ok(devs) => {
                    info!("Onewire scan #{attempt}: {} probe(s)", devs.len());
                    found = devs;
                    if found.len() >= TempLabel::ALL.len() {
                        break;
                    }
                }
                Err(e) => warn!("Onewire scan #{attempt} failed: {e}"),
            }
        }

        self.assigned.clear();
        for (label, addr) in fixed {
            match addr {
                Some(a) if found.contains(a) => self.assign(*label, *a),
                Some(a) => warn!("Configured probe {a} for {label} not found on bus"),
                None => {}
            }
        }

        let mut spare = found
            .iter()
            .filter(|a| !self.assigned.values().any(|x| x == *a))
            .copied()
            .collect::<Vec<_>>()
            .into_iter();
        for label in TempLabel::ALL {
            let configured = fixed.iter().any(|(l, a)| *l == label && a.is_some());
            if configured || self.assigned.contains_key(&label) {
                continue;
            }
            match spare.next() {
                Some(a) => self.assign(label, a),
                None => warn!("No probe left for {label}"),
            }
        }
        self.assigned.len()
    }

    /// Convert, wait, and read one probe.
    pub async fn read(&mut self, label: TempLabel) -> Option<f32> {
        let address = self.address(label)?;
        self.start_conversion().await?;
        self.read_probe(label, address)
    }

    /// One conversion for every assigned probe, then read each of them.
    pub async fn read_all(&mut self) -> TempSet {
        let mut temps = TempSet::default();
        if self.assigned.is_empty() {
            return temps;
        }
        if self.start_conversion().await.is_none() {
            return temps;
        }
        let assigned = self.assigned.clone();
        for (label, address) in assigned {
            temps.set(label, self.read_probe(label, address));
        }
        temps
    }

    async fn start_conversion(&mut self) -> Option<()> {
        if let Err(e) = self.bus.convert() {
            error!("Onewire conversion failed: {e}");
            return None;
        }
        sleep(self.conversion_delay).await;
        Some(())
    }

    fn read_probe(&mut self, label: TempLabel, address: SensorAddress) -> Option<f32> {
        match self.bus.read_temp(address) {
            Ok(t) => {
                debug!("{label}={t:.1}C");
                Some(t)
            }
            Err(e) => {
                warn!("Reading {label} failed: {e}");
                None
            }
        }
    }
}


// EOF
