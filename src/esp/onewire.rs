// esp/onewire.rs

use std::fmt::Debug;

use embedded_hal::digital::{InputPin, OutputPin};
use esp_idf_hal::delay::Ets;
use log::*;
use one_wire_bus::{Address, OneWire, OneWireError, SearchState};

use crate::{OneWireBus, SensorAddress, SensorError};

/// DS18B20 probes on one GPIO.
pub struct EspOneWire<P> {
    bus: OneWire<P>,
}

impl<P, E> EspOneWire<P>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
    E: Debug,
{
    pub fn new(pin: P) -> anyhow::Result<Self> {
        let bus = OneWire::new(pin).map_err(|e| anyhow::anyhow!("onewire init: {e:?}"))?;
        Ok(Self { bus })
    }
}

fn bus_error<E: Debug>(e: OneWireError<E>, address: SensorAddress) -> SensorError {
    match e {
        OneWireError::CrcMismatch => SensorError::Crc(address),
        e => SensorError::Bus(format!("{e:?}")),
    }
}

impl<P, E> OneWireBus for EspOneWire<P>
where
    P: OutputPin<Error = E> + InputPin<Error = E>,
    E: Debug,
{
    fn scan(&mut self) -> Result<Vec<SensorAddress>, SensorError> {
        let mut found = Vec::new();
        let mut st: SearchState;
        let mut state = None;

        loop {
            match self
                .bus
                .device_search(state, false, &mut Ets)
                .map_err(|e| SensorError::Bus(format!("{e:?}")))?
            {
                None => break,
                Some((device_address, s)) => {
                    if device_address.family_code() == ds18b20::FAMILY_CODE {
                        found.push(SensorAddress(device_address.0));
                    } else {
                        debug!("Skipping non-DS18B20 device {device_address:?}");
                    }
                    st = s;
                    state = Some(&st);
                }
            }
        }

        if found.is_empty() {
            Err(SensorError::NotFound)
        } else {
            Ok(found)
        }
    }

    fn convert(&mut self) -> Result<(), SensorError> {
        ds18b20::start_simultaneous_temp_measurement(&mut self.bus, &mut Ets)
            .map_err(|e| SensorError::Bus(format!("{e:?}")))
    }

    fn read_temp(&mut self, address: SensorAddress) -> Result<f32, SensorError> {
        let sensor = ds18b20::Ds18b20::new::<E>(Address(address.0)).map_err(|e| bus_error(e, address))?;
        let data = sensor
            .read_data(&mut self.bus, &mut Ets)
            .map_err(|e| bus_error(e, address))?;
        Ok(data.temperature)
    }
}

// EOF
