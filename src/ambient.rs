// ambient.rs

//! Si7021 temperature/humidity sensor on I2C.

use embedded_hal::i2c::I2c;

use crate::{AmbientSensor, SensorError};

pub const SI7021_ADDR: u8 = 0x40;

const CMD_MEASURE_RH_HOLD: u8 = 0xE5;
const CMD_MEASURE_TEMP_HOLD: u8 = 0xE3;

pub struct Si7021<I> {
    i2c: I,
    address: u8,
}

impl<I: I2c> Si7021<I> {
    pub fn new(i2c: I) -> Self {
        Self {
            i2c,
            address: SI7021_ADDR,
        }
    }

    fn measure(&mut self, cmd: u8) -> Result<u16, SensorError> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.address, &[cmd], &mut buf)
            .map_err(|e| SensorError::Bus(format!("si7021: {e:?}")))?;
        Ok(u16::from_be_bytes(buf))
    }
}

impl<I: I2c> AmbientSensor for Si7021<I> {
    fn temperature(&mut self) -> Result<f32, SensorError> {
        let code = self.measure(CMD_MEASURE_TEMP_HOLD)?;
        Ok(175.72 * code as f32 / 65536.0 - 46.85)
    }

    fn humidity(&mut self) -> Result<f32, SensorError> {
        let code = self.measure(CMD_MEASURE_RH_HOLD)?;
        Ok((125.0 * code as f32 / 65536.0 - 6.0).clamp(0.0, 100.0))
    }
}


// EOF
