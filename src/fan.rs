// fan.rs

use embedded_hal::pwm::SetDutyCycle;
use log::*;

use crate::FanError;

/// Fan PWM output. Percent in, hardware resolution out.
pub struct FanActuator<P> {
    pwm: P,
    duty: u8,
}

impl<P: SetDutyCycle> FanActuator<P> {
    /// Wraps the PWM output without writing to it; call [`set_duty`](Self::set_duty)
    /// to bring the hardware to a known state.
    pub fn new(pwm: P) -> Self {
        Self { pwm, duty: 0 }
    }

    pub fn set_duty(&mut self, percent: u8) -> Result<(), FanError> {
        if percent > 100 {
            return Err(FanError::OutOfRange(percent));
        }
        let raw = self.raw_for(percent);
        self.pwm
            .set_duty_cycle(raw)
            .map_err(|e| FanError::Pwm(format!("{e:?}")))?;
        if percent != self.duty {
            info!("Fan duty {}% -> {percent}% (raw {raw})", self.duty);
        }
        self.duty = percent;
        Ok(())
    }

    pub fn get_duty(&self) -> u8 {
        self.duty
    }

    pub fn raw_duty(&self) -> u16 {
        self.raw_for(self.duty)
    }

    fn raw_for(&self, percent: u8) -> u16 {
        (self.pwm.max_duty_cycle() as u32 * percent as u32 / 100) as u16
    }
}


// EOF
