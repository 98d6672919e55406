// power.rs

//! Heat output of the collector from the air stream:
//! `Q = flow * density * (t_out - t_in) * Cp`, with flow scaled from the
//! fan's rated flow by the duty cycle.

use crate::PowerError;

/// Air density at 20C corrected for the warmer collector air, kg/m^3.
pub const AIR_DENSITY: f32 = 1.208 * (0.065 / 0.075);
/// Specific heat of air, kJ/kgK.
pub const SPECIFIC_HEAT: f32 = 1.006;

#[derive(Clone, Copy, Debug)]
pub struct PowerModel {
    /// m^3/min at 100% duty.
    pub rated_flow: f32,
    pub air_density: f32,
    pub specific_heat: f32,
}

impl PowerModel {
    pub fn new(rated_flow: f32) -> Self {
        Self {
            rated_flow,
            air_density: AIR_DENSITY,
            specific_heat: SPECIFIC_HEAT,
        }
    }

    pub fn flow_rate(&self, duty_percent: u8) -> f32 {
        duty_percent as f32 / 100.0 * self.rated_flow
    }

    /// Estimated output in watts.
    pub fn estimate(
        &self,
        temp_in: Option<f32>,
        temp_out: Option<f32>,
        duty_percent: u8,
    ) -> Result<f32, PowerError> {
        let (Some(t_in), Some(t_out)) = (temp_in, temp_out) else {
            return Err(PowerError::InsufficientData);
        };
        // kJ/min -> W
        Ok(self.flow_rate(duty_percent)
            * self.air_density
            * (t_out - t_in)
            * self.specific_heat
            * 1000.0
            / 60.0)
    }
}


// EOF
