// thermostat.rs

//! Two-point (bang-bang) fan control on the panel temperature.
//!
//! Above the set point the fan runs at `high_duty`, otherwise it is off.
//! There is no hysteresis band, so a panel sitting right at the set point
//! can toggle the fan every cycle. Without a panel reading the previous
//! command is held.

pub fn decide(panel: Option<f32>, set_point: f32, high_duty: u8, previous: u8) -> u8 {
    match panel {
        None => previous,
        Some(t) if t > set_point => high_duty,
        Some(_) => 0,
    }
}

#[derive(Clone, Debug)]
pub struct Thermostat {
    set_point: f32,
    high_duty: u8,
    previous: u8,
}

impl Thermostat {
    pub fn new(set_point: f32, high_duty: u8, initial: u8) -> Self {
        Self {
            set_point,
            high_duty,
            previous: initial,
        }
    }

    pub fn decide(&mut self, panel: Option<f32>) -> u8 {
        self.previous = decide(panel, self.set_point, self.high_duty, self.previous);
        self.previous
    }

    /// Make `percent` the command held while the panel reading is absent.
    pub fn hold(&mut self, percent: u8) {
        self.previous = percent;
    }
}


// EOF
