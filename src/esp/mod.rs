// esp/mod.rs

//! ESP32 implementations of the collaborator traits.

mod blynk;
pub use blynk::*;

mod mqtt;
pub use mqtt::*;

mod onewire;
pub use onewire::*;

mod tach;
pub use tach::*;

mod wifi;
pub use wifi::*;

// EOF
