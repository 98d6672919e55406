// wifi.rs

use crate::LinkError;

/// Station-mode WiFi link.
#[allow(async_fn_in_trait)]
pub trait WifiLink {
    /// Associate and wait until the interface has an address.
    async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), LinkError>;
    fn is_connected(&self) -> bool;
    fn ip_address(&self) -> Option<String>;
}

// EOF
