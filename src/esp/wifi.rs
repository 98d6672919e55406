// esp/wifi.rs

use embedded_svc::wifi::{ClientConfiguration, Configuration};
use esp_idf_hal::modem::Modem;
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    nvs::EspDefaultNvsPartition,
    sys::EspError,
    timer::EspTaskTimerService,
    wifi::{AsyncWifi, EspWifi},
};
use log::*;

use crate::{LinkError, LinkId, WifiLink};

pub struct EspWifiLink {
    wifi: AsyncWifi<EspWifi<'static>>,
}

fn link_err(e: EspError) -> LinkError {
    LinkError::new(LinkId::Wifi, format!("{e:?}"))
}

impl EspWifiLink {
    pub fn new(
        modem: Modem,
        sysloop: EspSystemEventLoop,
        timer: EspTaskTimerService,
        nvs: EspDefaultNvsPartition,
    ) -> anyhow::Result<Self> {
        info!("Initializing Wi-Fi...");
        let espwifi = EspWifi::new(modem, sysloop.clone(), Some(nvs))?;
        let wifi = AsyncWifi::wrap(espwifi, sysloop, timer)?;
        Ok(Self { wifi })
    }

    pub fn mac(&self) -> anyhow::Result<[u8; 6]> {
        Ok(self.wifi.wifi().sta_netif().get_mac()?)
    }
}

impl WifiLink for EspWifiLink {
    async fn connect(&mut self, ssid: &str, password: &str) -> Result<(), LinkError> {
        let conf = Configuration::Client(ClientConfiguration {
            ssid: ssid
                .try_into()
                .map_err(|_| LinkError::new(LinkId::Wifi, "SSID too long"))?,
            password: password
                .try_into()
                .map_err(|_| LinkError::new(LinkId::Wifi, "password too long"))?,
            ..Default::default()
        });
        self.wifi.set_configuration(&conf).map_err(link_err)?;

        if !self.wifi.is_started().map_err(link_err)? {
            info!("WiFi driver starting...");
            Box::pin(self.wifi.start()).await.map_err(link_err)?;
        }

        info!("WiFi connecting...");
        Box::pin(self.wifi.connect()).await.map_err(link_err)?;

        info!("WiFi waiting for address...");
        Box::pin(self.wifi.wait_netif_up()).await.map_err(link_err)?;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.wifi.is_connected().unwrap_or(false)
    }

    fn ip_address(&self) -> Option<String> {
        self.wifi
            .wifi()
            .sta_netif()
            .get_ip_info()
            .ok()
            .map(|info| info.ip.to_string())
    }
}

// EOF
