// bin/solarfan.rs

#![warn(clippy::large_futures)]

use std::sync::Arc;

use esp_idf_hal::{
    delay::FreeRtos,
    gpio::{Gpio32, InputOutput, PinDriver, Pull},
    i2c::{I2cConfig, I2cDriver},
    ledc::{config::TimerConfig, LedcDriver, LedcTimerDriver, Resolution},
    prelude::*,
};
use esp_idf_svc::{eventloop::EspSystemEventLoop, nvs, timer::EspTaskTimerService};
use esp_idf_sys::{esp, esp_app_desc};
use log::*;

use solarfan::{esp::*, *};

esp_app_desc!();

struct Esp32;

impl Platform for Esp32 {
    type Bus = EspOneWire<PinDriver<'static, Gpio32, InputOutput>>;
    type Pwm = LedcDriver<'static>;
    type Ambient = Si7021<I2cDriver<'static>>;
    type Wifi = EspWifiLink;
    type Broker = EspBroker;
    type Dashboard = BlynkHttp;
}

fn main() -> anyhow::Result<()> {
    esp_idf_sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    // eventfd is needed by the tokio/mio reactor
    #[allow(clippy::needless_update)]
    let eventfd_config = esp_idf_sys::esp_vfs_eventfd_config_t {
        max_fds: 2,
        ..Default::default()
    };
    esp! { unsafe { esp_idf_sys::esp_vfs_eventfd_register(&eventfd_config) } }?;

    info!("solarfan v{FW_VERSION} starting up.");

    let config = FanConfig::default();
    config.validate()?;
    info!("My config:\n{}", serde_json::to_string_pretty(&config)?);

    let sysloop = EspSystemEventLoop::take()?;
    let timer = EspTaskTimerService::new()?;
    let nvs_default_partition = nvs::EspDefaultNvsPartition::take()?;

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    // 4-pin PC fan: 25 kHz PWM, open collector tachometer
    let pwm_timer = LedcTimerDriver::new(
        peripherals.ledc.timer0,
        &TimerConfig::default()
            .frequency(25.kHz().into())
            .resolution(Resolution::Bits10),
    )?;
    let pwm = LedcDriver::new(peripherals.ledc.channel0, pwm_timer, pins.gpio19)?;

    let pulse = Arc::new(PulseCounter::new());
    let _tach = Tachometer::new(pins.gpio25, pulse.clone())?;

    let mut onewire_pin = PinDriver::input_output_od(pins.gpio32)?;
    onewire_pin.set_pull(Pull::Up)?;
    let bus = EspOneWire::new(onewire_pin)?;

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        pins.gpio21,
        pins.gpio22,
        &I2cConfig::new().baudrate(100.kHz().into()),
    )?;

    let wifi = EspWifiLink::new(peripherals.modem, sysloop, timer, nvs_default_partition)?;
    let mac = wifi.mac()?;
    let client_id = format!("solarfan-{:02x}{:02x}{:02x}", mac[3], mac[4], mac[5]);
    info!("MQTT client id {client_id}");

    let broker = EspBroker::new(config.mqtt_url.clone(), client_id);
    let dashboard = BlynkHttp::new(config.dashboard_url.clone(), config.dashboard_token.clone())?;

    let state = Arc::new(MyState::new(config));
    let scheduler = Scheduler::<Esp32>::new(
        state.clone(),
        Parts {
            bus,
            pwm,
            ambient: Some(Si7021::new(i2c)),
            wifi,
            broker,
            dashboard,
            pulse,
        },
    );

    // the MQTT event loop is a local task
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    tokio::task::LocalSet::new().block_on(
        &runtime,
        Box::pin(async move {
            let n = scheduler.start().await;
            if n < TempLabel::ALL.len() {
                warn!("Only {n} of {} probes found", TempLabel::ALL.len());
            }

            tokio::select! {
                r = Box::pin(scheduler.run()) => { error!("scheduler.run() ended: {r:?}"); }
                r = Box::pin(run_api_server(state.clone())) => { error!("run_api_server() ended: {r:?}"); }
            };
        }),
    );

    // not actually returning from main() but we reboot instead
    info!("main() finished, reboot.");
    FreeRtos::delay_ms(3000);
    esp_idf_hal::reset::restart();
}

// EOF
