//! Mock collaborators for the scheduler.
//!
//! Each mock shares its state through an `Arc<Mutex<..>>` handle so a test
//! can inject faults and inspect traffic while the scheduler owns the mock.

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{Arc, Mutex},
};

use embedded_hal::pwm::{ErrorKind, ErrorType, SetDutyCycle};
use solarfan::*;

pub const PROBE_IN: SensorAddress = SensorAddress(0x2800_0000_0000_0001);
pub const PROBE_OUT: SensorAddress = SensorAddress(0x2800_0000_0000_0002);
pub const PROBE_PANEL: SensorAddress = SensorAddress(0x2800_0000_0000_0003);

// ── One-wire bus ─────────────────────────────────────────────

#[derive(Default)]
pub struct BusState {
    pub temps: BTreeMap<SensorAddress, f32>,
    pub conversions: u32,
}

#[derive(Clone, Default)]
pub struct MockBus(pub Arc<Mutex<BusState>>);

impl MockBus {
    pub fn set(&self, address: SensorAddress, celsius: f32) {
        self.0.lock().unwrap().temps.insert(address, celsius);
    }

    pub fn unplug(&self, address: SensorAddress) {
        self.0.lock().unwrap().temps.remove(&address);
    }
}

impl OneWireBus for MockBus {
    fn scan(&mut self) -> Result<Vec<SensorAddress>, SensorError> {
        let found = self.0.lock().unwrap().temps.keys().copied().collect::<Vec<_>>();
        match found.is_empty() {
            true => Err(SensorError::NotFound),
            false => Ok(found),
        }
    }

    fn convert(&mut self) -> Result<(), SensorError> {
        self.0.lock().unwrap().conversions += 1;
        Ok(())
    }

    fn read_temp(&mut self, address: SensorAddress) -> Result<f32, SensorError> {
        self.0
            .lock()
            .unwrap()
            .temps
            .get(&address)
            .copied()
            .ok_or(SensorError::Crc(address))
    }
}

// ── Fan PWM ──────────────────────────────────────────────────

#[derive(Default)]
pub struct PwmState {
    pub fail: bool,
    pub raw: Vec<u16>,
}

#[derive(Clone, Default)]
pub struct MockPwm(pub Arc<Mutex<PwmState>>);

impl ErrorType for MockPwm {
    type Error = ErrorKind;
}

impl SetDutyCycle for MockPwm {
    fn max_duty_cycle(&self) -> u16 {
        1023
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let mut s = self.0.lock().unwrap();
        if s.fail {
            return Err(ErrorKind::Other);
        }
        s.raw.push(duty);
        Ok(())
    }
}

// ── Ambient sensor ───────────────────────────────────────────

pub struct MockAmbient {
    pub temperature: f32,
    pub humidity: f32,
}

impl AmbientSensor for MockAmbient {
    fn temperature(&mut self) -> Result<f32, SensorError> {
        Ok(self.temperature)
    }

    fn humidity(&mut self) -> Result<f32, SensorError> {
        Ok(self.humidity)
    }
}

// ── Network links ────────────────────────────────────────────

#[derive(Default)]
pub struct WifiState {
    pub fail: bool,
    pub connected: bool,
    pub attempts: u32,
}

#[derive(Clone, Default)]
pub struct MockWifi(pub Arc<Mutex<WifiState>>);

impl WifiLink for MockWifi {
    async fn connect(&mut self, _ssid: &str, _password: &str) -> Result<(), LinkError> {
        let mut s = self.0.lock().unwrap();
        s.attempts += 1;
        if s.fail {
            return Err(LinkError::new(LinkId::Wifi, "no AP in range"));
        }
        s.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.lock().unwrap().connected
    }

    fn ip_address(&self) -> Option<String> {
        self.is_connected().then(|| "192.168.1.50".to_string())
    }
}

#[derive(Default)]
pub struct BrokerState {
    pub fail_connect: bool,
    pub fail_publish: bool,
    pub session_lost: bool,
    pub connects: u32,
    pub pings: u32,
    pub published: Vec<(String, serde_json::Value)>,
}

#[derive(Clone, Default)]
pub struct MockBroker(pub Arc<Mutex<BrokerState>>);

impl BrokerClient for MockBroker {
    async fn connect(&mut self) -> Result<(), LinkError> {
        let mut s = self.0.lock().unwrap();
        s.connects += 1;
        if s.fail_connect {
            return Err(LinkError::new(LinkId::Broker, "connection refused"));
        }
        s.session_lost = false;
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), LinkError> {
        let mut s = self.0.lock().unwrap();
        s.pings += 1;
        match s.session_lost {
            true => Err(LinkError::new(LinkId::Broker, "no PINGRESP")),
            false => Ok(()),
        }
    }

    async fn publish(&mut self, topic: &str, payload: &serde_json::Value) -> Result<(), SinkError> {
        let mut s = self.0.lock().unwrap();
        if s.fail_publish {
            return Err(SinkError::new(Sink::Broker, "socket closed"));
        }
        s.published.push((topic.to_string(), payload.clone()));
        Ok(())
    }
}

#[derive(Default)]
pub struct DashboardState {
    pub fail_connect: bool,
    pub fail_write: bool,
    pub connected: bool,
    pub connects: u32,
    pub writes: Vec<(u8, f32)>,
    pub inbound: VecDeque<InboundWrite>,
}

#[derive(Clone, Default)]
pub struct MockDashboard(pub Arc<Mutex<DashboardState>>);

#[allow(dead_code)]
impl MockDashboard {
    pub fn push_inbound(&self, channel: u8, value: &str) {
        self.0.lock().unwrap().inbound.push_back(InboundWrite {
            channel,
            value: value.to_string(),
        });
    }

    pub fn last_write(&self, channel: u8) -> Option<f32> {
        self.0
            .lock()
            .unwrap()
            .writes
            .iter()
            .rev()
            .find(|(ch, _)| *ch == channel)
            .map(|(_, v)| *v)
    }
}

impl DashboardClient for MockDashboard {
    async fn connect(&mut self) -> Result<(), LinkError> {
        let mut s = self.0.lock().unwrap();
        s.connects += 1;
        if s.fail_connect {
            return Err(LinkError::new(LinkId::Dashboard, "invalid token"));
        }
        s.connected = true;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.0.lock().unwrap().connected
    }

    async fn virtual_write(&mut self, channel: u8, value: f32) -> Result<(), SinkError> {
        let mut s = self.0.lock().unwrap();
        if s.fail_write {
            return Err(SinkError::new(Sink::Dashboard, "HTTP 503"));
        }
        s.writes.push((channel, value));
        Ok(())
    }

    async fn poll_inbound(&mut self) -> Result<Vec<InboundWrite>, LinkError> {
        Ok(self.0.lock().unwrap().inbound.drain(..).collect())
    }
}

// ── Rig ──────────────────────────────────────────────────────

pub struct Mock;

impl Platform for Mock {
    type Bus = MockBus;
    type Pwm = MockPwm;
    type Ambient = MockAmbient;
    type Wifi = MockWifi;
    type Broker = MockBroker;
    type Dashboard = MockDashboard;
}

/// Handles to the mocks owned by a scheduler.
pub struct Rig {
    pub scheduler: Scheduler<Mock>,
    pub bus: MockBus,
    pub pwm: MockPwm,
    pub wifi: MockWifi,
    pub broker: MockBroker,
    pub dashboard: MockDashboard,
    pub pulse: Arc<PulseCounter>,
}

pub fn test_config() -> FanConfig {
    FanConfig {
        probe_in: Some(PROBE_IN),
        probe_out: Some(PROBE_OUT),
        probe_panel: Some(PROBE_PANEL),
        mqtt_topic: "solarfan".into(),
        dashboard_enable: true,
        dashboard_token: "test-token".into(),
        ..Default::default()
    }
}

/// Build a scheduler over fresh mocks. Call from inside the runtime so the
/// pulse window starts on the test clock.
pub fn rig(config: FanConfig) -> Rig {
    let bus = MockBus::default();
    bus.set(PROBE_IN, 20.0);
    bus.set(PROBE_OUT, 28.0);
    bus.set(PROBE_PANEL, 30.0);

    let pwm = MockPwm::default();
    let wifi = MockWifi::default();
    let broker = MockBroker::default();
    let dashboard = MockDashboard::default();
    let pulse = Arc::new(PulseCounter::new());

    let scheduler = Scheduler::new(
        Arc::new(MyState::new(config)),
        Parts::<Mock> {
            bus: bus.clone(),
            pwm: pwm.clone(),
            ambient: Some(MockAmbient {
                temperature: 12.5,
                humidity: 61.0,
            }),
            wifi: wifi.clone(),
            broker: broker.clone(),
            dashboard: dashboard.clone(),
            pulse: pulse.clone(),
        },
    );

    Rig {
        scheduler,
        bus,
        pwm,
        wifi,
        broker,
        dashboard,
        pulse,
    }
}

/// Started rig with every link brought up.
pub async fn online_rig() -> Rig {
    let rig = rig(test_config());
    rig.scheduler.start().await;
    rig.scheduler.supervise().await;
    for link in LinkId::ALL {
        assert_eq!(rig.scheduler.link_state(link).await, LinkState::Up, "{link}");
    }
    rig
}
