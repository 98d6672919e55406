// scheduler.rs

//! The control loop.
//!
//! Three cooperative tasks share one [`Scheduler`] on a single-threaded
//! runtime: the sampling cycle, the link supervisor and the dashboard inbound
//! poll. Collaborators sit behind async mutexes so a task waiting on I/O
//! (probe conversion, network connect) never blocks the others. The only
//! state shared with interrupt context is the [`PulseCounter`].

use std::sync::Arc;

use chrono::Utc;
use embedded_hal::pwm::SetDutyCycle;
use log::*;
use tokio::{
    sync::Mutex,
    time::{interval, Instant, MissedTickBehavior},
};

use crate::*;

/// The collaborator types of one board.
pub trait Platform {
    type Bus: OneWireBus;
    type Pwm: SetDutyCycle;
    type Ambient: AmbientSensor;
    type Wifi: WifiLink;
    type Broker: BrokerClient;
    type Dashboard: DashboardClient;
}

pub struct Parts<P: Platform> {
    pub bus: P::Bus,
    pub pwm: P::Pwm,
    pub ambient: Option<P::Ambient>,
    pub wifi: P::Wifi,
    pub broker: P::Broker,
    pub dashboard: P::Dashboard,
    pub pulse: Arc<PulseCounter>,
}

pub struct Scheduler<P: Platform> {
    state: Arc<MyState>,
    pulse: Arc<PulseCounter>,
    sensors: Mutex<SensorReader<P::Bus>>,
    ambient: Mutex<Option<P::Ambient>>,
    fan: Mutex<FanActuator<P::Pwm>>,
    thermostat: Mutex<Thermostat>,
    power: PowerModel,
    publisher: Publisher,
    supervisor: Mutex<Supervisor>,
    wifi: Mutex<P::Wifi>,
    broker: Mutex<P::Broker>,
    dashboard: Mutex<P::Dashboard>,
}

impl<P: Platform> Scheduler<P> {
    pub fn new(state: Arc<MyState>, parts: Parts<P>) -> Self {
        let c = &state.config;
        let mut supervisor = Supervisor::new(c.backoff(), c.ping_interval(), Instant::now());
        supervisor.set_enabled(LinkId::Broker, c.mqtt_enable);
        supervisor.set_enabled(LinkId::Dashboard, c.dashboard_enable);

        Self {
            pulse: parts.pulse,
            sensors: Mutex::new(SensorReader::new(parts.bus, c.conversion_delay())),
            ambient: Mutex::new(parts.ambient),
            fan: Mutex::new(FanActuator::new(parts.pwm)),
            thermostat: Mutex::new(Thermostat::new(c.set_point, c.high_duty, c.initial_duty)),
            power: PowerModel::new(c.rated_flow),
            publisher: Publisher::new(c.mqtt_topic.clone()),
            supervisor: Mutex::new(supervisor),
            wifi: Mutex::new(parts.wifi),
            broker: Mutex::new(parts.broker),
            dashboard: Mutex::new(parts.dashboard),
            state,
        }
    }

    pub fn state(&self) -> &Arc<MyState> {
        &self.state
    }

    /// Bind probes to labels and bring the fan to its initial duty.
    pub async fn start(&self) -> usize {
        let c = &self.state.config;
        let fixed = [
            (TempLabel::TempIn, c.probe_in),
            (TempLabel::TempOut, c.probe_out),
            (TempLabel::TempPanel, c.probe_panel),
        ];
        let n = self.sensors.lock().await.assign_from_scan(&fixed, c.retries);
        info!("{n} temperature probe(s) assigned");

        if let Err(e) = self.fan.lock().await.set_duty(c.initial_duty) {
            error!("Initial fan duty failed: {e}");
        }
        info!("Broker topic {:?}", self.publisher.topic());
        self.publish_link_status().await;
        n
    }

    pub async fn run(&self) -> anyhow::Result<()> {
        info!("Entering main loop...");
        tokio::select! {
            _ = Box::pin(self.poll_sensors()) => { error!("poll_sensors() ended."); }
            _ = Box::pin(self.run_supervisor()) => { error!("run_supervisor() ended."); }
            _ = Box::pin(self.run_dashboard()) => { error!("run_dashboard() ended."); }
        }
        anyhow::bail!("scheduler stopped")
    }

    async fn poll_sensors(&self) {
        let mut ticker = interval(self.state.config.sample_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_cycle().await {
                error!("Sampling cycle aborted: {e}");
            }
        }
    }

    async fn run_supervisor(&self) {
        let mut ticker = interval(self.state.config.supervise_period());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.supervise().await;
        }
    }

    async fn run_dashboard(&self) {
        let mut ticker = interval(self.state.config.dashboard_poll());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.poll_dashboard().await;
        }
    }

    /// One sampling cycle. The store gets one merged update, so the snapshot
    /// handed to the publisher always belongs to a single cycle.
    pub async fn run_cycle(&self) -> Result<Snapshot, CycleError> {
        let mut temps = self.sensors.lock().await.read_all().await;
        if let Some(t) = self.state.config.fixed_temp_in {
            temps.temp_in = Some(t);
        }
        let ambient = self.read_ambient().await;

        let mut update = TelemetryUpdate::new()
            .temperatures(&temps)
            .ambient(ambient)
            .timestamp(Utc::now().timestamp());

        match self.pulse.sample_and_reset().and_then(|s| s.frequency()) {
            Ok(hz) => update = update.frequency(hz),
            Err(e) => warn!("Fan frequency skipped: {e}"),
        }

        // thermostat, override, fan: the same lock order as apply_override(),
        // so an override cannot land between the decision and the write
        let duty = {
            let mut thermostat = self.thermostat.lock().await;
            let mut active = self.state.duty_override.write().await;
            let command = Self::command(&mut thermostat, &mut active, temps.temp_panel);
            let mut fan = self.fan.lock().await;
            fan.set_duty(command)?;
            fan.get_duty()
        };
        update = update.duty_cycle(duty);

        match self.power.estimate(temps.temp_in, temps.temp_out, duty) {
            Ok(watts) => update = update.power(watts),
            Err(e) => warn!("Power estimate skipped: {e}"),
        }

        let snapshot = self.state.telemetry.update(update).await;
        info!(
            "Cycle #{}: in={:?} out={:?} panel={:?} duty={}% freq={:.0}Hz power={:?}",
            snapshot.sequence,
            snapshot.temperatures.temp_in,
            snapshot.temperatures.temp_out,
            snapshot.temperatures.temp_panel,
            snapshot.fan.duty_cycle_percent,
            snapshot.fan.frequency_hz,
            snapshot.power_watts,
        );

        self.publish(&snapshot).await;
        Ok(snapshot)
    }

    async fn read_ambient(&self) -> AmbientReading {
        let mut ambient = self.ambient.lock().await;
        let Some(sensor) = ambient.as_mut() else {
            return AmbientReading::default();
        };
        let temperature = sensor
            .temperature()
            .map_err(|e| warn!("Ambient temperature failed: {e}"))
            .ok();
        let humidity = sensor
            .humidity()
            .map_err(|e| warn!("Ambient humidity failed: {e}"))
            .ok();
        AmbientReading {
            temperature,
            humidity,
        }
    }

    /// Thermostat decision, unless a remote override is still active.
    fn command(thermostat: &mut Thermostat, active: &mut Option<DutyOverride>, panel: Option<f32>) -> u8 {
        match *active {
            Some(o) if Instant::now() < o.until => {
                thermostat.hold(o.percent);
                o.percent
            }
            Some(o) => {
                info!("Remote duty override {}% expired", o.percent);
                *active = None;
                thermostat.decide(panel)
            }
            None => thermostat.decide(panel),
        }
    }

    /// Publish to the sinks whose links are up. A failed sink takes its link down.
    pub async fn publish(&self, snapshot: &Snapshot) -> PublishReport {
        let (broker_up, dashboard_up) = {
            let sup = self.supervisor.lock().await;
            (sup.is_up(LinkId::Broker), sup.is_up(LinkId::Dashboard))
        };

        let report = {
            let mut broker = match broker_up {
                true => Some(self.broker.lock().await),
                false => None,
            };
            let mut dashboard = match dashboard_up {
                true => Some(self.dashboard.lock().await),
                false => None,
            };
            self.publisher
                .publish(snapshot, broker.as_deref_mut(), dashboard.as_deref_mut())
                .await
        };

        let failed = report.failed().collect::<Vec<_>>();
        if !failed.is_empty() {
            let now = Instant::now();
            let mut sup = self.supervisor.lock().await;
            for sink in failed {
                sup.mark_down(sink.link(), now);
            }
            drop(sup);
            self.publish_link_status().await;
        }
        report
    }

    /// One supervision pass: health-check `Up` links, then attempt the ones
    /// that are due, WiFi first.
    pub async fn supervise(&self) {
        let now = Instant::now();
        for link in LinkId::ALL {
            if !self.supervisor.lock().await.check_due(link, now) {
                continue;
            }
            let healthy = match link {
                LinkId::Wifi => match self.wifi.lock().await.is_connected() {
                    true => Ok(()),
                    false => Err(LinkError::new(link, "disconnected")),
                },
                LinkId::Broker => self.broker.lock().await.ping().await,
                LinkId::Dashboard => match self.dashboard.lock().await.is_connected() {
                    true => Ok(()),
                    false => Err(LinkError::new(link, "disconnected")),
                },
            };
            let mut sup = self.supervisor.lock().await;
            match healthy {
                Ok(()) => sup.checked(link, now),
                Err(e) => {
                    error!("{e}");
                    sup.mark_down(link, Instant::now());
                }
            }
        }

        for link in LinkId::ALL {
            {
                let mut sup = self.supervisor.lock().await;
                if !sup.should_attempt(link, Instant::now()) {
                    continue;
                }
                sup.begin_attempt(link);
            }
            self.publish_link_status().await;

            let res = match link {
                LinkId::Wifi => {
                    let c = &self.state.config;
                    self.wifi.lock().await.connect(&c.wifi_ssid, &c.wifi_pass).await
                }
                LinkId::Broker => self.broker.lock().await.connect().await,
                LinkId::Dashboard => self.dashboard.lock().await.connect().await,
            };

            let mut sup = self.supervisor.lock().await;
            match res {
                Ok(()) => sup.attempt_succeeded(link, Instant::now()),
                Err(e) => {
                    error!("{e}");
                    sup.mark_down(link, Instant::now());
                }
            }
        }
        self.publish_link_status().await;
    }

    /// Handle writes from the dashboard side.
    pub async fn poll_dashboard(&self) {
        if !self.supervisor.lock().await.is_up(LinkId::Dashboard) {
            return;
        }
        let res = self.dashboard.lock().await.poll_inbound().await;
        let writes = match res {
            Ok(w) => w,
            Err(e) => {
                error!("{e}");
                self.supervisor
                    .lock()
                    .await
                    .mark_down(LinkId::Dashboard, Instant::now());
                self.publish_link_status().await;
                return;
            }
        };
        for w in writes {
            self.on_inbound(w).await;
        }
    }

    pub async fn on_inbound(&self, write: InboundWrite) {
        if write.channel != channel::FAN_DUTY {
            warn!("Ignoring write to V{}", write.channel);
            return;
        }
        let Some(percent) = write.duty_percent() else {
            warn!("Rejected duty override {:?}", write.value);
            return;
        };
        if let Err(e) = self.apply_override(percent).await {
            error!("Duty override failed: {e}");
        }
    }

    /// Apply a remote duty now and keep it over the thermostat for the
    /// configured hold time.
    pub async fn apply_override(&self, percent: u8) -> Result<(), FanError> {
        let mut thermostat = self.thermostat.lock().await;
        let mut active = self.state.duty_override.write().await;
        self.fan.lock().await.set_duty(percent)?;
        thermostat.hold(percent);
        let until = Instant::now() + self.state.config.override_hold();
        *active = Some(DutyOverride { percent, until });
        info!(
            "Remote duty override {percent}% for {}s",
            self.state.config.override_secs
        );
        Ok(())
    }

    pub async fn link_state(&self, link: LinkId) -> LinkState {
        self.supervisor.lock().await.state(link)
    }

    pub async fn connectivity(&self, link: LinkId) -> Connectivity {
        self.supervisor.lock().await.connectivity(link)
    }

    pub async fn fan_duty(&self) -> u8 {
        self.fan.lock().await.get_duty()
    }

    async fn publish_link_status(&self) {
        let (status, wifi_up) = {
            let sup = self.supervisor.lock().await;
            (sup.status(), sup.is_up(LinkId::Wifi))
        };
        *self.state.links.write().await = status;

        let ip = match wifi_up {
            true => self.wifi.lock().await.ip_address(),
            false => None,
        };
        let mut ip_addr = self.state.ip_addr.write().await;
        if *ip_addr != ip {
            if let Some(ip) = &ip {
                info!("WiFi address {ip}");
            }
            *ip_addr = ip;
        }
    }
}


// EOF
