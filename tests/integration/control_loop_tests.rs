//! Sampling cycle: probes, thermostat, fan, power estimate, publishing.

use std::time::Duration;

use solarfan::*;
use tokio::time::{advance, timeout};

use crate::mock_hw::*;

#[tokio::test(start_paused = true)]
async fn hot_panel_cycle_runs_fan_and_publishes() {
    let rig = online_rig().await;
    advance(Duration::from_secs(2)).await;
    for _ in 0..220 {
        rig.pulse.on_edge();
    }

    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.temperatures.temp_in, Some(20.0));
    assert_eq!(snap.temperatures.temp_out, Some(28.0));
    assert_eq!(snap.temperatures.temp_panel, Some(30.0));
    assert_eq!(snap.fan.duty_cycle_percent, 75);
    // 220 edges over 2 s plus the 750 ms conversion
    assert!((snap.fan.frequency_hz - 80.0).abs() < 0.01, "{}", snap.fan.frequency_hz);
    let power = snap.power_watts.unwrap();
    assert!((power - 316.0).abs() < 0.5, "power={power}");
    assert_eq!(snap.ambient.temperature, Some(12.5));
    assert_eq!(snap.ambient.humidity, Some(61.0));
    assert_eq!(snap.sequence, 1);

    assert_eq!(rig.pwm.0.lock().unwrap().raw.last(), Some(&767));
    assert_eq!(rig.scheduler.state().telemetry.snapshot().await, snap);

    let published = rig.broker.0.lock().unwrap().published.clone();
    assert_eq!(published.len(), 1);
    let (topic, payload) = &published[0];
    assert_eq!(topic, "solarfan");
    let obj = payload.as_object().unwrap();
    assert_eq!(obj.len(), 6);
    assert_eq!(obj["temp_in"], 20.0);
    assert_eq!(obj["temp_out"], 28.0);
    assert_eq!(obj["temp_panel"], 30.0);
    assert_eq!(obj["fan_duty_cycle"], 75);
    assert!((obj["fan_frequency"].as_f64().unwrap() - 80.0).abs() < 0.01);
    assert!((obj["power"].as_f64().unwrap() - 316.0).abs() < 0.5);

    assert_eq!(rig.dashboard.last_write(channel::FAN_DUTY), Some(75.0));
    assert_eq!(rig.dashboard.last_write(channel::TEMP_PANEL), Some(30.0));
    assert_eq!(rig.dashboard.last_write(channel::AMBIENT_HUMIDITY), Some(61.0));
    assert!(rig.dashboard.last_write(channel::POWER).is_some());
}

#[tokio::test(start_paused = true)]
async fn missing_panel_holds_previous_command() {
    let rig = online_rig().await;
    assert_eq!(rig.scheduler.fan_duty().await, 50);

    rig.bus.unplug(PROBE_PANEL);
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.temperatures.temp_panel, None);
    assert_eq!(snap.fan.duty_cycle_percent, 50);

    rig.bus.set(PROBE_PANEL, 30.0);
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 75);

    rig.bus.unplug(PROBE_PANEL);
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 75);

    // at the set point is not above it
    rig.bus.set(PROBE_PANEL, 25.0);
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 0);
    assert_eq!(snap.power_watts, Some(0.0));
}

#[tokio::test(start_paused = true)]
async fn missing_inlet_skips_power_only() {
    let rig = online_rig().await;
    rig.bus.unplug(PROBE_IN);

    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.temperatures.temp_in, None);
    assert_eq!(snap.power_watts, None);
    assert_eq!(snap.fan.duty_cycle_percent, 75);

    let published = rig.broker.0.lock().unwrap().published.clone();
    assert_eq!(published[0].1["temp_in"], serde_json::Value::Null);
    assert_eq!(published[0].1["power"], serde_json::Value::Null);
    // absent values are not written to the dashboard
    assert_eq!(rig.dashboard.last_write(channel::TEMP_IN), None);
}

#[tokio::test(start_paused = true)]
async fn lost_inlet_keeps_last_power_estimate() {
    let rig = online_rig().await;
    let first = rig.scheduler.run_cycle().await.unwrap();
    let power = first.power_watts.unwrap();
    assert!((power - 316.0).abs() < 0.5, "power={power}");

    rig.bus.unplug(PROBE_IN);
    let second = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(second.temperatures.temp_in, None);
    assert_eq!(second.power_watts, Some(power));
    assert_eq!(second.sequence, first.sequence + 1);

    let published = rig.broker.0.lock().unwrap().published.clone();
    assert_eq!(published.len(), 2);
    assert_eq!(published[1].1["temp_in"], serde_json::Value::Null);
    assert_eq!(published[1].1["power"].as_f64(), Some(power as f64));
}

#[tokio::test(start_paused = true)]
async fn fixed_inlet_temperature_replaces_probe() {
    let rig = rig(FanConfig {
        fixed_temp_in: Some(15.0),
        ..test_config()
    });
    rig.scheduler.start().await;

    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.temperatures.temp_in, Some(15.0));
    let power = snap.power_watts.unwrap();
    // 13 C rise at 75%
    assert!((power - 316.0 * 13.0 / 8.0).abs() < 1.0, "power={power}");
}

#[tokio::test(start_paused = true)]
async fn pwm_failure_aborts_cycle() {
    let rig = online_rig().await;
    let before = rig.scheduler.state().telemetry.snapshot().await;
    rig.pwm.0.lock().unwrap().fail = true;

    let res = rig.scheduler.run_cycle().await;
    assert!(matches!(res, Err(CycleError::Fan(FanError::Pwm(_)))), "{res:?}");
    assert_eq!(rig.scheduler.fan_duty().await, 50);
    assert_eq!(rig.scheduler.state().telemetry.snapshot().await, before);
    assert!(rig.broker.0.lock().unwrap().published.is_empty());

    rig.pwm.0.lock().unwrap().fail = false;
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 75);
    assert_eq!(snap.sequence, 1);
}

#[tokio::test(start_paused = true)]
async fn remote_override_holds_then_expires() {
    let rig = online_rig().await;

    rig.dashboard.push_inbound(channel::FAN_DUTY, "40");
    rig.scheduler.poll_dashboard().await;
    assert_eq!(rig.scheduler.fan_duty().await, 40);

    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 40);

    advance(Duration::from_secs(500)).await;
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 40);

    advance(Duration::from_secs(100)).await;
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 75);
    assert!(rig.scheduler.state().duty_override.read().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn invalid_inbound_writes_are_ignored() {
    let rig = online_rig().await;

    rig.dashboard.push_inbound(channel::FAN_DUTY, "250");
    rig.dashboard.push_inbound(channel::FAN_DUTY, "fast");
    rig.dashboard.push_inbound(channel::POWER, "10");
    rig.scheduler.poll_dashboard().await;

    assert_eq!(rig.scheduler.fan_duty().await, 50);
    assert!(rig.scheduler.state().duty_override.read().await.is_none());
}

#[tokio::test(start_paused = true)]
async fn run_samples_on_period() {
    let rig = rig(test_config());
    rig.scheduler.start().await;

    let res = timeout(Duration::from_secs(25), rig.scheduler.run()).await;
    assert!(res.is_err(), "run() must not return");

    // cycles at 0 s, 10 s and 20 s
    assert_eq!(rig.bus.0.lock().unwrap().conversions, 3);
    assert_eq!(rig.broker.0.lock().unwrap().published.len(), 3);
    assert_eq!(rig.scheduler.state().telemetry.snapshot().await.sequence, 3);
}
