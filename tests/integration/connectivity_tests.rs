//! Link supervision: ordering, backoff, health checks and sink isolation.

use std::time::Duration;

use solarfan::*;
use tokio::time::advance;

use crate::mock_hw::*;

#[tokio::test(start_paused = true)]
async fn broker_never_attempted_while_wifi_down() {
    let rig = rig(test_config());
    rig.wifi.0.lock().unwrap().fail = true;
    rig.scheduler.start().await;

    for _ in 0..12 {
        rig.scheduler.supervise().await;
        advance(Duration::from_secs(1)).await;
    }

    // attempts at 0 s, 5 s and 10 s
    assert_eq!(rig.wifi.0.lock().unwrap().attempts, 3);
    assert_eq!(rig.broker.0.lock().unwrap().connects, 0);
    assert_eq!(rig.dashboard.0.lock().unwrap().connects, 0);
    assert_eq!(rig.scheduler.connectivity(LinkId::Broker).await, Connectivity::WifiDown);

    // publishing goes nowhere, the cycle still completes
    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(snap.fan.duty_cycle_percent, 75);
    assert!(rig.broker.0.lock().unwrap().published.is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_broker_waits_out_backoff() {
    let rig = rig(test_config());
    rig.broker.0.lock().unwrap().fail_connect = true;
    rig.scheduler.start().await;

    rig.scheduler.supervise().await;
    assert_eq!(rig.scheduler.link_state(LinkId::Wifi).await, LinkState::Up);
    assert_eq!(rig.scheduler.link_state(LinkId::Dashboard).await, LinkState::Up);
    assert_eq!(rig.scheduler.link_state(LinkId::Broker).await, LinkState::Down);
    assert_eq!(
        rig.scheduler.connectivity(LinkId::Broker).await,
        Connectivity::WifiUpLinkDown
    );

    rig.broker.0.lock().unwrap().fail_connect = false;
    advance(Duration::from_secs(4)).await;
    rig.scheduler.supervise().await;
    assert_eq!(rig.broker.0.lock().unwrap().connects, 1);

    advance(Duration::from_secs(1)).await;
    rig.scheduler.supervise().await;
    assert_eq!(rig.broker.0.lock().unwrap().connects, 2);
    assert_eq!(rig.scheduler.connectivity(LinkId::Broker).await, Connectivity::LinkUp);
}

#[tokio::test(start_paused = true)]
async fn wifi_loss_takes_dependents_down() {
    let rig = online_rig().await;
    assert_eq!(
        rig.scheduler.state().ip_addr.read().await.as_deref(),
        Some("192.168.1.50")
    );

    rig.wifi.0.lock().unwrap().connected = false;
    rig.scheduler.supervise().await;
    for link in LinkId::ALL {
        assert_eq!(rig.scheduler.link_state(link).await, LinkState::Down, "{link}");
    }
    assert!(!rig.scheduler.state().wifi_up().await);
    assert_eq!(*rig.scheduler.state().ip_addr.read().await, None);

    advance(Duration::from_secs(5)).await;
    rig.scheduler.supervise().await;
    for link in LinkId::ALL {
        assert_eq!(rig.scheduler.link_state(link).await, LinkState::Up, "{link}");
    }
    assert_eq!(rig.wifi.0.lock().unwrap().attempts, 2);
    assert_eq!(rig.broker.0.lock().unwrap().connects, 2);
}

#[tokio::test(start_paused = true)]
async fn broker_ping_on_interval() {
    let rig = online_rig().await;
    rig.broker.0.lock().unwrap().session_lost = true;

    advance(Duration::from_secs(1)).await;
    rig.scheduler.supervise().await;
    assert_eq!(rig.broker.0.lock().unwrap().pings, 0);
    assert_eq!(rig.scheduler.link_state(LinkId::Broker).await, LinkState::Up);

    advance(Duration::from_secs(30)).await;
    rig.scheduler.supervise().await;
    assert_eq!(rig.broker.0.lock().unwrap().pings, 1);
    assert_eq!(rig.scheduler.link_state(LinkId::Broker).await, LinkState::Down);
    assert_eq!(rig.scheduler.link_state(LinkId::Wifi).await, LinkState::Up);

    advance(Duration::from_secs(5)).await;
    rig.scheduler.supervise().await;
    assert_eq!(rig.scheduler.link_state(LinkId::Broker).await, LinkState::Up);
}

#[tokio::test(start_paused = true)]
async fn dashboard_failure_does_not_block_broker() {
    let rig = online_rig().await;
    rig.dashboard.0.lock().unwrap().fail_write = true;

    let snap = rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(rig.broker.0.lock().unwrap().published.len(), 1);
    assert_eq!(rig.scheduler.link_state(LinkId::Dashboard).await, LinkState::Down);
    assert_eq!(rig.scheduler.link_state(LinkId::Broker).await, LinkState::Up);

    // the failed sink is skipped until it reconnects
    let report = rig.scheduler.publish(&snap).await;
    assert_eq!(report.dashboard, Delivery::Skipped);
    assert_eq!(report.broker, Delivery::Delivered);

    rig.dashboard.0.lock().unwrap().fail_write = false;
    advance(Duration::from_secs(6)).await;
    rig.scheduler.supervise().await;
    assert_eq!(rig.dashboard.0.lock().unwrap().connects, 2);
    let report = rig.scheduler.publish(&snap).await;
    assert_eq!(report.dashboard, Delivery::Delivered);
}

#[tokio::test(start_paused = true)]
async fn broker_failure_does_not_block_dashboard() {
    let rig = online_rig().await;
    rig.broker.0.lock().unwrap().fail_publish = true;

    rig.scheduler.run_cycle().await.unwrap();
    assert_eq!(rig.dashboard.last_write(channel::FAN_DUTY), Some(75.0));
    assert_eq!(rig.scheduler.link_state(LinkId::Broker).await, LinkState::Down);
    assert_eq!(rig.scheduler.link_state(LinkId::Dashboard).await, LinkState::Up);
}

#[tokio::test(start_paused = true)]
async fn disabled_broker_stays_down() {
    let rig = rig(FanConfig {
        mqtt_enable: false,
        ..test_config()
    });
    rig.scheduler.start().await;
    rig.scheduler.supervise().await;

    assert_eq!(rig.broker.0.lock().unwrap().connects, 0);
    assert_eq!(rig.scheduler.link_state(LinkId::Broker).await, LinkState::Down);
    assert_eq!(rig.scheduler.link_state(LinkId::Dashboard).await, LinkState::Up);

    let links = rig.scheduler.state().links.read().await.clone();
    let broker = links.iter().find(|l| l.link == LinkId::Broker).unwrap();
    assert!(!broker.enabled);

    rig.scheduler.run_cycle().await.unwrap();
    assert!(rig.broker.0.lock().unwrap().published.is_empty());
    assert!(rig.dashboard.last_write(channel::FAN_DUTY).is_some());
}
