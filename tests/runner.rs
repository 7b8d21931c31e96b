//! Session runner tests over a real event channel.

mod common;

use common::*;
use glucowatch_bridge_lib::core::bluetooth::{CentralEvent, Generation, SessionEvent};
use glucowatch_bridge_lib::core::{ConnectionState, SessionOptions, SessionRunner};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn runner_drives_session_to_ready_then_tears_down() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut runner = SessionRunner::new(machine(), rx);
    runner.machine_mut().start_scan();
    let generation = runner.machine().generation();

    let script = vec![
        CentralEvent::DeviceDiscovered(sensor_advertisement()),
        CentralEvent::ConnectionEstablished,
        CentralEvent::ServicesDiscovered(vec![DEVICE_INFO_SERVICE, GLUCOSE_SERVICE]),
        CentralEvent::CharacteristicsDiscovered {
            service: DEVICE_INFO_SERVICE,
            characteristics: vec![MANUFACTURER],
        },
        CentralEvent::CharacteristicsDiscovered {
            service: GLUCOSE_SERVICE,
            characteristics: vec![GLUCOSE],
        },
        glucose_value(100),
        manufacturer_value("CoreHealth"),
    ];
    for event in script {
        tx.send(SessionEvent::new(generation, event)).unwrap();
    }
    drop(tx);

    let machine = runner.run(CancellationToken::new()).await;

    let states = machine.observer().states();
    assert!(states.contains(&ConnectionState::Ready));
    assert_eq!(states.last(), Some(&ConnectionState::Disconnected));
    assert_eq!(machine.observer().readings(), vec![100]);
    assert_eq!(machine.device_info().manufacturer_name, "CoreHealth");
    assert_eq!(machine.central().requests.last(), Some(&Request::Disconnect));
}

#[tokio::test]
async fn cancellation_stops_an_active_scan() {
    let (_tx, rx) = mpsc::unbounded_channel();
    let mut runner = SessionRunner::new(machine(), rx);
    runner.machine_mut().start_scan();

    let cancel_token = CancellationToken::new();
    cancel_token.cancel();
    let machine = runner.run(cancel_token).await;

    assert_eq!(machine.central().requests.last(), Some(&Request::StopScan));
    assert_eq!(machine.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn stale_events_in_the_queue_are_ignored() {
    let (tx, rx) = mpsc::unbounded_channel();
    let mut runner = SessionRunner::new(machine_with(SessionOptions::default()), rx);
    runner.machine_mut().start_scan();
    let current = runner.machine().generation();

    tx.send(SessionEvent::new(
        Generation(current.0 + 7),
        CentralEvent::DeviceDiscovered(sensor_advertisement()),
    ))
    .unwrap();
    tx.send(SessionEvent::new(current, CentralEvent::ScanTimeout)).unwrap();
    drop(tx);

    let machine = runner.run(CancellationToken::new()).await;

    assert_eq!(machine.central().count(|r| matches!(r, Request::Connect(..))), 0);
    assert_eq!(
        machine.observer().states().last(),
        Some(&ConnectionState::Failed(glucowatch_bridge_lib::core::FailureReason::ScanTimeout))
    );
}

#[tokio::test]
async fn run_waits_for_the_teardown_disconnect() {
    let central = FakeCentral::with_disconnect_latency(Duration::from_millis(20));
    let mut machine = reading_machine_on(central, SessionOptions::default());
    deliver(&mut machine, manufacturer_value("CoreHealth"));
    deliver(&mut machine, glucose_value(100));
    assert_eq!(machine.connection_state(), ConnectionState::Ready);

    let (_tx, rx) = mpsc::unbounded_channel();
    let runner = SessionRunner::new(machine, rx);
    let cancel_token = CancellationToken::new();
    cancel_token.cancel();
    let machine = runner.run(cancel_token).await;

    assert_eq!(machine.connection_state(), ConnectionState::Disconnected);
    assert_eq!(machine.central().requests.last(), Some(&Request::Disconnect));
    assert!(machine.central().disconnect_finished());
}
