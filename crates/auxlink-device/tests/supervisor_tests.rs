//! Supervisor lifecycle over an in-memory UART.

mod common;

use std::io::Cursor;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::task::LocalSet;

use auxlink_core::{DeviceConfig, Error};
use auxlink_device::Supervisor;
use auxlink_hardware::Platform;
use auxlink_hardware::mock::{MockBoard, MockPlatform, MockPlatformHandle};
use auxlink_protocol::ControlCommand;

use common::{BATTERY_LEVEL, BLE_STATUS, wire};

/// The handle keeps the mock inputs open; hold it for the whole test.
fn supervisor(board: MockBoard) -> (Supervisor<MockPlatform>, MockPlatformHandle) {
    let (platform, handle) = MockPlatform::with_board(board);
    (Supervisor::new(platform, DeviceConfig::default()), handle)
}

#[tokio::test]
async fn test_replayed_stream_then_clean_stop() {
    let (supervisor, _handle) = supervisor(MockBoard::new());
    let device = supervisor.device().clone();

    let mut capture = Vec::new();
    capture.extend_from_slice(&wire(BATTERY_LEVEL, &[60]));
    capture.extend_from_slice(&[0x00, 0x13, 0x37]);
    capture.extend_from_slice(&wire(BLE_STATUS, &[3]));

    let result = LocalSet::new()
        .run_until(supervisor.run(Cursor::new(capture), tokio::io::sink()))
        .await;

    assert!(result.is_ok());
    let snapshot = device.snapshot();
    assert_eq!(snapshot.battery_capacity, Some(60));
    assert_eq!(snapshot.ble_enabled, Some(true));
}

#[tokio::test]
async fn test_malformed_payload_clears_scheduler() {
    let (supervisor, _handle) = supervisor(MockBoard::new());
    let device = supervisor.device().clone();
    let capture = wire(BATTERY_LEVEL, &[0x4B, 0x4C]).to_vec();

    let result = LocalSet::new()
        .run_until(supervisor.run(Cursor::new(capture), tokio::io::sink()))
        .await;

    let Err(Error::SchedulerCleared(fault)) = result else {
        panic!("expected a cleared scheduler, got {result:?}");
    };
    assert!(fault.starts_with("dispatcher:"), "{fault}");
    assert!(device.is_faulted());
}

#[tokio::test]
async fn test_sensor_fault_clears_scheduler() {
    let board = MockBoard::provisioned();
    board.set_fingerprint_available(true);
    let (supervisor, _handle) = supervisor(board);
    supervisor.device().platform().sensor().set_fault("i2c timeout");

    let (_chip, host) = tokio::io::duplex(256);
    let (host_rx, host_tx) = tokio::io::split(host);

    let result = LocalSet::new()
        .run_until(supervisor.run(host_rx, host_tx))
        .await;

    let Err(Error::SchedulerCleared(fault)) = result else {
        panic!("expected a cleared scheduler, got {result:?}");
    };
    assert!(fault.starts_with("fingerprint:"), "{fault}");
}

#[tokio::test]
async fn test_initial_fetch_reaches_the_wire() {
    let (supervisor, _handle) = supervisor(MockBoard::provisioned());
    let (mut chip, host) = tokio::io::duplex(1024);
    let (host_rx, host_tx) = tokio::io::split(host);

    let expected = ControlCommand::request_ble_name().encode();
    let mut received = vec![0u8; expected.len()];

    LocalSet::new()
        .run_until(async {
            let device = tokio::task::spawn_local(supervisor.run(host_rx, host_tx));
            tokio::time::timeout(Duration::from_secs(1), chip.read_exact(&mut received))
                .await
                .unwrap()
                .unwrap();

            chip.shutdown().await.unwrap();
            drop(chip);
            tokio::time::timeout(Duration::from_secs(1), device)
                .await
                .unwrap()
                .unwrap()
                .unwrap();
        })
        .await;

    assert_eq!(received, expected.to_vec());
}
