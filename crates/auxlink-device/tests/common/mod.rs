//! Shared rig for the device integration tests.
//!
//! A [`Rig`] is a dispatcher wired to mock collaborators, plus the control
//! queue and the handles that play the user and the sensors.

#![allow(dead_code)]

use std::rc::Rc;

use bytes::Bytes;

use auxlink_core::DeviceConfig;
use auxlink_device::{ControlReceiver, Device, Dispatched, Dispatcher};
use auxlink_hardware::mock::{MockBoard, MockPlatform, MockPlatformHandle};
use auxlink_protocol::Frame;

pub const BLE_STATUS: u8 = 2;
pub const PAIRING_CODE: u8 = 3;
pub const PAIRING_RESULT: u8 = 4;
pub const CHARGING_STATUS: u8 = 8;
pub const BATTERY_LEVEL: u8 = 9;
pub const BATTERY_INFO: u8 = 13;

pub struct Rig {
    pub dispatcher: Dispatcher<MockPlatform>,
    pub control: ControlReceiver,
    pub handle: MockPlatformHandle,
}

impl Rig {
    pub fn new(board: MockBoard) -> Self {
        let (platform, handle) = MockPlatform::with_board(board);
        let (device, control) = Device::new(platform, DeviceConfig::default());
        Self {
            dispatcher: Dispatcher::new(Rc::new(device)),
            control,
            handle,
        }
    }

    pub fn device(&self) -> &Rc<Device<MockPlatform>> {
        self.dispatcher.device()
    }

    /// Dispatch one frame built from `command` and `payload`.
    pub async fn push(&self, command: u8, payload: &[u8]) -> Dispatched {
        self.dispatcher
            .dispatch(&frame(command, payload))
            .await
            .expect("handler failed")
    }
}

/// Host-side frame bytes for `command`.
pub fn frame(command: u8, payload: &[u8]) -> Bytes {
    Frame::new(command, Bytes::copy_from_slice(payload)).to_bytes()
}

/// Wire bytes for `command`, xor trailer included.
pub fn wire(command: u8, payload: &[u8]) -> Bytes {
    Frame::new(command, Bytes::copy_from_slice(payload)).to_wire()
}

/// Let detached tasks run until they block.
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
