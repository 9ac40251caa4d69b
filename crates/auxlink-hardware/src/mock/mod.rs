//! Recording collaborator implementations for tests and replay.
//!
//! Every mock records the requests it receives and exposes setters for the
//! state the core reads back. Inputs that arrive asynchronously (pairing
//! answers, touches, USB events) are injected through a handle, the same
//! `(device, handle)` split used throughout this crate.

pub mod board;
pub mod sensor;
pub mod ui;
pub mod usb;

pub use board::{BoardEvent, MockBoard};
pub use sensor::{MockSensor, MockSensorHandle};
pub use ui::{MockUi, MockUiHandle, UiEvent};
pub use usb::{MockUsb, MockUsbHandle};

use crate::traits::Platform;

/// A complete set of mock collaborators.
#[derive(Debug)]
pub struct MockPlatform {
    ui: MockUi,
    board: MockBoard,
    sensor: MockSensor,
    usb: MockUsb,
}

impl MockPlatform {
    /// Fresh, unprovisioned device.
    pub fn new() -> (Self, MockPlatformHandle) {
        Self::with_board(MockBoard::new())
    }

    pub fn with_board(board: MockBoard) -> (Self, MockPlatformHandle) {
        let (ui, ui_handle) = MockUi::new();
        let (sensor, sensor_handle) = MockSensor::new();
        let (usb, usb_handle) = MockUsb::new();

        let platform = Self {
            ui,
            board,
            sensor,
            usb,
        };
        let handle = MockPlatformHandle {
            ui: ui_handle,
            sensor: sensor_handle,
            usb: usb_handle,
        };
        (platform, handle)
    }
}

impl Platform for MockPlatform {
    type Ui = MockUi;
    type Board = MockBoard;
    type Sensor = MockSensor;
    type Usb = MockUsb;

    fn ui(&self) -> &MockUi {
        &self.ui
    }

    fn board(&self) -> &MockBoard {
        &self.board
    }

    fn sensor(&self) -> &MockSensor {
        &self.sensor
    }

    fn usb(&self) -> &MockUsb {
        &self.usb
    }
}

/// Handles for the asynchronous inputs of a [`MockPlatform`].
#[derive(Debug, Clone)]
pub struct MockPlatformHandle {
    pub ui: MockUiHandle,
    pub sensor: MockSensorHandle,
    pub usb: MockUsbHandle,
}
