//! BLE radio status and control.

use tracing::{debug, info};

use auxlink_core::{BleIcon, Result};
use auxlink_hardware::{DeviceStorage, DisplayControl, Platform, SessionControl, UiCollaborator};
use auxlink_protocol::{BleStatus, ControlCommand};

use crate::device::Device;
use crate::status::FactValue;

impl<P: Platform> Device<P> {
    /// Handle a BLE status report.
    pub async fn on_ble_status(&self, status: BleStatus) -> Result<()> {
        let ui = self.platform().ui();
        let board = self.platform().board();
        debug!(?status, "ble status");

        match status {
            BleStatus::Connected => {
                self.observe_ble(FactValue::BleConnected(true));
                board.wake_display_for(self.config().ble_connected_wake());
                ui.show_ble(BleIcon::Connected);
            }
            BleStatus::Disconnected => {
                self.observe_ble(FactValue::BleConnected(false));
                if self.state().status.ble_enabled() != Some(true) {
                    return Ok(());
                }
                ui.show_ble(BleIcon::Enabled);
                self.safe_reloop(true).await;
            }
            BleStatus::Opened => {
                self.observe_ble(FactValue::BleEnabled(true));
                if self.state().status.ble_connected() == Some(true) {
                    return Ok(());
                }
                ui.show_ble(BleIcon::Enabled);
                if board.is_unlocked() {
                    board.set_ble_enabled(true);
                }
            }
            BleStatus::Closed => {
                self.observe_ble(FactValue::BleConnected(false));
                if !board.is_provisioned() {
                    // BLE stays on until the device is set up.
                    ui.show_ble(BleIcon::Enabled);
                    return self.ctrl_ble(true);
                }
                self.observe_ble(FactValue::BleEnabled(false));
                ui.show_ble(BleIcon::Disabled);
                if board.is_unlocked() {
                    board.set_ble_enabled(false);
                }
            }
        }
        Ok(())
    }

    /// Open or close the BLE radio.
    pub fn ctrl_ble(&self, enable: bool) -> Result<()> {
        info!(enable, "ble control");
        self.observe_ble(FactValue::BleEnabled(enable));
        self.send(if enable {
            ControlCommand::ble_open()
        } else {
            ControlCommand::ble_close()
        })
    }

    /// Drop the current BLE central, if one is connected.
    pub fn disconnect_ble(&self) -> Result<()> {
        if self.state().status.ble_connected() != Some(true) {
            return Ok(());
        }
        self.send(ControlCommand::ble_disconnect())
    }

    fn observe_ble(&self, value: FactValue) {
        self.update(|state| state.status.observe(value));
    }
}
