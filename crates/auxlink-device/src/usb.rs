//! USB plug-state loop.

use tracing::{debug, info};

use auxlink_core::{HapticPattern, Result};
use auxlink_hardware::{
    DeviceStorage, DisplayControl, Haptics, Platform, SessionControl, UiCollaborator, UsbEvent,
    UsbMonitor,
};
use auxlink_protocol::ControlCommand;

use crate::device::Device;

impl<P: Platform> Device<P> {
    /// Follow USB plug events until the monitor fails.
    pub async fn run_usb_loop(&self) -> Result<()> {
        loop {
            let event = self.platform().usb().next_event().await?;
            self.on_usb_event(event).await?;
        }
    }

    pub async fn on_usb_event(&self, event: UsbEvent) -> Result<()> {
        let ui = self.platform().ui();
        let board = self.platform().board();
        debug!(?event, "usb event");

        let plugged = match event {
            UsbEvent::DataLink(enable) => {
                if board.is_usb_enabled() {
                    board.connect_usb(enable);
                } else {
                    debug!(enable, "usb disabled, data link toggle ignored");
                }
                return Ok(());
            }
            UsbEvent::Plug(plugged) => plugged,
        };

        board.wake_display();
        let capacity = self.state().status.battery_icon_capacity();
        ui.show_usb(plugged);
        ui.show_charging(plugged);
        if let Some(capacity) = capacity {
            ui.set_battery(capacity, plugged);
        }
        if plugged {
            board.vibrate(HapticPattern::Medium);
        } else if capacity.is_some() {
            self.send(ControlCommand::request_charging_status())?;
        }

        let auto_lock = board.is_usb_lock_enabled();
        if auto_lock && board.is_provisioned() && board.has_pin() {
            if board.is_unlocked() {
                info!(plugged, "usb auto-lock");
                self.lock_device();
                self.safe_reloop(true).await;
                board.restart_idle_loop();
            }
        } else if !auto_lock && !plugged {
            self.safe_reloop(false).await;
        }

        board.reload_settings();
        Ok(())
    }
}
