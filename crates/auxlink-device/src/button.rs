//! Side-button classification.
//!
//! The chip reports both raw edges (press, release) and its own short/long
//! classification. Raw edges only track whether the button is physically
//! held; the classified presses drive lock and power-off.

use tokio::time;
use tracing::debug;

use auxlink_core::Result;
use auxlink_hardware::{DeviceStorage, DisplayControl, Platform, SessionControl, UiCollaborator};
use auxlink_protocol::ButtonEvent;

use crate::device::Device;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pressing: bool,
}

impl ButtonState {
    /// The button is physically held down.
    pub fn is_pressing(&self) -> bool {
        self.pressing
    }
}

impl<P: Platform> Device<P> {
    pub async fn on_button(&self, event: ButtonEvent) -> Result<()> {
        let board = self.platform().board();

        if matches!(event, ButtonEvent::ShortPress | ButtonEvent::LongPress) {
            self.flashlight_close()?;
            if board.is_collecting_fingerprint() {
                debug!(?event, "press ignored during fingerprint capture");
                return Ok(());
            }
        }

        match event {
            ButtonEvent::ShortPress => self.short_press().await,
            ButtonEvent::LongPress => self.long_press().await,
            ButtonEvent::RawPress => {
                self.update(|state| state.button.pressing = true);
                if board.is_collecting_fingerprint() {
                    self.platform().ui().prompt_fingerprint_tips();
                }
                Ok(())
            }
            ButtonEvent::RawRelease => {
                self.update(|state| state.button.pressing = false);
                Ok(())
            }
        }
    }

    async fn short_press(&self) -> Result<()> {
        let board = self.platform().board();

        if !board.is_display_on() {
            board.wake_display();
            return Ok(());
        }

        board.arm_sleep_after_cancel();
        if board.is_wire_busy() {
            // Never lock in the middle of a host transaction.
            self.platform().ui().dismiss_others();
            return Ok(());
        }

        board.display_off();
        if !board.is_provisioned() || board.is_setup_in_progress() {
            board.clear_sleep_after_cancel();
            return Ok(());
        }

        self.lock_device();
        if time::timeout(self.config().safe_reloop_timeout(), self.safe_reloop(true))
            .await
            .is_err()
        {
            debug!("safe reloop not acknowledged in time");
        }
        time::sleep(self.config().lock_resume_delay()).await;
        board.restart_idle_loop();
        self.platform().ui().show_home();
        Ok(())
    }

    async fn long_press(&self) -> Result<()> {
        let board = self.platform().board();
        board.close_camera();

        let allow_shutdown = board.is_provisioned() && !board.is_setup_in_progress();
        self.platform().ui().show_power_off(allow_shutdown);
        time::sleep(self.config().power_off_resume_delay()).await;
        board.lcd_resume();
        Ok(())
    }

    /// Close the secure session and lock the strongest factor available.
    ///
    /// Does nothing unless a PIN protects an unlocked device.
    pub(crate) fn lock_device(&self) {
        let board = self.platform().board();
        if !(board.has_pin() && board.is_unlocked()) {
            return;
        }
        board.clear_secure_session();
        if board.fingerprint_available() {
            if board.fingerprint_unlocked() {
                board.lock_fingerprint();
            }
        } else {
            board.lock();
        }
    }
}
