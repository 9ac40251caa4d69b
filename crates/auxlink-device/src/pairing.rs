//! BLE pairing: code display, pending codes and results.
//!
//! At most one pairing code is on screen at a time. A code that arrives
//! while another one is shown, or while the failure dialog is open, is kept
//! as the pending code (newest wins) and shown once the screen is free. A
//! pending code the chip has already reported as failed is dropped instead.

use std::rc::Rc;

use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use auxlink_core::{BleIcon, HapticPattern, Result};
use auxlink_hardware::{
    DeviceStorage, DisplayControl, Haptics, PairingResponse, Platform, SessionControl,
    UiCollaborator,
};
use auxlink_protocol::{ControlCommand, PairingOutcome};

use crate::device::Device;

#[derive(Debug, Default)]
pub struct PairingSession {
    /// Code of the attempt in progress, shown or answered.
    active_code: Option<String>,
    pending_code: Option<String>,
    pending_failed: bool,
    abort_requested: bool,
    failure_dialog_open: bool,
    /// Closes the code dialog while it is shown.
    dialog: Option<CancellationToken>,
}

/// What happens to an incoming pairing code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Display,
    Queued,
    Dropped,
}

/// How a shown code dialog ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DialogOutcome {
    Answered(PairingResponse),
    TimedOut,
    /// A pairing result closed the dialog.
    Dismissed,
}

impl PairingSession {
    pub fn active_code(&self) -> Option<&str> {
        self.active_code.as_deref()
    }

    pub fn pending_code(&self) -> Option<&str> {
        self.pending_code.as_deref()
    }

    pub fn is_pending_failed(&self) -> bool {
        self.pending_failed
    }

    pub fn is_abort_requested(&self) -> bool {
        self.abort_requested
    }

    pub fn is_failure_dialog_open(&self) -> bool {
        self.failure_dialog_open
    }

    pub fn is_code_displayed(&self) -> bool {
        self.dialog.is_some()
    }

    /// Decide whether `code` is shown now, kept for later or dropped.
    pub fn admit(&mut self, code: &str) -> Admission {
        if self.pending_failed && self.pending_code.as_deref() == Some(code) {
            self.clear_pending();
            return Admission::Dropped;
        }
        if self.failure_dialog_open || self.dialog.is_some() {
            self.pending_code = Some(code.to_string());
            self.pending_failed = false;
            return Admission::Queued;
        }
        self.clear_pending();
        Admission::Display
    }

    /// Pop the pending code if the screen is free and it did not fail.
    fn next_pending(&mut self) -> Option<String> {
        if self.failure_dialog_open || self.dialog.is_some() {
            return None;
        }
        let code = self.pending_code.take()?;
        if std::mem::take(&mut self.pending_failed) {
            debug!(code, "dropping failed pending pairing code");
            return None;
        }
        Some(code)
    }

    fn clear_pending(&mut self) {
        self.pending_code = None;
        self.pending_failed = false;
    }
}

impl<P: Platform> Device<P> {
    /// Handle a pairing-code report. Runs detached from the dispatcher
    /// because it waits for the user.
    pub async fn on_pairing_code(&self, code: String) -> Result<()> {
        let ui = self.platform().ui();
        let board = self.platform().board();

        board.close_camera();
        self.flashlight_close()?;

        if !board.is_provisioned() {
            info!("pairing refused before setup");
            ui.show_pairing_forbidden();
            return Ok(());
        }
        self.update(|state| state.pairing.abort_requested = false);

        if !board.is_unlocked() {
            if let Err(error) = board.unlock_device().await {
                warn!(%error, "unlock before pairing failed");
                self.update(|state| state.pairing.abort_requested = true);
                self.safe_reloop(true).await;
                board.restart_idle_loop();
                return Ok(());
            }
            if self.state().pairing.abort_requested {
                debug!("pairing aborted while unlocking");
                return Ok(());
            }
        }

        let admission = self.update(|state| state.pairing.admit(&code));
        debug!(code, ?admission, "pairing code");
        if admission == Admission::Display {
            self.present_pairing_code(code).await?;
        }
        Ok(())
    }

    /// Show `code` and forward the user's answer to the chip.
    async fn present_pairing_code(&self, code: String) -> Result<()> {
        let ui = self.platform().ui();
        let dialog = CancellationToken::new();
        self.update(|state| {
            state.pairing.active_code = Some(code.clone());
            state.pairing.dialog = Some(dialog.clone());
        });
        self.platform().board().wake_display();

        let timeout = self.config().pairing_response_timeout();
        let outcome = tokio::select! {
            _ = dialog.cancelled() => DialogOutcome::Dismissed,
            answer = time::timeout(timeout, ui.confirm_pairing_code(&code)) => match answer {
                Ok(response) => DialogOutcome::Answered(response),
                Err(_) => DialogOutcome::TimedOut,
            },
        };
        debug!(code, ?outcome, "pairing dialog closed");

        match outcome {
            DialogOutcome::Dismissed => return Ok(()),
            DialogOutcome::TimedOut => ui.dismiss_pairing_code(),
            DialogOutcome::Answered(_) => {}
        }
        self.update(|state| state.pairing.dialog = None);

        match outcome {
            DialogOutcome::Answered(PairingResponse::Accepted) => {
                self.send(ControlCommand::pairing_accept(&code))
            }
            _ => {
                self.update(|state| state.pairing.abort_requested = true);
                self.send(ControlCommand::pairing_reject())
            }
        }
    }

    /// Handle a pairing-result report.
    pub fn on_pairing_result(self: &Rc<Self>, outcome: PairingOutcome) -> Result<()> {
        let ui = self.platform().ui();
        let board = self.platform().board();
        info!(?outcome, "pairing result");

        ui.dismiss_pairing_code();
        let (attempt, dialog) = self.update(|state| {
            (
                state.pairing.active_code.take(),
                state.pairing.dialog.take(),
            )
        });
        if let Some(dialog) = dialog {
            dialog.cancel();
        }

        match outcome {
            PairingOutcome::Failed => {
                self.update(|state| state.pairing.abort_requested = true);
                board.vibrate(HapticPattern::Error);
                ui.show_ble(BleIcon::Enabled);
                if !board.is_provisioned() {
                    return Ok(());
                }

                let open_dialog = self.update(|state| {
                    let pairing = &mut state.pairing;
                    if attempt.is_none() && pairing.pending_code.is_some() {
                        pairing.pending_failed = true;
                    }
                    !std::mem::replace(&mut pairing.failure_dialog_open, true)
                });
                if open_dialog {
                    let device = Rc::clone(self);
                    self.spawn_detached("pairing failure dialog", async move {
                        device.platform().ui().show_pairing_failure().await;
                        device.update(|state| state.pairing.failure_dialog_open = false);
                        device.show_pending_pairing_code().await
                    });
                }
            }
            PairingOutcome::Success => {
                board.vibrate(HapticPattern::Success);
                if board.is_provisioned() {
                    let device = Rc::clone(self);
                    self.spawn_detached("pairing success dialog", async move {
                        device.platform().ui().show_pairing_success().await;
                        device.show_pending_pairing_code().await
                    });
                }
            }
        }
        Ok(())
    }

    async fn show_pending_pairing_code(&self) -> Result<()> {
        match self.update(|state| state.pairing.next_pending()) {
            Some(code) => self.present_pairing_code(code).await,
            None => Ok(()),
        }
    }
}
