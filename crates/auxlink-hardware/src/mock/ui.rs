//! Recording UI collaborator.

use std::cell::{Cell, RefCell};

use auxlink_core::{BleIcon, WarningLevel};
use tokio::sync::{Mutex, mpsc};

use crate::traits::UiCollaborator;
use crate::types::PairingResponse;
use crate::{HardwareError, Result};

/// Everything the core asked the UI to do, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    Battery { capacity: u8, charging: bool },
    Charging(bool),
    Usb(bool),
    Ble(BleIcon),
    PairingCode(String),
    PairingCodeDismissed,
    PairingFailure,
    PairingSuccess,
    PairingForbidden,
    FingerprintFailure(WarningLevel),
    PinPromptRefreshed,
    FingerprintTips,
    OthersDismissed,
    PowerOff { allow_shutdown: bool },
    Home,
}

/// UI that records every request and answers dialogs from its handle.
///
/// A pairing code waits for [`MockUiHandle::respond`] (or the configured
/// auto-response). A failure dialog waits for
/// [`MockUiHandle::dismiss_failure_dialog`]; once the handle is dropped the
/// dialog closes immediately while pairing codes stay unanswered.
///
/// # Examples
///
/// ```
/// use auxlink_hardware::mock::{MockUi, UiEvent};
/// use auxlink_hardware::traits::UiCollaborator;
///
/// let (ui, _handle) = MockUi::new();
/// ui.set_battery(75, false);
/// assert_eq!(ui.events(), vec![UiEvent::Battery { capacity: 75, charging: false }]);
/// ```
#[derive(Debug)]
pub struct MockUi {
    events: RefCell<Vec<UiEvent>>,
    responses: Mutex<mpsc::UnboundedReceiver<PairingResponse>>,
    dismissals: Mutex<mpsc::UnboundedReceiver<()>>,
    auto_response: Cell<Option<PairingResponse>>,
    enrolment_screen: Cell<bool>,
}

impl MockUi {
    pub fn new() -> (Self, MockUiHandle) {
        let (response_tx, response_rx) = mpsc::unbounded_channel();
        let (dismiss_tx, dismiss_rx) = mpsc::unbounded_channel();

        let ui = Self {
            events: RefCell::new(Vec::new()),
            responses: Mutex::new(response_rx),
            dismissals: Mutex::new(dismiss_rx),
            auto_response: Cell::new(None),
            enrolment_screen: Cell::new(false),
        };
        let handle = MockUiHandle {
            response_tx,
            dismiss_tx,
        };
        (ui, handle)
    }

    /// Snapshot of the recorded requests.
    pub fn events(&self) -> Vec<UiEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// Pairing codes shown so far, oldest first.
    pub fn displayed_codes(&self) -> Vec<String> {
        self.events
            .borrow()
            .iter()
            .filter_map(|event| match event {
                UiEvent::PairingCode(code) => Some(code.clone()),
                _ => None,
            })
            .collect()
    }

    /// Answer every pairing code with `response` without waiting for the handle.
    pub fn set_auto_response(&self, response: Option<PairingResponse>) {
        self.auto_response.set(response);
    }

    /// Pretend the fingerprint enrolment screen is visible.
    pub fn set_enrolment_screen(&self, shown: bool) {
        self.enrolment_screen.set(shown);
    }

    fn record(&self, event: UiEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl UiCollaborator for MockUi {
    fn set_battery(&self, capacity: u8, charging: bool) {
        self.record(UiEvent::Battery { capacity, charging });
    }

    fn show_charging(&self, on: bool) {
        self.record(UiEvent::Charging(on));
    }

    fn show_usb(&self, on: bool) {
        self.record(UiEvent::Usb(on));
    }

    fn show_ble(&self, icon: BleIcon) {
        self.record(UiEvent::Ble(icon));
    }

    async fn confirm_pairing_code(&self, code: &str) -> PairingResponse {
        self.record(UiEvent::PairingCode(code.to_string()));
        if let Some(response) = self.auto_response.get() {
            return response;
        }

        let mut responses = self.responses.lock().await;
        match responses.recv().await {
            Some(response) => response,
            // Nobody will ever answer.
            None => std::future::pending().await,
        }
    }

    fn dismiss_pairing_code(&self) {
        self.record(UiEvent::PairingCodeDismissed);
    }

    async fn show_pairing_failure(&self) {
        self.record(UiEvent::PairingFailure);
        let mut dismissals = self.dismissals.lock().await;
        let _ = dismissals.recv().await;
    }

    async fn show_pairing_success(&self) {
        self.record(UiEvent::PairingSuccess);
    }

    fn show_pairing_forbidden(&self) {
        self.record(UiEvent::PairingForbidden);
    }

    fn show_fingerprint_failure(&self, level: WarningLevel) {
        self.record(UiEvent::FingerprintFailure(level));
    }

    fn refresh_pin_fingerprint_prompt(&self) {
        self.record(UiEvent::PinPromptRefreshed);
    }

    fn prompt_fingerprint_tips(&self) -> bool {
        if !self.enrolment_screen.get() {
            return false;
        }
        self.record(UiEvent::FingerprintTips);
        true
    }

    fn dismiss_others(&self) {
        self.record(UiEvent::OthersDismissed);
    }

    fn show_power_off(&self, allow_shutdown: bool) {
        self.record(UiEvent::PowerOff { allow_shutdown });
    }

    fn show_home(&self) {
        self.record(UiEvent::Home);
    }
}

/// Plays the user in front of a [`MockUi`].
#[derive(Debug, Clone)]
pub struct MockUiHandle {
    response_tx: mpsc::UnboundedSender<PairingResponse>,
    dismiss_tx: mpsc::UnboundedSender<()>,
}

impl MockUiHandle {
    /// Answer the next (or currently shown) pairing code.
    pub fn respond(&self, response: PairingResponse) -> Result<()> {
        self.response_tx
            .send(response)
            .map_err(|_| HardwareError::disconnected("pairing dialog"))
    }

    /// Close the currently shown (or next) pairing-failure dialog.
    pub fn dismiss_failure_dialog(&self) -> Result<()> {
        self.dismiss_tx
            .send(())
            .map_err(|_| HardwareError::disconnected("failure dialog"))
    }
}
