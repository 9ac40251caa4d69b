//! The device core: shared state, collaborators and the fail-stop signal.
//!
//! A [`Device`] lives in an `Rc` on a single `LocalSet`. Handlers borrow
//! [`DeviceState`] only between suspension points, so no borrow is ever held
//! across an `.await`.

use std::cell::{Ref, RefCell};
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use bytes::Bytes;
use futures::FutureExt;
use tokio::task::JoinSet;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use auxlink_core::constants::INITIAL_FETCH_POLL_INTERVAL;
use auxlink_core::{ChargeWirelessState, DeviceConfig, Error, Result};
use auxlink_hardware::{DisplayControl, Platform, SessionControl};
use auxlink_protocol::ControlCommand;

use crate::button::ButtonState;
use crate::control::{ControlReceiver, ControlSender, control_channel};
use crate::pairing::PairingSession;
use crate::status::{Fact, FactValue, StatusCache, StatusSnapshot};

/// Mutable state shared by every handler and loop.
#[derive(Debug, Default)]
pub struct DeviceState {
    pub status: StatusCache,
    pub button: ButtonState,
    pub pairing: PairingSession,
}

pub struct Device<P: Platform> {
    platform: P,
    config: DeviceConfig,
    control: ControlSender,
    state: RefCell<DeviceState>,

    /// Cancelled on the first fatal fault.
    fault: CancellationToken,
    first_fault: RefCell<Option<String>>,
    /// Detached pairing and dialog tasks, aborted at shutdown.
    detached: RefCell<JoinSet<()>>,
}

impl<P: Platform> Device<P> {
    /// Build a device and the receiving end of its control queue.
    pub fn new(platform: P, config: DeviceConfig) -> (Self, ControlReceiver) {
        let (control, receiver) = control_channel();
        let device = Self {
            platform,
            config,
            control,
            state: RefCell::new(DeviceState::default()),
            fault: CancellationToken::new(),
            first_fault: RefCell::new(None),
            detached: RefCell::new(JoinSet::new()),
        };
        (device, receiver)
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    /// Read-only view of the shared state.
    ///
    /// # Panics
    /// Panics if held across a call that mutates the state.
    pub fn state(&self) -> Ref<'_, DeviceState> {
        self.state.borrow()
    }

    pub(crate) fn update<R>(&self, f: impl FnOnce(&mut DeviceState) -> R) -> R {
        f(&mut self.state.borrow_mut())
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.state.borrow().status.snapshot()
    }

    pub(crate) fn send(&self, command: ControlCommand) -> Result<()> {
        self.control.send(command)
    }

    /// Ask the chip for `fact` unless it is known or already asked for.
    pub fn request_if_unknown(&self, fact: Fact) -> Result<()> {
        let request = self.update(|state| state.status.request_if_unknown(fact));
        match request {
            Some(command) => self.send(command),
            None => Ok(()),
        }
    }

    /// Read a cached fact, requesting it from the chip when unknown.
    pub fn get_or_request<T>(
        &self,
        fact: Fact,
        read: impl FnOnce(&StatusCache) -> Option<T>,
    ) -> Result<Option<T>> {
        let value = read(&self.state.borrow().status);
        if value.is_none() {
            self.request_if_unknown(fact)?;
        }
        Ok(value)
    }

    // ------------------------------------------------------------------
    // Fail-stop
    // ------------------------------------------------------------------

    /// Record a fatal fault and cancel everything watching the fault token.
    pub fn report_fault(&self, task: &str, fault: &Error) {
        error!(task, %fault, "fatal fault, clearing scheduler");
        let mut first = self.first_fault.borrow_mut();
        if first.is_none() {
            *first = Some(format!("{task}: {fault}"));
        }
        self.fault.cancel();
    }

    /// First fatal fault, if any.
    pub fn fault(&self) -> Option<String> {
        self.first_fault.borrow().clone()
    }

    pub fn is_faulted(&self) -> bool {
        self.fault.is_cancelled()
    }

    pub fn fault_token(&self) -> CancellationToken {
        self.fault.clone()
    }

    /// Run `task` on the local scheduler, detached from the caller.
    ///
    /// The task is dropped when the device faults. An error it returns, or a
    /// panic, is itself a fault.
    pub(crate) fn spawn_detached<F>(self: &Rc<Self>, name: &'static str, task: F)
    where
        F: Future<Output = Result<()>> + 'static,
    {
        let device = Rc::clone(self);
        let mut detached = self.detached.borrow_mut();
        // Reap finished tasks; their outcome was reported from inside.
        while detached.try_join_next().is_some() {}
        detached.spawn_local(async move {
            let outcome = tokio::select! {
                _ = device.fault.cancelled() => return,
                outcome = AssertUnwindSafe(task).catch_unwind() => outcome,
            };
            match outcome {
                Ok(Ok(())) => {}
                Ok(Err(fault)) => device.report_fault(name, &fault),
                Err(panic) => {
                    let fault = Error::Collaborator(format!("panicked: {}", panic_message(&*panic)));
                    device.report_fault(name, &fault);
                }
            }
        });
    }

    /// Number of detached tasks not yet reaped.
    pub fn detached_tasks(&self) -> usize {
        self.detached.borrow().len()
    }

    /// Abort every detached task and wait until they are gone.
    pub async fn shutdown_detached(&self) {
        let mut detached = std::mem::take(&mut *self.detached.borrow_mut());
        detached.shutdown().await;
    }

    // ------------------------------------------------------------------
    // Loops and shared flows
    // ------------------------------------------------------------------

    /// Restart the home screen and, with `ack`, wait for the wire layer.
    pub async fn safe_reloop(&self, ack: bool) {
        let board = self.platform.board();
        board.reset_home_state();
        if ack {
            board.signal_ack().await;
        }
    }

    /// Initial fetch: once the display is on, ask for everything worth knowing.
    pub async fn fetch_all(&self) -> Result<()> {
        while !self.platform.board().is_display_on() {
            time::sleep(INITIAL_FETCH_POLL_INTERVAL).await;
        }
        info!("display on, fetching chip status");

        self.flashlight_close()?;
        for command in [
            ControlCommand::request_ble_name(),
            ControlCommand::request_ble_version(),
            ControlCommand::request_ble_status(),
            ControlCommand::request_battery_level(),
            ControlCommand::request_charging_status(),
        ] {
            self.send(command)?;
        }
        self.request_if_unknown(Fact::FlashlightBrightness)
    }

    /// Periodically re-request every BLE fact that is still unknown, and
    /// let readers of any other unknown fact ask for it again.
    pub async fn run_ble_refresh(&self) -> Result<()> {
        let mut ticker = time::interval(self.config.ble_refresh_interval());
        ticker.set_missed_tick_behavior(time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            let requests = self.update(|state| state.status.refresh_tick());
            for command in requests {
                self.send(command)?;
            }
        }
    }

    /// Prepare for low-power mode.
    ///
    /// Returns `true` when the low-power wake timer must stay armed because
    /// wireless charging is still waiting for a temperature reading.
    pub fn prepare_low_power(&self) -> Result<bool> {
        self.disconnect_ble()?;
        let starting = self.state.borrow().status.wireless_state() == ChargeWirelessState::Starting;
        if starting {
            debug!("wireless charge starting, keeping low-power timer");
            self.fetch_battery_temperature()?;
        }
        Ok(starting)
    }

    // ------------------------------------------------------------------
    // Flashlight and power
    // ------------------------------------------------------------------

    pub fn flashlight_open(&self) -> Result<()> {
        let brightness = self.config.flashlight_default_brightness;
        self.update(|state| {
            state
                .status
                .observe(FactValue::FlashlightBrightness(brightness))
        });
        self.send(ControlCommand::flashlight(brightness))
    }

    /// Switch the flashlight off if it is known to be lit.
    pub fn flashlight_close(&self) -> Result<()> {
        let lit = matches!(self.state.borrow().status.flashlight_brightness(), Some(b) if b > 0);
        if !lit {
            return Ok(());
        }
        self.update(|state| state.status.observe(FactValue::FlashlightBrightness(0)));
        self.send(ControlCommand::flashlight(0))
    }

    /// Whether the flashlight is lit. Unknown reads as off and asks the chip.
    pub fn is_flashlight_on(&self) -> Result<bool> {
        let brightness =
            self.get_or_request(Fact::FlashlightBrightness, StatusCache::flashlight_brightness)?;
        Ok(brightness.is_some_and(|b| b > 0))
    }

    pub fn ctrl_power_off(&self) -> Result<()> {
        info!("requesting power off");
        self.send(ControlCommand::power_off())
    }

    pub fn fetch_battery_temperature(&self) -> Result<()> {
        self.send(ControlCommand::request_battery_temperature())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn ble_name(&self) -> String {
        self.state.borrow().status.ble_name().unwrap_or_default().to_string()
    }

    pub fn ble_version(&self) -> String {
        self.state.borrow().status.ble_version().unwrap_or_default().to_string()
    }

    pub fn ble_build_id(&self) -> String {
        self.state.borrow().status.ble_build_id().unwrap_or_default().to_string()
    }

    pub fn ble_hash(&self) -> Bytes {
        self.state.borrow().status.ble_hash().cloned().unwrap_or_default()
    }

    pub fn ble_mac(&self) -> Bytes {
        self.state.borrow().status.ble_mac().cloned().unwrap_or_default()
    }

    /// BLE counts as open until the chip says otherwise.
    pub fn is_ble_opened(&self) -> bool {
        self.state.borrow().status.ble_enabled().unwrap_or(true)
    }

    pub fn battery_capacity(&self) -> Result<Option<u8>> {
        self.get_or_request(Fact::BatteryCapacity, StatusCache::battery_capacity)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "unknown panic"
    }
}
