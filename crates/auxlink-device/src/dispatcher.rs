//! Frame dispatcher.
//!
//! Frames are handled strictly in arrival order: every handler runs to
//! completion before the next frame is read, except the pairing-code flow,
//! which waits on the user and is spawned as a detached task.
//!
//! ```text
//!         frame            decode + parse ok
//! Idle ──────────► (decode) ─────────────────► Handling ──► Idle
//!   ▲                 │ discard / unknown
//!   └─────────────────┘
//! ```

use std::cell::Cell;
use std::rc::Rc;

use futures::StreamExt;
use serde::Serialize;
use tokio::io::AsyncRead;
use tokio_util::codec::FramedRead;
use tracing::{debug, info, trace};

use auxlink_core::Result;
use auxlink_hardware::Platform;
use auxlink_protocol::{AuxCodec, CommandCode, Discard, Frame, InboundCommand};

use crate::device::Device;
use crate::status::FactValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    /// Waiting for the next frame.
    Idle,
    /// Running the handler of the current frame.
    Handling,
}

/// What became of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    Discarded(Discard),
    /// Unknown command code, unknown status value or empty report.
    Ignored,
    Handled(CommandCode),
    /// The handler was spawned as a detached task.
    Spawned(CommandCode),
}

/// Frame counters, by outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DispatchStats {
    pub discarded: u64,
    pub ignored: u64,
    pub handled: u64,
    pub spawned: u64,
}

impl DispatchStats {
    fn record(&mut self, outcome: &Dispatched) {
        match outcome {
            Dispatched::Discarded(_) => self.discarded += 1,
            Dispatched::Ignored => self.ignored += 1,
            Dispatched::Handled(_) => self.handled += 1,
            Dispatched::Spawned(_) => self.spawned += 1,
        }
    }
}

pub struct Dispatcher<P: Platform> {
    device: Rc<Device<P>>,
    state: Cell<DispatchState>,
    stats: Cell<DispatchStats>,
}

impl<P: Platform> Dispatcher<P> {
    pub fn new(device: Rc<Device<P>>) -> Self {
        Self {
            device,
            state: Cell::new(DispatchState::Idle),
            stats: Cell::new(DispatchStats::default()),
        }
    }

    pub fn device(&self) -> &Rc<Device<P>> {
        &self.device
    }

    pub fn state(&self) -> DispatchState {
        self.state.get()
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats.get()
    }

    /// Read frames until the stream ends.
    ///
    /// # Errors
    /// A read error or a handler error ends the loop; both are fatal.
    pub async fn run<R>(&self, mut frames: FramedRead<R, AuxCodec>) -> Result<()>
    where
        R: AsyncRead + Unpin,
    {
        while let Some(frame) = frames.next().await {
            self.dispatch(&frame?).await?;
        }
        info!(stats = ?self.stats(), "uart stream closed");
        Ok(())
    }

    /// Decode one host frame and run its handler.
    ///
    /// # Errors
    /// Returns the handler's error. Discarded frames and unknown commands
    /// are not errors.
    pub async fn dispatch(&self, bytes: &[u8]) -> Result<Dispatched> {
        let outcome = match Frame::decode(bytes) {
            Err(discard) => {
                trace!(?discard, len = bytes.len(), "frame discarded");
                Dispatched::Discarded(discard)
            }
            Ok(frame) => match InboundCommand::parse(&frame)? {
                None => {
                    debug!(command = frame.command(), "unknown or uninteresting command");
                    Dispatched::Ignored
                }
                Some(command) => {
                    debug!(?command, "dispatch");
                    self.state.set(DispatchState::Handling);
                    let handled = self.handle(command).await;
                    self.state.set(DispatchState::Idle);
                    handled?
                }
            },
        };

        let mut stats = self.stats.get();
        stats.record(&outcome);
        self.stats.set(stats);
        Ok(outcome)
    }

    async fn handle(&self, command: InboundCommand) -> Result<Dispatched> {
        let device = &self.device;
        let code = command.code();
        let temperature = command.battery_temperature();

        match command {
            InboundCommand::BleStatus(status) => device.on_ble_status(status).await?,
            InboundCommand::PairingCode(pairing_code) => {
                let task = Rc::clone(device);
                device.spawn_detached("pairing code", async move {
                    task.on_pairing_code(pairing_code).await
                });
                return Ok(Dispatched::Spawned(code));
            }
            InboundCommand::PairingResult(outcome) => device.on_pairing_result(outcome)?,
            InboundCommand::ChargingStatus {
                status,
                charge_type,
            } => device.on_charging_status(status, charge_type)?,
            InboundCommand::BatteryLevel(capacity) => device.on_battery_level(capacity),
            InboundCommand::Button(event) => device.on_button(event).await?,
            InboundCommand::BatteryInfo { .. } => device.on_battery_info(temperature)?,
            InboundCommand::LedBrightness { flag, brightness } => {
                trace!(flag, brightness, "flashlight brightness");
                self.observe(FactValue::FlashlightBrightness(brightness));
            }
            InboundCommand::BleName(name) => self.observe(FactValue::BleName(name)),
            InboundCommand::BleVersion(version) => self.observe(FactValue::BleVersion(version)),
            InboundCommand::BleBuildId(id) => self.observe(FactValue::BleBuildId(id)),
            InboundCommand::BleHash(hash) => self.observe(FactValue::BleHash(hash)),
            InboundCommand::BleMac(mac) => self.observe(FactValue::BleMac(mac)),
        }
        Ok(Dispatched::Handled(code))
    }

    fn observe(&self, value: FactValue) {
        self.device.update(|state| state.status.observe(value));
    }
}
