//! Long-lived tasks and the fail-stop policy.
//!
//! The supervisor owns every long-lived task of the device on the current
//! `LocalSet`:
//!
//! ```text
//!              ┌──────────────┐
//!  UART rx ───►│  dispatcher  │──┐
//!              └──────────────┘  │          ┌───────────────┐
//!              ┌──────────────┐  ├─ queue ─►│ control writer│───► UART tx
//!              │ initial fetch│──┤          └───────────────┘
//!              ├──────────────┤  │
//!              │ ble refresh  │──┘
//!              ├──────────────┤
//!              │ fingerprint  │
//!              ├──────────────┤
//!              │ usb          │
//!              └──────────────┘
//! ```
//!
//! The first task that fails, or the first fault reported by a detached
//! task, clears the whole scheduler: every task is aborted and
//! [`Supervisor::run`] returns [`Error::SchedulerCleared`]. Restarting is the
//! caller's business. A clean end of the UART stream stops the device
//! without a fault. Either way, detached pairing tasks do not outlive
//! [`Supervisor::run`].

use std::rc::Rc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task::{JoinError, JoinSet};
use tokio_util::codec::FramedRead;
use tracing::{debug, info, warn};

use auxlink_core::{DeviceConfig, Error, Result};
use auxlink_hardware::Platform;
use auxlink_protocol::AuxCodec;

use crate::control::ControlReceiver;
use crate::device::Device;
use crate::dispatcher::Dispatcher;

const DISPATCHER: &str = "dispatcher";
const CONTROL_WRITER: &str = "control writer";
const INITIAL_FETCH: &str = "initial fetch";
const BLE_REFRESH: &str = "ble refresh";
const FINGERPRINT: &str = "fingerprint";
const USB: &str = "usb";

type TaskResult = (&'static str, Result<()>);

/// How a supervised task ended.
#[derive(Debug)]
enum TaskTermination {
    Success(&'static str),
    Error(&'static str, Error),
    Cancelled,
    Panic(String),
}

pub struct Supervisor<P: Platform> {
    device: Rc<Device<P>>,
    control: ControlReceiver,
}

impl<P: Platform> Supervisor<P> {
    pub fn new(platform: P, config: DeviceConfig) -> Self {
        let (device, control) = Device::new(platform, config);
        Self {
            device: Rc::new(device),
            control,
        }
    }

    pub fn device(&self) -> &Rc<Device<P>> {
        &self.device
    }

    /// Run every long-lived task until the UART stream ends or a fault
    /// clears the scheduler.
    ///
    /// Must be called inside a [`tokio::task::LocalSet`].
    ///
    /// # Errors
    /// Returns [`Error::SchedulerCleared`] with the first fault.
    pub async fn run<R, W>(self, uart_rx: R, uart_tx: W) -> Result<()>
    where
        R: AsyncRead + Unpin + 'static,
        W: AsyncWrite + Unpin + 'static,
    {
        let Self { device, control } = self;
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        let frames = FramedRead::new(uart_rx, AuxCodec::from_config(device.config()));
        let dispatcher = Dispatcher::new(Rc::clone(&device));
        tasks.spawn_local(async move { (DISPATCHER, dispatcher.run(frames).await) });
        let codec = AuxCodec::from_config(device.config());
        tasks.spawn_local(async move { (CONTROL_WRITER, control.run_writer(uart_tx, codec).await) });

        let task = Rc::clone(&device);
        tasks.spawn_local(async move { (INITIAL_FETCH, task.fetch_all().await) });
        let task = Rc::clone(&device);
        tasks.spawn_local(async move { (BLE_REFRESH, task.run_ble_refresh().await) });
        let task = Rc::clone(&device);
        tasks.spawn_local(async move { (FINGERPRINT, task.run_fingerprint_loop().await) });
        let task = Rc::clone(&device);
        tasks.spawn_local(async move { (USB, task.run_usb_loop().await) });
        info!(tasks = tasks.len(), "device started");

        let fault = device.fault_token();
        loop {
            let joined = tokio::select! {
                _ = fault.cancelled() => break,
                joined = tasks.join_next() => joined,
            };
            let Some(joined) = joined else { break };

            match classify_task_result(joined) {
                TaskTermination::Success(DISPATCHER) => {
                    info!("uart closed, stopping device");
                    break;
                }
                TaskTermination::Success(name) => debug!(task = name, "task finished"),
                TaskTermination::Error(name, fault) => {
                    device.report_fault(name, &fault);
                    break;
                }
                TaskTermination::Panic(message) => {
                    device.report_fault("task", &Error::Collaborator(message));
                    break;
                }
                TaskTermination::Cancelled => {}
            }
        }

        tasks.abort_all();
        while let Some(joined) = tasks.join_next().await {
            if let TaskTermination::Panic(message) = classify_task_result(joined) {
                warn!(%message, "task panicked during shutdown");
            }
        }
        device.shutdown_detached().await;

        match device.fault() {
            Some(fault) => Err(Error::SchedulerCleared(fault)),
            None => Ok(()),
        }
    }
}

fn classify_task_result(result: std::result::Result<TaskResult, JoinError>) -> TaskTermination {
    match result {
        Ok((name, Ok(()))) => TaskTermination::Success(name),
        Ok((name, Err(error))) => TaskTermination::Error(name, error),
        Err(error) if error.is_cancelled() => TaskTermination::Cancelled,
        Err(error) => TaskTermination::Panic(error.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auxlink_hardware::mock::{MockBoard, MockPlatform};
    use tokio::task::LocalSet;

    #[test]
    fn test_classify_task_result() {
        assert!(matches!(
            classify_task_result(Ok((USB, Ok(())))),
            TaskTermination::Success(USB)
        ));
        assert!(matches!(
            classify_task_result(Ok((USB, Err(Error::ChannelClosed("usb"))))),
            TaskTermination::Error(USB, Error::ChannelClosed("usb"))
        ));
    }

    #[tokio::test]
    async fn test_clean_eof_stops_without_fault() {
        let (platform, _handle) = MockPlatform::with_board(MockBoard::new());
        let supervisor = Supervisor::new(platform, DeviceConfig::default());
        let device = Rc::clone(supervisor.device());

        let uart_rx: &'static [u8] = &[0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B, 0xBE];
        let result = LocalSet::new()
            .run_until(supervisor.run(uart_rx, tokio::io::sink()))
            .await;

        assert!(result.is_ok());
        assert!(!device.is_faulted());
        assert_eq!(device.state().status.battery_capacity(), Some(75));
    }

    #[tokio::test]
    async fn test_clean_eof_drops_waiting_pairing_dialog() {
        let (platform, _handle) = MockPlatform::with_board(MockBoard::provisioned());
        let supervisor = Supervisor::new(platform, DeviceConfig::default());
        let device = Rc::clone(supervisor.device());

        // Pairing code "482913", never answered.
        let uart_rx: &'static [u8] = &[
            0xA5, 0x5A, 0x00, 0x08, 0x03, 0x34, 0x38, 0x32, 0x39, 0x31, 0x33, 0xF1,
        ];
        let result = LocalSet::new()
            .run_until(supervisor.run(uart_rx, tokio::io::sink()))
            .await;

        assert!(result.is_ok());
        assert_eq!(device.detached_tasks(), 0);
        assert_eq!(Rc::strong_count(&device), 1);
    }
}
