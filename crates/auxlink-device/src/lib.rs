//! Host-side state machines for the auxiliary chip link.
//!
//! A [`Device`] holds the status cache and the state of the pairing,
//! charging, button and fingerprint flows. The [`Dispatcher`] feeds it one
//! frame at a time and the [`Supervisor`] runs it together with the
//! long-lived loops on a single `LocalSet`.
//!
//! # Example
//!
//! ```
//! use std::rc::Rc;
//!
//! use auxlink_core::DeviceConfig;
//! use auxlink_device::{Device, Dispatcher};
//! use auxlink_hardware::mock::MockPlatform;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> auxlink_core::Result<()> {
//! let (platform, _handle) = MockPlatform::new();
//! let (device, _control) = Device::new(platform, DeviceConfig::default());
//! let dispatcher = Dispatcher::new(Rc::new(device));
//!
//! // Battery level report: 75%.
//! dispatcher.dispatch(&[0xA5, 0x5A, 0x00, 0x03, 0x09, 0x4B]).await?;
//! assert_eq!(dispatcher.device().snapshot().battery_capacity, Some(75));
//! # Ok(())
//! # }
//! ```

pub mod ble;
pub mod button;
pub mod charging;
pub mod control;
pub mod device;
pub mod dispatcher;
pub mod fingerprint;
pub mod pairing;
pub mod status;
pub mod supervisor;
pub mod usb;

pub use button::ButtonState;
pub use control::{ControlReceiver, ControlSender, control_channel};
pub use device::{Device, DeviceState};
pub use dispatcher::{DispatchState, DispatchStats, Dispatched, Dispatcher};
pub use fingerprint::{Guard, Round, warning_level};
pub use pairing::{Admission, PairingSession};
pub use status::{Fact, FactValue, StatusCache, StatusSnapshot};
pub use supervisor::Supervisor;
