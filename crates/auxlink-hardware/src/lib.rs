//! Collaborator boundary of the auxiliary-chip core.
//!
//! The core never draws a screen, touches persisted settings or drives the
//! fingerprint sensor itself. It talks to the rest of the device through the
//! traits in [`traits`]:
//!
//! - [`UiCollaborator`]: dialogs and status-bar icons.
//! - [`Board`]: display backlight, vibration motor, persisted settings and
//!   the lock/session layer.
//! - [`FingerprintSensor`]: touch interrupt, presence check and matching.
//! - [`UsbMonitor`]: cable plug and data-link events.
//!
//! A [`Platform`] bundles one implementation of each. [`mock::MockPlatform`]
//! records every request for tests and for the replay tool.
//!
//! ```
//! use auxlink_hardware::mock::{MockPlatform, UiEvent};
//! use auxlink_hardware::{Platform, UiCollaborator};
//!
//! let (platform, _handle) = MockPlatform::new();
//! platform.ui().show_usb(true);
//! assert_eq!(platform.ui().events(), vec![UiEvent::Usb(true)]);
//! ```
//!
//! # Threading
//!
//! The core runs on one cooperative scheduler (`tokio::task::LocalSet`), so
//! none of the traits require `Send` or `Sync` and all of them take `&self`.

pub mod error;
pub mod mock;
pub mod traits;
pub mod types;

pub use error::{HardwareError, Result};
pub use traits::{
    Board, DeviceStorage, DisplayControl, FingerprintSensor, Haptics, Platform, SessionControl,
    UiCollaborator, UsbMonitor,
};
pub use types::{FingerId, MatchError, PairingResponse, UnlockError, UsbEvent};
