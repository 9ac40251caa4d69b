//! Shared vocabulary of the auxiliary-chip core: the error type, wire
//! constants, runtime configuration and the domain enums every crate uses.

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::{ChecksumMode, DeviceConfig};
pub use error::{Error, Result};
pub use types::*;
