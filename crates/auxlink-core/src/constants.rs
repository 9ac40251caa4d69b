//! Link-level constants for the auxiliary chip protocol.
//!
//! The auxiliary microcontroller (BLE radio, charger, side button, LED) talks
//! to the host over a UART using a small binary packet format:
//!
//! ```text
//! A5 5A  LEN_HI LEN_LO  CMD  PAYLOAD...  XOR
//! ^^^^^  ^^^^^^^^^^^^^  ^^^  ^^^^^^^^^^  ^^^
//! prefix length (BE)    cmd  LEN - 2     xor of every preceding byte
//! ```
//!
//! The host driver strips the XOR trailer, so the frames handed to the
//! dispatcher are `HEADER_LEN + LEN - 2` bytes long.

use std::time::Duration;

// ============================================================================
// Framing
// ============================================================================

/// Frame prefix, big-endian on the wire (`A5 5A`).
pub const FRAME_PREFIX: u16 = 0xA55A;

/// First byte of the prefix.
pub const PREFIX_HI: u8 = 0xA5;

/// Second byte of the prefix.
pub const PREFIX_LO: u8 = 0x5A;

/// Header length: prefix (2) + length (2) + command (1).
pub const HEADER_LEN: usize = 5;

/// Bytes counted by the length field that are not payload: command + trailer.
pub const LENGTH_OVERHEAD: usize = 2;

/// Wire bytes outside the length field: prefix (2) + length (2).
pub const PACKET_PREAMBLE_LEN: usize = 4;

/// Size of the XOR trailer on the wire.
pub const TRAILER_LEN: usize = 1;

/// Smallest packet the driver accepts (`LEN == 1`, trailer only).
pub const MIN_PACKET_LEN: usize = PACKET_PREAMBLE_LEN + TRAILER_LEN;

/// Largest wire packet the host DMA buffer accepts.
pub const DEFAULT_MAX_PACKET_LEN: usize = 256;

// ============================================================================
// Payload values
// ============================================================================

/// Battery-info `res` value carrying a temperature report.
pub const BATTERY_INFO_TEMPERATURE: u8 = 4;

/// Highest flashlight brightness the chip accepts.
pub const MAX_FLASHLIGHT_BRIGHTNESS: u8 = 50;

/// Brightness used when the flashlight is switched on without a level.
pub const DEFAULT_FLASHLIGHT_BRIGHTNESS: u8 = 15;

/// Highest battery-temperature reading at which wireless charging may engage.
pub const DEFAULT_WIRELESS_CHARGE_MAX_TEMPERATURE: u16 = 38;

/// Consecutive fingerprint mismatches before the device locks.
pub const DEFAULT_MAX_FINGERPRINT_ATTEMPTS: u32 = 5;

// ============================================================================
// Timing
// ============================================================================

/// Interval of the background refresh of still-unknown BLE facts.
pub const DEFAULT_BLE_REFRESH_INTERVAL: Duration = Duration::from_millis(500);

/// Back-off of the fingerprint loop when a guard applies or no touch was seen.
pub const DEFAULT_FINGERPRINT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Debounce between two presence checks of a touch.
pub const DEFAULT_FINGERPRINT_SETTLE: Duration = Duration::from_millis(100);

/// Cooldown after a failed match before the sensor is read again.
pub const DEFAULT_FINGERPRINT_FAILURE_COOLDOWN: Duration = Duration::from_millis(500);

/// Upper bound on waiting for the safe-reloop acknowledgement when locking.
pub const DEFAULT_SAFE_RELOOP_TIMEOUT: Duration = Duration::from_millis(200);

/// Pause before the idle loop resumes after a button lock.
pub const DEFAULT_LOCK_RESUME_DELAY: Duration = Duration::from_millis(300);

/// Pause after raising the power-off prompt.
pub const DEFAULT_POWER_OFF_RESUME_DELAY: Duration = Duration::from_millis(200);

/// How long the display stays on after a BLE central connects.
pub const DEFAULT_BLE_CONNECTED_WAKE: Duration = Duration::from_secs(120);

/// How long a displayed pairing code waits for the user.
pub const DEFAULT_PAIRING_RESPONSE_TIMEOUT: Duration = Duration::from_secs(120);

/// Period of the initial-fetch wait for the display to come on.
pub const INITIAL_FETCH_POLL_INTERVAL: Duration = Duration::from_millis(100);
