//! Collaborator trait definitions.
//!
//! These traits are the boundary between the companion-chip core and the
//! rest of the device: screens and status icons, the display backlight, the
//! vibration motor, persisted settings, the session/lock layer, the
//! fingerprint sensor and the USB port monitor.
//!
//! All traits use native `async fn` methods. The core runs on a single
//! cooperative scheduler, so implementations are neither required to be
//! `Send` nor `Sync`, and every method takes `&self`: implementations use
//! interior mutability where they keep state.

#![allow(async_fn_in_trait)]

use std::time::Duration;

use auxlink_core::{BleIcon, HapticPattern, WarningLevel};

use crate::error::Result;
use crate::types::{FingerId, MatchError, PairingResponse, UnlockError, UsbEvent};

/// Screens, dialogs and status-bar icons.
pub trait UiCollaborator {
    /// Redraw the battery gauge.
    fn set_battery(&self, capacity: u8, charging: bool);

    fn show_charging(&self, on: bool);

    fn show_usb(&self, on: bool);

    fn show_ble(&self, icon: BleIcon);

    /// Display a pairing code and wait for the user's answer.
    ///
    /// The caller drops the future to close the dialog without an answer.
    async fn confirm_pairing_code(&self, code: &str) -> PairingResponse;

    /// Destroy the pairing-code dialog if one is shown.
    fn dismiss_pairing_code(&self);

    /// Show the pairing-failed dialog and wait until the user closes it.
    async fn show_pairing_failure(&self);

    async fn show_pairing_success(&self);

    /// Pairing is refused on a device that is not set up yet.
    fn show_pairing_forbidden(&self);

    /// Mismatch animation plus the tip matching `level` on the lock screen.
    fn show_fingerprint_failure(&self, level: WarningLevel);

    /// Refresh the fingerprint hint of a visible PIN prompt.
    fn refresh_pin_fingerprint_prompt(&self);

    /// Nudge the enrolment screen to show its placement tips.
    ///
    /// Returns `false` when no enrolment screen is shown.
    fn prompt_fingerprint_tips(&self) -> bool;

    /// Close every workflow except the current one.
    fn dismiss_others(&self);

    /// Raise the power-off confirmation. `allow_shutdown` preselects shutdown.
    fn show_power_off(&self, allow_shutdown: bool);

    fn show_home(&self);
}

/// Display backlight and related timers.
pub trait DisplayControl {
    fn is_display_on(&self) -> bool;

    fn display_off(&self);

    /// Turn the display on if it is off.
    fn wake_display(&self);

    /// Turn the display on and keep it on for at least `duration`.
    fn wake_display_for(&self, duration: Duration);

    /// Arm the regular screen-off timer.
    fn schedule_screen_off(&self);

    /// Restore the backlight level after a modal prompt.
    fn lcd_resume(&self);

    /// Ask the idle loop to sleep once the current workflow is cancelled.
    fn arm_sleep_after_cancel(&self);

    fn clear_sleep_after_cancel(&self);

    /// Release the camera, which shares resources with pairing and the flashlight.
    fn close_camera(&self);
}

pub trait Haptics {
    fn vibrate(&self, pattern: HapticPattern);
}

/// Persisted settings.
pub trait DeviceStorage {
    /// Whether the device has been set up (seed present).
    fn is_provisioned(&self) -> bool;

    fn fingerprint_failed_count(&self) -> u32;

    /// Increment the persisted mismatch counter and return the new value.
    fn increment_fingerprint_failed_count(&self) -> u32;

    fn is_passphrase_pin_enabled(&self) -> bool;

    fn set_passphrase_pin_enabled(&self, enabled: bool);

    fn set_ble_enabled(&self, enabled: bool);

    fn is_usb_lock_enabled(&self) -> bool;

    /// Re-read cached settings after an external change.
    fn reload_settings(&self);
}

/// Lock state, secure session and the host's main loop.
pub trait SessionControl {
    /// First-time setup is running.
    fn is_setup_in_progress(&self) -> bool;

    /// A host wire transaction is in progress.
    fn is_wire_busy(&self) -> bool;

    fn has_pin(&self) -> bool;

    fn is_unlocked(&self) -> bool;

    /// Lock with the PIN.
    fn lock(&self);

    /// Close the secure-element session.
    fn clear_secure_session(&self);

    fn fingerprint_available(&self) -> bool;

    fn fingerprint_unlocked(&self) -> bool;

    fn lock_fingerprint(&self);

    /// Unlock the fingerprint factor after a successful match.
    fn fingerprint_unlock(&self) -> bool;

    /// Some caller waits for a match signal instead of an unlock.
    fn has_match_waiters(&self) -> bool;

    fn signal_match(&self);

    /// The enrolment flow currently owns the sensor.
    fn is_collecting_fingerprint(&self) -> bool;

    /// Run the interactive unlock flow.
    async fn unlock_device(&self) -> std::result::Result<(), UnlockError>;

    /// Wait for the wire layer to acknowledge a main-loop restart.
    async fn signal_ack(&self);

    /// Reset the home screen state machine before a reloop.
    fn reset_home_state(&self);

    /// Spawn a fresh idle loop.
    fn restart_idle_loop(&self);

    fn is_usb_enabled(&self) -> bool;

    /// Forward a USB data-link toggle to the USB stack.
    fn connect_usb(&self, enable: bool);
}

/// Fingerprint sensor driver.
pub trait FingerprintSensor {
    /// Put the sensor into touch-wait mode. `false` means not ready yet.
    fn enter_sleep(&self) -> Result<bool>;

    /// Wait for the touch interrupt.
    async fn wait_touch(&self) -> Result<()>;

    /// Whether a finger is on the sensor right now.
    fn detect(&self) -> Result<bool>;

    /// Capture and match against enrolled templates.
    fn match_finger(&self) -> std::result::Result<FingerId, MatchError>;

    fn is_enrolled(&self, id: FingerId) -> bool;
}

/// USB plug and data-link events.
pub trait UsbMonitor {
    async fn next_event(&self) -> Result<UsbEvent>;
}

/// Everything the board provides besides the UI, sensor and USB monitor.
pub trait Board: DisplayControl + Haptics + DeviceStorage + SessionControl {}

impl<T: DisplayControl + Haptics + DeviceStorage + SessionControl> Board for T {}

/// Bundle of collaborators the core is built against.
///
/// # Examples
///
/// ```
/// use auxlink_hardware::mock::MockPlatform;
/// use auxlink_hardware::traits::{DisplayControl, Platform};
///
/// let (platform, _handle) = MockPlatform::new();
/// platform.board().wake_display();
/// assert!(platform.board().is_display_on());
/// ```
pub trait Platform: 'static {
    type Ui: UiCollaborator;
    type Board: Board;
    type Sensor: FingerprintSensor;
    type Usb: UsbMonitor;

    fn ui(&self) -> &Self::Ui;

    fn board(&self) -> &Self::Board;

    fn sensor(&self) -> &Self::Sensor;

    fn usb(&self) -> &Self::Usb;
}
