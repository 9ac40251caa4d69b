//! Recording board: display, haptics, settings and session in one place.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::time::Duration;

use auxlink_core::HapticPattern;

use crate::traits::{DeviceStorage, DisplayControl, Haptics, SessionControl};
use crate::types::UnlockError;

/// Side effects requested from the board, in call order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEvent {
    DisplayOff,
    WakeDisplay,
    WakeDisplayFor(Duration),
    ScheduleScreenOff,
    LcdResume,
    ArmSleepAfterCancel,
    ClearSleepAfterCancel,
    CloseCamera,
    Vibrate(HapticPattern),
    SetPassphrasePin(bool),
    SetBleEnabled(bool),
    ReloadSettings,
    Lock,
    ClearSecureSession,
    LockFingerprint,
    FingerprintUnlock,
    SignalMatch,
    UnlockPrompt,
    SignalAck,
    ResetHomeState,
    RestartIdleLoop,
    ConnectUsb(bool),
}

/// In-memory board whose flags are set directly by tests.
///
/// Defaults describe a fresh device: display off, not provisioned, no PIN,
/// locked, fingerprint unavailable.
#[derive(Debug, Default)]
pub struct MockBoard {
    events: RefCell<Vec<BoardEvent>>,

    display_on: Cell<bool>,
    provisioned: Cell<bool>,
    setup_in_progress: Cell<bool>,
    wire_busy: Cell<bool>,
    has_pin: Cell<bool>,
    unlocked: Cell<bool>,
    fingerprint_available: Cell<bool>,
    fingerprint_unlocked: Cell<bool>,
    match_waiters: Cell<bool>,
    collecting_fingerprint: Cell<bool>,
    usb_enabled: Cell<bool>,
    usb_lock: Cell<bool>,
    passphrase_pin: Cell<bool>,
    failed_count: Cell<u32>,

    /// `signal_ack` never completes while set.
    ack_blocks: Cell<bool>,
    unlock_results: RefCell<VecDeque<Result<(), UnlockError>>>,
}

impl MockBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provisioned device with a PIN, unlocked and with the display on.
    pub fn provisioned() -> Self {
        let board = Self::default();
        board.display_on.set(true);
        board.provisioned.set(true);
        board.has_pin.set(true);
        board.unlocked.set(true);
        board
    }

    pub fn events(&self) -> Vec<BoardEvent> {
        self.events.borrow().clone()
    }

    pub fn clear_events(&self) {
        self.events.borrow_mut().clear();
    }

    /// How many times `pattern` was played.
    pub fn vibrations(&self, pattern: HapticPattern) -> usize {
        self.events
            .borrow()
            .iter()
            .filter(|event| **event == BoardEvent::Vibrate(pattern))
            .count()
    }

    pub fn set_display_on(&self, on: bool) {
        self.display_on.set(on);
    }

    pub fn set_provisioned(&self, provisioned: bool) {
        self.provisioned.set(provisioned);
    }

    pub fn set_setup_in_progress(&self, in_progress: bool) {
        self.setup_in_progress.set(in_progress);
    }

    pub fn set_wire_busy(&self, busy: bool) {
        self.wire_busy.set(busy);
    }

    pub fn set_has_pin(&self, has_pin: bool) {
        self.has_pin.set(has_pin);
    }

    pub fn set_unlocked(&self, unlocked: bool) {
        self.unlocked.set(unlocked);
    }

    pub fn set_fingerprint_available(&self, available: bool) {
        self.fingerprint_available.set(available);
    }

    pub fn set_fingerprint_unlocked(&self, unlocked: bool) {
        self.fingerprint_unlocked.set(unlocked);
    }

    pub fn set_match_waiters(&self, waiting: bool) {
        self.match_waiters.set(waiting);
    }

    pub fn set_collecting_fingerprint(&self, collecting: bool) {
        self.collecting_fingerprint.set(collecting);
    }

    pub fn set_usb_enabled(&self, enabled: bool) {
        self.usb_enabled.set(enabled);
    }

    pub fn set_usb_lock(&self, enabled: bool) {
        self.usb_lock.set(enabled);
    }

    pub fn set_failed_count(&self, count: u32) {
        self.failed_count.set(count);
    }

    pub fn set_ack_blocks(&self, blocks: bool) {
        self.ack_blocks.set(blocks);
    }

    /// Script the outcome of the next interactive unlock. Unscripted unlocks succeed.
    pub fn queue_unlock_result(&self, result: Result<(), UnlockError>) {
        self.unlock_results.borrow_mut().push_back(result);
    }

    fn record(&self, event: BoardEvent) {
        self.events.borrow_mut().push(event);
    }
}

impl DisplayControl for MockBoard {
    fn is_display_on(&self) -> bool {
        self.display_on.get()
    }

    fn display_off(&self) {
        self.display_on.set(false);
        self.record(BoardEvent::DisplayOff);
    }

    fn wake_display(&self) {
        self.display_on.set(true);
        self.record(BoardEvent::WakeDisplay);
    }

    fn wake_display_for(&self, duration: Duration) {
        self.display_on.set(true);
        self.record(BoardEvent::WakeDisplayFor(duration));
    }

    fn schedule_screen_off(&self) {
        self.record(BoardEvent::ScheduleScreenOff);
    }

    fn lcd_resume(&self) {
        self.record(BoardEvent::LcdResume);
    }

    fn arm_sleep_after_cancel(&self) {
        self.record(BoardEvent::ArmSleepAfterCancel);
    }

    fn clear_sleep_after_cancel(&self) {
        self.record(BoardEvent::ClearSleepAfterCancel);
    }

    fn close_camera(&self) {
        self.record(BoardEvent::CloseCamera);
    }
}

impl Haptics for MockBoard {
    fn vibrate(&self, pattern: HapticPattern) {
        self.record(BoardEvent::Vibrate(pattern));
    }
}

impl DeviceStorage for MockBoard {
    fn is_provisioned(&self) -> bool {
        self.provisioned.get()
    }

    fn fingerprint_failed_count(&self) -> u32 {
        self.failed_count.get()
    }

    fn increment_fingerprint_failed_count(&self) -> u32 {
        let count = self.failed_count.get().saturating_add(1);
        self.failed_count.set(count);
        count
    }

    fn is_passphrase_pin_enabled(&self) -> bool {
        self.passphrase_pin.get()
    }

    fn set_passphrase_pin_enabled(&self, enabled: bool) {
        self.passphrase_pin.set(enabled);
        self.record(BoardEvent::SetPassphrasePin(enabled));
    }

    fn set_ble_enabled(&self, enabled: bool) {
        self.record(BoardEvent::SetBleEnabled(enabled));
    }

    fn is_usb_lock_enabled(&self) -> bool {
        self.usb_lock.get()
    }

    fn reload_settings(&self) {
        self.record(BoardEvent::ReloadSettings);
    }
}

impl SessionControl for MockBoard {
    fn is_setup_in_progress(&self) -> bool {
        self.setup_in_progress.get()
    }

    fn is_wire_busy(&self) -> bool {
        self.wire_busy.get()
    }

    fn has_pin(&self) -> bool {
        self.has_pin.get()
    }

    fn is_unlocked(&self) -> bool {
        self.unlocked.get()
    }

    fn lock(&self) {
        self.unlocked.set(false);
        self.fingerprint_unlocked.set(false);
        self.record(BoardEvent::Lock);
    }

    fn clear_secure_session(&self) {
        self.record(BoardEvent::ClearSecureSession);
    }

    fn fingerprint_available(&self) -> bool {
        self.fingerprint_available.get()
    }

    fn fingerprint_unlocked(&self) -> bool {
        self.fingerprint_unlocked.get()
    }

    fn lock_fingerprint(&self) {
        self.unlocked.set(false);
        self.fingerprint_unlocked.set(false);
        self.record(BoardEvent::LockFingerprint);
    }

    fn fingerprint_unlock(&self) -> bool {
        self.fingerprint_unlocked.set(true);
        self.unlocked.set(true);
        self.record(BoardEvent::FingerprintUnlock);
        true
    }

    fn has_match_waiters(&self) -> bool {
        self.match_waiters.get()
    }

    fn signal_match(&self) {
        self.record(BoardEvent::SignalMatch);
    }

    fn is_collecting_fingerprint(&self) -> bool {
        self.collecting_fingerprint.get()
    }

    async fn unlock_device(&self) -> Result<(), UnlockError> {
        self.record(BoardEvent::UnlockPrompt);
        let result = self.unlock_results.borrow_mut().pop_front().unwrap_or(Ok(()));
        if result.is_ok() {
            self.unlocked.set(true);
        }
        result
    }

    async fn signal_ack(&self) {
        self.record(BoardEvent::SignalAck);
        if self.ack_blocks.get() {
            std::future::pending::<()>().await;
        }
    }

    fn reset_home_state(&self) {
        self.record(BoardEvent::ResetHomeState);
    }

    fn restart_idle_loop(&self) {
        self.record(BoardEvent::RestartIdleLoop);
    }

    fn is_usb_enabled(&self) -> bool {
        self.usb_enabled.get()
    }

    fn connect_usb(&self, enable: bool) {
        self.record(BoardEvent::ConnectUsb(enable));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_count_persists_increments() {
        let board = MockBoard::new();
        assert_eq!(board.increment_fingerprint_failed_count(), 1);
        assert_eq!(board.increment_fingerprint_failed_count(), 2);
        assert_eq!(board.fingerprint_failed_count(), 2);
    }

    #[test]
    fn test_lock_clears_both_factors() {
        let board = MockBoard::provisioned();
        board.fingerprint_unlock();
        board.lock();
        assert!(!board.is_unlocked());
        assert!(!board.fingerprint_unlocked());
    }

    #[tokio::test]
    async fn test_scripted_unlock_failure_keeps_locked() {
        let board = MockBoard::new();
        board.queue_unlock_result(Err(UnlockError::Cancelled));

        assert_eq!(board.unlock_device().await, Err(UnlockError::Cancelled));
        assert!(!board.is_unlocked());

        assert_eq!(board.unlock_device().await, Ok(()));
        assert!(board.is_unlocked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocking_ack_never_completes() {
        let board = MockBoard::new();
        board.set_ack_blocks(true);
        let waited = tokio::time::timeout(Duration::from_secs(1), board.signal_ack()).await;
        assert!(waited.is_err());
        assert_eq!(board.events(), vec![BoardEvent::SignalAck]);
    }
}
