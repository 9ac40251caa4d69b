//! Fingerprint authentication.
//!
//! One authentication round waits for a touch, debounces it and tries to
//! match. A failed match is recovered locally and reported with a
//! [`WarningLevel`]; only sensor driver errors escape, and those are fatal.

use tokio::time;
use tracing::{debug, info, trace, warn};

use auxlink_core::{Error, HapticPattern, Result, WarningLevel};
use auxlink_hardware::{
    DeviceStorage, DisplayControl, FingerId, FingerprintSensor, Haptics, MatchError, Platform,
    SessionControl, UiCollaborator,
};

use crate::device::Device;

/// Why a round ended without looking at the sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guard {
    ButtonHeld,
    Collecting,
    DisplayOff,
    Unavailable,
    AlreadyUnlocked,
}

/// Outcome of one authentication round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Round {
    Guarded(Guard),
    Matched(FingerId),
}

/// Map a failed match to the severity shown to the user.
///
/// `failed_count` is the persisted counter after this attempt and only
/// matters for [`MatchError::NoMatch`].
pub fn warning_level(error: &MatchError, failed_count: u32, max_attempts: u32) -> WarningLevel {
    match error {
        MatchError::FeatureExtraction => WarningLevel::ExtractionFailed,
        MatchError::NoFinger | MatchError::ImageCapture => WarningLevel::PoorContact,
        MatchError::NoMatch if failed_count >= max_attempts => WarningLevel::Exhausted,
        MatchError::NoMatch => WarningLevel::Mismatch,
        MatchError::Other(_) => WarningLevel::Unclassified,
    }
}

impl<P: Platform> Device<P> {
    /// Poll for fingerprint unlocks until the device faults.
    pub async fn run_fingerprint_loop(&self) -> Result<()> {
        loop {
            match self.authenticate().await? {
                Round::Guarded(guard) => trace!(?guard, "fingerprint round skipped"),
                Round::Matched(finger) => debug!(%finger, "fingerprint round complete"),
            }
            time::sleep(self.config().fingerprint_poll_interval()).await;
        }
    }

    /// Run one authentication round.
    pub async fn authenticate(&self) -> Result<Round> {
        let sensor = self.platform().sensor();
        let board = self.platform().board();

        loop {
            if let Some(guard) = self.fingerprint_guard() {
                return Ok(Round::Guarded(guard));
            }
            if !sensor.enter_sleep()? {
                time::sleep(self.config().fingerprint_poll_interval()).await;
                continue;
            }
            sensor.wait_touch().await?;
            if board.fingerprint_unlocked() {
                return Ok(Round::Guarded(Guard::AlreadyUnlocked));
            }

            // One error haptic per physical touch.
            let mut vibrate = true;
            loop {
                if !sensor.detect()? {
                    time::sleep(self.config().fingerprint_poll_interval()).await;
                    break;
                }
                time::sleep(self.config().fingerprint_settle()).await;
                if !sensor.detect()? {
                    continue;
                }

                match self.match_enrolled() {
                    Ok(finger) => {
                        self.on_fingerprint_match(finger).await?;
                        return Ok(Round::Matched(finger));
                    }
                    Err(error) => {
                        self.on_fingerprint_mismatch(&error, std::mem::take(&mut vibrate));
                        time::sleep(self.config().fingerprint_failure_cooldown()).await;
                    }
                }
            }
        }
    }

    fn fingerprint_guard(&self) -> Option<Guard> {
        let board = self.platform().board();
        if self.state().button.is_pressing() {
            Some(Guard::ButtonHeld)
        } else if board.is_collecting_fingerprint() {
            Some(Guard::Collecting)
        } else if !board.is_display_on() {
            Some(Guard::DisplayOff)
        } else if !board.fingerprint_available() {
            Some(Guard::Unavailable)
        } else if board.fingerprint_unlocked() {
            Some(Guard::AlreadyUnlocked)
        } else {
            None
        }
    }

    fn match_enrolled(&self) -> std::result::Result<FingerId, MatchError> {
        let sensor = self.platform().sensor();
        let finger = sensor.match_finger()?;
        if !sensor.is_enrolled(finger) {
            return Err(MatchError::Other(format!("{finger} is not enrolled")));
        }
        Ok(finger)
    }

    async fn on_fingerprint_match(&self, finger: FingerId) -> Result<()> {
        let board = self.platform().board();
        info!(%finger, "fingerprint matched");

        if board.is_passphrase_pin_enabled() {
            board.set_passphrase_pin_enabled(false);
        }
        if board.has_match_waiters() {
            board.signal_match();
            return Ok(());
        }

        let unlocked = board.fingerprint_unlock();
        debug!(unlocked, "fingerprint unlock");
        board
            .unlock_device()
            .await
            .map_err(|e| Error::Collaborator(format!("unlock after fingerprint match: {e}")))
    }

    fn on_fingerprint_mismatch(&self, error: &MatchError, vibrate: bool) {
        let board = self.platform().board();
        let ui = self.platform().ui();
        let max_attempts = self.config().max_fingerprint_attempts;

        let failed_count = match error {
            MatchError::NoMatch => board.increment_fingerprint_failed_count(),
            _ => board.fingerprint_failed_count(),
        };
        let level = warning_level(error, failed_count, max_attempts);
        warn!(%error, failed_count, level = level.as_u8(), "fingerprint mismatch");

        if matches!(error, MatchError::NoMatch) && failed_count >= max_attempts {
            ui.refresh_pin_fingerprint_prompt();
            if board.is_unlocked() {
                board.lock();
            }
        }
        ui.show_fingerprint_failure(level);
        if vibrate {
            board.vibrate(HapticPattern::Error);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auxlink_core::DeviceConfig;
    use auxlink_hardware::UnlockError;
    use auxlink_hardware::mock::{
        BoardEvent, MockBoard, MockPlatform, MockPlatformHandle, UiEvent,
    };
    use rstest::rstest;
    use std::rc::Rc;
    use std::time::Duration;
    use tokio::task::LocalSet;

    use crate::control::ControlReceiver;

    fn ready_board() -> MockBoard {
        let board = MockBoard::provisioned();
        board.set_fingerprint_available(true);
        board
    }

    fn device(board: MockBoard) -> (Rc<Device<MockPlatform>>, ControlReceiver, MockPlatformHandle) {
        let (platform, handle) = MockPlatform::with_board(board);
        let (device, rx) = Device::new(platform, DeviceConfig::default());
        (Rc::new(device), rx, handle)
    }

    #[rstest]
    #[case(MatchError::FeatureExtraction, 0, WarningLevel::ExtractionFailed)]
    #[case(MatchError::NoFinger, 0, WarningLevel::PoorContact)]
    #[case(MatchError::ImageCapture, 9, WarningLevel::PoorContact)]
    #[case(MatchError::NoMatch, 4, WarningLevel::Mismatch)]
    #[case(MatchError::NoMatch, 5, WarningLevel::Exhausted)]
    #[case(MatchError::NoMatch, 7, WarningLevel::Exhausted)]
    #[case(MatchError::Other("bus".into()), 0, WarningLevel::Unclassified)]
    fn test_warning_level(
        #[case] error: MatchError,
        #[case] failed_count: u32,
        #[case] expected: WarningLevel,
    ) {
        assert_eq!(warning_level(&error, failed_count, 5), expected);
    }

    #[rstest]
    #[case::display_off({ let b = ready_board(); b.set_display_on(false); b }, Guard::DisplayOff)]
    #[case::unavailable(MockBoard::provisioned(), Guard::Unavailable)]
    #[case::collecting({ let b = ready_board(); b.set_collecting_fingerprint(true); b }, Guard::Collecting)]
    #[case::unlocked({ let b = ready_board(); b.set_fingerprint_unlocked(true); b }, Guard::AlreadyUnlocked)]
    #[tokio::test]
    async fn test_guards_exit_round(#[case] board: MockBoard, #[case] guard: Guard) {
        let (device, _rx, _handle) = device(board);
        assert_eq!(device.authenticate().await.unwrap(), Round::Guarded(guard));
        assert_eq!(device.platform().sensor().match_attempts(), 0);
    }

    #[tokio::test]
    async fn test_held_button_exits_round() {
        let (device, _rx, _handle) = device(ready_board());
        device
            .on_button(auxlink_protocol::ButtonEvent::RawPress)
            .await
            .unwrap();
        assert_eq!(
            device.authenticate().await.unwrap(),
            Round::Guarded(Guard::ButtonHeld)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_lockout_after_max_attempts() {
        let (device, _rx, handle) = device(ready_board());
        let sensor = device.platform().sensor();
        for _ in 0..5 {
            sensor.queue_detect([true, true]);
            sensor.queue_match(Err(MatchError::NoMatch));
        }
        handle.sensor.touch().unwrap();

        LocalSet::new()
            .run_until(async {
                let round = tokio::task::spawn_local({
                    let device = Rc::clone(&device);
                    async move { device.authenticate().await }
                });
                time::sleep(Duration::from_secs(10)).await;
                assert!(!round.is_finished());
                round.abort();
            })
            .await;

        let mut expected = vec![UiEvent::FingerprintFailure(WarningLevel::Mismatch); 4];
        expected.push(UiEvent::PinPromptRefreshed);
        expected.push(UiEvent::FingerprintFailure(WarningLevel::Exhausted));
        assert_eq!(device.platform().ui().events(), expected);

        let board = device.platform().board();
        assert_eq!(board.fingerprint_failed_count(), 5);
        assert_eq!(board.vibrations(HapticPattern::Error), 1);
        assert!(board.events().contains(&BoardEvent::Lock));
        assert!(!board.is_unlocked());
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_unlocks_device() {
        let board = ready_board();
        board.set_unlocked(false);
        board.set_passphrase_pin_enabled(true);
        board.clear_events();
        let (device, _rx, handle) = device(board);
        let sensor = device.platform().sensor();
        sensor.enroll(FingerId(2));
        sensor.queue_detect([true, true]);
        sensor.queue_match(Ok(FingerId(2)));
        handle.sensor.touch().unwrap();

        let round = device.authenticate().await.unwrap();
        assert_eq!(round, Round::Matched(FingerId(2)));
        assert_eq!(
            device.platform().board().events(),
            vec![
                BoardEvent::SetPassphrasePin(false),
                BoardEvent::FingerprintUnlock,
                BoardEvent::UnlockPrompt,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_match_with_waiters_only_signals() {
        let board = ready_board();
        board.set_match_waiters(true);
        let (device, _rx, handle) = device(board);
        let sensor = device.platform().sensor();
        sensor.enroll(FingerId(1));
        sensor.queue_detect([true, true]);
        sensor.queue_match(Ok(FingerId(1)));
        handle.sensor.touch().unwrap();

        device.authenticate().await.unwrap();
        assert_eq!(
            device.platform().board().events(),
            vec![BoardEvent::SignalMatch]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_unenrolled_finger_is_unclassified() {
        let (device, _rx, handle) = device(ready_board());
        let sensor = device.platform().sensor();
        sensor.queue_detect([true, true]);
        sensor.queue_match(Ok(FingerId(9)));
        handle.sensor.touch().unwrap();

        LocalSet::new()
            .run_until(async {
                let round = tokio::task::spawn_local({
                    let device = Rc::clone(&device);
                    async move { device.authenticate().await }
                });
                time::sleep(Duration::from_secs(2)).await;
                round.abort();
            })
            .await;

        assert_eq!(
            device.platform().ui().events(),
            vec![UiEvent::FingerprintFailure(WarningLevel::Unclassified)]
        );
        assert_eq!(device.platform().board().fingerprint_failed_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_interactive_unlock_is_fatal() {
        let board = ready_board();
        board.set_unlocked(false);
        board.queue_unlock_result(Err(UnlockError::Failed("prompt crashed".into())));
        let (device, _rx, handle) = device(board);
        let sensor = device.platform().sensor();
        sensor.enroll(FingerId(1));
        sensor.queue_detect([true, true]);
        sensor.queue_match(Ok(FingerId(1)));
        handle.sensor.touch().unwrap();

        let error = device.authenticate().await.unwrap_err();
        assert!(matches!(error, Error::Collaborator(_)));
    }

    #[tokio::test]
    async fn test_sensor_fault_escapes() {
        let (device, _rx, _handle) = device(ready_board());
        device.platform().sensor().set_fault("i2c timeout");
        assert!(device.authenticate().await.is_err());
    }
}
