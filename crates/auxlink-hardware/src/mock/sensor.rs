//! Scripted fingerprint sensor.

use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, VecDeque};

use tokio::sync::{Mutex, mpsc};

use crate::traits::FingerprintSensor;
use crate::types::{FingerId, MatchError};
use crate::{HardwareError, Result};

/// Fingerprint sensor driven by queued results.
///
/// Touches arrive through [`MockSensorHandle::touch`]. Presence checks and
/// match attempts pop from their queues; an empty presence queue reads as
/// "no finger" and an empty match queue as [`MatchError::NoFinger`].
#[derive(Debug)]
pub struct MockSensor {
    touches: Mutex<mpsc::UnboundedReceiver<()>>,
    detections: RefCell<VecDeque<bool>>,
    matches: RefCell<VecDeque<std::result::Result<FingerId, MatchError>>>,
    sleep_ready: RefCell<VecDeque<bool>>,
    fault: RefCell<Option<String>>,
    enrolled: RefCell<BTreeSet<FingerId>>,
    match_attempts: Cell<u32>,
}

impl MockSensor {
    pub fn new() -> (Self, MockSensorHandle) {
        let (touch_tx, touch_rx) = mpsc::unbounded_channel();
        let sensor = Self {
            touches: Mutex::new(touch_rx),
            detections: RefCell::new(VecDeque::new()),
            matches: RefCell::new(VecDeque::new()),
            sleep_ready: RefCell::new(VecDeque::new()),
            fault: RefCell::new(None),
            enrolled: RefCell::new(BTreeSet::new()),
            match_attempts: Cell::new(0),
        };
        (sensor, MockSensorHandle { touch_tx })
    }

    /// Queue the outcome of the next presence checks.
    pub fn queue_detect(&self, present: impl IntoIterator<Item = bool>) {
        self.detections.borrow_mut().extend(present);
    }

    pub fn queue_match(&self, result: std::result::Result<FingerId, MatchError>) {
        self.matches.borrow_mut().push_back(result);
    }

    /// Queue the readiness reported by the next `enter_sleep` calls.
    pub fn queue_sleep_ready(&self, ready: bool) {
        self.sleep_ready.borrow_mut().push_back(ready);
    }

    /// Make every following driver call fail.
    pub fn set_fault(&self, message: impl Into<String>) {
        *self.fault.borrow_mut() = Some(message.into());
    }

    pub fn enroll(&self, id: FingerId) {
        self.enrolled.borrow_mut().insert(id);
    }

    pub fn match_attempts(&self) -> u32 {
        self.match_attempts.get()
    }

    fn check_fault(&self) -> Result<()> {
        match self.fault.borrow().as_ref() {
            Some(message) => Err(HardwareError::sensor_fault(message.clone())),
            None => Ok(()),
        }
    }
}

impl FingerprintSensor for MockSensor {
    fn enter_sleep(&self) -> Result<bool> {
        self.check_fault()?;
        Ok(self.sleep_ready.borrow_mut().pop_front().unwrap_or(true))
    }

    async fn wait_touch(&self) -> Result<()> {
        self.check_fault()?;
        let mut touches = self.touches.lock().await;
        touches
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("fingerprint sensor"))
    }

    fn detect(&self) -> Result<bool> {
        self.check_fault()?;
        Ok(self.detections.borrow_mut().pop_front().unwrap_or(false))
    }

    fn match_finger(&self) -> std::result::Result<FingerId, MatchError> {
        self.match_attempts.set(self.match_attempts.get() + 1);
        self.matches
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(MatchError::NoFinger))
    }

    fn is_enrolled(&self, id: FingerId) -> bool {
        self.enrolled.borrow().contains(&id)
    }
}

/// Puts fingers on a [`MockSensor`].
#[derive(Debug, Clone)]
pub struct MockSensorHandle {
    touch_tx: mpsc::UnboundedSender<()>,
}

impl MockSensorHandle {
    /// Fire the touch interrupt once.
    pub fn touch(&self) -> Result<()> {
        self.touch_tx
            .send(())
            .map_err(|_| HardwareError::disconnected("fingerprint sensor"))
    }
}
