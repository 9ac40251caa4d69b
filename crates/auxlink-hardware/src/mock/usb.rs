//! USB port monitor fed from a channel.

use tokio::sync::{Mutex, mpsc};

use crate::traits::UsbMonitor;
use crate::types::UsbEvent;
use crate::{HardwareError, Result};

#[derive(Debug)]
pub struct MockUsb {
    events: Mutex<mpsc::UnboundedReceiver<UsbEvent>>,
}

impl MockUsb {
    pub fn new() -> (Self, MockUsbHandle) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Self {
                events: Mutex::new(event_rx),
            },
            MockUsbHandle { event_tx },
        )
    }
}

impl UsbMonitor for MockUsb {
    async fn next_event(&self) -> Result<UsbEvent> {
        let mut events = self.events.lock().await;
        events
            .recv()
            .await
            .ok_or_else(|| HardwareError::disconnected("usb monitor"))
    }
}

#[derive(Debug, Clone)]
pub struct MockUsbHandle {
    event_tx: mpsc::UnboundedSender<UsbEvent>,
}

impl MockUsbHandle {
    pub fn send(&self, event: UsbEvent) -> Result<()> {
        self.event_tx
            .send(event)
            .map_err(|_| HardwareError::disconnected("usb monitor"))
    }

    pub fn plug(&self, plugged: bool) -> Result<()> {
        self.send(UsbEvent::Plug(plugged))
    }
}
