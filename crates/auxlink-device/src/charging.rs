//! Wired and wireless charging.
//!
//! Wireless power transfer only engages once the chip has reported a safe
//! battery temperature:
//!
//! ```text
//! Stopped --start--> Starting --temp <= max--> Charging --stop--> Stopped
//!                      |  ^
//!                 stop v  | start
//!                    Stopping
//! ```
//!
//! Charger pushes are not reliable: the same status can arrive twice or out
//! of order, so every transition that is already satisfied is a no-op.

use tracing::debug;

use auxlink_core::{ChargeWirelessState, Error, HapticPattern, Result};
use auxlink_hardware::{DisplayControl, Haptics, Platform, UiCollaborator};
use auxlink_protocol::{ChargeType, ChargingStatus, ControlCommand};

use crate::device::Device;
use crate::status::FactValue;

impl<P: Platform> Device<P> {
    /// Handle a charging-status report.
    pub fn on_charging_status(&self, status: ChargingStatus, charge_type: ChargeType) -> Result<()> {
        self.update(|state| state.status.observe(FactValue::ChargeType(charge_type)));
        let before = self.state().status.wireless_state();

        let settled = if status.is_charging() {
            self.charging_started(charge_type)?
        } else {
            self.charging_stopped()?
        };

        let after = self.state().status.wireless_state();
        debug!(?status, ?charge_type, %before, %after, "charging status");

        if settled {
            self.platform().board().wake_display();
        }
        Ok(())
    }

    /// Returns `false` when the report changed nothing worth waking for.
    fn charging_started(&self, charge_type: ChargeType) -> Result<bool> {
        let ui = self.platform().ui();
        let board = self.platform().board();

        ui.show_charging(true);
        if let Some(capacity) = self.state().status.battery_icon_capacity() {
            ui.set_battery(capacity, true);
        }

        if charge_type == ChargeType::Wired {
            if self.state().status.is_charging() {
                return Ok(false);
            }
            self.set_wireless_state(ChargeWirelessState::Stopped)?;
            self.ctrl_charge_switch(true)?;
            self.update(|state| state.status.set_charging(true));
            return Ok(true);
        }

        let current = self.state().status.wireless_state();
        match current {
            ChargeWirelessState::Stopped => {
                self.set_wireless_state(ChargeWirelessState::Starting)?;
                self.fetch_battery_temperature()?;
                board.schedule_screen_off();
                Ok(true)
            }
            ChargeWirelessState::Stopping => {
                self.set_wireless_state(ChargeWirelessState::Starting)?;
                if board.is_display_on() {
                    board.schedule_screen_off();
                }
                Ok(false)
            }
            ChargeWirelessState::Starting => {
                board.vibrate(HapticPattern::Medium);
                Ok(false)
            }
            ChargeWirelessState::Charging => Ok(false),
        }
    }

    fn charging_stopped(&self) -> Result<bool> {
        let ui = self.platform().ui();

        self.update(|state| state.status.set_charging(false));
        self.ctrl_charge_switch(false)?;
        ui.show_charging(false);
        ui.show_usb(false);
        if let Some(capacity) = self.state().status.battery_icon_capacity() {
            ui.set_battery(capacity, false);
        }

        let current = self.state().status.wireless_state();
        match current {
            ChargeWirelessState::Charging => {
                self.set_wireless_state(ChargeWirelessState::Stopped)?;
                Ok(true)
            }
            // Spurious stop while ramping up.
            ChargeWirelessState::Starting => {
                self.set_wireless_state(ChargeWirelessState::Stopping)?;
                Ok(false)
            }
            ChargeWirelessState::Stopping => Ok(false),
            ChargeWirelessState::Stopped => Ok(true),
        }
    }

    /// Handle a battery-info report. Only temperature reports (`res == 4`) matter.
    pub fn on_battery_info(&self, temperature: Option<u16>) -> Result<()> {
        let Some(temperature) = temperature else {
            return Ok(());
        };

        let starting = self.state().status.wireless_state() == ChargeWirelessState::Starting;
        if starting && temperature <= self.config().wireless_charge_max_temperature {
            debug!(temperature, "temperature confirmed, engaging wireless charging");
            self.set_wireless_state(ChargeWirelessState::Charging)?;
            self.ctrl_charge_switch(true)?;
        }
        self.update(|state| state.status.observe(FactValue::BatteryTemperature(temperature)));
        Ok(())
    }

    /// Handle a battery-level report.
    pub fn on_battery_level(&self, capacity: u8) {
        self.update(|state| state.status.observe(FactValue::BatteryCapacity(capacity)));
        let charging = self.state().status.is_charging();
        self.platform().ui().set_battery(capacity, charging);
    }

    /// Switch the charge relay. Repeating the current setting sends nothing.
    pub fn ctrl_charge_switch(&self, enable: bool) -> Result<()> {
        if self.state().status.charge_enabled() == Some(enable) {
            return Ok(());
        }
        self.send(ControlCommand::charge_relay(enable))?;
        self.update(|state| state.status.set_charge_enabled(enable));
        Ok(())
    }

    /// Re-arm wireless charging: an engaged transfer drops back to `Starting`
    /// and the relay follows `enable`.
    pub fn ctrl_wireless_charge(&self, enable: bool) -> Result<()> {
        if self.state().status.wireless_state() != ChargeWirelessState::Charging {
            return Ok(());
        }
        self.set_wireless_state(ChargeWirelessState::Starting)?;
        self.ctrl_charge_switch(enable)
    }

    /// Whether the charge relay is known to be on.
    pub fn wireless_charge_enabled(&self) -> bool {
        self.state().status.charge_enabled() == Some(true)
    }

    /// Move the wireless handshake to `next`. Staying put is always allowed.
    fn set_wireless_state(&self, next: ChargeWirelessState) -> Result<()> {
        self.update(|state| {
            let current = state.status.wireless_state();
            if current == next {
                return Ok(());
            }
            if !current.can_transition_to(&next) {
                return Err(Error::InvalidStateTransition {
                    from: current.to_string(),
                    to: next.to_string(),
                });
            }
            state.status.set_wireless_state(next);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use auxlink_core::DeviceConfig;
    use auxlink_hardware::mock::{BoardEvent, MockBoard, MockPlatform, UiEvent};
    use rstest::rstest;
    use ChargeWirelessState::*;
    use ChargingStatus::*;

    use crate::control::ControlReceiver;

    fn device() -> (Device<MockPlatform>, ControlReceiver) {
        let (platform, _handle) = MockPlatform::with_board(MockBoard::new());
        Device::new(platform, DeviceConfig::default())
    }

    fn wireless(device: &Device<MockPlatform>) -> ChargeWirelessState {
        device.state().status.wireless_state()
    }

    #[test]
    fn test_wired_start_switches_relay_once() {
        let (device, mut rx) = device();
        device.on_charging_status(ChargeStart, ChargeType::Wired).unwrap();
        device.on_charging_status(ChargeStart, ChargeType::Wired).unwrap();

        assert_eq!(rx.drain(), vec![ControlCommand::charge_relay(true)]);
        assert!(device.state().status.is_charging());
        assert!(device.wireless_charge_enabled());
        assert_eq!(
            device.platform().board().events(),
            vec![BoardEvent::WakeDisplay]
        );
    }

    #[test]
    fn test_wireless_handshake() {
        let (device, mut rx) = device();

        device.on_charging_status(ChargeStart, ChargeType::Wireless).unwrap();
        assert_eq!(wireless(&device), Starting);
        assert_eq!(rx.drain(), vec![ControlCommand::request_battery_temperature()]);

        // Too hot: stays in Starting.
        device.on_battery_info(Some(41)).unwrap();
        assert_eq!(wireless(&device), Starting);

        device.on_battery_info(Some(38)).unwrap();
        assert_eq!(wireless(&device), Charging);
        assert_eq!(rx.drain(), vec![ControlCommand::charge_relay(true)]);
        assert_eq!(device.state().status.battery_temperature(), Some(38));

        device.on_charging_status(PowerStatusFinished, ChargeType::Wireless).unwrap();
        assert_eq!(wireless(&device), Stopped);
        assert_eq!(rx.drain(), vec![ControlCommand::charge_relay(false)]);
    }

    #[test]
    fn test_duplicate_start_only_vibrates() {
        let (device, _rx) = device();
        device.on_charging_status(ChargeStart, ChargeType::Wireless).unwrap();
        device.platform().board().clear_events();

        device.on_charging_status(PowerStatusCharging, ChargeType::Wireless).unwrap();
        assert_eq!(wireless(&device), Starting);
        assert_eq!(
            device.platform().board().events(),
            vec![BoardEvent::Vibrate(HapticPattern::Medium)]
        );
    }

    #[test]
    fn test_stop_while_starting_is_debounced() {
        let (device, _rx) = device();
        device.on_charging_status(ChargeStart, ChargeType::Wireless).unwrap();
        device.on_charging_status(UsbUnplugged, ChargeType::Wireless).unwrap();
        assert_eq!(wireless(&device), Stopping);

        device.platform().board().clear_events();
        device.on_charging_status(UsbUnplugged, ChargeType::Wireless).unwrap();
        assert_eq!(wireless(&device), Stopping);
        assert!(device.platform().board().events().is_empty());

        device.on_charging_status(ChargeStart, ChargeType::Wireless).unwrap();
        assert_eq!(wireless(&device), Starting);
    }

    #[rstest]
    #[case(UsbUnplugged)]
    #[case(PowerStatusFinished)]
    fn test_finish_before_start_never_engages(#[case] stop: ChargingStatus) {
        let (device, _rx) = device();
        device.on_charging_status(stop, ChargeType::Wireless).unwrap();
        assert_eq!(wireless(&device), Stopped);

        device.on_battery_info(Some(20)).unwrap();
        assert_eq!(wireless(&device), Stopped);
    }

    #[test]
    fn test_stop_refreshes_icons_with_known_capacity() {
        let (device, _rx) = device();
        device.on_battery_level(60);
        device.platform().ui().clear_events();

        device.on_charging_status(UsbUnplugged, ChargeType::Wired).unwrap();
        assert_eq!(
            device.platform().ui().events(),
            vec![
                UiEvent::Charging(false),
                UiEvent::Usb(false),
                UiEvent::Battery { capacity: 60, charging: false },
            ]
        );
    }

    #[derive(Debug, Clone, Copy)]
    enum Signal {
        StartWireless,
        StartWired,
        Stop,
    }

    fn apply(device: &Device<MockPlatform>, signal: Signal) {
        let (status, charge_type) = match signal {
            Signal::StartWireless => (ChargeStart, ChargeType::Wireless),
            Signal::StartWired => (ChargeStart, ChargeType::Wired),
            Signal::Stop => (UsbUnplugged, ChargeType::Wireless),
        };
        device.on_charging_status(status, charge_type).unwrap();
    }

    #[rstest]
    fn test_repeated_signal_is_idempotent(
        #[values(Stopped, Starting, Charging, Stopping)] initial: ChargeWirelessState,
        #[values(Signal::StartWireless, Signal::StartWired, Signal::Stop)] signal: Signal,
    ) {
        let (once, _once_rx) = device();
        let (twice, _twice_rx) = device();
        for device in [&once, &twice] {
            device.update(|s| s.status.set_wireless_state(initial));
        }

        apply(&once, signal);
        apply(&twice, signal);
        apply(&twice, signal);

        assert_eq!(twice.snapshot(), once.snapshot());
    }

    #[test]
    fn test_illegal_wireless_edge_is_rejected() {
        let (device, _rx) = device();
        let error = device.set_wireless_state(Charging).unwrap_err();
        assert!(matches!(error, Error::InvalidStateTransition { .. }));
        assert_eq!(wireless(&device), Stopped);
        device.set_wireless_state(Stopped).unwrap();
    }

    #[test]
    fn test_empty_battery_not_drawn_on_charge_events() {
        let (device, _rx) = device();
        device.on_battery_level(0);
        device.platform().ui().clear_events();

        device.on_charging_status(ChargeStart, ChargeType::Wired).unwrap();
        device.on_charging_status(UsbUnplugged, ChargeType::Wired).unwrap();

        let drawn = device
            .platform()
            .ui()
            .events()
            .into_iter()
            .any(|event| matches!(event, UiEvent::Battery { .. }));
        assert!(!drawn);
    }

    #[test]
    fn test_non_temperature_battery_info_ignored() {
        let (device, _rx) = device();
        device.on_battery_info(None).unwrap();
        assert_eq!(device.state().status.battery_temperature(), None);
    }

    #[test]
    fn test_charge_switch_first_call_always_sends() {
        let (device, mut rx) = device();
        device.ctrl_charge_switch(false).unwrap();
        device.ctrl_charge_switch(false).unwrap();
        device.ctrl_charge_switch(true).unwrap();
        assert_eq!(
            rx.drain(),
            vec![
                ControlCommand::charge_relay(false),
                ControlCommand::charge_relay(true)
            ]
        );
    }

    #[test]
    fn test_wireless_rearm_only_from_charging() {
        let (device, mut rx) = device();
        device.ctrl_wireless_charge(true).unwrap();
        assert!(rx.drain().is_empty());

        device.on_charging_status(ChargeStart, ChargeType::Wireless).unwrap();
        device.on_battery_info(Some(30)).unwrap();
        rx.drain();

        device.ctrl_wireless_charge(false).unwrap();
        assert_eq!(wireless(&device), Starting);
        assert_eq!(rx.drain(), vec![ControlCommand::charge_relay(false)]);
        assert!(!device.wireless_charge_enabled());
    }
}
