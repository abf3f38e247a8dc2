//! The instrument context handed to every protocol callback.
//!
//! Setters take a [`HostNotify`] flag: `Notify` queues the setting name so
//! the polling loop announces the change to the host, `Silent` is used when
//! the change came from the host in the first place and the engine already
//! owes it a response.

use crate::calibration::CalibrationData;
use crate::settings::{
    ComplianceRange, CurrentRange, OutputLevel, OutputMode, OutputShape, Settings, Terminals,
    VoltageRange,
};

/// Size of the instrument's configuration EEPROM image.
pub const EEPROM_SIZE: usize = 256;

/// Whether a settings change should be announced to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostNotify {
    /// Queue an unsolicited setting message for the host.
    Notify,
    /// Apply silently; the host initiated the change.
    Silent,
}

/// Parameter handed through to outgoing command data generators.
///
/// One variant per parameterized outbound command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandArg {
    /// Which input channel a status request targets.
    InputChannel(u32),
}

/// The application state behind the protocol engine.
pub struct Instrument {
    /// Working settings.
    pub settings: Settings,
    /// Calibration data in RAM.
    pub calibration: CalibrationData,
    eeprom: [u8; EEPROM_SIZE],
    input_status: Option<u32>,
    heartbeats: u32,
    start_received: bool,
    pending_notifications: Vec<&'static str>,
}

impl Default for Instrument {
    fn default() -> Self {
        Self::new()
    }
}

impl Instrument {
    /// An instrument in its power-on state.
    pub fn new() -> Self {
        let mut eeprom = [0u8; EEPROM_SIZE];
        // Address doubles as content until a real image is loaded.
        for (address, cell) in eeprom.iter_mut().enumerate() {
            *cell = address as u8;
        }
        Instrument {
            settings: Settings::power_on_defaults(),
            calibration: CalibrationData::defaults(),
            eeprom,
            input_status: None,
            heartbeats: 0,
            start_received: false,
            pending_notifications: Vec::new(),
        }
    }

    /// Queue an unsolicited setting message by name. The polling loop
    /// drains the queue through the engine after each dispatch; handlers
    /// must not re-enter the engine themselves.
    pub fn queue_notification(&mut self, name: &'static str) {
        self.pending_notifications.push(name);
    }

    /// Hand the queued setting names to the polling loop.
    pub fn take_notifications(&mut self) -> Vec<&'static str> {
        std::mem::take(&mut self.pending_notifications)
    }

    fn note(&mut self, name: &'static str, notify: HostNotify) {
        if notify == HostNotify::Notify {
            self.queue_notification(name);
        }
    }

    // ------------------------------------------------------------------
    // Settings setters; validation happens at the interface that accepted
    // the value.
    // ------------------------------------------------------------------

    /// Select voltage or current sourcing.
    pub fn set_mode(&mut self, mode: OutputMode, notify: HostNotify) {
        self.settings.mode = mode;
        self.note(crate::handlers::SETTING_MODE, notify);
    }

    /// Drive or isolate the output terminals.
    pub fn set_output_enabled(&mut self, enabled: bool, notify: HostNotify) {
        self.settings.output_enabled = enabled;
        self.note(crate::handlers::SETTING_OUTPUT_STATE, notify);
    }

    /// Lock or unlock calibration writes.
    pub fn set_calibration_locked(&mut self, locked: bool, notify: HostNotify) {
        self.settings.calibration_locked = locked;
        self.note(crate::handlers::SETTING_CAL_LOCKED, notify);
    }

    /// Set the working output frequency.
    pub fn set_frequency(&mut self, frequency_hz: f64, notify: HostNotify) {
        self.settings.frequency_hz = frequency_hz;
        self.note(crate::handlers::SETTING_FREQUENCY, notify);
    }

    /// Set the waveform shape.
    pub fn set_shape(&mut self, shape: OutputShape, notify: HostNotify) {
        self.settings.shape = shape;
        self.note(crate::handlers::SETTING_SHAPE, notify);
    }

    /// Select the voltage range.
    pub fn set_voltage_range(&mut self, range: VoltageRange, notify: HostNotify) {
        self.settings.voltage_range = range;
        self.note(crate::handlers::SETTING_VOLTAGE_RANGE, notify);
    }

    /// Enable or disable voltage autoranging.
    pub fn set_voltage_autorange(&mut self, enabled: bool, notify: HostNotify) {
        self.settings.voltage_autorange = enabled;
        self.note(crate::handlers::SETTING_VOLTAGE_AUTORANGE, notify);
    }

    /// Program the voltage output level.
    pub fn set_voltage_level(&mut self, level: OutputLevel, notify: HostNotify) {
        self.settings.voltage_level = level;
        self.note(crate::handlers::SETTING_VOLTAGE_LEVEL, notify);
    }

    /// Program the current output level.
    pub fn set_current_level(&mut self, level: OutputLevel, notify: HostNotify) {
        self.settings.current_level = level;
        self.note(crate::handlers::SETTING_CURRENT_LEVEL, notify);
    }

    /// Select the current range.
    pub fn set_current_range(&mut self, range: CurrentRange, notify: HostNotify) {
        self.settings.current_range = range;
        self.note(crate::handlers::SETTING_CURRENT_RANGE, notify);
    }

    /// Enable or disable current autoranging.
    pub fn set_current_autorange(&mut self, enabled: bool, notify: HostNotify) {
        self.settings.current_autorange = enabled;
        self.note(crate::handlers::SETTING_CURRENT_AUTORANGE, notify);
    }

    /// Select the compliance range.
    pub fn set_compliance_range(&mut self, range: ComplianceRange, notify: HostNotify) {
        self.settings.compliance_range = range;
        self.note(crate::handlers::SETTING_COMPLIANCE_RANGE, notify);
    }

    /// Record whether the current output hit compliance. Set by the output
    /// stage, announced to the host.
    pub fn set_compliance_active(&mut self, active: bool, notify: HostNotify) {
        self.settings.compliance_active = active;
        self.note(crate::handlers::SETTING_COMPLIANCE_STATUS, notify);
    }

    /// Record whether the voltage output hit current limit.
    pub fn set_protection_active(&mut self, active: bool, notify: HostNotify) {
        self.settings.protection_active = active;
        self.note(crate::handlers::SETTING_PROTECTION_STATUS, notify);
    }

    /// Select front or rear terminals.
    pub fn set_terminals(&mut self, terminals: Terminals, notify: HostNotify) {
        self.settings.terminals = terminals;
        self.note(crate::handlers::SETTING_TERMINALS, notify);
    }

    /// Replace the calibration block in RAM.
    pub fn set_calibration(&mut self, data: CalibrationData, notify: HostNotify) {
        self.calibration = data;
        self.note(crate::handlers::SETTING_CAL_DATA, notify);
    }

    /// Reload power-on defaults without touching calibration. Used by the
    /// "SettingsPowerOn" command to put the instrument in a known state.
    pub fn restore_power_on_settings(&mut self) {
        self.settings = Settings::power_on_defaults();
    }

    // ------------------------------------------------------------------
    // Command support
    // ------------------------------------------------------------------

    /// Read one byte of the EEPROM image.
    pub fn eeprom_read(&self, address: usize) -> Option<u8> {
        self.eeprom.get(address).copied()
    }

    /// Record the host's start command. The output stage picks this up when
    /// the output is next enabled.
    pub fn record_start(&mut self) {
        self.start_received = true;
    }

    /// Whether the host has issued a start since power-on.
    pub fn start_received(&self) -> bool {
        self.start_received
    }

    /// Count a host heartbeat.
    pub fn record_heartbeat(&mut self) {
        self.heartbeats = self.heartbeats.wrapping_add(1);
    }

    /// Heartbeats seen since power-on.
    pub fn heartbeats(&self) -> u32 {
        self.heartbeats
    }

    /// Cache the status returned by the input micro, for the application to
    /// read back after its wait completes.
    pub fn set_input_status(&mut self, status: Option<u32>) {
        self.input_status = status;
    }

    /// The last cached input micro status.
    pub fn input_status(&self) -> Option<u32> {
        self.input_status
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::{SETTING_FREQUENCY, SETTING_VOLTAGE_RANGE};

    #[test]
    fn notify_queues_and_silent_does_not() {
        let mut instrument = Instrument::new();
        instrument.set_frequency(50.0, HostNotify::Notify);
        instrument.set_voltage_range(VoltageRange::V10, HostNotify::Notify);
        instrument.set_mode(OutputMode::Current, HostNotify::Silent);

        assert_eq!(
            instrument.take_notifications(),
            vec![SETTING_FREQUENCY, SETTING_VOLTAGE_RANGE]
        );
        assert!(instrument.take_notifications().is_empty());
    }

    #[test]
    fn power_on_restore_keeps_calibration() {
        let mut instrument = Instrument::new();
        instrument.calibration.serial_number = "155A001".to_string();
        instrument.set_output_enabled(true, HostNotify::Silent);

        instrument.restore_power_on_settings();
        assert!(!instrument.settings.output_enabled);
        assert_eq!(instrument.calibration.serial_number, "155A001");
    }

    #[test]
    fn eeprom_reads_are_bounds_checked() {
        let instrument = Instrument::new();
        assert_eq!(instrument.eeprom_read(0x10), Some(0x10));
        assert_eq!(instrument.eeprom_read(EEPROM_SIZE), None);
    }
}
