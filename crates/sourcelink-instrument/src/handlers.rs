//! Protocol handler tables.
//!
//! This module is the only place the instrument touches JSON. Each setting
//! or command name owns a pair of small functions: one that extracts,
//! validates, and applies an incoming data field, and one that builds the
//! data field for outgoing messages from the working values. The engine
//! decides when responses are owed; handlers never transmit.

use log::warn;
use serde_json::{json, Value};

use sourcelink_engine::{CommandEntry, HandlerRegistry, SettingEntry};

use crate::calibration::{CalibrationData, CalibrationSet};
use crate::instrument::{CommandArg, HostNotify, Instrument};
use crate::settings::{
    validate_frequency, validate_level, ComplianceRange, CurrentRange, InstrumentInfo,
    OutputLevel, OutputMode, OutputShape, Terminals, VoltageRange,
};

// ============================================================================
// Setting Names
// ============================================================================

/// Output mode (voltage/current).
pub const SETTING_MODE: &str = "Mode";
/// Output terminals driven or isolated.
pub const SETTING_OUTPUT_STATE: &str = "OutputState";
/// Calibration write protection.
pub const SETTING_CAL_LOCKED: &str = "CalLocked";
/// Working output frequency.
pub const SETTING_FREQUENCY: &str = "Frequency";
/// Waveform shape.
pub const SETTING_SHAPE: &str = "Shape";
/// Active voltage range.
pub const SETTING_VOLTAGE_RANGE: &str = "VoltageRange";
/// Voltage autoranging.
pub const SETTING_VOLTAGE_AUTORANGE: &str = "VoltageAutorangeEnabled";
/// Programmed voltage level.
pub const SETTING_VOLTAGE_LEVEL: &str = "VoltageOutputLevel";
/// Programmed current level.
pub const SETTING_CURRENT_LEVEL: &str = "CurrentOutputLevel";
/// Active current range.
pub const SETTING_CURRENT_RANGE: &str = "CurrentRange";
/// Current autoranging.
pub const SETTING_CURRENT_AUTORANGE: &str = "CurrentAutoRangeEnabled";
/// Compliance voltage range.
pub const SETTING_COMPLIANCE_RANGE: &str = "CurrentComplianceRange";
/// Compliance limit status (read-only for the host).
pub const SETTING_COMPLIANCE_STATUS: &str = "CurrentCompliance";
/// Voltage protection status (read-only for the host).
pub const SETTING_PROTECTION_STATUS: &str = "VoltageProtection";
/// Front/rear terminal selection.
pub const SETTING_TERMINALS: &str = "Terminals";
/// Static instrument identification (read-only for the host).
pub const SETTING_INFO: &str = "Info";
/// Calibration data block.
pub const SETTING_CAL_DATA: &str = "CalData";

// ============================================================================
// Command Names
// ============================================================================

/// Report serial number and firmware version.
pub const COMMAND_VERSION_INFO: &str = "VersionInfo";
/// Read one EEPROM byte; address in a one-element array.
pub const COMMAND_READ_EEPROM: &str = "ReadEEPROM";
/// Outbound request for an input micro's status.
pub const COMMAND_INPUT_STATUS: &str = "InputMicroStatus";
/// Host-driven state sync; queues Info and CalData announcements.
pub const COMMAND_SYNC: &str = "Sync";
/// Enable the output.
pub const COMMAND_START: &str = "Start";
/// Host liveness ping.
pub const COMMAND_HEARTBEAT: &str = "<3";
/// Reload power-on setting defaults.
pub const COMMAND_SETTINGS_POWER_ON: &str = "SettingsPowerOn";
/// Report the Info setting payload on demand.
pub const COMMAND_QUERY_INFO: &str = "QueryInstrumentInfo";

/// The registry wiring both tables to the engine.
pub fn registry() -> HandlerRegistry<'static, Instrument, CommandArg> {
    HandlerRegistry::new(SETTING_HANDLERS, COMMAND_HANDLERS)
}

/// Setting handler table, one row per setting name.
pub static SETTING_HANDLERS: &[SettingEntry<Instrument>] = &[
    SettingEntry {
        name: SETTING_MODE,
        on_setting: Some(on_mode),
        on_setting_response: None,
        generate_data: Some(mode_data),
    },
    SettingEntry {
        name: SETTING_OUTPUT_STATE,
        on_setting: Some(on_output_state),
        on_setting_response: None,
        generate_data: Some(output_state_data),
    },
    SettingEntry {
        name: SETTING_CAL_LOCKED,
        on_setting: Some(on_cal_locked),
        on_setting_response: None,
        generate_data: Some(cal_locked_data),
    },
    SettingEntry {
        name: SETTING_FREQUENCY,
        on_setting: Some(on_frequency),
        on_setting_response: None,
        generate_data: Some(frequency_data),
    },
    SettingEntry {
        name: SETTING_SHAPE,
        on_setting: Some(on_shape),
        on_setting_response: None,
        generate_data: Some(shape_data),
    },
    SettingEntry {
        name: SETTING_VOLTAGE_RANGE,
        on_setting: Some(on_voltage_range),
        on_setting_response: None,
        generate_data: Some(voltage_range_data),
    },
    SettingEntry {
        name: SETTING_VOLTAGE_AUTORANGE,
        on_setting: Some(on_voltage_autorange),
        on_setting_response: None,
        generate_data: Some(voltage_autorange_data),
    },
    SettingEntry {
        name: SETTING_VOLTAGE_LEVEL,
        on_setting: Some(on_voltage_level),
        on_setting_response: None,
        generate_data: Some(voltage_level_data),
    },
    SettingEntry {
        name: SETTING_CURRENT_LEVEL,
        on_setting: Some(on_current_level),
        on_setting_response: None,
        generate_data: Some(current_level_data),
    },
    SettingEntry {
        name: SETTING_CURRENT_RANGE,
        on_setting: Some(on_current_range),
        on_setting_response: None,
        generate_data: Some(current_range_data),
    },
    SettingEntry {
        name: SETTING_CURRENT_AUTORANGE,
        on_setting: Some(on_current_autorange),
        on_setting_response: None,
        generate_data: Some(current_autorange_data),
    },
    SettingEntry {
        name: SETTING_COMPLIANCE_RANGE,
        on_setting: Some(on_compliance_range),
        on_setting_response: None,
        generate_data: Some(compliance_range_data),
    },
    SettingEntry {
        name: SETTING_COMPLIANCE_STATUS,
        on_setting: None,
        on_setting_response: None,
        generate_data: Some(compliance_status_data),
    },
    SettingEntry {
        name: SETTING_PROTECTION_STATUS,
        on_setting: None,
        on_setting_response: None,
        generate_data: Some(protection_status_data),
    },
    SettingEntry {
        name: SETTING_TERMINALS,
        on_setting: Some(on_terminals),
        on_setting_response: None,
        generate_data: Some(terminals_data),
    },
    SettingEntry {
        name: SETTING_INFO,
        on_setting: None,
        on_setting_response: None,
        generate_data: Some(info_data),
    },
    SettingEntry {
        name: SETTING_CAL_DATA,
        on_setting: Some(on_cal_data),
        on_setting_response: None,
        generate_data: Some(cal_data_data),
    },
];

/// Command handler table, one row per command name.
pub static COMMAND_HANDLERS: &[CommandEntry<Instrument, CommandArg>] = &[
    CommandEntry {
        name: COMMAND_VERSION_INFO,
        on_command: Some(run_version_info),
        generate_data: None,
        on_command_response: None,
    },
    CommandEntry {
        name: COMMAND_READ_EEPROM,
        on_command: Some(run_read_eeprom),
        generate_data: None,
        on_command_response: None,
    },
    CommandEntry {
        name: COMMAND_INPUT_STATUS,
        on_command: None,
        generate_data: Some(input_status_data),
        on_command_response: Some(on_input_status_response),
    },
    CommandEntry {
        name: COMMAND_SYNC,
        on_command: Some(run_sync),
        generate_data: None,
        on_command_response: None,
    },
    CommandEntry {
        name: COMMAND_START,
        on_command: Some(run_start),
        generate_data: None,
        on_command_response: None,
    },
    CommandEntry {
        name: COMMAND_HEARTBEAT,
        on_command: Some(run_heartbeat),
        generate_data: None,
        on_command_response: None,
    },
    CommandEntry {
        name: COMMAND_SETTINGS_POWER_ON,
        on_command: Some(run_settings_power_on),
        generate_data: None,
        on_command_response: None,
    },
    CommandEntry {
        name: COMMAND_QUERY_INFO,
        on_command: Some(run_query_info),
        generate_data: None,
        on_command_response: None,
    },
];

// ============================================================================
// Data field helpers
// ============================================================================

fn as_i64(data: Option<&Value>) -> Option<i64> {
    data?.as_i64()
}

fn as_f64(data: Option<&Value>) -> Option<f64> {
    data?.as_f64()
}

fn as_bool(data: Option<&Value>) -> Option<bool> {
    data?.as_bool()
}

fn parse_level(data: Option<&Value>) -> Option<OutputLevel> {
    let object = data?;
    Some(OutputLevel {
        amplitude: object.get("Amplitude")?.as_f64()?,
        offset: object.get("Offset")?.as_f64()?,
    })
}

fn level_payload(level: OutputLevel) -> Value {
    json!({"Amplitude": level.amplitude, "Offset": level.offset})
}

fn info_payload(info: &InstrumentInfo) -> Value {
    json!({
        "ModelNumber": info.model_number,
        "FirmwareType": info.firmware_type,
        "VersionName": info.version_name,
        "BoardRevision": info.board_revision,
        "CurrentBoardPresent": info.current_capability,
    })
}

fn parse_float_array(value: &Value) -> Option<Vec<f64>> {
    value.as_array()?.iter().map(Value::as_f64).collect()
}

fn parse_calibration(data: Option<&Value>) -> Option<CalibrationData> {
    let object = data?;
    let parse_set = |key: &str| -> Option<CalibrationSet> {
        let block = object.get(key)?;
        Some(CalibrationSet {
            gains: parse_float_array(block.get("Gains")?)?,
            offsets: parse_float_array(block.get("Offsets")?)?,
        })
    };
    Some(CalibrationData {
        serial_number: object.get("SerialNumber")?.as_str()?.to_string(),
        ac_enabled: object.get("AcFunctionalityEnabled")?.as_bool()?,
        date: object.get("Date")?.as_str()?.to_string(),
        due_date: object.get("DueDate")?.as_str()?.to_string(),
        current: parse_set("Current")?,
        voltage: parse_set("Voltage")?,
    })
}

fn calibration_payload(data: &CalibrationData) -> Value {
    json!({
        "SerialNumber": data.serial_number,
        "AcFunctionalityEnabled": data.ac_enabled,
        "Date": data.date,
        "DueDate": data.due_date,
        "Current": {"Offsets": data.current.offsets, "Gains": data.current.gains},
        "Voltage": {"Offsets": data.voltage.offsets, "Gains": data.voltage.gains},
    })
}

// ============================================================================
// Setting callbacks
// ============================================================================

fn on_mode(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(mode) = as_i64(data).and_then(|code| OutputMode::try_from(code).ok()) {
        instrument.set_mode(mode, HostNotify::Silent);
    }
}

fn mode_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.mode as u8)
}

fn on_output_state(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(enabled) = as_bool(data) {
        instrument.set_output_enabled(enabled, HostNotify::Silent);
    }
}

fn output_state_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.output_enabled)
}

fn on_cal_locked(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(locked) = as_bool(data) {
        instrument.set_calibration_locked(locked, HostNotify::Silent);
    }
}

fn cal_locked_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.calibration_locked)
}

fn on_frequency(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(frequency_hz) = as_f64(data) {
        if validate_frequency(frequency_hz) {
            instrument.set_frequency(frequency_hz, HostNotify::Silent);
        }
    }
}

fn frequency_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.frequency_hz)
}

fn on_shape(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(shape) = as_i64(data).and_then(|code| OutputShape::try_from(code).ok()) {
        instrument.set_shape(shape, HostNotify::Silent);
    }
}

fn shape_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.shape as u8)
}

fn on_voltage_range(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(range) = as_i64(data).and_then(|code| VoltageRange::try_from(code).ok()) {
        instrument.set_voltage_range(range, HostNotify::Silent);
    }
}

fn voltage_range_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.voltage_range as u8)
}

fn on_voltage_autorange(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(enabled) = as_bool(data) {
        instrument.set_voltage_autorange(enabled, HostNotify::Silent);
    }
}

fn voltage_autorange_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.voltage_autorange)
}

fn on_voltage_level(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(level) = parse_level(data) {
        let settings = &instrument.settings;
        if validate_level(level, settings.shape, settings.voltage_range.full_scale()) {
            instrument.set_voltage_level(level, HostNotify::Silent);
        }
    }
}

fn voltage_level_data(instrument: &Instrument) -> Value {
    level_payload(instrument.settings.voltage_level)
}

fn on_current_level(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(level) = parse_level(data) {
        let settings = &instrument.settings;
        if validate_level(level, settings.shape, settings.current_range.full_scale()) {
            instrument.set_current_level(level, HostNotify::Silent);
        }
    }
}

fn current_level_data(instrument: &Instrument) -> Value {
    level_payload(instrument.settings.current_level)
}

fn on_current_range(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(range) = as_i64(data).and_then(|code| CurrentRange::try_from(code).ok()) {
        instrument.set_current_range(range, HostNotify::Silent);
    }
}

fn current_range_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.current_range as u8)
}

fn on_current_autorange(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(enabled) = as_bool(data) {
        instrument.set_current_autorange(enabled, HostNotify::Silent);
    }
}

fn current_autorange_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.current_autorange)
}

fn on_compliance_range(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(range) = as_i64(data).and_then(|code| ComplianceRange::try_from(code).ok()) {
        instrument.set_compliance_range(range, HostNotify::Silent);
    }
}

fn compliance_range_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.compliance_range as u8)
}

fn compliance_status_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.compliance_active)
}

fn protection_status_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.protection_active)
}

fn on_terminals(instrument: &mut Instrument, data: Option<&Value>) {
    if let Some(terminals) = as_i64(data).and_then(|code| Terminals::try_from(code).ok()) {
        instrument.set_terminals(terminals, HostNotify::Silent);
    }
}

fn terminals_data(instrument: &Instrument) -> Value {
    json!(instrument.settings.terminals as u8)
}

fn info_data(instrument: &Instrument) -> Value {
    info_payload(&instrument.settings.info)
}

fn on_cal_data(instrument: &mut Instrument, data: Option<&Value>) {
    if instrument.settings.calibration_locked {
        warn!("CalData write rejected while calibration is locked");
        return;
    }
    if let Some(parsed) = parse_calibration(data) {
        if parsed.is_well_formed() {
            instrument.set_calibration(parsed, HostNotify::Silent);
        } else {
            warn!("CalData write rejected: wrong calibration point count");
        }
    }
}

fn cal_data_data(instrument: &Instrument) -> Value {
    calibration_payload(&instrument.calibration)
}

// ============================================================================
// Command callbacks
// ============================================================================

fn run_version_info(instrument: &mut Instrument, _data: Option<&Value>) -> Option<Value> {
    let info = &instrument.settings.info;
    Some(json!({
        "SerialNumber": instrument.calibration.serial_number,
        "ModelNumber": info.model_number,
        "FirmwareVersion": info.version_name,
        "BoardRevision": info.board_revision,
    }))
}

fn run_query_info(instrument: &mut Instrument, _data: Option<&Value>) -> Option<Value> {
    Some(info_payload(&instrument.settings.info))
}

fn run_read_eeprom(instrument: &mut Instrument, data: Option<&Value>) -> Option<Value> {
    let address = data?.as_array()?.first()?.as_u64()? as usize;
    instrument.eeprom_read(address).map(|byte| json!([byte]))
}

fn run_sync(instrument: &mut Instrument, _data: Option<&Value>) -> Option<Value> {
    instrument.queue_notification(SETTING_INFO);
    instrument.queue_notification(SETTING_CAL_DATA);
    None
}

fn run_start(instrument: &mut Instrument, _data: Option<&Value>) -> Option<Value> {
    instrument.record_start();
    None
}

fn run_heartbeat(instrument: &mut Instrument, _data: Option<&Value>) -> Option<Value> {
    instrument.record_heartbeat();
    None
}

fn run_settings_power_on(instrument: &mut Instrument, _data: Option<&Value>) -> Option<Value> {
    instrument.restore_power_on_settings();
    None
}

fn input_status_data(_instrument: &Instrument, param: Option<&CommandArg>) -> Option<Value> {
    match param {
        Some(CommandArg::InputChannel(channel)) => Some(json!(channel)),
        None => None,
    }
}

fn on_input_status_response(instrument: &mut Instrument, data: Option<&Value>) {
    instrument.set_input_status(data.and_then(Value::as_u64).map(|status| status as u32));
}
