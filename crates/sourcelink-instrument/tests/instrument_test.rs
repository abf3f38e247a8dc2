//! Full firmware-side exchanges: engine wired to the instrument tables,
//! with the host played by hand-built packets on the loopback transport.

use serde_json::json;

use sourcelink_engine::{LoopbackTransport, ProtocolEngine};
use sourcelink_instrument::{
    registry, CommandArg, HostNotify, Instrument, OutputMode, VoltageRange, COMMAND_HEARTBEAT,
    COMMAND_INPUT_STATUS, COMMAND_QUERY_INFO, COMMAND_READ_EEPROM, COMMAND_SETTINGS_POWER_ON,
    COMMAND_START, COMMAND_SYNC, COMMAND_VERSION_INFO, SETTING_CAL_DATA,
    SETTING_COMPLIANCE_STATUS, SETTING_FREQUENCY,
    SETTING_INFO, SETTING_MODE, SETTING_PROTECTION_STATUS, SETTING_VOLTAGE_RANGE,
};
use sourcelink_protocol::{
    decode_envelope, encode_envelope, unwrap_packet, wrap_packet, Message, MessageKind,
    PACKET_OVERHEAD,
};

type InstrumentEngine = ProtocolEngine<'static, Instrument, CommandArg, LoopbackTransport>;

fn engine() -> InstrumentEngine {
    ProtocolEngine::new(LoopbackTransport::new(), registry())
}

fn host_packet(message: &Message) -> Vec<u8> {
    wrap_packet(&encode_envelope(message).unwrap()).unwrap()
}

fn drain_messages(engine: &mut InstrumentEngine) -> Vec<Message> {
    let bytes = engine.transport_mut().take_outgoing();
    let mut messages = Vec::new();
    let mut offset = 0;
    while offset < bytes.len() {
        let length = u16::from_be_bytes([bytes[offset + 1], bytes[offset + 2]]) as usize;
        let packet = &bytes[offset..offset + PACKET_OVERHEAD + length];
        messages.push(decode_envelope(unwrap_packet(packet).unwrap()).unwrap());
        offset += PACKET_OVERHEAD + length;
    }
    messages
}

/// Feed one packet from the host and run the poll loop over it, including
/// the notification-drain step a real firmware loop performs.
fn exchange(
    engine: &mut InstrumentEngine,
    instrument: &mut Instrument,
    message: &Message,
) -> Vec<Message> {
    engine.transport_mut().push_incoming(&host_packet(message));
    for _ in 0..8 {
        engine.poll_once(instrument);
    }
    for name in instrument.take_notifications() {
        engine
            .send_setting(instrument, name, false)
            .expect("queued notification must have a generator");
    }
    drain_messages(engine)
}

#[test]
fn frequency_setting_applies_and_reports_the_working_value() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    let set = Message::new(MessageKind::Setting, SETTING_FREQUENCY)
        .with_data(json!(1234.5))
        .with_id(1);
    let responses = exchange(&mut engine, &mut instrument, &set);

    assert_eq!(instrument.settings.frequency_hz, 1234.5);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].kind, MessageKind::SettingResponse);
    assert_eq!(responses[0].name, SETTING_FREQUENCY);
    assert_eq!(responses[0].id, Some(1));
    assert_eq!(responses[0].data, Some(json!(1234.5)));
}

#[test]
fn out_of_range_frequency_is_refused_and_the_response_says_so() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    let set = Message::new(MessageKind::Setting, SETTING_FREQUENCY)
        .with_data(json!(999_999.0))
        .with_id(2);
    let responses = exchange(&mut engine, &mut instrument, &set);

    // The working value never moved, and that is what the host hears back.
    assert_eq!(instrument.settings.frequency_hz, 0.0);
    assert_eq!(responses[0].data, Some(json!(0.0)));
}

#[test]
fn mode_and_voltage_range_settings_apply_by_code() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    exchange(
        &mut engine,
        &mut instrument,
        &Message::new(MessageKind::Setting, SETTING_MODE).with_data(json!(1)),
    );
    exchange(
        &mut engine,
        &mut instrument,
        &Message::new(MessageKind::Setting, SETTING_VOLTAGE_RANGE).with_data(json!(4)),
    );

    assert_eq!(instrument.settings.mode, OutputMode::Current);
    assert_eq!(instrument.settings.voltage_range, VoltageRange::V10);
}

#[test]
fn status_only_setting_answers_reads_without_a_handler() {
    let mut engine = engine();
    let mut instrument = Instrument::new();
    instrument.set_protection_active(true, HostNotify::Silent);

    // A data-less setting with an id doubles as a read request.
    let read = Message::new(MessageKind::Setting, SETTING_PROTECTION_STATUS).with_id(6);
    let responses = exchange(&mut engine, &mut instrument, &read);

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].kind, MessageKind::SettingResponse);
    assert_eq!(responses[0].data, Some(json!(true)));
}

#[test]
fn sync_command_announces_info_and_cal_data() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    let sync = Message::new(MessageKind::Command, COMMAND_SYNC).with_id(5);
    let outbound = exchange(&mut engine, &mut instrument, &sync);

    assert_eq!(outbound.len(), 3);

    assert_eq!(outbound[0].kind, MessageKind::CommandResponse);
    assert_eq!(outbound[0].name, COMMAND_SYNC);
    assert_eq!(outbound[0].id, Some(5));
    assert_eq!(outbound[0].data, None);

    assert_eq!(outbound[1].kind, MessageKind::Setting);
    assert_eq!(outbound[1].name, SETTING_INFO);
    assert_eq!(outbound[1].id, None);
    let info = outbound[1].data.as_ref().unwrap();
    assert_eq!(info.get("ModelNumber"), Some(&json!("Model 155")));

    assert_eq!(outbound[2].kind, MessageKind::Setting);
    assert_eq!(outbound[2].name, SETTING_CAL_DATA);
    let cal = outbound[2].data.as_ref().unwrap();
    assert_eq!(
        cal.get("Voltage").and_then(|voltage| voltage.get("Gains")),
        Some(&json!(vec![1.0; 5]))
    );
}

#[test]
fn read_eeprom_returns_the_addressed_byte() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    let read = Message::new(MessageKind::Command, COMMAND_READ_EEPROM)
        .with_data(json!([0x42]))
        .with_id(9);
    let responses = exchange(&mut engine, &mut instrument, &read);

    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].kind, MessageKind::CommandResponse);
    assert_eq!(responses[0].data, Some(json!([0x42])));
}

#[test]
fn version_info_command_reports_serial_and_firmware() {
    let mut engine = engine();
    let mut instrument = Instrument::new();
    instrument.calibration.serial_number = "155A001".to_string();

    let query = Message::new(MessageKind::Command, COMMAND_VERSION_INFO).with_id(3);
    let responses = exchange(&mut engine, &mut instrument, &query);

    let data = responses[0].data.as_ref().unwrap();
    assert_eq!(data.get("SerialNumber"), Some(&json!("155A001")));
    assert_eq!(data.get("ModelNumber"), Some(&json!("Model 155")));
    assert_eq!(data.get("FirmwareVersion"), Some(&json!("1.0.0")));
    assert_eq!(data.get("BoardRevision"), Some(&json!("0")));
}

#[test]
fn query_instrument_info_command_returns_the_info_payload() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    let query = Message::new(MessageKind::Command, COMMAND_QUERY_INFO).with_id(7);
    let responses = exchange(&mut engine, &mut instrument, &query);

    let data = responses[0].data.as_ref().unwrap();
    assert_eq!(data.get("ModelNumber"), Some(&json!("Model 155")));
    assert_eq!(data.get("FirmwareType"), Some(&json!("155acdc")));
    assert_eq!(data.get("CurrentBoardPresent"), Some(&json!(true)));
}

#[test]
fn settings_power_on_command_restores_defaults() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    exchange(
        &mut engine,
        &mut instrument,
        &Message::new(MessageKind::Setting, SETTING_FREQUENCY).with_data(json!(60.0)),
    );
    assert_eq!(instrument.settings.frequency_hz, 60.0);

    let reset = Message::new(MessageKind::Command, COMMAND_SETTINGS_POWER_ON).with_id(4);
    let responses = exchange(&mut engine, &mut instrument, &reset);

    assert_eq!(responses[0].kind, MessageKind::CommandResponse);
    assert_eq!(instrument.settings.frequency_hz, 0.0);
    assert!(!instrument.settings.output_enabled);
}

#[test]
fn start_command_flags_without_driving_the_output() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    let start = Message::new(MessageKind::Command, COMMAND_START).with_id(10);
    let responses = exchange(&mut engine, &mut instrument, &start);

    assert_eq!(responses[0].kind, MessageKind::CommandResponse);
    assert!(instrument.start_received());
    // The output stage owns enabling; the command only latches the request.
    assert!(!instrument.settings.output_enabled);
}

#[test]
fn heartbeat_command_counts() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    for _ in 0..3 {
        exchange(
            &mut engine,
            &mut instrument,
            &Message::new(MessageKind::Command, COMMAND_HEARTBEAT),
        );
    }
    assert_eq!(instrument.heartbeats(), 3);
}

#[test]
fn remote_input_status_request_caches_the_response() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    let id = engine
        .send_command(
            &instrument,
            COMMAND_INPUT_STATUS,
            true,
            Some(&CommandArg::InputChannel(2)),
        )
        .unwrap()
        .expect("correlated request allocates an id");

    let outbound = drain_messages(&mut engine);
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].kind, MessageKind::Command);
    assert_eq!(outbound[0].name, COMMAND_INPUT_STATUS);
    assert_eq!(outbound[0].data, Some(json!(2)));
    assert_eq!(outbound[0].id, Some(id));

    let reply = Message::new(MessageKind::CommandResponse, COMMAND_INPUT_STATUS)
        .with_data(json!(7))
        .with_id(id);
    engine.transport_mut().push_incoming(&host_packet(&reply));

    let mut polls = 0;
    while engine.wait_for_response(&mut instrument, id) {
        polls += 1;
        assert!(polls < 32, "status response never satisfied the wait");
    }
    assert_eq!(instrument.input_status(), Some(7));
}

#[test]
fn application_initiated_change_is_announced_unsolicited() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    // The output stage trips compliance; the firmware loop announces it.
    instrument.set_compliance_active(true, HostNotify::Notify);
    for name in instrument.take_notifications() {
        engine.send_setting(&instrument, name, false).unwrap();
    }

    let outbound = drain_messages(&mut engine);
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].kind, MessageKind::Setting);
    assert_eq!(outbound[0].name, SETTING_COMPLIANCE_STATUS);
    assert_eq!(outbound[0].data, Some(json!(true)));
    assert_eq!(outbound[0].id, None);
}

#[test]
fn cal_data_setting_round_trips_when_unlocked() {
    let mut engine = engine();
    let mut instrument = Instrument::new();

    exchange(
        &mut engine,
        &mut instrument,
        &Message::new(MessageKind::Setting, "CalLocked").with_data(json!(false)),
    );

    let block = json!({
        "SerialNumber": "155A042",
        "AcFunctionalityEnabled": true,
        "Date": "2026-08-01",
        "DueDate": "2027-08-01",
        "Current": {"Offsets": vec![0.0; 11], "Gains": vec![1.0; 11]},
        "Voltage": {"Offsets": vec![0.001; 5], "Gains": vec![1.002; 5]},
    });
    let set = Message::new(MessageKind::Setting, SETTING_CAL_DATA)
        .with_data(block.clone())
        .with_id(12);
    let responses = exchange(&mut engine, &mut instrument, &set);

    assert_eq!(instrument.calibration.serial_number, "155A042");
    assert_eq!(instrument.calibration.voltage.offsets, vec![0.001; 5]);
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].kind, MessageKind::SettingResponse);
    assert_eq!(responses[0].data, Some(block));
}
