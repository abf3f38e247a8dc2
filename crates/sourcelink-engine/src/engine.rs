//! Packet reception state machine, dispatch, and the outward-facing API.

use bytes::BytesMut;
use log::{debug, warn};
use serde_json::Value;

use sourcelink_protocol::{
    decode_envelope, encode_envelope, wrap_packet, Message, MessageKind, END_OF_PACKET,
    MAX_MESSAGE_SIZE, START_OF_PACKET,
};

use crate::correlation::{CompletedResponse, CorrelationTracker};
use crate::error::EngineError;
use crate::registry::HandlerRegistry;
use crate::transport::ByteTransport;

/// Reception states, one advanced per poll.
///
/// The machine never blocks and never terminates; any framing fault returns
/// it to `WaitingForStart` with the partial packet discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    /// Scanning for the start-of-packet marker; preceding bytes are noise.
    WaitingForStart,
    /// Accumulating the 2-byte body length.
    ReadingLength,
    /// Accumulating the declared number of body bytes.
    ReadingBody,
    /// Expecting the end-of-packet marker.
    ReadingEnd,
    /// A complete body is ready for dispatch.
    Processing,
    /// Dispatch finished; the next poll resets for a new packet.
    Done,
}

/// Accumulates one packet across polls.
#[derive(Debug)]
struct PacketReceiver {
    state: RxState,
    length_bytes: [u8; 2],
    length_read: usize,
    body_length: usize,
    body: BytesMut,
}

impl PacketReceiver {
    fn new() -> Self {
        PacketReceiver {
            state: RxState::WaitingForStart,
            length_bytes: [0; 2],
            length_read: 0,
            body_length: 0,
            body: BytesMut::with_capacity(MAX_MESSAGE_SIZE),
        }
    }

    fn reset(&mut self) {
        self.state = RxState::WaitingForStart;
        self.length_read = 0;
        self.body_length = 0;
        self.body.clear();
    }

    fn take_body(&mut self) -> BytesMut {
        self.body.split()
    }

    /// Perform the current state's work against whatever bytes are
    /// available. States hold (consuming nothing further) when the
    /// transport runs dry mid-field.
    fn advance<T: ByteTransport>(&mut self, transport: &mut T) {
        match self.state {
            RxState::WaitingForStart => {
                let mut byte = [0u8; 1];
                while transport.read(&mut byte) == 1 {
                    if byte[0] == START_OF_PACKET {
                        self.state = RxState::ReadingLength;
                        break;
                    }
                }
            }

            RxState::ReadingLength => {
                let mut byte = [0u8; 1];
                while self.length_read < 2 {
                    if transport.read(&mut byte) != 1 {
                        return;
                    }
                    self.length_bytes[self.length_read] = byte[0];
                    self.length_read += 1;
                }
                let declared = u16::from_be_bytes(self.length_bytes) as usize;
                if declared > MAX_MESSAGE_SIZE {
                    // Bound check before any body byte is buffered.
                    warn!("declared body length {declared} exceeds receive capacity, packet dropped");
                    self.reset();
                } else {
                    self.body_length = declared;
                    self.state = RxState::ReadingBody;
                }
            }

            RxState::ReadingBody => {
                let remaining = self.body_length - self.body.len();
                if remaining > 0 {
                    let mut chunk = vec![0u8; remaining];
                    let count = transport.read(&mut chunk);
                    self.body.extend_from_slice(&chunk[..count]);
                }
                if self.body.len() == self.body_length {
                    self.state = RxState::ReadingEnd;
                }
            }

            RxState::ReadingEnd => {
                let mut byte = [0u8; 1];
                if transport.read(&mut byte) == 1 {
                    if byte[0] == END_OF_PACKET {
                        self.state = RxState::Processing;
                    } else {
                        // No id was parsed, so no response is possible.
                        warn!("bad end marker 0x{:02X}, packet dropped", byte[0]);
                        self.reset();
                    }
                }
            }

            // Handled by the engine, which owns dispatch.
            RxState::Processing | RxState::Done => {}
        }
    }
}

/// The companion-link protocol engine.
///
/// Owns the transport and the reception/correlation state; holds the
/// application's handler tables by reference. `A` is the application
/// context passed into every callback; `P` is the application-defined
/// parameter type for outgoing commands.
pub struct ProtocolEngine<'h, A, P, T> {
    transport: T,
    registry: HandlerRegistry<'h, A, P>,
    receiver: PacketReceiver,
    correlation: CorrelationTracker,
}

impl<'h, A, P, T: ByteTransport> ProtocolEngine<'h, A, P, T> {
    /// Wire the engine to its transport and handler tables. The tables must
    /// outlive the engine and are never mutated.
    pub fn new(transport: T, registry: HandlerRegistry<'h, A, P>) -> Self {
        ProtocolEngine {
            transport,
            registry,
            receiver: PacketReceiver::new(),
            correlation: CorrelationTracker::new(),
        }
    }

    /// Advance packet reception by one state and return the resulting
    /// state. Call periodically from the application's main loop.
    pub fn poll_once(&mut self, app: &mut A) -> RxState {
        match self.receiver.state {
            RxState::Processing => {
                let body = self.receiver.take_body();
                self.process_body(app, &body);
                self.receiver.state = RxState::Done;
            }
            RxState::Done => self.receiver.reset(),
            _ => self.receiver.advance(&mut self.transport),
        }
        self.receiver.state
    }

    /// Build, frame, and transmit a setting message.
    ///
    /// The name's table entry must carry an outgoing-data generator. An id
    /// is allocated only when `response_required`; the returned `Some(id)`
    /// is what [`wait_for_response`](Self::wait_for_response) expects.
    pub fn send_setting(
        &mut self,
        app: &A,
        name: &str,
        response_required: bool,
    ) -> Result<Option<u32>, EngineError> {
        let entry = self
            .registry
            .find_setting(name)
            .ok_or_else(|| EngineError::UnknownName {
                name: name.to_string(),
            })?;
        let generate = entry
            .generate_data
            .ok_or_else(|| EngineError::MissingGenerator {
                name: name.to_string(),
            })?;

        let id = self.allocate_request_id(response_required)?;
        let mut message = Message::new(MessageKind::Setting, name).with_data(generate(app));
        message.id = id;
        self.transmit(&message)?;
        if id.is_some() {
            self.correlation.begin_wait();
        }
        Ok(id)
    }

    /// Build, frame, and transmit a command message.
    ///
    /// `param` is handed through opaquely to the entry's outgoing-data
    /// generator; its meaning is per-name and application-defined.
    pub fn send_command(
        &mut self,
        app: &A,
        name: &str,
        response_required: bool,
        param: Option<&P>,
    ) -> Result<Option<u32>, EngineError> {
        let entry = self
            .registry
            .find_command(name)
            .ok_or_else(|| EngineError::UnknownName {
                name: name.to_string(),
            })?;
        let generate = entry
            .generate_data
            .ok_or_else(|| EngineError::MissingGenerator {
                name: name.to_string(),
            })?;

        let id = self.allocate_request_id(response_required)?;
        let mut message = Message::new(MessageKind::Command, name);
        message.data = generate(app, param);
        message.id = id;
        self.transmit(&message)?;
        if id.is_some() {
            self.correlation.begin_wait();
        }
        Ok(id)
    }

    /// Drive one reception step and report whether the response with
    /// `expected_id` is still outstanding.
    ///
    /// Returns `false` only once a response carrying exactly `expected_id`
    /// has completed. The engine has no timer: the caller loops, and gives
    /// up, on its own schedule. Check
    /// [`last_completed_response`](Self::last_completed_response) afterwards
    /// to distinguish an exception response from a success.
    pub fn wait_for_response(&mut self, app: &mut A, expected_id: u32) -> bool {
        self.poll_once(app);
        !self.correlation.is_satisfied(expected_id)
    }

    /// Id and kind of the most recently completed inbound response.
    pub fn last_completed_response(&self) -> Option<CompletedResponse> {
        self.correlation.completed()
    }

    /// Current reception state without advancing the machine.
    pub fn rx_state(&self) -> RxState {
        self.receiver.state
    }

    /// Shared access to the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Exclusive access to the transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    fn allocate_request_id(&mut self, response_required: bool) -> Result<Option<u32>, EngineError> {
        if !response_required {
            return Ok(None);
        }
        if self.correlation.awaiting() {
            return Err(EngineError::RequestPending);
        }
        Ok(Some(self.correlation.allocate_id()))
    }

    fn process_body(&mut self, app: &mut A, body: &[u8]) {
        match decode_envelope(body) {
            Ok(message) => self.dispatch(app, message),
            Err(error) => debug!("dropping undecodable envelope: {error}"),
        }
    }

    fn dispatch(&mut self, app: &mut A, message: Message) {
        match message.kind {
            MessageKind::Setting => match self.registry.find_setting(&message.name) {
                Some(entry) => {
                    if let Some(on_setting) = entry.on_setting {
                        on_setting(app, message.data.as_ref());
                    }
                    if let (Some(generate), Some(id)) = (entry.generate_data, message.id) {
                        let response = Message::new(MessageKind::SettingResponse, message.name)
                            .with_data(generate(app))
                            .with_id(id);
                        self.transmit_or_log(&response);
                    }
                }
                None => self.reject_unknown(message, "setting"),
            },

            MessageKind::SettingResponse => {
                if let Some(entry) = self.registry.find_setting(&message.name) {
                    if let Some(on_response) = entry.on_setting_response {
                        on_response(app, message.data.as_ref());
                    }
                }
                self.complete_response(&message);
            }

            MessageKind::Command => match self.registry.find_command(&message.name) {
                Some(entry) => {
                    let response_data = entry
                        .on_command
                        .and_then(|on_command| on_command(app, message.data.as_ref()));
                    // The response is owed whenever an id is present, even
                    // with an empty data body.
                    if let Some(id) = message.id {
                        let mut response =
                            Message::new(MessageKind::CommandResponse, message.name).with_id(id);
                        response.data = response_data;
                        self.transmit_or_log(&response);
                    }
                }
                None => self.reject_unknown(message, "command"),
            },

            MessageKind::CommandResponse => {
                if let Some(entry) = self.registry.find_command(&message.name) {
                    if let Some(on_response) = entry.on_command_response {
                        on_response(app, message.data.as_ref());
                    }
                }
                self.complete_response(&message);
            }

            MessageKind::ExceptionResponse => {
                warn!(
                    "exception response for '{}': {:?}",
                    message.name, message.data
                );
                self.complete_response(&message);
            }
        }
    }

    /// Responses never themselves get responses; they only feed the
    /// correlation tracker.
    fn complete_response(&mut self, message: &Message) {
        if let Some(id) = message.id {
            self.correlation.record_completion(id, message.kind);
        }
    }

    fn reject_unknown(&mut self, message: Message, namespace: &str) {
        match message.id {
            Some(id) => {
                let text = format!("no handler for {namespace} '{}'", message.name);
                warn!("{text}");
                let response = Message::new(MessageKind::ExceptionResponse, message.name)
                    .with_data(Value::String(text))
                    .with_id(id);
                self.transmit_or_log(&response);
            }
            None => debug!(
                "no handler for {namespace} '{}', dropped without response",
                message.name
            ),
        }
    }

    fn transmit(&mut self, message: &Message) -> Result<(), EngineError> {
        let body = encode_envelope(message)?;
        let packet = wrap_packet(&body)?;
        let committed = self.transport.write(&packet);
        if committed < packet.len() {
            return Err(EngineError::TransportOverflow {
                wanted: packet.len(),
                committed,
            });
        }
        Ok(())
    }

    /// Transmit on the reception path, where faults cannot surface to the
    /// application and are only logged.
    fn transmit_or_log(&mut self, message: &Message) {
        if let Err(error) = self.transmit(message) {
            warn!(
                "failed to transmit {:?} '{}': {error}",
                message.kind, message.name
            );
        }
    }
}
