//! Outbound request correlation.
//!
//! One counter serves every outbound request regardless of kind. The
//! tracker holds at most one expectation at a time: the engine refuses to
//! open a second correlated request while one is outstanding.

use sourcelink_protocol::MessageKind;

/// The id and kind of the most recently completed inbound response.
///
/// The kind lets the wait-site caller distinguish an exception response
/// from a success after the wait returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedResponse {
    /// Correlation id echoed by the response.
    pub id: u32,
    /// Whether the response was a setting response, command response, or
    /// exception response.
    pub kind: MessageKind,
}

/// Correlation state for the single in-flight outbound request.
#[derive(Debug, Default)]
pub struct CorrelationTracker {
    next_outgoing_id: u32,
    awaiting: bool,
    completed: Option<CompletedResponse>,
}

impl CorrelationTracker {
    /// Create a tracker with no history and no outstanding request.
    pub fn new() -> Self {
        CorrelationTracker::default()
    }

    /// Hand out the next outbound id. Wraps on overflow; wrap is accepted,
    /// not an error.
    pub fn allocate_id(&mut self) -> u32 {
        let id = self.next_outgoing_id;
        self.next_outgoing_id = self.next_outgoing_id.wrapping_add(1);
        id
    }

    /// Whether a correlated request is outstanding.
    pub fn awaiting(&self) -> bool {
        self.awaiting
    }

    /// Mark a correlated request as outstanding.
    pub fn begin_wait(&mut self) {
        self.awaiting = true;
    }

    /// Record an inbound response and clear the outstanding flag.
    pub fn record_completion(&mut self, id: u32, kind: MessageKind) {
        self.completed = Some(CompletedResponse { id, kind });
        self.awaiting = false;
    }

    /// The most recently completed response, if any response has ever
    /// arrived.
    pub fn completed(&self) -> Option<CompletedResponse> {
        self.completed
    }

    /// True when no request is outstanding and the last completed response
    /// carries exactly `expected_id`. Never true against pristine state.
    pub fn is_satisfied(&self, expected_id: u32) -> bool {
        !self.awaiting
            && self
                .completed
                .is_some_and(|response| response.id == expected_id)
    }
}
