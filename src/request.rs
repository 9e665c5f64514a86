//! Request descriptions handed to request listeners once a request has been
//! processed.

use crate::ids::{ControlId, EventId, ObjectId, StandaloneFileId};

/// Identifies whoever issued a request. Listeners may filter on it.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct SenderId(pub u64);

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "SenderId({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RequestType {
    /// Matches every request type when used as a listener filter.
    AllRequests,
    Manager,
    Callback,
    Object,
    Listener,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RequestResult {
    Success,
    Failure,
}

impl From<bool> for RequestResult {
    fn from(success: bool) -> Self {
        if success { Self::Success } else { Self::Failure }
    }
}

/// Bit of a specific request within its type. Listeners subscribe with a mask
/// of these bits.
pub type SpecificRequest = u32;

pub const ALL_SPECIFIC_REQUESTS: SpecificRequest = u32::MAX;

pub mod manager_request {
    use super::SpecificRequest;

    pub const PARSE_CONTROLS_DATA: SpecificRequest = 1 << 0;
    pub const PARSE_PRELOADS_DATA: SpecificRequest = 1 << 1;
    pub const CLEAR_CONTROLS_DATA: SpecificRequest = 1 << 2;
    pub const CLEAR_PRELOADS_DATA: SpecificRequest = 1 << 3;
    pub const RESERVE_OBJECT_ID: SpecificRequest = 1 << 4;
    pub const RELEASE_OBJECT_ID: SpecificRequest = 1 << 5;
}

pub mod callback_request {
    use super::SpecificRequest;

    pub const REPORT_STARTED_EVENT: SpecificRequest = 1 << 0;
    pub const REPORT_FINISHED_EVENT: SpecificRequest = 1 << 1;
    pub const REPORT_FINISHED_TRIGGER_INSTANCE: SpecificRequest = 1 << 2;
    pub const REPORT_VIRTUALIZED_EVENT: SpecificRequest = 1 << 3;
    pub const REPORT_PHYSICALIZED_EVENT: SpecificRequest = 1 << 4;
    pub const REPORT_STARTED_FILE: SpecificRequest = 1 << 5;
    pub const REPORT_STOPPED_FILE: SpecificRequest = 1 << 6;
    pub const REPORT_PROCESSED_OBSTRUCTION_RAY: SpecificRequest = 1 << 7;
}

pub mod object_request {
    use super::SpecificRequest;

    pub const EXECUTE_TRIGGER: SpecificRequest = 1 << 0;
    pub const STOP_TRIGGER: SpecificRequest = 1 << 1;
    pub const STOP_ALL_TRIGGERS: SpecificRequest = 1 << 2;
    pub const SET_TRANSFORMATION: SpecificRequest = 1 << 3;
    pub const SET_PARAMETER: SpecificRequest = 1 << 4;
    pub const SET_SWITCH_STATE: SpecificRequest = 1 << 5;
    pub const SET_ENVIRONMENT: SpecificRequest = 1 << 6;
    pub const RESET_ENVIRONMENTS: SpecificRequest = 1 << 7;
    pub const PLAY_FILE: SpecificRequest = 1 << 8;
    pub const STOP_FILE: SpecificRequest = 1 << 9;
}

pub mod listener_request {
    use super::SpecificRequest;

    pub const SET_TRANSFORMATION: SpecificRequest = 1 << 0;
}

/// What a request listener is told about a processed request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    pub result: RequestResult,
    pub request_type: RequestType,
    pub specific_request: SpecificRequest,
    pub sender: Option<SenderId>,
    pub object_id: ObjectId,
    pub control_id: ControlId,
    pub event_id: EventId,
    pub standalone_file_id: StandaloneFileId,
    pub value: Option<String>,
}

impl RequestInfo {
    pub fn new(request_type: RequestType, specific_request: SpecificRequest, result: RequestResult) -> Self {
        Self {
            result,
            request_type,
            specific_request,
            sender: None,
            object_id: ObjectId::INVALID,
            control_id: ControlId::INVALID,
            event_id: EventId::INVALID,
            standalone_file_id: StandaloneFileId::INVALID,
            value: None,
        }
    }

    pub fn result(mut self, result: impl Into<RequestResult>) -> Self {
        self.result = result.into();
        self
    }

    pub fn sender(mut self, sender: Option<SenderId>) -> Self {
        self.sender = sender;
        self
    }

    pub fn object(mut self, object_id: ObjectId) -> Self {
        self.object_id = object_id;
        self
    }

    pub fn control(mut self, control_id: ControlId) -> Self {
        self.control_id = control_id;
        self
    }

    pub fn event(mut self, event_id: EventId) -> Self {
        self.event_id = event_id;
        self
    }

    pub fn standalone_file(mut self, file_id: StandaloneFileId) -> Self {
        self.standalone_file_id = file_id;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}
