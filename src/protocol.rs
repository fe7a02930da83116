//! JSON-lines request/response types. One request object per line, tagged by
//! `op`; one response object per line.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::engine::{EngineError, ValidationError};
use crate::model::*;

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CreateBooking {
        booking: BookingCandidate,
    },
    UpdateBooking {
        id: Id,
        booking: BookingCandidate,
    },
    DeleteBooking {
        id: Id,
    },
    GetBooking {
        id: Id,
    },
    ListBookings {
        #[serde(default)]
        kind: Option<BookingKind>,
    },
    CustomerBookings {
        customer_id: Id,
    },
    ResourceBookings {
        kind: BookingKind,
        resource_id: Id,
    },
    Register {
        entity: NewReference,
    },
    GetReference {
        kind: EntityKind,
        id: Id,
    },
    ListReferences {
        kind: EntityKind,
    },
    DeleteReference {
        kind: EntityKind,
        id: Id,
    },
    /// Dry run: classify a candidate without writing it.
    Validate {
        booking: BookingCandidate,
        #[serde(default)]
        update: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub status: u16,
    pub body: Value,
}

impl Response {
    pub fn ok(body: impl Serialize) -> Self {
        Self::with_status(200, body)
    }

    pub fn created(body: impl Serialize) -> Self {
        Self::with_status(201, body)
    }

    pub fn deleted() -> Self {
        Self { status: 204, body: Value::Null }
    }

    fn with_status(status: u16, body: impl Serialize) -> Self {
        match serde_json::to_value(body) {
            Ok(body) => Self { status, body },
            Err(e) => Self::error(500, "serialization_error", e.to_string()),
        }
    }

    pub fn error(status: u16, error: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            body: json!({ "error": error, "message": message.into() }),
        }
    }

    /// Malformed request line: bad JSON, unknown op, missing fields.
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::error(400, "bad_request", message)
    }
}

fn validation_body(e: &ValidationError) -> Value {
    match e {
        ValidationError::FieldViolations(violations) => json!({
            "error": e.label(),
            "message": e.to_string(),
            "fields": violations,
        }),
        _ => json!({ "error": e.label(), "message": e.to_string() }),
    }
}

impl From<&ValidationError> for Response {
    fn from(e: &ValidationError) -> Self {
        Self { status: e.status_code(), body: validation_body(e) }
    }
}

impl From<&EngineError> for Response {
    fn from(e: &EngineError) -> Self {
        let status = e.status_code();
        let body = match e {
            EngineError::Validation(v) => validation_body(v),
            EngineError::NotFound { .. } => {
                json!({ "error": "not_found", "message": e.to_string() })
            }
            EngineError::IdMismatch { .. } => {
                json!({ "error": "id_mismatch", "message": e.to_string() })
            }
            EngineError::KindMismatch { .. } => {
                json!({ "error": "kind_mismatch", "message": e.to_string() })
            }
            EngineError::DuplicateField { field, .. } => json!({
                "error": "duplicate_field",
                "message": e.to_string(),
                "fields": [{ "field": field, "message": "already in use" }],
            }),
            EngineError::Undeletable(_) => {
                json!({ "error": "undeletable", "message": e.to_string() })
            }
            EngineError::LimitExceeded(_) => {
                json!({ "error": "limit_exceeded", "message": e.to_string() })
            }
            EngineError::Store(_) => json!({ "error": "store_failure", "message": e.to_string() }),
        };
        Self { status, body }
    }
}
