use serde::Serialize;

use crate::model::{EntityKind, Id};
use crate::store::StoreError;

/// One failing field of a booking or registration payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
    pub field: &'static str,
    pub message: String,
}

impl FieldViolation {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self { field, message: message.into() }
    }
}

/// Why a booking candidate was refused. Every variant is recoverable by the
/// caller resubmitting different input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Structural problems, all of them, in field order.
    FieldViolations(Vec<FieldViolation>),
    /// Another booking already holds the primary resource on that date.
    DateConflict { resource: EntityKind, resource_id: Id, booking_id: Id },
    CustomerReferenceViolation(Id),
    ResourceReferenceViolation { kind: EntityKind, id: Id },
    /// None of the referenced entities exist.
    CompoundReferenceViolation,
}

impl ValidationError {
    /// Transport status: 400 for malformed input, 409 for business-rule refusals.
    pub fn status_code(&self) -> u16 {
        match self {
            ValidationError::FieldViolations(_) => 400,
            _ => 409,
        }
    }

    /// Short machine-readable label, also used as the metrics outcome.
    pub fn label(&self) -> &'static str {
        match self {
            ValidationError::FieldViolations(_) => "field_violation",
            ValidationError::DateConflict { .. } => "date_conflict",
            ValidationError::CustomerReferenceViolation(_) => "customer_reference_violation",
            ValidationError::ResourceReferenceViolation { .. } => "resource_reference_violation",
            ValidationError::CompoundReferenceViolation => "compound_reference_violation",
        }
    }

    /// Field names of a `FieldViolations` error; empty for the other variants.
    pub fn fields(&self) -> Vec<&'static str> {
        match self {
            ValidationError::FieldViolations(v) => v.iter().map(|f| f.field).collect(),
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::FieldViolations(violations) => {
                write!(f, "invalid fields:")?;
                for v in violations {
                    write!(f, " {}: {};", v.field, v.message)?;
                }
                Ok(())
            }
            ValidationError::DateConflict { resource, resource_id, booking_id } => write!(
                f,
                "{resource} {resource_id} is already booked on that date by booking {booking_id}"
            ),
            ValidationError::CustomerReferenceViolation(id) => {
                write!(f, "customer {id} does not exist")
            }
            ValidationError::ResourceReferenceViolation { kind, id } => {
                write!(f, "{kind} {id} does not exist")
            }
            ValidationError::CompoundReferenceViolation => {
                write!(f, "none of the referenced customer or resources exist")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Errors from engine operations: validation refusals plus the service-level
/// checks around them, and store failures during writes.
#[derive(Debug)]
pub enum EngineError {
    Validation(ValidationError),
    NotFound { entity: &'static str, id: Id },
    /// The body carried an id different from the one addressed. Ids are read-only.
    IdMismatch { path_id: Id, body_id: Id },
    /// An update tried to move a booking to a different booking table.
    KindMismatch { id: Id },
    /// Another entity of the same kind already uses this unique value.
    DuplicateField { field: &'static str, value: String },
    /// Customers, hotels, flights and taxis are never deleted.
    Undeletable(EntityKind),
    LimitExceeded(&'static str),
    Store(StoreError),
}

impl EngineError {
    pub fn status_code(&self) -> u16 {
        match self {
            EngineError::Validation(v) => v.status_code(),
            EngineError::NotFound { .. } => 404,
            EngineError::IdMismatch { .. }
            | EngineError::KindMismatch { .. }
            | EngineError::DuplicateField { .. }
            | EngineError::Undeletable(_) => 409,
            EngineError::LimitExceeded(_) => 400,
            EngineError::Store(_) => 500,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(v) => std::fmt::Display::fmt(v, f),
            EngineError::NotFound { entity, id } => write!(f, "{entity} {id} not found"),
            EngineError::IdMismatch { path_id, body_id } => write!(
                f,
                "booking id cannot be modified: addressed {path_id}, body carries {body_id}"
            ),
            EngineError::KindMismatch { id } => {
                write!(f, "booking {id} cannot change its booking kind")
            }
            EngineError::DuplicateField { field, value } => {
                write!(f, "{field} {value:?} is already in use")
            }
            EngineError::Undeletable(kind) => write!(f, "{kind} records cannot be deleted"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::Store(e) => write!(f, "store failure: {e}"),
        }
    }
}

impl std::error::Error for EngineError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            EngineError::Validation(v) => Some(v),
            EngineError::Store(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(e: ValidationError) -> Self {
        EngineError::Validation(e)
    }
}

impl From<StoreError> for EngineError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::LimitExceeded(msg) => EngineError::LimitExceeded(msg),
            other => EngineError::Store(other),
        }
    }
}
