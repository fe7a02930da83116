use std::sync::Arc;

use tracing::debug;

use crate::model::*;
use crate::store::EntityStore;

use super::clock::Clock;
use super::conflict::find_date_conflict;
use super::error::ValidationError;
use super::existence::{self, Existence};
use super::fields;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Create,
    Update,
}

/// A booking that passed every check. Only the validator builds these, so
/// holding one means validation ran against the candidate it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedBooking {
    id: Option<Id>,
    booking: NewBooking,
}

impl ValidatedBooking {
    /// The id being updated, or None for a create.
    pub fn id(&self) -> Option<Id> {
        self.id
    }

    pub fn booking(&self) -> &NewBooking {
        &self.booking
    }

    pub fn into_parts(self) -> (Option<Id>, NewBooking) {
        (self.id, self.booking)
    }
}

/// Runs field, reference and date-conflict checks and classifies the outcome.
///
/// Never writes. Holds no locks either, so a check-then-persist sequence built
/// on it alone can race with a concurrent writer; `Engine` serializes writers
/// per primary resource around it.
#[derive(Clone)]
pub struct Validator {
    store: Arc<dyn EntityStore>,
    clock: Arc<dyn Clock>,
}

impl Validator {
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub async fn validate_and_prepare(
        &self,
        candidate: &BookingCandidate,
        mode: Mode,
    ) -> Result<ValidatedBooking, ValidationError> {
        let result = self.classify(candidate, mode).await;
        let outcome = match &result {
            Ok(_) => "valid",
            Err(e) => e.label(),
        };
        metrics::counter!(crate::observability::VALIDATIONS_TOTAL, "outcome" => outcome)
            .increment(1);
        if let Err(e) = &result {
            debug!("{} candidate rejected: {e}", candidate.kind);
        }
        result
    }

    async fn classify(
        &self,
        candidate: &BookingCandidate,
        mode: Mode,
    ) -> Result<ValidatedBooking, ValidationError> {
        let violations = fields::booking_violations(candidate, mode, self.clock.today());
        let primary = candidate.kind.primary();
        let (customer_id, date, primary_id) = match (
            candidate.customer_id,
            candidate.date,
            candidate.resources.get(primary),
        ) {
            (Some(c), Some(d), Some(p)) if violations.is_empty() => (c, d, p),
            _ => return Err(ValidationError::FieldViolations(violations)),
        };
        let exclude = candidate.id;
        let store = self.store.as_ref();

        let customer = existence::check(store, EntityKind::Customer, customer_id, exclude).await;
        let mut resources = Vec::with_capacity(RESOURCE_KINDS.len());
        for (kind, id) in candidate.resources.present() {
            resources.push((kind, id, existence::check(store, kind, id, exclude).await));
        }

        if let Some(booking_id) =
            find_date_conflict(store, candidate.kind, primary_id, exclude, date).await
        {
            return Err(ValidationError::DateConflict {
                resource: primary,
                resource_id: primary_id,
                booking_id,
            });
        }

        if customer.is_missing() && resources.iter().all(|(_, _, e)| e.is_missing()) {
            return Err(ValidationError::CompoundReferenceViolation);
        }
        if customer == Existence::Missing {
            return Err(ValidationError::CustomerReferenceViolation(customer_id));
        }
        if let Some((kind, id, _)) = resources.iter().find(|(_, _, e)| e.is_missing()) {
            return Err(ValidationError::ResourceReferenceViolation { kind: *kind, id: *id });
        }

        Ok(ValidatedBooking {
            id: exclude,
            booking: NewBooking {
                kind: candidate.kind,
                customer_id,
                resources: candidate.resources,
                date,
            },
        })
    }
}
