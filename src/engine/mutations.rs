use tracing::info;

use crate::model::*;
use crate::store::StoreError;

use super::fields::registration_violations;
use super::validator::Mode;
use super::{booking_calendar, candidate_calendar, Engine, EngineError, ValidationError};

fn record_write(op: &'static str) {
    metrics::counter!(crate::observability::BOOKING_WRITES_TOTAL, "op" => op).increment(1);
}

impl Engine {
    pub async fn create_booking(
        &self,
        candidate: BookingCandidate,
    ) -> Result<Booking, EngineError> {
        let _guards = self
            .lock_calendars(candidate_calendar(&candidate).into_iter().collect())
            .await;

        let validated = self.validator.validate_and_prepare(&candidate, Mode::Create).await?;
        let (_, new) = validated.into_parts();
        let booking = self.store.persist(new).await?;

        record_write("create");
        info!("{} {} created for customer {}", booking.kind, booking.id, booking.customer_id);
        Ok(booking)
    }

    /// Replace the booking stored under `path_id`. The id itself is read-only:
    /// a body carrying a different id is refused before anything is looked up.
    pub async fn update_booking(
        &self,
        path_id: Id,
        mut candidate: BookingCandidate,
    ) -> Result<Booking, EngineError> {
        if let Some(body_id) = candidate.id
            && body_id != path_id
        {
            return Err(EngineError::IdMismatch { path_id, body_id });
        }
        let current = self
            .store
            .find_booking_by_id(path_id)
            .await?
            .ok_or(EngineError::NotFound { entity: "booking", id: path_id })?;
        if current.kind != candidate.kind {
            return Err(EngineError::KindMismatch { id: path_id });
        }
        candidate.id = Some(path_id);

        let keys = booking_calendar(&current)
            .into_iter()
            .chain(candidate_calendar(&candidate))
            .collect();
        let _guards = self.lock_calendars(keys).await;

        let validated = self.validator.validate_and_prepare(&candidate, Mode::Update).await?;
        let (_, new) = validated.into_parts();
        let booking = match self.store.replace(new.with_id(path_id)).await {
            Ok(b) => b,
            Err(StoreError::Missing(id)) => {
                return Err(EngineError::NotFound { entity: "booking", id });
            }
            Err(e) => return Err(e.into()),
        };

        record_write("update");
        info!("{} {} updated", booking.kind, booking.id);
        Ok(booking)
    }

    pub async fn delete_booking(&self, id: Id) -> Result<Booking, EngineError> {
        let current = self
            .store
            .find_booking_by_id(id)
            .await?
            .ok_or(EngineError::NotFound { entity: "booking", id })?;
        let _guards = self.lock_calendars(booking_calendar(&current).into_iter().collect()).await;

        let removed = self
            .store
            .remove_booking(id)
            .await?
            .ok_or(EngineError::NotFound { entity: "booking", id })?;

        record_write("delete");
        info!("{} {} deleted", removed.kind, removed.id);
        Ok(removed)
    }

    /// Register a customer, hotel, flight or taxi. Format rules are checked
    /// first, then uniqueness of the entity's natural key.
    pub async fn register(&self, new: NewReference) -> Result<Reference, EngineError> {
        let violations = registration_violations(&new);
        if !violations.is_empty() {
            return Err(ValidationError::FieldViolations(violations).into());
        }

        let _guard = self.registrations.lock().await;
        let kind = new.kind();
        if self.store.find_reference_by_key(kind, new.natural_key()).await?.is_some() {
            return Err(EngineError::DuplicateField {
                field: new.natural_key_field(),
                value: new.natural_key().to_string(),
            });
        }
        let reference = self.store.insert_reference(new).await?;

        metrics::counter!(crate::observability::REGISTRATIONS_TOTAL, "kind" => kind.as_str())
            .increment(1);
        info!("{kind} {} registered", reference.id());
        Ok(reference)
    }

    pub async fn register_customer(&self, new: NewCustomer) -> Result<Reference, EngineError> {
        self.register(NewReference::Customer(new)).await
    }

    pub async fn register_hotel(&self, new: NewHotel) -> Result<Reference, EngineError> {
        self.register(NewReference::Hotel(new)).await
    }

    pub async fn register_flight(&self, new: NewFlight) -> Result<Reference, EngineError> {
        self.register(NewReference::Flight(new)).await
    }

    pub async fn register_taxi(&self, new: NewTaxi) -> Result<Reference, EngineError> {
        self.register(NewReference::Taxi(new)).await
    }

    /// Reference entities are permanent; this only tells a missing id apart
    /// from an existing one.
    pub async fn delete_reference(&self, kind: EntityKind, id: Id) -> Result<(), EngineError> {
        match self.store.find_reference(kind, id).await? {
            None => Err(EngineError::NotFound { entity: kind.as_str(), id }),
            Some(_) => Err(EngineError::Undeletable(kind)),
        }
    }
}
