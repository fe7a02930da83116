use crate::model::*;

use super::{Engine, EngineError};

impl Engine {
    pub async fn get_booking(&self, id: Id) -> Result<Booking, EngineError> {
        self.store
            .find_booking_by_id(id)
            .await?
            .ok_or(EngineError::NotFound { entity: "booking", id })
    }

    /// All bookings ordered by id, optionally limited to one booking table.
    pub async fn list_bookings(
        &self,
        kind: Option<BookingKind>,
    ) -> Result<Vec<Booking>, EngineError> {
        let mut bookings = self.store.list_bookings().await?;
        if let Some(kind) = kind {
            bookings.retain(|b| b.kind == kind);
        }
        Ok(bookings)
    }

    /// Bookings of a customer. The customer must exist.
    pub async fn bookings_for_customer(
        &self,
        customer_id: Id,
    ) -> Result<Vec<Booking>, EngineError> {
        self.get_reference(EntityKind::Customer, customer_id).await?;
        Ok(self.store.find_bookings_by_customer(customer_id).await?)
    }

    /// The calendar of one resource in one booking table. The resource must
    /// be of the kind the table books.
    pub async fn bookings_for_resource(
        &self,
        kind: BookingKind,
        resource_id: Id,
    ) -> Result<Vec<Booking>, EngineError> {
        self.get_reference(kind.primary(), resource_id).await?;
        Ok(self.store.find_bookings_by_resource(kind, resource_id).await?)
    }

    pub async fn get_reference(&self, kind: EntityKind, id: Id) -> Result<Reference, EngineError> {
        self.store
            .find_reference(kind, id)
            .await?
            .ok_or(EngineError::NotFound { entity: kind.as_str(), id })
    }

    pub async fn list_references(&self, kind: EntityKind) -> Result<Vec<Reference>, EngineError> {
        Ok(self.store.list_references(kind).await?)
    }
}
