mod durable;
mod memory;

pub use durable::WalStore;
pub use memory::InMemoryStore;

use async_trait::async_trait;

use crate::model::*;

#[derive(Debug)]
pub enum StoreError {
    /// Write-ahead log append or flush failed.
    Wal(String),
    /// `replace` was called for a booking that is not stored.
    Missing(Id),
    LimitExceeded(&'static str),
    /// The backing store could not serve the request at all.
    Unavailable(String),
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Wal(e) => write!(f, "WAL error: {e}"),
            StoreError::Missing(id) => write!(f, "no stored booking with id {id}"),
            StoreError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            StoreError::Unavailable(e) => write!(f, "store unavailable: {e}"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Repository interface the booking engine reads and writes through.
///
/// Lookups return `Ok(None)` for "not found"; `Err` is reserved for the store
/// itself failing. Implementations must be safe for concurrent reads.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn find_reference(&self, kind: EntityKind, id: Id)
    -> Result<Option<Reference>, StoreError>;

    /// Lookup by the entity's unique business key (see `Reference::natural_key`).
    async fn find_reference_by_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<Reference>, StoreError>;

    /// All entities of a kind, ordered by id.
    async fn list_references(&self, kind: EntityKind) -> Result<Vec<Reference>, StoreError>;

    async fn insert_reference(&self, new: NewReference) -> Result<Reference, StoreError>;

    async fn find_booking_by_id(&self, id: Id) -> Result<Option<Booking>, StoreError>;

    /// Bookings of `kind` whose primary resource is `resource_id`, ordered by id.
    async fn find_bookings_by_resource(
        &self,
        kind: BookingKind,
        resource_id: Id,
    ) -> Result<Vec<Booking>, StoreError>;

    async fn find_bookings_by_customer(&self, customer_id: Id) -> Result<Vec<Booking>, StoreError>;

    /// All bookings, ordered by id.
    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError>;

    /// Insert a validated booking; the store assigns the id.
    async fn persist(&self, booking: NewBooking) -> Result<Booking, StoreError>;

    /// Overwrite the stored booking with the same id.
    async fn replace(&self, booking: Booking) -> Result<Booking, StoreError>;

    async fn remove_booking(&self, id: Id) -> Result<Option<Booking>, StoreError>;
}
