use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;

use crate::limits::*;
use crate::model::*;

use super::{EntityStore, StoreError};

/// One table of reference entities plus its natural-key index.
struct ReferenceTable {
    rows: DashMap<Id, Reference>,
    by_key: DashMap<String, Id>,
    next_id: AtomicU64,
}

impl ReferenceTable {
    fn new() -> Self {
        Self {
            rows: DashMap::new(),
            by_key: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn insert(&self, reference: Reference) {
        let id = reference.id();
        self.next_id.fetch_max(id + 1, Ordering::SeqCst);
        self.by_key.insert(reference.natural_key().to_string(), id);
        self.rows.insert(id, reference);
    }
}

pub struct InMemoryStore {
    customers: ReferenceTable,
    hotels: ReferenceTable,
    flights: ReferenceTable,
    taxis: ReferenceTable,
    bookings: DashMap<Id, Booking>,
    /// (kind, primary resource id) → booking ids
    by_resource: DashMap<(BookingKind, Id), Vec<Id>>,
    next_booking_id: AtomicU64,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            customers: ReferenceTable::new(),
            hotels: ReferenceTable::new(),
            flights: ReferenceTable::new(),
            taxis: ReferenceTable::new(),
            bookings: DashMap::new(),
            by_resource: DashMap::new(),
            next_booking_id: AtomicU64::new(1),
        }
    }

    fn table(&self, kind: EntityKind) -> &ReferenceTable {
        match kind {
            EntityKind::Customer => &self.customers,
            EntityKind::Hotel => &self.hotels,
            EntityKind::Flight => &self.flights,
            EntityKind::Taxi => &self.taxis,
        }
    }

    pub fn booking_count(&self) -> usize {
        self.bookings.len()
    }

    pub fn reference_count(&self, kind: EntityKind) -> usize {
        self.table(kind).rows.len()
    }

    // ── Id allocation ────────────────────────────────────────

    pub(crate) fn allocate_reference_id(&self, kind: EntityKind) -> Result<Id, StoreError> {
        let table = self.table(kind);
        if table.rows.len() >= MAX_ENTITIES_PER_KIND {
            return Err(StoreError::LimitExceeded("too many entities of one kind"));
        }
        Ok(table.next_id.fetch_add(1, Ordering::SeqCst))
    }

    pub(crate) fn allocate_booking_id(&self, booking: &NewBooking) -> Result<Id, StoreError> {
        if let Some(rid) = booking.resources.get(booking.kind.primary())
            && self
                .by_resource
                .get(&(booking.kind, rid))
                .is_some_and(|ids| ids.len() >= MAX_BOOKINGS_PER_RESOURCE)
        {
            return Err(StoreError::LimitExceeded("too many bookings on resource"));
        }
        Ok(self.next_booking_id.fetch_add(1, Ordering::SeqCst))
    }

    // ── Index maintenance ────────────────────────────────────

    fn index_booking(&self, booking: &Booking) {
        if let Some(rid) = booking.primary_resource() {
            self.by_resource.entry((booking.kind, rid)).or_default().push(booking.id);
        }
    }

    fn unindex_booking(&self, booking: &Booking) {
        let Some(rid) = booking.primary_resource() else {
            return;
        };
        let key = (booking.kind, rid);
        if let Some(mut ids) = self.by_resource.get_mut(&key) {
            ids.retain(|id| *id != booking.id);
        }
        self.by_resource.remove_if(&key, |_, ids| ids.is_empty());
    }

    // ── Event application ────────────────────────────────────

    /// Apply one event to the tables. Used for writes and for WAL replay.
    pub fn apply_event(&self, event: &Event) {
        match event {
            Event::CustomerRegistered(c) => self.customers.insert(Reference::Customer(c.clone())),
            Event::HotelRegistered(h) => self.hotels.insert(Reference::Hotel(h.clone())),
            Event::FlightRegistered(f) => self.flights.insert(Reference::Flight(f.clone())),
            Event::TaxiRegistered(t) => self.taxis.insert(Reference::Taxi(t.clone())),
            Event::BookingCreated(b) => {
                self.next_booking_id.fetch_max(b.id + 1, Ordering::SeqCst);
                if let Some(old) = self.bookings.insert(b.id, b.clone()) {
                    self.unindex_booking(&old);
                }
                self.index_booking(b);
            }
            Event::BookingReplaced(b) => {
                // A replace racing a delete loses: the booking stays deleted.
                let old = match self.bookings.get_mut(&b.id) {
                    Some(mut entry) => std::mem::replace(entry.value_mut(), b.clone()),
                    None => return,
                };
                self.unindex_booking(&old);
                self.index_booking(b);
            }
            Event::BookingDeleted { id } => {
                if let Some((_, old)) = self.bookings.remove(id) {
                    self.unindex_booking(&old);
                }
            }
            Event::BookingSequence { next } => {
                self.next_booking_id.fetch_max(*next, Ordering::SeqCst);
            }
        }
    }

    /// Minimal event list recreating the current state, for WAL compaction.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::new();
        let kinds = [EntityKind::Customer, EntityKind::Hotel, EntityKind::Flight, EntityKind::Taxi];
        for kind in kinds {
            let mut refs: Vec<Reference> =
                self.table(kind).rows.iter().map(|e| e.value().clone()).collect();
            refs.sort_by_key(Reference::id);
            events.extend(refs.into_iter().map(Event::registered));
        }
        let mut bookings: Vec<Booking> = self.bookings.iter().map(|e| e.value().clone()).collect();
        bookings.sort_by_key(|b| b.id);
        events.extend(bookings.into_iter().map(Event::BookingCreated));
        events.push(Event::BookingSequence {
            next: self.next_booking_id.load(Ordering::SeqCst),
        });
        events
    }

    fn sorted_bookings(&self, ids: impl IntoIterator<Item = Id>) -> Vec<Booking> {
        let mut out: Vec<Booking> = ids
            .into_iter()
            .filter_map(|id| self.bookings.get(&id).map(|e| e.value().clone()))
            .collect();
        out.sort_by_key(|b| b.id);
        out
    }
}

#[async_trait]
impl EntityStore for InMemoryStore {
    async fn find_reference(
        &self,
        kind: EntityKind,
        id: Id,
    ) -> Result<Option<Reference>, StoreError> {
        Ok(self.table(kind).rows.get(&id).map(|e| e.value().clone()))
    }

    async fn find_reference_by_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<Reference>, StoreError> {
        let table = self.table(kind);
        let id = match table.by_key.get(key) {
            Some(id) => *id,
            None => return Ok(None),
        };
        Ok(table.rows.get(&id).map(|e| e.value().clone()))
    }

    async fn list_references(&self, kind: EntityKind) -> Result<Vec<Reference>, StoreError> {
        let mut refs: Vec<Reference> =
            self.table(kind).rows.iter().map(|e| e.value().clone()).collect();
        refs.sort_by_key(Reference::id);
        Ok(refs)
    }

    async fn insert_reference(&self, new: NewReference) -> Result<Reference, StoreError> {
        let id = self.allocate_reference_id(new.kind())?;
        let reference = new.with_id(id);
        self.apply_event(&Event::registered(reference.clone()));
        Ok(reference)
    }

    async fn find_booking_by_id(&self, id: Id) -> Result<Option<Booking>, StoreError> {
        Ok(self.bookings.get(&id).map(|e| e.value().clone()))
    }

    async fn find_bookings_by_resource(
        &self,
        kind: BookingKind,
        resource_id: Id,
    ) -> Result<Vec<Booking>, StoreError> {
        let ids = self
            .by_resource
            .get(&(kind, resource_id))
            .map(|e| e.value().clone())
            .unwrap_or_default();
        Ok(self.sorted_bookings(ids))
    }

    async fn find_bookings_by_customer(&self, customer_id: Id) -> Result<Vec<Booking>, StoreError> {
        let ids: Vec<Id> = self
            .bookings
            .iter()
            .filter(|e| e.value().customer_id == customer_id)
            .map(|e| *e.key())
            .collect();
        Ok(self.sorted_bookings(ids))
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        let ids: Vec<Id> = self.bookings.iter().map(|e| *e.key()).collect();
        Ok(self.sorted_bookings(ids))
    }

    async fn persist(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let id = self.allocate_booking_id(&booking)?;
        let stored = booking.with_id(id);
        self.apply_event(&Event::BookingCreated(stored.clone()));
        Ok(stored)
    }

    async fn replace(&self, booking: Booking) -> Result<Booking, StoreError> {
        if !self.bookings.contains_key(&booking.id) {
            return Err(StoreError::Missing(booking.id));
        }
        self.apply_event(&Event::BookingReplaced(booking.clone()));
        Ok(booking)
    }

    async fn remove_booking(&self, id: Id) -> Result<Option<Booking>, StoreError> {
        let existing = self.bookings.get(&id).map(|e| e.value().clone());
        if existing.is_some() {
            self.apply_event(&Event::BookingDeleted { id });
        }
        Ok(existing)
    }
}
