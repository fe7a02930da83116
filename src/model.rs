use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier. Every table has its own sequence starting at 1.
pub type Id = u64;

/// The reference entities a booking can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Customer,
    Hotel,
    Flight,
    Taxi,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customer",
            EntityKind::Hotel => "hotel",
            EntityKind::Flight => "flight",
            EntityKind::Taxi => "taxi",
        }
    }

    /// Name of the foreign-key field on a booking that points at this kind.
    pub fn ref_field(&self) -> &'static str {
        match self {
            EntityKind::Customer => "customer_id",
            EntityKind::Hotel => "hotel_id",
            EntityKind::Flight => "flight_id",
            EntityKind::Taxi => "taxi_id",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource slot order used everywhere a booking's resources are walked.
pub const RESOURCE_KINDS: [EntityKind; 3] =
    [EntityKind::Hotel, EntityKind::Flight, EntityKind::Taxi];

/// Which table a booking lives in. Each kind decides which resource slots
/// apply and which one the date-conflict scan runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingKind {
    /// Customer + hotel, with optional flight and taxi.
    Generic,
    Hotel,
    Flight,
    Taxi,
}

impl BookingKind {
    pub const ALL: [BookingKind; 4] = [
        BookingKind::Generic,
        BookingKind::Hotel,
        BookingKind::Flight,
        BookingKind::Taxi,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingKind::Generic => "booking",
            BookingKind::Hotel => "booking_hotel",
            BookingKind::Flight => "booking_flight",
            BookingKind::Taxi => "booking_taxi",
        }
    }

    /// The resource the conflict scan runs on. Always a required slot.
    pub fn primary(&self) -> EntityKind {
        match self {
            BookingKind::Generic | BookingKind::Hotel => EntityKind::Hotel,
            BookingKind::Flight => EntityKind::Flight,
            BookingKind::Taxi => EntityKind::Taxi,
        }
    }

    /// Whether a resource slot may be filled for this kind.
    pub fn accepts(&self, resource: EntityKind) -> bool {
        match self {
            BookingKind::Generic => resource != EntityKind::Customer,
            _ => resource == self.primary(),
        }
    }
}

impl std::fmt::Display for BookingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource references carried by a booking, one optional slot per resource kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRefs {
    #[serde(default)]
    pub hotel_id: Option<Id>,
    #[serde(default)]
    pub flight_id: Option<Id>,
    #[serde(default)]
    pub taxi_id: Option<Id>,
}

impl ResourceRefs {
    pub fn hotel(id: Id) -> Self {
        Self { hotel_id: Some(id), ..Self::default() }
    }

    pub fn flight(id: Id) -> Self {
        Self { flight_id: Some(id), ..Self::default() }
    }

    pub fn taxi(id: Id) -> Self {
        Self { taxi_id: Some(id), ..Self::default() }
    }

    pub fn get(&self, kind: EntityKind) -> Option<Id> {
        match kind {
            EntityKind::Hotel => self.hotel_id,
            EntityKind::Flight => self.flight_id,
            EntityKind::Taxi => self.taxi_id,
            EntityKind::Customer => None,
        }
    }

    /// Filled slots in hotel, flight, taxi order.
    pub fn present(&self) -> impl Iterator<Item = (EntityKind, Id)> + '_ {
        RESOURCE_KINDS
            .iter()
            .filter_map(move |k| self.get(*k).map(|id| (*k, id)))
    }
}

/// A persisted booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    pub id: Id,
    pub kind: BookingKind,
    pub customer_id: Id,
    pub resources: ResourceRefs,
    pub date: NaiveDate,
}

impl Booking {
    /// The id this booking holds for a given entity kind, if any.
    pub fn reference(&self, kind: EntityKind) -> Option<Id> {
        match kind {
            EntityKind::Customer => Some(self.customer_id),
            other => self.resources.get(other),
        }
    }

    /// Primary resource id. Present on every booking that passed validation.
    pub fn primary_resource(&self) -> Option<Id> {
        self.resources.get(self.kind.primary())
    }
}

/// A booking that passed validation but has no id yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewBooking {
    pub kind: BookingKind,
    pub customer_id: Id,
    pub resources: ResourceRefs,
    pub date: NaiveDate,
}

impl NewBooking {
    pub fn with_id(self, id: Id) -> Booking {
        Booking {
            id,
            kind: self.kind,
            customer_id: self.customer_id,
            resources: self.resources,
            date: self.date,
        }
    }
}

/// Unvalidated booking input. Every field is optional so the field validator
/// can report all missing pieces at once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookingCandidate {
    #[serde(default)]
    pub id: Option<Id>,
    pub kind: BookingKind,
    #[serde(default)]
    pub customer_id: Option<Id>,
    #[serde(default)]
    pub resources: ResourceRefs,
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

impl BookingCandidate {
    pub fn new(
        kind: BookingKind,
        customer_id: Id,
        resources: ResourceRefs,
        date: NaiveDate,
    ) -> Self {
        Self {
            id: None,
            kind,
            customer_id: Some(customer_id),
            resources,
            date: Some(date),
        }
    }

    pub fn with_id(mut self, id: Id) -> Self {
        self.id = Some(id);
        self
    }

    pub fn reference(&self, kind: EntityKind) -> Option<Id> {
        match kind {
            EntityKind::Customer => self.customer_id,
            other => self.resources.get(other),
        }
    }
}

impl From<&Booking> for BookingCandidate {
    fn from(b: &Booking) -> Self {
        Self {
            id: Some(b.id),
            kind: b.kind,
            customer_id: Some(b.customer_id),
            resources: b.resources,
            date: Some(b.date),
        }
    }
}

// ── Reference entities ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Id,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hotel {
    pub id: Id,
    pub name: String,
    pub phone_number: String,
    pub postcode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    pub id: Id,
    pub flight_number: String,
    pub departure: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Taxi {
    pub id: Id,
    pub registration: String,
    pub seats: u32,
}

/// Registration payloads. Same fields as the entity minus the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCustomer {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone_number: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewHotel {
    pub name: String,
    pub phone_number: String,
    pub postcode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFlight {
    pub flight_number: String,
    pub departure: String,
    pub destination: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTaxi {
    pub registration: String,
    pub seats: u32,
}

/// Any reference entity, as returned by a lookup by kind and id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Reference {
    Customer(Customer),
    Hotel(Hotel),
    Flight(Flight),
    Taxi(Taxi),
}

impl Reference {
    pub fn id(&self) -> Id {
        match self {
            Reference::Customer(c) => c.id,
            Reference::Hotel(h) => h.id,
            Reference::Flight(f) => f.id,
            Reference::Taxi(t) => t.id,
        }
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Reference::Customer(_) => EntityKind::Customer,
            Reference::Hotel(_) => EntityKind::Hotel,
            Reference::Flight(_) => EntityKind::Flight,
            Reference::Taxi(_) => EntityKind::Taxi,
        }
    }
}

impl Reference {
    /// The uniquely-indexed business key of the entity: customer email, hotel
    /// phone number, flight number, taxi registration.
    pub fn natural_key(&self) -> &str {
        match self {
            Reference::Customer(c) => &c.email,
            Reference::Hotel(h) => &h.phone_number,
            Reference::Flight(f) => &f.flight_number,
            Reference::Taxi(t) => &t.registration,
        }
    }
}

/// Registration payload for any reference entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NewReference {
    Customer(NewCustomer),
    Hotel(NewHotel),
    Flight(NewFlight),
    Taxi(NewTaxi),
}

impl NewReference {
    pub fn kind(&self) -> EntityKind {
        match self {
            NewReference::Customer(_) => EntityKind::Customer,
            NewReference::Hotel(_) => EntityKind::Hotel,
            NewReference::Flight(_) => EntityKind::Flight,
            NewReference::Taxi(_) => EntityKind::Taxi,
        }
    }

    pub fn natural_key(&self) -> &str {
        match self {
            NewReference::Customer(c) => &c.email,
            NewReference::Hotel(h) => &h.phone_number,
            NewReference::Flight(f) => &f.flight_number,
            NewReference::Taxi(t) => &t.registration,
        }
    }

    /// Name of the field holding the natural key, for duplicate errors.
    pub fn natural_key_field(&self) -> &'static str {
        match self {
            NewReference::Customer(_) => "email",
            NewReference::Hotel(_) => "phone_number",
            NewReference::Flight(_) => "flight_number",
            NewReference::Taxi(_) => "registration",
        }
    }

    pub fn with_id(self, id: Id) -> Reference {
        match self {
            NewReference::Customer(c) => Reference::Customer(Customer {
                id,
                first_name: c.first_name,
                last_name: c.last_name,
                email: c.email,
                phone_number: c.phone_number,
            }),
            NewReference::Hotel(h) => Reference::Hotel(Hotel {
                id,
                name: h.name,
                phone_number: h.phone_number,
                postcode: h.postcode,
            }),
            NewReference::Flight(f) => Reference::Flight(Flight {
                id,
                flight_number: f.flight_number,
                departure: f.departure,
                destination: f.destination,
            }),
            NewReference::Taxi(t) => Reference::Taxi(Taxi {
                id,
                registration: t.registration,
                seats: t.seats,
            }),
        }
    }
}

/// The event types. This is the WAL record format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    CustomerRegistered(Customer),
    HotelRegistered(Hotel),
    FlightRegistered(Flight),
    TaxiRegistered(Taxi),
    BookingCreated(Booking),
    BookingReplaced(Booking),
    BookingDeleted { id: Id },
    /// Written by compaction so deleted booking ids are never handed out again.
    BookingSequence { next: Id },
}

impl Event {
    /// Wrap a stored reference entity in its registration event.
    pub fn registered(reference: Reference) -> Self {
        match reference {
            Reference::Customer(c) => Event::CustomerRegistered(c),
            Reference::Hotel(h) => Event::HotelRegistered(h),
            Reference::Flight(f) => Event::FlightRegistered(f),
            Reference::Taxi(t) => Event::TaxiRegistered(t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_resource_per_kind() {
        assert_eq!(BookingKind::Generic.primary(), EntityKind::Hotel);
        assert_eq!(BookingKind::Hotel.primary(), EntityKind::Hotel);
        assert_eq!(BookingKind::Flight.primary(), EntityKind::Flight);
        assert_eq!(BookingKind::Taxi.primary(), EntityKind::Taxi);
    }

    #[test]
    fn generic_accepts_every_resource_slot() {
        for k in RESOURCE_KINDS {
            assert!(BookingKind::Generic.accepts(k));
        }
        assert!(!BookingKind::Generic.accepts(EntityKind::Customer));
        assert!(BookingKind::Taxi.accepts(EntityKind::Taxi));
        assert!(!BookingKind::Taxi.accepts(EntityKind::Hotel));
        assert!(!BookingKind::Hotel.accepts(EntityKind::Flight));
    }

    #[test]
    fn present_refs_walk_in_slot_order() {
        let refs = ResourceRefs {
            hotel_id: Some(1),
            flight_id: None,
            taxi_id: Some(3),
        };
        let present: Vec<_> = refs.present().collect();
        assert_eq!(present, vec![(EntityKind::Hotel, 1), (EntityKind::Taxi, 3)]);
    }

    #[test]
    fn candidate_json_defaults_missing_fields() {
        let json = r#"{"kind":"booking_taxi","customer_id":4,"resources":{"taxi_id":9},"date":"2030-01-02"}"#;
        // kind uses the snake_case variant name, not the table name
        assert!(serde_json::from_str::<BookingCandidate>(json).is_err());

        let json = r#"{"kind":"taxi","customer_id":4,"resources":{"taxi_id":9},"date":"2030-01-02"}"#;
        let c: BookingCandidate = serde_json::from_str(json).unwrap();
        assert_eq!(c.kind, BookingKind::Taxi);
        assert_eq!(c.customer_id, Some(4));
        assert_eq!(c.resources, ResourceRefs::taxi(9));
        assert_eq!(c.date, NaiveDate::from_ymd_opt(2030, 1, 2));
        assert_eq!(c.id, None);

        let bare: BookingCandidate = serde_json::from_str(r#"{"kind":"hotel"}"#).unwrap();
        assert_eq!(bare.customer_id, None);
        assert_eq!(bare.resources, ResourceRefs::default());
        assert_eq!(bare.date, None);
    }
}
