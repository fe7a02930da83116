mod clock;
mod conflict;
mod error;
mod existence;
mod fields;
mod mutations;
mod queries;
mod validator;

pub use clock::{Clock, FixedClock, SystemClock};
pub use conflict::{find_date_conflict, has_date_conflict};
pub use error::{EngineError, FieldViolation, ValidationError};
pub use existence::{exists, Existence};
pub use fields::{booking_violations, registration_violations, MSG_FUTURE_DATE, MSG_REQUIRED};
pub use validator::{Mode, ValidatedBooking, Validator};

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::model::*;
use crate::store::EntityStore;

/// Calendar a booking occupies: its table plus its primary resource.
pub type CalendarKey = (BookingKind, Id);

/// Booking service: validation plus the writes around it.
///
/// Every booking write holds the mutex of each calendar it touches from
/// validation until the store call returns, so two writers can never both
/// pass the conflict scan for the same resource and date.
pub struct Engine {
    store: Arc<dyn EntityStore>,
    validator: Validator,
    calendars: DashMap<CalendarKey, Arc<Mutex<()>>>,
    /// Serializes registrations so natural-key uniqueness holds.
    registrations: Mutex<()>,
}

impl Engine {
    pub fn new(store: Arc<dyn EntityStore>, clock: Arc<dyn Clock>) -> Self {
        let validator = Validator::new(store.clone(), clock);
        Self {
            store,
            validator,
            calendars: DashMap::new(),
            registrations: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Acquire calendar locks in sorted order to prevent deadlocks.
    pub(super) async fn lock_calendars(&self, mut keys: Vec<CalendarKey>) -> CalendarLocks<'_> {
        keys.sort();
        keys.dedup();
        let mut guards = Vec::with_capacity(keys.len());
        for &key in &keys {
            let lock = self.calendars.entry(key).or_default().clone();
            guards.push(lock.lock_owned().await);
        }
        CalendarLocks { calendars: &self.calendars, keys, guards }
    }
}

/// Held calendar locks. On drop, a calendar's entry is evicted once no other
/// writer holds or waits on it.
pub(super) struct CalendarLocks<'a> {
    calendars: &'a DashMap<CalendarKey, Arc<Mutex<()>>>,
    keys: Vec<CalendarKey>,
    guards: Vec<OwnedMutexGuard<()>>,
}

impl Drop for CalendarLocks<'_> {
    fn drop(&mut self) {
        self.guards.clear();
        for key in &self.keys {
            self.calendars.remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        }
    }
}

/// Calendar of a candidate, if it names its primary resource.
fn candidate_calendar(candidate: &BookingCandidate) -> Option<CalendarKey> {
    candidate
        .resources
        .get(candidate.kind.primary())
        .map(|id| (candidate.kind, id))
}

fn booking_calendar(booking: &Booking) -> Option<CalendarKey> {
    booking.primary_resource().map(|id| (booking.kind, id))
}
