use tracing::warn;

use crate::model::{EntityKind, Id};
use crate::store::EntityStore;

/// Result of looking up a referenced entity on behalf of a booking that may
/// already be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Existence {
    /// No entity with that id, or the lookup failed.
    Missing,
    /// Found, and the booking being updated already references it.
    ExistsSameRecord,
    ExistsDifferentRecord,
}

impl Existence {
    /// False when missing or already referenced by the booking being updated.
    pub fn exists(self) -> bool {
        self == Existence::ExistsDifferentRecord
    }

    pub fn is_missing(self) -> bool {
        self == Existence::Missing
    }
}

/// Look up `kind` by `ref_id`. When `exclude_booking` is given, a found entity
/// that the stored booking under that id already references counts as the
/// same record.
///
/// A store failure on the entity lookup is reported as `Missing`. A failure on
/// the booking lookup is reported as `ExistsDifferentRecord`.
pub async fn check<S>(
    store: &S,
    kind: EntityKind,
    ref_id: Id,
    exclude_booking: Option<Id>,
) -> Existence
where
    S: EntityStore + ?Sized,
{
    match store.find_reference(kind, ref_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Existence::Missing,
        Err(e) => {
            store_failure("existence");
            warn!("{kind} {ref_id} lookup failed, treating as missing: {e}");
            return Existence::Missing;
        }
    }
    let Some(booking_id) = exclude_booking else {
        return Existence::ExistsDifferentRecord;
    };
    match store.find_booking_by_id(booking_id).await {
        Ok(Some(current)) if current.reference(kind) == Some(ref_id) => Existence::ExistsSameRecord,
        Ok(_) => Existence::ExistsDifferentRecord,
        Err(e) => {
            store_failure("existence");
            warn!("booking {booking_id} lookup failed while checking {kind} {ref_id}: {e}");
            Existence::ExistsDifferentRecord
        }
    }
}

fn store_failure(check: &'static str) {
    metrics::counter!(crate::observability::STORE_FAILURES_TOTAL, "check" => check).increment(1);
}

/// `check` collapsed to the boolean form: true iff a different record exists.
pub async fn exists<S>(store: &S, kind: EntityKind, ref_id: Id, exclude_booking: Option<Id>) -> bool
where
    S: EntityStore + ?Sized,
{
    check(store, kind, ref_id, exclude_booking).await.exists()
}
