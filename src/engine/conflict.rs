use chrono::NaiveDate;
use tracing::warn;

use crate::model::{BookingKind, Id};
use crate::store::EntityStore;

/// First booking of `kind` on `resource_id` that falls on `date`, ignoring the
/// booking whose id is `exclude`. Dates match by calendar-day equality.
///
/// Fails open: a store error is logged and reported as no conflict.
pub async fn find_date_conflict<S>(
    store: &S,
    kind: BookingKind,
    resource_id: Id,
    exclude: Option<Id>,
    date: NaiveDate,
) -> Option<Id>
where
    S: EntityStore + ?Sized,
{
    let bookings = match store.find_bookings_by_resource(kind, resource_id).await {
        Ok(b) => b,
        Err(e) => {
            metrics::counter!(crate::observability::STORE_FAILURES_TOTAL, "check" => "conflict")
                .increment(1);
            warn!(
                "{kind} scan for {} {resource_id} failed, assuming no conflict: {e}",
                kind.primary()
            );
            return None;
        }
    };
    bookings
        .iter()
        .filter(|b| Some(b.id) != exclude)
        .find(|b| b.date == date)
        .map(|b| b.id)
}

pub async fn has_date_conflict<S>(
    store: &S,
    kind: BookingKind,
    resource_id: Id,
    exclude: Option<Id>,
    date: NaiveDate,
) -> bool
where
    S: EntityStore + ?Sized,
{
    find_date_conflict(store, kind, resource_id, exclude, date).await.is_some()
}
