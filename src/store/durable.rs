use std::io;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc, oneshot};
use tracing::info;

use crate::model::*;
use crate::wal::Wal;

use super::{EntityStore, InMemoryStore, StoreError};

enum WalCommand {
    Append {
        event: Event,
        response: oneshot::Sender<io::Result<()>>,
    },
    Compact {
        events: Vec<Event>,
        response: oneshot::Sender<io::Result<()>>,
    },
    AppendsSinceCompact {
        response: oneshot::Sender<u64>,
    },
}

type PendingAppend = (Event, oneshot::Sender<io::Result<()>>);

/// Background task that owns the WAL. Appends that queue up while a flush is
/// in progress are committed together with a single fsync.
async fn wal_writer_loop(mut wal: Wal, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        let (event, response) = match cmd {
            WalCommand::Append { event, response } => (event, response),
            other => {
                handle_control(&mut wal, other);
                continue;
            }
        };
        let mut batch = vec![(event, response)];
        let mut deferred = None;
        loop {
            match rx.try_recv() {
                Ok(WalCommand::Append { event, response }) => batch.push((event, response)),
                Ok(other) => {
                    deferred = Some(other);
                    break;
                }
                Err(_) => break,
            }
        }
        commit_batch(&mut wal, batch);
        if let Some(cmd) = deferred {
            handle_control(&mut wal, cmd);
        }
    }
}

fn commit_batch(wal: &mut Wal, batch: Vec<PendingAppend>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let started = std::time::Instant::now();

    let mut result = Ok(());
    for (event, _) in &batch {
        if let Err(e) = wal.append_buffered(event) {
            result = Err(e);
            break;
        }
    }
    // Flush even after a failed append so half-written bytes are not carried
    // into the next batch.
    let flushed = wal.flush_sync();
    if result.is_ok() {
        result = flushed;
    }

    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(started.elapsed().as_secs_f64());

    for (_, tx) in batch {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn handle_control(wal: &mut Wal, cmd: WalCommand) {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result =
                Wal::write_compact_file(wal.path(), &events).and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the writer loop"),
    }
}

/// Entity store whose writes are logged to a WAL before they become visible.
/// State lives in an `InMemoryStore` rebuilt from the log on open.
pub struct WalStore {
    memory: InMemoryStore,
    wal_tx: mpsc::Sender<WalCommand>,
    /// Writes hold it shared from append until the change is applied;
    /// compaction holds it exclusively from snapshot until the file swap.
    compaction: RwLock<()>,
}

impl WalStore {
    /// Replay the log at `path` and start the writer task. Must be called from
    /// inside a tokio runtime.
    pub fn open(path: PathBuf) -> io::Result<Self> {
        let events = Wal::replay(&path)?;
        let memory = InMemoryStore::new();
        for event in &events {
            memory.apply_event(event);
        }
        info!(
            "replayed {} WAL events from {}: {} bookings",
            events.len(),
            path.display(),
            memory.booking_count()
        );

        let wal = Wal::open(&path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));
        Ok(Self { memory, wal_tx, compaction: RwLock::new(()) })
    }

    /// Read-only view of the replayed state.
    pub fn memory(&self) -> &InMemoryStore {
        &self.memory
    }

    async fn wal_append(&self, event: &Event) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Append { event: event.clone(), response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    /// Log first, then make the change visible.
    async fn log_and_apply(&self, event: Event) -> Result<(), StoreError> {
        let _writing = self.compaction.read().await;
        self.wal_append(&event).await?;
        self.memory.apply_event(&event);
        Ok(())
    }

    /// Rewrite the WAL with the minimal events recreating the current state.
    pub async fn compact(&self) -> Result<(), StoreError> {
        let _exclusive = self.compaction.write().await;
        let events = self.memory.snapshot_events();
        let (tx, rx) = oneshot::channel();
        self.wal_tx
            .send(WalCommand::Compact { events, response: tx })
            .await
            .map_err(|_| StoreError::Wal("WAL writer shut down".into()))?;
        rx.await
            .map_err(|_| StoreError::Wal("WAL writer dropped response".into()))?
            .map_err(|e| StoreError::Wal(e.to_string()))
    }

    pub async fn appends_since_compact(&self) -> u64 {
        let (tx, rx) = oneshot::channel();
        if self.wal_tx.send(WalCommand::AppendsSinceCompact { response: tx }).await.is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }
}

#[async_trait]
impl EntityStore for WalStore {
    async fn find_reference(
        &self,
        kind: EntityKind,
        id: Id,
    ) -> Result<Option<Reference>, StoreError> {
        self.memory.find_reference(kind, id).await
    }

    async fn find_reference_by_key(
        &self,
        kind: EntityKind,
        key: &str,
    ) -> Result<Option<Reference>, StoreError> {
        self.memory.find_reference_by_key(kind, key).await
    }

    async fn list_references(&self, kind: EntityKind) -> Result<Vec<Reference>, StoreError> {
        self.memory.list_references(kind).await
    }

    async fn insert_reference(&self, new: NewReference) -> Result<Reference, StoreError> {
        let id = self.memory.allocate_reference_id(new.kind())?;
        let reference = new.with_id(id);
        self.log_and_apply(Event::registered(reference.clone())).await?;
        Ok(reference)
    }

    async fn find_booking_by_id(&self, id: Id) -> Result<Option<Booking>, StoreError> {
        self.memory.find_booking_by_id(id).await
    }

    async fn find_bookings_by_resource(
        &self,
        kind: BookingKind,
        resource_id: Id,
    ) -> Result<Vec<Booking>, StoreError> {
        self.memory.find_bookings_by_resource(kind, resource_id).await
    }

    async fn find_bookings_by_customer(&self, customer_id: Id) -> Result<Vec<Booking>, StoreError> {
        self.memory.find_bookings_by_customer(customer_id).await
    }

    async fn list_bookings(&self) -> Result<Vec<Booking>, StoreError> {
        self.memory.list_bookings().await
    }

    async fn persist(&self, booking: NewBooking) -> Result<Booking, StoreError> {
        let id = self.memory.allocate_booking_id(&booking)?;
        let stored = booking.with_id(id);
        self.log_and_apply(Event::BookingCreated(stored.clone())).await?;
        Ok(stored)
    }

    async fn replace(&self, booking: Booking) -> Result<Booking, StoreError> {
        if self.memory.find_booking_by_id(booking.id).await?.is_none() {
            return Err(StoreError::Missing(booking.id));
        }
        self.log_and_apply(Event::BookingReplaced(booking.clone())).await?;
        Ok(booking)
    }

    async fn remove_booking(&self, id: Id) -> Result<Option<Booking>, StoreError> {
        let existing = match self.memory.find_booking_by_id(id).await? {
            Some(b) => b,
            None => return Ok(None),
        };
        self.log_and_apply(Event::BookingDeleted { id }).await?;
        Ok(Some(existing))
    }
}
