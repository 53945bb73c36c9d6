mod availability;
mod error;
mod mutations;
mod queries;
mod validate;

pub use availability::{available_slots, candidate_dates, is_weekend};
pub use error::EngineError;

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use chrono::NaiveDate;
use dashmap::DashMap;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock, mpsc, oneshot};

use crate::catalog::Catalog;
use crate::model::*;
use crate::wal::Wal;

pub type SharedDayState = Arc<RwLock<DayState>>;

// ── Group-commit WAL channel ─────────────────────────────

pub(super) enum WalCommand {
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
    Close {
        response: oneshot::Sender<io::Result<()>>,
    },
}

/// Background task that owns the WAL and batches appends for group commit.
/// 1. Block until the first Append arrives.
/// 2. Buffer it (no fsync).
/// 3. Drain all immediately available Appends (the batch window).
/// 4. Single flush_sync for the whole batch.
/// 5. Respond to all senders.
async fn wal_writer_loop(mut wal: Wal<Event>, mut rx: mpsc::Receiver<WalCommand>) {
    while let Some(cmd) = rx.recv().await {
        match cmd {
            WalCommand::Append { event, response } => {
                let mut batch = vec![(event, response)];
                let mut pending = None;

                loop {
                    match rx.try_recv() {
                        Ok(WalCommand::Append { event, response }) => {
                            batch.push((event, response));
                        }
                        Ok(other) => {
                            pending = Some(other);
                            break;
                        }
                        Err(_) => break, // channel empty, flush batch
                    }
                }

                commit_batch(&mut wal, &mut batch);
                if let Some(other) = pending
                    && !handle_non_append(&mut wal, other)
                {
                    return;
                }
            }
            other => {
                if !handle_non_append(&mut wal, other) {
                    return;
                }
            }
        }
    }
}

fn commit_batch(wal: &mut Wal<Event>, batch: &mut Vec<(Event, oneshot::Sender<io::Result<()>>)>) {
    metrics::histogram!(crate::observability::WAL_FLUSH_BATCH_SIZE).record(batch.len() as f64);
    let flush_start = std::time::Instant::now();
    let result = flush_batch(wal, batch);
    metrics::histogram!(crate::observability::WAL_FLUSH_DURATION_SECONDS)
        .record(flush_start.elapsed().as_secs_f64());
    for (_, tx) in batch.drain(..) {
        let r = match &result {
            Ok(()) => Ok(()),
            Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
        };
        let _ = tx.send(r);
    }
}

fn flush_batch(
    wal: &mut Wal<Event>,
    batch: &[(Event, oneshot::Sender<io::Result<()>>)],
) -> io::Result<()> {
    let mut append_err: Option<io::Error> = None;
    for (event, _) in batch {
        if let Err(e) = wal.append_buffered(event) {
            append_err = Some(e);
            break;
        }
    }
    // Always flush, even on append error, so partially buffered bytes
    // don't leak into the next batch (callers were told this batch failed).
    let flush_err = wal.flush_sync().err();
    match (append_err, flush_err) {
        (Some(e), _) | (None, Some(e)) => Err(e),
        (None, None) => Ok(()),
    }
}

/// Returns false when the writer should stop.
fn handle_non_append(wal: &mut Wal<Event>, cmd: WalCommand) -> bool {
    match cmd {
        WalCommand::Compact { events, response } => {
            let result = Wal::write_compact_file(wal.path(), &events)
                .and_then(|()| wal.swap_compact_file());
            let _ = response.send(result);
            true
        }
        WalCommand::AppendsSinceCompact { response } => {
            let _ = response.send(wal.appends_since_compact());
            true
        }
        WalCommand::Close { response } => {
            let _ = response.send(wal.flush_sync());
            false
        }
        WalCommand::Append { .. } => unreachable!("appends are batched by the caller"),
    }
}

/// The appointment repository.
///
/// Active appointments are grouped per calendar day behind a `RwLock`; every
/// mutation on a day holds that day's write lock until its log append is
/// applied, which makes the (date, slot) check-and-insert atomic.
pub struct Engine {
    pub(super) days: DashMap<NaiveDate, SharedDayState>,
    /// Reverse lookup: appointment id → day.
    pub(super) id_to_date: Arc<DashMap<AppointmentId, NaiveDate>>,
    pub(super) next_id: AtomicU64,
    pub(super) catalog: Arc<Catalog>,
    pub(super) storage_timeout: Duration,
    /// Mutations hold it shared; compaction holds it exclusively so its
    /// snapshot cannot miss a concurrent append.
    pub(super) compaction_gate: Arc<RwLock<()>>,
    pub(super) wal_tx: mpsc::Sender<WalCommand>,
}

/// Apply an event to a day (caller holds the day's lock).
fn apply_to_day(
    day: &mut DayState,
    event: &Event,
    id_index: &DashMap<AppointmentId, NaiveDate>,
) {
    match event {
        Event::Booked(appointment) => {
            id_index.insert(appointment.id, appointment.date);
            day.insert(appointment.clone());
        }
        Event::Updated {
            id,
            client_name,
            service_name,
            budget_value,
            ..
        } => {
            if let Some(a) = day.get_mut(*id) {
                a.client_name = client_name.clone();
                a.service_name = service_name.clone();
                a.budget_value = *budget_value;
            }
        }
        Event::Removed { id, .. } => {
            day.remove(*id);
            id_index.remove(id);
        }
        Event::IdsReserved { .. } => {}
    }
}

impl Engine {
    /// Replay the log at `wal_path` and start the group-commit writer.
    /// Must be called inside a tokio runtime.
    pub fn open(wal_path: &Path, catalog: Arc<Catalog>, storage_timeout: Duration) -> io::Result<Self> {
        let events = Wal::<Event>::replay(wal_path)?;
        let wal = Wal::open(wal_path)?;
        let (wal_tx, wal_rx) = mpsc::channel(4096);
        tokio::spawn(wal_writer_loop(wal, wal_rx));

        let id_to_date = Arc::new(DashMap::new());
        let mut next_id: AppointmentId = 1;
        let mut replayed: HashMap<NaiveDate, DayState> = HashMap::new();

        for event in &events {
            match event {
                Event::Booked(a) => next_id = next_id.max(a.id + 1),
                Event::IdsReserved { next_id: reserved } => next_id = next_id.max(*reserved),
                _ => {}
            }
            let date = match event {
                Event::Booked(a) => a.date,
                Event::Updated { date, .. } | Event::Removed { date, .. } => *date,
                Event::IdsReserved { .. } => continue,
            };
            let day = replayed
                .entry(date)
                .or_insert_with(|| DayState::new(date));
            if let Event::Booked(a) = event
                && let Some(holder) = day.slot_holder(a.slot)
            {
                tracing::warn!(
                    id = a.id,
                    holder,
                    date = %a.date,
                    slot = %a.slot,
                    "replay: slot already held, dropping booking"
                );
                continue;
            }
            apply_to_day(day, event, &id_to_date);
        }

        let days = DashMap::new();
        for (date, day) in replayed {
            if !day.is_empty() {
                days.insert(date, Arc::new(RwLock::new(day)));
            }
        }

        tracing::info!(
            events = events.len(),
            active = id_to_date.len(),
            next_id,
            "appointment log replayed"
        );

        Ok(Self {
            days,
            id_to_date,
            next_id: AtomicU64::new(next_id),
            catalog,
            storage_timeout,
            compaction_gate: Arc::new(RwLock::new(())),
            wal_tx,
        })
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Queue a command for the writer. Bounded by the storage timeout; a send
    /// that times out never reaches the writer.
    async fn queue(&self, cmd: WalCommand) -> Result<(), EngineError> {
        match tokio::time::timeout(self.storage_timeout, self.wal_tx.send(cmd)).await {
            Err(_) => Err(EngineError::Unavailable("storage timeout".into())),
            Ok(Err(_)) => Err(EngineError::Unavailable("log writer shut down".into())),
            Ok(Ok(())) => Ok(()),
        }
    }

    /// Queue a command and await the writer's answer. Once queued the answer
    /// is always awaited: the writer acts on it either way.
    async fn wal_request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> WalCommand,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.queue(build(tx)).await?;
        rx.await
            .map_err(|_| EngineError::Unavailable("log writer dropped response".into()))
    }

    /// Log `event`, then apply it to `day`, handing the day guard back.
    ///
    /// After the event is queued, waiting for the fsync and applying run on a
    /// separate task that owns both guards. A caller that stops waiting (a
    /// timeout, a dropped request) cannot leave a logged event unapplied or
    /// release the day before it is.
    pub(super) async fn persist_and_apply(
        &self,
        gate: OwnedRwLockReadGuard<()>,
        mut day: OwnedRwLockWriteGuard<DayState>,
        event: Event,
    ) -> Result<OwnedRwLockWriteGuard<DayState>, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.queue(WalCommand::Append {
            event: event.clone(),
            response: tx,
        })
        .await?;

        let id_index = self.id_to_date.clone();
        let commit = tokio::spawn(async move {
            let _gate = gate;
            rx.await
                .map_err(|_| EngineError::Unavailable("log writer dropped response".into()))?
                .map_err(|e| EngineError::Unavailable(e.to_string()))?;
            apply_to_day(&mut day, &event, &id_index);
            metrics::gauge!(crate::observability::APPOINTMENTS_ACTIVE)
                .set(id_index.len() as f64);
            Ok::<_, EngineError>(day)
        });
        commit
            .await
            .map_err(|e| EngineError::Unavailable(format!("commit task failed: {e}")))?
    }

    pub(super) fn get_day(&self, date: &NaiveDate) -> Option<SharedDayState> {
        self.days.get(date).map(|e| e.value().clone())
    }

    pub(super) fn day_or_insert(&self, date: NaiveDate) -> SharedDayState {
        self.days
            .entry(date)
            .or_insert_with(|| Arc::new(RwLock::new(DayState::new(date))))
            .value()
            .clone()
    }

    /// Lookup id → day, acquire the day's write lock, and confirm the
    /// appointment is still there once the lock is held.
    pub(super) async fn resolve_write(
        &self,
        id: AppointmentId,
    ) -> Result<OwnedRwLockWriteGuard<DayState>, EngineError> {
        let date = self
            .id_to_date
            .get(&id)
            .map(|e| *e.value())
            .ok_or(EngineError::NotFound(id))?;
        let day = self.get_day(&date).ok_or(EngineError::NotFound(id))?;
        let guard = day.write_owned().await;
        if guard.get(id).is_none() {
            return Err(EngineError::NotFound(id));
        }
        Ok(guard)
    }

    pub(super) fn allocate_id(&self) -> AppointmentId {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }

    /// Flush and stop the log writer. Later writes fail with `Unavailable`.
    pub async fn close(&self) -> Result<(), EngineError> {
        self.wal_request(|response| WalCommand::Close { response })
            .await?
            .map_err(|e| EngineError::Unavailable(e.to_string()))
    }
}
