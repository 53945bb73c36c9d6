use std::collections::HashSet;
use std::io;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::engine::EngineError;
use crate::model::{AppointmentId, ArchivedAppointment};
use crate::wal::Wal;

/// Append-only store of concluded appointments.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Persist `record`. Writing an appointment id that is already archived
    /// is a successful no-op; returns whether anything was written.
    async fn append(&self, record: ArchivedAppointment) -> Result<bool, EngineError>;

    async fn list(&self) -> Result<Vec<ArchivedAppointment>, EngineError>;

    async fn len(&self) -> usize;
}

/// Log handle shared with the blocking pool; fsyncs never run on a runtime worker.
type SharedWal = Arc<std::sync::Mutex<Wal<ArchivedAppointment>>>;

struct Inner {
    wal: Option<SharedWal>,
    records: Vec<ArchivedAppointment>,
    ids: HashSet<AppointmentId>,
}

/// `HistoryStore` backed by its own log file, or by memory alone.
pub struct History {
    inner: Mutex<Inner>,
}

impl History {
    pub fn open(path: &Path) -> io::Result<Self> {
        let replayed = Wal::<ArchivedAppointment>::replay(path)?;
        let wal = Wal::open(path)?;
        let mut inner = Inner {
            wal: Some(Arc::new(std::sync::Mutex::new(wal))),
            records: Vec::with_capacity(replayed.len()),
            ids: HashSet::new(),
        };
        for record in replayed {
            if inner.ids.insert(record.appointment.id) {
                inner.records.push(record);
            }
        }
        tracing::info!(archived = inner.records.len(), "history log replayed");
        Ok(Self {
            inner: Mutex::new(inner),
        })
    }

    pub fn in_memory() -> Self {
        Self {
            inner: Mutex::new(Inner {
                wal: None,
                records: Vec::new(),
                ids: HashSet::new(),
            }),
        }
    }
}

#[async_trait]
impl HistoryStore for History {
    async fn append(&self, record: ArchivedAppointment) -> Result<bool, EngineError> {
        let mut inner = self.inner.lock().await;
        if inner.ids.contains(&record.appointment.id) {
            return Ok(false);
        }
        // A caller that times out here abandons the blocking write, which may
        // still land; replay keeps one copy per id.
        if let Some(wal) = inner.wal.clone() {
            let pending = record.clone();
            tokio::task::spawn_blocking(move || {
                let mut wal = wal
                    .lock()
                    .map_err(|_| io::Error::other("history log lock poisoned"))?;
                wal.append(&pending)
            })
            .await
            .map_err(|e| EngineError::Unavailable(format!("history write task: {e}")))?
            .map_err(|e| EngineError::Unavailable(format!("history write: {e}")))?;
        }
        inner.ids.insert(record.appointment.id);
        inner.records.push(record);
        Ok(true)
    }

    async fn list(&self) -> Result<Vec<ArchivedAppointment>, EngineError> {
        Ok(self.inner.lock().await.records.clone())
    }

    async fn len(&self) -> usize {
        self.inner.lock().await.records.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Appointment, Slot, parse_date};
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::path::PathBuf;

    fn test_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("agenda_test_history");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = std::fs::remove_file(&path);
        path
    }

    fn archived(id: AppointmentId) -> ArchivedAppointment {
        ArchivedAppointment {
            appointment: Appointment {
                id,
                client_name: "Bruno".into(),
                date: parse_date("2025-01-06").unwrap(),
                slot: Slot::parse("09:00:00").unwrap(),
                service_name: "Barba".into(),
                budget_value: Decimal::new(2500, 2),
            },
            archived_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_is_idempotent_per_id() {
        let history = History::in_memory();
        assert!(history.append(archived(1)).await.unwrap());
        assert!(!history.append(archived(1)).await.unwrap());
        assert!(history.append(archived(2)).await.unwrap());
        assert_eq!(history.len().await, 2);
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let path = test_path("reopen.wal");
        {
            let history = History::open(&path).unwrap();
            history.append(archived(10)).await.unwrap();
            history.append(archived(11)).await.unwrap();
        }

        let history = History::open(&path).unwrap();
        let ids: Vec<_> = history
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.appointment.id)
            .collect();
        assert_eq!(ids, vec![10, 11]);
        // Still idempotent after replay
        assert!(!history.append(archived(10)).await.unwrap());
    }

    #[tokio::test]
    async fn abandoned_append_leaves_one_record() {
        let path = test_path("abandoned.wal");
        let history = History::open(&path).unwrap();

        // Gives up before the blocking write reports back
        let _ = tokio::time::timeout(std::time::Duration::ZERO, history.append(archived(20))).await;
        history.append(archived(20)).await.unwrap();
        assert_eq!(history.len().await, 1);

        let reopened = History::open(&path).unwrap();
        let ids: Vec<_> = reopened
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.appointment.id)
            .collect();
        assert_eq!(ids, vec![20]);
    }
}
