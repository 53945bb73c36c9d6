use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Days, Local, NaiveDate, Utc};
use tokio::time::{MissedTickBehavior, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::engine::{Engine, EngineError};
use crate::history::HistoryStore;
use crate::model::ArchivedAppointment;

#[derive(Debug, Clone)]
pub struct ArchiverSettings {
    pub interval: Duration,
    /// Appointments dated on or before `today - retention_days` are archived.
    pub retention_days: u32,
    /// Bound on listing and on each record's archive+remove step.
    pub step_timeout: Duration,
    /// Compact the active log after a sweep once this many appends piled up.
    pub compact_threshold: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArchiveReport {
    pub candidates: usize,
    /// Removed from the active set; includes `already_archived`.
    pub archived: usize,
    /// History already held a copy from an earlier, interrupted run.
    pub already_archived: usize,
    pub failed: usize,
}

/// Only the date is compared; the slot time plays no part.
pub fn cutoff_date(today: NaiveDate, retention_days: u32) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(retention_days)))
        .unwrap_or(NaiveDate::MIN)
}

/// One sweep: copy every appointment dated on or before `cutoff` into
/// history, then drop it from the active set. A record whose history write
/// fails stays active for the next run; the rest of the batch carries on.
pub async fn archive_once(
    engine: &Engine,
    history: &dyn HistoryStore,
    cutoff: NaiveDate,
    now: DateTime<Utc>,
    step_timeout: Duration,
) -> ArchiveReport {
    let mut report = ArchiveReport::default();

    let candidates = match timeout(step_timeout, engine.list_before(cutoff)).await {
        Ok(candidates) => candidates,
        Err(_) => {
            error!(%cutoff, "archive: listing candidates timed out, retrying next period");
            return report;
        }
    };
    report.candidates = candidates.len();

    for appointment in candidates {
        let id = appointment.id;
        let record = ArchivedAppointment {
            appointment,
            archived_at: now,
        };
        let step = async {
            let written = history.append(record).await?;
            engine.remove_archived(id).await?;
            Ok::<bool, EngineError>(written)
        };

        match timeout(step_timeout, step).await {
            Ok(Ok(written)) => {
                report.archived += 1;
                if !written {
                    report.already_archived += 1;
                }
                info!("archived appointment {id}");
            }
            Ok(Err(EngineError::NotFound(_))) => {
                // Cancelled by staff between listing and removal.
                debug!("archive skip {id}: no longer active");
            }
            Ok(Err(e)) => {
                report.failed += 1;
                error!("archive failed for appointment {id}: {e}");
            }
            Err(_) => {
                report.failed += 1;
                error!("archive timed out for appointment {id}");
            }
        }
    }

    metrics::counter!(crate::observability::APPOINTMENTS_ARCHIVED_TOTAL)
        .increment(report.archived as u64);
    metrics::counter!(crate::observability::ARCHIVE_FAILURES_TOTAL)
        .increment(report.failed as u64);
    report
}

/// Background task: sweep once immediately, then every `settings.interval`
/// until `cancel` fires.
pub async fn run_archiver(
    engine: Arc<Engine>,
    history: Arc<dyn HistoryStore>,
    settings: ArchiverSettings,
    cancel: CancellationToken,
) {
    // `interval` panics on a zero period.
    let mut interval = tokio::time::interval(settings.interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("archiver stopped");
                return;
            }
            _ = interval.tick() => {}
        }

        let started = Instant::now();
        let cutoff = cutoff_date(Local::now().date_naive(), settings.retention_days);
        let report = archive_once(
            &engine,
            history.as_ref(),
            cutoff,
            Utc::now(),
            settings.step_timeout,
        )
        .await;
        metrics::histogram!(crate::observability::ARCHIVE_RUN_DURATION_SECONDS)
            .record(started.elapsed().as_secs_f64());
        info!(
            %cutoff,
            candidates = report.candidates,
            archived = report.archived,
            failed = report.failed,
            "archive run finished"
        );

        match engine.appends_since_compact().await {
            Ok(appends) if appends >= settings.compact_threshold => {
                if let Err(e) = engine.compact().await {
                    warn!("log compaction failed: {e}");
                }
            }
            Ok(_) => {}
            Err(e) => warn!("log compaction skipped, append count unavailable: {e}"),
        }
    }
}
