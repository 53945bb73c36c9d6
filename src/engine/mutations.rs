use rust_decimal::Decimal;

use crate::limits::*;
use crate::model::*;

use super::validate;
use super::{Engine, EngineError, WalCommand};

impl Engine {
    /// Book `slot` on `date`. Fails with `Conflict` if the slot is taken.
    pub async fn create(
        &self,
        client_name: &str,
        date: &str,
        slot: &str,
        service_name: &str,
        budget_value: Decimal,
    ) -> Result<Appointment, EngineError> {
        let client_name = validate::client_name(client_name)?;
        let date = validate::date(date)?;
        let slot = validate::slot(&self.catalog, slot)?;
        let service_name = validate::service_name(&self.catalog, service_name)?;
        let budget_value = validate::budget(budget_value)?;
        if self.id_to_date.len() >= MAX_ACTIVE_APPOINTMENTS {
            return Err(EngineError::LimitExceeded("too many active appointments"));
        }

        let gate = self.compaction_gate.clone().read_owned().await;
        let guard = self.day_or_insert(date).write_owned().await;

        if let Err(e) = validate::check_slot_free(&guard, slot) {
            metrics::counter!(crate::observability::BOOKING_CONFLICTS_TOTAL).increment(1);
            return Err(e);
        }

        let appointment = Appointment {
            id: self.allocate_id(),
            client_name,
            date,
            slot,
            service_name,
            budget_value,
        };
        self.persist_and_apply(gate, guard, Event::Booked(appointment.clone()))
            .await?;
        metrics::counter!(crate::observability::BOOKINGS_CREATED_TOTAL).increment(1);
        Ok(appointment)
    }

    /// Apply a staff edit. Date and slot never change, so occupancy is not
    /// re-checked. An empty patch returns the current record without writing.
    pub async fn update(
        &self,
        id: AppointmentId,
        patch: AppointmentPatch,
    ) -> Result<Appointment, EngineError> {
        let client_name = patch
            .client_name
            .as_deref()
            .map(validate::client_name)
            .transpose()?;
        let service_name = patch
            .service_name
            .as_deref()
            .map(|s| validate::service_name(&self.catalog, s))
            .transpose()?;
        let budget_value = patch.budget_value.map(validate::budget).transpose()?;

        let gate = self.compaction_gate.clone().read_owned().await;
        let guard = self.resolve_write(id).await?;
        let current = guard.get(id).cloned().ok_or(EngineError::NotFound(id))?;
        if patch.is_empty() {
            return Ok(current);
        }

        let event = Event::Updated {
            id,
            date: current.date,
            client_name: client_name.unwrap_or(current.client_name),
            service_name: service_name.unwrap_or(current.service_name),
            budget_value: budget_value.unwrap_or(current.budget_value),
        };
        let guard = self.persist_and_apply(gate, guard, event).await?;
        guard.get(id).cloned().ok_or(EngineError::NotFound(id))
    }

    /// Cancel an active appointment (hard delete).
    pub async fn delete(&self, id: AppointmentId) -> Result<Appointment, EngineError> {
        self.remove(id, RemovalReason::Cancelled).await
    }

    /// Drop an appointment whose history copy has been written.
    pub async fn remove_archived(&self, id: AppointmentId) -> Result<Appointment, EngineError> {
        self.remove(id, RemovalReason::Archived).await
    }

    async fn remove(
        &self,
        id: AppointmentId,
        reason: RemovalReason,
    ) -> Result<Appointment, EngineError> {
        let gate = self.compaction_gate.clone().read_owned().await;
        let guard = self.resolve_write(id).await?;
        let removed = guard.get(id).cloned().ok_or(EngineError::NotFound(id))?;
        let event = Event::Removed {
            id,
            date: removed.date,
            reason,
        };
        self.persist_and_apply(gate, guard, event).await?;
        Ok(removed)
    }

    /// Rewrite the log with only the events needed to recreate the active set,
    /// and drop days that no longer hold anything.
    pub async fn compact(&self) -> Result<(), EngineError> {
        let _gate = self.compaction_gate.write().await;

        let mut events = vec![Event::IdsReserved {
            next_id: self.next_id.load(std::sync::atomic::Ordering::SeqCst),
        }];
        let mut dates: Vec<_> = self.days.iter().map(|e| *e.key()).collect();
        dates.sort();
        for date in dates {
            if let Some(day) = self.get_day(&date) {
                let guard = day.read().await;
                events.extend(guard.appointments.iter().cloned().map(Event::Booked));
            }
        }

        let kept = events.len() - 1;
        self.wal_request(|response| WalCommand::Compact { events, response })
            .await?
            .map_err(|e| EngineError::Unavailable(e.to_string()))?;

        // Mutations are shut out by the gate, so an empty day cannot be
        // refilled between this check and its removal.
        self.days
            .retain(|_, day| !day.try_read().is_ok_and(|d| d.is_empty()));
        tracing::info!(kept, "appointment log compacted");
        Ok(())
    }

    pub async fn appends_since_compact(&self) -> Result<u64, EngineError> {
        self.wal_request(|response| WalCommand::AppendsSinceCompact { response })
            .await
    }
}
