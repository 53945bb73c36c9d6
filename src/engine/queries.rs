use chrono::NaiveDate;

use crate::limits::*;
use crate::model::*;

use super::availability::{available_slots, candidate_dates};
use super::{Engine, EngineError, SharedDayState};

impl Engine {
    /// Day handles sorted by date, optionally only those on or before `cutoff`.
    fn days_sorted(&self, cutoff: Option<NaiveDate>) -> Vec<SharedDayState> {
        let mut days: Vec<(NaiveDate, SharedDayState)> = self
            .days
            .iter()
            .filter(|e| cutoff.is_none_or(|c| *e.key() <= c))
            .map(|e| (*e.key(), e.value().clone()))
            .collect();
        days.sort_by_key(|(date, _)| *date);
        days.into_iter().map(|(_, day)| day).collect()
    }

    async fn collect(&self, cutoff: Option<NaiveDate>) -> Vec<Appointment> {
        let mut out = Vec::new();
        for day in self.days_sorted(cutoff) {
            let guard = day.read().await;
            out.extend(guard.appointments.iter().cloned());
        }
        out
    }

    /// Every active appointment, ordered by (date, slot).
    pub async fn list(&self) -> Vec<Appointment> {
        self.collect(None).await
    }

    /// Active appointments dated on or before `cutoff`.
    pub async fn list_before(&self, cutoff: NaiveDate) -> Vec<Appointment> {
        self.collect(Some(cutoff)).await
    }

    pub async fn get(&self, id: AppointmentId) -> Option<Appointment> {
        let date = self.id_to_date.get(&id).map(|e| *e.value())?;
        let day = self.get_day(&date)?;
        let guard = day.read().await;
        guard.get(id).cloned()
    }

    pub async fn occupied_slots(&self, date: NaiveDate) -> Vec<Slot> {
        match self.get_day(&date) {
            Some(day) => {
                let guard = day.read().await;
                guard.occupied_slots().collect()
            }
            None => Vec::new(),
        }
    }

    pub async fn available_slots(&self, date: NaiveDate) -> Vec<Slot> {
        let all = self.catalog.all_slots();
        match self.get_day(&date) {
            Some(day) => {
                let guard = day.read().await;
                available_slots(all, Some(&*guard))
            }
            None => available_slots(all, None),
        }
    }

    /// The next `count` bookable weekdays after `today`.
    pub fn candidate_dates(
        &self,
        today: NaiveDate,
        count: usize,
    ) -> Result<Vec<NaiveDate>, EngineError> {
        if count > MAX_CANDIDATE_DAYS {
            return Err(EngineError::LimitExceeded("too many days requested"));
        }
        Ok(candidate_dates(today, count))
    }

    pub fn active_count(&self) -> usize {
        self.id_to_date.len()
    }
}
