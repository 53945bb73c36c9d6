use chrono::{Datelike, NaiveDate, Weekday};

use crate::model::*;

// ── Availability ──────────────────────────────────────────────────

/// Canonical slots minus those held by an active appointment on that day.
/// Order follows `all_slots`. A day with no bookings yields every slot.
pub fn available_slots(all_slots: &[Slot], day: Option<&DayState>) -> Vec<Slot> {
    let Some(day) = day else {
        return all_slots.to_vec();
    };
    all_slots
        .iter()
        .copied()
        .filter(|slot| day.slot_holder(*slot).is_none())
        .collect()
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The next `count` weekdays strictly after `today`.
///
/// Only the calendar is consulted: a fully booked weekday is still a candidate.
pub fn candidate_dates(today: NaiveDate, count: usize) -> Vec<NaiveDate> {
    std::iter::successors(today.succ_opt(), |d| d.succ_opt())
        .filter(|d| !is_weekend(*d))
        .take(count)
        .collect()
}
