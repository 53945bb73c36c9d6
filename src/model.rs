use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Repository-assigned appointment id. Never reused.
pub type AppointmentId = u64;

/// A bookable time of day with second granularity, rendered `HH:MM:SS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Slot(NaiveTime);

impl Slot {
    pub fn from_hms(hour: u32, min: u32, sec: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, min, sec).map(Slot)
    }

    /// Strict `HH:MM:SS` parse. `9:00:00` and `09:00` are rejected.
    pub fn parse(s: &str) -> Option<Self> {
        if !has_shape(s, "dd:dd:dd") {
            return None;
        }
        NaiveTime::parse_from_str(s, "%H:%M:%S").ok().map(Slot)
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M:%S"))
    }
}

/// Strict `YYYY-MM-DD` parse that also rejects impossible calendar dates.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    if !has_shape(s, "dddd-dd-dd") {
        return None;
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()
}

/// `d` in `shape` matches an ASCII digit, anything else matches itself.
fn has_shape(s: &str, shape: &str) -> bool {
    s.len() == shape.len()
        && s.bytes().zip(shape.bytes()).all(|(c, p)| match p {
            b'd' => c.is_ascii_digit(),
            _ => c == p,
        })
}

/// An active booking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    pub client_name: String,
    pub date: NaiveDate,
    pub slot: Slot,
    pub service_name: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub budget_value: Decimal,
}

/// Historical copy of a concluded appointment. Append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedAppointment {
    pub appointment: Appointment,
    pub archived_at: DateTime<Utc>,
}

/// Staff edit. Absent fields are left untouched; date and slot are not editable.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppointmentPatch {
    pub client_name: Option<String>,
    pub service_name: Option<String>,
    pub budget_value: Option<Decimal>,
}

impl AppointmentPatch {
    pub fn is_empty(&self) -> bool {
        self.client_name.is_none() && self.service_name.is_none() && self.budget_value.is_none()
    }
}

/// Why an appointment left the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemovalReason {
    Cancelled,
    Archived,
}

/// All active appointments on one calendar day, sorted by slot.
#[derive(Debug, Clone)]
pub struct DayState {
    pub date: NaiveDate,
    pub appointments: Vec<Appointment>,
}

impl DayState {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            appointments: Vec::new(),
        }
    }

    /// Insert keeping slot order. Callers check `slot_holder` first.
    pub fn insert(&mut self, appointment: Appointment) {
        let pos = self
            .appointments
            .binary_search_by_key(&appointment.slot, |a| a.slot)
            .unwrap_or_else(|e| e);
        self.appointments.insert(pos, appointment);
    }

    pub fn remove(&mut self, id: AppointmentId) -> Option<Appointment> {
        let pos = self.appointments.iter().position(|a| a.id == id)?;
        Some(self.appointments.remove(pos))
    }

    pub fn get(&self, id: AppointmentId) -> Option<&Appointment> {
        self.appointments.iter().find(|a| a.id == id)
    }

    pub fn get_mut(&mut self, id: AppointmentId) -> Option<&mut Appointment> {
        self.appointments.iter_mut().find(|a| a.id == id)
    }

    /// Id of the appointment occupying `slot`, if any.
    pub fn slot_holder(&self, slot: Slot) -> Option<AppointmentId> {
        self.appointments
            .binary_search_by_key(&slot, |a| a.slot)
            .ok()
            .map(|pos| self.appointments[pos].id)
    }

    pub fn occupied_slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.appointments.iter().map(|a| a.slot)
    }

    pub fn is_empty(&self) -> bool {
        self.appointments.is_empty()
    }
}

/// Record format of the active-appointment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Event {
    Booked(Appointment),
    Updated {
        id: AppointmentId,
        date: NaiveDate,
        client_name: String,
        service_name: String,
        #[serde(with = "rust_decimal::serde::str")]
        budget_value: Decimal,
    },
    Removed {
        id: AppointmentId,
        date: NaiveDate,
        reason: RemovalReason,
    },
    /// Id watermark, written on compaction so archived ids stay retired.
    IdsReserved { next_id: AppointmentId },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        parse_date(s).unwrap()
    }

    fn appt(id: AppointmentId, slot: &str) -> Appointment {
        Appointment {
            id,
            client_name: format!("client {id}"),
            date: date("2025-01-10"),
            slot: Slot::parse(slot).unwrap(),
            service_name: "Corte".into(),
            budget_value: Decimal::new(3500, 2),
        }
    }

    #[test]
    fn slot_parse_is_strict() {
        assert_eq!(Slot::parse("09:00:00"), Slot::from_hms(9, 0, 0));
        assert!(Slot::parse("9:00:00").is_none());
        assert!(Slot::parse("09:00").is_none());
        assert!(Slot::parse("25:00:00").is_none());
        assert!(Slot::parse("09:00:00Z").is_none());
        assert!(Slot::parse("").is_none());
    }

    #[test]
    fn slot_display_keeps_seconds() {
        let slot = Slot::from_hms(14, 30, 0).unwrap();
        assert_eq!(slot.to_string(), "14:30:00");
    }

    #[test]
    fn date_parse_is_strict() {
        assert!(parse_date("2025-01-10").is_some());
        assert!(parse_date("10-01-2025").is_none());
        assert!(parse_date("2025-1-10").is_none());
        assert!(parse_date("2025-02-30").is_none());
        assert!(parse_date("2025/01/10").is_none());
    }

    #[test]
    fn day_keeps_slot_order() {
        let mut day = DayState::new(date("2025-01-10"));
        day.insert(appt(1, "15:00:00"));
        day.insert(appt(2, "09:00:00"));
        day.insert(appt(3, "11:00:00"));
        let slots: Vec<String> = day.occupied_slots().map(|s| s.to_string()).collect();
        assert_eq!(slots, vec!["09:00:00", "11:00:00", "15:00:00"]);
    }

    #[test]
    fn slot_holder_finds_occupant() {
        let mut day = DayState::new(date("2025-01-10"));
        day.insert(appt(7, "10:00:00"));
        assert_eq!(day.slot_holder(Slot::parse("10:00:00").unwrap()), Some(7));
        assert_eq!(day.slot_holder(Slot::parse("11:00:00").unwrap()), None);
    }

    #[test]
    fn remove_nonexistent_returns_none() {
        let mut day = DayState::new(date("2025-01-10"));
        day.insert(appt(1, "09:00:00"));
        assert!(day.remove(42).is_none());
        assert_eq!(day.appointments.len(), 1);
        assert!(day.remove(1).is_some());
        assert!(day.is_empty());
    }

    #[test]
    fn patch_emptiness() {
        assert!(AppointmentPatch::default().is_empty());
        let patch = AppointmentPatch {
            budget_value: Some(Decimal::ONE),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }

    #[test]
    fn event_survives_bincode() {
        // Decimal and chrono values go through their string forms in the log.
        let event = Event::Booked(appt(3, "16:00:00"));
        let bytes = bincode::serialize(&event).unwrap();
        let decoded: Event = bincode::deserialize(&bytes).unwrap();
        assert_eq!(event, decoded);
    }
}
