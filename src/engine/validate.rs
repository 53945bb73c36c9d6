use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::catalog::Catalog;
use crate::limits::*;
use crate::model::*;

use super::EngineError;

pub(crate) fn client_name(raw: &str) -> Result<String, EngineError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(EngineError::validation("client name is required"));
    }
    if name.chars().count() > MAX_CLIENT_NAME_LEN {
        return Err(EngineError::LimitExceeded("client name too long"));
    }
    Ok(name.to_string())
}

pub(crate) fn service_name(catalog: &Catalog, raw: &str) -> Result<String, EngineError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(EngineError::validation("service is required"));
    }
    if name.len() > MAX_SERVICE_NAME_LEN {
        return Err(EngineError::LimitExceeded("service name too long"));
    }
    catalog
        .service(name)
        .map(|s| s.name.clone())
        .ok_or_else(|| EngineError::validation(format!("unknown service: {name}")))
}

pub(crate) fn budget(value: Decimal) -> Result<Decimal, EngineError> {
    if value <= Decimal::ZERO {
        return Err(EngineError::validation("budget value must be positive"));
    }
    Ok(value)
}

pub(crate) fn date(raw: &str) -> Result<NaiveDate, EngineError> {
    if raw.trim().is_empty() {
        return Err(EngineError::validation("date is required"));
    }
    parse_date(raw).ok_or_else(|| EngineError::validation(format!("date must be YYYY-MM-DD: {raw}")))
}

/// Parse `HH:MM:SS` and require the slot to be one the business offers.
pub(crate) fn slot(catalog: &Catalog, raw: &str) -> Result<Slot, EngineError> {
    if raw.trim().is_empty() {
        return Err(EngineError::validation("time is required"));
    }
    let slot = Slot::parse(raw)
        .ok_or_else(|| EngineError::validation(format!("time must be HH:MM:SS: {raw}")))?;
    if !catalog.contains_slot(slot) {
        return Err(EngineError::validation(format!("{slot} is not a bookable slot")));
    }
    Ok(slot)
}

pub(crate) fn check_slot_free(day: &DayState, slot: Slot) -> Result<(), EngineError> {
    match day.slot_holder(slot) {
        Some(_) => Err(EngineError::Conflict {
            date: day.date,
            slot,
        }),
        None => Ok(()),
    }
}
