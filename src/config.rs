use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::catalog::{Catalog, Service};
use crate::model::Slot;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must not be empty")]
    Empty { key: &'static str },
}

/// Process configuration, read once at startup from `AGENDA_*` variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub metrics_port: Option<u16>,
    pub catalog: Catalog,
    pub archive_interval: Duration,
    pub retention_days: u32,
    pub storage_timeout: Duration,
    pub compact_threshold: u64,
    pub cors: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".into(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            metrics_port: None,
            catalog: Catalog::default(),
            archive_interval: Duration::from_secs(24 * 60 * 60),
            retention_days: 2,
            storage_timeout: Duration::from_millis(5000),
            compact_threshold: 1000,
            cors: true,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let slots = match lookup("AGENDA_SLOTS") {
            Some(raw) => parse_slots(&raw)?,
            None => defaults.catalog.all_slots().to_vec(),
        };
        let services = match lookup("AGENDA_SERVICES") {
            Some(raw) => parse_services(&raw)?,
            None => defaults.catalog.services().to_vec(),
        };

        Ok(Self {
            bind: lookup("AGENDA_BIND").unwrap_or(defaults.bind),
            port: parsed(&lookup, "AGENDA_PORT")?.unwrap_or(defaults.port),
            data_dir: lookup("AGENDA_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            metrics_port: parsed(&lookup, "AGENDA_METRICS_PORT")?,
            catalog: Catalog::new(slots, services),
            archive_interval: positive(&lookup, "AGENDA_ARCHIVE_INTERVAL_SECS")?
                .map(Duration::from_secs)
                .unwrap_or(defaults.archive_interval),
            retention_days: parsed(&lookup, "AGENDA_RETENTION_DAYS")?
                .unwrap_or(defaults.retention_days),
            storage_timeout: positive(&lookup, "AGENDA_STORAGE_TIMEOUT_MS")?
                .map(Duration::from_millis)
                .unwrap_or(defaults.storage_timeout),
            compact_threshold: parsed(&lookup, "AGENDA_COMPACT_THRESHOLD")?
                .unwrap_or(defaults.compact_threshold),
            cors: parsed(&lookup, "AGENDA_CORS")?.unwrap_or(defaults.cors),
        })
    }

    pub fn active_wal_path(&self) -> PathBuf {
        self.data_dir.join("appointments.wal")
    }

    pub fn history_wal_path(&self) -> PathBuf {
        self.data_dir.join("history.wal")
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { key, value }),
    }
}

/// Like `parsed`, but zero is rejected.
fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match parsed(lookup, key)? {
        Some(0) => Err(ConfigError::Invalid {
            key,
            value: "0".to_string(),
        }),
        other => Ok(other),
    }
}

/// `09:00:00,10:00:00,...`
fn parse_slots(raw: &str) -> Result<Vec<Slot>, ConfigError> {
    let slots = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            Slot::parse(s).ok_or_else(|| ConfigError::Invalid {
                key: "AGENDA_SLOTS",
                value: s.to_string(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if slots.is_empty() {
        return Err(ConfigError::Empty { key: "AGENDA_SLOTS" });
    }
    if slots.len() > crate::limits::MAX_SLOTS_PER_DAY {
        return Err(ConfigError::Invalid {
            key: "AGENDA_SLOTS",
            value: format!("{} slots", slots.len()),
        });
    }
    Ok(slots)
}

/// `Corte=35.00;Barba=25.00`
fn parse_services(raw: &str) -> Result<Vec<Service>, ConfigError> {
    let invalid = |value: &str| ConfigError::Invalid {
        key: "AGENDA_SERVICES",
        value: value.to_string(),
    };
    let services = raw
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|entry| {
            let (name, price) = entry.split_once('=').ok_or_else(|| invalid(entry))?;
            let name = name.trim();
            let price = Decimal::from_str(price.trim()).map_err(|_| invalid(entry))?;
            if name.is_empty() || price.is_sign_negative() {
                return Err(invalid(entry));
            }
            Ok(Service {
                name: name.to_string(),
                price,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    if services.is_empty() {
        return Err(ConfigError::Empty {
            key: "AGENDA_SERVICES",
        });
    }
    Ok(services)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn empty_environment_gives_defaults() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.retention_days, 2);
        assert_eq!(config.archive_interval, Duration::from_secs(86_400));
        assert_eq!(config.catalog.all_slots().len(), 9);
        assert!(config.metrics_port.is_none());
    }

    #[test]
    fn catalog_from_environment() {
        let config = Config::from_lookup(lookup(&[
            ("AGENDA_SLOTS", "10:00:00, 09:00:00"),
            ("AGENDA_SERVICES", "Corte=30; Escova=45.50"),
        ]))
        .unwrap();
        let slots: Vec<String> = config
            .catalog
            .all_slots()
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(slots, vec!["09:00:00", "10:00:00"]);
        assert_eq!(
            config.catalog.service("Escova").unwrap().price,
            Decimal::new(4550, 2)
        );
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[("AGENDA_PORT", "http")])).unwrap_err();
        assert!(err.to_string().contains("AGENDA_PORT"));

        assert!(Config::from_lookup(lookup(&[("AGENDA_SLOTS", "9h")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AGENDA_SLOTS", " , ")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AGENDA_SERVICES", "Corte")])).is_err());
        assert!(Config::from_lookup(lookup(&[("AGENDA_SERVICES", "Corte=-1")])).is_err());

        let err = Config::from_lookup(lookup(&[("AGENDA_ARCHIVE_INTERVAL_SECS", "0")])).unwrap_err();
        assert!(err.to_string().contains("AGENDA_ARCHIVE_INTERVAL_SECS"));
        let err = Config::from_lookup(lookup(&[("AGENDA_STORAGE_TIMEOUT_MS", " 0 ")])).unwrap_err();
        assert!(err.to_string().contains("AGENDA_STORAGE_TIMEOUT_MS"));
        assert!(Config::from_lookup(lookup(&[("AGENDA_STORAGE_TIMEOUT_MS", "1")])).is_ok());
    }
}
