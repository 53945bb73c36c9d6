pub mod api;
pub mod archiver;
pub mod catalog;
pub mod config;
pub mod engine;
pub mod history;
pub mod limits;
pub mod model;
pub mod observability;
pub mod wal;
