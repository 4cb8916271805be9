//! Bulk CSV import, reconciliation and export for PT Jobs board records.

pub mod config;
pub mod error;
pub mod export;
pub mod imports;
pub mod notify;
pub mod records;
pub mod telemetry;
