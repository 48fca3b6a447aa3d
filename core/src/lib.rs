//! Agency warehouse ETL: CSV extract → staging → dimension/fact tables,
//! plus cash-flow and profitability reports.

pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod export;
pub mod report;
pub mod schema;
pub mod staging;
pub mod store;
pub mod table;
pub mod types;
