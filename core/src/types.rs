//! Shared primitive types used across the pipeline.

use rust_decimal::Decimal;

/// An agency identifier as it appears in AGENCY_ID.
pub type AgencyId = i64;

/// A statistical profile year (STAT_PROFILE_DATE_YEAR).
pub type Year = i64;

/// Currency and quantity measures. Never f64.
pub type Money = Decimal;
