//! Schema registry: column names, SQL types and table shapes.
//!
//! RULE: every column name used in SQL or in a Table comes from here.
//! The store decodes query results by their declared SQL type, falling back to
//! this registry for computed columns, so a DECIMAL column always reads back
//! as an exact decimal.

use std::fmt;

// ── Column names ─────────────────────────────────────────────────────────────

pub const AGENCY_ID: &str = "AGENCY_ID";
pub const PRIMARY_AGENCY_ID: &str = "PRIMARY_AGENCY_ID";
pub const VENDOR: &str = "VENDOR";
pub const VENDOR_IND: &str = "VENDOR_IND";
pub const ACTIVE_PRODUCERS: &str = "ACTIVE_PRODUCERS";
pub const AGENCY_APPOINTMENT_YEAR: &str = "AGENCY_APPOINTMENT_YEAR";
pub const PROD_ABBR: &str = "PROD_ABBR";
pub const PROD_LINE: &str = "PROD_LINE";
pub const STATE_ABBR: &str = "STATE_ABBR";
pub const STAT_PROFILE_DATE_YEAR: &str = "STAT_PROFILE_DATE_YEAR";
pub const WRTN_PREM_AMT: &str = "WRTN_PREM_AMT";
pub const PRD_ERND_PREM_AMT: &str = "PRD_ERND_PREM_AMT";
pub const PRD_INCRD_LOSSES_AMT: &str = "PRD_INCRD_LOSSES_AMT";
pub const POLY_INFORCE_QTY: &str = "POLY_INFORCE_QTY";

// ── Table names ──────────────────────────────────────────────────────────────

pub const STAGING_TABLE: &str = "staging";
pub const PRODUCT_DIM_TABLE: &str = "product_dim";
pub const AGENCY_DIM_TABLE: &str = "agency_dim";
pub const REVENUE_FACT_TABLE: &str = "revenue_fact";

// ── Types ────────────────────────────────────────────────────────────────────

/// A declared SQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    Decimal { precision: u32, scale: u32 },
    Varchar(usize),
    Char(usize),
    Text,
}

pub const MONEY_SCALE: u32 = 2;

/// Money and quantity columns.
pub const MONEY: SqlType = SqlType::Decimal { precision: 19, scale: MONEY_SCALE };

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::Integer => write!(f, "INTEGER"),
            SqlType::Decimal { precision, scale } => write!(f, "DECIMAL({precision}, {scale})"),
            SqlType::Varchar(n) => write!(f, "VARCHAR({n})"),
            SqlType::Char(n) => write!(f, "CHAR({n})"),
            SqlType::Text => write!(f, "TEXT"),
        }
    }
}

impl SqlType {
    /// Parse a declared column type as this module renders it.
    pub fn parse_decl(decl: &str) -> Option<SqlType> {
        let decl = decl.trim().to_ascii_uppercase();
        let (name, args) = match decl.split_once('(') {
            Some((name, rest)) => (name.trim(), rest.strip_suffix(')')?),
            None => (decl.as_str(), ""),
        };
        let args: Vec<&str> = args.split(',').map(str::trim).filter(|a| !a.is_empty()).collect();
        match (name, args.as_slice()) {
            ("INTEGER", []) => Some(SqlType::Integer),
            ("TEXT", []) => Some(SqlType::Text),
            ("DECIMAL", [p, s]) => Some(SqlType::Decimal {
                precision: p.parse().ok()?,
                scale: s.parse().ok()?,
            }),
            ("VARCHAR", [n]) => Some(SqlType::Varchar(n.parse().ok()?)),
            ("CHAR", [n]) => Some(SqlType::Char(n.parse().ok()?)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub sql_type: SqlType,
}

const fn col(name: &'static str, sql_type: SqlType) -> ColumnDef {
    ColumnDef { name, sql_type }
}

/// A type map handed to the store when a table's column types must be pinned.
pub type TypeMap = [ColumnDef];

// ── Table shapes ─────────────────────────────────────────────────────────────

pub const STAGING_COLUMNS: &TypeMap = &[
    col(AGENCY_ID, SqlType::Integer),
    col(PRIMARY_AGENCY_ID, SqlType::Text),
    col(VENDOR, SqlType::Text),
    col(VENDOR_IND, SqlType::Text),
    col(ACTIVE_PRODUCERS, SqlType::Integer),
    col(AGENCY_APPOINTMENT_YEAR, SqlType::Integer),
    col(PROD_ABBR, SqlType::Varchar(40)),
    col(PROD_LINE, SqlType::Text),
    col(STATE_ABBR, SqlType::Char(2)),
    col(STAT_PROFILE_DATE_YEAR, SqlType::Integer),
    col(WRTN_PREM_AMT, MONEY),
    col(PRD_ERND_PREM_AMT, MONEY),
    col(PRD_INCRD_LOSSES_AMT, MONEY),
    col(POLY_INFORCE_QTY, MONEY),
];

pub const PRODUCT_DIM_COLUMNS: &[&str] = &[PROD_ABBR, PROD_LINE];

pub const AGENCY_DIM_COLUMNS: &[&str] = &[
    AGENCY_ID,
    PRIMARY_AGENCY_ID,
    VENDOR,
    ACTIVE_PRODUCERS,
    AGENCY_APPOINTMENT_YEAR,
    VENDOR_IND,
];

/// revenue_fact is written with these types pinned regardless of inference.
pub const REVENUE_FACT_COLUMNS: &TypeMap = &[
    col(AGENCY_ID, SqlType::Integer),
    col(PROD_ABBR, SqlType::Varchar(40)),
    col(STATE_ABBR, SqlType::Char(2)),
    col(STAT_PROFILE_DATE_YEAR, SqlType::Integer),
    col(POLY_INFORCE_QTY, MONEY),
    col(PRD_ERND_PREM_AMT, MONEY),
    col(WRTN_PREM_AMT, MONEY),
];

/// Declared type of a known column, if the registry knows it.
pub fn column_type(name: &str) -> Option<SqlType> {
    STAGING_COLUMNS
        .iter()
        .find(|c| c.name == name)
        .map(|c| c.sql_type)
}

pub fn column_names(types: &TypeMap) -> Vec<&'static str> {
    types.iter().map(|c| c.name).collect()
}
