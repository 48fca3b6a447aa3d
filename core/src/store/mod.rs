//! SQLite persistence layer.
//!
//! RULE: Only store talks to the database.
//! Loaders, builders and reports call store methods; they never hold a
//! Connection themselves.
//!
//! Every write replaces a whole table inside one transaction, so a failed
//! write leaves the previous table untouched.
//!
//! DECIMAL(p, s) values are stored as INTEGER in units of 10^-s. SQLite's
//! NUMERIC affinity would otherwise turn decimal text into REAL and keep only
//! 15 significant digits. Values whose scaled form does not fit an i64 are
//! rejected on write.

use crate::{
    error::{EtlError, EtlResult},
    schema::{self, SqlType, TypeMap},
    table::{Table, Value},
    types::Money,
};
use rusqlite::{
    types::{FromSql, FromSqlError, FromSqlResult, Value as SqlValue, ValueRef},
    Connection, OpenFlags, Params,
};
use rust_decimal::RoundingStrategy;
use std::path::{Path, PathBuf};

mod reports;

pub use reports::{CashFlowRow, PremiumRow};

pub struct Store {
    conn: Connection,
    path: Option<PathBuf>, // None for :memory:
}

impl Store {
    /// Open (or create) the warehouse database at `path`.
    pub fn open(path: impl AsRef<Path>) -> EtlResult<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Self::connect(&path)?;
        Ok(Self {
            conn,
            path: Some(path),
        })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> EtlResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn, path: None })
    }

    fn connect(path: &Path) -> EtlResult<Connection> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )?;
        Ok(conn)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Destroy and recreate the backing store.
    ///
    /// File-backed stores delete the file and reopen it; the old connection
    /// is only replaced once the new one is open. In-memory stores drop every
    /// table.
    pub fn reset(&mut self) -> EtlResult<()> {
        match self.path.clone() {
            Some(path) => {
                if path.exists() {
                    std::fs::remove_file(&path).map_err(|source| EtlError::StoreFile {
                        action: "remove",
                        path: path.clone(),
                        source,
                    })?;
                }
                let old = std::mem::replace(&mut self.conn, Self::connect(&path)?);
                old.close().map_err(|(_, e)| e)?;
            }
            None => {
                for name in self.table_names()? {
                    self.conn
                        .execute_batch(&format!("DROP TABLE {}", quote(&name)))?;
                }
            }
        }
        Ok(())
    }

    // ── Writes ─────────────────────────────────────────────────

    /// Persist `table` as `name`, replacing any existing table of that name.
    ///
    /// Columns named in `types` are declared with that SQL type and every
    /// value is coerced to it; the rest get a type inferred from their values.
    pub fn replace_table(
        &mut self,
        name: &str,
        table: &Table,
        types: Option<&TypeMap>,
    ) -> EtlResult<()> {
        let declared: Vec<SqlType> = table
            .columns()
            .iter()
            .enumerate()
            .map(|(i, column)| {
                types
                    .and_then(|t| t.iter().find(|c| c.name == column.as_str()))
                    .map(|c| c.sql_type)
                    .unwrap_or_else(|| infer_type(table, i))
            })
            .collect();

        let column_sql: Vec<String> = table
            .columns()
            .iter()
            .zip(&declared)
            .map(|(c, t)| format!("{} {t}", quote(c)))
            .collect();
        let placeholders: Vec<String> = (1..=table.columns().len())
            .map(|i| format!("?{i}"))
            .collect();

        let tx = self.conn.transaction()?;
        tx.execute_batch(&format!("DROP TABLE IF EXISTS {}", quote(name)))?;
        tx.execute_batch(&format!(
            "CREATE TABLE {} ({})",
            quote(name),
            column_sql.join(", ")
        ))?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} VALUES ({})",
                quote(name),
                placeholders.join(", ")
            ))?;
            for row in table.rows() {
                let encoded = row
                    .iter()
                    .zip(table.columns())
                    .zip(&declared)
                    .map(|((value, column), sql_type)| encode(value, *sql_type, column))
                    .collect::<EtlResult<Vec<_>>>()?;
                stmt.execute(rusqlite::params_from_iter(encoded))?;
            }
        }
        tx.commit()?;
        log::debug!("{name}: wrote {} rows", table.len());
        Ok(())
    }

    // ── Reads ──────────────────────────────────────────────────

    pub fn read_table(&self, name: &str) -> EtlResult<Table> {
        self.query(&format!("SELECT * FROM {} ORDER BY rowid", quote(name)), [])
    }

    /// Run a SELECT with bound parameters. Table columns decode by their
    /// declared type; computed columns fall back to the schema registry.
    pub fn query<P: Params>(&self, sql: &str, params: P) -> EtlResult<Table> {
        let mut stmt = self.conn.prepare(sql)?;
        let (columns, declared): (Vec<String>, Vec<Option<SqlType>>) = stmt
            .columns()
            .iter()
            .map(|c| {
                let sql_type = match c.decl_type() {
                    Some(decl) => SqlType::parse_decl(decl),
                    None => schema::column_type(c.name()),
                };
                (c.name().to_string(), sql_type)
            })
            .unzip();

        let mut table = Table::new(columns.iter().cloned());
        let mut rows = stmt.query(params)?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(columns.len());
            for (i, sql_type) in declared.iter().enumerate() {
                values.push(decode(row.get_ref(i)?, *sql_type, &columns[i])?);
            }
            table.push_row(values);
        }
        Ok(table)
    }

    pub fn table_names(&self) -> EtlResult<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master
             WHERE type = 'table' AND name NOT LIKE 'sqlite_%'
             ORDER BY name",
        )?;
        let names = stmt
            .query_map([], |r| r.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(names)
    }

    pub fn table_exists(&self, name: &str) -> EtlResult<bool> {
        Ok(self.table_names()?.iter().any(|n| n == name))
    }

    /// (column, declared type) pairs in column order.
    pub fn declared_types(&self, name: &str) -> EtlResult<Vec<(String, String)>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, type FROM pragma_table_info(?1) ORDER BY cid")?;
        let cols: Vec<(String, String)> = stmt
            .query_map([name], |r| Ok((r.get(0)?, r.get(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(cols)
    }

    pub fn row_count(&self, name: &str) -> EtlResult<i64> {
        Ok(self
            .conn
            .query_row(&format!("SELECT COUNT(*) FROM {}", quote(name)), [], |r| {
                r.get(0)
            })?)
    }
}

fn quote(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

/// Decimal columns get the widest scale present so every value is exact.
fn infer_type(table: &Table, column: usize) -> SqlType {
    let values = table.rows().iter().map(|r| &r[column]);
    match values.clone().find(|v| **v != Value::Null) {
        Some(Value::Integer(_)) => SqlType::Integer,
        Some(Value::Decimal(_)) => SqlType::Decimal {
            precision: 19,
            scale: values
                .filter_map(|v| match v {
                    Value::Decimal(d) => Some(d.scale()),
                    _ => None,
                })
                .max()
                .unwrap_or(0),
        },
        _ => SqlType::Text,
    }
}

// ── Value coercion ─────────────────────────────────────────────────────────

fn type_error(column: &str, value: &Value, reason: impl Into<String>) -> EtlError {
    EtlError::ColumnType {
        column: column.to_string(),
        value: format!("{value:?}"),
        reason: reason.into(),
    }
}

fn to_decimal(value: &Value, column: &str) -> EtlResult<Money> {
    match value {
        Value::Decimal(d) => Ok(*d),
        Value::Integer(i) => Ok(Money::from(*i)),
        Value::Text(s) => s
            .trim()
            .parse::<Money>()
            .map_err(|e| type_error(column, value, e.to_string())),
        Value::Null => Err(type_error(column, value, "NULL is not a number")),
    }
}

fn round_money(d: Money, scale: u32) -> Money {
    d.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero)
}

fn encode(value: &Value, sql_type: SqlType, column: &str) -> EtlResult<SqlValue> {
    if *value == Value::Null {
        return Ok(SqlValue::Null);
    }
    match sql_type {
        SqlType::Integer => match value {
            Value::Integer(i) => Ok(SqlValue::Integer(*i)),
            Value::Decimal(d) if d.fract().is_zero() => i64::try_from(*d)
                .map(SqlValue::Integer)
                .map_err(|e| type_error(column, value, e.to_string())),
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map(SqlValue::Integer)
                .map_err(|e| type_error(column, value, e.to_string())),
            _ => Err(type_error(column, value, "not an integer")),
        },
        SqlType::Decimal { precision, scale } => {
            let mut d = round_money(to_decimal(value, column)?, scale);
            d.rescale(scale);
            let scaled = d.mantissa();
            if scaled.unsigned_abs() >= 10u128.pow(precision) {
                return Err(type_error(
                    column,
                    value,
                    format!("out of range for {sql_type}"),
                ));
            }
            i64::try_from(scaled)
                .map(SqlValue::Integer)
                .map_err(|_| type_error(column, value, format!("too large to store exactly as {sql_type}")))
        }
        SqlType::Varchar(max) | SqlType::Char(max) => {
            let s = value.to_string();
            if s.chars().count() > max {
                return Err(type_error(
                    column,
                    value,
                    format!("longer than {max} characters"),
                ));
            }
            Ok(SqlValue::Text(s))
        }
        SqlType::Text => Ok(SqlValue::Text(value.to_string())),
    }
}

/// Read a DECIMAL(p, `scale`) cell.
///
/// INTEGER cells hold the value in units of 10^-scale. Text and REAL cells
/// only appear in databases written by other tools and are parsed as-is.
pub(crate) fn stored_money(value: ValueRef<'_>, scale: u32) -> FromSqlResult<Money> {
    let d = match value {
        ValueRef::Integer(i) => {
            return Money::try_new(i, scale).map_err(|e| FromSqlError::Other(Box::new(e)))
        }
        ValueRef::Real(f) => Money::try_from(f).map_err(|e| FromSqlError::Other(Box::new(e)))?,
        ValueRef::Text(t) => std::str::from_utf8(t)
            .map_err(|e| FromSqlError::Other(Box::new(e)))?
            .trim()
            .parse::<Money>()
            .map_err(|e| FromSqlError::Other(Box::new(e)))?,
        _ => return Err(FromSqlError::InvalidType),
    };
    let mut d = round_money(d, scale);
    d.rescale(scale);
    Ok(d)
}

fn decode(raw: ValueRef<'_>, sql_type: Option<SqlType>, column: &str) -> EtlResult<Value> {
    let failed = |e: FromSqlError| {
        EtlError::Database(rusqlite::Error::FromSqlConversionFailure(
            0,
            raw.data_type(),
            format!("{column}: {e}").into(),
        ))
    };
    if raw == ValueRef::Null {
        return Ok(Value::Null);
    }
    let value = match (sql_type, raw) {
        (Some(SqlType::Decimal { scale, .. }), _) => {
            Value::Decimal(stored_money(raw, scale).map_err(failed)?)
        }
        (None, ValueRef::Real(f)) => {
            Value::Decimal(Money::try_from(f).map_err(|e| failed(FromSqlError::Other(Box::new(e))))?)
        }
        (Some(SqlType::Integer), _) | (None, ValueRef::Integer(_)) => {
            Value::Integer(i64::column_result(raw).map_err(failed)?)
        }
        (Some(_), ValueRef::Integer(i)) => Value::Text(i.to_string()),
        (Some(_), ValueRef::Real(f)) => Value::Text(f.to_string()),
        _ => Value::Text(String::column_result(raw).map_err(failed)?),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, MONEY};
    use rust_decimal::Decimal;

    fn money(cents: i64) -> Value {
        Value::Decimal(Decimal::new(cents, 2))
    }

    fn sample() -> Table {
        let mut t = Table::new(["PROD_ABBR", "WRTN_PREM_AMT"]);
        t.push_row(vec!["123".into(), money(10050)]);
        t.push_row(vec!["456".into(), money(12000)]);
        t
    }

    #[test]
    fn replace_then_read_round_trips_decimals_exactly() {
        let mut store = Store::in_memory().unwrap();
        store
            .replace_table("t", &sample(), Some(schema::STAGING_COLUMNS))
            .unwrap();

        let back = store.read_table("t").unwrap();
        assert_eq!(back, sample());
    }

    #[test]
    fn replace_does_not_append() {
        let mut store = Store::in_memory().unwrap();
        store.replace_table("t", &sample(), None).unwrap();
        store.replace_table("t", &sample(), None).unwrap();
        assert_eq!(store.row_count("t").unwrap(), 2);
    }

    #[test]
    fn pinned_types_are_declared() {
        let mut store = Store::in_memory().unwrap();
        let types = [
            ColumnDef { name: "PROD_ABBR", sql_type: SqlType::Varchar(40) },
            ColumnDef { name: "WRTN_PREM_AMT", sql_type: MONEY },
        ];
        store.replace_table("t", &sample(), Some(&types[..])).unwrap();
        let declared = store.declared_types("t").unwrap();
        assert_eq!(
            declared,
            vec![
                ("PROD_ABBR".to_string(), "VARCHAR(40)".to_string()),
                ("WRTN_PREM_AMT".to_string(), "DECIMAL(19, 2)".to_string()),
            ]
        );
    }

    #[test]
    fn unpinned_columns_are_inferred() {
        let mut store = Store::in_memory().unwrap();
        let mut t = Table::new(["a", "b", "c"]);
        t.push_row(vec![Value::Integer(1), money(150), Value::Null]);
        store.replace_table("t", &t, None).unwrap();
        let types: Vec<String> = store
            .declared_types("t")
            .unwrap()
            .into_iter()
            .map(|(_, ty)| ty)
            .collect();
        assert_eq!(types, ["INTEGER", "DECIMAL(19, 2)", "TEXT"]);
        assert_eq!(store.read_table("t").unwrap(), t);
    }

    #[test]
    fn large_money_round_trips_exactly() {
        let mut store = Store::in_memory().unwrap();
        let mut t = Table::new(["WRTN_PREM_AMT"]);
        for cents in [12_345_678_901_234_567, 90_000_000_000_000_001, -12_345_678_901_234_567, 123_456_789] {
            t.push_row(vec![money(cents)]);
        }
        store
            .replace_table("t", &t, Some(schema::STAGING_COLUMNS))
            .unwrap();
        assert_eq!(store.read_table("t").unwrap(), t);

        let stored: i64 = store
            .conn
            .query_row("SELECT WRTN_PREM_AMT FROM t WHERE rowid = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(stored, 12_345_678_901_234_567);
    }

    #[test]
    fn money_beyond_exact_storage_is_rejected() {
        let mut store = Store::in_memory().unwrap();
        let mut t = Table::new(["WRTN_PREM_AMT"]);
        t.push_row(vec![Value::Decimal(Decimal::from_i128_with_scale(9_999_999_999_999_999_999, 2))]);
        let err = store
            .replace_table("t", &t, Some(schema::STAGING_COLUMNS))
            .unwrap_err();
        assert!(matches!(err, EtlError::ColumnType { .. }), "got {err}");
        assert!(!store.table_exists("t").unwrap());
    }

    #[test]
    fn inferred_decimal_scale_is_the_widest_present() {
        let mut store = Store::in_memory().unwrap();
        let mut t = Table::new(["rate"]);
        t.push_row(vec![Value::Decimal(Decimal::new(15, 1))]);
        t.push_row(vec![Value::Decimal(Decimal::new(123_456, 4))]);
        store.replace_table("t", &t, None).unwrap();
        assert_eq!(
            store.declared_types("t").unwrap()[0].1,
            "DECIMAL(19, 4)"
        );
        assert_eq!(store.read_table("t").unwrap(), t);
    }

    #[test]
    fn oversized_code_rejects_write_and_keeps_old_table() {
        let mut store = Store::in_memory().unwrap();
        store
            .replace_table("t", &sample(), Some(schema::STAGING_COLUMNS))
            .unwrap();

        let mut bad = Table::new(["STATE_ABBR"]);
        bad.push_row(vec!["TEXAS".into()]);
        let err = store
            .replace_table("t", &bad, Some(schema::STAGING_COLUMNS))
            .unwrap_err();
        assert!(matches!(err, EtlError::ColumnType { .. }), "got {err}");

        assert_eq!(store.read_table("t").unwrap(), sample());
    }

    #[test]
    fn money_is_rounded_to_declared_scale() {
        let mut store = Store::in_memory().unwrap();
        let mut t = Table::new(["WRTN_PREM_AMT"]);
        t.push_row(vec![Value::Decimal(Decimal::new(100_005, 3))]);
        store
            .replace_table("t", &t, Some(schema::STAGING_COLUMNS))
            .unwrap();
        let back = store.read_table("t").unwrap();
        assert_eq!(back.rows()[0][0], money(10001));
    }

    #[test]
    fn reset_drops_every_table() {
        let mut store = Store::in_memory().unwrap();
        store.replace_table("a", &sample(), None).unwrap();
        store.replace_table("b", &sample(), None).unwrap();
        store.reset().unwrap();
        assert!(store.table_names().unwrap().is_empty());
    }

    #[test]
    fn file_reset_starts_from_an_empty_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = Store::open(dir.path().join("w.db")).unwrap();
        store.replace_table("t", &sample(), None).unwrap();
        store.reset().unwrap();
        assert!(store.table_names().unwrap().is_empty());
        store.replace_table("t", &sample(), None).unwrap();
        assert_eq!(store.row_count("t").unwrap(), 2);
    }

    /// The open connection survives a reset that cannot remove the file.
    #[cfg(unix)]
    #[test]
    fn failed_reset_keeps_the_current_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("w.db");
        let mut store = Store::open(&path).unwrap();
        store.replace_table("t", &sample(), None).unwrap();

        // A directory in place of the file makes the removal fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        let err = store.reset().unwrap_err();
        assert!(matches!(err, EtlError::StoreFile { action: "remove", .. }), "got {err}");
        assert_eq!(store.path(), Some(path.as_path()));
        assert_eq!(store.row_count("t").unwrap(), 2);
    }

    #[test]
    fn reading_missing_table_is_a_storage_error() {
        let store = Store::in_memory().unwrap();
        let err = store.read_table("nope").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Storage);
    }
}
