//! Export sink: a result table goes to the console or to a dated CSV file.

use crate::{
    error::{EtlError, EtlResult},
    table::Table,
};
use chrono::NaiveDate;
use std::{
    fmt,
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Stdout,
    Csv,
}

impl FromStr for Destination {
    type Err = EtlError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stdout" => Ok(Destination::Stdout),
            "csv" => Ok(Destination::Csv),
            other => Err(EtlError::InvalidArgument(format!(
                "The destination '{other}' is not a valid option (expected 'stdout' or 'csv')"
            ))),
        }
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Stdout => f.write_str("stdout"),
            Destination::Csv => f.write_str("csv"),
        }
    }
}

/// Writes report tables. CSV files land in `out_dir`.
pub struct Exporter {
    out_dir: PathBuf,
}

impl Exporter {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        Self {
            out_dir: out_dir.into(),
        }
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// `{out_dir}/{name}_{YYYY-MM-DD}.csv`
    pub fn csv_path(&self, name: &str, date: NaiveDate) -> PathBuf {
        self.out_dir
            .join(format!("{name}_{}.csv", date.format("%Y-%m-%d")))
    }

    /// Send `table` to `destination`, dating CSV files with today's local date.
    ///
    /// Returns the written file for CSV exports.
    pub fn export(
        &self,
        name: &str,
        table: &Table,
        destination: Destination,
        console: &mut dyn Write,
    ) -> EtlResult<Option<PathBuf>> {
        self.export_on(name, table, destination, console, chrono::Local::now().date_naive())
    }

    pub fn export_on(
        &self,
        name: &str,
        table: &Table,
        destination: Destination,
        console: &mut dyn Write,
        date: NaiveDate,
    ) -> EtlResult<Option<PathBuf>> {
        match destination {
            Destination::Stdout => {
                write!(console, "{table}")
                    .and_then(|_| console.flush())
                    .map_err(EtlError::Console)
                    .inspect_err(|e| log::error!("There was an error printing '{name}': {e}"))?;
                Ok(None)
            }
            Destination::Csv => {
                let path = self.csv_path(name, date);
                log::info!("Exporting {name} to {}...", path.display());
                self.write_csv(&path, table)
                    .map_err(|source| EtlError::Export {
                        path: path.clone(),
                        source,
                    })
                    .inspect_err(|e| {
                        log::error!("There was an error exporting the '{name}' dataset: {e}")
                    })?;
                log::info!("The {name} dataset was exported successfully.");
                Ok(Some(path))
            }
        }
    }

    fn write_csv(&self, path: &Path, table: &Table) -> Result<(), csv::Error> {
        std::fs::create_dir_all(&self.out_dir)?;
        let mut wtr = csv::Writer::from_path(path)?;
        wtr.write_record(table.columns())?;
        for row in table.rows() {
            wtr.write_record(row.iter().map(ToString::to_string))?;
        }
        wtr.flush()?;
        Ok(())
    }
}
