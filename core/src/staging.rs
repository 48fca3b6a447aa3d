//! Staging loader: the CSV extract becomes the `staging` table.
//!
//! Staging is the only upstream for every builder and report. It is fully
//! replaced on each load, never merged with what was there before.

use crate::{
    error::{EtlError, EtlResult},
    schema::{self, STAGING_COLUMNS, STAGING_TABLE},
    store::Store,
    table::Table,
    types::{AgencyId, Money, Year},
};
use serde::{Deserialize, Deserializer};
use std::{io::Read, path::Path};

/// One line of the agency extract.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StagingRecord {
    pub agency_id:               AgencyId,
    pub primary_agency_id:       String,
    pub vendor:                  String,
    pub vendor_ind:              String,
    pub active_producers:        Option<i64>,
    pub agency_appointment_year: Option<i64>,
    pub prod_abbr:               String,
    pub prod_line:               String,
    pub state_abbr:              String,
    pub stat_profile_date_year:  Year,
    #[serde(deserialize_with = "money")]
    pub wrtn_prem_amt:           Money,
    #[serde(deserialize_with = "money")]
    pub prd_ernd_prem_amt:       Money,
    #[serde(deserialize_with = "money")]
    pub prd_incrd_losses_amt:    Money,
    #[serde(deserialize_with = "money")]
    pub poly_inforce_qty:        Money,
}

/// Money cells are parsed from their text so no value passes through f64.
/// Blank cells count as zero, as they do in any sum over the column.
fn money<'de, D: Deserializer<'de>>(d: D) -> Result<Money, D::Error> {
    let raw = String::deserialize(d)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Money::ZERO);
    }
    raw.parse::<Money>()
        .or_else(|_| Money::from_scientific(raw))
        .map_err(serde::de::Error::custom)
}

impl StagingRecord {
    pub fn to_row(&self) -> Vec<crate::table::Value> {
        vec![
            self.agency_id.into(),
            self.primary_agency_id.as_str().into(),
            self.vendor.as_str().into(),
            self.vendor_ind.as_str().into(),
            self.active_producers.into(),
            self.agency_appointment_year.into(),
            self.prod_abbr.as_str().into(),
            self.prod_line.as_str().into(),
            self.state_abbr.as_str().into(),
            self.stat_profile_date_year.into(),
            self.wrtn_prem_amt.into(),
            self.prd_ernd_prem_amt.into(),
            self.prd_incrd_losses_amt.into(),
            self.poly_inforce_qty.into(),
        ]
    }
}

/// Staging rows in the `staging` table shape.
pub fn staging_table(records: &[StagingRecord]) -> Table {
    let mut table = Table::new(schema::column_names(STAGING_COLUMNS));
    for r in records {
        table.push_row(r.to_row());
    }
    table
}

/// Parse an extract. Extra columns are ignored; missing ones are an error.
pub fn read_records<R: Read>(reader: R) -> Result<Vec<StagingRecord>, csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let records: Vec<StagingRecord> = rdr.deserialize().collect::<Result<_, _>>()?;
    Ok(records)
}

/// Read the extract at `path` and persist it as `staging`.
///
/// The write is a single replace, so a failure leaves no half-loaded table.
pub fn load_staging(store: &mut Store, path: &Path) -> EtlResult<Vec<StagingRecord>> {
    log::info!("Loading the staging table from {}...", path.display());
    let records = std::fs::File::open(path)
        .map_err(csv::Error::from)
        .and_then(read_records)
        .map_err(|source| EtlError::Load {
            path: path.to_path_buf(),
            source,
        })
        .inspect_err(|e| log::error!("{e}"))?;

    store
        .replace_table(STAGING_TABLE, &staging_table(&records), Some(STAGING_COLUMNS))
        .inspect_err(|e| {
            log::error!("There was an error writing '{}' to the staging table: {e}", path.display())
        })?;

    log::info!("The staging table was successfully loaded ({} rows).", records.len());
    Ok(records)
}
