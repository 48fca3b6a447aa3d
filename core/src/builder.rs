//! Builder trait and the three warehouse builders.
//!
//! RULE: Every derived table implements TableBuilder.
//! Builders read the in-memory staging rows only. They never read the store
//! and never read each other's output. Execution order is fixed in engine.rs.

use crate::{
    error::EtlResult,
    schema::{
        self, TypeMap, AGENCY_DIM_COLUMNS, AGENCY_DIM_TABLE, PRODUCT_DIM_COLUMNS,
        PRODUCT_DIM_TABLE, REVENUE_FACT_COLUMNS, REVENUE_FACT_TABLE,
    },
    staging::StagingRecord,
    table::{Table, Value},
    types::{AgencyId, Money, Year},
};
use std::collections::{BTreeMap, HashSet};

/// The contract every derived table fulfils.
pub trait TableBuilder {
    /// Name of the table this builder replaces.
    fn table_name(&self) -> &'static str;

    /// Column types pinned on write. None lets the store infer them.
    fn column_types(&self) -> Option<&'static TypeMap> {
        None
    }

    fn build(&self, staging: &[StagingRecord]) -> EtlResult<Table>;
}

/// Keep the first occurrence of every row.
fn distinct(table: Table) -> Table {
    let mut seen = HashSet::new();
    let mut out = Table::new(table.columns().iter().cloned());
    for row in table.rows() {
        if seen.insert(row.clone()) {
            out.push_row(row.clone());
        }
    }
    out
}

// ── product_dim ──────────────────────────────────────────────────────────────

pub struct ProductDimBuilder;

impl TableBuilder for ProductDimBuilder {
    fn table_name(&self) -> &'static str {
        PRODUCT_DIM_TABLE
    }

    fn build(&self, staging: &[StagingRecord]) -> EtlResult<Table> {
        let mut table = Table::new(PRODUCT_DIM_COLUMNS.iter().copied());
        for r in staging {
            table.push_row(vec![r.prod_abbr.as_str().into(), r.prod_line.as_str().into()]);
        }
        Ok(distinct(table))
    }
}

// ── agency_dim ───────────────────────────────────────────────────────────────

pub struct AgencyDimBuilder;

impl TableBuilder for AgencyDimBuilder {
    fn table_name(&self) -> &'static str {
        AGENCY_DIM_TABLE
    }

    fn build(&self, staging: &[StagingRecord]) -> EtlResult<Table> {
        let mut table = Table::new(AGENCY_DIM_COLUMNS.iter().copied());
        for r in staging {
            table.push_row(vec![
                r.agency_id.into(),
                r.primary_agency_id.as_str().into(),
                r.vendor.as_str().into(),
                r.active_producers.into(),
                r.agency_appointment_year.into(),
                r.vendor_ind.as_str().into(),
            ]);
        }
        Ok(distinct(table))
    }
}

// ── revenue_fact ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RevenueMeasures {
    pub poly_inforce_qty:  Money,
    pub prd_ernd_prem_amt: Money,
    pub wrtn_prem_amt:     Money,
}

/// (AGENCY_ID, PROD_ABBR, STATE_ABBR, STAT_PROFILE_DATE_YEAR)
pub type RevenueKey = (AgencyId, String, String, Year);

/// Sum the three measures per key, keys ascending.
pub fn revenue_totals(staging: &[StagingRecord]) -> BTreeMap<RevenueKey, RevenueMeasures> {
    let mut totals: BTreeMap<RevenueKey, RevenueMeasures> = BTreeMap::new();
    for r in staging {
        let key = (
            r.agency_id,
            r.prod_abbr.clone(),
            r.state_abbr.clone(),
            r.stat_profile_date_year,
        );
        let m = totals.entry(key).or_default();
        m.poly_inforce_qty += r.poly_inforce_qty;
        m.prd_ernd_prem_amt += r.prd_ernd_prem_amt;
        m.wrtn_prem_amt += r.wrtn_prem_amt;
    }
    totals
}

pub struct RevenueFactBuilder;

impl TableBuilder for RevenueFactBuilder {
    fn table_name(&self) -> &'static str {
        REVENUE_FACT_TABLE
    }

    fn column_types(&self) -> Option<&'static TypeMap> {
        Some(REVENUE_FACT_COLUMNS)
    }

    fn build(&self, staging: &[StagingRecord]) -> EtlResult<Table> {
        let mut table = Table::new(schema::column_names(REVENUE_FACT_COLUMNS));
        for ((agency_id, prod_abbr, state_abbr, year), m) in revenue_totals(staging) {
            table.push_row(vec![
                Value::Integer(agency_id),
                Value::Text(prod_abbr),
                Value::Text(state_abbr),
                Value::Integer(year),
                m.poly_inforce_qty.into(),
                m.prd_ernd_prem_amt.into(),
                m.wrtn_prem_amt.into(),
            ]);
        }
        Ok(table)
    }
}
