//! The ETL engine. Owns the store and runs every command.
//!
//! LOAD ORDER (fixed, documented, never reordered):
//!   1. Reset the store
//!   2. Staging      (CSV → staging)
//!   3. revenue_fact
//!   4. agency_dim
//!   5. product_dim
//!
//! RULES:
//!   - Builders see the staging rows in memory, never the store.
//!   - Any failure is logged with its table or file and aborts the command.
//!     Tables written before the failure stay; later ones are absent.
//!   - Reports read staging through the store with bound parameters.

use crate::{
    builder::{AgencyDimBuilder, ProductDimBuilder, RevenueFactBuilder, TableBuilder},
    config::EtlConfig,
    error::{EtlError, EtlResult},
    export::{Destination, Exporter},
    report,
    staging::load_staging,
    store::Store,
    table::Table,
    types::{AgencyId, Year},
};
use std::io::Write;

/// Row counts written by one `load`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadSummary {
    pub tables: Vec<(&'static str, usize)>,
}

impl LoadSummary {
    pub fn rows(&self, table: &str) -> Option<usize> {
        self.tables.iter().find(|(t, _)| *t == table).map(|(_, n)| *n)
    }
}

pub struct EtlEngine {
    config:     EtlConfig,
    store:      Store,
    exporter:   Exporter,
    builders:   Vec<Box<dyn TableBuilder>>,
}

impl EtlEngine {
    pub fn new(config: EtlConfig, store: Store) -> Self {
        let exporter = Exporter::new(config.out_path());
        Self {
            config,
            store,
            exporter,
            builders: Vec::new(),
        }
    }

    /// Open the configured database file and register every builder.
    pub fn open(config: EtlConfig) -> EtlResult<Self> {
        let path = config.database_path();
        log::info!("Connecting to {}...", path.display());
        let store = Store::open(&path)
            .inspect_err(|e| log::error!("Unable to connect to the database: {e}"))?;
        Ok(Self::build(config, store))
    }

    /// Wire an engine around an existing store with the builders registered
    /// in load order.
    pub fn build(config: EtlConfig, store: Store) -> Self {
        let mut engine = Self::new(config, store);
        engine.register(Box::new(RevenueFactBuilder));
        engine.register(Box::new(AgencyDimBuilder));
        engine.register(Box::new(ProductDimBuilder));
        engine
    }

    /// In-memory engine rooted at `root` (tests).
    pub fn build_test(root: impl Into<std::path::PathBuf>) -> EtlResult<Self> {
        Ok(Self::build(EtlConfig::with_root(root), Store::in_memory()?))
    }

    pub fn register(&mut self, builder: Box<dyn TableBuilder>) {
        self.builders.push(builder);
    }

    pub fn config(&self) -> &EtlConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    // ── load ───────────────────────────────────────────────────

    /// Rebuild the whole warehouse from the configured extract.
    pub fn load(&mut self) -> EtlResult<LoadSummary> {
        log::info!("Loading the data warehouse...");

        log::info!("Wiping the database...");
        self.store
            .reset()
            .inspect_err(|e| log::error!("There was an error resetting the database: {e}"))?;

        let staging = load_staging(&mut self.store, &self.config.source_csv_path())?;
        let mut summary = LoadSummary {
            tables: vec![(crate::schema::STAGING_TABLE, staging.len())],
        };

        for builder in &self.builders {
            let name = builder.table_name();
            log::info!("Loading the {name} table...");
            let written = builder
                .build(&staging)
                .and_then(|table| {
                    self.store
                        .replace_table(name, &table, builder.column_types())
                        .map(|_| table.len())
                })
                .map_err(|e| EtlError::Build {
                    table: name,
                    source: Box::new(e),
                })
                .inspect_err(|e| log::error!("There was an error loading the {name} table: {e}"))?;
            log::info!("The {name} table was successfully loaded ({written} rows).");
            summary.tables.push((name, written));
        }

        log::info!("The data warehouse was loaded successfully.");
        Ok(summary)
    }

    // ── Reports ────────────────────────────────────────────────

    /// Net cash flows for the most recent years of one agency.
    pub fn cash_flows(&self, agency_id: AgencyId) -> EtlResult<Table> {
        log::info!(
            "Creating report for the last {} years of net cash flows for agency {agency_id}...",
            self.config.cash_flow_years
        );
        let rows = self
            .store
            .cash_flow_rows(agency_id)
            .map_err(|e| EtlError::Query {
                report: "cash_flows",
                source: Box::new(e),
            })
            .inspect_err(|e| log::error!("There was an error building the net cash flows dataset: {e}"))?;
        Ok(report::net_cash_flows(&rows, self.config.cash_flow_years))
    }

    /// Written premium ranking for one agency and year.
    pub fn profitability(&self, agency_id: AgencyId, year: Year) -> EtlResult<Table> {
        log::info!("Creating profitability report for agency {agency_id} for {year}...");
        let rows = self
            .store
            .written_premium_rows(agency_id, year)
            .map_err(|e| EtlError::Query {
                report: "profitability",
                source: Box::new(e),
            })
            .inspect_err(|e| log::error!("There was an error building the profitability dataset: {e}"))?;
        Ok(report::profitability(&rows))
    }

    /// `cashflows` command: report then export. The destination is checked
    /// before anything is read.
    pub fn export_cash_flows(
        &self,
        agency_id: AgencyId,
        destination: &str,
        console: &mut dyn Write,
    ) -> EtlResult<Table> {
        let destination = parse_destination(destination)?;
        let table = self.cash_flows(agency_id)?;
        self.exporter.export(
            &format!("cash_flows_id-{agency_id}"),
            &table,
            destination,
            console,
        )?;
        Ok(table)
    }

    /// `profitability` command: report then export.
    pub fn export_profitability(
        &self,
        agency_id: AgencyId,
        year: Year,
        destination: &str,
        console: &mut dyn Write,
    ) -> EtlResult<Table> {
        let destination = parse_destination(destination)?;
        let table = self.profitability(agency_id, year)?;
        self.exporter.export(
            &format!("profitability_id-{agency_id}_yr-{year}"),
            &table,
            destination,
            console,
        )?;
        Ok(table)
    }
}

fn parse_destination(raw: &str) -> EtlResult<Destination> {
    raw.parse::<Destination>()
        .inspect_err(|e| log::error!("Unrecognized destination argument: {e}"))
}
