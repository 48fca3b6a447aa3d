//! agency-etl: loads the agency extract into SQLite and runs reports.
//!
//! Usage:
//!   agency-etl load
//!   agency-etl cashflows 3 --dest csv
//!   agency-etl profitability 3 2015 -d stdout
//!   agency-etl --root /srv/etl --config etl.json load

mod logging;

use agency_etl_core::{
    config::EtlConfig,
    engine::EtlEngine,
    types::{AgencyId, Year},
};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::{io, path::PathBuf};

#[derive(Debug, Parser)]
#[command(name = "agency-etl", version, about = "Insurance agency data warehouse loader and reports")]
struct Cli {
    /// Directory holding the extract, database, exports and logs.
    #[arg(long, global = true, env = "AGENCY_ETL_ROOT")]
    root: Option<PathBuf>,

    /// JSON configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Rebuild staging and every derived table from the extract.
    Load,
    /// Net cash flows for the most recent years of one agency.
    Cashflows {
        agency_id: AgencyId,
        /// stdout or csv
        #[arg(short, long, default_value = "stdout")]
        dest: String,
    },
    /// Written premium per product for one agency and year.
    Profitability {
        agency_id: AgencyId,
        year: Year,
        /// stdout or csv
        #[arg(short, long, default_value = "stdout")]
        dest: String,
    },
}

impl Cli {
    fn etl_config(&self) -> Result<EtlConfig> {
        let mut config = match &self.config {
            Some(path) => EtlConfig::load(path)?,
            None => EtlConfig::default(),
        };
        if let Some(root) = &self.root {
            config.root_dir = root.clone();
        }
        Ok(config)
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = cli.etl_config()?;
    logging::init(&config.logs_path())?;
    log::debug!("Configuration: {config:?}");

    let mut engine = EtlEngine::open(config)?;
    let mut stdout = io::stdout().lock();

    match cli.command {
        Command::Load => {
            let summary = engine.load()?;
            for (table, rows) in &summary.tables {
                log::debug!("{table}: {rows} rows");
            }
        }
        Command::Cashflows { agency_id, dest } => {
            engine.export_cash_flows(agency_id, &dest, &mut stdout)?;
        }
        Command::Profitability {
            agency_id,
            year,
            dest,
        } => {
            engine.export_profitability(agency_id, year, &dest, &mut stdout)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    run(Cli::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("agency-etl").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn destination_defaults_to_stdout() {
        match parse(&["cashflows", "3"]).command {
            Command::Cashflows { agency_id, dest } => {
                assert_eq!(agency_id, 3);
                assert_eq!(dest, "stdout");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn profitability_takes_agency_year_and_short_dest() {
        match parse(&["profitability", "3", "2015", "-d", "csv"]).command {
            Command::Profitability {
                agency_id,
                year,
                dest,
            } => {
                assert_eq!((agency_id, year), (3, 2015));
                assert_eq!(dest, "csv");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn non_numeric_agency_is_a_usage_error() {
        assert!(Cli::try_parse_from(["agency-etl", "cashflows", "abc"]).is_err());
        assert!(Cli::try_parse_from(["agency-etl", "profitability", "3"]).is_err());
    }

    #[test]
    fn root_overrides_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("etl.json");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, r#"{{"root_dir": "/from/file", "cash_flow_years": 3}}"#).unwrap();

        let cli = parse(&["--root", "/from/flag", "--config", path.to_str().unwrap(), "load"]);
        let config = cli.etl_config().unwrap();
        assert_eq!(config.root_dir, PathBuf::from("/from/flag"));
        assert_eq!(config.cash_flow_years, 3);

        let cli = parse(&["--config", path.to_str().unwrap(), "load"]);
        if std::env::var_os("AGENCY_ETL_ROOT").is_none() {
            assert_eq!(cli.etl_config().unwrap().root_dir, PathBuf::from("/from/file"));
        }
    }
}
