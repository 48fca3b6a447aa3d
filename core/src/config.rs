//! Run configuration: where the extract, database, exports and logs live.
//!
//! Every path is relative to `root_dir` unless given absolute.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EtlConfig {
    pub root_dir:        PathBuf,
    /// Source extract read by `load`.
    pub source_csv:      PathBuf,
    pub database:        PathBuf,
    pub out_dir:         PathBuf,
    pub logs_dir:        PathBuf,
    /// Year columns kept by the cash-flow report.
    pub cash_flow_years: usize,
}

impl Default for EtlConfig {
    fn default() -> Self {
        Self {
            root_dir:        PathBuf::from("."),
            source_csv:      PathBuf::from("finalapi.csv"),
            database:        PathBuf::from("insurance.db"),
            out_dir:         PathBuf::from("out"),
            logs_dir:        PathBuf::from("logs"),
            cash_flow_years: 5,
        }
    }
}

impl EtlConfig {
    /// Defaults rooted at `root_dir`.
    pub fn with_root(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
            ..Self::default()
        }
    }

    /// Read a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {}: {e}", path.display()))?;
        let config: EtlConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {}: {e}", path.display()))?;
        if config.cash_flow_years == 0 {
            anyhow::bail!("{}: cash_flow_years must be at least 1", path.display());
        }
        Ok(config)
    }

    fn resolve(&self, p: &Path) -> PathBuf {
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.root_dir.join(p)
        }
    }

    pub fn source_csv_path(&self) -> PathBuf {
        self.resolve(&self.source_csv)
    }

    pub fn database_path(&self) -> PathBuf {
        self.resolve(&self.database)
    }

    pub fn out_path(&self) -> PathBuf {
        self.resolve(&self.out_dir)
    }

    pub fn logs_path(&self) -> PathBuf {
        self.resolve(&self.logs_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn paths_resolve_against_root() {
        let config = EtlConfig::with_root("/srv/etl");
        assert_eq!(config.source_csv_path(), PathBuf::from("/srv/etl/finalapi.csv"));
        assert_eq!(config.database_path(), PathBuf::from("/srv/etl/insurance.db"));
        assert_eq!(config.out_path(), PathBuf::from("/srv/etl/out"));
        assert_eq!(config.logs_path(), PathBuf::from("/srv/etl/logs"));
    }

    #[test]
    fn absolute_paths_are_kept() {
        let config = EtlConfig {
            database: PathBuf::from("/var/db/warehouse.db"),
            ..EtlConfig::with_root("/srv/etl")
        };
        assert_eq!(config.database_path(), PathBuf::from("/var/db/warehouse.db"));
    }

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "source_csv": "extract.csv", "cash_flow_years": 3 }}"#).unwrap();

        let config = EtlConfig::load(file.path()).unwrap();
        assert_eq!(config.source_csv, PathBuf::from("extract.csv"));
        assert_eq!(config.cash_flow_years, 3);
        assert_eq!(config.database, PathBuf::from("insurance.db"));
    }

    #[test]
    fn zero_year_window_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "cash_flow_years": 0 }}"#).unwrap();
        assert!(EtlConfig::load(file.path()).is_err());
    }
}
