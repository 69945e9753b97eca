use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::diff::ComparePolicy;
use crate::error::ReconError;
use crate::key::KeySpec;
use crate::model::Strategy;
use crate::reconcile::Reconciler;
use crate::source::CsvOptions;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReconConfig {
    pub name: String,
    pub primary_keys: Vec<String>,
    #[serde(default)]
    pub strategy: Strategy,
    pub source: SourceConfig,
    pub reference: ReferenceConfig,
    #[serde(default)]
    pub compare: ComparePolicy,
    #[serde(default)]
    pub batch: BatchConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

// ---------------------------------------------------------------------------
// Source + reference
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub file: String,
    #[serde(default)]
    pub delimiter: Option<String>,
    #[serde(default = "default_true")]
    pub empty_as_null: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceConfig {
    Csv {
        file: String,
        #[serde(default)]
        delimiter: Option<String>,
        #[serde(default = "default_true")]
        empty_as_null: bool,
    },
    Sqlite {
        path: String,
        table: String,
    },
}

fn default_true() -> bool {
    true
}

// ---------------------------------------------------------------------------
// Batch + output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchConfig {
    #[serde(default)]
    pub max_keys_per_fetch: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub json: Option<String>,
}

impl ReconConfig {
    /// Parse and validate a TOML config string.
    pub fn from_toml(s: &str) -> Result<Self, ReconError> {
        let config: ReconConfig =
            toml::from_str(s).map_err(|e| ReconError::ConfigParse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ReconError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    pub fn validate(&self) -> Result<(), ReconError> {
        if self.name.trim().is_empty() {
            return Err(ReconError::ConfigValidation("name must not be empty".into()));
        }
        self.key_spec()?;
        if self.batch.max_keys_per_fetch == Some(0) {
            return Err(ReconError::ConfigValidation(
                "batch.max_keys_per_fetch must be greater than 0".into(),
            ));
        }
        parse_delimiter(self.source.delimiter.as_deref())?;
        match &self.reference {
            ReferenceConfig::Csv { delimiter, .. } => {
                parse_delimiter(delimiter.as_deref())?;
            }
            ReferenceConfig::Sqlite { table, .. } => crate::sqlite::check_table_name(table)?,
        }
        Ok(())
    }

    pub fn key_spec(&self) -> Result<KeySpec, ReconError> {
        KeySpec::new(&self.primary_keys)
    }

    pub fn reconciler(&self) -> Result<Reconciler, ReconError> {
        Ok(Reconciler::new(self.key_spec()?)
            .with_policy(self.compare.clone())
            .with_max_keys_per_fetch(self.batch.max_keys_per_fetch))
    }

    pub fn source_csv_options(&self) -> Result<CsvOptions, ReconError> {
        Ok(CsvOptions {
            delimiter: parse_delimiter(self.source.delimiter.as_deref())?,
            empty_as_null: self.source.empty_as_null,
        })
    }
}

/// Resolve `file` against the directory holding the config.
pub fn resolve_path(base_dir: &Path, file: &str) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

pub(crate) fn parse_delimiter(d: Option<&str>) -> Result<u8, ReconError> {
    match d {
        None => Ok(b','),
        Some("\\t") | Some("tab") => Ok(b'\t'),
        Some(s) if s.len() == 1 => Ok(s.as_bytes()[0]),
        Some(s) => Err(ReconError::ConfigValidation(format!(
            "delimiter must be a single byte, got '{s}'"
        ))),
    }
}
