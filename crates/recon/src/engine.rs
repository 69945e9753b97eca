use std::path::Path;

use log::debug;

use crate::config::{resolve_path, ReconConfig, ReferenceConfig};
use crate::error::ReconError;
use crate::model::{ReconMeta, ReconReport, Strategy};
use crate::source::{csv_reference, load_csv_file, CsvOptions, ReferenceSource};
use crate::sqlite::SqliteReference;

/// Open the reference collaborator described by the config.
pub fn open_reference(
    config: &ReconConfig,
    base_dir: &Path,
) -> Result<Box<dyn ReferenceSource>, ReconError> {
    match &config.reference {
        ReferenceConfig::Csv {
            file,
            delimiter,
            empty_as_null,
        } => {
            let options = CsvOptions {
                delimiter: crate::config::parse_delimiter(delimiter.as_deref())?,
                empty_as_null: *empty_as_null,
            };
            Ok(Box::new(csv_reference(&resolve_path(base_dir, file), &options)?))
        }
        ReferenceConfig::Sqlite { path, table } => {
            Ok(Box::new(SqliteReference::open(&resolve_path(base_dir, path), table)?))
        }
    }
}

/// Run reconciliation per config. Relative paths resolve against `base_dir`.
/// `strategy` overrides the configured strategy when set.
pub fn run(
    config: &ReconConfig,
    base_dir: &Path,
    strategy: Option<Strategy>,
) -> Result<ReconReport, ReconError> {
    let strategy = strategy.unwrap_or(config.strategy);
    let source_path = resolve_path(base_dir, &config.source.file);
    let source = load_csv_file(&source_path, &config.source_csv_options()?)?;
    debug!("loaded {} source rows from {}", source.len(), source_path.display());

    let reference = open_reference(config, base_dir)?;
    let result = config.reconciler()?.run(source, &reference, strategy)?;

    let meta = ReconMeta::new(&config.name, strategy, config.primary_keys.clone());
    Ok(ReconReport::new(meta, result))
}
