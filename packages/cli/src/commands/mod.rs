pub mod check;
pub mod fmt;
pub mod gen;
pub mod init;

pub use check::{check, CheckArgs};
pub use fmt::{fmt, FmtArgs};
pub use gen::{gen, GenArgs};
pub use init::{init, InitArgs};

use crate::config::Config;
use anyhow::{anyhow, bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use treeform_dom::TypeRegistry;
use treeform_schema::{format_error, load_sources, SchemaError, SchemaSet};

/// Schema files named on the command line, or the configured ones
pub fn schema_paths(explicit: &[PathBuf], config: &Config, cwd: &str) -> Result<Vec<PathBuf>> {
    let paths = if explicit.is_empty() {
        config.schema_paths(cwd)
    } else {
        explicit
            .iter()
            .map(|path| Path::new(cwd).join(path))
            .collect()
    };
    if paths.is_empty() {
        bail!("No schema files given; pass them on the command line or list them under \"schemas\" in the config");
    }
    Ok(paths)
}

/// Read and resolve schema files, printing parse errors with source context
pub fn load_schemas(paths: &[PathBuf]) -> Result<SchemaSet> {
    let sources = paths
        .iter()
        .map(|path| {
            let source = fs::read_to_string(path)
                .with_context(|| format!("Failed to read schema {}", path.display()))?;
            Ok((path.display().to_string(), source))
        })
        .collect::<Result<Vec<_>>>()?;
    tracing::debug!(files = sources.len(), "loading schemas");

    load_sources(&sources).map_err(|error| match error {
        SchemaError::Parse { file, error } => {
            let source = sources
                .iter()
                .find(|(name, _)| *name == file)
                .map(|(_, source)| source.as_str())
                .unwrap_or_default();
            anyhow!("{}", format_error(source, &file, &error))
        }
        other => anyhow!(other),
    })
}

pub fn load_registry(paths: &[PathBuf]) -> Result<TypeRegistry> {
    Ok(TypeRegistry::from_schema_set(load_schemas(paths)?))
}
