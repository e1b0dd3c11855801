use super::{load_registry, schema_paths};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use treeform_codec::DocumentCodec;

#[derive(Args, Debug)]
pub struct FmtArgs {
    /// Document to format
    pub document: PathBuf,

    /// Schema files (defaults to the configured schemas)
    #[arg(short, long = "schema")]
    pub schemas: Vec<PathBuf>,

    /// Rewrite the document in place instead of printing it
    #[arg(short, long)]
    pub write: bool,

    /// Write every attribute, including those still at their default
    #[arg(long)]
    pub persist_defaults: bool,
}

pub fn fmt(args: FmtArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let paths = schema_paths(&args.schemas, &config, cwd)?;
    let document = Path::new(cwd).join(&args.document);

    let mut options = config.write_options();
    options.persist_default_attributes |= args.persist_defaults;
    tracing::debug!(
        indent = options.indent,
        persist_defaults = options.persist_default_attributes,
        "formatting {}",
        document.display()
    );
    let codec = DocumentCodec::new(load_registry(&paths)?).with_options(options);

    let formatted = format_document(&codec, &document)?;
    if args.write {
        fs::write(&document, &formatted)
            .with_context(|| format!("Failed to write {}", document.display()))?;
        println!("  {} {}", "✓".green(), document.display());
    } else {
        print!("{}", formatted);
    }
    Ok(())
}

/// Canonical form of a document: loaded, then saved with `codec`'s options
pub fn format_document(codec: &DocumentCodec, document: &Path) -> Result<String> {
    let (root, report) = codec
        .load_path(document)
        .with_context(|| format!("Failed to load {}", document.display()))?;
    for warning in &report.warnings {
        eprintln!("  {} {}", "warning:".yellow(), warning);
    }
    Ok(codec.save_to_string(&root)?)
}
