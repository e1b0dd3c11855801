use super::{load_schemas, schema_paths};
use crate::config::Config;
use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::{Path, PathBuf};
use treeform_codegen::{compile, CodeGenerator, ManifestGenerator, RustGenerator};

#[derive(Debug, Args)]
pub struct GenArgs {
    /// Schema files (defaults to the configured schemas)
    pub schemas: Vec<PathBuf>,

    /// Emit only types marked @include
    #[arg(long)]
    pub annotated_only: bool,

    /// Wrap the generated modules in one outer module
    #[arg(long)]
    pub module_name: Option<String>,

    /// Generated Rust file (overrides config; stdout when neither is set)
    #[arg(short, long)]
    pub out: Option<PathBuf>,

    /// Also write the declarations as a JSON manifest
    #[arg(long)]
    pub manifest: Option<PathBuf>,
}

pub fn gen(args: GenArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let paths = schema_paths(&args.schemas, &config, cwd)?;
    let schemas = load_schemas(&paths)?;

    let mut options = config.compile_options();
    options.annotated_only |= args.annotated_only;
    if args.module_name.is_some() {
        options.module_name = args.module_name.clone();
    }

    let decls = compile(&schemas, &options);
    tracing::debug!(
        types = decls.type_count(),
        annotated_only = options.annotated_only,
        "compiled schemas"
    );
    let source = RustGenerator::new().generate(&decls)?;

    let out = args
        .out
        .clone()
        .or_else(|| config.generate.out.as_ref().map(PathBuf::from));
    let manifest = args
        .manifest
        .clone()
        .or_else(|| config.generate.manifest.as_ref().map(PathBuf::from));

    match out {
        Some(out) => {
            let path = write_output(cwd, &out, &source)?;
            println!(
                "  {} {} types → {}",
                "✓".green(),
                decls.type_count(),
                path.display()
            );
        }
        None => print!("{}", source),
    }

    if let Some(manifest) = manifest {
        let json = ManifestGenerator.generate(&decls)?;
        let path = write_output(cwd, &manifest, &json)?;
        println!("  {} manifest → {}", "✓".green(), path.display());
    }

    Ok(())
}

fn write_output(cwd: &str, relative: &Path, content: &str) -> Result<PathBuf> {
    let path = Path::new(cwd).join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
