use super::{load_registry, schema_paths};
use crate::config::Config;
use anyhow::{bail, Result};
use clap::Args;
use colored::Colorize;
use std::path::{Path, PathBuf};
use treeform_codec::{DocumentCodec, LoadWarning};
use treeform_dom::{IntegrityWarning, ReferenceValidator, UniquenessValidator, WarningLevel};

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Document to check
    pub document: PathBuf,

    /// Schema files (defaults to the configured schemas)
    #[arg(short, long = "schema")]
    pub schemas: Vec<PathBuf>,
}

/// Findings for one document
#[derive(Debug, Default)]
pub struct CheckSummary {
    pub skipped: Vec<LoadWarning>,
    pub integrity: Vec<IntegrityWarning>,
}

impl CheckSummary {
    pub fn error_count(&self) -> usize {
        self.integrity
            .iter()
            .filter(|w| w.level == WarningLevel::Error)
            .count()
    }

    pub fn warning_count(&self) -> usize {
        self.skipped.len() + self.integrity.len() - self.error_count()
    }
}

pub fn check(args: CheckArgs, cwd: &str) -> Result<()> {
    let config = Config::load(cwd)?;
    let paths = schema_paths(&args.schemas, &config, cwd)?;
    let document = Path::new(cwd).join(&args.document);

    println!("🔍 {} {}", "Checking".green().bold(), document.display());
    let summary = check_document(&paths, &document)?;

    for warning in &summary.skipped {
        println!("   {} {}", "warning:".yellow(), warning);
    }
    for finding in &summary.integrity {
        let level = match finding.level {
            WarningLevel::Error => "error:".red(),
            WarningLevel::Warning => "warning:".yellow(),
        };
        println!("   {} {}", level, finding.message);
    }

    println!();
    let errors = summary.error_count();
    if errors > 0 {
        bail!(
            "{} integrity errors, {} warnings",
            errors,
            summary.warning_count()
        );
    }
    println!(
        "✨ {} {} warnings",
        "Done".green().bold(),
        summary.warning_count()
    );
    Ok(())
}

/// Load a document and run the integrity validators over it
pub fn check_document(schemas: &[PathBuf], document: &Path) -> Result<CheckSummary> {
    let codec = DocumentCodec::new(load_registry(schemas)?);
    let (root, report) = codec.load_path(document)?;
    tracing::debug!(
        document = %document.display(),
        nodes = root.subtree().len(),
        skipped = report.warnings.len(),
        "loaded document"
    );

    let uniqueness = UniquenessValidator::attach(&root);
    let references = ReferenceValidator::attach(&root);
    let mut integrity = uniqueness.violations();
    integrity.extend(references.violations());
    uniqueness.detach();
    references.detach();

    Ok(CheckSummary {
        skipped: report.warnings,
        integrity,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use treeform_dom::IntegrityKind;

    const ASSETS: &str = r#"
        namespace "urn:assets" as a;
        type textureType { attr name: string id; }
        type materialType { attr name: string id; attr texture: ref(textureType); }
        type libraryType { child texture: textureType*; child material: materialType*; }
        root library: libraryType;
    "#;

    fn write_fixture(dir: &Path, body: &str) -> PathBuf {
        fs::write(dir.join("assets.tfs"), ASSETS).unwrap();
        let document = dir.join("library.xml");
        fs::write(
            &document,
            format!(r#"<library xmlns="urn:assets">{}</library>"#, body),
        )
        .unwrap();
        document
    }

    #[test]
    fn test_clean_document() {
        let dir = tempfile::tempdir().unwrap();
        let document = write_fixture(
            dir.path(),
            r#"<texture name="brick"/><material name="wall" texture="brick"/>"#,
        );

        let summary = check_document(&[dir.path().join("assets.tfs")], &document).unwrap();
        assert!(summary.integrity.is_empty());
        assert!(summary.skipped.is_empty());
    }

    #[test]
    fn test_reports_collisions_and_dangling_references() {
        let dir = tempfile::tempdir().unwrap();
        let document = write_fixture(
            dir.path(),
            r#"<texture name="brick"/><texture name="brick" shiny="yes"/><material name="wall" texture="stone"/>"#,
        );

        let summary = check_document(&[dir.path().join("assets.tfs")], &document).unwrap();
        assert_eq!(summary.skipped.len(), 1);
        assert!(summary
            .integrity
            .iter()
            .any(|w| matches!(&w.kind, IntegrityKind::Collision { value, .. } if value == "brick")));
        assert!(summary.integrity.iter().any(|w| matches!(
            &w.kind,
            IntegrityKind::DanglingReference { target, .. } if target == "stone"
        )));

        let args = CheckArgs {
            document: PathBuf::from("library.xml"),
            schemas: vec![PathBuf::from("assets.tfs")],
        };
        assert!(check(args, dir.path().to_str().unwrap()).is_err());
    }
}
