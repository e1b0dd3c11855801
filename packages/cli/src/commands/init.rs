use crate::config::{Config, GenerateConfig, DEFAULT_CONFIG_NAME};
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::fs;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Schema directory
    #[arg(short, long, default_value = "schemas")]
    pub schema_dir: String,

    /// Force overwrite existing config
    #[arg(short, long)]
    pub force: bool,
}

const EXAMPLE_SCHEMA: &str = r#"namespace "urn:example:notes" as notes;

type noteType {
    attr title: string = "";
    attr pinned: bool = false;
    child reply: noteType*;
}

root note: noteType;
"#;

pub fn init(args: InitArgs, cwd: &str) -> Result<()> {
    let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

    if config_path.exists() && !args.force {
        println!(
            "{} {} already exists",
            "⚠️".yellow(),
            DEFAULT_CONFIG_NAME.bright_white()
        );
        println!("Use --force to overwrite");
        return Ok(());
    }

    println!("{}", "📝 Initializing treeform project...".bright_blue().bold());

    let schema_dir = PathBuf::from(cwd).join(&args.schema_dir);
    if !schema_dir.exists() {
        fs::create_dir_all(&schema_dir)?;
        println!("  {} Created {}/", "✓".green(), args.schema_dir);
    }

    let example = schema_dir.join("notes.tfs");
    if !example.exists() {
        fs::write(&example, EXAMPLE_SCHEMA)?;
        println!("  {} Created {}/notes.tfs", "✓".green(), args.schema_dir);
    }

    let config = Config {
        schemas: vec![format!("{}/notes.tfs", args.schema_dir)],
        generate: GenerateConfig {
            out: Some("src/handles.rs".to_string()),
            ..GenerateConfig::default()
        },
        ..Config::default()
    };
    let config_json = serde_json::to_string_pretty(&config)?;
    tracing::debug!(path = %config_path.display(), "writing config");
    fs::write(&config_path, config_json)?;

    println!("  {} Created {}", "✓".green(), DEFAULT_CONFIG_NAME);
    println!();
    println!("{}", "✅ Project initialized!".green().bold());
    println!();
    println!("Next steps:");
    println!("  1. Edit {}/notes.tfs", args.schema_dir);
    println!("  2. Run: treeform gen");

    Ok(())
}
