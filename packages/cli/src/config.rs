use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use treeform_codec::WriteOptions;
use treeform_codegen::CompileOptions;

pub const DEFAULT_CONFIG_NAME: &str = "treeform.config.json";

/// treeform configuration file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Schema files, relative to the config directory
    #[serde(default)]
    pub schemas: Vec<String>,

    #[serde(default)]
    pub generate: GenerateConfig,

    #[serde(default)]
    pub write: WriteConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateConfig {
    /// Generated Rust file; stdout when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub out: Option<String>,

    /// JSON manifest of the handle declarations
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<String>,

    #[serde(default)]
    pub annotated_only: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub module_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteConfig {
    #[serde(default = "default_indent")]
    pub indent: usize,

    #[serde(default)]
    pub persist_default_attributes: bool,
}

fn default_indent() -> usize {
    2
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            indent: default_indent(),
            persist_default_attributes: false,
        }
    }
}

impl Config {
    /// Load config from a directory
    pub fn load(cwd: &str) -> anyhow::Result<Self> {
        let config_path = PathBuf::from(cwd).join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    /// Configured schema files as absolute paths
    pub fn schema_paths(&self, cwd: &str) -> Vec<PathBuf> {
        self.schemas
            .iter()
            .map(|schema| PathBuf::from(cwd).join(schema))
            .collect()
    }

    pub fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            annotated_only: self.generate.annotated_only,
            module_name: self.generate.module_name.clone(),
        }
    }

    pub fn write_options(&self) -> WriteOptions {
        WriteOptions {
            indent: self.write.indent,
            persist_default_attributes: self.write.persist_default_attributes,
            ..WriteOptions::default()
        }
    }
}
