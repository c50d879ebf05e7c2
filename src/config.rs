use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::mutate::{Action, MutateConfigError, MutateOptions, MutatePipeline};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    #[error("Invalid [[mutate]] section {index}: {source}")]
    Section {
        index: usize,
        #[source]
        source: MutateConfigError,
    },
}

/// Top-level mutation configuration: the engine toggles plus the
/// `[[mutate]]` sections in file order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MutateConfig {
    /// Dotted field keys address nested structure.
    pub expand_nesting: bool,
    /// Drop empty containers, blank strings and nulls after mutating.
    pub prune_empty: bool,
    pub mutate: Vec<MutatorSection>,
}

impl Default for MutateConfig {
    fn default() -> Self {
        Self {
            expand_nesting: true,
            prune_empty: true,
            mutate: Vec::new(),
        }
    }
}

/// One `[[mutate]]` section: an action kind and its fields block. The
/// block's shape depends on the kind and is validated by the action
/// compiler, not here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutatorSection {
    #[serde(rename = "type")]
    pub kind: String,
    pub fields: toml::Value,
}

impl MutateConfig {
    /// Compiles the raw sections into a ready pipeline. Any invalid
    /// section rejects the whole configuration; section numbers in the
    /// error are 1-based to match the file.
    pub fn build(&self) -> Result<MutatePipeline, ConfigError> {
        let mut actions = Vec::with_capacity(self.mutate.len());
        for (index, section) in self.mutate.iter().enumerate() {
            let params = toml_to_json(&section.fields);
            let action =
                Action::from_spec(&section.kind, &params).map_err(|source| ConfigError::Section {
                    index: index + 1,
                    source,
                })?;
            actions.push(action);
        }

        let options = MutateOptions {
            expand_nesting: self.expand_nesting,
            prune_empty: self.prune_empty,
        };
        Ok(MutatePipeline::new(actions, options))
    }
}

pub fn load_config_from_path(path: &Path) -> Result<MutateConfig, ConfigError> {
    let path_display = path.display().to_string();
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path_display.clone(),
        source,
    })?;

    toml::from_str::<MutateConfig>(&raw).map_err(|source| ConfigError::Parse {
        path: path_display,
        source,
    })
}

/// Action parameters travel as JSON values once they leave the file, so
/// the compiler has a single params shape to validate.
fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(text) => Value::String(text.clone()),
        toml::Value::Integer(n) => Value::from(*n),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(key, item)| (key.clone(), toml_to_json(item)))
                .collect(),
        ),
    }
}
