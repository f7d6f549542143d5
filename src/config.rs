//! TOML configuration: transaction defaults, logging and the type schema.
//!
//! ```toml
//! [loading]
//! cache = true
//!
//! [coverage]
//! verify_exact = true
//!
//! [logging]
//! filter = "penumbra=debug"
//!
//! [[types]]
//! id = 1
//! name = "rated"
//! group = 1
//! key_signature = ["stars", "year"]
//! ```

use std::fs;
use std::path::Path;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};

use crate::error::{GraphError, Result};
use crate::query::{InMemoryCatalog, TypeFacts};
use crate::tx::TxOptions;

/// Parsed configuration file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Loading-cache settings.
    pub loading: LoadingSection,
    /// Coverage-analysis settings.
    pub coverage: CoverageSection,
    /// Logging settings.
    pub logging: LoggingSection,
    /// Relation type schema.
    pub types: Vec<TypeFacts>,
}

/// `[loading]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoadingSection {
    /// Record completed fetches and answer covered queries from memory.
    pub cache: bool,
}

impl Default for LoadingSection {
    fn default() -> Self {
        Self { cache: true }
    }
}

/// `[coverage]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoverageSection {
    /// Re-check the results of index-exact fetches.
    pub verify_exact: bool,
}

impl Default for CoverageSection {
    fn default() -> Self {
        Self { verify_exact: true }
    }
}

/// `[logging]` table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    /// `tracing-subscriber` env-filter directive.
    pub filter: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            filter: "warn".to_string(),
        }
    }
}

impl Config {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(contents).map_err(|e| GraphError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses the file at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
            .map_err(|e| match e {
                GraphError::Config(msg) => GraphError::Config(format!("{}: {msg}", path.display())),
                other => other,
            })
    }

    /// Serializes the configuration back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| GraphError::Config(e.to_string()))
    }

    /// Transaction options described by the file.
    pub fn tx_options(&self) -> TxOptions {
        TxOptions::new()
            .loading_cache(self.loading.cache)
            .verify_exact_fetches(self.coverage.verify_exact)
    }

    /// Catalog holding every `[[types]]` entry.
    pub fn catalog(&self) -> InMemoryCatalog {
        self.types
            .iter()
            .cloned()
            .fold(InMemoryCatalog::new(), InMemoryCatalog::with_type)
    }

    fn validate(&self) -> Result<()> {
        let mut ids = FxHashSet::default();
        let mut names = FxHashSet::default();
        for facts in &self.types {
            if !ids.insert(facts.id) {
                return Err(GraphError::Config(format!("duplicate type id {}", facts.id)));
            }
            if !names.insert(facts.name.as_str()) {
                return Err(GraphError::Config(format!(
                    "duplicate type name '{}'",
                    facts.name
                )));
            }
            let mut keys = FxHashSet::default();
            if let Some(key) = facts.key_signature.iter().find(|k| !keys.insert(k.as_str())) {
                return Err(GraphError::Config(format!(
                    "type '{}' repeats key attribute '{key}'",
                    facts.name
                )));
            }
        }
        Ok(())
    }
}
