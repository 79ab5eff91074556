//! # Batch Match Configuration
//!
//! Layered configuration: struct defaults, then an optional TOML/YAML/JSON
//! file, then `BATCHMATCH__*` environment overrides. Nested keys use `__`,
//! e.g. `BATCHMATCH__CONCURRENCY=8` or `BATCHMATCH__MATCHER__ROWS=5`.
//! Similarity fields may be given as a comma-separated list.

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants::{defaults, env, params};
use crate::error::{BatchMatchError, Result};
use crate::query::QueryDescriptor;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchMatchConfig {
    /// Number of concurrent workers
    pub concurrency: usize,
    /// Journal used to make the run resumable; results stay in memory when unset
    pub resume_file: Option<PathBuf>,
    pub matcher: MatcherSettings,
    pub logging: LoggingConfig,
}

impl Default for BatchMatchConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::CONCURRENCY,
            resume_file: None,
            matcher: MatcherSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Parameters the matching configuration is built from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatcherSettings {
    /// Search backend location. Transport only, not part of the descriptor.
    pub server_url: String,
    pub min_doc_freq: u32,
    pub min_term_freq: u32,
    pub boost_interesting_terms: bool,
    /// Candidates returned per item
    pub rows: u32,
    pub similarity_fields: Vec<String>,
}

impl Default for MatcherSettings {
    fn default() -> Self {
        Self {
            server_url: defaults::SERVER_URL.to_string(),
            min_doc_freq: defaults::MIN_DOC_FREQ,
            min_term_freq: defaults::MIN_TERM_FREQ,
            boost_interesting_terms: defaults::BOOST_INTERESTING_TERMS,
            rows: defaults::ROWS,
            similarity_fields: defaults::SIMILARITY_FIELDS
                .iter()
                .map(|field| field.to_string())
                .collect(),
        }
    }
}

impl MatcherSettings {
    /// The more-like-this query descriptor these settings produce
    pub fn query_descriptor(&self) -> QueryDescriptor {
        QueryDescriptor::new()
            .with(params::QUERY_TYPE, params::MLT_HANDLER)
            .with(params::FIELD_LIST, params::SCORE_FIELD)
            .with(params::ROWS, self.rows)
            .with(params::MIN_DOC_FREQ, self.min_doc_freq)
            .with(params::MIN_TERM_FREQ, self.min_term_freq)
            .with(params::BOOST, self.boost_interesting_terms)
            .with(params::SIMILARITY_FIELDS, self.similarity_fields.join(","))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; derived from the environment name when unset
    pub level: Option<String>,
    /// Directory for JSON log files; console only when unset
    pub log_dir: Option<PathBuf>,
}

impl BatchMatchConfig {
    /// Defaults overridden by the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Defaults, then `path` if given, then the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from_sources(path, None)
    }

    /// Like [`BatchMatchConfig::load`], reading environment overrides from
    /// `env_source` instead of the process environment when provided
    pub fn load_from_sources(
        path: Option<&Path>,
        env_source: Option<HashMap<String, String>>,
    ) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            debug!(path = %path.display(), "Loading batch match configuration file");
            builder = builder.add_source(File::from(path).required(true));
        }
        builder = builder.add_source(
            Environment::with_prefix(env::CONFIG_PREFIX)
                .separator(env::CONFIG_SEPARATOR)
                .list_separator(",")
                .with_list_parse_key("matcher.similarity_fields")
                .try_parsing(true)
                .source(env_source),
        );

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(BatchMatchError::Configuration(
                "concurrency must be at least 1".to_string(),
            ));
        }
        if self.matcher.rows == 0 {
            return Err(BatchMatchError::Configuration(
                "matcher.rows must be at least 1".to_string(),
            ));
        }
        if self.matcher.similarity_fields.is_empty() {
            return Err(BatchMatchError::Configuration(
                "matcher.similarity_fields must not be empty".to_string(),
            ));
        }
        if let Some(field) = self
            .matcher
            .similarity_fields
            .iter()
            .find(|field| field.is_empty() || field.contains(','))
        {
            return Err(BatchMatchError::Configuration(format!(
                "invalid similarity field name '{field}'"
            )));
        }
        Ok(())
    }
}
