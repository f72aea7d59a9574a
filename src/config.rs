//! Engine configuration
//!
//! `defaults/hilite.default.toml` is embedded into the crate so documentation
//! and runtime defaults cannot drift apart. [`Loader`] layers, lowest first:
//!
//! 1. the embedded defaults
//! 2. a user TOML file (`hilite --config FILE`)
//! 3. `HILITE_*` environment variables (`HILITE_CLASS_PREFIX`,
//!    `HILITE_SAFE_MODE`, `HILITE_AUTODETECT_CANDIDATES=json,bash`)
//! 4. explicit settings from the caller
//!
//! and deserializes the result into [`EngineConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, Map};
use serde::{Deserialize, Serialize};
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/hilite.default.toml");
const ENV_PREFIX: &str = "HILITE";
const CANDIDATES_KEY: &str = "autodetect_candidates";

/// Process-wide engine settings. Set once, then only read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Prefix for HTML class names (`hljs-keyword`).
    pub class_prefix: String,
    /// Convert illegal lexemes into flagged plain-text results.
    pub safe_mode: bool,
    /// Grammars tried by autodetection; empty means all registered ones.
    #[serde(default)]
    pub autodetect_candidates: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            class_prefix: "hljs-".to_string(),
            safe_mode: true,
            autodetect_candidates: Vec::new(),
        }
    }
}

/// Builds an [`EngineConfig`] from the embedded defaults plus user layers.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a TOML file. A missing file is an error at [`Loader::build`].
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer `HILITE_*` variables from the process environment.
    pub fn with_env(self) -> Self {
        self.with_environment(None)
    }

    fn with_environment(mut self, vars: Option<Map<String, String>>) -> Self {
        let source = Environment::with_prefix(ENV_PREFIX)
            .try_parsing(true)
            .list_separator(",")
            .with_list_parse_key(CANDIDATES_KEY)
            .source(vars);
        self.builder = self.builder.add_source(source);
        self
    }

    pub fn class_prefix(mut self, prefix: &str) -> Result<Self, ConfigError> {
        self.builder = self.builder.set_override("class_prefix", prefix)?;
        Ok(self)
    }

    pub fn safe_mode(mut self, safe_mode: bool) -> Result<Self, ConfigError> {
        self.builder = self.builder.set_override("safe_mode", safe_mode)?;
        Ok(self)
    }

    pub fn autodetect_candidates<I, S>(mut self, names: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names: Vec<String> = names.into_iter().map(|n| n.as_ref().to_string()).collect();
        self.builder = self.builder.set_override(CANDIDATES_KEY, names)?;
        Ok(self)
    }

    /// Merge the layers. Candidate names are lowercased to match registry
    /// lookups, and blank entries (`HILITE_AUTODETECT_CANDIDATES=json,`) dropped.
    pub fn build(self) -> Result<EngineConfig, ConfigError> {
        let mut config: EngineConfig = self.builder.build()?.try_deserialize()?;
        config.autodetect_candidates = config
            .autodetect_candidates
            .iter()
            .map(|name| name.trim().to_lowercase())
            .filter(|name| !name.is_empty())
            .collect();
        Ok(config)
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}
