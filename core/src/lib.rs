//! arpa-lm-core
//!
//! Bigram/trigram backoff language model read from ARPA files.
//!
//! The crate parses an ARPA model into dense in-memory tables, scores token
//! sequences with standard backoff (natural-log results), and snapshots the
//! built tables with bincode so a model can be reloaded without re-parsing.
//!
//! Public API:
//! - `LmConfig` - reserved tokens and scoring options
//! - `LanguageModel` - immutable model with backoff and sequence scorers
//! - `load_model` / `save_model` / `load_saved_model` - file entry points
//! - `LmError` - typed failures (format, argument, unsupported, io)
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub mod error;
pub use error::{LmError, Result};

pub mod vocab;
pub use vocab::{Vocabulary, WordId};

pub mod tables;
pub use tables::{BigramTable, MissingEntryPolicy, ProbBackoff, TrigramTable, UnigramTable};

pub mod model;
pub use model::{LanguageModel, ModelMeta, ModelStats};

pub mod arpa;

pub mod snapshot;

/// Options applied when a model is built from ARPA text.
///
/// Stored scoring options travel with the model into snapshots, so a
/// reloaded model scores exactly like the one that was saved.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LmConfig {
    /// Sentence-start token. Default: `<s>`
    pub start_token: String,
    /// Sentence-end token. Default: `</s>`
    pub end_token: String,
    /// Token used for out-of-vocabulary words. Default: `<unk>`
    pub unk_token: String,
    /// How bigram/trigram lookups recognise a missing entry.
    /// Default: `presence` (key presence). `zero` also treats a stored
    /// log-probability of exactly 0.0 as missing.
    pub missing_entry: MissingEntryPolicy,
    /// Add the transition into the sentence-end token to sequence scores.
    /// Default: false
    pub score_sentence_end: bool,
}

impl Default for LmConfig {
    fn default() -> Self {
        Self {
            start_token: "<s>".to_string(),
            end_token: "</s>".to_string(),
            unk_token: "<unk>".to_string(),
            missing_entry: MissingEntryPolicy::Presence,
            score_sentence_end: false,
        }
    }
}

impl LmConfig {
    /// Default options with custom reserved tokens.
    pub fn with_tokens(start: &str, end: &str, unknown: &str) -> Self {
        Self {
            start_token: start.to_string(),
            end_token: end.to_string(),
            unk_token: unknown.to_string(),
            ..Self::default()
        }
    }

    /// Load configuration from a TOML file.
    pub fn load_toml<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("read config {}", path.display()))?;
        let config: LmConfig = toml::from_str(&content)
            .with_context(|| format!("parse config {}", path.display()))?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save_toml<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).with_context(|| format!("write config {}", path.display()))?;
        Ok(())
    }

    /// Load configuration from TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Serialize configuration to TOML string.
    pub fn to_toml_string(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

impl LanguageModel {
    /// Parse ARPA text from any buffered reader.
    pub fn from_arpa_reader<R: std::io::BufRead>(reader: R, config: &LmConfig) -> Result<Self> {
        arpa::parse(reader, config)
    }

    /// Write a bincode snapshot of this model.
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<()> {
        snapshot::save(self, writer)
    }

    /// Read a model from a bincode snapshot.
    pub fn load<R: std::io::Read>(reader: R) -> Result<Self> {
        snapshot::load(reader)
    }
}

/// Parse the ARPA file at `path`.
pub fn load_model<P: AsRef<Path>>(path: P, config: &LmConfig) -> Result<LanguageModel> {
    let file = File::open(path)?;
    arpa::parse(BufReader::new(file), config)
}

/// Snapshot `model` to `path`.
pub fn save_model<P: AsRef<Path>>(model: &LanguageModel, path: P) -> Result<()> {
    snapshot::save_to_path(model, path)
}

/// Load a snapshot written by [`save_model`].
pub fn load_saved_model<P: AsRef<Path>>(path: P) -> Result<LanguageModel> {
    snapshot::load_from_path(path)
}
