//! Lightweight configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (`__` separates nested keys, e.g. `APP_INDEX__API_KEY`), and expands `~`
//! and `${VAR}` in configured paths.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::types::DistanceMetric;

pub struct Config {
    figment: Figment,
}

impl Config {
    pub fn load() -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());

        let mut figment = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file("config.toml"));
        match env_name.as_str() {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment })
    }

    /// Typed view of the whole configuration, validated once.
    pub fn settings(&self) -> Result<Settings> {
        let settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub source: SourceSettings,
    pub embedding: EmbeddingSettings,
    pub index: IndexSettings,
}

impl Settings {
    fn validate(&self) -> Result<()> {
        if self.source.batch_size == 0 {
            return Err(Error::Config("source.batch_size must be positive".into()));
        }
        if !(1..=100).contains(&self.source.temp_quality) {
            return Err(Error::Config("source.temp_quality must be within 1..=100".into()));
        }
        if self.index.dimension == 0 {
            return Err(Error::Config("index.dimension must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSettings {
    pub batch_size: usize,
    pub temp_quality: u8,
}

impl Default for SourceSettings {
    fn default() -> Self {
        Self { batch_size: 10, temp_quality: 95 }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub model_dir: Option<String>,
    pub use_fake: bool,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    #[default]
    Lance,
    Http,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub name: String,
    pub dimension: usize,
    pub metric: DistanceMetric,
    pub namespace: String,
    pub backend: IndexBackend,
    pub lance_dir: String,
    pub api_key: Option<String>,
    pub control_url: String,
    pub host: Option<String>,
    pub timeout_secs: u64,
    pub cloud: String,
    pub region: String,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            name: "nli-search".to_string(),
            dimension: 512,
            metric: DistanceMetric::Cosine,
            namespace: "default".to_string(),
            backend: IndexBackend::Lance,
            lance_dir: "data/lancedb".to_string(),
            api_key: None,
            control_url: "https://api.pinecone.io".to_string(),
            host: None,
            timeout_secs: 30,
            cloud: "aws".to_string(),
            region: "us-west-2".to_string(),
        }
    }
}

impl IndexSettings {
    /// The service credential. Missing or blank is a startup error.
    pub fn require_api_key(&self) -> Result<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(Error::Config(
                "index.api_key is not set (export APP_INDEX__API_KEY)".into(),
            )),
        }
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}
