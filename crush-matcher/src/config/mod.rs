//! Application settings
//!
//! Settings come from an optional TOML file, then environment overrides
//! (`DATABASE_URL`), with sane defaults for everything else.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::services::matching::models::{ANSWER_COUNT, DEFAULT_CAPACITY};
use crate::services::matching::{AnswerWeights, MatchingContext, MissingAnswerPolicy};

/// Environment variable overriding `database.url`
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Top-level settings for the matcher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub matching: MatchingConfig,
    pub consumer: ConsumerConfig,
}

/// Ledger database connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    /// How long a writer waits on a held lock before failing
    pub busy_timeout_ms: u64,
}

/// Weekly matching parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchingConfig {
    pub capacity: usize,
    pub weights_mul: Vec<u32>,
    pub weights_add: Vec<u32>,
    pub missing_answers: MissingAnswerPolicy,
}

/// Queue consumer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsumerConfig {
    /// Records handed to one consumer invocation
    pub batch_size: usize,
    /// Maximum consumer invocations running at once
    pub max_concurrent_batches: usize,
    /// Times a failed batch is handed back before it is given up on
    pub max_redeliveries: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://crush.db".to_string(),
            max_connections: 5,
            busy_timeout_ms: 5_000,
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        let weights = AnswerWeights::default();
        Self {
            capacity: DEFAULT_CAPACITY,
            weights_mul: weights.multiplier.to_vec(),
            weights_add: weights.additive.to_vec(),
            missing_answers: MissingAnswerPolicy::default(),
        }
    }
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,            // SQS default receive batch
            max_concurrent_batches: 4, // Row locks serialize same-user events anyway
            max_redeliveries: 2,
        }
    }
}

impl DatabaseConfig {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

impl MatchingConfig {
    /// Validate and convert into the matching service's context
    pub fn to_context(&self) -> Result<MatchingContext> {
        if self.capacity == 0 {
            anyhow::bail!("matching.capacity must be at least 1");
        }
        let multiplier = weight_array("weights_mul", &self.weights_mul)?;
        let additive = weight_array("weights_add", &self.weights_add)?;

        Ok(MatchingContext {
            capacity: self.capacity,
            weights: AnswerWeights { multiplier, additive },
            missing_answers: self.missing_answers,
        })
    }
}

fn weight_array(name: &str, values: &[u32]) -> Result<[u32; ANSWER_COUNT]> {
    values.try_into().map_err(|_| {
        anyhow::anyhow!("matching.{} needs {} entries, got {}", name, ANSWER_COUNT, values.len())
    })
}

impl Settings {
    /// Default config file location: `<config_dir>/crush-matcher/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("crush-matcher").join("config.toml"))
    }

    /// Parse settings from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let settings: Settings = toml::from_str(text).context("Failed to parse settings TOML")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from `path`, or the default location if it exists,
    /// then apply environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file: {}", path.display()))?;
                Self::from_toml(&text)?
            }
            None => match Self::default_path().filter(|p| p.exists()) {
                Some(default) => {
                    log::debug!("Loading settings from {}", default.display());
                    let text = std::fs::read_to_string(&default).with_context(|| {
                        format!("Failed to read config file: {}", default.display())
                    })?;
                    Self::from_toml(&text)?
                }
                None => Self::default(),
            },
        };

        if let Ok(url) = std::env::var(DATABASE_URL_ENV) {
            if !url.trim().is_empty() {
                settings.database.url = url;
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        self.matching.to_context()?;
        if self.database.max_connections == 0 {
            anyhow::bail!("database.max_connections must be at least 1");
        }
        if self.consumer.batch_size == 0 {
            anyhow::bail!("consumer.batch_size must be at least 1");
        }
        if self.consumer.max_concurrent_batches == 0 {
            anyhow::bail!("consumer.max_concurrent_batches must be at least 1");
        }
        Ok(())
    }
}
