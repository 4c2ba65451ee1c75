//! Value generation for template tokens
//!
//! Every token in a template needs a list of values before a run can be
//! planned. Lists come from wordlist files, from values given on the command
//! line, or from the value captured when the request was parsed.

use crate::error::{AttackError, AttackResult};
use crate::types::{RequestTemplate, Token};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

/// Trait for producing the value list of one token
#[async_trait]
pub trait ValueGenerator: Send + Sync {
    /// Generate all values for this generator
    async fn generate(&self) -> AttackResult<Vec<String>>;

    /// Get the total count of values without keeping them
    async fn count(&self) -> AttackResult<usize>;

    /// Get a human-readable description of this generator
    fn description(&self) -> String;

    /// Validate the generator configuration
    fn validate(&self) -> AttackResult<()>;
}

/// Where a token's values come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValueSource {
    Wordlist { path: PathBuf },
    Manual { values: Vec<String> },
    /// The value captured at parse time
    Detected,
}

/// Generator for file-based wordlists
#[derive(Debug, Clone)]
pub struct WordlistGenerator {
    path: PathBuf,
}

impl WordlistGenerator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read_lines(&self) -> AttackResult<Vec<String>> {
        let bytes = fs::read(&self.path).await.map_err(|e| {
            AttackError::ValueGenerationFailed {
                reason: format!("Failed to read wordlist {}: {}", self.path.display(), e),
            }
        })?;

        // Undecodable bytes are dropped rather than failing the whole list
        let content = match String::from_utf8(bytes) {
            Ok(content) => content,
            Err(e) => {
                warn!(
                    "Wordlist {} is not valid UTF-8, dropping invalid bytes",
                    self.path.display()
                );
                String::from_utf8_lossy(e.as_bytes())
                    .chars()
                    .filter(|&c| c != char::REPLACEMENT_CHARACTER)
                    .collect()
            }
        };

        Ok(content
            .lines()
            .map(|line| line.trim().to_string())
            .filter(|line| !line.is_empty())
            .collect())
    }
}

#[async_trait]
impl ValueGenerator for WordlistGenerator {
    async fn generate(&self) -> AttackResult<Vec<String>> {
        self.validate()?;

        let values = self.read_lines().await?;
        if values.is_empty() {
            return Err(AttackError::ValueGenerationFailed {
                reason: format!("Wordlist {} contains no values", self.path.display()),
            });
        }

        Ok(values)
    }

    async fn count(&self) -> AttackResult<usize> {
        Ok(self.read_lines().await?.len())
    }

    fn description(&self) -> String {
        format!("Wordlist from file: {}", self.path.display())
    }

    fn validate(&self) -> AttackResult<()> {
        if self.path.as_os_str().is_empty() {
            return Err(AttackError::ValueGenerationFailed {
                reason: "Wordlist path cannot be empty".to_string(),
            });
        }

        if !Path::new(&self.path).is_file() {
            return Err(AttackError::ValueGenerationFailed {
                reason: format!("Wordlist file not found: {}", self.path.display()),
            });
        }

        Ok(())
    }
}

/// Generator for values given directly
#[derive(Debug, Clone)]
pub struct ManualGenerator {
    values: Vec<String>,
}

impl ManualGenerator {
    pub fn new(values: Vec<String>) -> Self {
        Self { values }
    }
}

#[async_trait]
impl ValueGenerator for ManualGenerator {
    async fn generate(&self) -> AttackResult<Vec<String>> {
        self.validate()?;
        Ok(self.values.clone())
    }

    async fn count(&self) -> AttackResult<usize> {
        Ok(self.values.len())
    }

    fn description(&self) -> String {
        format!("Manual values ({} items)", self.values.len())
    }

    fn validate(&self) -> AttackResult<()> {
        if self.values.is_empty() {
            return Err(AttackError::ValueGenerationFailed {
                reason: "Manual value list cannot be empty".to_string(),
            });
        }
        Ok(())
    }
}

/// Single-value generator replaying the detected default
#[derive(Debug, Clone)]
pub struct DetectedGenerator {
    default: String,
}

impl DetectedGenerator {
    pub fn new(token: &Token) -> Self {
        Self {
            default: token.default.clone(),
        }
    }
}

#[async_trait]
impl ValueGenerator for DetectedGenerator {
    async fn generate(&self) -> AttackResult<Vec<String>> {
        Ok(vec![self.default.clone()])
    }

    async fn count(&self) -> AttackResult<usize> {
        Ok(1)
    }

    fn description(&self) -> String {
        format!("Detected value: {}", self.default)
    }

    fn validate(&self) -> AttackResult<()> {
        Ok(())
    }
}

/// Factory for creating value generators from a source
pub struct ValueGeneratorFactory;

impl ValueGeneratorFactory {
    pub fn create(source: &ValueSource, token: &Token) -> Box<dyn ValueGenerator> {
        match source {
            ValueSource::Wordlist { path } => Box::new(WordlistGenerator::new(path.clone())),
            ValueSource::Manual { values } => Box::new(ManualGenerator::new(values.clone())),
            ValueSource::Detected => Box::new(DetectedGenerator::new(token)),
        }
    }
}

/// Resolves every template token to a value list
pub struct ValueResolver;

impl ValueResolver {
    /// Resolve value lists for all tokens of `template`.
    ///
    /// Tokens missing from `sources` fall back to [`ValueSource::Detected`].
    pub async fn resolve(
        template: &RequestTemplate,
        sources: &HashMap<String, ValueSource>,
    ) -> AttackResult<HashMap<String, Vec<String>>> {
        if let Some(unknown) = sources.keys().find(|id| template.token(id).is_none()) {
            return Err(AttackError::UnknownToken {
                token: unknown.clone(),
            });
        }

        let mut lists = HashMap::with_capacity(template.tokens.len());
        for token in &template.tokens {
            let source = sources.get(&token.id).unwrap_or(&ValueSource::Detected);
            let generator = ValueGeneratorFactory::create(source, token);
            debug!("Token {}: {}", token.id, generator.description());

            let values = generator.generate().await?;
            lists.insert(token.id.clone(), values);
        }

        Ok(lists)
    }
}
