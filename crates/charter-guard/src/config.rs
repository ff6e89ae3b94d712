//! Configuration loaded from `charter.toml`.
//!
//! ```toml
//! [rules]
//! hardcoded_crops = ["tomato", "corn"]
//! transparency_min_chars = 80
//!
//! [guard]
//! tone_words = ["cute", "darling"]
//! ```
//!
//! Both tables are optional and every field has a default. The SQL keywords
//! that are always blocked are not configurable.

use std::path::Path;

use charter_core::RuleSettings;
use serde::{Deserialize, Serialize};

use crate::error::GuardError;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CharterConfig {
    /// Word lists and thresholds for the rule catalog.
    #[serde(default)]
    pub rules: RuleSettings,

    /// Phrase lists for the pipeline's stage-specific scans.
    #[serde(default)]
    pub guard: GuardSettings,
}

impl CharterConfig {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self, GuardError> {
        let content = std::fs::read_to_string(path).map_err(|source| GuardError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| GuardError::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load from `path`, falling back to defaults when the file is missing.
    /// An unreadable or invalid file is logged and ignored.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring charter config");
                Self::default()
            }
        }
    }
}

/// Stage-specific phrase lists. Matching is case-insensitive substring
/// matching unless noted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GuardSettings {
    /// Query phrasing that presumes a farmer can be refused (CRITICAL).
    #[serde(default = "default_discriminatory_phrases")]
    pub discriminatory_phrases: Vec<String>,

    /// Query phrasing that volunteers personal data (WARNING).
    #[serde(default = "default_personal_data_phrases")]
    pub personal_data_phrases: Vec<String>,

    /// Response phrasing that refuses help (CRITICAL).
    #[serde(default = "default_refusal_phrases")]
    pub refusal_phrases: Vec<String>,

    /// Informal words in responses (WARNING). Matched as whole words.
    #[serde(default = "default_tone_words")]
    pub tone_words: Vec<String>,
}

impl Default for GuardSettings {
    fn default() -> Self {
        Self {
            discriminatory_phrases: default_discriminatory_phrases(),
            personal_data_phrases: default_personal_data_phrases(),
            refusal_phrases: default_refusal_phrases(),
            tone_words: default_tone_words(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_discriminatory_phrases() -> Vec<String> {
    strings(&[
        "only available in",
        "not supported in",
        "invalid for country",
        "unsupported crop",
        "not possible in",
    ])
}

fn default_personal_data_phrases() -> Vec<String> {
    strings(&["my name is", "phone number", "my address", "my email"])
}

fn default_refusal_phrases() -> Vec<String> {
    strings(&[
        "cannot help",
        "not possible",
        "unsupported",
        "not available in your country",
        "invalid crop",
    ])
}

fn default_tone_words() -> Vec<String> {
    strings(&["cute", "sweet", "darling", "honey"])
}
