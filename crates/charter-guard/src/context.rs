// context.rs: caller-supplied state threaded through the pipeline stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::GuardError;

/// Metadata key consulted when `writeConfirmation` is not set directly.
pub const WRITE_CONFIRMATION_KEY: &str = "writeConfirmation";

/// Per-request context. The guard never stores it between calls.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PipelineContext {
    /// The farmer on whose behalf the request runs. Accepts a JSON string
    /// or number.
    #[serde(
        default,
        deserialize_with = "deserialize_farmer_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub farmer_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// The keyword (`INSERT`, `UPDATE`, `DELETE`) the user typed to confirm
    /// a write.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_confirmation: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_farmer(farmer_id: impl Into<String>) -> Self {
        Self {
            farmer_id: Some(farmer_id.into()),
            ..Self::default()
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_write_confirmation(mut self, keyword: impl Into<String>) -> Self {
        self.write_confirmation = Some(keyword.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// The confirmation keyword, falling back to `metadata.writeConfirmation`.
    pub fn write_confirmation(&self) -> Option<&str> {
        self.write_confirmation
            .as_deref()
            .or_else(|| self.metadata.get(WRITE_CONFIRMATION_KEY).map(String::as_str))
    }

    /// Reject contexts no stage can make sense of.
    pub fn validate(&self) -> Result<(), GuardError> {
        if let Some(id) = &self.farmer_id {
            if id.trim().is_empty() {
                return Err(GuardError::MalformedContext {
                    reason: "farmerId is present but empty".to_string(),
                });
            }
        }
        if self.metadata.keys().any(|k| k.trim().is_empty()) {
            return Err(GuardError::MalformedContext {
                reason: "metadata contains an empty key".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a JSON context.
    pub fn from_json(json: &str) -> Result<Self, GuardError> {
        let context: Self =
            serde_json::from_str(json).map_err(|e| GuardError::MalformedContext {
                reason: e.to_string(),
            })?;
        context.validate()?;
        Ok(context)
    }
}

fn deserialize_farmer_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(Option::<RawId>::deserialize(deserializer)?.map(|raw| match raw {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    }))
}
