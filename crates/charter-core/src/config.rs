//! Tunable word lists and thresholds for the rule catalog.
//!
//! Loaded from the `[rules]` table of `charter.toml`. Every field has a
//! default, so an empty table (or no file at all) yields the standard
//! catalog.

use serde::{Deserialize, Serialize};

/// Settings consumed by [`RuleCatalog::standard`](crate::RuleCatalog::standard).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuleSettings {
    /// Crop names that must never appear as literals in branching logic.
    #[serde(default = "default_hardcoded_crops")]
    pub hardcoded_crops: Vec<String>,

    /// Country names/codes that must never appear as literals in branching logic.
    #[serde(default = "default_hardcoded_countries")]
    pub hardcoded_countries: Vec<String>,

    /// Extra refusal regexes for MANGO_RULE, on top of the built-in ones.
    #[serde(default)]
    pub extra_refusal_patterns: Vec<String>,

    /// Datastores other than PostgreSQL.
    #[serde(default = "default_forbidden_datastores")]
    pub forbidden_datastores: Vec<String>,

    /// Substrings that mark a call as going to an external API.
    #[serde(default = "default_external_api_markers")]
    pub external_api_markers: Vec<String>,

    /// Identifiers that carry personal data in source code.
    #[serde(default = "default_personal_data_fields")]
    pub personal_data_fields: Vec<String>,

    /// Columns that carry personal data in SQL.
    #[serde(default = "default_personal_columns")]
    pub personal_columns: Vec<String>,

    /// Services that must not import each other directly.
    #[serde(default = "default_independent_modules")]
    pub independent_modules: Vec<String>,

    /// Informal or diminutive words.
    #[serde(default = "default_informal_terms")]
    pub informal_terms: Vec<String>,

    /// Minimum length (chars) before missing error handling is reported.
    #[serde(default = "default_error_isolation_min_chars")]
    pub error_isolation_min_chars: usize,

    /// Minimum length (chars) before missing logging is reported.
    #[serde(default = "default_transparency_min_chars")]
    pub transparency_min_chars: usize,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            hardcoded_crops: default_hardcoded_crops(),
            hardcoded_countries: default_hardcoded_countries(),
            extra_refusal_patterns: Vec::new(),
            forbidden_datastores: default_forbidden_datastores(),
            external_api_markers: default_external_api_markers(),
            personal_data_fields: default_personal_data_fields(),
            personal_columns: default_personal_columns(),
            independent_modules: default_independent_modules(),
            informal_terms: default_informal_terms(),
            error_isolation_min_chars: default_error_isolation_min_chars(),
            transparency_min_chars: default_transparency_min_chars(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

// Serde default functions
fn default_hardcoded_crops() -> Vec<String> {
    strings(&["tomato", "corn", "wheat", "potato", "rice"])
}

fn default_hardcoded_countries() -> Vec<String> {
    strings(&["croatia", "slovenia", "hungary", "bulgaria", "usa", "us"])
}

fn default_forbidden_datastores() -> Vec<String> {
    strings(&["sqlite", "mysql", "mongodb", "redis", "oracle"])
}

fn default_external_api_markers() -> Vec<String> {
    strings(&[
        "openai",
        "anthropic",
        "perplexity",
        "external",
        "requests.post",
        "requests.get",
        "httpx.",
        "api_client",
        "api.",
    ])
}

fn default_personal_data_fields() -> Vec<String> {
    strings(&[
        "farmer_name",
        "farmer_id",
        "phone",
        "email",
        "address",
        "personal",
    ])
}

fn default_personal_columns() -> Vec<String> {
    strings(&["farmer_name", "phone", "email", "address"])
}

fn default_independent_modules() -> Vec<String> {
    strings(&["ava_olo_monitoring_dashboards", "ava_olo_agricultural_core"])
}

fn default_informal_terms() -> Vec<String> {
    strings(&["cute", "sweet", "adorable", "darling"])
}

fn default_error_isolation_min_chars() -> usize {
    100
}

fn default_transparency_min_chars() -> usize {
    50
}
