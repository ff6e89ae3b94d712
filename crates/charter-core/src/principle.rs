// principle.rs: identifiers of the compliance principles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named compliance principle.
///
/// The first thirteen variants are the rule catalog. `SqlSafety` names the
/// findings of the SQL safety analyzer; it has no catalog rule and never
/// counts toward a compliance score.
///
/// Ordered by declaration for deterministic iteration in BTreeMap.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Principle {
    MangoRule,
    PostgresqlOnly,
    LlmFirst,
    ModuleIndependence,
    PrivacyFirst,
    ApiFirst,
    ErrorIsolation,
    Transparency,
    FarmerCentric,
    ProductionReady,
    Configuration,
    TestDriven,
    CountryAware,
    SqlSafety,
}

impl Principle {
    /// Every principle backed by a catalog rule, in registration order.
    pub const CATALOG: [Principle; 13] = [
        Principle::MangoRule,
        Principle::PostgresqlOnly,
        Principle::LlmFirst,
        Principle::ModuleIndependence,
        Principle::PrivacyFirst,
        Principle::ApiFirst,
        Principle::ErrorIsolation,
        Principle::Transparency,
        Principle::FarmerCentric,
        Principle::ProductionReady,
        Principle::Configuration,
        Principle::TestDriven,
        Principle::CountryAware,
    ];

    /// The stable wire name (e.g. `MANGO_RULE`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Principle::MangoRule => "MANGO_RULE",
            Principle::PostgresqlOnly => "POSTGRESQL_ONLY",
            Principle::LlmFirst => "LLM_FIRST",
            Principle::ModuleIndependence => "MODULE_INDEPENDENCE",
            Principle::PrivacyFirst => "PRIVACY_FIRST",
            Principle::ApiFirst => "API_FIRST",
            Principle::ErrorIsolation => "ERROR_ISOLATION",
            Principle::Transparency => "TRANSPARENCY",
            Principle::FarmerCentric => "FARMER_CENTRIC",
            Principle::ProductionReady => "PRODUCTION_READY",
            Principle::Configuration => "CONFIGURATION",
            Principle::TestDriven => "TEST_DRIVEN",
            Principle::CountryAware => "COUNTRY_AWARE",
            Principle::SqlSafety => "SQL_SAFETY",
        }
    }

    /// One-line description of what the principle protects.
    pub fn summary(&self) -> &'static str {
        match self {
            Principle::MangoRule => "Works for any crop in any country; never refuses by crop or region",
            Principle::PostgresqlOnly => "PostgreSQL is the only approved datastore",
            Principle::LlmFirst => "Decisions and translations come from the LLM, not hardcoded tables",
            Principle::ModuleIndependence => "Independent services never import each other directly",
            Principle::PrivacyFirst => "Personal data never reaches external APIs",
            Principle::ApiFirst => "Services communicate through APIs",
            Principle::ErrorIsolation => "Failures are handled and contained",
            Principle::Transparency => "Behavior is observable through logging",
            Principle::FarmerCentric => "Professional, respectful tone",
            Principle::ProductionReady => "No development-only settings",
            Principle::Configuration => "Secrets, hosts and ports come from configuration",
            Principle::TestDriven => "Test coverage is tracked",
            Principle::CountryAware => "Language and country are data-driven, not hardcoded",
            Principle::SqlSafety => "Generated SQL is safe to execute",
        }
    }

    /// Whether this principle is backed by a catalog rule.
    pub fn is_catalog(&self) -> bool {
        !matches!(self, Principle::SqlSafety)
    }
}

impl fmt::Display for Principle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known principle.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown principle '{0}'")]
pub struct UnknownPrinciple(pub String);

impl FromStr for Principle {
    type Err = UnknownPrinciple;

    /// Accepts the wire name in any case, with `-` or `_` separators.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace('-', "_");
        Principle::CATALOG
            .iter()
            .chain(std::iter::once(&Principle::SqlSafety))
            .find(|p| p.as_str() == normalized)
            .copied()
            .ok_or_else(|| UnknownPrinciple(s.to_string()))
    }
}
