//! Capability tiers for provider routing

use serde::{Deserialize, Serialize};

use crate::{BifrostError, Result};

/// Named capability/cost class mapping to an ordered provider list.
///
/// The mapping itself lives in configuration (loaded once at startup);
/// the tier is just the key callers pass to
/// [`ProviderRouter::complete`](crate::router::ProviderRouter::complete).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderTier {
    /// Cheap and quick: lookups, short replies.
    Fast,
    /// Default for general conversation.
    Balanced,
    /// Best reasoning, highest cost.
    Deep,
}

impl ProviderTier {
    /// Parse a tier name, accepting the legacy aliases `auto` (balanced)
    /// and `smart` (deep) used by earlier deployments.
    pub fn parse(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "fast" => Ok(ProviderTier::Fast),
            "balanced" | "auto" => Ok(ProviderTier::Balanced),
            "deep" | "smart" => Ok(ProviderTier::Deep),
            other => Err(BifrostError::InvalidInput(format!(
                "unknown tier '{other}'"
            ))),
        }
    }

    /// Stable lowercase name, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderTier::Fast => "fast",
            ProviderTier::Balanced => "balanced",
            ProviderTier::Deep => "deep",
        }
    }
}

impl std::fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ProviderTier {
    type Err = BifrostError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
