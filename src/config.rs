//! Configuration loading for the orchestration core.
//!
//! All configuration is read once at process startup and treated as
//! immutable for the process lifetime: per-resource token-bucket
//! parameters, per-tier ordered provider lists, and default cache TTLs
//! per namespace. Secrets are referenced by environment variable name
//! rather than stored inline.
//!
//! ```toml
//! [resources.anthropic]
//! capacity = 10
//! refill_rate = 0.5
//!
//! [providers.anthropic]
//! kind = "anthropic"
//! api_key_env = "ANTHROPIC_API_KEY"
//!
//! [tiers]
//! fast = [{ provider = "anthropic", model = "claude-3-5-haiku-20241022" }]
//! balanced = [
//!     { provider = "anthropic", model = "claude-sonnet-4" },
//!     { provider = "openai", model = "gpt-4o" },
//! ]
//! deep = [{ provider = "anthropic", model = "claude-opus-4" }]
//!
//! [namespaces]
//! "cache:weather" = 600
//! "cache:calendar" = 300
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::limiter::BucketConfig;
use crate::retry::RetryPolicy;
use crate::types::ProviderTier;
use crate::{BifrostError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BifrostConfig {
    /// Token-bucket parameters per resource name.
    #[serde(default)]
    pub resources: HashMap<String, BucketConfig>,
    /// Provider connection settings, keyed by provider id.
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
    /// Ordered provider lists per tier.
    #[serde(default)]
    pub tiers: TierRoutes,
    /// Default cache TTL per namespace, in seconds.
    #[serde(default)]
    pub namespaces: HashMap<String, u64>,
    /// Per-provider-attempt retry settings.
    #[serde(default)]
    pub retry: RetrySettings,
}

impl BifrostConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| BifrostError::Configuration(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|e| {
            BifrostError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    /// Cross-check the pieces against each other: bucket parameters must
    /// be usable, tier routes must reference declared providers, and each
    /// provider's limiter resource must have a bucket.
    pub fn validate(&self) -> Result<()> {
        for (name, bucket) in &self.resources {
            if bucket.capacity == 0 {
                return Err(BifrostError::Configuration(format!(
                    "resource '{name}': capacity must be at least 1"
                )));
            }
            if !bucket.refill_rate.is_finite() || bucket.refill_rate <= 0.0 {
                return Err(BifrostError::Configuration(format!(
                    "resource '{name}': refill_rate must be a positive number"
                )));
            }
        }
        for tier in [ProviderTier::Fast, ProviderTier::Balanced, ProviderTier::Deep] {
            for entry in self.tiers.route(tier) {
                if !self.providers.contains_key(&entry.provider) {
                    return Err(BifrostError::Configuration(format!(
                        "tier '{tier}' references undeclared provider '{}'",
                        entry.provider
                    )));
                }
            }
        }
        for (id, provider) in &self.providers {
            let resource = provider.resource.as_deref().unwrap_or(id);
            if !self.resources.contains_key(resource) {
                return Err(BifrostError::Configuration(format!(
                    "provider '{id}' draws from resource '{resource}', which has no rate limit configured"
                )));
            }
        }
        Ok(())
    }

    /// Namespace TTLs as durations.
    pub fn namespace_ttls(&self) -> HashMap<String, Duration> {
        self.namespaces
            .iter()
            .map(|(ns, secs)| (ns.clone(), Duration::from_secs(*secs)))
            .collect()
    }
}

/// Ordered `(provider, model)` route per tier, primary first.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TierRoutes {
    #[serde(default)]
    pub fast: Vec<RouteEntry>,
    #[serde(default)]
    pub balanced: Vec<RouteEntry>,
    #[serde(default)]
    pub deep: Vec<RouteEntry>,
}

impl TierRoutes {
    /// The ordered provider list for a tier.
    pub fn route(&self, tier: ProviderTier) -> &[RouteEntry] {
        match tier {
            ProviderTier::Fast => &self.fast,
            ProviderTier::Balanced => &self.balanced,
            ProviderTier::Deep => &self.deep,
        }
    }
}

/// One `(provider, model)` pair in a tier's route.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RouteEntry {
    pub provider: String,
    pub model: String,
}

/// Which adapter implementation a provider entry uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Anthropic,
    Openai,
}

/// Connection settings for one provider.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// Inline API key. Prefer `api_key_env` outside of tests.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    /// Override the provider's base URL (testing, proxies).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Rate-limiter resource this provider draws from.
    /// Defaults to the provider id.
    #[serde(default)]
    pub resource: Option<String>,
}

impl ProviderConfig {
    /// Resolve the API key: inline value first, then the named
    /// environment variable.
    pub fn resolve_api_key(&self, provider_id: &str) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        if let Some(var) = &self.api_key_env {
            return std::env::var(var).map_err(|_| {
                BifrostError::Configuration(format!(
                    "provider '{provider_id}': environment variable '{var}' not set"
                ))
            });
        }
        Err(BifrostError::Configuration(format!(
            "provider '{provider_id}': no api_key or api_key_env configured"
        )))
    }
}

/// Retry settings applied per provider attempt inside the router.
#[derive(Debug, Clone, Deserialize)]
pub struct RetrySettings {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            jitter_fraction: default_jitter_fraction(),
        }
    }
}

impl RetrySettings {
    /// Convert to an executor policy.
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .max_attempts(self.max_attempts)
            .base_delay(Duration::from_millis(self.base_delay_ms))
            .max_delay(Duration::from_millis(self.max_delay_ms))
            .jitter_fraction(self.jitter_fraction)
    }
}

// Router default: absorb a single transient error per provider before
// failing over.
fn default_max_attempts() -> u32 {
    2
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    4_000
}

fn default_jitter_fraction() -> f64 {
    0.2
}
