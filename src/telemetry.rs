//! Telemetry metric name constants.
//!
//! Centralised metric names for bifrost operations. Consumers install
//! their own `metrics` recorder (e.g. prometheus, statsd); without a
//! recorder installed, all metric calls are no-ops.
//!
//! # Metric naming conventions
//!
//! All metrics are prefixed with `bifrost_`. Counters end in `_total`,
//! histograms use meaningful units (e.g. `_seconds`).
//!
//! # Common labels
//!
//! - `provider` — provider id (e.g. "anthropic", "openai")
//! - `operation` — operation invoked (e.g. "complete")
//! - `status` — outcome: "ok" or "error"
//! - `resource` — rate-limiter resource name
//! - `namespace` — cache namespace

/// Total completion requests dispatched through the router.
///
/// Labels: `provider`, `status` ("ok" | "error").
pub const REQUESTS_TOTAL: &str = "bifrost_requests_total";

/// Completion request duration in seconds.
///
/// Labels: `provider`.
pub const REQUEST_DURATION_SECONDS: &str = "bifrost_request_duration_seconds";

/// Total retry attempts (not counting the initial request).
///
/// Labels: `operation`.
pub const RETRIES_TOTAL: &str = "bifrost_retries_total";

/// Total failovers to the next provider in a tier.
///
/// Labels: `provider` (the provider that was abandoned).
pub const FAILOVERS_TOTAL: &str = "bifrost_failovers_total";

/// Total cache hits.
///
/// Labels: `namespace`.
pub const CACHE_HITS_TOTAL: &str = "bifrost_cache_hits_total";

/// Total cache misses (including expired entries).
///
/// Labels: `namespace`.
pub const CACHE_MISSES_TOTAL: &str = "bifrost_cache_misses_total";

/// Total rate-limiter grants.
///
/// Labels: `resource`.
pub const LIMITER_GRANTS_TOTAL: &str = "bifrost_limiter_grants_total";

/// Total rate-limiter denials.
///
/// Labels: `resource`.
pub const LIMITER_DENIALS_TOTAL: &str = "bifrost_limiter_denials_total";

/// Total tokens consumed, as reported by providers.
///
/// Labels: `provider`, `direction` ("prompt" | "completion").
pub const TOKENS_TOTAL: &str = "bifrost_tokens_total";
