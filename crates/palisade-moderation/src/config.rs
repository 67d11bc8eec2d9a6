//! Moderation service configuration.
//!
//! Loaded once (normally deserialized from the application's settings
//! file) and immutable at runtime. API-key precedence is resolved in
//! exactly one place, [`ModerationConfig::resolve_api_key`].

use serde::{Deserialize, Serialize};

use palisade_core::policy::PolicySettings;

/// Default moderation endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/moderations";

/// Default moderation model.
pub const DEFAULT_MODEL: &str = "text-moderation-latest";

/// Default provider label attached to result metadata.
pub const DEFAULT_PROVIDER: &str = "openai-moderation";

/// Environment variables consulted for the API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["PALISADE_API_KEY", "OPENAI_API_KEY"];

/// What to answer when the moderation service cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackBehavior {
    /// Treat unreachable classification as safe (permissive).
    #[default]
    FailOpen,
    /// Treat unreachable classification as a conservative block.
    FailClosed,
}

impl FallbackBehavior {
    /// Returns the behavior as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FailOpen => "fail_open",
            Self::FailClosed => "fail_closed",
        }
    }
}

/// Timeout, retry, and circuit-breaker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceSettings {
    /// Per-attempt deadline in milliseconds.
    pub timeout_ms: u64,
    /// Retries after the first failed attempt.
    pub max_retries: u32,
    /// Base delay between retries in milliseconds.
    pub retry_delay_ms: u64,
    /// Consecutive failures before the circuit opens. Zero disables the
    /// circuit breaker.
    pub circuit_breaker_threshold: u32,
    /// Cooldown before an open circuit allows a trial call.
    pub circuit_breaker_duration_secs: u64,
    /// Whether retry delays grow exponentially.
    pub use_exponential_backoff: bool,
    /// Cap on the backoff multiplier.
    pub max_backoff_multiplier: u32,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            timeout_ms: 5_000,
            max_retries: 3,
            retry_delay_ms: 500,
            circuit_breaker_threshold: 5,
            circuit_breaker_duration_secs: 30,
            use_exponential_backoff: true,
            max_backoff_multiplier: 8,
        }
    }
}

impl ResilienceSettings {
    /// Returns the delay before the retry following failed attempt
    /// `attempt` (zero-based).
    pub fn retry_delay(&self, attempt: u32) -> std::time::Duration {
        let multiplier = if self.use_exponential_backoff {
            2u64.saturating_pow(attempt)
                .min(u64::from(self.max_backoff_multiplier.max(1)))
        } else {
            1
        };
        std::time::Duration::from_millis(self.retry_delay_ms.saturating_mul(multiplier))
    }
}

/// Complete moderation configuration.
///
/// One instance per process; the evaluator clones what it needs at
/// construction and never reads mutable configuration afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModerationConfig {
    /// Master switch. When false every evaluation short-circuits to safe.
    pub enabled: bool,
    /// Moderation endpoint URL.
    pub endpoint: String,
    /// Explicit API key. Highest precedence.
    pub api_key: Option<String>,
    /// Deprecated API-key field kept for configurations written by older
    /// releases. Second precedence.
    pub legacy_api_key: Option<String>,
    /// Optional organization id sent as a request header.
    pub organization: Option<String>,
    /// Moderation model name sent with each request.
    pub model: String,
    /// Provider label attached to result metadata.
    pub provider: String,
    /// Verdict synthesized when the service cannot be reached.
    pub fallback_behavior: FallbackBehavior,
    /// Policy applied to user-supplied input.
    pub input_policy: PolicySettings,
    /// Policy applied to model output. Typically stricter.
    pub output_policy: PolicySettings,
    /// Timeout, retry, and circuit-breaker settings.
    pub resilience: ResilienceSettings,
    /// Upper bound on concurrent batch evaluations.
    pub max_concurrent_evaluations: usize,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            api_key: None,
            legacy_api_key: None,
            organization: None,
            model: DEFAULT_MODEL.to_string(),
            provider: DEFAULT_PROVIDER.to_string(),
            fallback_behavior: FallbackBehavior::default(),
            input_policy: PolicySettings::input_defaults(),
            output_policy: PolicySettings::output_defaults(),
            resilience: ResilienceSettings::default(),
            max_concurrent_evaluations: 8,
        }
    }
}

impl ModerationConfig {
    /// Resolves the API key from the ordered candidate sources: the
    /// explicit `api_key` setting, the deprecated `legacy_api_key`
    /// setting, then the [`API_KEY_ENV_VARS`] environment variables.
    /// First non-empty candidate wins.
    pub fn resolve_api_key(&self) -> Option<String> {
        let env_candidates = API_KEY_ENV_VARS.iter().map(|var| std::env::var(var).ok());
        first_non_empty(
            [self.api_key.clone(), self.legacy_api_key.clone()]
                .into_iter()
                .chain(env_candidates),
        )
    }
}

/// Returns the first candidate that is present and non-blank.
fn first_non_empty(candidates: impl IntoIterator<Item = Option<String>>) -> Option<String> {
    candidates
        .into_iter()
        .flatten()
        .find(|candidate| !candidate.trim().is_empty())
}
