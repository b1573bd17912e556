//! Lifecycle configuration types.
//!
//! `LifecycleConfig` represents the top-level `config.toml` that controls
//! cache and transcript TTLs, retry and breaker policies, the generation
//! provider, and persona overrides. Every field has a sensible default.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::persona::PersonaTemplate;

/// Top-level configuration for the session lifecycle.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LifecycleConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub messages: MessageConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retry: RetryPolicies,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Named persona templates; these override the built-in defaults.
    #[serde(default)]
    pub personas: BTreeMap<String, PersonaTemplate>,
}

/// Longest TTL honoured for cache entries and transcripts (ten years).
pub const MAX_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

fn ttl_from_secs(secs: u64) -> chrono::TimeDelta {
    // Clamped so the cast cannot wrap and `now + ttl` cannot overflow.
    chrono::TimeDelta::try_seconds(secs.min(MAX_TTL_SECS) as i64)
        .unwrap_or(chrono::TimeDelta::zero())
}

impl LifecycleConfig {
    /// Reset out-of-range values to their defaults.
    ///
    /// Returns one line per field that was reset, for the loader to log.
    pub fn sanitize(&mut self) -> Vec<String> {
        let mut reset = Vec::new();
        if !(1..=MAX_TTL_SECS).contains(&self.cache.ttl_secs) {
            reset.push(format!(
                "cache.ttl_secs = {} is outside 1..={MAX_TTL_SECS}",
                self.cache.ttl_secs
            ));
            self.cache.ttl_secs = default_cache_ttl_secs();
        }
        if !(1..=MAX_TTL_SECS).contains(&self.messages.ttl_secs) {
            reset.push(format!(
                "messages.ttl_secs = {} is outside 1..={MAX_TTL_SECS}",
                self.messages.ttl_secs
            ));
            self.messages.ttl_secs = default_message_ttl_secs();
        }
        reset
    }
}

/// Context cache policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,
}

fn default_cache_ttl_secs() -> u64 {
    3600
}

impl CacheConfig {
    pub fn ttl(&self) -> chrono::Duration {
        ttl_from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Durable transcript policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageConfig {
    /// Records expire this long after being appended, even if never deleted.
    #[serde(default = "default_message_ttl_secs")]
    pub ttl_secs: u64,
    /// Longest accepted user message, in characters.
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,
}

fn default_message_ttl_secs() -> u64 {
    24 * 3600
}

fn default_max_message_chars() -> usize {
    2000
}

impl MessageConfig {
    pub fn ttl(&self) -> chrono::Duration {
        ttl_from_secs(self.ttl_secs)
    }
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_message_ttl_secs(),
            max_message_chars: default_max_message_chars(),
        }
    }
}

/// Session-end element extraction policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Transcript length sent to the model, in characters; the earliest content is kept.
    #[serde(default = "default_transcript_char_budget")]
    pub transcript_char_budget: usize,
    #[serde(default = "default_extraction_max_tokens")]
    pub max_tokens: u32,
}

fn default_transcript_char_budget() -> usize {
    4000
}

fn default_extraction_max_tokens() -> u32 {
    1024
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            transcript_char_budget: default_transcript_char_budget(),
            max_tokens: default_extraction_max_tokens(),
        }
    }
}

/// Persona reply generation parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Empty means the provider's default model.
    #[serde(default)]
    pub model: String,
    #[serde(default = "default_generation_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_generation_max_tokens() -> u32 {
    512
}

fn default_temperature() -> f64 {
    0.7
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: String::new(),
            max_tokens: default_generation_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

/// Bounded exponential-backoff retry parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    30_000
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl RetryConfig {
    pub fn initial_delay(&self) -> Duration {
        Duration::from_millis(self.initial_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff_multiplier: default_backoff_multiplier(),
        }
    }
}

/// One retry policy per collaborator class.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryPolicies {
    #[serde(default)]
    pub cache_store: RetryConfig,
    #[serde(default)]
    pub durable_store: RetryConfig,
    #[serde(default)]
    pub graph_store: RetryConfig,
    #[serde(default)]
    pub generation: RetryConfig,
}

/// Circuit breaker thresholds, shared by every endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_max_failures")]
    pub max_failures: u32,
    #[serde(default = "default_reset_timeout_secs")]
    pub reset_timeout_secs: u64,
}

fn default_max_failures() -> u32 {
    5
}

fn default_reset_timeout_secs() -> u64 {
    30
}

impl BreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_secs(self.reset_timeout_secs)
    }
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: default_max_failures(),
            reset_timeout_secs: default_reset_timeout_secs(),
        }
    }
}

/// OpenAI-compatible generation provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_name")]
    pub name: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the API key. No key means offline mode.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_provider_name() -> String {
    "openrouter".to_string()
}

fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".to_string()
}

fn default_model() -> String {
    "anthropic/claude-3.5-sonnet".to_string()
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: default_provider_name(),
            base_url: default_base_url(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}
