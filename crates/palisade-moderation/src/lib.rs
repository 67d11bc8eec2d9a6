//! Palisade Moderation - remote classification and evaluation facade.
//!
//! This crate wires the pure policy engine from `palisade-core` to a
//! remote moderation endpoint: an HTTP classification client, a resilience
//! wrapper (timeout, retry, circuit breaker, fallback verdicts), a
//! streaming buffer evaluator, and the [`SafetyEvaluator`] facade the chat
//! transport consumes.
//!
//! ## Example
//!
//! ```no_run
//! use palisade_moderation::{ModerationConfig, SafetyEvaluator};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = ModerationConfig::default();
//!     let evaluator = SafetyEvaluator::new(config).unwrap();
//!     let result = evaluator.evaluate_input("Hello, how are you today?").await;
//!     assert!(result.is_safe);
//! }
//! ```

pub mod circuit;
pub mod client;
pub mod config;
pub mod error;
pub mod evaluator;
pub mod resilience;
pub mod streaming;

pub use circuit::{CircuitBreaker, CircuitMetrics, CircuitState};
pub use client::{
    ClassifierBackend, HttpModerationClient, ModerationOutcome, ModerationRequest,
    ModerationResponse,
};
pub use config::{FallbackBehavior, ModerationConfig, ResilienceSettings};
pub use error::{ClientError, ClientResult, StreamingError, StreamingResult};
pub use evaluator::{SafetyEvaluator, SafetyStatus};
pub use resilience::{ResilientClassifier, FALLBACK_REASON_KEY};
pub use streaming::StreamingEvaluator;
