//! Resilience wrapper around a classifier backend.
//!
//! Enforces a per-attempt deadline, retries with fixed or exponential
//! backoff, and feeds a consecutive-failure circuit breaker. When a call
//! cannot be completed at all, the caller synthesizes a fallback verdict
//! from [`fallback_decision`] instead of surfacing an error.

use std::sync::Arc;
use std::time::Duration;

use palisade_core::category::{DetectedHarmCategory, HarmCategory};
use palisade_core::result::PolicyDecision;

use crate::circuit::{CircuitBreaker, CircuitMetrics, CircuitState};
use crate::client::{ClassifierBackend, ModerationResponse};
use crate::config::{FallbackBehavior, ResilienceSettings};
use crate::error::{ClientError, ClientResult};

/// Metadata key recording why a fallback verdict was synthesized.
pub const FALLBACK_REASON_KEY: &str = "fallback_reason";

/// Risk score assigned to a fail-closed fallback verdict.
pub const FALLBACK_RISK_SCORE: u8 = 70;

/// Severity of the conservative stand-in detection in a fail-closed
/// fallback.
pub const FALLBACK_SEVERITY: u8 = 6;

/// Confidence of the conservative stand-in detection, aligned with the
/// fixed fallback risk score.
pub const FALLBACK_CONFIDENCE: u8 = 70;

/// A classifier backend wrapped with timeout, retry, and circuit
/// breaking.
pub struct ResilientClassifier {
    backend: Arc<dyn ClassifierBackend>,
    settings: ResilienceSettings,
    circuit: CircuitBreaker,
}

impl std::fmt::Debug for ResilientClassifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResilientClassifier")
            .field("backend", &self.backend.name())
            .field("settings", &self.settings)
            .field("circuit_state", &self.circuit.state())
            .finish()
    }
}

impl ResilientClassifier {
    /// Wraps a backend with the given resilience settings.
    pub fn new(backend: Arc<dyn ClassifierBackend>, settings: ResilienceSettings) -> Self {
        let circuit = CircuitBreaker::new(
            settings.circuit_breaker_threshold,
            Duration::from_secs(settings.circuit_breaker_duration_secs),
        );
        Self {
            backend,
            settings,
            circuit,
        }
    }

    /// Classifies text, retrying transient failures.
    ///
    /// Returns the first successful response, or the last error once
    /// retries are exhausted or the circuit refuses the call. Dropping the
    /// returned future aborts the in-flight request.
    pub async fn classify(&self, text: &str) -> ClientResult<ModerationResponse> {
        let mut last_error: Option<ClientError> = None;

        for attempt in 0..=self.settings.max_retries {
            if attempt > 0 {
                tokio::time::sleep(self.settings.retry_delay(attempt - 1)).await;
            }
            self.circuit.check()?;

            let deadline = Duration::from_millis(self.settings.timeout_ms);
            let outcome = tokio::time::timeout(deadline, self.backend.classify(text)).await;
            let error = match outcome {
                Ok(Ok(response)) => {
                    self.circuit.record_success();
                    return Ok(response);
                }
                Ok(Err(error)) => error,
                Err(_) => ClientError::Timeout(self.settings.timeout_ms),
            };

            self.circuit.record_failure();
            tracing::warn!(
                backend = self.backend.name(),
                attempt,
                error = %error,
                "moderation call failed"
            );
            if !error.is_retriable() {
                return Err(error);
            }
            last_error = Some(error);
        }

        Err(last_error.unwrap_or(ClientError::CircuitOpen))
    }

    /// Returns the circuit breaker's current state.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Returns the circuit breaker's counters.
    pub fn circuit_metrics(&self) -> CircuitMetrics {
        self.circuit.metrics()
    }
}

/// Synthesizes the policy decision for an unreachable classifier.
///
/// Fail-open answers safe with a risk score of zero; fail-closed blocks
/// with a conservative Violence stand-in at severity
/// [`FALLBACK_SEVERITY`] and risk [`FALLBACK_RISK_SCORE`].
pub fn fallback_decision(behavior: FallbackBehavior, error: &ClientError) -> PolicyDecision {
    tracing::warn!(behavior = behavior.as_str(), error = %error, "synthesizing fallback verdict");
    match behavior {
        FallbackBehavior::FailOpen => PolicyDecision {
            is_safe: true,
            detected_categories: Vec::new(),
            risk_score: 0,
            recommendations: vec![
                "Moderation service unavailable; content allowed per fail-open policy."
                    .to_string(),
            ],
        },
        FallbackBehavior::FailClosed => PolicyDecision {
            is_safe: false,
            detected_categories: vec![DetectedHarmCategory::new(
                HarmCategory::Violence,
                FALLBACK_SEVERITY,
                FALLBACK_CONFIDENCE,
                "Moderation service unavailable; conservative block applied",
            )],
            risk_score: FALLBACK_RISK_SCORE,
            recommendations: vec![
                "Moderation service unavailable; content blocked per fail-closed policy."
                    .to_string(),
            ],
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio_test::{assert_err, assert_ok};

    use crate::client::ModerationOutcome;

    /// What a scripted backend should do on one call.
    enum Step {
        Succeed,
        Fail(u16),
        Hang,
    }

    struct ScriptedBackend {
        steps: Mutex<VecDeque<Step>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(steps: Vec<Step>) -> Arc<Self> {
            Arc::new(Self {
                steps: Mutex::new(steps.into()),
                calls: AtomicU32::new(0),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ClassifierBackend for ScriptedBackend {
        async fn classify(&self, _text: &str) -> ClientResult<ModerationResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let step = self.steps.lock().pop_front();
            match step {
                Some(Step::Succeed) | None => Ok(ModerationResponse {
                    id: Some("modr-test".to_string()),
                    model: Some("test-model".to_string()),
                    results: vec![ModerationOutcome::default()],
                }),
                Some(Step::Fail(status)) => Err(ClientError::Upstream { status }),
                Some(Step::Hang) => std::future::pending().await,
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    fn settings() -> ResilienceSettings {
        ResilienceSettings {
            timeout_ms: 1_000,
            max_retries: 2,
            retry_delay_ms: 10,
            circuit_breaker_threshold: 5,
            circuit_breaker_duration_secs: 30,
            use_exponential_backoff: false,
            max_backoff_multiplier: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_first_success_without_retrying() {
        let backend = ScriptedBackend::new(vec![Step::Succeed]);
        let classifier = ResilientClassifier::new(backend.clone(), settings());

        let response = assert_ok!(classifier.classify("hello").await);
        assert_eq!(response.id.as_deref(), Some("modr-test"));
        assert_eq!(backend.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_until_success() {
        let backend = ScriptedBackend::new(vec![Step::Fail(500), Step::Fail(503), Step::Succeed]);
        let classifier = ResilientClassifier::new(backend.clone(), settings());

        assert_ok!(classifier.classify("hello").await);
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_return_the_last_error() {
        let backend = ScriptedBackend::new(vec![Step::Fail(500), Step::Fail(502), Step::Fail(503)]);
        let classifier = ResilientClassifier::new(backend.clone(), settings());

        let error = assert_err!(classifier.classify("hello").await);
        assert!(matches!(error, ClientError::Upstream { status: 503 }));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_are_retried_like_any_failure() {
        let backend = ScriptedBackend::new(vec![Step::Hang, Step::Succeed]);
        let classifier = ResilientClassifier::new(backend.clone(), settings());

        assert_ok!(classifier.classify("hello").await);
        assert_eq!(backend.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn all_attempts_timing_out_yields_timeout_error() {
        let backend = ScriptedBackend::new(vec![Step::Hang, Step::Hang, Step::Hang]);
        let classifier = ResilientClassifier::new(backend.clone(), settings());

        let error = classifier.classify("hello").await.unwrap_err();
        assert!(matches!(error, ClientError::Timeout(1_000)));
        assert_eq!(backend.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn circuit_opens_and_short_circuits_further_calls() {
        let tight = ResilienceSettings {
            circuit_breaker_threshold: 2,
            max_retries: 0,
            ..settings()
        };
        let backend = ScriptedBackend::new(vec![Step::Fail(500), Step::Fail(500), Step::Succeed]);
        let classifier = ResilientClassifier::new(backend.clone(), tight);

        assert!(classifier.classify("a").await.is_err());
        assert!(classifier.classify("b").await.is_err());
        assert_eq!(classifier.circuit_state(), CircuitState::Open);

        // The third call is refused without reaching the backend.
        let error = classifier.classify("c").await.unwrap_err();
        assert!(matches!(error, ClientError::CircuitOpen));
        assert_eq!(backend.calls(), 2);
        assert_eq!(classifier.circuit_metrics().rejected_calls, 1);
    }

    #[test]
    fn fail_open_fallback_is_safe_with_reasoned_recommendation() {
        let decision =
            fallback_decision(FallbackBehavior::FailOpen, &ClientError::Upstream { status: 500 });
        assert!(decision.is_safe);
        assert_eq!(decision.risk_score, 0);
        assert!(decision.detected_categories.is_empty());
        assert_eq!(decision.recommendations.len(), 1);
        assert!(decision.recommendations[0].contains("fail-open"));
    }

    #[test]
    fn fail_closed_fallback_blocks_with_violence_stand_in() {
        let decision =
            fallback_decision(FallbackBehavior::FailClosed, &ClientError::Timeout(5_000));
        assert!(!decision.is_safe);
        assert_eq!(decision.risk_score, FALLBACK_RISK_SCORE);
        assert_eq!(decision.detected_categories.len(), 1);
        let stand_in = &decision.detected_categories[0];
        assert_eq!(stand_in.category, HarmCategory::Violence);
        assert_eq!(stand_in.severity, FALLBACK_SEVERITY);
        assert!(decision.recommendations[0].contains("blocked"));
    }
}
