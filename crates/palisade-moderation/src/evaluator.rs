//! The public evaluation facade.
//!
//! [`SafetyEvaluator`] is the entry point consumed by the chat transport:
//! whole-text input/output evaluation, bounded batch fan-out, streaming
//! evaluator factories, and a read-only status snapshot. Callers always
//! receive a well-formed [`EvaluationResult`]; classifier failures are
//! absorbed into fallback verdicts and never surface as errors.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use palisade_core::category::HarmCategory;
use palisade_core::policy::{EvaluationOrigin, PolicyEngine, PolicyScope, PolicySettings};
use palisade_core::result::{EvaluationMetadata, EvaluationResult};

use crate::client::{ClassifierBackend, HttpModerationClient};
use crate::config::{FallbackBehavior, ModerationConfig};
use crate::error::ClientResult;
use crate::resilience::{fallback_decision, ResilientClassifier, FALLBACK_REASON_KEY};
use crate::streaming::StreamingEvaluator;

/// Read-only snapshot of the evaluator's configuration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SafetyStatus {
    /// Whether evaluation is enabled.
    pub enabled: bool,
    /// Provider label.
    pub provider: String,
    /// Categories the provider actively scores.
    pub supported_categories: Vec<HarmCategory>,
    /// Policy applied to input content.
    pub input_policy: PolicySettings,
    /// Policy applied to output content.
    pub output_policy: PolicySettings,
    /// Verdict used when the provider is unreachable.
    pub fallback_behavior: FallbackBehavior,
}

/// Shared internals behind every facade clone and streaming evaluator.
pub(crate) struct EvaluatorCore {
    config: ModerationConfig,
    engine: PolicyEngine,
    resilient: Option<ResilientClassifier>,
}

impl EvaluatorCore {
    pub(crate) fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Metadata skeleton for results produced without a classifier call.
    pub(crate) fn base_metadata(&self) -> EvaluationMetadata {
        EvaluationMetadata::new(self.config.provider.as_str())
    }

    /// Runs one full evaluation: classify, decide, attach metadata.
    ///
    /// Classifier failure is converted into the configured fallback
    /// verdict here, so every caller gets a result.
    pub(crate) async fn evaluate(
        &self,
        text: &str,
        scope: PolicyScope,
        origin: EvaluationOrigin,
    ) -> EvaluationResult {
        if !self.config.enabled || text.trim().is_empty() {
            return EvaluationResult::safe(self.base_metadata());
        }
        let Some(resilient) = &self.resilient else {
            return EvaluationResult::safe(self.base_metadata());
        };

        tracing::debug!(
            scope = scope.as_str(),
            chars = text.chars().count(),
            "evaluating content"
        );
        let started = Instant::now();
        match resilient.classify(text).await {
            Ok(response) => {
                let outcome = response.results.into_iter().next().unwrap_or_default();
                let decision = self.engine.evaluate(&outcome.signals(), scope, origin);
                let model = response
                    .model
                    .unwrap_or_else(|| self.config.model.clone());
                let mut metadata = self
                    .base_metadata()
                    .with_processing_time(started.elapsed().as_millis() as u64)
                    .with_extra("model", serde_json::json!(model));
                if let Some(id) = response.id {
                    metadata = metadata.with_request_id(id);
                }
                decision.into_result(metadata)
            }
            Err(error) => {
                let decision = fallback_decision(self.config.fallback_behavior, &error);
                let metadata = self
                    .base_metadata()
                    .with_processing_time(started.elapsed().as_millis() as u64)
                    .with_extra(FALLBACK_REASON_KEY, serde_json::json!(error.to_string()));
                decision.into_result(metadata)
            }
        }
    }
}

/// Content-safety evaluation facade.
///
/// Cheap to clone; all clones share one classifier, one circuit breaker,
/// and one immutable configuration.
#[derive(Clone)]
pub struct SafetyEvaluator {
    core: Arc<EvaluatorCore>,
}

impl std::fmt::Debug for SafetyEvaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SafetyEvaluator")
            .field("enabled", &self.core.config.enabled)
            .field("provider", &self.core.config.provider)
            .finish()
    }
}

impl SafetyEvaluator {
    /// Creates an evaluator backed by the HTTP moderation client.
    ///
    /// Fails only when evaluation is enabled and no API key resolves.
    /// A disabled configuration never needs a client.
    pub fn new(config: ModerationConfig) -> ClientResult<Self> {
        let resilient = if config.enabled {
            let backend: Arc<dyn ClassifierBackend> =
                Arc::new(HttpModerationClient::from_config(&config)?);
            Some(ResilientClassifier::new(backend, config.resilience.clone()))
        } else {
            None
        };
        Ok(Self::assemble(config, resilient))
    }

    /// Creates an evaluator over a caller-supplied backend.
    ///
    /// The seam used by tests and by embedders with their own transport.
    pub fn with_backend(config: ModerationConfig, backend: Arc<dyn ClassifierBackend>) -> Self {
        let resilient = ResilientClassifier::new(backend, config.resilience.clone());
        Self::assemble(config, Some(resilient))
    }

    fn assemble(config: ModerationConfig, resilient: Option<ResilientClassifier>) -> Self {
        let engine = PolicyEngine::new(config.input_policy.clone(), config.output_policy.clone());
        Self {
            core: Arc::new(EvaluatorCore {
                config,
                engine,
                resilient,
            }),
        }
    }

    /// Evaluates user-supplied input against the input policy.
    pub async fn evaluate_input(&self, text: &str) -> EvaluationResult {
        self.core
            .evaluate(text, PolicyScope::Input, EvaluationOrigin::Complete)
            .await
    }

    /// Evaluates model output against the output policy.
    pub async fn evaluate_output(&self, text: &str) -> EvaluationResult {
        self.core
            .evaluate(text, PolicyScope::Output, EvaluationOrigin::Complete)
            .await
    }

    /// Evaluates a batch of inputs independently.
    ///
    /// Results come back in input order. Fan-out is bounded by
    /// `max_concurrent_evaluations` so large batches cannot exhaust
    /// outbound connections or trip provider rate limits.
    pub async fn evaluate_batch(&self, texts: &[String]) -> Vec<EvaluationResult> {
        if !self.core.config.enabled {
            return texts
                .iter()
                .map(|_| EvaluationResult::safe(self.core.base_metadata()))
                .collect();
        }

        let limit = self.core.config.max_concurrent_evaluations.max(1);
        let semaphore = Arc::new(Semaphore::new(limit));
        let mut joins = JoinSet::new();
        for (index, text) in texts.iter().cloned().enumerate() {
            let evaluator = self.clone();
            let semaphore = semaphore.clone();
            joins.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (index, evaluator.evaluate_input(&text).await)
            });
        }

        let mut slots: Vec<Option<EvaluationResult>> = texts.iter().map(|_| None).collect();
        while let Some(joined) = joins.join_next().await {
            if let Ok((index, result)) = joined {
                slots[index] = Some(result);
            }
        }
        slots
            .into_iter()
            .map(|slot| slot.unwrap_or_else(|| EvaluationResult::safe(self.core.base_metadata())))
            .collect()
    }

    /// Creates a fresh streaming evaluator bound to this configuration
    /// and classifier.
    pub fn streaming_evaluator(&self) -> StreamingEvaluator {
        StreamingEvaluator::new(self.core.clone())
    }

    /// Returns the categories the provider actively scores.
    pub fn supported_categories(&self) -> &'static [HarmCategory] {
        HarmCategory::active()
    }

    /// Returns a read-only status snapshot. No side effects.
    pub fn safety_status(&self) -> SafetyStatus {
        SafetyStatus {
            enabled: self.core.config.enabled,
            provider: self.core.config.provider.clone(),
            supported_categories: HarmCategory::active().to_vec(),
            input_policy: self.core.config.input_policy.clone(),
            output_policy: self.core.config.output_policy.clone(),
            fallback_behavior: self.core.config.fallback_behavior,
        }
    }

    /// Returns the provider label.
    pub fn provider_name(&self) -> &str {
        &self.core.config.provider
    }
}
