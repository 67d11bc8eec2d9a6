//! Evaluation results and attached metadata.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::category::DetectedHarmCategory;

/// Metadata attached to every evaluation result.
///
/// Built by the evaluation facade (or its fallback path), never by the
/// policy engine itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetadata {
    /// Name of the classification provider.
    pub provider: String,
    /// Wall-clock time the evaluation took, in milliseconds.
    pub processing_time_ms: u64,
    /// When the evaluation completed.
    pub evaluated_at: DateTime<Utc>,
    /// Upstream request id, when the provider returned one.
    pub request_id: Option<String>,
    /// Free-form extra entries (model name, fallback reason, streaming
    /// chunk details).
    pub additional_data: BTreeMap<String, serde_json::Value>,
}

impl EvaluationMetadata {
    /// Creates metadata for the given provider, stamped now.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            processing_time_ms: 0,
            evaluated_at: Utc::now(),
            request_id: None,
            additional_data: BTreeMap::new(),
        }
    }

    /// Sets the processing time.
    pub fn with_processing_time(mut self, elapsed_ms: u64) -> Self {
        self.processing_time_ms = elapsed_ms;
        self
    }

    /// Sets the upstream request id.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Adds one extra metadata entry.
    pub fn with_extra(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.additional_data.insert(key.into(), value);
        self
    }
}

/// The policy engine's verdict, before metadata is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyDecision {
    /// Whether the content passed the policy.
    pub is_safe: bool,
    /// Categories that crossed their configured threshold, in
    /// category-check order.
    pub detected_categories: Vec<DetectedHarmCategory>,
    /// Aggregate risk score, 0-100.
    pub risk_score: u8,
    /// Human-readable recommendations for the caller.
    pub recommendations: Vec<String>,
}

impl PolicyDecision {
    /// A decision that found nothing.
    pub fn safe() -> Self {
        Self {
            is_safe: true,
            detected_categories: Vec::new(),
            risk_score: 0,
            recommendations: Vec::new(),
        }
    }

    /// Turns this decision into a full result by attaching metadata.
    pub fn into_result(self, metadata: EvaluationMetadata) -> EvaluationResult {
        EvaluationResult {
            is_safe: self.is_safe,
            detected_categories: self.detected_categories,
            risk_score: self.risk_score,
            recommendations: self.recommendations,
            metadata,
        }
    }
}

/// Result of evaluating one piece of content.
///
/// Invariant: `is_safe` is false exactly when `detected_categories` is
/// non-empty and at least one entry's severity met its configured
/// threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    /// Whether the content passed the configured policy.
    pub is_safe: bool,
    /// Categories that crossed their threshold, in category-check order.
    pub detected_categories: Vec<DetectedHarmCategory>,
    /// Aggregate risk score, 0-100.
    pub risk_score: u8,
    /// Human-readable recommendations for the caller.
    pub recommendations: Vec<String>,
    /// Provider, timing, and request details.
    pub metadata: EvaluationMetadata,
}

impl EvaluationResult {
    /// Creates a safe result with no detections.
    pub fn safe(metadata: EvaluationMetadata) -> Self {
        PolicyDecision::safe().into_result(metadata)
    }

    /// Returns true if any category was detected.
    pub fn has_detections(&self) -> bool {
        !self.detected_categories.is_empty()
    }

    /// Returns the detection with the highest severity, if any.
    pub fn highest_severity(&self) -> Option<&DetectedHarmCategory> {
        self.detected_categories.iter().max_by_key(|d| d.severity)
    }
}
