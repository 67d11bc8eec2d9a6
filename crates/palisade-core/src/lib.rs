//! Palisade Core - harm-category model, severity mapping, and policy engine.
//!
//! This crate holds the pure, I/O-free half of the Palisade content-safety
//! evaluator: the closed set of harm categories, the mapping from raw
//! classifier scores to discrete severities, aggregate risk scoring, and
//! the per-category policy engine that turns classifier signals into an
//! evaluation verdict.
//!
//! Network access, resilience, and streaming live in `palisade-moderation`.

pub mod category;
pub mod policy;
pub mod result;
pub mod risk;
pub mod severity;

pub use category::{CategorySignal, DetectedHarmCategory, HarmCategory};
pub use policy::{CategoryAction, EvaluationOrigin, PolicyEngine, PolicyScope, PolicySettings};
pub use result::{EvaluationMetadata, EvaluationResult, PolicyDecision};
pub use risk::{risk_score, MAX_RISK_SCORE};
pub use severity::{
    confidence_for_score, describe, severity_for_score, SeverityBand, MAX_SEVERITY,
    SEVERITY_BREAKPOINTS,
};
