//! Policy settings and the per-category decision engine.
//!
//! A [`PolicyEngine`] holds one immutable [`PolicySettings`] per evaluation
//! scope (input vs. output) and turns raw classifier signals into a
//! [`PolicyDecision`]. Output content is typically held to stricter
//! thresholds than input.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::category::{CategorySignal, DetectedHarmCategory, HarmCategory};
use crate::result::PolicyDecision;
use crate::risk::risk_score;
use crate::severity::{confidence_for_score, describe, severity_for_score};

/// Action to take when a category crosses its threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryAction {
    /// Block the content entirely.
    #[default]
    Block,
    /// Show a warning but allow the content.
    Warn,
    /// Allow the content without intervention.
    Allow,
}

impl CategoryAction {
    /// Returns a human-readable name for this action.
    pub fn name(&self) -> &'static str {
        match self {
            CategoryAction::Block => "Block",
            CategoryAction::Warn => "Warn",
            CategoryAction::Allow => "Allow",
        }
    }
}

/// Which policy applies to an evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyScope {
    /// User-supplied content entering the system.
    Input,
    /// Model-generated content leaving the system.
    Output,
}

impl PolicyScope {
    /// Returns the scope as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
        }
    }
}

/// How the content under evaluation was produced.
///
/// Streaming evaluations describe detections against "streaming content"
/// and word their recommendations more urgently, since the stream owner is
/// expected to terminate on an unsafe result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvaluationOrigin {
    /// A complete piece of text.
    #[default]
    Complete,
    /// An accumulating stream buffer.
    Streaming,
}

impl EvaluationOrigin {
    /// Returns the context label used in detection descriptions.
    pub fn description_context(&self) -> &'static str {
        match self {
            Self::Complete => "content",
            Self::Streaming => "streaming content",
        }
    }
}

/// Immutable per-scope policy configuration.
///
/// Loaded once at startup and read-only thereafter. `thresholds` maps each
/// category to the minimum severity (0-7) that counts as a violation; a
/// category with no entry never violates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Minimum severity per category for a violation.
    pub thresholds: BTreeMap<HarmCategory, u8>,
    /// Whether violations should block the content.
    pub block_on_violation: bool,
    /// Reserved knob: require violations in more than one category.
    /// Carried in configuration but not consulted by the decision
    /// algorithm.
    pub require_multiple_categories: bool,
    /// Reserved knob: minimum number of violating categories. Carried in
    /// configuration but not consulted by the decision algorithm.
    pub minimum_category_violations: u32,
    /// Reserved knob: maximum tolerated risk score. Carried in
    /// configuration but not consulted by the decision algorithm.
    pub max_risk_score: u8,
    /// Per-category action overrides.
    pub category_actions: BTreeMap<HarmCategory, CategoryAction>,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self::input_defaults()
    }
}

impl PolicySettings {
    /// Default policy for user-supplied input: violations at medium
    /// severity and above.
    pub fn input_defaults() -> Self {
        Self::with_uniform_threshold(4)
    }

    /// Default policy for model output: stricter, violations at low
    /// severity and above.
    pub fn output_defaults() -> Self {
        Self::with_uniform_threshold(2)
    }

    /// Builds a policy with the same threshold for every active category.
    pub fn with_uniform_threshold(threshold: u8) -> Self {
        let thresholds = HarmCategory::active()
            .iter()
            .map(|c| (*c, threshold.min(7)))
            .collect();
        let category_actions = HarmCategory::active()
            .iter()
            .map(|c| (*c, CategoryAction::Block))
            .collect();
        Self {
            thresholds,
            block_on_violation: true,
            require_multiple_categories: false,
            minimum_category_violations: 1,
            max_risk_score: 70,
            category_actions,
        }
    }

    /// Sets the threshold for one category.
    pub fn with_threshold(mut self, category: HarmCategory, threshold: u8) -> Self {
        self.thresholds.insert(category, threshold.min(7));
        self
    }

    /// Returns the threshold for a category, if one is configured.
    pub fn threshold(&self, category: HarmCategory) -> Option<u8> {
        self.thresholds.get(&category).copied()
    }

    /// Returns the configured action for a category.
    pub fn action(&self, category: HarmCategory) -> CategoryAction {
        self.category_actions
            .get(&category)
            .copied()
            .unwrap_or_default()
    }
}

/// Decides overall safety from raw per-category classifier signals.
///
/// Holds one policy per scope; both are immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyEngine {
    input: PolicySettings,
    output: PolicySettings,
}

impl Default for PolicyEngine {
    fn default() -> Self {
        Self::new(PolicySettings::input_defaults(), PolicySettings::output_defaults())
    }
}

impl PolicyEngine {
    /// Creates an engine with the given input and output policies.
    pub fn new(input: PolicySettings, output: PolicySettings) -> Self {
        Self { input, output }
    }

    /// Returns the policy for a scope.
    pub fn policy(&self, scope: PolicyScope) -> &PolicySettings {
        match scope {
            PolicyScope::Input => &self.input,
            PolicyScope::Output => &self.output,
        }
    }

    /// Evaluates raw classifier signals against the policy for `scope`.
    ///
    /// Categories are checked in the fixed order of
    /// [`HarmCategory::active`]. A flagged category below its threshold is
    /// still mapped and trace-logged for observability, but does not appear
    /// in the detection list. The risk score uses the maximum raw score
    /// across all flagged categories, not only those that crossed their
    /// threshold.
    pub fn evaluate(
        &self,
        signals: &[CategorySignal],
        scope: PolicyScope,
        origin: EvaluationOrigin,
    ) -> PolicyDecision {
        let settings = self.policy(scope);
        let context = origin.description_context();

        let mut detected = Vec::new();
        let mut recommendations = Vec::new();
        let mut max_flagged_score = 0.0f64;
        let mut is_safe = true;

        for category in HarmCategory::active() {
            let Some(signal) = signals.iter().find(|s| s.category == *category) else {
                continue;
            };
            if !signal.flagged {
                continue;
            }

            max_flagged_score = max_flagged_score.max(signal.score);

            let severity = severity_for_score(signal.score);
            let confidence = confidence_for_score(signal.score);
            let detection = DetectedHarmCategory::new(
                *category,
                severity,
                confidence,
                describe(*category, severity, context),
            );
            tracing::debug!(
                category = category.name(),
                severity,
                confidence,
                "classifier flagged category"
            );

            let Some(threshold) = settings.threshold(*category) else {
                continue;
            };
            if severity >= threshold {
                is_safe = false;
                detected.push(detection);
                recommendations.push(recommendation_for(*category, origin));
            }
        }

        if !is_safe && recommendations.is_empty() {
            recommendations.push("Content was flagged and should be reviewed.".to_string());
        }

        PolicyDecision {
            is_safe,
            risk_score: risk_score(detected.len(), max_flagged_score),
            detected_categories: detected,
            recommendations,
        }
    }
}

/// Returns the fixed recommendation text for a violating category.
fn recommendation_for(category: HarmCategory, origin: EvaluationOrigin) -> String {
    let text = match (category, origin) {
        (HarmCategory::Hate, EvaluationOrigin::Complete) => {
            "Content contains hate speech or discriminatory language and should be blocked."
        }
        (HarmCategory::Hate, EvaluationOrigin::Streaming) => {
            "Hate speech detected mid-stream; terminate the stream immediately."
        }
        (HarmCategory::SelfHarm, EvaluationOrigin::Complete) => {
            "Content references self-harm; block it and surface support resources."
        }
        (HarmCategory::SelfHarm, EvaluationOrigin::Streaming) => {
            "Self-harm content detected mid-stream; terminate immediately and surface support resources."
        }
        (HarmCategory::Sexual, EvaluationOrigin::Complete) => {
            "Content contains sexual material inappropriate for this context and should be blocked."
        }
        (HarmCategory::Sexual, EvaluationOrigin::Streaming) => {
            "Sexual content detected mid-stream; terminate the stream immediately."
        }
        (HarmCategory::Violence, EvaluationOrigin::Complete) => {
            "Content contains violent or threatening material and should be blocked."
        }
        (HarmCategory::Violence, EvaluationOrigin::Streaming) => {
            "Violent content detected mid-stream; terminate the stream immediately."
        }
        _ => "Content was flagged and should be reviewed.",
    };
    text.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(category: HarmCategory, flagged: bool, score: f64) -> CategorySignal {
        CategorySignal::new(category, flagged, score)
    }

    fn all_clear() -> Vec<CategorySignal> {
        HarmCategory::active()
            .iter()
            .map(|c| signal(*c, false, 0.0))
            .collect()
    }

    #[test]
    fn unflagged_signals_are_safe() {
        let engine = PolicyEngine::default();
        let decision = engine.evaluate(&all_clear(), PolicyScope::Input, EvaluationOrigin::Complete);
        assert!(decision.is_safe);
        assert!(decision.detected_categories.is_empty());
        assert_eq!(decision.risk_score, 0);
        assert!(decision.recommendations.is_empty());
    }

    #[test]
    fn flagged_category_above_threshold_is_a_violation() {
        let engine = PolicyEngine::new(
            PolicySettings::with_uniform_threshold(2),
            PolicySettings::output_defaults(),
        );
        let mut signals = all_clear();
        signals[0] = signal(HarmCategory::Hate, true, 0.8);

        let decision = engine.evaluate(&signals, PolicyScope::Input, EvaluationOrigin::Complete);
        assert!(!decision.is_safe);
        assert_eq!(decision.detected_categories.len(), 1);
        let d = &decision.detected_categories[0];
        assert_eq!(d.category, HarmCategory::Hate);
        assert_eq!(d.severity, 6);
        assert_eq!(d.confidence, 80);
        assert_eq!(decision.risk_score, 80);
        assert_eq!(decision.recommendations.len(), 1);
    }

    #[test]
    fn flagged_category_below_threshold_stays_safe() {
        let engine = PolicyEngine::new(
            PolicySettings::with_uniform_threshold(5),
            PolicySettings::output_defaults(),
        );
        let mut signals = all_clear();
        signals[3] = signal(HarmCategory::Violence, true, 0.3);

        let decision = engine.evaluate(&signals, PolicyScope::Input, EvaluationOrigin::Complete);
        assert!(decision.is_safe);
        assert!(decision.detected_categories.is_empty());
        // No detection list means no risk score, whatever was flagged.
        assert_eq!(decision.risk_score, 0);
    }

    #[test]
    fn missing_threshold_means_never_a_violation() {
        let mut settings = PolicySettings::with_uniform_threshold(0);
        settings.thresholds.remove(&HarmCategory::Sexual);
        let engine = PolicyEngine::new(settings, PolicySettings::output_defaults());

        let mut signals = all_clear();
        signals[2] = signal(HarmCategory::Sexual, true, 0.95);

        let decision = engine.evaluate(&signals, PolicyScope::Input, EvaluationOrigin::Complete);
        assert!(decision.is_safe);
        assert!(decision.detected_categories.is_empty());
    }

    #[test]
    fn detections_preserve_category_check_order() {
        let engine = PolicyEngine::new(
            PolicySettings::with_uniform_threshold(1),
            PolicySettings::output_defaults(),
        );
        let signals = vec![
            signal(HarmCategory::Violence, true, 0.5),
            signal(HarmCategory::Hate, true, 0.5),
            signal(HarmCategory::SelfHarm, true, 0.5),
        ];

        let decision = engine.evaluate(&signals, PolicyScope::Input, EvaluationOrigin::Complete);
        let order: Vec<HarmCategory> = decision
            .detected_categories
            .iter()
            .map(|d| d.category)
            .collect();
        assert_eq!(
            order,
            vec![
                HarmCategory::Hate,
                HarmCategory::SelfHarm,
                HarmCategory::Violence,
            ]
        );
    }

    #[test]
    fn risk_uses_max_score_across_flagged_categories() {
        // Hate crosses the threshold; Violence is flagged but stays below
        // it. The risk score still reflects the stronger Violence signal.
        let engine = PolicyEngine::new(
            PolicySettings::input_defaults()
                .with_threshold(HarmCategory::Hate, 2)
                .with_threshold(HarmCategory::Violence, 7),
            PolicySettings::output_defaults(),
        );
        let mut signals = all_clear();
        signals[0] = signal(HarmCategory::Hate, true, 0.4);
        signals[3] = signal(HarmCategory::Violence, true, 0.7);

        let decision = engine.evaluate(&signals, PolicyScope::Input, EvaluationOrigin::Complete);
        assert!(!decision.is_safe);
        assert_eq!(decision.detected_categories.len(), 1);
        assert_eq!(decision.risk_score, 70);
    }

    #[test]
    fn streaming_origin_words_recommendations_urgently() {
        let engine = PolicyEngine::new(
            PolicySettings::input_defaults(),
            PolicySettings::with_uniform_threshold(2),
        );
        let mut signals = all_clear();
        signals[3] = signal(HarmCategory::Violence, true, 0.9);

        let decision = engine.evaluate(&signals, PolicyScope::Output, EvaluationOrigin::Streaming);
        assert!(!decision.is_safe);
        assert!(decision.recommendations[0].contains("immediately"));
        assert!(decision.detected_categories[0]
            .description
            .contains("streaming content"));
    }

    #[test]
    fn output_defaults_are_stricter_than_input_defaults() {
        let input = PolicySettings::input_defaults();
        let output = PolicySettings::output_defaults();
        for category in HarmCategory::active() {
            assert!(output.threshold(*category) <= input.threshold(*category));
        }
    }

    #[test]
    fn category_actions_default_to_block() {
        let settings = PolicySettings::input_defaults();
        assert_eq!(settings.action(HarmCategory::Hate), CategoryAction::Block);
        // Reserved categories have no entry and fall back to the default.
        assert_eq!(
            settings.action(HarmCategory::Profanity),
            CategoryAction::Block
        );
        assert_eq!(CategoryAction::Warn.name(), "Warn");
    }

    #[test]
    fn scope_selects_the_matching_policy() {
        let engine = PolicyEngine::new(
            PolicySettings::with_uniform_threshold(7),
            PolicySettings::with_uniform_threshold(1),
        );
        let mut signals = all_clear();
        signals[1] = signal(HarmCategory::SelfHarm, true, 0.45);

        let input = engine.evaluate(&signals, PolicyScope::Input, EvaluationOrigin::Complete);
        let output = engine.evaluate(&signals, PolicyScope::Output, EvaluationOrigin::Complete);
        assert!(input.is_safe);
        assert!(!output.is_safe);
    }
}
