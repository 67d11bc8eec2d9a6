//! Harm categories and detection records for content-safety evaluation.

use serde::{Deserialize, Serialize};

/// Harm categories that content can be evaluated against.
///
/// The first four are actively scored by the moderation endpoint. The rest
/// are reserved in the policy surface but carry no wire fields yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HarmCategory {
    /// Hate speech or discrimination.
    Hate,
    /// Content related to self-harm or suicide.
    SelfHarm,
    /// Adult or sexually explicit content.
    Sexual,
    /// Content promoting or describing violence.
    Violence,
    /// Suggestive but not explicit content (reserved).
    Suggestive,
    /// Profane language (reserved).
    Profanity,
    /// Personal or identifying data (reserved).
    PersonalData,
    /// Content inappropriate for the configured age band (reserved).
    AgeInappropriate,
}

impl HarmCategory {
    /// Returns all categories, including reserved ones.
    pub fn all() -> &'static [HarmCategory] {
        &[
            HarmCategory::Hate,
            HarmCategory::SelfHarm,
            HarmCategory::Sexual,
            HarmCategory::Violence,
            HarmCategory::Suggestive,
            HarmCategory::Profanity,
            HarmCategory::PersonalData,
            HarmCategory::AgeInappropriate,
        ]
    }

    /// Returns the actively scored categories, in evaluation order.
    ///
    /// This order is load-bearing: the policy engine checks categories in
    /// exactly this sequence, and detection lists preserve it.
    pub fn active() -> &'static [HarmCategory] {
        &[
            HarmCategory::Hate,
            HarmCategory::SelfHarm,
            HarmCategory::Sexual,
            HarmCategory::Violence,
        ]
    }

    /// Returns a human-readable name for this category.
    pub fn name(&self) -> &'static str {
        match self {
            HarmCategory::Hate => "Hate",
            HarmCategory::SelfHarm => "Self-Harm",
            HarmCategory::Sexual => "Sexual",
            HarmCategory::Violence => "Violence",
            HarmCategory::Suggestive => "Suggestive",
            HarmCategory::Profanity => "Profanity",
            HarmCategory::PersonalData => "Personal Data",
            HarmCategory::AgeInappropriate => "Age-Inappropriate",
        }
    }

    /// Returns true if the moderation endpoint scores this category.
    pub fn is_actively_scored(&self) -> bool {
        matches!(
            self,
            HarmCategory::Hate
                | HarmCategory::SelfHarm
                | HarmCategory::Sexual
                | HarmCategory::Violence
        )
    }
}

impl std::fmt::Display for HarmCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One raw classifier signal for a single category.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategorySignal {
    /// The category the signal applies to.
    pub category: HarmCategory,
    /// Whether the classifier flagged this category.
    pub flagged: bool,
    /// Raw classifier confidence in [0, 1].
    pub score: f64,
}

impl CategorySignal {
    /// Creates a new signal.
    pub fn new(category: HarmCategory, flagged: bool, score: f64) -> Self {
        Self {
            category,
            flagged,
            score,
        }
    }
}

/// A harm category detected during an evaluation.
///
/// Created once per flagged category per evaluation; never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedHarmCategory {
    /// The detected category.
    pub category: HarmCategory,
    /// Discrete severity level, 0 (none) to 7 (maximum).
    pub severity: u8,
    /// Classifier confidence as a percentage, 0 to 100.
    pub confidence: u8,
    /// Human-readable description of the detection.
    pub description: String,
    /// Text segments that triggered the detection, when the classifier
    /// reports them. The moderation endpoint currently returns none.
    pub triggering_segments: Vec<String>,
}

impl DetectedHarmCategory {
    /// Creates a new detection record.
    pub fn new(
        category: HarmCategory,
        severity: u8,
        confidence: u8,
        description: impl Into<String>,
    ) -> Self {
        Self {
            category,
            severity: severity.min(7),
            confidence: confidence.min(100),
            description: description.into(),
            triggering_segments: Vec::new(),
        }
    }

    /// Attaches triggering segments to this detection.
    pub fn with_segments(mut self, segments: Vec<String>) -> Self {
        self.triggering_segments = segments;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_returns_every_variant() {
        assert_eq!(HarmCategory::all().len(), 8);
    }

    #[test]
    fn active_returns_scored_categories_in_check_order() {
        assert_eq!(
            HarmCategory::active(),
            &[
                HarmCategory::Hate,
                HarmCategory::SelfHarm,
                HarmCategory::Sexual,
                HarmCategory::Violence,
            ]
        );
    }

    #[test]
    fn reserved_categories_are_not_actively_scored() {
        assert!(HarmCategory::Hate.is_actively_scored());
        assert!(!HarmCategory::Profanity.is_actively_scored());
        assert!(!HarmCategory::PersonalData.is_actively_scored());
    }

    #[test]
    fn detection_clamps_severity_and_confidence() {
        let d = DetectedHarmCategory::new(HarmCategory::Violence, 12, 250, "over the top");
        assert_eq!(d.severity, 7);
        assert_eq!(d.confidence, 100);
    }

    #[test]
    fn serde_uses_snake_case() {
        let json = serde_json::to_string(&HarmCategory::SelfHarm).unwrap();
        assert_eq!(json, "\"self_harm\"");
        let back: HarmCategory = serde_json::from_str("\"age_inappropriate\"").unwrap();
        assert_eq!(back, HarmCategory::AgeInappropriate);
    }
}
