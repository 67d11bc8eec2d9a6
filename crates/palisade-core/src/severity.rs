//! Severity mapping from raw classifier scores.
//!
//! Converts a continuous classifier confidence in [0, 1] into a discrete
//! severity level (0-7) and a confidence percentage (0-100).

use crate::category::HarmCategory;

/// Score breakpoints for severity levels 0 through 7.
///
/// A score maps to the smallest index whose breakpoint it does not exceed:
/// 0.05 -> 0, 0.15 -> 1, 0.8 -> 6, 1.0 -> 7.
pub const SEVERITY_BREAKPOINTS: [f64; 8] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.8, 1.0];

/// Maximum severity level.
pub const MAX_SEVERITY: u8 = 7;

/// Maps a raw classifier score to a discrete severity level.
///
/// Scores outside [0, 1] should not occur for a well-formed classifier
/// response and map to severity 0.
pub fn severity_for_score(score: f64) -> u8 {
    if !(0.0..=1.0).contains(&score) {
        return 0;
    }
    for (level, breakpoint) in SEVERITY_BREAKPOINTS.iter().enumerate() {
        if score <= *breakpoint {
            return level as u8;
        }
    }
    MAX_SEVERITY
}

/// Maps a raw classifier score to a confidence percentage.
pub fn confidence_for_score(score: f64) -> u8 {
    (score * 100.0).floor().clamp(0.0, 100.0) as u8
}

/// Coarse severity band used in detection descriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeverityBand {
    /// Severity 0-2.
    Low,
    /// Severity 3-4.
    Medium,
    /// Severity 5-6.
    High,
    /// Severity 7.
    VeryHigh,
}

impl SeverityBand {
    /// Returns the band for a severity level.
    pub fn from_severity(severity: u8) -> Self {
        match severity {
            0..=2 => Self::Low,
            3..=4 => Self::Medium,
            5..=6 => Self::High,
            _ => Self::VeryHigh,
        }
    }

    /// Returns a human-readable label for this band.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::VeryHigh => "very high",
        }
    }
}

/// Renders a detection description for a category at a severity level.
///
/// `context` names what was evaluated, normally "content"; the streaming
/// path passes "streaming content".
pub fn describe(category: HarmCategory, severity: u8, context: &str) -> String {
    let band = SeverityBand::from_severity(severity);
    format!(
        "{} content detected in {} at {} severity",
        category.name(),
        context,
        band.label()
    )
}
