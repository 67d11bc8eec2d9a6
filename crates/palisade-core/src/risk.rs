//! Aggregate risk scoring.
//!
//! Combines the strongest classifier signal with the breadth of detected
//! categories into a single 0-100 risk score.

/// Maximum risk score.
pub const MAX_RISK_SCORE: u8 = 100;

/// Number of detected categories beyond which breadth stops raising risk.
pub const BREADTH_CAP: usize = 3;

/// Computes the aggregate risk score for an evaluation.
///
/// Zero when nothing was detected; otherwise the strongest raw score scaled
/// to 0-100 and multiplied by the number of detected categories, capped at
/// [`BREADTH_CAP`] categories and [`MAX_RISK_SCORE`] overall. Monotonic
/// non-decreasing in both arguments.
pub fn risk_score(detected_count: usize, max_score: f64) -> u8 {
    if detected_count == 0 {
        return 0;
    }
    let base = (max_score * 100.0).round().clamp(0.0, 100.0) as u32;
    let breadth = detected_count.min(BREADTH_CAP) as u32;
    (base * breadth).min(u32::from(MAX_RISK_SCORE)) as u8
}
