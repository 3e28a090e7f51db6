use serde::Serialize;

/// A term average at or above this promotes the student.
pub(crate) const PROMOTION_THRESHOLD: f64 = 50.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub(crate) enum PromotionStatus {
    Eligible,
    #[serde(rename = "Not Eligible")]
    NotEligible,
    #[serde(rename = "Not Evaluated")]
    NotEvaluated,
}

/// `None` means no report card exists yet for the enrollment, which is
/// reported as its own status instead of counting as a failing average.
pub(crate) fn classify(average: Option<f64>) -> PromotionStatus {
    match average {
        Some(value) if value >= PROMOTION_THRESHOLD => PromotionStatus::Eligible,
        Some(_) => PromotionStatus::NotEligible,
        None => PromotionStatus::NotEvaluated,
    }
}
