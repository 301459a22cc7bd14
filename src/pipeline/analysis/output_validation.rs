use super::types::AnalysisResult;

/// Summary length threshold in characters. A summary must be strictly
/// longer than this to be accepted.
pub const MIN_SUMMARY_LENGTH: usize = 20;

/// Reasons an assembled result is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputViolation {
    SummaryTooShort,
    NoRecommendedTests,
    NoNextSteps,
    NoHospitals,
    MissingDisclaimer,
}

impl OutputViolation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SummaryTooShort => "risk summary too short",
            Self::NoRecommendedTests => "no recommended tests",
            Self::NoNextSteps => "no next steps",
            Self::NoHospitals => "no recommended hospitals",
            Self::MissingDisclaimer => "missing disclaimer",
        }
    }
}

/// Check an assembled result for plausibility. Pure.
pub fn check_output(result: &AnalysisResult) -> Result<(), OutputViolation> {
    if result.risk_summary.trim().chars().count() <= MIN_SUMMARY_LENGTH {
        return Err(OutputViolation::SummaryTooShort);
    }
    if result.recommended_tests.iter().all(|t| t.trim().is_empty()) {
        return Err(OutputViolation::NoRecommendedTests);
    }
    if result.next_steps.is_empty() {
        return Err(OutputViolation::NoNextSteps);
    }
    if result.recommended_hospitals.is_empty() {
        return Err(OutputViolation::NoHospitals);
    }
    if result.disclaimer.trim().is_empty() {
        return Err(OutputViolation::MissingDisclaimer);
    }
    Ok(())
}

pub fn validate_output(result: &AnalysisResult) -> bool {
    check_output(result).is_ok()
}
