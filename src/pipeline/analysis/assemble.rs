// Result assembly shared by the AI and rule-based paths.
// Cleans, caps and backfills a partial analysis into the final result shape.

use uuid::Uuid;

use super::fallback::{hospital_for, HospitalFocus};
use super::types::{
    AnalysisResult, AnalysisSource, PartialAnalysis, RecommendedHospital, RiskLevel, DISCLAIMER,
};
use crate::config::OutputLimits;

/// Used when the provider text carries no usable narrative.
pub const DEFAULT_RISK_SUMMARY: &str = "Your screening answers have been reviewed. \
Please see the recommended examinations below and discuss the results with a physician.";

pub const DEFAULT_TESTS: &[&str] = &["Basic health checkup", "Blood biochemistry panel"];

pub const DEFAULT_TREATMENTS: &[&str] =
    &["Consult a physician about preventive care options available in Japan"];

pub const DEFAULT_NEXT_STEPS: &[&str] = &[
    "Schedule a comprehensive health screening",
    "Bring previous medical records to your consultation",
];

/// Build the final result. Every list comes out non-empty, deduplicated and capped.
/// The summary is trimmed and capped but never backfilled, so output validation can still
/// reject it.
pub fn finalize(
    partial: PartialAnalysis,
    source: AnalysisSource,
    raw_content: String,
    request_id: Uuid,
    limits: &OutputLimits,
) -> AnalysisResult {
    let max_len = limits.max_item_length;

    AnalysisResult {
        risk_level: partial.risk_level.unwrap_or(RiskLevel::Low),
        risk_summary: clean_item(&partial.risk_summary, limits.max_summary_length),
        recommended_tests: clean_list(partial.recommended_tests, limits.max_tests, max_len, DEFAULT_TESTS),
        treatment_suggestions: clean_list(
            partial.treatment_suggestions,
            limits.max_treatments,
            max_len,
            DEFAULT_TREATMENTS,
        ),
        recommended_hospitals: clean_hospitals(partial.recommended_hospitals, limits),
        next_steps: clean_list(partial.next_steps, limits.max_next_steps, max_len, DEFAULT_NEXT_STEPS),
        raw_content,
        disclaimer: DISCLAIMER.to_string(),
        is_fallback: source == AnalysisSource::RuleBased,
        analysis_source: source,
        request_id,
    }
}

fn clean_item(item: &str, max_len: usize) -> String {
    cap_chars(item.replace("**", "").trim(), max_len)
}

fn cap_chars(text: &str, max_len: usize) -> String {
    match text.char_indices().nth(max_len) {
        Some((byte_idx, _)) => text[..byte_idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

fn clean_list(items: Vec<String>, max_count: usize, max_len: usize, defaults: &[&str]) -> Vec<String> {
    let mut seen = Vec::new();
    let mut cleaned = Vec::new();

    for item in items {
        if cleaned.len() >= max_count {
            break;
        }
        let item = clean_item(&item, max_len);
        if item.is_empty() {
            continue;
        }
        let key = item.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        cleaned.push(item);
    }

    if cleaned.is_empty() {
        return defaults.iter().map(|d| d.to_string()).collect();
    }
    cleaned
}

fn clean_hospitals(hospitals: Vec<RecommendedHospital>, limits: &OutputLimits) -> Vec<RecommendedHospital> {
    let max_len = limits.max_item_length;
    let mut seen = Vec::new();
    let mut cleaned = Vec::new();

    for hospital in hospitals {
        if cleaned.len() >= limits.max_hospitals {
            break;
        }
        let name = clean_item(&hospital.name, max_len);
        if name.is_empty() {
            continue;
        }
        let key = name.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);

        let location = clean_item(&hospital.location, max_len);
        cleaned.push(RecommendedHospital {
            name,
            localized_name: hospital
                .localized_name
                .map(|n| clean_item(&n, max_len))
                .filter(|n| !n.is_empty()),
            location: if location.is_empty() { "Japan".to_string() } else { location },
            features: clean_features(hospital.features, max_len),
            suitability: clean_item(&hospital.suitability, max_len),
        });
    }

    if cleaned.is_empty() {
        cleaned.push(hospital_for(HospitalFocus::General));
    }
    cleaned
}

fn clean_features(features: Vec<String>, max_len: usize) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for feature in features {
        let feature = clean_item(&feature, max_len);
        if !feature.is_empty() && !out.contains(&feature) {
            out.push(feature);
        }
    }
    out
}
