use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::InvokeError;

/// Fixed legal/medical disclaimer attached to every result.
pub const DISCLAIMER: &str = "This assessment is for general health information only and is not a medical diagnosis. \
It does not replace consultation with a licensed physician. Please discuss any results or concerns \
with a qualified healthcare professional before making health decisions.";

/// One answered screening question, as handed over by the questionnaire flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningAnswer {
    #[serde(default)]
    pub question_id: String,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub answer: AnswerValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl ScreeningAnswer {
    pub fn new(question_id: &str, question: &str, answer: impl Into<AnswerValue>) -> Self {
        Self {
            question_id: question_id.to_string(),
            question: question.to_string(),
            answer: answer.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: &str) -> Self {
        self.note = Some(note.to_string());
        self
    }
}

/// Single-select / free-text answers carry one string, multi-select answers a list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerValue {
    Single(String),
    Multiple(Vec<String>),
}

impl AnswerValue {
    /// Render the answer as one line of text (multi-select joined with ", ").
    pub fn rendered(&self) -> String {
        match self {
            Self::Single(text) => text.clone(),
            Self::Multiple(items) => items.join(", "),
        }
    }
}

impl Default for AnswerValue {
    fn default() -> Self {
        Self::Single(String::new())
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self::Single(value.to_string())
    }
}

impl From<String> for AnswerValue {
    fn from(value: String) -> Self {
        Self::Single(value)
    }
}

impl From<Vec<&str>> for AnswerValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Multiple(values.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<String>> for AnswerValue {
    fn from(values: Vec<String>) -> Self {
        Self::Multiple(values)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a result came from. `Cache` is reserved for an external caching layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnalysisSource {
    Ai,
    RuleBased,
    Cache,
}

impl std::fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ai => write!(f, "ai"),
            Self::RuleBased => write!(f, "rule-based"),
            Self::Cache => write!(f, "cache"),
        }
    }
}

/// Which stage of the screening flow requested the analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ScreeningPhase {
    Initial,
    FollowUp,
}

impl From<ScreeningPhase> for u8 {
    fn from(phase: ScreeningPhase) -> Self {
        match phase {
            ScreeningPhase::Initial => 1,
            ScreeningPhase::FollowUp => 2,
        }
    }
}

impl TryFrom<u8> for ScreeningPhase {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Initial),
            2 => Ok(Self::FollowUp),
            other => Err(format!("unknown screening phase {other}")),
        }
    }
}

/// Failure classification written into performance records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorType {
    InputInvalid,
    Timeout,
    Transport,
    HttpStatus,
    EmptyResponse,
    OutputInvalid,
}

impl From<&InvokeError> for ErrorType {
    fn from(err: &InvokeError) -> Self {
        match err {
            InvokeError::Timeout(_) => Self::Timeout,
            InvokeError::Status { .. } => Self::HttpStatus,
            InvokeError::EmptyResponse => Self::EmptyResponse,
            InvokeError::Connection(_)
            | InvokeError::Transport(_)
            | InvokeError::MalformedBody(_)
            | InvokeError::Client(_) => Self::Transport,
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::InputInvalid => "input_invalid",
            Self::Timeout => "timeout",
            Self::Transport => "transport",
            Self::HttpStatus => "http_status",
            Self::EmptyResponse => "empty_response",
            Self::OutputInvalid => "output_invalid",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedHospital {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localized_name: Option<String>,
    pub location: String,
    #[serde(default)]
    pub features: Vec<String>,
    pub suitability: String,
}

/// The pipeline's sole output. Built only through `assemble::finalize`,
/// which guarantees the non-empty list invariants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub risk_level: RiskLevel,
    pub risk_summary: String,
    pub recommended_tests: Vec<String>,
    pub treatment_suggestions: Vec<String>,
    pub recommended_hospitals: Vec<RecommendedHospital>,
    pub next_steps: Vec<String>,
    pub raw_content: String,
    pub disclaimer: String,
    pub is_fallback: bool,
    pub analysis_source: AnalysisSource,
    pub request_id: Uuid,
}

/// Intermediate result shared by the AI and rule-based paths.
/// Lists may be empty or noisy here; `finalize` cleans and backfills them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PartialAnalysis {
    pub risk_level: Option<RiskLevel>,
    pub risk_summary: String,
    pub recommended_tests: Vec<String>,
    pub treatment_suggestions: Vec<String>,
    pub recommended_hospitals: Vec<RecommendedHospital>,
    pub next_steps: Vec<String>,
}

/// One outbound completion call.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub request_id: Uuid,
    pub system: String,
    pub prompt: String,
}

/// External text-completion provider abstraction (allows mocking).
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, InvokeError>;
}

/// Converts provider text into a partial result. Swappable per provider format.
pub trait ResponseGrammar: Send + Sync {
    fn parse(&self, raw: &str) -> PartialAnalysis;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_value_deserializes_string_or_list() {
        let single: AnswerValue = serde_json::from_str("\"yes\"").unwrap();
        assert_eq!(single, AnswerValue::Single("yes".into()));

        let multi: AnswerValue = serde_json::from_str("[\"cough\",\"fatigue\"]").unwrap();
        assert_eq!(multi.rendered(), "cough, fatigue");
    }

    #[test]
    fn screening_answer_uses_camel_case_keys() {
        let answer: ScreeningAnswer = serde_json::from_value(serde_json::json!({
            "questionId": "q1",
            "question": "Age?",
            "answer": "65",
            "note": "born 1960"
        }))
        .unwrap();
        assert_eq!(answer.question_id, "q1");
        assert_eq!(answer.note.as_deref(), Some("born 1960"));
    }

    #[test]
    fn missing_ids_decode_to_empty_strings() {
        let answer: ScreeningAnswer =
            serde_json::from_value(serde_json::json!({ "answer": "x" })).unwrap();
        assert!(answer.question_id.is_empty());
        assert!(answer.question.is_empty());
    }

    #[test]
    fn source_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&AnalysisSource::RuleBased).unwrap(),
            "\"rule-based\""
        );
        assert_eq!(serde_json::to_string(&AnalysisSource::Ai).unwrap(), "\"ai\"");
        assert_eq!(AnalysisSource::RuleBased.to_string(), "rule-based");
    }

    #[test]
    fn phase_serializes_as_number() {
        assert_eq!(serde_json::to_string(&ScreeningPhase::FollowUp).unwrap(), "2");
        let phase: ScreeningPhase = serde_json::from_str("1").unwrap();
        assert_eq!(phase, ScreeningPhase::Initial);
        assert!(serde_json::from_str::<ScreeningPhase>("3").is_err());
    }

    #[test]
    fn invoke_errors_map_to_error_types() {
        let timeout = InvokeError::Timeout(std::time::Duration::from_secs(30));
        assert_eq!(ErrorType::from(&timeout), ErrorType::Timeout);
        let status = InvokeError::Status { status: 502, body: String::new() };
        assert_eq!(ErrorType::from(&status), ErrorType::HttpStatus);
        let conn = InvokeError::Connection("http://x".into());
        assert_eq!(ErrorType::from(&conn), ErrorType::Transport);
    }
}
