// Sanitize free-text answers before they are sent to the completion provider.
// Neutralizes prompt injection, strips invisible/control characters, caps length.

use std::sync::LazyLock;

use regex::Regex;

use super::types::ScreeningAnswer;
use crate::config::AnalysisConfig;

/// Replaces every matched injection fragment.
pub const REDACTION_MARKER: &str = "[FILTERED]";

/// Upper bound on redaction rounds (a round can expose a new match at its edges).
const MAX_REDACTION_ROUNDS: usize = 4;

/// Instruction-override, role-injection and prompt-delimiter patterns
/// (English, Chinese, Japanese). None of them can match the redaction marker.
static INJECTION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    let patterns = [
        // Instruction override
        r"(?i)\b(?:ignore|disregard|forget|override)\s+(?:all\s+|any\s+)?(?:of\s+)?(?:the\s+)?(?:previous|prior|above|earlier|your|system)\s+(?:instructions?|prompts?|rules?|directions?)",
        r"(?i)\bnew\s+instructions?\s*:",
        r"(?i)\byou\s+are\s+now",
        r"(?i)\bact\s+as\s+(?:a|an|the)\s+(?:system|developer|admin)",
        // Role markers
        r"(?i)\b(?:system|assistant|user|developer)\s*:",
        r"(?i)\[/?(?:system|inst|assistant|user)\]",
        r"(?i)<<\s*/?\s*sys\s*>>",
        r"<\|[A-Za-z_]*\|>",
        // Prompt delimiters
        r"(?i)<\s*/?\s*(?:system|instructions?|prompt|questionnaire)\s*>",
        r"`{3,}",
        // Chinese
        r"(?:忽略|無視|无视|忽視|忽视)(?:之前|以上|先前|前面|所有|上述)的?(?:所有)?(?:指令|指示|說明|说明|規則|规则|提示)",
        r"(?:系統|系统)\s*[:：]",
        r"(?:你現在是|你现在是|從現在開始你是|从现在开始你是)",
        // Japanese
        r"(?:以前|前|上記|これまで)の(?:指示|命令|ルール)を(?:すべて|全て)?無視",
        r"システム\s*[:：]",
        r"新しい指示\s*[:：]",
    ];
    Regex::new(&patterns.join("|")).expect("Invalid injection regex")
});

static EXCESS_NEWLINES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("Invalid newline regex"));

/// A screening answer after sanitation, ready for prompt construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizedAnswer {
    pub question_id: String,
    /// Trusted display text from the question bank, passed through unchanged.
    pub question: String,
    pub answer: String,
    pub note: Option<String>,
}

/// Sanitize text for the completion provider. Deterministic and idempotent.
pub fn sanitize_text(raw: &str, max_length: usize) -> String {
    sanitize_counted(raw, max_length).0
}

/// Sanitize with audit logging. Logs the redaction count and request id,
/// never the text (PHI risk).
pub fn sanitize_text_with_audit(raw: &str, max_length: usize, request_id: Option<&str>) -> String {
    let (text, redactions) = sanitize_counted(raw, max_length);

    if redactions > 0 {
        let id = request_id.unwrap_or("unknown");
        tracing::warn!(
            request_id = %id,
            redactions,
            "Injection patterns redacted from screening input"
        );
    }

    text
}

/// Sanitize every answer and note with their configured caps.
pub fn sanitize_answers(
    answers: &[ScreeningAnswer],
    config: &AnalysisConfig,
    request_id: Option<&str>,
) -> Vec<SanitizedAnswer> {
    answers
        .iter()
        .map(|a| SanitizedAnswer {
            question_id: a.question_id.clone(),
            question: a.question.clone(),
            answer: sanitize_text_with_audit(&a.answer.rendered(), config.answer_max_length, request_id),
            note: a
                .note
                .as_deref()
                .map(|n| sanitize_text_with_audit(n, config.note_max_length, request_id))
                .filter(|n| !n.is_empty()),
        })
        .collect()
}

fn sanitize_counted(raw: &str, max_length: usize) -> (String, usize) {
    let truncated = truncate_chars(raw, max_length);
    let visible = remove_control_chars(&truncated);
    let (redacted, redactions) = redact_injection_patterns(&visible);
    let collapsed = EXCESS_NEWLINES.replace_all(&redacted, "\n\n");
    let capped = truncate_chars(&collapsed, max_length);
    (capped.trim().to_string(), redactions)
}

/// Keep at most `max_length` characters (not bytes).
fn truncate_chars(text: &str, max_length: usize) -> String {
    match text.char_indices().nth(max_length) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

/// Remove carriage returns, control characters and invisible Unicode that
/// could hide injection text. Preserves newline and tab.
fn remove_control_chars(text: &str) -> String {
    text.chars()
        .filter(|c| {
            if *c == '\n' || *c == '\t' {
                return true;
            }
            if matches!(
                *c,
                '\u{200B}'..='\u{200F}'   // Zero-width chars, directional marks
                | '\u{202A}'..='\u{202E}' // Directional embedding/override
                | '\u{2060}'..='\u{2064}' // Word joiner, invisible operators
                | '\u{2066}'..='\u{2069}' // Directional isolates
                | '\u{FEFF}'              // BOM
                | '\u{00AD}'              // Soft hyphen
            ) {
                return false;
            }
            !c.is_control()
        })
        .collect()
}

/// Replace injection fragments with the marker until no pattern matches.
fn redact_injection_patterns(text: &str) -> (String, usize) {
    let mut current = text.to_string();
    let mut total = 0usize;

    for _ in 0..MAX_REDACTION_ROUNDS {
        let found = INJECTION_PATTERN.find_iter(&current).count();
        if found == 0 {
            break;
        }
        total += found;
        current = INJECTION_PATTERN
            .replace_all(&current, REDACTION_MARKER)
            .into_owned();
    }

    (current, total)
}

/// True if the text still contains an injection pattern.
pub fn contains_injection_pattern(text: &str) -> bool {
    INJECTION_PATTERN.is_match(text)
}
