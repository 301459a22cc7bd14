// Negation-aware keyword matching for the rule-based analyzer.
// "I quit smoking" or "不吸菸" must not count as an active risk factor.

/// Characters inspected before a keyword occurrence.
pub const NEGATION_WINDOW: usize = 12;

/// Characters inspected after a keyword for postpositional CJK negation
/// ("喫煙しない", "菸已經戒了").
pub const TRAILING_NEGATION_WINDOW: usize = 6;

/// Whole-token English negations.
const NEGATION_TOKENS: &[&str] = &[
    "not", "no", "never", "quit", "quitted", "stopped", "non", "without", "none", "former",
    "ex", "nor", "neither", "denies", "deny",
];

/// Substring negations that precede the keyword.
const LEADING_NEGATIONS_CJK: &[&str] = &[
    "不", "沒", "没", "無", "无", "戒", "從不", "从不", "未", "禁", "やめ", "止め",
];

/// Substring negations that follow the keyword.
const TRAILING_NEGATIONS_CJK: &[&str] = &["ない", "ません", "やめ", "止め", "戒了", "已戒"];

fn normalize(text: &str) -> String {
    text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'")
}

/// True if any keyword occurs in `text` at least once without a negation
/// in its window. Case-insensitive.
pub fn contains_unnegated_keyword(text: &str, keywords: &[&str]) -> bool {
    let normalized = normalize(text);
    let chars: Vec<char> = normalized.chars().collect();

    keywords.iter().any(|keyword| {
        let keyword = keyword.to_lowercase();
        if keyword.is_empty() {
            return false;
        }
        normalized.match_indices(keyword.as_str()).any(|(byte_idx, matched)| {
            let start = normalized[..byte_idx].chars().count();
            let end = start + matched.chars().count();
            !is_negated_at(&chars, start, end)
        })
    })
}

/// True if any keyword occurs in `text`, negated or not. Case-insensitive.
pub fn mentions_keyword(text: &str, keywords: &[&str]) -> bool {
    let normalized = normalize(text);
    keywords
        .iter()
        .any(|k| !k.is_empty() && normalized.contains(k.to_lowercase().as_str()))
}

/// True if the text opens with a negation, e.g. a bare "No" or "なし" answer.
pub fn is_negative_answer(text: &str) -> bool {
    let normalized = normalize(text);
    let trimmed = normalized.trim();
    let first_token = trimmed
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .find(|t| !t.is_empty())
        .unwrap_or("");

    NEGATION_TOKENS.contains(&first_token)
        || first_token.ends_with("n't")
        || ["否", "沒有", "没有", "無", "无", "不", "なし", "いいえ", "ない"]
            .iter()
            .any(|n| trimmed.starts_with(n))
}

fn is_negated_at(chars: &[char], start: usize, end: usize) -> bool {
    let from = start.saturating_sub(NEGATION_WINDOW);
    let before: String = chars[from..start].iter().collect();

    // A window that starts mid-word must not count the word's tail as a token
    let cut_word = from > 0 && chars[from - 1].is_alphanumeric() && chars[from].is_alphanumeric();
    if has_negation_token(&before, cut_word) {
        return true;
    }
    if LEADING_NEGATIONS_CJK.iter().any(|n| before.contains(n)) {
        return true;
    }

    let to = (end + TRAILING_NEGATION_WINDOW).min(chars.len());
    let after: String = chars[end..to].iter().collect();
    TRAILING_NEGATIONS_CJK.iter().any(|n| after.contains(n))
}

fn has_negation_token(window: &str, skip_first: bool) -> bool {
    window
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|t| !t.is_empty())
        .skip(usize::from(skip_first))
        .any(|t| NEGATION_TOKENS.contains(&t) || t.ends_with("n't"))
}
