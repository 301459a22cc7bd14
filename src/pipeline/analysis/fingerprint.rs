use base64::Engine;
use sha2::{Digest, Sha256};

use super::types::ScreeningAnswer;

/// Stable key for an answer set, for a caching layer in front of the pipeline.
///
/// Order-independent (answers are sorted by question id) and insensitive to
/// case and surrounding whitespace in answers and notes. Question display text
/// is excluded since it varies with the UI language.
pub fn answer_fingerprint(answers: &[ScreeningAnswer]) -> String {
    let mut entries: Vec<(String, String, String)> = answers
        .iter()
        .map(|a| {
            (
                a.question_id.trim().to_string(),
                a.answer.rendered().trim().to_lowercase(),
                a.note.as_deref().unwrap_or("").trim().to_lowercase(),
            )
        })
        .collect();
    entries.sort();

    let mut hasher = Sha256::new();
    for (id, answer, note) in &entries {
        hasher.update(id.as_bytes());
        hasher.update([0x1f]);
        hasher.update(answer.as_bytes());
        hasher.update([0x1f]);
        hasher.update(note.as_bytes());
        hasher.update([0x1e]);
    }

    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}
