// Structural gate for screening answers. Runs before sanitation or any
// outbound call, so malformed input never reaches the provider.

use super::types::ScreeningAnswer;
use super::InputError;
use crate::config::AnalysisConfig;

/// Limits applied by [`validate_answers`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InputLimits {
    pub max_answers: usize,
    /// Maximum rendered answer length (twice the per-field sanitation cap).
    pub max_answer_length: usize,
}

impl InputLimits {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self {
            max_answers: config.max_answers,
            max_answer_length: config.max_rendered_answer_length(),
        }
    }
}

impl Default for InputLimits {
    fn default() -> Self {
        Self::from_config(&AnalysisConfig::default())
    }
}

/// Check that an answer collection is well-formed. Side-effect free.
pub fn validate_answers(answers: &[ScreeningAnswer], limits: &InputLimits) -> Result<(), InputError> {
    if answers.is_empty() {
        return Err(InputError::Empty);
    }

    if answers.len() > limits.max_answers {
        return Err(InputError::TooManyAnswers {
            count: answers.len(),
            max: limits.max_answers,
        });
    }

    for (index, answer) in answers.iter().enumerate() {
        if answer.question_id.trim().is_empty() {
            return Err(InputError::MissingQuestionId { index });
        }
        if answer.question.trim().is_empty() {
            return Err(InputError::MissingQuestion { index });
        }

        let length = answer.answer.rendered().chars().count();
        if length > limits.max_answer_length {
            return Err(InputError::AnswerTooLong {
                index,
                length,
                max: limits.max_answer_length,
            });
        }
    }

    Ok(())
}

/// Decode an untyped payload into answers, rejecting anything that is not a list.
///
/// Entries are decoded individually so a broken entry is reported with its index;
/// missing `questionId`/`question` decode to empty strings and are caught by
/// [`validate_answers`].
pub fn parse_answers(payload: &serde_json::Value) -> Result<Vec<ScreeningAnswer>, InputError> {
    let items = payload.as_array().ok_or(InputError::NotAList)?;

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            serde_json::from_value::<ScreeningAnswer>(item.clone())
                .map_err(|e| InputError::Malformed(format!("entry #{index}: {e}")))
        })
        .collect()
}
