pub mod types;
pub mod input_validation;
pub mod sanitize;
pub mod prompt;
pub mod invoker;
pub mod grammar;
pub mod assemble;
pub mod output_validation;
pub mod negation;
pub mod fallback;
pub mod fingerprint;
pub mod orchestrator;

#[cfg(test)]
mod security_tests;

pub use types::*;
pub use input_validation::*;
pub use sanitize::*;
pub use prompt::*;
pub use invoker::*;
pub use grammar::*;
pub use assemble::*;
pub use output_validation::*;
pub use negation::*;
pub use fallback::*;
pub use fingerprint::*;
pub use orchestrator::*;

use std::time::Duration;

use thiserror::Error;

/// Why a questionnaire was rejected before any external call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Answers must be provided as a list")]
    NotAList,

    #[error("No answers provided")]
    Empty,

    #[error("Too many answers ({count}), maximum is {max}")]
    TooManyAnswers { count: usize, max: usize },

    #[error("Answer #{index} is missing its question id")]
    MissingQuestionId { index: usize },

    #[error("Answer #{index} is missing its question text")]
    MissingQuestion { index: usize },

    #[error("Answer #{index} is too long ({length} characters, maximum {max})")]
    AnswerTooLong {
        index: usize,
        length: usize,
        max: usize,
    },

    #[error("Answer entry could not be decoded: {0}")]
    Malformed(String),
}

/// Failure of the external completion call. Always absorbed by the fallback path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("Completion request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Completion endpoint unreachable at {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Completion endpoint returned error (status {status}): {body}")]
    Status { status: u16, body: String },

    #[error("Completion endpoint returned an empty response")]
    EmptyResponse,

    #[error("Malformed completion response body: {0}")]
    MalformedBody(String),

    #[error("HTTP client error: {0}")]
    Client(String),
}

/// The only error a caller of the pipeline can observe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Invalid screening input: {0}")]
    InvalidInput(#[from] InputError),
}
