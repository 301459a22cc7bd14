use std::sync::Arc;

use thiserror::Error;
use tracing::Instrument;
use uuid::Uuid;

use super::assemble::finalize;
use super::fallback::analyze_with_rules;
use super::grammar::MarkdownSectionGrammar;
use super::input_validation::{parse_answers, validate_answers, InputLimits};
use super::invoker::{AiInvoker, HttpCompletionClient};
use super::output_validation::{check_output, OutputViolation};
use super::prompt::{build_screening_prompt, SCREENING_SYSTEM_PROMPT};
use super::sanitize::sanitize_answers;
use super::types::{
    AnalysisResult, AnalysisSource, CompletionClient, ErrorType, ResponseGrammar, ScreeningAnswer,
    ScreeningPhase,
};
use super::{AnalysisError, InvokeError};
use crate::config::AnalysisConfig;
use crate::performance::PerformanceRecorder;

/// Why the AI path produced no acceptable result. Never leaves this module;
/// every variant routes to the rule-based path.
#[derive(Error, Debug)]
enum AiPathFailure {
    #[error(transparent)]
    Invoke(InvokeError),

    #[error("AI output rejected: {}", .0.as_str())]
    Output(OutputViolation),
}

impl AiPathFailure {
    fn error_type(&self) -> ErrorType {
        match self {
            Self::Invoke(e) => ErrorType::from(e),
            Self::Output(_) => ErrorType::OutputInvalid,
        }
    }
}

/// Runs the screening pipeline:
/// validate → sanitize → prompt → AI (timeout-bounded) → parse → validate output,
/// falling back to rule-based analysis on any AI-path failure. One metrics
/// record per call.
pub struct ScreeningAnalyzer {
    config: AnalysisConfig,
    invoker: AiInvoker,
    grammar: Box<dyn ResponseGrammar>,
    recorder: Arc<PerformanceRecorder>,
}

impl ScreeningAnalyzer {
    pub fn new(
        client: Arc<dyn CompletionClient>,
        config: AnalysisConfig,
        recorder: Arc<PerformanceRecorder>,
    ) -> Self {
        Self {
            invoker: AiInvoker::new(client, config.request_timeout),
            grammar: Box::new(MarkdownSectionGrammar),
            config,
            recorder,
        }
    }

    /// HTTP provider from the config, with a recorder of the configured capacity.
    pub fn from_config(config: AnalysisConfig) -> Result<Self, InvokeError> {
        let client = HttpCompletionClient::from_config(&config)?;
        let recorder = Arc::new(PerformanceRecorder::new(config.metrics_capacity));
        Ok(Self::new(Arc::new(client), config, recorder))
    }

    /// Swap the response grammar (for a provider with a different text convention).
    pub fn with_grammar(mut self, grammar: Box<dyn ResponseGrammar>) -> Self {
        self.grammar = grammar;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn recorder(&self) -> &Arc<PerformanceRecorder> {
        &self.recorder
    }

    /// Analyze one questionnaire. Errors only when the input is rejected;
    /// provider failures are absorbed by the rule-based path.
    pub async fn analyze(
        &self,
        answers: &[ScreeningAnswer],
        phase: ScreeningPhase,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "analyze_screening",
            request_id = %request_id,
            phase = u8::from(phase)
        );
        self.run(request_id, answers, phase).instrument(span).await
    }

    /// Analyze an untyped payload, rejecting anything that is not a list of answers.
    pub async fn analyze_json(
        &self,
        payload: &serde_json::Value,
        phase: ScreeningPhase,
    ) -> Result<AnalysisResult, AnalysisError> {
        match parse_answers(payload) {
            Ok(answers) => self.analyze(&answers, phase).await,
            Err(e) => {
                let request_id = Uuid::new_v4();
                let count = payload.as_array().map_or(0, Vec::len);
                let metrics = self.recorder.start(request_id, phase, count).fail(ErrorType::InputInvalid);
                tracing::warn!(
                    request_id = %request_id,
                    error = %e,
                    duration_ms = metrics.duration_ms,
                    "Screening payload rejected"
                );
                Err(e.into())
            }
        }
    }

    async fn run(
        &self,
        request_id: Uuid,
        answers: &[ScreeningAnswer],
        phase: ScreeningPhase,
    ) -> Result<AnalysisResult, AnalysisError> {
        let timer = self.recorder.start(request_id, phase, answers.len());

        if let Err(e) = validate_answers(answers, &InputLimits::from_config(&self.config)) {
            let metrics = timer.fail(ErrorType::InputInvalid);
            tracing::warn!(
                request_id = %request_id,
                error = %e,
                duration_ms = metrics.duration_ms,
                "Screening input rejected"
            );
            return Err(e.into());
        }

        let (result, error_type) = match self.run_ai_path(request_id, answers, phase).await {
            Ok(result) => (result, None),
            Err(failure) => {
                tracing::warn!(
                    request_id = %request_id,
                    reason = %failure,
                    "AI analysis unavailable, using rule-based fallback"
                );
                let result = analyze_with_rules(answers, request_id, &self.config.output);
                (result, Some(failure.error_type()))
            }
        };

        // Both paths yield a complete result, so the execution itself succeeded
        let metrics = timer.end(result.analysis_source, true, error_type);
        tracing::info!(
            request_id = %request_id,
            source = %result.analysis_source,
            duration_ms = metrics.duration_ms,
            success = metrics.success,
            error_type = ?metrics.error_type,
            risk_level = %result.risk_level,
            "Screening analysis completed"
        );

        Ok(result)
    }

    async fn run_ai_path(
        &self,
        request_id: Uuid,
        answers: &[ScreeningAnswer],
        phase: ScreeningPhase,
    ) -> Result<AnalysisResult, AiPathFailure> {
        let id = request_id.to_string();
        let sanitized = sanitize_answers(answers, &self.config, Some(&id));
        let prompt = build_screening_prompt(&sanitized, phase);

        let raw = self
            .invoker
            .invoke(request_id, SCREENING_SYSTEM_PROMPT, &prompt)
            .await
            .map_err(AiPathFailure::Invoke)?;

        let partial = self.grammar.parse(&raw);
        let result = finalize(partial, AnalysisSource::Ai, raw, request_id, &self.config.output);
        check_output(&result).map_err(AiPathFailure::Output)?;

        Ok(result)
    }
}
