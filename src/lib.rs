pub mod config;
pub mod performance; // Per-request metrics ring buffer
pub mod pipeline;

use tracing_subscriber::EnvFilter;

pub use config::{AnalysisConfig, ConfigError, OutputLimits};
pub use performance::{PerformanceMetrics, PerformanceRecorder, PerformanceSummary};
pub use pipeline::analysis::{
    AnalysisError, AnalysisResult, AnalysisSource, ResponseGrammar, RiskLevel, ScreeningAnalyzer,
    ScreeningAnswer, ScreeningPhase,
};

/// Install the global `tracing` subscriber.
///
/// Filter comes from `RUST_LOG`, falling back to [`config::default_log_filter`].
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();

    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
}
