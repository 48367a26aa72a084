use crate::checkpoint::WorkflowMode;
use crate::config::ObservabilityConfig;
use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use uuid::Uuid;

/// Initialize structured logging on stderr.
///
/// `RUST_LOG` takes precedence over the configured level so a single run can
/// be made verbose without touching the config file. Stdout stays reserved
/// for the progress lines printed by the commands.
pub fn init_telemetry(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}

/// Generate a correlation ID for linking the log lines of one invocation
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

/// Create the span wrapping one workflow run
pub fn create_run_span(mode: WorkflowMode, extension: &str, correlation_id: &str) -> tracing::Span {
    tracing::info_span!(
        "workflow_run",
        mode = %mode,
        extension = extension,
        correlation.id = correlation_id,
    )
}
