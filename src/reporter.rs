//! Reporting path for recoverable pipeline errors.

use tracing::{error, warn};

use crate::errors::PipelineError;

/// Sink for recoverable pipeline errors.
///
/// Reporting never fails and never stops the pipeline.
pub trait ErrorReporter: Send + Sync {
    fn report(&self, error: &PipelineError);
}

/// Logs every pipeline error through `tracing`.
///
/// Capabilities that are not implemented yet are logged at `warn`, every
/// other failure at `error`.
#[derive(Debug, Default)]
pub struct TracingErrorReporter;

impl TracingErrorReporter {
    pub fn new() -> Self {
        Self
    }
}

impl ErrorReporter for TracingErrorReporter {
    fn report(&self, pipeline_error: &PipelineError) {
        match pipeline_error {
            PipelineError::Source(source_error) => {
                error!(error = %source_error, "Source error");
            }
            PipelineError::Evaluation {
                rule_index,
                event_id,
                error,
            } => {
                error!(
                    rule.index = rule_index,
                    event.id = %event_id,
                    error = %error,
                    "Condition evaluation failed"
                );
            }
            PipelineError::Action {
                rule_index,
                event_id,
                error,
            } if error.is_not_implemented() => {
                warn!(
                    rule.index = rule_index,
                    event.id = %event_id,
                    error = %error,
                    "Action chain stopped at an unimplemented action"
                );
            }
            PipelineError::Action {
                rule_index,
                event_id,
                error,
            } => {
                error!(
                    rule.index = rule_index,
                    event.id = %event_id,
                    error = %error,
                    "Action chain failed"
                );
            }
        }
    }
}
