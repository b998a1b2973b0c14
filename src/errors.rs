use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("error-mybot-config-1 Required environment variable not set: {var_name}")]
    EnvVarRequired { var_name: String },

    #[error("error-mybot-config-2 Version not available")]
    VersionNotAvailable,

    #[error("error-mybot-config-3 Invalid timeout value: {value}")]
    InvalidTimeout { value: String },

    #[error("error-mybot-config-4 Invalid bus capacity: {value}")]
    InvalidBusCapacity { value: String },

    #[error("error-mybot-config-5 Unable to read config file: {path}: {details}")]
    UnreadableFile { path: String, details: String },

    #[error("error-mybot-config-6 Malformed config document: {details}")]
    MalformedDocument { details: String },

    #[error("error-mybot-config-7 Invalid URL: {url}: {details}")]
    InvalidUrl { url: String, details: String },
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("error-mybot-validation-1 Rule {rule_index} is invalid: {details}")]
    InvalidRule { rule_index: usize, details: String },

    #[error("error-mybot-validation-2 Source {source_name} is invalid: {details}")]
    InvalidSource {
        source_name: String,
        details: String,
    },

    #[error("error-mybot-validation-3 Webhook URL must use http or https: {url}")]
    InvalidWebhookUrl { url: String },
}

/// Failures reported by provider collaborators (stream connections and single-shot calls).
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    #[error("error-mybot-provider-1 Request to {provider} failed: {operation}: {details}")]
    RequestFailed {
        provider: String,
        operation: String,
        details: String,
    },

    #[error("error-mybot-provider-2 {provider} returned status {status}: {operation}: {body}")]
    UnexpectedStatus {
        provider: String,
        operation: String,
        status: u16,
        body: String,
    },

    #[error("error-mybot-provider-3 {provider} API error: {operation}: {details}")]
    Api {
        provider: String,
        operation: String,
        details: String,
    },

    #[error("error-mybot-provider-4 Unable to decode {provider} response: {operation}: {details}")]
    Decode {
        provider: String,
        operation: String,
        details: String,
    },
}

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("error-mybot-source-1 Source {source_name} provider error: {error}")]
    Provider {
        source_name: String,
        #[source]
        error: ProviderError,
    },

    #[error("error-mybot-source-2 Source {source_name} failed to connect: {error}")]
    ConnectFailed {
        source_name: String,
        #[source]
        error: ProviderError,
    },

    #[error("error-mybot-source-3 Capability not implemented: {capability}")]
    NotImplemented { capability: String },
}

#[derive(Error, Debug, PartialEq)]
pub enum EvaluationError {
    #[error("error-mybot-evaluation-1 Condition failed to parse: {condition}: {details}")]
    Parse { condition: String, details: String },

    #[error("error-mybot-evaluation-2 Unknown function in condition: {condition}: {function}")]
    UnknownFunction { condition: String, function: String },

    #[error("error-mybot-evaluation-3 Unknown field in condition: {condition}: {field}")]
    UnknownField { condition: String, field: String },

    #[error("error-mybot-evaluation-4 Condition failed to compile: {condition}: {details}")]
    Compile { condition: String, details: String },

    #[error("error-mybot-evaluation-5 Condition failed to evaluate: {condition}: {details}")]
    Evaluate { condition: String, details: String },

    #[error("error-mybot-evaluation-6 Condition must evaluate to a boolean: {condition}: got {actual}")]
    NonBoolean { condition: String, actual: String },
}

#[derive(Error, Debug)]
pub enum ActionError {
    #[error("error-mybot-action-1 Capability not implemented: {capability}")]
    NotImplemented { capability: String },

    #[error("error-mybot-action-2 Action {action} failed: {error}")]
    Provider {
        action: String,
        #[source]
        error: ProviderError,
    },

    #[error("error-mybot-action-3 Webhook delivery failed: {url}: {details}")]
    Webhook { url: String, details: String },
}

impl ActionError {
    /// True for capabilities the bot does not provide yet, as opposed to provider call failures.
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, ActionError::NotImplemented { .. })
    }
}

#[derive(Error, Debug)]
pub enum LifecycleError {
    #[error("error-mybot-lifecycle-1 Worker {worker} failed: {details}")]
    WorkerFailed { worker: String, details: String },
}

#[derive(Error, Debug)]
pub enum BusError {
    #[error("error-mybot-bus-1 Bus channel closed: {channel}")]
    Closed { channel: &'static str },
}

/// Envelope for every recoverable error the pipeline reports.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),

    #[error("Rule {rule_index} could not be evaluated for event {event_id}: {error}")]
    Evaluation {
        rule_index: usize,
        event_id: String,
        #[source]
        error: EvaluationError,
    },

    #[error("Rule {rule_index} action chain failed for event {event_id}: {error}")]
    Action {
        rule_index: usize,
        event_id: String,
        #[source]
        error: ActionError,
    },
}
