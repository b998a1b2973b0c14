//! # mybot
//!
//! mybot is an event-driven automation bot. It listens to streams of events
//! from a social provider and a chat provider, filters each event through
//! configured boolean conditions, and runs a tree of actions against the
//! providers for every condition that matches.
//!
//! ## Architecture Overview
//!
//! ### Sources
//! - Each enabled [`source::SourceVariant`] runs as one worker that turns
//!   provider notifications into [`event::EventRecord`]s
//! - Provider errors travel next to events on a separate error channel
//!
//! ### Event Bus
//! - Two bounded channels (events and errors) shared by every source
//! - The [`processor::Dispatcher`] is the single consumer
//!
//! ### Rule Engine
//! - Conditions are infix expressions over `data` lowered into `datalogic-rs`
//! - Every rule is evaluated for every event, in configured order
//! - Matching rules run their action chain with first-error short-circuit
//!
//! ### Lifecycle
//! - One cancellation signal reaches every worker
//! - Shutdown waits for every worker to acknowledge
//!
//! ## Configuration
//!
//! Process settings come from environment variables (`MYBOT_SOCIAL_TOKEN`,
//! `MYBOT_CHAT_TOKEN`, `MYBOT_CONFIG`, ...). Sources and rules come from the
//! YAML document named by `MYBOT_CONFIG`.
//!
//! ## Error Handling
//!
//! All error strings use the format: `error-mybot-<domain>-<number> <message>: <details>`
//!
//! ## Examples
//!
//! ```rust,ignore
//! use mybot::config::parse_rules_document;
//! use mybot::engine::{ExpressionRegistry, match_condition};
//!
//! let pipeline = parse_rules_document(include_str!("config.yaml"))?;
//! let registry = ExpressionRegistry::with_defaults();
//! for rule in &pipeline.rules {
//!     let matched = match_condition(&registry, &rule.condition, &event)?;
//! }
//! ```

/// Event bus shared by sources and the dispatcher.
pub mod bus;

/// Configuration management.
///
/// Environment-based process configuration and the YAML rules document.
pub mod config;

pub(crate) mod constants;

/// Conditions, expression functions, and action chains.
pub mod engine;

/// Error types for all mybot operations.
pub mod errors;

pub mod event;

/// Cancellation and worker tracking.
pub mod lifecycle;

/// The dispatcher consuming the event bus.
pub mod processor;

/// Social and chat provider bindings.
pub mod provider;

pub mod reporter;

/// Source adapters feeding the event bus.
pub mod source;

/// Structural validation of loaded rules.
pub mod validation;

#[cfg(test)]
pub mod test_helpers;
