//! Dispatcher: the single consumer of the event bus.
//!
//! For every event the dispatcher evaluates every rule in configured order
//! and runs the action chain of each matching rule before moving on. Chains
//! run one at a time on the dispatcher task, so a slow provider call delays
//! every later event.
//!
//! Evaluation and action errors are reported straight to the
//! [`ErrorReporter`]; source errors arrive on the bus error channel and are
//! reported the same way. None of them stop the loop.

use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span};
use ulid::Ulid;

use crate::bus::BusReceiver;
use crate::engine::{ActionRunner, ExpressionRegistry, Rule, match_condition};
use crate::errors::PipelineError;
use crate::event::EventRecord;
use crate::provider::ProviderContext;
use crate::reporter::ErrorReporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatcherState {
    Running,
    /// The events channel has closed; remaining errors are still drained.
    Draining,
    Stopped,
}

impl fmt::Display for DispatcherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DispatcherState::Running => "running",
            DispatcherState::Draining => "draining",
            DispatcherState::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Counters accumulated over one dispatcher run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub events_seen: u64,
    pub rules_matched: u64,
    pub chains_failed: u64,
    pub evaluation_errors: u64,
    pub source_errors: u64,
}

impl DispatchStats {
    /// True when sources reported errors and not a single event arrived,
    /// such as a stream that was refused at connect.
    pub fn never_listened(&self) -> bool {
        self.events_seen == 0 && self.source_errors > 0
    }
}

pub struct Dispatcher {
    rules: Vec<Rule>,
    registry: Arc<ExpressionRegistry>,
    context: Arc<ProviderContext>,
    reporter: Arc<dyn ErrorReporter>,
}

impl Dispatcher {
    pub fn new(
        rules: Vec<Rule>,
        registry: Arc<ExpressionRegistry>,
        context: Arc<ProviderContext>,
        reporter: Arc<dyn ErrorReporter>,
    ) -> Self {
        Self {
            rules,
            registry,
            context,
            reporter,
        }
    }

    /// Consumes the bus until cancellation, or until both channels close.
    pub async fn run(&self, receiver: BusReceiver, cancel: CancellationToken) -> DispatchStats {
        let BusReceiver {
            mut events,
            mut errors,
        } = receiver;
        let mut stats = DispatchStats::default();
        let mut events_open = true;
        let mut errors_open = true;
        let mut state = DispatcherState::Running;

        info!(rules = self.rules.len(), state = %state, "Dispatcher started");

        while events_open || errors_open {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    debug!("Dispatcher observed cancellation");
                    break;
                }

                maybe_event = events.recv(), if events_open => match maybe_event {
                    Some(event) => self.dispatch(&event, &mut stats).await,
                    None => {
                        events_open = false;
                        state = transition(state, DispatcherState::Draining);
                    }
                },

                maybe_error = errors.recv(), if errors_open => match maybe_error {
                    Some(error) => {
                        stats.source_errors += 1;
                        self.reporter.report(&error);
                    }
                    None => errors_open = false,
                },
            }
        }

        transition(state, DispatcherState::Stopped);
        info!(
            events_seen = stats.events_seen,
            rules_matched = stats.rules_matched,
            chains_failed = stats.chains_failed,
            evaluation_errors = stats.evaluation_errors,
            source_errors = stats.source_errors,
            "Dispatcher stopped"
        );
        stats
    }

    /// Evaluates every rule against one event, running matching chains in order.
    pub async fn dispatch(&self, event: &EventRecord, stats: &mut DispatchStats) {
        let trace_id = Ulid::new().to_string();
        let span = info_span!(
            "dispatch",
            trace_id = %trace_id,
            event.id = %event.id(),
            event.provider = %event.provider(),
        );

        async {
            stats.events_seen += 1;

            for (rule_index, rule) in self.rules.iter().enumerate() {
                match match_condition(&self.registry, &rule.condition, event) {
                    Ok(true) => {
                        stats.rules_matched += 1;
                        debug!(rule.index = rule_index, "Rule matched");
                        if let Err(error) = rule.chain.run(&self.context, event).await {
                            stats.chains_failed += 1;
                            self.reporter.report(&PipelineError::Action {
                                rule_index,
                                event_id: event.id().to_string(),
                                error,
                            });
                        }
                    }
                    Ok(false) => {
                        debug!(rule.index = rule_index, "Rule did not match");
                    }
                    Err(error) => {
                        stats.evaluation_errors += 1;
                        self.reporter.report(&PipelineError::Evaluation {
                            rule_index,
                            event_id: event.id().to_string(),
                            error,
                        });
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}

fn transition(from: DispatcherState, to: DispatcherState) -> DispatcherState {
    if from != to {
        info!(from = %from, to = %to, "Dispatcher state changed");
    }
    to
}
