//! Test helper utilities for mybot tests
//!
//! In-memory providers that record every call, plus common fixtures.

use async_trait::async_trait;
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::constants::social_record_url;
use crate::errors::{PipelineError, ProviderError};
use crate::event::{EventRecord, ProviderKind};
use crate::provider::{ChatProvider, SocialProvider, StreamConnection, StreamedPost};
use crate::reporter::ErrorReporter;

// Test environment mutex to prevent concurrent environment variable modification
pub static ENV_MUTEX: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

/// Social event authored by account `7`.
pub fn sample_social_event(id: &str, text: &str) -> EventRecord {
    EventRecord::new(
        ProviderKind::Social,
        id,
        text,
        social_record_url("7", id),
        vec![],
        vec![],
    )
}

pub fn provider_failure(provider: &str, operation: &str) -> ProviderError {
    ProviderError::RequestFailed {
        provider: provider.to_string(),
        operation: operation.to_string(),
        details: "simulated failure".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Connect,
    Post(String),
    Me,
    Amplify { user_id: String, record_id: String },
    Favorite { user_id: String, record_id: String },
}

/// Test-side handle of a stream handed out by [`RecordingSocial`].
pub struct StreamHandle {
    pub notifications: mpsc::Sender<StreamedPost>,
    pub errors: mpsc::Sender<ProviderError>,
    pub stop: CancellationToken,
}

#[derive(Default)]
pub struct RecordingSocial {
    calls: Mutex<Vec<RecordedCall>>,
    failures: Mutex<HashSet<String>>,
    streams: Mutex<VecDeque<StreamConnection>>,
}

impl RecordingSocial {
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Makes the named operation (`connect`, `post`, `me`, `amplify`,
    /// `favorite`) fail from now on.
    pub fn fail_on(&self, operation: &str) {
        self.failures.lock().insert(operation.to_string());
    }

    /// Queues a stream for the next `connect_stream` call.
    pub fn push_stream(&self) -> StreamHandle {
        let (notifications_tx, notifications_rx) = mpsc::channel(16);
        let (errors_tx, errors_rx) = mpsc::channel(16);
        let stop = CancellationToken::new();
        self.streams.lock().push_back(StreamConnection::new(
            notifications_rx,
            errors_rx,
            stop.clone(),
        ));

        StreamHandle {
            notifications: notifications_tx,
            errors: errors_tx,
            stop,
        }
    }

    fn record(&self, call: RecordedCall, operation: &str) -> Result<(), ProviderError> {
        self.calls.lock().push(call);
        if self.failures.lock().contains(operation) {
            return Err(provider_failure("social", operation));
        }
        Ok(())
    }
}

#[async_trait]
impl SocialProvider for RecordingSocial {
    async fn connect_stream(&self) -> Result<StreamConnection, ProviderError> {
        self.record(RecordedCall::Connect, "connect")?;
        self.streams
            .lock()
            .pop_front()
            .ok_or_else(|| provider_failure("social", "connect"))
    }

    async fn post(&self, text: &str) -> Result<(), ProviderError> {
        self.record(RecordedCall::Post(text.to_string()), "post")
    }

    async fn me(&self) -> Result<String, ProviderError> {
        self.record(RecordedCall::Me, "me")?;
        Ok("me-1".to_string())
    }

    async fn amplify(&self, user_id: &str, record_id: &str) -> Result<(), ProviderError> {
        self.record(
            RecordedCall::Amplify {
                user_id: user_id.to_string(),
                record_id: record_id.to_string(),
            },
            "amplify",
        )
    }

    async fn favorite(&self, user_id: &str, record_id: &str) -> Result<(), ProviderError> {
        self.record(
            RecordedCall::Favorite {
                user_id: user_id.to_string(),
                record_id: record_id.to_string(),
            },
            "favorite",
        )
    }
}

#[derive(Default)]
pub struct RecordingChat {
    calls: Mutex<Vec<(String, String)>>,
    failing_channels: Mutex<HashSet<String>>,
}

impl RecordingChat {
    /// `(channel, text)` pairs in call order.
    pub fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().clone()
    }

    pub fn fail_on_channel(&self, channel: &str) {
        self.failing_channels.lock().insert(channel.to_string());
    }
}

#[async_trait]
impl ChatProvider for RecordingChat {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ProviderError> {
        self.calls
            .lock()
            .push((channel.to_string(), text.to_string()));
        if self.failing_channels.lock().contains(channel) {
            return Err(provider_failure("chat", "chat.postMessage"));
        }
        Ok(())
    }
}

/// Keeps the rendered text of every reported error.
#[derive(Default)]
pub struct RecordingErrorReporter {
    reported: Mutex<Vec<String>>,
}

impl RecordingErrorReporter {
    pub fn reported(&self) -> Vec<String> {
        self.reported.lock().clone()
    }
}

impl ErrorReporter for RecordingErrorReporter {
    fn report(&self, error: &PipelineError) {
        self.reported.lock().push(error.to_string());
    }
}
