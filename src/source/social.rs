//! Social filtered stream source.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::bus::BusSender;
use crate::constants::{SOURCE_SOCIAL_FILTERED_STREAM, social_record_url};
use crate::errors::{BusError, ProviderError, SourceError};
use crate::event::{EventRecord, ProviderKind};
use crate::lifecycle::Lifecycle;
use crate::provider::{SocialProvider, StreamConnection, StreamedPost};

pub(crate) fn start(social: Arc<dyn SocialProvider>, bus: BusSender, lifecycle: &Lifecycle) {
    lifecycle.spawn_worker(SOURCE_SOCIAL_FILTERED_STREAM, move |cancel| {
        run_filtered_stream(social, bus, cancel)
    });
}

/// Normalizes a streamed post into an event record.
pub fn normalize(post: StreamedPost) -> EventRecord {
    let url = social_record_url(&post.author_id, &post.id);
    EventRecord::new(
        ProviderKind::Social,
        post.id,
        post.text,
        url,
        post.expanded_urls,
        Vec::new(),
    )
}

/// Runs the stream worker until cancellation or until the provider ends
/// the stream.
///
/// A failed connect is reported on the error channel and ends the worker;
/// provider errors on a live stream are reported and the worker keeps
/// going. The connection is always stopped on exit.
pub async fn run_filtered_stream(
    social: Arc<dyn SocialProvider>,
    bus: BusSender,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let connected = tokio::select! {
        biased;
        () = cancel.cancelled() => return Ok(()),
        connected = social.connect_stream() => connected,
    };

    let mut connection = match connected {
        Ok(connection) => connection,
        Err(error) => {
            warn!(source = SOURCE_SOCIAL_FILTERED_STREAM, error = %error, "Stream connect failed");
            let report = SourceError::ConnectFailed {
                source_name: SOURCE_SOCIAL_FILTERED_STREAM.to_string(),
                error,
            };
            return closed_bus_outcome(bus.send_error(report).await, &cancel);
        }
    };
    info!(source = SOURCE_SOCIAL_FILTERED_STREAM, "Stream connected");

    let outcome = pump(&mut connection, &bus, &cancel).await;
    connection.stop();
    debug!(source = SOURCE_SOCIAL_FILTERED_STREAM, "Stream connection stopped");

    closed_bus_outcome(outcome, &cancel)
}

async fn pump(
    connection: &mut StreamConnection,
    bus: &BusSender,
    cancel: &CancellationToken,
) -> Result<(), BusError> {
    let mut errors_open = true;

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => return Ok(()),

            maybe_post = connection.notifications.recv() => match maybe_post {
                Some(post) => {
                    let event = normalize(post);
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Ok(()),
                        sent = bus.send_event(event) => sent?,
                    }
                }
                None => {
                    info!(source = SOURCE_SOCIAL_FILTERED_STREAM, "Stream closed by provider");
                    // Errors queued before the close usually explain it
                    while let Ok(error) = connection.errors.try_recv() {
                        forward_error(error, bus, cancel).await?;
                    }
                    return Ok(());
                }
            },

            maybe_error = connection.errors.recv(), if errors_open => match maybe_error {
                Some(error) => forward_error(error, bus, cancel).await?,
                None => errors_open = false,
            },
        }
    }
}

async fn forward_error(
    error: ProviderError,
    bus: &BusSender,
    cancel: &CancellationToken,
) -> Result<(), BusError> {
    let report = SourceError::Provider {
        source_name: SOURCE_SOCIAL_FILTERED_STREAM.to_string(),
        error,
    };
    tokio::select! {
        biased;
        () = cancel.cancelled() => Ok(()),
        sent = bus.send_error(report) => sent,
    }
}

/// A closed bus during shutdown is expected; outside shutdown the
/// dispatcher is gone and the worker fails.
fn closed_bus_outcome(
    outcome: Result<(), BusError>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    match outcome {
        Err(_) if cancel.is_cancelled() => Ok(()),
        other => Ok(other?),
    }
}
