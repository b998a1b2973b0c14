//! Provider collaborators.
//!
//! The pipeline only ever talks to providers through [`SocialProvider`] and
//! [`ChatProvider`]. The HTTP bindings live in [`twitter`] and [`slack`];
//! tests substitute in-memory implementations.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::errors::ProviderError;

pub mod slack;
pub mod twitter;

pub use slack::SlackClient;
pub use twitter::TwitterClient;

/// A record delivered by the social filtered stream, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamedPost {
    pub id: String,
    pub author_id: String,
    pub text: String,
    /// Expanded URLs in the order the provider reports them.
    pub expanded_urls: Vec<String>,
}

/// A live stream connection.
///
/// Notifications and out-of-band errors arrive on separate channels. The
/// notifications channel closes when the provider ends the stream.
pub struct StreamConnection {
    pub notifications: mpsc::Receiver<StreamedPost>,
    pub errors: mpsc::Receiver<ProviderError>,
    stop: CancellationToken,
}

impl StreamConnection {
    pub fn new(
        notifications: mpsc::Receiver<StreamedPost>,
        errors: mpsc::Receiver<ProviderError>,
        stop: CancellationToken,
    ) -> Self {
        Self {
            notifications,
            errors,
            stop,
        }
    }

    /// Tears the connection down. Safe to call more than once.
    pub fn stop(&self) {
        self.stop.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}

#[async_trait]
pub trait SocialProvider: Send + Sync {
    /// Opens the filtered stream.
    async fn connect_stream(&self) -> Result<StreamConnection, ProviderError>;

    /// Publishes a new post with the given text.
    async fn post(&self, text: &str) -> Result<(), ProviderError>;

    /// Returns the id of the authenticated account.
    async fn me(&self) -> Result<String, ProviderError>;

    /// Re-shares a record on behalf of `user_id`.
    async fn amplify(&self, user_id: &str, record_id: &str) -> Result<(), ProviderError>;

    /// Marks a record as a favorite on behalf of `user_id`.
    async fn favorite(&self, user_id: &str, record_id: &str) -> Result<(), ProviderError>;
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn post_message(&self, channel: &str, text: &str) -> Result<(), ProviderError>;
}

/// Shared context handed to sources and actions.
#[derive(Clone)]
pub struct ProviderContext {
    pub social: Arc<dyn SocialProvider>,
    pub chat: Arc<dyn ChatProvider>,
    /// Client for calls that are not bound to a provider, such as webhooks.
    pub http_client: reqwest::Client,
}

impl ProviderContext {
    pub fn new(
        social: Arc<dyn SocialProvider>,
        chat: Arc<dyn ChatProvider>,
        http_client: reqwest::Client,
    ) -> Self {
        Self {
            social,
            chat,
            http_client,
        }
    }
}
