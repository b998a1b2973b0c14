//! Source adapters.
//!
//! Each [`SourceVariant`] carries only its own configuration. Starting an
//! enabled variant spawns one worker on the [`Lifecycle`] that feeds the
//! bus until cancellation; a disabled variant returns without spawning
//! anything or emitting anything.

use std::sync::Arc;
use tracing::debug;

use crate::bus::BusSender;
use crate::constants::{SOURCE_CHAT_RTM, SOURCE_SOCIAL_FILTERED_STREAM};
use crate::lifecycle::Lifecycle;
use crate::provider::ProviderContext;

pub mod chat;
pub mod social;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceVariant {
    /// Social filtered stream
    SocialStream { enabled: bool },
    /// Chat real-time messaging connection
    ChatRtm { enabled: bool },
}

impl SourceVariant {
    pub fn name(&self) -> &'static str {
        match self {
            SourceVariant::SocialStream { .. } => SOURCE_SOCIAL_FILTERED_STREAM,
            SourceVariant::ChatRtm { .. } => SOURCE_CHAT_RTM,
        }
    }

    pub fn is_enabled(&self) -> bool {
        match self {
            SourceVariant::SocialStream { enabled } | SourceVariant::ChatRtm { enabled } => {
                *enabled
            }
        }
    }

    /// Starts this source.
    ///
    /// Never waits on the bus: anything an enabled variant emits is sent
    /// from a task tracked by the [`Lifecycle`].
    pub fn start(&self, context: &Arc<ProviderContext>, bus: &BusSender, lifecycle: &Lifecycle) {
        if !self.is_enabled() {
            debug!(source = self.name(), "Source disabled");
            return;
        }

        match self {
            SourceVariant::SocialStream { .. } => {
                social::start(context.social.clone(), bus.clone(), lifecycle)
            }
            SourceVariant::ChatRtm { .. } => chat::start(bus.clone(), lifecycle),
        }
    }
}

/// Starts every configured source in order.
pub fn start_all(
    sources: &[SourceVariant],
    context: &Arc<ProviderContext>,
    bus: &BusSender,
    lifecycle: &Lifecycle,
) {
    for source in sources {
        source.start(context, bus, lifecycle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{self, fatal_channel};
    use crate::test_helpers::{RecordingChat, RecordingSocial};
    use std::time::Duration;

    fn context(social: Arc<RecordingSocial>) -> Arc<ProviderContext> {
        Arc::new(ProviderContext::new(
            social,
            Arc::new(RecordingChat::default()),
            reqwest::Client::new(),
        ))
    }

    #[tokio::test]
    async fn test_disabled_sources_spawn_nothing_and_emit_nothing() {
        let social = Arc::new(RecordingSocial::default());
        let (fatal_tx, _fatal_rx) = fatal_channel();
        let lifecycle = Lifecycle::new(fatal_tx);
        let (sender, mut receiver) = bus::channel(8);

        start_all(
            &[
                SourceVariant::SocialStream { enabled: false },
                SourceVariant::ChatRtm { enabled: false },
            ],
            &context(social.clone()),
            &sender,
            &lifecycle,
        );
        drop(sender);

        assert_eq!(lifecycle.outstanding(), 0);
        assert!(social.calls().is_empty());
        assert!(receiver.events.recv().await.is_none());
        assert!(receiver.errors.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_enabled_chat_rtm_reports_not_implemented() {
        let (fatal_tx, _fatal_rx) = fatal_channel();
        let lifecycle = Lifecycle::new(fatal_tx);
        let (sender, mut receiver) = bus::channel(8);

        SourceVariant::ChatRtm { enabled: true }.start(
            &context(Arc::new(RecordingSocial::default())),
            &sender,
            &lifecycle,
        );

        let error = receiver.errors.recv().await.unwrap();
        assert!(error.to_string().contains("chat.rtm"));
        tokio::time::timeout(Duration::from_secs(1), lifecycle.wait_for_all())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_start_all_never_waits_on_a_full_error_channel() {
        let (fatal_tx, _fatal_rx) = fatal_channel();
        let lifecycle = Lifecycle::new(fatal_tx);
        let (sender, mut receiver) = bus::channel(1);

        start_all(
            &[
                SourceVariant::ChatRtm { enabled: true },
                SourceVariant::ChatRtm { enabled: true },
                SourceVariant::ChatRtm { enabled: true },
            ],
            &context(Arc::new(RecordingSocial::default())),
            &sender,
            &lifecycle,
        );
        drop(sender);

        // Every report arrives once someone reads the channel
        for _ in 0..3 {
            let error = tokio::time::timeout(Duration::from_secs(1), receiver.errors.recv())
                .await
                .unwrap()
                .unwrap();
            assert!(error.to_string().contains("error-mybot-source-3"));
        }
        tokio::time::timeout(Duration::from_secs(1), lifecycle.wait_for_all())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_pending_report_is_abandoned_on_cancel() {
        let (fatal_tx, _fatal_rx) = fatal_channel();
        let lifecycle = Lifecycle::new(fatal_tx);
        let (sender, _receiver) = bus::channel(1);
        let context = context(Arc::new(RecordingSocial::default()));

        start_all(
            &[
                SourceVariant::ChatRtm { enabled: true },
                SourceVariant::ChatRtm { enabled: true },
            ],
            &context,
            &sender,
            &lifecycle,
        );

        lifecycle.cancel();
        tokio::time::timeout(Duration::from_secs(1), lifecycle.wait_for_all())
            .await
            .unwrap();
    }

    #[test]
    fn test_names() {
        assert_eq!(
            SourceVariant::SocialStream { enabled: true }.name(),
            "social.filtered_stream"
        );
        assert_eq!(SourceVariant::ChatRtm { enabled: true }.name(), "chat.rtm");
    }
}
