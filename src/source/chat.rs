//! Chat real-time messaging source.
//!
//! Not provided yet. An enabled entry reports
//! [`SourceError::NotImplemented`] on the error channel from a short-lived
//! tracked task, so a full error channel never holds up the other sources.

use tracing::{debug, warn};

use crate::bus::BusSender;
use crate::constants::SOURCE_CHAT_RTM;
use crate::errors::SourceError;
use crate::lifecycle::Lifecycle;

pub(crate) fn start(bus: BusSender, lifecycle: &Lifecycle) {
    warn!(source = SOURCE_CHAT_RTM, "Source is not implemented");
    lifecycle.spawn_tracked(SOURCE_CHAT_RTM, move |cancel| async move {
        let report = SourceError::NotImplemented {
            capability: SOURCE_CHAT_RTM.to_string(),
        };
        tokio::select! {
            biased;
            () = cancel.cancelled() => {}
            sent = bus.send_error(report) => {
                if let Err(e) = sent {
                    debug!(source = SOURCE_CHAT_RTM, error = %e, "Dropped not-implemented report");
                }
            }
        }
    });
}
