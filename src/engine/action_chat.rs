//! Chat provider leaf actions.
//!
//! `pin` and `reaction` are not provided yet: invoking them returns
//! [`ActionError::NotImplemented`] through the normal error path.

use tracing::{info, warn};

use crate::constants::{ACTION_CHAT_MESSAGE, ACTION_CHAT_PIN, ACTION_CHAT_REACTION};
use crate::errors::ActionError;
use crate::event::EventRecord;
use crate::provider::ChatProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOp {
    /// Post the event's canonical URL to each channel, in order.
    Message { channels: Vec<String> },
    Pin,
    Reaction { reactions: Vec<String> },
}

impl ChatOp {
    pub fn name(&self) -> &'static str {
        match self {
            ChatOp::Message { .. } => ACTION_CHAT_MESSAGE,
            ChatOp::Pin => ACTION_CHAT_PIN,
            ChatOp::Reaction { .. } => ACTION_CHAT_REACTION,
        }
    }
}

pub(crate) async fn run(
    op: &ChatOp,
    chat: &dyn ChatProvider,
    event: &EventRecord,
) -> Result<(), ActionError> {
    match op {
        ChatOp::Message { channels } => {
            for channel in channels {
                chat.post_message(channel, event.url())
                    .await
                    .map_err(|error| ActionError::Provider {
                        action: op.name().to_string(),
                        error,
                    })?;
                info!(channel = %channel, event.id = %event.id(), "Posted message");
            }
            Ok(())
        }
        ChatOp::Pin | ChatOp::Reaction { .. } => {
            warn!(action = op.name(), "Action is not implemented");
            Err(ActionError::NotImplemented {
                capability: op.name().to_string(),
            })
        }
    }
}
