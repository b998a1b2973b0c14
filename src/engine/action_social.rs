//! Social provider leaf actions.

use tracing::{debug, info};

use crate::constants::{ACTION_SOCIAL_AMPLIFY, ACTION_SOCIAL_FAVORITE, ACTION_SOCIAL_POST};
use crate::errors::{ActionError, ProviderError};
use crate::event::EventRecord;
use crate::provider::SocialProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocialOp {
    /// Publish the event text as a new post.
    Post,
    /// Re-share the event's record as the authenticated account.
    Amplify,
    /// Mark the event's record as a favorite of the authenticated account.
    Favorite,
}

impl SocialOp {
    pub fn name(&self) -> &'static str {
        match self {
            SocialOp::Post => ACTION_SOCIAL_POST,
            SocialOp::Amplify => ACTION_SOCIAL_AMPLIFY,
            SocialOp::Favorite => ACTION_SOCIAL_FAVORITE,
        }
    }

    fn wrap(&self, error: ProviderError) -> ActionError {
        ActionError::Provider {
            action: self.name().to_string(),
            error,
        }
    }
}

pub(crate) async fn run(
    op: &SocialOp,
    social: &dyn SocialProvider,
    event: &EventRecord,
) -> Result<(), ActionError> {
    match op {
        SocialOp::Post => {
            social.post(event.text()).await.map_err(|e| op.wrap(e))?;
        }
        SocialOp::Amplify => {
            let user_id = social.me().await.map_err(|e| op.wrap(e))?;
            debug!(user_id = %user_id, "Resolved current identity");
            social
                .amplify(&user_id, event.id())
                .await
                .map_err(|e| op.wrap(e))?;
        }
        SocialOp::Favorite => {
            let user_id = social.me().await.map_err(|e| op.wrap(e))?;
            debug!(user_id = %user_id, "Resolved current identity");
            social
                .favorite(&user_id, event.id())
                .await
                .map_err(|e| op.wrap(e))?;
        }
    }

    info!(action = op.name(), event.id = %event.id(), "Social action completed");
    Ok(())
}
