//! Application-wide constants

/// Provider tag carried by events from the social filtered stream
pub(crate) const PROVIDER_SOCIAL: &str = "social";

/// Provider tag carried by events from chat sources
pub(crate) const PROVIDER_CHAT: &str = "chat";

/// Name of the parameter the current event is bound to in conditions
pub(crate) const CONDITION_BINDING: &str = "data";

/// Fields of the bound event that conditions may address
pub(crate) const EVENT_FIELDS: &[&str] = &["provider", "id", "text", "url", "links", "images"];

/// Prefix applied to registry functions when lowered into DataLogic operators
pub(crate) const FUNCTION_OPERATOR_PREFIX: &str = "fn_";

/// Logical operators that accept only boolean operands
pub(crate) const STRICT_NOT_OPERATOR: &str = "bool_not";
pub(crate) const STRICT_AND_OPERATOR: &str = "bool_and";
pub(crate) const STRICT_OR_OPERATOR: &str = "bool_or";

/// Source names used in logs and errors
pub(crate) const SOURCE_SOCIAL_FILTERED_STREAM: &str = "social.filtered_stream";
pub(crate) const SOURCE_CHAT_RTM: &str = "chat.rtm";

/// Action names used in logs and errors
pub(crate) const ACTION_SOCIAL_POST: &str = "social.post";
pub(crate) const ACTION_SOCIAL_AMPLIFY: &str = "social.amplify";
pub(crate) const ACTION_SOCIAL_FAVORITE: &str = "social.favorite";
pub(crate) const ACTION_CHAT_MESSAGE: &str = "chat.message";
pub(crate) const ACTION_CHAT_PIN: &str = "chat.pin";
pub(crate) const ACTION_CHAT_REACTION: &str = "chat.reaction";
pub(crate) const ACTION_WEBHOOK: &str = "webhook";
pub(crate) const ACTION_DEBUG: &str = "debug";

/// Default location of the rules document
pub(crate) const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Default bounded capacity of each bus channel
pub(crate) const DEFAULT_BUS_CAPACITY: usize = 500;

pub(crate) const DEFAULT_SOCIAL_API_BASE: &str = "https://api.twitter.com";
pub(crate) const DEFAULT_CHAT_API_BASE: &str = "https://slack.com";

/// Builds the canonical URL of a social record.
pub(crate) fn social_record_url(author_id: &str, id: &str) -> String {
    format!("https://twitter.com/{}/status/{}", author_id, id)
}

/// Check if a field name is addressable on the bound event
pub(crate) fn is_event_field(field: &str) -> bool {
    EVENT_FIELDS.contains(&field)
}
