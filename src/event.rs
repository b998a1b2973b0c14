//! The normalized event record flowing from sources to the dispatcher.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::constants::{PROVIDER_CHAT, PROVIDER_SOCIAL};

/// Identifies which provider produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Social filtered stream
    Social,
    /// Chat workspace
    Chat,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Social => PROVIDER_SOCIAL,
            ProviderKind::Chat => PROVIDER_CHAT,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single provider notification, normalized.
///
/// Records are built once by a source worker and never mutated afterwards;
/// fields are private and only readable through accessors.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    provider: ProviderKind,
    id: String,
    text: String,
    url: String,
    links: Vec<String>,
    images: Vec<String>,
}

impl EventRecord {
    pub fn new(
        provider: ProviderKind,
        id: impl Into<String>,
        text: impl Into<String>,
        url: impl Into<String>,
        links: Vec<String>,
        images: Vec<String>,
    ) -> Self {
        Self {
            provider,
            id: id.into(),
            text: text.into(),
            url: url.into(),
            links,
            images,
        }
    }

    pub fn provider(&self) -> ProviderKind {
        self.provider
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Canonical URL of the record on its provider.
    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn images(&self) -> &[String] {
        &self.images
    }

    /// JSON view of the record, as bound into conditions and sent by webhooks.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "provider": self.provider.as_str(),
            "id": self.id,
            "text": self.text,
            "url": self.url,
            "links": self.links,
            "images": self.images,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_value_exposes_all_fields() {
        let event = EventRecord::new(
            ProviderKind::Social,
            "42",
            "hello",
            "https://twitter.com/7/status/42",
            vec!["https://example.com".to_string()],
            vec![],
        );

        assert_eq!(
            event.to_value(),
            json!({
                "provider": "social",
                "id": "42",
                "text": "hello",
                "url": "https://twitter.com/7/status/42",
                "links": ["https://example.com"],
                "images": [],
            })
        );
    }

    #[test]
    fn test_serialize_matches_value_view() {
        let event = EventRecord::new(ProviderKind::Chat, "c1", "hi", "", vec![], vec![]);
        let serialized = serde_json::to_value(&event).unwrap();
        assert_eq!(serialized, event.to_value());
    }
}
