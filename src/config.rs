//! Configuration management for mybot.
//!
//! Two layers: the process [`Config`] read once from environment variables,
//! and the YAML rules document that names the enabled sources and the
//! (condition, action) rules. Both are immutable after startup.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

use crate::constants::{
    DEFAULT_BUS_CAPACITY, DEFAULT_CHAT_API_BASE, DEFAULT_CONFIG_PATH, DEFAULT_SOCIAL_API_BASE,
};
use crate::engine::{
    Action, ActionChain, ActionLeaf, ActionNode, ChatOp, Rule, SocialOp, WebhookOp,
};
use crate::errors::ConfigError;
use crate::source::SourceVariant;

type Result<T> = std::result::Result<T, ConfigError>;

/// Bearer token for a provider. Never rendered by `Debug`.
#[derive(Clone)]
pub struct ProviderToken(String);

/// HTTP client timeout for single-shot provider calls and webhooks.
///
/// Parsed from whole seconds. The streaming connection is not bound by it.
#[derive(Clone, Debug)]
pub struct HttpClientTimeout(std::time::Duration);

/// Bounded capacity of each bus channel. Must be at least 1.
#[derive(Clone, Copy, Debug)]
pub struct BusCapacity(usize);

/// Absolute base URL of a provider API.
#[derive(Clone, Debug)]
pub struct ApiBase(String);

#[derive(Clone, Debug)]
pub struct Config {
    pub version: String,
    pub user_agent: String,
    pub config_path: String,
    pub social_token: ProviderToken,
    pub chat_token: ProviderToken,
    pub social_api_base: ApiBase,
    pub chat_api_base: ApiBase,
    pub http_client_timeout: HttpClientTimeout,
    pub bus_capacity: BusCapacity,
}

impl Config {
    pub fn new() -> Result<Self> {
        let social_token: ProviderToken =
            require_env("MYBOT_SOCIAL_TOKEN").and_then(|value| value.try_into())?;
        let chat_token: ProviderToken =
            require_env("MYBOT_CHAT_TOKEN").and_then(|value| value.try_into())?;

        let config_path = default_env("MYBOT_CONFIG", DEFAULT_CONFIG_PATH);
        let social_api_base: ApiBase =
            default_env("MYBOT_SOCIAL_API_BASE", DEFAULT_SOCIAL_API_BASE).try_into()?;
        let chat_api_base: ApiBase =
            default_env("MYBOT_CHAT_API_BASE", DEFAULT_CHAT_API_BASE).try_into()?;

        let http_client_timeout: HttpClientTimeout =
            optional_env("MYBOT_HTTP_TIMEOUT_SECONDS").try_into()?;
        let bus_capacity: BusCapacity = optional_env("MYBOT_BUS_CAPACITY").try_into()?;

        let version = version()?;
        let default_user_agent = format!("mybot/{}", version);
        let user_agent = default_env("USER_AGENT", &default_user_agent);

        Ok(Self {
            version,
            user_agent,
            config_path,
            social_token,
            chat_token,
            social_api_base,
            chat_api_base,
            http_client_timeout,
            bus_capacity,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| ConfigError::EnvVarRequired {
        var_name: name.to_string(),
    })
}

/// Retrieves an optional environment variable, returning an empty string if not set.
fn optional_env(name: &str) -> String {
    std::env::var(name).unwrap_or("".to_string())
}

fn default_env(name: &str, default_value: &str) -> String {
    std::env::var(name).unwrap_or(default_value.to_string())
}

/// Retrieves the build version from `GIT_HASH` or `CARGO_PKG_VERSION`.
pub fn version() -> Result<String> {
    option_env!("GIT_HASH")
        .or(option_env!("CARGO_PKG_VERSION"))
        .map(|val| val.to_string())
        .ok_or(ConfigError::VersionNotAvailable)
}

impl TryFrom<String> for ProviderToken {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self> {
        Ok(Self(value))
    }
}

impl AsRef<str> for ProviderToken {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ProviderToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ProviderToken(<redacted>)")
    }
}

impl TryFrom<String> for HttpClientTimeout {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self> {
        if value.is_empty() {
            return Ok(Self(std::time::Duration::from_secs(30)));
        }

        match value.parse::<u64>() {
            Ok(seconds) => Ok(Self(std::time::Duration::from_secs(seconds))),
            Err(_) => Err(ConfigError::InvalidTimeout {
                value: value.clone(),
            }),
        }
    }
}

impl AsRef<std::time::Duration> for HttpClientTimeout {
    fn as_ref(&self) -> &std::time::Duration {
        &self.0
    }
}

impl TryFrom<String> for BusCapacity {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self> {
        if value.is_empty() {
            return Ok(Self(DEFAULT_BUS_CAPACITY));
        }

        match value.parse::<usize>() {
            Ok(capacity) if capacity > 0 => Ok(Self(capacity)),
            _ => Err(ConfigError::InvalidBusCapacity { value }),
        }
    }
}

impl AsRef<usize> for BusCapacity {
    fn as_ref(&self) -> &usize {
        &self.0
    }
}

impl TryFrom<String> for ApiBase {
    type Error = ConfigError;
    fn try_from(value: String) -> Result<Self> {
        let parsed = reqwest::Url::parse(&value).map_err(|err| ConfigError::InvalidUrl {
            url: value.clone(),
            details: err.to_string(),
        })?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ConfigError::InvalidUrl {
                url: value,
                details: "scheme must be http or https".to_string(),
            });
        }
        Ok(Self(value.trim_end_matches('/').to_string()))
    }
}

impl AsRef<str> for ApiBase {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Sources and rules loaded from the rules document, in document order.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub sources: Vec<SourceVariant>,
    pub rules: Vec<Rule>,
}

/// Reads and converts the rules document at `path`.
pub fn load_rules_document(path: impl AsRef<Path>) -> Result<PipelineConfig> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|err| ConfigError::UnreadableFile {
        path: path.display().to_string(),
        details: err.to_string(),
    })?;
    parse_rules_document(&contents)
}

/// Parses a rules document from YAML text.
///
/// Absent sections are treated as disabled. Action leaves that are present
/// but disabled are kept so the chain mirrors the document.
pub fn parse_rules_document(contents: &str) -> Result<PipelineConfig> {
    let document: RulesDocument =
        serde_yaml::from_str(contents).map_err(|err| ConfigError::MalformedDocument {
            details: err.to_string(),
        })?;
    Ok(document.into())
}

#[derive(Debug, Default, Deserialize)]
struct RulesDocument {
    #[serde(default)]
    source: SourceSection,
    #[serde(default)]
    process: Vec<ProcessEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SourceSection {
    social: Option<SocialSourceSection>,
    chat: Option<ChatSourceSection>,
}

#[derive(Debug, Default, Deserialize)]
struct SocialSourceSection {
    filtered_stream: Option<EnabledFlag>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatSourceSection {
    #[serde(default)]
    rtms: Vec<EnabledFlag>,
}

#[derive(Debug, Default, Deserialize)]
struct EnabledFlag {
    #[serde(default)]
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ProcessEntry {
    filter: FilterSection,
    #[serde(default)]
    action: ActionSection,
}

#[derive(Debug, Deserialize)]
struct FilterSection {
    #[serde(default)]
    condition: String,
}

#[derive(Debug, Default, Deserialize)]
struct ActionSection {
    social: Option<SocialActionSection>,
    chat: Option<ChatActionSection>,
    webhook: Option<WebhookActionSection>,
    debug: Option<EnabledFlag>,
}

#[derive(Debug, Default, Deserialize)]
struct SocialActionSection {
    post: Option<EnabledFlag>,
    amplify: Option<EnabledFlag>,
    favorite: Option<EnabledFlag>,
}

#[derive(Debug, Default, Deserialize)]
struct ChatActionSection {
    message: Option<MessageSection>,
    pin: Option<EnabledFlag>,
    reaction: Option<ReactionSection>,
}

#[derive(Debug, Default, Deserialize)]
struct MessageSection {
    #[serde(default)]
    channels: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReactionSection {
    #[serde(default)]
    reactions: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct WebhookActionSection {
    url: String,
    #[serde(default)]
    headers: BTreeMap<String, String>,
    #[serde(default = "default_enabled")]
    enabled: bool,
}

fn leaf(enabled: bool, action: Action) -> ActionNode {
    if enabled {
        ActionNode::Leaf(ActionLeaf::enabled(action))
    } else {
        ActionNode::Leaf(ActionLeaf::disabled(action))
    }
}

fn branch(name: &str, nodes: Vec<ActionNode>) -> Option<ActionNode> {
    if nodes.is_empty() {
        return None;
    }
    Some(ActionNode::Branch {
        name: name.to_string(),
        chain: ActionChain::new(nodes),
    })
}

impl From<SourceSection> for Vec<SourceVariant> {
    fn from(section: SourceSection) -> Self {
        let social_enabled = section
            .social
            .and_then(|social| social.filtered_stream)
            .is_some_and(|flag| flag.enabled);

        let mut sources = vec![SourceVariant::SocialStream {
            enabled: social_enabled,
        }];
        if let Some(chat) = section.chat {
            sources.extend(
                chat.rtms
                    .into_iter()
                    .map(|rtm| SourceVariant::ChatRtm {
                        enabled: rtm.enabled,
                    }),
            );
        }
        sources
    }
}

impl From<ActionSection> for ActionChain {
    fn from(section: ActionSection) -> Self {
        let mut nodes = Vec::new();

        if let Some(social) = section.social {
            let leaves = [
                (social.post, SocialOp::Post),
                (social.amplify, SocialOp::Amplify),
                (social.favorite, SocialOp::Favorite),
            ]
            .into_iter()
            .filter_map(|(flag, op)| flag.map(|flag| leaf(flag.enabled, Action::Social(op))))
            .collect();
            nodes.extend(branch("social", leaves));
        }

        if let Some(chat) = section.chat {
            let mut leaves = Vec::new();
            if let Some(message) = chat.message {
                leaves.push(leaf(
                    true,
                    Action::Chat(ChatOp::Message {
                        channels: message.channels,
                    }),
                ));
            }
            if let Some(pin) = chat.pin {
                leaves.push(leaf(pin.enabled, Action::Chat(ChatOp::Pin)));
            }
            if let Some(reaction) = chat.reaction {
                leaves.push(leaf(
                    true,
                    Action::Chat(ChatOp::Reaction {
                        reactions: reaction.reactions,
                    }),
                ));
            }
            nodes.extend(branch("chat", leaves));
        }

        if let Some(webhook) = section.webhook {
            nodes.push(leaf(
                webhook.enabled,
                Action::Webhook(WebhookOp {
                    url: webhook.url,
                    headers: webhook.headers,
                }),
            ));
        }

        if let Some(debug) = section.debug {
            nodes.push(leaf(debug.enabled, Action::Debug));
        }

        ActionChain::new(nodes)
    }
}

impl From<RulesDocument> for PipelineConfig {
    fn from(document: RulesDocument) -> Self {
        let sources = document.source.into();
        let rules = document
            .process
            .into_iter()
            .map(|entry| Rule::new(entry.filter.condition, entry.action.into()))
            .collect();
        Self { sources, rules }
    }
}
