//! Structural validation of a loaded pipeline

use crate::config::PipelineConfig;
use crate::engine::{Action, ChatOp, Rule};
use crate::errors::ValidationError;

/// Validates that loaded rules follow the required shape
pub struct Validator;

impl Validator {
    /// Validate every rule of a pipeline, stopping at the first failure.
    ///
    /// Conditions are only checked for presence here. Parse errors in a
    /// condition surface per event as evaluation errors.
    pub fn validate_pipeline(pipeline: &PipelineConfig) -> Result<(), ValidationError> {
        for (rule_index, rule) in pipeline.rules.iter().enumerate() {
            Self::validate_rule(rule_index, rule)?;
        }
        Ok(())
    }

    /// Validate a single rule
    ///
    /// Rules:
    /// 1. The condition MUST NOT be blank
    /// 2. The action tree MUST contain at least one leaf
    /// 3. Every leaf action MUST have a valid configuration
    pub fn validate_rule(rule_index: usize, rule: &Rule) -> Result<(), ValidationError> {
        if rule.condition.trim().is_empty() {
            return Err(ValidationError::InvalidRule {
                rule_index,
                details: "condition must not be empty".to_string(),
            });
        }

        let leaves = rule.chain.leaves();
        if leaves.is_empty() {
            return Err(ValidationError::InvalidRule {
                rule_index,
                details: "action tree must contain at least one action".to_string(),
            });
        }

        for leaf in leaves {
            Self::validate_action(rule_index, &leaf.action)?;
        }
        Ok(())
    }

    pub fn validate_action(rule_index: usize, action: &Action) -> Result<(), ValidationError> {
        match action {
            Action::Webhook(op) => Self::validate_webhook_url(&op.url),
            Action::Chat(ChatOp::Message { channels }) => {
                if channels.iter().any(|channel| channel.trim().is_empty()) {
                    return Err(ValidationError::InvalidRule {
                        rule_index,
                        details: "chat message channels must not be blank".to_string(),
                    });
                }
                Ok(())
            }
            Action::Chat(ChatOp::Reaction { reactions }) => {
                if reactions.iter().any(|reaction| reaction.trim().is_empty()) {
                    return Err(ValidationError::InvalidRule {
                        rule_index,
                        details: "chat reactions must not be blank".to_string(),
                    });
                }
                Ok(())
            }
            Action::Social(_) | Action::Chat(ChatOp::Pin) | Action::Debug => Ok(()),
        }
    }

    pub fn validate_webhook_url(url: &str) -> Result<(), ValidationError> {
        match reqwest::Url::parse(url) {
            Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
            _ => Err(ValidationError::InvalidWebhookUrl {
                url: url.to_string(),
            }),
        }
    }
}
