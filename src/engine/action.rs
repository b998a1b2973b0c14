//! Action chains.
//!
//! A chain is an ordered tree: provider-scoped branches group
//! operation-scoped leaves. Running a chain runs each child in order and
//! stops at the first error, which is returned unchanged. Disabled leaves
//! succeed without side effects.

use async_trait::async_trait;
use tracing::{debug, instrument};

use super::action_chat::{self, ChatOp};
use super::action_debug;
use super::action_social::{self, SocialOp};
use super::action_webhook::{self, WebhookOp};
use crate::constants::{ACTION_DEBUG, ACTION_WEBHOOK};
use crate::errors::ActionError;
use crate::event::EventRecord;
use crate::provider::ProviderContext;

/// Anything that can be run against an event.
#[async_trait]
pub trait ActionRunner: Send + Sync {
    async fn run(&self, context: &ProviderContext, event: &EventRecord) -> Result<(), ActionError>;
}

/// Effectful operation performed by a leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Social(SocialOp),
    Chat(ChatOp),
    Webhook(WebhookOp),
    Debug,
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Social(op) => op.name(),
            Action::Chat(op) => op.name(),
            Action::Webhook(_) => ACTION_WEBHOOK,
            Action::Debug => ACTION_DEBUG,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ActionLeaf {
    pub enabled: bool,
    pub action: Action,
}

impl ActionLeaf {
    pub fn enabled(action: Action) -> Self {
        Self {
            enabled: true,
            action,
        }
    }

    pub fn disabled(action: Action) -> Self {
        Self {
            enabled: false,
            action,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionNode {
    Branch { name: String, chain: ActionChain },
    Leaf(ActionLeaf),
}

/// Ordered sequence of action nodes with first-error short-circuit.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActionChain {
    nodes: Vec<ActionNode>,
}

impl ActionChain {
    pub fn new(nodes: Vec<ActionNode>) -> Self {
        Self { nodes }
    }

    pub fn nodes(&self) -> &[ActionNode] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Leaves in execution order, disabled ones included.
    pub fn leaves(&self) -> Vec<&ActionLeaf> {
        let mut leaves = Vec::new();
        for node in &self.nodes {
            match node {
                ActionNode::Branch { chain, .. } => leaves.extend(chain.leaves()),
                ActionNode::Leaf(leaf) => leaves.push(leaf),
            }
        }
        leaves
    }
}

#[async_trait]
impl ActionRunner for ActionChain {
    async fn run(&self, context: &ProviderContext, event: &EventRecord) -> Result<(), ActionError> {
        for node in &self.nodes {
            node.run(context, event).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl ActionRunner for ActionNode {
    async fn run(&self, context: &ProviderContext, event: &EventRecord) -> Result<(), ActionError> {
        match self {
            ActionNode::Branch { name, chain } => {
                debug!(branch = %name, "Running action branch");
                chain.run(context, event).await
            }
            ActionNode::Leaf(leaf) => leaf.run(context, event).await,
        }
    }
}

#[async_trait]
impl ActionRunner for ActionLeaf {
    #[instrument(skip_all, fields(action = %self.action.name()))]
    async fn run(&self, context: &ProviderContext, event: &EventRecord) -> Result<(), ActionError> {
        if !self.enabled {
            debug!("Action disabled, skipping");
            return Ok(());
        }

        match &self.action {
            Action::Social(op) => action_social::run(op, context.social.as_ref(), event).await,
            Action::Chat(op) => action_chat::run(op, context.chat.as_ref(), event).await,
            Action::Webhook(op) => action_webhook::run(op, &context.http_client, event).await,
            Action::Debug => {
                action_debug::run(event);
                Ok(())
            }
        }
    }
}
