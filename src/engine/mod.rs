//! Rule evaluation engine.
//!
//! A [`Rule`] pairs a condition with an [`ActionChain`]. Conditions are
//! written in a small infix language ([`expression`]) that is lowered into
//! DataLogic and evaluated by [`condition::match_condition`] against the
//! functions held by an [`ExpressionRegistry`]. Matching rules run their
//! action chain ([`action`]).

pub mod action;
pub mod action_chat;
pub mod action_debug;
pub mod action_social;
pub mod action_webhook;
pub mod condition;
pub mod expression;
pub mod functions;

pub use action::{Action, ActionChain, ActionLeaf, ActionNode, ActionRunner};
pub use action_chat::ChatOp;
pub use action_social::SocialOp;
pub use action_webhook::WebhookOp;
pub use condition::match_condition;
pub use functions::{ExpressionFunction, ExpressionRegistry};

/// A configured (condition, action chain) pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    pub condition: String,
    pub chain: ActionChain,
}

impl Rule {
    pub fn new(condition: impl Into<String>, chain: ActionChain) -> Self {
        Self {
            condition: condition.into(),
            chain,
        }
    }
}
