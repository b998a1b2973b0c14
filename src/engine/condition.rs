//! Condition evaluator.
//!
//! A condition is compiled fresh on every call and evaluated against the
//! event bound as `data`. There is no caching layer and no hidden state: the
//! verdict is a pure function of the condition text, the registry and the
//! event fields.

use datalogic_rs::DataLogic;
use serde_json::{Value, json};
use std::sync::Arc;

use super::expression;
use super::functions::ExpressionRegistry;
use crate::constants::CONDITION_BINDING;
use crate::errors::EvaluationError;
use crate::event::EventRecord;

/// Evaluates a condition against an event.
///
/// Compile failures, evaluation failures and non-boolean results are all
/// returned as errors, never as a silent `false`.
pub fn match_condition(
    registry: &ExpressionRegistry,
    condition: &str,
    event: &EventRecord,
) -> Result<bool, EvaluationError> {
    let program = expression::compile(condition, registry)?;

    let mut engine = DataLogic::new();
    registry.install(&mut engine);

    let compiled = engine
        .compile(&program)
        .map_err(|e| EvaluationError::Compile {
            condition: condition.to_string(),
            details: e.to_string(),
        })?;

    let mut data = serde_json::Map::new();
    data.insert(CONDITION_BINDING.to_string(), event.to_value());

    let result = engine
        .evaluate(&compiled, Arc::new(Value::Object(data)))
        .map_err(|e| EvaluationError::Evaluate {
            condition: condition.to_string(),
            details: e.to_string(),
        })?;

    match result {
        Value::Bool(verdict) => Ok(verdict),
        other => Err(EvaluationError::NonBoolean {
            condition: condition.to_string(),
            actual: describe(&other),
        }),
    }
}

fn describe(value: &Value) -> String {
    let kind = match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    };
    json!({ "type": kind, "value": value }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ProviderKind;

    fn social_event(text: &str) -> EventRecord {
        EventRecord::new(
            ProviderKind::Social,
            "1001",
            text,
            "https://twitter.com/7/status/1001",
            vec!["https://example.com/launch".to_string()],
            vec![],
        )
    }

    fn chat_event(text: &str) -> EventRecord {
        EventRecord::new(ProviderKind::Chat, "c-1", text, "", vec![], vec![])
    }

    #[test]
    fn test_provider_and_text_condition() {
        let registry = ExpressionRegistry::with_defaults();
        let condition = r#"data.provider == "social" && contains(data.text, "launch")"#;

        assert_eq!(
            match_condition(&registry, condition, &social_event("we launch today")),
            Ok(true)
        );
        assert_eq!(
            match_condition(&registry, condition, &chat_event("we launch today")),
            Ok(false)
        );
    }

    #[test]
    fn test_link_membership() {
        let registry = ExpressionRegistry::with_defaults();
        let event = social_event("see link");

        assert_eq!(
            match_condition(
                &registry,
                r#"contains(data.links, "https://example.com/launch")"#,
                &event
            ),
            Ok(true)
        );
        assert_eq!(
            match_condition(&registry, "len(data.images) == 0", &event),
            Ok(true)
        );
    }

    #[test]
    fn test_regex_and_negation() {
        let registry = ExpressionRegistry::with_defaults();
        let event = social_event("Release v2.4 is out");

        assert_eq!(
            match_condition(&registry, r#"data.text =~ "v[0-9]+\\.[0-9]+""#, &event),
            Ok(true)
        );
        assert_eq!(
            match_condition(&registry, r#"!starts_with(lower(data.text), "release")"#, &event),
            Ok(false)
        );
    }

    #[test]
    fn test_raw_datalogic_condition() {
        let registry = ExpressionRegistry::with_defaults();
        let condition = r#"{"==": [{"val": ["data", "id"]}, "1001"]}"#;

        assert_eq!(
            match_condition(&registry, condition, &social_event("x")),
            Ok(true)
        );
    }

    #[test]
    fn test_evaluation_is_deterministic() {
        let registry = ExpressionRegistry::with_defaults();
        let event = social_event("we launch today");
        let condition = r#"contains(upper(data.text), "LAUNCH") || data.id == "0""#;

        let first = match_condition(&registry, condition, &event);
        for _ in 0..10 {
            assert_eq!(match_condition(&registry, condition, &event), first);
        }
    }

    #[test]
    fn test_non_boolean_result_is_an_error() {
        let registry = ExpressionRegistry::with_defaults();
        let result = match_condition(&registry, "data.text", &social_event("hello"));

        assert!(matches!(result, Err(EvaluationError::NonBoolean { .. })));
    }

    #[test]
    fn test_invalid_condition_is_an_error_not_false() {
        let registry = ExpressionRegistry::with_defaults();
        let event = social_event("hello");

        assert!(matches!(
            match_condition(&registry, "data.provider == ", &event),
            Err(EvaluationError::Parse { .. })
        ));
        assert!(matches!(
            match_condition(&registry, "nope(data.text)", &event),
            Err(EvaluationError::UnknownFunction { .. })
        ));
    }

    #[test]
    fn test_function_type_mismatch_is_an_evaluation_error() {
        let registry = ExpressionRegistry::with_defaults();
        let result = match_condition(&registry, "starts_with(data.links, 'x')", &social_event("x"));

        assert!(matches!(result, Err(EvaluationError::Evaluate { .. })));
    }

    #[test]
    fn test_logical_operators_reject_non_boolean_operands() {
        let registry = ExpressionRegistry::with_defaults();
        let event = social_event("hello");

        for condition in ["!data.text", "data.text && true", "false || data.links"] {
            let result = match_condition(&registry, condition, &event);
            assert!(
                matches!(result, Err(EvaluationError::Evaluate { .. })),
                "{condition:?} returned {result:?}"
            );
        }
    }

    #[test]
    fn test_logical_operators_short_circuit() {
        let registry = ExpressionRegistry::with_defaults();
        let event = social_event("hello");

        assert_eq!(
            match_condition(&registry, "false && data.text", &event),
            Ok(false)
        );
        assert_eq!(
            match_condition(&registry, "true || data.text", &event),
            Ok(true)
        );
        assert_eq!(match_condition(&registry, "!false", &event), Ok(true));
    }

    #[test]
    fn test_equality_does_not_coerce_types() {
        let registry = ExpressionRegistry::with_defaults();
        let event = social_event("hello");

        assert_eq!(match_condition(&registry, "data.id == 1001", &event), Ok(false));
        assert_eq!(match_condition(&registry, "data.id != 1001", &event), Ok(true));
        assert_eq!(
            match_condition(&registry, r#"data.id == "1001""#, &event),
            Ok(true)
        );
    }

    #[test]
    fn test_custom_registry_function() {
        let registry = ExpressionRegistry::new().register(
            "is_short",
            |args: &[Value]| -> Result<Value, String> {
                let text = args
                    .first()
                    .and_then(Value::as_str)
                    .ok_or_else(|| "expected a string".to_string())?;
                Ok(Value::Bool(text.len() < 10))
            },
        );

        assert_eq!(
            match_condition(&registry, "is_short(data.text)", &social_event("tiny")),
            Ok(true)
        );
    }
}
