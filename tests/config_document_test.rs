//! Loading and validating rules documents from disk.

use std::io::Write;

use mybot::config::{load_rules_document, parse_rules_document};
use mybot::engine::{Action, ChatOp, ExpressionRegistry, SocialOp, match_condition};
use mybot::errors::{ConfigError, ValidationError};
use mybot::event::{EventRecord, ProviderKind};
use mybot::source::SourceVariant;
use mybot::validation::Validator;

#[test]
fn test_example_document_loads_and_validates() {
    let pipeline = load_rules_document("config.example.yaml").unwrap();

    assert_eq!(
        pipeline.sources,
        vec![
            SourceVariant::SocialStream { enabled: true },
            SourceVariant::ChatRtm { enabled: false },
        ]
    );
    assert_eq!(pipeline.rules.len(), 2);
    Validator::validate_pipeline(&pipeline).unwrap();

    let first: Vec<&Action> = pipeline.rules[0]
        .chain
        .leaves()
        .into_iter()
        .filter(|leaf| leaf.enabled)
        .map(|leaf| &leaf.action)
        .collect();
    assert_eq!(first[0], &Action::Social(SocialOp::Amplify));
    assert_eq!(first[1], &Action::Social(SocialOp::Favorite));
    assert!(matches!(first[2], Action::Chat(ChatOp::Message { .. })));
    assert!(matches!(first[3], Action::Webhook(_)));
    assert_eq!(first[4], &Action::Debug);
}

#[test]
fn test_example_conditions_evaluate() {
    let pipeline = load_rules_document("config.example.yaml").unwrap();
    let registry = ExpressionRegistry::with_defaults();

    let event = EventRecord::new(
        ProviderKind::Social,
        "9",
        "Release notes: we launch today",
        "https://twitter.com/7/status/9",
        vec!["https://example.com/notes".to_string()],
        vec![],
    );

    for rule in &pipeline.rules {
        assert!(match_condition(&registry, &rule.condition, &event).unwrap());
    }
}

#[test]
fn test_non_http_webhook_is_rejected() {
    let pipeline = parse_rules_document(
        r#"
process:
  - filter:
      condition: "true"
    action:
      webhook:
        url: file:///etc/passwd
"#,
    )
    .unwrap();

    assert!(matches!(
        Validator::validate_pipeline(&pipeline),
        Err(ValidationError::InvalidWebhookUrl { .. })
    ));
}

#[test]
fn test_unreadable_and_malformed_documents() {
    let dir = tempfile::tempdir().unwrap();

    let missing = dir.path().join("missing.yaml");
    assert!(matches!(
        load_rules_document(&missing),
        Err(ConfigError::UnreadableFile { .. })
    ));

    let malformed = dir.path().join("malformed.yaml");
    let mut file = std::fs::File::create(&malformed).unwrap();
    writeln!(file, "process: not-a-list").unwrap();
    assert!(matches!(
        load_rules_document(&malformed),
        Err(ConfigError::MalformedDocument { .. })
    ));
}
