//! Webhook leaf action.
//!
//! POSTs the event record as JSON to a configured URL. Only 200 and 204 are
//! treated as success; redirects and every other status are failures.

use std::collections::BTreeMap;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::ActionError;
use crate::event::EventRecord;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookOp {
    pub url: String,
    pub headers: BTreeMap<String, String>,
}

pub(crate) fn is_webhook_success_status(status_code: u16) -> bool {
    status_code == 200 || status_code == 204
}

#[instrument(skip_all, fields(webhook.url = %op.url, event.id = %event.id()))]
pub(crate) async fn run(
    op: &WebhookOp,
    http_client: &reqwest::Client,
    event: &EventRecord,
) -> Result<(), ActionError> {
    let mut request = http_client.post(&op.url).json(&event.to_value());
    for (name, value) in &op.headers {
        request = request.header(name.as_str(), value.as_str());
        debug!(header.name = %name, "Added custom header");
    }

    let response = request.send().await.map_err(|e| {
        error!(webhook.error = %e, "Failed to send webhook request");
        ActionError::Webhook {
            url: op.url.clone(),
            details: e.to_string(),
        }
    })?;

    let status_code = response.status().as_u16();
    if is_webhook_success_status(status_code) {
        info!(webhook.status = status_code, "Webhook request successful");
        return Ok(());
    }

    let error_body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("Unable to read response body"));
    warn!(
        webhook.status = status_code,
        webhook.error = %error_body,
        "Webhook request failed with non-200/204 status"
    );

    Err(ActionError::Webhook {
        url: op.url.clone(),
        details: format!("status {}: {}", status_code, error_body),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::sample_social_event;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn webhook(server: &MockServer) -> WebhookOp {
        WebhookOp {
            url: format!("{}/hook", server.uri()),
            headers: BTreeMap::from([("X-Bot".to_string(), "mybot".to_string())]),
        }
    }

    #[test]
    fn test_success_statuses() {
        assert!(is_webhook_success_status(200));
        assert!(is_webhook_success_status(204));
        assert!(!is_webhook_success_status(201));
        assert!(!is_webhook_success_status(302));
        assert!(!is_webhook_success_status(500));
    }

    #[tokio::test]
    async fn test_webhook_posts_event_with_headers() {
        let server = MockServer::start().await;
        let event = sample_social_event("11", "hello");
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header("X-Bot", "mybot"))
            .and(body_json(event.to_value()))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        run(&webhook(&server), &reqwest::Client::new(), &event)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_webhook_rejects_other_statuses() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .respond_with(ResponseTemplate::new(201).set_body_string("created"))
            .mount(&server)
            .await;

        let result = run(
            &webhook(&server),
            &reqwest::Client::new(),
            &sample_social_event("11", "hello"),
        )
        .await;

        match result {
            Err(ActionError::Webhook { details, .. }) => assert_eq!(details, "status 201: created"),
            other => panic!("expected webhook error, got {:?}", other),
        }
    }
}
