//! HTTP binding for the social provider (v2 API).

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::{SocialProvider, StreamConnection, StreamedPost};
use crate::constants::PROVIDER_SOCIAL;
use crate::errors::ProviderError;

/// Capacity of the channels between the stream reader and the source worker.
const STREAM_CHANNEL_CAPACITY: usize = 64;

pub struct TwitterClient {
    base_url: String,
    token: String,
    http_client: reqwest::Client,
    stream_client: reqwest::Client,
}

impl TwitterClient {
    /// `http_client` is used for single-shot calls and may carry a request
    /// timeout; `stream_client` holds the long-lived stream open and must not.
    pub fn new(
        base_url: impl Into<String>,
        token: impl Into<String>,
        http_client: reqwest::Client,
        stream_client: reqwest::Client,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            http_client,
            stream_client,
        }
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn send(&self, operation: &str, request: RequestBuilder) -> Result<Value, ProviderError> {
        let response = request
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| request_failed(operation, e))?;

        let response = check_status(operation, response).await?;
        let body: Value = response.json().await.map_err(|e| ProviderError::Decode {
            provider: PROVIDER_SOCIAL.to_string(),
            operation: operation.to_string(),
            details: e.to_string(),
        })?;

        if body.get("data").is_none() {
            if let Some(problems) = body.get("errors") {
                return Err(ProviderError::Api {
                    provider: PROVIDER_SOCIAL.to_string(),
                    operation: operation.to_string(),
                    details: problems.to_string(),
                });
            }
        }

        Ok(body)
    }
}

fn request_failed(operation: &str, error: reqwest::Error) -> ProviderError {
    ProviderError::RequestFailed {
        provider: PROVIDER_SOCIAL.to_string(),
        operation: operation.to_string(),
        details: error.to_string(),
    }
}

async fn check_status(operation: &str, response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::UnexpectedStatus {
        provider: PROVIDER_SOCIAL.to_string(),
        operation: operation.to_string(),
        status: status.as_u16(),
        body,
    })
}

#[derive(Deserialize)]
struct StreamMessage {
    data: Option<TweetData>,
    #[serde(default)]
    errors: Vec<ApiProblem>,
}

#[derive(Deserialize)]
struct TweetData {
    id: String,
    #[serde(default)]
    text: String,
    #[serde(default)]
    author_id: String,
    entities: Option<Entities>,
}

#[derive(Deserialize)]
struct Entities {
    #[serde(default)]
    urls: Vec<UrlEntity>,
}

#[derive(Deserialize)]
struct UrlEntity {
    expanded_url: Option<String>,
}

#[derive(Deserialize)]
struct ApiProblem {
    title: Option<String>,
    detail: Option<String>,
}

impl ApiProblem {
    fn describe(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{}: {}", title, detail),
            (Some(title), None) => title.clone(),
            (None, Some(detail)) => detail.clone(),
            (None, None) => "unknown stream error".to_string(),
        }
    }
}

impl From<TweetData> for StreamedPost {
    fn from(tweet: TweetData) -> Self {
        let expanded_urls = tweet
            .entities
            .map(|entities| {
                entities
                    .urls
                    .into_iter()
                    .filter_map(|url| url.expanded_url)
                    .collect()
            })
            .unwrap_or_default();

        StreamedPost {
            id: tweet.id,
            author_id: tweet.author_id,
            text: tweet.text,
            expanded_urls,
        }
    }
}

/// Decodes one stream line into notifications and errors.
fn decode_stream_line(line: &[u8]) -> (Option<StreamedPost>, Vec<ProviderError>) {
    let trimmed = line.trim_ascii();
    if trimmed.is_empty() {
        // Keep-alive
        return (None, Vec::new());
    }

    match serde_json::from_slice::<StreamMessage>(trimmed) {
        Ok(message) => {
            let errors = message
                .errors
                .iter()
                .map(|problem| ProviderError::Api {
                    provider: PROVIDER_SOCIAL.to_string(),
                    operation: "stream".to_string(),
                    details: problem.describe(),
                })
                .collect();
            (message.data.map(StreamedPost::from), errors)
        }
        Err(e) => (
            None,
            vec![ProviderError::Decode {
                provider: PROVIDER_SOCIAL.to_string(),
                operation: "stream".to_string(),
                details: e.to_string(),
            }],
        ),
    }
}

async fn read_stream(
    mut response: Response,
    notifications: mpsc::Sender<StreamedPost>,
    errors: mpsc::Sender<ProviderError>,
    stop: CancellationToken,
) {
    let mut buffer: Vec<u8> = Vec::new();

    loop {
        let chunk = tokio::select! {
            () = stop.cancelled() => {
                debug!("Stream stopped");
                return;
            }
            chunk = response.chunk() => chunk,
        };

        match chunk {
            Ok(Some(bytes)) => {
                buffer.extend_from_slice(&bytes);
                while let Some(newline) = buffer.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = buffer.drain(..=newline).collect();
                    let (post, problems) = decode_stream_line(&line);
                    for problem in problems {
                        if errors.send(problem).await.is_err() {
                            return;
                        }
                    }
                    if let Some(post) = post {
                        if notifications.send(post).await.is_err() {
                            return;
                        }
                    }
                }
            }
            Ok(None) => {
                debug!("Stream ended by provider");
                return;
            }
            Err(e) => {
                warn!(error = ?e, "Stream read failed");
                let _ = errors.send(request_failed("stream", e)).await;
                return;
            }
        }
    }
}

#[async_trait]
impl SocialProvider for TwitterClient {
    #[instrument(skip(self))]
    async fn connect_stream(&self) -> Result<StreamConnection, ProviderError> {
        let response = self
            .stream_client
            .get(self.api_url("/2/tweets/search/stream"))
            .query(&[("tweet.fields", "author_id,entities")])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| request_failed("stream", e))?;
        let response = check_status("stream", response).await?;

        let (notifications_tx, notifications_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let (errors_tx, errors_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let stop = CancellationToken::new();

        tokio::spawn(read_stream(
            response,
            notifications_tx,
            errors_tx,
            stop.clone(),
        ));

        Ok(StreamConnection::new(notifications_rx, errors_rx, stop))
    }

    #[instrument(skip(self, text))]
    async fn post(&self, text: &str) -> Result<(), ProviderError> {
        let request = self
            .http_client
            .post(self.api_url("/2/tweets"))
            .json(&json!({ "text": text }));
        self.send("post", request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn me(&self) -> Result<String, ProviderError> {
        let request = self.http_client.get(self.api_url("/2/users/me"));
        let body = self.send("me", request).await?;

        body.pointer("/data/id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ProviderError::Decode {
                provider: PROVIDER_SOCIAL.to_string(),
                operation: "me".to_string(),
                details: "response has no data.id".to_string(),
            })
    }

    #[instrument(skip(self))]
    async fn amplify(&self, user_id: &str, record_id: &str) -> Result<(), ProviderError> {
        let request = self
            .http_client
            .post(self.api_url(&format!("/2/users/{}/retweets", user_id)))
            .json(&json!({ "tweet_id": record_id }));
        self.send("amplify", request).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn favorite(&self, user_id: &str, record_id: &str) -> Result<(), ProviderError> {
        let request = self
            .http_client
            .post(self.api_url(&format!("/2/users/{}/likes", user_id)))
            .json(&json!({ "tweet_id": record_id }));
        self.send("favorite", request).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{bearer_token, body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> TwitterClient {
        TwitterClient::new(
            server.uri(),
            "social-token",
            reqwest::Client::new(),
            reqwest::Client::new(),
        )
    }

    #[test]
    fn test_decode_stream_line_extracts_links() {
        let line = br#"{"data":{"id":"99","text":"hi","author_id":"7","entities":{"urls":[{"expanded_url":"https://a.example"},{"url":"x"},{"expanded_url":"https://b.example"}]}}}"#;
        let (post, errors) = decode_stream_line(line);

        assert!(errors.is_empty());
        assert_eq!(
            post,
            Some(StreamedPost {
                id: "99".to_string(),
                author_id: "7".to_string(),
                text: "hi".to_string(),
                expanded_urls: vec![
                    "https://a.example".to_string(),
                    "https://b.example".to_string()
                ],
            })
        );
    }

    #[test]
    fn test_decode_stream_line_skips_keep_alive() {
        let (post, errors) = decode_stream_line(b"\r\n");
        assert!(post.is_none());
        assert!(errors.is_empty());
    }

    #[test]
    fn test_decode_stream_line_reports_errors() {
        let (post, errors) =
            decode_stream_line(br#"{"errors":[{"title":"operational-disconnect","detail":"reset"}]}"#);
        assert!(post.is_none());
        assert_eq!(errors.len(), 1);
        assert!(errors[0].to_string().contains("operational-disconnect: reset"));

        let (post, errors) = decode_stream_line(b"not json");
        assert!(post.is_none());
        assert!(matches!(errors[0], ProviderError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_me_returns_user_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/users/me"))
            .and(bearer_token("social-token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"id": "42", "username": "mybot"}})),
            )
            .mount(&server)
            .await;

        assert_eq!(client(&server).me().await.unwrap(), "42");
    }

    #[tokio::test]
    async fn test_amplify_and_favorite_post_record_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/users/42/retweets"))
            .and(body_json(json!({"tweet_id": "99"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"retweeted": true}})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/2/users/42/likes"))
            .and(body_json(json!({"tweet_id": "99"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"liked": true}})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        client.amplify("42", "99").await.unwrap();
        client.favorite("42", "99").await.unwrap();
    }

    #[tokio::test]
    async fn test_post_reports_unexpected_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .mount(&server)
            .await;

        let result = client(&server).post("hello").await;
        assert!(matches!(
            result,
            Err(ProviderError::UnexpectedStatus { status: 403, ref body, .. }) if body == "forbidden"
        ));
    }

    #[tokio::test]
    async fn test_api_errors_without_data_are_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/2/tweets"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"errors": [{"title": "duplicate content"}]})),
            )
            .mount(&server)
            .await;

        let result = client(&server).post("hello").await;
        assert!(matches!(result, Err(ProviderError::Api { .. })));
    }

    #[tokio::test]
    async fn test_stream_delivers_posts_then_closes() {
        let server = MockServer::start().await;
        let body = concat!(
            r#"{"data":{"id":"1","text":"first","author_id":"7"}}"#,
            "\r\n\r\n",
            r#"{"errors":[{"title":"slow"}]}"#,
            "\r\n",
            r#"{"data":{"id":"2","text":"second","author_id":"7"}}"#,
            "\r\n",
        );
        Mock::given(method("GET"))
            .and(path("/2/tweets/search/stream"))
            .and(bearer_token("social-token"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let mut connection = client(&server).connect_stream().await.unwrap();

        let first = connection.notifications.recv().await.unwrap();
        assert_eq!(first.id, "1");
        let second = connection.notifications.recv().await.unwrap();
        assert_eq!(second.id, "2");
        assert!(connection.notifications.recv().await.is_none());

        let problem = tokio::time::timeout(Duration::from_secs(1), connection.errors.recv())
            .await
            .unwrap()
            .unwrap();
        assert!(problem.to_string().contains("slow"));

        connection.stop();
        assert!(connection.is_stopped());
    }

    #[tokio::test]
    async fn test_stream_connect_rejects_bad_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/2/tweets/search/stream"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let result = client(&server).connect_stream().await;
        assert!(matches!(
            result,
            Err(ProviderError::UnexpectedStatus { status: 429, .. })
        ));
    }
}
