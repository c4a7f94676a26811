use std::time::Duration;

use anyhow::Result;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::AgentService;
use crate::config::Config;
use crate::error::{DispatchError, DispatchResult, Endpoint};

/// Longest server error body kept in a status error.
const MAX_DETAIL_CHARS: usize = 200;

#[derive(Serialize)]
struct UserQuery<'a> {
    content: &'a str,
    additional_kwargs: Map<String, Value>,
    response_metadata: Map<String, Value>,
    #[serde(rename = "type")]
    kind: &'static str,
    name: &'static str,
    id: &'static str,
    example: bool,
    #[serde(rename = "additionalProp1")]
    additional_prop1: Map<String, Value>,
}

#[derive(Serialize)]
struct InvokeInput<'a> {
    user_query: UserQuery<'a>,
}

/// Body of `POST /agent/invoke`.
///
/// Only `content` carries meaning; the remaining fields are the placeholders
/// the agent server's input schema expects.
#[derive(Serialize)]
pub struct InvokeRequest<'a> {
    input: InvokeInput<'a>,
    config: Map<String, Value>,
    kwargs: Map<String, Value>,
}

impl<'a> InvokeRequest<'a> {
    pub fn new(query: &'a str) -> Self {
        Self {
            input: InvokeInput {
                user_query: UserQuery {
                    content: query,
                    additional_kwargs: Map::new(),
                    response_metadata: Map::new(),
                    kind: "human",
                    name: "string",
                    id: "string",
                    example: false,
                    additional_prop1: Map::new(),
                },
            },
            config: Map::new(),
            kwargs: Map::new(),
        }
    }
}

#[derive(Deserialize)]
struct AnswerMessage {
    content: String,
}

#[derive(Deserialize)]
struct InvokeOutput {
    answer: AnswerMessage,
}

#[derive(Deserialize)]
struct InvokeResponse {
    output: InvokeOutput,
}

#[derive(Deserialize)]
struct ImagesResponse {
    images: Vec<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(alias = "detail")]
    error: Value,
}

/// Extract the reply text from an `/agent/invoke` response body.
pub fn parse_answer(body: &str) -> DispatchResult<String> {
    let response: InvokeResponse = serde_json::from_str(body).map_err(|e| DispatchError::Malformed {
        endpoint: Endpoint::Agent,
        reason: e.to_string(),
    })?;
    Ok(response.output.answer.content)
}

/// Extract the image list from a `/query_image` response body.
pub fn parse_images(body: &str) -> DispatchResult<Vec<String>> {
    let response: ImagesResponse = serde_json::from_str(body).map_err(|e| DispatchError::Malformed {
        endpoint: Endpoint::Images,
        reason: e.to_string(),
    })?;
    Ok(response.images)
}

/// Pull a readable message out of a non-OK response body.
fn error_detail(body: &str) -> Option<String> {
    let body = body.trim();
    if body.is_empty() {
        return None;
    }

    let detail = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error: Value::String(s) }) => s,
        Ok(ErrorBody { error }) => error.to_string(),
        Err(_) => body.to_string(),
    };

    if detail.chars().count() > MAX_DETAIL_CHARS {
        let truncated: String = detail.chars().take(MAX_DETAIL_CHARS).collect();
        Some(format!("{}...", truncated))
    } else {
        Some(detail)
    }
}

async fn read_body(response: Response, endpoint: Endpoint) -> DispatchResult<String> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|source| DispatchError::Transport { endpoint, source })?;

    if !status.is_success() {
        return Err(DispatchError::Status {
            endpoint,
            status: status.as_u16(),
            detail: error_detail(&body),
        });
    }

    Ok(body)
}

/// HTTP client for the agent server.
#[derive(Clone)]
pub struct AgentClient {
    client: Client,
    base_url: String,
}

impl AgentClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }

        Ok(Self {
            client: builder.build()?,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl AgentService for AgentClient {
    async fn ask(&self, query: &str) -> DispatchResult<String> {
        let url = format!("{}/agent/invoke", self.base_url);
        debug!(%url, "invoking agent");

        let response = self
            .client
            .post(&url)
            .json(&InvokeRequest::new(query))
            .send()
            .await
            .map_err(|source| DispatchError::Transport {
                endpoint: Endpoint::Agent,
                source,
            })?;

        let body = read_body(response, Endpoint::Agent).await?;
        parse_answer(&body)
    }

    async fn images(&self, query: &str) -> DispatchResult<Vec<String>> {
        let url = format!("{}/query_image", self.base_url);
        debug!(%url, "looking up images");

        let response = self
            .client
            .get(&url)
            .query(&[("query", query)])
            .send()
            .await
            .map_err(|source| DispatchError::Transport {
                endpoint: Endpoint::Images,
                source,
            })?;

        let body = read_body(response, Endpoint::Images).await?;
        parse_images(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_shape() {
        let body = serde_json::to_value(InvokeRequest::new("Hello")).unwrap();
        assert_eq!(
            body,
            json!({
                "input": {
                    "user_query": {
                        "content": "Hello",
                        "additional_kwargs": {},
                        "response_metadata": {},
                        "type": "human",
                        "name": "string",
                        "id": "string",
                        "example": false,
                        "additionalProp1": {}
                    }
                },
                "config": {},
                "kwargs": {}
            })
        );
    }

    #[test]
    fn test_parse_answer() {
        let body = r#"{"output":{"answer":{"content":"Hi there!","type":"ai"}},"metadata":{}}"#;
        assert_eq!(parse_answer(body).unwrap(), "Hi there!");
    }

    #[test]
    fn test_parse_answer_missing_field() {
        let err = parse_answer(r#"{"output":{}}"#).unwrap_err();
        assert!(matches!(err, DispatchError::Malformed { endpoint: Endpoint::Agent, .. }));
    }

    #[test]
    fn test_parse_answer_not_json() {
        let err = parse_answer("<html>bad gateway</html>").unwrap_err();
        assert!(matches!(err, DispatchError::Malformed { .. }));
    }

    #[test]
    fn test_parse_images() {
        let images = parse_images(r#"{"images":["a.png","b.png"]}"#).unwrap();
        assert_eq!(images, vec!["a.png", "b.png"]);
    }

    #[test]
    fn test_parse_images_wrong_type() {
        let err = parse_images(r#"{"images":"a.png"}"#).unwrap_err();
        assert_eq!(err.endpoint(), Endpoint::Images);
    }

    #[test]
    fn test_error_detail_prefers_error_field() {
        assert_eq!(error_detail(r#"{"error":"bad image"}"#).as_deref(), Some("bad image"));
        assert_eq!(error_detail(r#"{"detail":[{"msg":"field required"}]}"#).as_deref(), Some(r#"[{"msg":"field required"}]"#));
        assert_eq!(error_detail("Internal Server Error").as_deref(), Some("Internal Server Error"));
        assert_eq!(error_detail("   "), None);
    }

    #[test]
    fn test_error_detail_truncates() {
        let long = "x".repeat(500);
        let detail = error_detail(&long).unwrap();
        assert_eq!(detail.chars().count(), MAX_DETAIL_CHARS + 3);
        assert!(detail.ends_with("..."));
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = AgentClient::new("http://localhost:8000/");
        assert_eq!(client.base_url(), "http://localhost:8000");
    }
}
