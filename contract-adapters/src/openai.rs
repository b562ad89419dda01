//! Chat-completions adapter for `OpenAI` and API-compatible gateways.
//!
//! Structured calls send the output schema as a `json_schema` response format.
//! Whatever comes back is parsed leniently with [`extract_json`] and left for
//! the caller to validate.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use contract_schema::SchemaDocument;
use hyper::body::Bytes;
use hyper::header::{AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use hyper::{Body, HeaderMap, Request, StatusCode, Uri};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::http_client::{HyperClient, build_https_client};
use crate::registry::ProviderFactory;
use crate::repair::extract_json;
use crate::traits::{AdapterError, AdapterMetadata, AdapterResult, InferenceRequest, ModelAdapter};

/// Registry name of this provider.
pub const OPENAI_PROVIDER: &str = "openai";

const DEFAULT_BASE_URL: &str = "https://api.openai.com/";
const COMPLETIONS_PATH: &str = "v1/chat/completions";
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
const MAX_SCHEMA_NAME_LEN: usize = 64;
const MAX_ERROR_BODY_LEN: usize = 2048;

/// Connection and sampling settings for `OpenAI` adapters.
///
/// The `Debug` output never includes the API key.
#[derive(Clone)]
pub struct OpenAiConfig {
    model: String,
    key: Option<String>,
    base_url: String,
    request_timeout: Duration,
    temperature: Option<f32>,
    strict_schema: bool,
}

impl OpenAiConfig {
    /// Settings for `model` against the public API, with no key yet.
    #[must_use]
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            key: None,
            base_url: DEFAULT_BASE_URL.to_owned(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            temperature: None,
            strict_schema: false,
        }
    }

    /// Takes the API key from `variable`. Unset or blank variables are ignored.
    #[must_use]
    pub fn with_api_key_from_env(self, variable: &str) -> Self {
        match std::env::var(variable) {
            Ok(key) if !key.trim().is_empty() => self.with_api_key(key),
            _ => self,
        }
    }

    /// Sets the API key explicitly.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Points adapters at another deployment or gateway.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] unless `base_url` is an
    /// absolute `http` or `https` URL.
    pub fn with_base_url(mut self, base_url: impl AsRef<str>) -> AdapterResult<Self> {
        self.base_url = normalise_base_url(base_url.as_ref())?;
        Ok(self)
    }

    /// Replaces the model name.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Temperature used when a request does not carry its own.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Deadline for one HTTP exchange, body included.
    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the `strict` flag of the `json_schema` response format.
    ///
    /// The provider only accepts strict schemas whose objects require every
    /// property and forbid additional ones.
    #[must_use]
    pub fn with_strict_schema(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    /// Base URL with a trailing slash.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self) -> AdapterResult<Uri> {
        format!("{}{COMPLETIONS_PATH}", self.base_url)
            .parse()
            .map_err(|err| AdapterError::configuration(format!("bad completions URL: {err}")))
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("model", &self.model)
            .field("key", &if self.key.is_some() { "<redacted>" } else { "<unset>" })
            .field("base_url", &self.base_url)
            .field("request_timeout", &self.request_timeout)
            .field("temperature", &self.temperature)
            .field("strict_schema", &self.strict_schema)
            .finish()
    }
}

/// One model served through the chat-completions endpoint.
pub struct OpenAiAdapter {
    metadata: AdapterMetadata,
    http: HyperClient,
    endpoint: Uri,
    authorization: String,
    request_timeout: Duration,
    temperature: Option<f32>,
    strict_schema: bool,
}

impl fmt::Debug for OpenAiAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiAdapter")
            .field("metadata", &self.metadata)
            .field("endpoint", &self.endpoint)
            .finish_non_exhaustive()
    }
}

impl OpenAiAdapter {
    /// Builds an adapter with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::Configuration`] when no API key is set.
    pub fn new(config: OpenAiConfig) -> AdapterResult<Self> {
        Self::connect(config, build_https_client())
    }

    fn connect(config: OpenAiConfig, http: HyperClient) -> AdapterResult<Self> {
        let Some(key) = config.key.as_deref() else {
            return Err(AdapterError::configuration(format!(
                "no OpenAI API key available for model `{}`",
                config.model
            )));
        };
        let authorization = format!("Bearer {key}");
        let endpoint = config.endpoint()?;

        Ok(Self {
            metadata: AdapterMetadata::new(OPENAI_PROVIDER, config.model),
            http,
            endpoint,
            authorization,
            request_timeout: config.request_timeout,
            temperature: config.temperature,
            strict_schema: config.strict_schema,
        })
    }

    fn payload<'a>(
        &'a self,
        request: &'a InferenceRequest,
        schema: Option<&'a SchemaDocument>,
    ) -> ChatPayload<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(instructions) = request.instructions() {
            messages.push(ChatMessage {
                role: "system",
                content: instructions,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: request.prompt(),
        });

        ChatPayload {
            model: self.metadata.model(),
            messages,
            temperature: request.temperature().or(self.temperature),
            max_tokens: request.max_output_tokens(),
            response_format: schema.map(|schema| ResponseFormat {
                kind: "json_schema",
                json_schema: NamedSchema {
                    name: schema_name(schema),
                    schema: schema.value(),
                    strict: self.strict_schema,
                },
            }),
            stream: false,
        }
    }

    async fn complete(&self, payload: &ChatPayload<'_>) -> AdapterResult<String> {
        let (status, retry_after, body) = self.post(payload).await?;
        let content = reply_content(status, retry_after, &body)?;
        debug!(
            model = self.metadata.model(),
            %status,
            chars = content.len(),
            "chat completion received"
        );
        Ok(content)
    }

    async fn post(
        &self,
        payload: &ChatPayload<'_>,
    ) -> AdapterResult<(StatusCode, Option<Duration>, Bytes)> {
        let encoded = serde_json::to_vec(payload).map_err(|err| {
            AdapterError::invalid_request(format!("chat payload is not serialisable: {err}"))
        })?;
        let request = Request::post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, self.authorization.as_str())
            .body(Body::from(encoded))
            .map_err(|err| AdapterError::invalid_request(err.to_string()))?;

        let exchange = async {
            let response = self.http.request(request).await?;
            let status = response.status();
            let retry_after = retry_after(response.headers());
            let body = hyper::body::to_bytes(response.into_body()).await?;
            Ok::<_, hyper::Error>((status, retry_after, body))
        };

        match tokio::time::timeout(self.request_timeout, exchange).await {
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(err)) => Err(AdapterError::transport(err.to_string())),
            Err(_) => Err(AdapterError::Timeout {
                elapsed: self.request_timeout,
            }),
        }
    }
}

#[async_trait]
impl ModelAdapter for OpenAiAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    async fn generate_text(&self, request: InferenceRequest) -> AdapterResult<String> {
        self.complete(&self.payload(&request, None)).await
    }

    async fn generate_structured(
        &self,
        request: InferenceRequest,
        schema: &SchemaDocument,
    ) -> AdapterResult<Value> {
        let content = self.complete(&self.payload(&request, Some(schema))).await?;
        extract_json(&content).ok_or_else(|| {
            AdapterError::response(format!("no JSON value in completion for {}", schema.path()))
        })
    }
}

/// Hands out adapters for any requested model over one pooled HTTPS client.
pub struct OpenAiProvider {
    template: OpenAiConfig,
    http: HyperClient,
}

impl OpenAiProvider {
    /// Creates a provider whose adapters copy `config`, swapping in the
    /// requested model.
    #[must_use]
    pub fn new(config: OpenAiConfig) -> Self {
        Self {
            template: config,
            http: build_https_client(),
        }
    }
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpenAiProvider").field(&self.template).finish()
    }
}

impl ProviderFactory for OpenAiProvider {
    fn build(&self, model: &str) -> AdapterResult<Arc<dyn ModelAdapter>> {
        let config = self.template.clone().with_model(model);
        Ok(Arc::new(OpenAiAdapter::connect(config, self.http.clone())?))
    }
}

#[derive(Serialize)]
struct ChatPayload<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    json_schema: NamedSchema<'a>,
}

#[derive(Serialize)]
struct NamedSchema<'a> {
    name: String,
    schema: &'a Value,
    strict: bool,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    choices: Vec<ReplyChoice>,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: Option<ReplyMessage>,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
    refusal: Option<String>,
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let seconds = headers.get(RETRY_AFTER)?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

fn reply_content(
    status: StatusCode,
    retry_after: Option<Duration>,
    body: &[u8],
) -> AdapterResult<String> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(AdapterError::RateLimited { retry_after });
    }
    if !status.is_success() {
        return Err(AdapterError::response(format!(
            "HTTP {status}: {}",
            error_excerpt(body)
        )));
    }

    let reply: ChatReply = serde_json::from_slice(body)
        .map_err(|err| AdapterError::response(format!("malformed chat completion: {err}")))?;
    let message = reply
        .choices
        .into_iter()
        .find_map(|choice| choice.message)
        .ok_or_else(|| AdapterError::response("chat completion has no choices"))?;

    match message {
        ReplyMessage {
            refusal: Some(refusal),
            ..
        } => Err(AdapterError::response(format!("model refused: {refusal}"))),
        ReplyMessage {
            content: Some(content),
            ..
        } => Ok(content),
        ReplyMessage { .. } => Err(AdapterError::response("chat completion has no content")),
    }
}

/// Leading part of an error body, cut on a character boundary.
fn error_excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    if text.len() <= MAX_ERROR_BODY_LEN {
        return text.into_owned();
    }
    let mut end = MAX_ERROR_BODY_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}… ({} bytes omitted)", &text[..end], text.len() - end)
}

fn schema_name(schema: &SchemaDocument) -> String {
    let mut name = schema.name();
    if name.is_empty() {
        name.push_str("response");
    }
    name.truncate(MAX_SCHEMA_NAME_LEN);
    name
}

fn normalise_base_url(raw: &str) -> AdapterResult<String> {
    let trimmed = raw.trim();
    let uri: Uri = trimmed
        .parse()
        .map_err(|err| AdapterError::configuration(format!("`{trimmed}` is not a URL: {err}")))?;
    if !matches!(uri.scheme_str(), Some("http" | "https")) || uri.host().is_none() {
        return Err(AdapterError::configuration(format!(
            "`{trimmed}` must be an absolute http(s) URL"
        )));
    }
    Ok(if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    })
}

#[cfg(test)]
mod tests {
    use contract_primitives::DocumentPath;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    use super::*;

    fn output_schema() -> SchemaDocument {
        SchemaDocument::new(
            DocumentPath::new("stock/analysis/output.schema.yaml").unwrap(),
            json!({
                "type": "object",
                "required": ["analysis"],
                "properties": { "analysis": { "type": "object" } }
            }),
        )
    }

    /// Serves one canned HTTP response and yields the request body it received.
    async fn serve_once(status: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}/", listener.local_addr().unwrap());
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut received = Vec::new();
            let mut chunk = [0_u8; 4096];
            let request_body = loop {
                let read = socket.read(&mut chunk).await.unwrap();
                received.extend_from_slice(&chunk[..read]);
                let text = String::from_utf8_lossy(&received).to_string();
                if let Some(split) = text.find("\r\n\r\n") {
                    let length = text[..split]
                        .lines()
                        .find_map(|line| {
                            let (name, value) = line.split_once(':')?;
                            name.eq_ignore_ascii_case("content-length")
                                .then(|| value.trim().parse::<usize>().ok())
                                .flatten()
                        })
                        .unwrap_or(0);
                    if received.len() >= split + 4 + length {
                        break text[split + 4..].to_owned();
                    }
                }
                assert!(read > 0, "connection closed early");
            };
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            request_body
        });
        (base, handle)
    }

    fn completion(content: &str) -> String {
        json!({ "choices": [ { "message": { "content": content } } ] }).to_string()
    }

    #[test]
    fn base_url_requires_scheme() {
        let err = OpenAiConfig::new("gpt-4")
            .with_base_url("api.openai.com")
            .expect_err("missing scheme should error");

        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn sanitize_allows_trailing_slash() {
        let cfg = OpenAiConfig::new("gpt-4")
            .with_base_url("https://example.com/openai")
            .expect("valid URL");
        assert_eq!(cfg.base_url(), "https://example.com/openai/");
    }

    #[test]
    fn missing_api_key_is_a_configuration_error() {
        let err = OpenAiAdapter::new(OpenAiConfig::new("gpt-4")).expect_err("no key");
        assert!(matches!(err, AdapterError::Configuration { .. }));
    }

    #[test]
    fn debug_output_redacts_the_key() {
        let cfg = OpenAiConfig::new("gpt-4").with_api_key("sk-secret");
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }

    #[test]
    fn structured_request_carries_the_schema() {
        let adapter = OpenAiAdapter::new(
            OpenAiConfig::new("gpt-4o")
                .with_api_key("test_key")
                .with_temperature(0.2),
        )
        .unwrap();
        let request = InferenceRequest::from_prompt("Analyse Acme").with_instructions("Be terse");

        let schema = output_schema();
        let encoded = serde_json::to_value(adapter.payload(&request, Some(&schema))).unwrap();

        assert_eq!(encoded["model"], "gpt-4o");
        assert_eq!(encoded["messages"][0]["role"], "system");
        assert_eq!(encoded["messages"][1]["content"], "Analyse Acme");
        assert_eq!(encoded["response_format"]["type"], "json_schema");
        assert_eq!(
            encoded["response_format"]["json_schema"]["name"],
            "stock_analysis_output"
        );
        assert_eq!(
            encoded["response_format"]["json_schema"]["schema"]["required"],
            json!(["analysis"])
        );
        assert_eq!(encoded["response_format"]["json_schema"]["strict"], false);

        let text = serde_json::to_value(adapter.payload(&request, None)).unwrap();
        assert!(text.get("response_format").is_none());
        assert_eq!(text["temperature"], json!(0.2_f32));
    }

    #[tokio::test]
    async fn generates_structured_output_over_http() {
        let (base, server) = serve_once(
            "200 OK",
            completion("```json\n{\"analysis\": {\"valuation\": \"fair\"}}\n```"),
        )
        .await;
        let adapter = OpenAiAdapter::new(
            OpenAiConfig::new("gpt-4o")
                .with_api_key("test_key")
                .with_base_url(base)
                .unwrap(),
        )
        .unwrap();

        let value = adapter
            .generate_structured(InferenceRequest::from_prompt("Analyse"), &output_schema())
            .await
            .unwrap();
        assert_eq!(value, json!({ "analysis": { "valuation": "fair" } }));

        let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["response_format"]["type"], "json_schema");
    }

    #[tokio::test]
    async fn provider_factory_builds_per_model_adapters() {
        let (base, server) = serve_once("200 OK", completion("plain words")).await;
        let provider = OpenAiProvider::new(
            OpenAiConfig::new("unused")
                .with_api_key("test_key")
                .with_base_url(base)
                .unwrap(),
        );

        let adapter = provider.build("gpt-x").unwrap();
        assert_eq!(adapter.metadata().model(), "gpt-x");
        let text = adapter
            .generate_text(InferenceRequest::from_prompt("Summarise"))
            .await
            .unwrap();
        assert_eq!(text, "plain words");

        let sent: Value = serde_json::from_str(&server.await.unwrap()).unwrap();
        assert_eq!(sent["model"], "gpt-x");
    }

    #[tokio::test]
    async fn error_statuses_are_reported() {
        let (base, _server) = serve_once("500 Internal Server Error", "{}".to_owned()).await;
        let adapter = OpenAiAdapter::new(
            OpenAiConfig::new("gpt-4o")
                .with_api_key("test_key")
                .with_base_url(base)
                .unwrap(),
        )
        .unwrap();
        let err = adapter
            .generate_text(InferenceRequest::from_prompt("hi"))
            .await
            .expect_err("server error");
        assert!(matches!(err, AdapterError::Response { .. }));

        let (base, _server) = serve_once("429 Too Many Requests", "{}".to_owned()).await;
        let adapter = OpenAiAdapter::new(
            OpenAiConfig::new("gpt-4o")
                .with_api_key("test_key")
                .with_base_url(base)
                .unwrap(),
        )
        .unwrap();
        let err = adapter
            .generate_text(InferenceRequest::from_prompt("hi"))
            .await
            .expect_err("rate limited");
        assert!(matches!(err, AdapterError::RateLimited { .. }));
    }

    #[test]
    fn large_error_bodies_are_cut_short() {
        let page = "é".repeat(MAX_ERROR_BODY_LEN);
        let err = reply_content(StatusCode::BAD_GATEWAY, None, page.as_bytes())
            .expect_err("gateway error");
        let reason = match err {
            AdapterError::Response { reason } => reason,
            other => panic!("unexpected error: {other:?}"),
        };
        assert!(reason.starts_with("HTTP 502 Bad Gateway: é"));
        assert!(reason.len() < MAX_ERROR_BODY_LEN + 100);
        assert!(reason.ends_with(&format!("({} bytes omitted)", MAX_ERROR_BODY_LEN)));

        let err = reply_content(StatusCode::BAD_REQUEST, None, b"{\"error\":\"bad model\"}")
            .expect_err("client error");
        assert!(err.to_string().contains("{\"error\":\"bad model\"}"));
    }

    #[tokio::test]
    async fn unparseable_structured_output_is_a_response_error() {
        let (base, _server) = serve_once("200 OK", completion("I cannot help with that")).await;
        let adapter = OpenAiAdapter::new(
            OpenAiConfig::new("gpt-4o")
                .with_api_key("test_key")
                .with_base_url(base)
                .unwrap(),
        )
        .unwrap();
        let err = adapter
            .generate_structured(InferenceRequest::from_prompt("hi"), &output_schema())
            .await
            .expect_err("not json");
        assert!(matches!(err, AdapterError::Response { .. }));
    }
}
