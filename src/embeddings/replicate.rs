// Replicate embedding backend
// Runs a CLIP embeddings model through the predictions API.
// API Reference: https://replicate.com/docs/reference/http#predictions.create
//
// Requests are sent with `Prefer: wait` so most predictions complete inline.
// Predictions still running when the response returns are polled through
// their `urls.get` link.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::provider::{interpret_output, EmbeddingBackend, EmbeddingInput, EmbeddingOutcome};
use crate::config::EmbeddingConfig;

const REPLICATE_API_BASE: &str = "https://api.replicate.com";

pub struct ReplicateClient {
    client: Client,
    api_key: String,
    base_url: String,
    model_version: String,
    timeout: Duration,
    max_polls: u32,
    poll_interval: Duration,
}

#[derive(Serialize)]
struct PredictionRequest<'a> {
    version: &'a str,
    input: PredictionInput,
}

#[derive(Serialize)]
#[serde(rename_all = "lowercase")]
enum PredictionInput {
    Image(String),
    Text(String),
}

#[derive(Deserialize)]
struct Prediction {
    status: String,
    #[serde(default)]
    output: Value,
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    urls: Option<PredictionUrls>,
}

#[derive(Deserialize)]
struct PredictionUrls {
    get: Option<String>,
}

impl ReplicateClient {
    pub fn new(api_key: &str, model_version: &str) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.to_string(),
            base_url: REPLICATE_API_BASE.to_string(),
            model_version: version_id(model_version).to_string(),
            timeout: Duration::from_secs(30),
            max_polls: 10,
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self::new(&config.replicate_api_key, &config.model_version)
            .with_base_url(&config.replicate_base_url)
            .with_timeout(Duration::from_secs(config.timeout_secs))
            .with_polling(config.max_polls, Duration::from_millis(config.poll_interval_ms))
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Per-request timeout; elapsed requests count as provider failures.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_polling(mut self, max_polls: u32, interval: Duration) -> Self {
        self.max_polls = max_polls;
        self.poll_interval = interval;
        self
    }

    fn build_input(input: EmbeddingInput<'_>) -> PredictionInput {
        match input {
            EmbeddingInput::Image(bytes) => PredictionInput::Image(format!(
                "data:{};base64,{}",
                sniff_media_type(bytes),
                BASE64.encode(bytes)
            )),
            EmbeddingInput::Text(text) => PredictionInput::Text(text.to_string()),
        }
    }

    async fn create_prediction(&self, input: EmbeddingInput<'_>) -> Result<Prediction, String> {
        let url = format!("{}/v1/predictions", self.base_url);
        let request = PredictionRequest {
            version: &self.model_version,
            input: Self::build_input(input),
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("Prefer", "wait")
            .timeout(self.timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("Replicate request failed: {}", e))?;

        Self::read_prediction(response).await
    }

    async fn fetch_prediction(&self, url: &str) -> Result<Prediction, String> {
        let response = self
            .client
            .get(url)
            .bearer_auth(&self.api_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| format!("Replicate poll failed: {}", e))?;

        Self::read_prediction(response).await
    }

    async fn read_prediction(response: reqwest::Response) -> Result<Prediction, String> {
        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(format!("Replicate API error ({}): {}", status, error_text));
        }

        response
            .json::<Prediction>()
            .await
            .map_err(|e| format!("Failed to parse Replicate response: {}", e))
    }
}

#[async_trait]
impl EmbeddingBackend for ReplicateClient {
    async fn embed(&self, input: EmbeddingInput<'_>) -> EmbeddingOutcome {
        let mut prediction = match self.create_prediction(input).await {
            Ok(prediction) => prediction,
            Err(reason) => {
                warn!(kind = input.kind(), error = %reason, "Embedding request failed");
                return EmbeddingOutcome::ProviderError(reason);
            }
        };

        let mut polls = 0;
        loop {
            match prediction.status.as_str() {
                "succeeded" => return interpret_output(&prediction.output),
                "failed" | "canceled" => {
                    let reason = prediction
                        .error
                        .as_ref()
                        .map(|e| e.as_str().map(String::from).unwrap_or_else(|| e.to_string()))
                        .unwrap_or_else(|| format!("prediction {}", prediction.status));
                    warn!(kind = input.kind(), error = %reason, "Embedding prediction failed");
                    return EmbeddingOutcome::ProviderError(reason);
                }
                _ => {}
            }

            let Some(get_url) = prediction.urls.as_ref().and_then(|u| u.get.clone()) else {
                return EmbeddingOutcome::ProviderError(format!(
                    "prediction {} without poll url",
                    prediction.status
                ));
            };
            if polls >= self.max_polls {
                warn!(kind = input.kind(), polls, "Embedding prediction did not finish in time");
                return EmbeddingOutcome::ProviderError(format!(
                    "prediction still {} after {} polls",
                    prediction.status, polls
                ));
            }

            polls += 1;
            debug!(status = %prediction.status, polls, "Polling embedding prediction");
            tokio::time::sleep(self.poll_interval).await;

            prediction = match self.fetch_prediction(&get_url).await {
                Ok(prediction) => prediction,
                Err(reason) => return EmbeddingOutcome::ProviderError(reason),
            };
        }
    }
}

// Accepts both `owner/model:version` and a bare version id.
fn version_id(model: &str) -> &str {
    model.rsplit(':').next().unwrap_or(model)
}

/// Media type from the leading magic bytes of an encoded image.
fn sniff_media_type(bytes: &[u8]) -> &'static str {
    match bytes {
        [0x89, b'P', b'N', b'G', ..] => "image/png",
        [0xFF, 0xD8, 0xFF, ..] => "image/jpeg",
        [b'G', b'I', b'F', b'8', ..] => "image/gif",
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;
    use serde_json::json;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    fn client_for(server: &mockito::ServerGuard) -> ReplicateClient {
        ReplicateClient::new("test-token", "krthr/clip-embeddings:abc123")
            .with_base_url(&server.url())
            .with_polling(2, Duration::from_millis(5))
    }

    #[test]
    fn test_version_id() {
        assert_eq!(version_id("krthr/clip-embeddings:abc123"), "abc123");
        assert_eq!(version_id("abc123"), "abc123");
    }

    #[test]
    fn test_sniff_media_type() {
        assert_eq!(sniff_media_type(PNG_HEADER), "image/png");
        assert_eq!(sniff_media_type(&[0xFF, 0xD8, 0xFF, 0xE0]), "image/jpeg");
        assert_eq!(sniff_media_type(b"GIF89a"), "image/gif");
        assert_eq!(sniff_media_type(b"RIFF\0\0\0\0WEBPVP8 "), "image/webp");
        assert_eq!(sniff_media_type(b"hello"), "application/octet-stream");
    }

    #[test]
    fn test_image_input_is_data_uri() {
        match ReplicateClient::build_input(EmbeddingInput::Image(PNG_HEADER)) {
            PredictionInput::Image(uri) => {
                assert!(uri.starts_with("data:image/png;base64,"));
                assert!(uri.ends_with(&BASE64.encode(PNG_HEADER)));
            }
            PredictionInput::Text(_) => panic!("expected image input"),
        }
    }

    #[tokio::test]
    async fn test_text_embedding_bare_list() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/predictions")
            .match_header("authorization", "Bearer test-token")
            .match_header("prefer", "wait")
            .match_body(Matcher::PartialJson(json!({
                "version": "abc123",
                "input": {"text": "a red bicycle"}
            })))
            .with_status(201)
            .with_body(json!({"status": "succeeded", "output": [0.1, 0.2, 0.3]}).to_string())
            .create_async()
            .await;

        let outcome = client_for(&server).embed(EmbeddingInput::Text("a red bicycle")).await;

        mock.assert_async().await;
        assert_eq!(outcome, EmbeddingOutcome::Vector(vec![0.1, 0.2, 0.3]));
    }

    #[tokio::test]
    async fn test_image_embedding_object_output() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/predictions")
            .match_body(Matcher::Regex("data:image/png;base64,".to_string()))
            .with_status(201)
            .with_body(
                json!({"status": "succeeded", "output": {"embedding": [1.0, -1.0]}}).to_string(),
            )
            .create_async()
            .await;

        let outcome = client_for(&server).embed(EmbeddingInput::Image(PNG_HEADER)).await;

        mock.assert_async().await;
        assert_eq!(outcome, EmbeddingOutcome::Vector(vec![1.0, -1.0]));
    }

    #[tokio::test]
    async fn test_unexpected_output_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/predictions")
            .with_status(201)
            .with_body(json!({"status": "succeeded", "output": "not a vector"}).to_string())
            .create_async()
            .await;

        let outcome = client_for(&server).embed(EmbeddingInput::Text("x")).await;
        assert_eq!(outcome, EmbeddingOutcome::MalformedResponse);
    }

    #[tokio::test]
    async fn test_http_error_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/predictions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let outcome = client_for(&server).embed(EmbeddingInput::Text("x")).await;
        assert!(matches!(
            outcome,
            EmbeddingOutcome::ProviderError(reason) if reason.contains("500")
        ));
    }

    #[tokio::test]
    async fn test_failed_prediction_is_provider_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/predictions")
            .with_status(201)
            .with_body(json!({"status": "failed", "error": "CUDA out of memory"}).to_string())
            .create_async()
            .await;

        let outcome = client_for(&server).embed(EmbeddingInput::Text("x")).await;
        assert!(
            matches!(outcome, EmbeddingOutcome::ProviderError(reason) if reason.contains("CUDA"))
        );
    }

    #[tokio::test]
    async fn test_unreachable_service_is_provider_error() {
        let client = ReplicateClient::new("t", "v")
            .with_base_url("http://127.0.0.1:1")
            .with_timeout(Duration::from_millis(200));

        let outcome = client.embed(EmbeddingInput::Text("x")).await;
        assert!(matches!(outcome, EmbeddingOutcome::ProviderError(_)));
    }

    #[tokio::test]
    async fn test_polls_until_succeeded() {
        let mut server = mockito::Server::new_async().await;
        let get_url = format!("{}/v1/predictions/p1", server.url());
        server
            .mock("POST", "/v1/predictions")
            .with_status(201)
            .with_body(json!({"status": "processing", "urls": {"get": get_url}}).to_string())
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/v1/predictions/p1")
            .with_status(200)
            .with_body(json!({"status": "succeeded", "output": [0.7]}).to_string())
            .expect(1)
            .create_async()
            .await;

        let outcome = client_for(&server).embed(EmbeddingInput::Text("x")).await;

        poll.assert_async().await;
        assert_eq!(outcome, EmbeddingOutcome::Vector(vec![0.7]));
    }

    #[tokio::test]
    async fn test_gives_up_after_max_polls() {
        let mut server = mockito::Server::new_async().await;
        let get_url = format!("{}/v1/predictions/p2", server.url());
        let body = json!({"status": "processing", "urls": {"get": get_url}}).to_string();
        server
            .mock("POST", "/v1/predictions")
            .with_status(201)
            .with_body(body.clone())
            .create_async()
            .await;
        let poll = server
            .mock("GET", "/v1/predictions/p2")
            .with_status(200)
            .with_body(body)
            .expect(2)
            .create_async()
            .await;

        let outcome = client_for(&server).embed(EmbeddingInput::Text("x")).await;

        poll.assert_async().await;
        assert!(matches!(outcome, EmbeddingOutcome::ProviderError(_)));
    }
}
