use crate::{GenerationRequest, ImageGenerator, PlaceholderError, PlaceholderResult};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/images/generations";

pub struct OpenAiImageGenerator {
    api_key: String,
    endpoint: String,
    client: reqwest::Client,
}

impl OpenAiImageGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Points the generator at a compatible endpoint, e.g. a proxy.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl ImageGenerator for OpenAiImageGenerator {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, request: GenerationRequest) -> PlaceholderResult<Vec<u8>> {
        let model = request
            .options
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or("gpt-image-1");
        let (width, height) = request.aspect.size();

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&json!({
                "model": model,
                "prompt": request.prompt,
                "n": 1,
                "size": format!("{width}x{height}"),
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(PlaceholderError::ProviderError(format!(
                "OpenAI API error: {}",
                error_text
            )));
        }

        let response_json: serde_json::Value = response.json().await?;
        decode_first_image(&response_json)
    }
}

/// `data[0].b64_json` of an images response.
fn decode_first_image(response: &serde_json::Value) -> PlaceholderResult<Vec<u8>> {
    let encoded = response
        .get("data")
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("b64_json"))
        .and_then(|v| v.as_str())
        .ok_or_else(|| {
            PlaceholderError::ProviderError("No image data found in OpenAI response".to_string())
        })?;

    general_purpose::STANDARD
        .decode(encoded)
        .map_err(|e| PlaceholderError::ProviderError(format!("Failed to decode base64 image: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_first_image() {
        let ok = json!({"data": [{"b64_json": general_purpose::STANDARD.encode(b"\x89PNG")}]});
        assert_eq!(decode_first_image(&ok).unwrap(), b"\x89PNG".to_vec());

        let missing = json!({"data": [{"url": "https://example.com/a.png"}]});
        assert!(matches!(
            decode_first_image(&missing),
            Err(PlaceholderError::ProviderError(_))
        ));

        let garbage = json!({"data": [{"b64_json": "not base64!!"}]});
        assert!(decode_first_image(&garbage).is_err());
    }
}
