use crate::{Aspect, GenerationRequest, ImageGenerator, PlaceholderError, PlaceholderResult};
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde_json::json;

pub struct GeminiImageGenerator {
    api_key: String,
    client: reqwest::Client,
}

impl GeminiImageGenerator {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            client: reqwest::Client::new(),
        }
    }
}

fn aspect_ratio(aspect: Aspect) -> &'static str {
    match aspect {
        Aspect::Landscape => "3:2",
        Aspect::Portrait => "2:3",
        Aspect::Square => "1:1",
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageGenerator {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn generate(&self, request: GenerationRequest) -> PlaceholderResult<Vec<u8>> {
        let model = request
            .options
            .get("model")
            .and_then(|v| v.as_str())
            .unwrap_or("gemini-2.5-flash-image");

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            model, self.api_key
        );

        let body = json!({
            "contents": [{
                "parts": [{
                    "text": request.prompt
                }]
            }],
            "generationConfig": {
                "responseModalities": ["IMAGE"],
                "imageConfig": {
                    "aspectRatio": aspect_ratio(request.aspect)
                }
            }
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(PlaceholderError::ProviderError(format!(
                "Gemini API error: {}",
                error_text
            )));
        }

        let response_json: serde_json::Value = response.json().await?;
        decode_inline_image(&response_json)
    }
}

/// The first `inlineData` part of `candidates[0]`. Text parts are skipped.
fn decode_inline_image(response: &serde_json::Value) -> PlaceholderResult<Vec<u8>> {
    let encoded = response
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array())
        .and_then(|parts| {
            parts
                .iter()
                .find_map(|p| p.get("inlineData").and_then(|d| d.get("data")))
        })
        .and_then(|v| v.as_str());

    if let Some(base64_string) = encoded {
        general_purpose::STANDARD
            .decode(base64_string)
            .map_err(|e| PlaceholderError::ProviderError(format!("Failed to decode base64 image: {}", e)))
    } else {
        Err(PlaceholderError::ProviderError(
            "No image data found in Gemini response".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_skips_text_parts() {
        let response = json!({
            "candidates": [{
                "content": {
                    "parts": [
                        {"text": "Here is your image"},
                        {"inlineData": {"mimeType": "image/png", "data": general_purpose::STANDARD.encode(b"img")}}
                    ]
                }
            }]
        });
        assert_eq!(decode_inline_image(&response).unwrap(), b"img".to_vec());
        assert!(decode_inline_image(&json!({"candidates": []})).is_err());
    }
}
