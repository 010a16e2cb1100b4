pub mod gemini;
pub mod openai;

use crate::{ImageGenerator, PlaceholderError};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ProviderType {
    #[default]
    OpenAI,
    Gemini,
}

impl FromStr for ProviderType {
    type Err = PlaceholderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderType::OpenAI),
            "gemini" | "google" => Ok(ProviderType::Gemini),
            other => Err(PlaceholderError::ConfigError(format!(
                "unknown image provider '{other}'"
            ))),
        }
    }
}

pub fn create_provider(provider_type: ProviderType, api_key: String) -> Box<dyn ImageGenerator> {
    match provider_type {
        ProviderType::OpenAI => Box::new(openai::OpenAiImageGenerator::new(api_key)),
        ProviderType::Gemini => Box::new(gemini::GeminiImageGenerator::new(api_key)),
    }
}
