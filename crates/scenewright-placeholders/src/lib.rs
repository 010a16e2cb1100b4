//! # Scenewright Placeholders
//!
//! Resolves the image tokens an AI reply embeds in element sources:
//!
//! - `{{LOGO:league:team}}` and `{{PEXELS:query}}` are static table lookups.
//! - `{{GENERATE:prompt}}` calls an [`ImageGenerator`], uploads the result to
//!   [`ObjectStorage`] and records it in a [`PlaceholderCache`] keyed by the
//!   hash of the normalized prompt, so repeats reuse the stored image.
//!
//! Resolution never fails: anything that goes wrong is logged and the token
//! becomes the configured fallback URL.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

pub mod cache;
pub mod config;
pub mod grammar;
pub mod logos;
pub mod pexels;
pub mod providers;
pub mod resolver;
pub mod storage;
pub mod thumbnail;

pub use cache::MemoryPlaceholderCache;
pub use config::ResolverConfig;
pub use resolver::{PlaceholderResolver, Progress, ProgressSink, ResolveOptions};
pub use storage::{FsObjectStorage, MemoryObjectStorage};

#[derive(Error, Debug)]
pub enum PlaceholderError {
    #[error("API request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),
    #[error("Provider error: {0}")]
    ProviderError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Missing organization identity")]
    MissingIdentity,
    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Cache error: {0}")]
    Cache(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Background task failed: {0}")]
    Task(String),
}

pub type PlaceholderResult<T> = Result<T, PlaceholderError>;

/// Output framing requested from the generator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aspect {
    #[default]
    Landscape,
    Portrait,
    Square,
}

impl Aspect {
    pub fn as_str(self) -> &'static str {
        match self {
            Aspect::Landscape => "landscape",
            Aspect::Portrait => "portrait",
            Aspect::Square => "square",
        }
    }

    /// Pixel size as `(width, height)`.
    pub fn size(self) -> (u32, u32) {
        match self {
            Aspect::Landscape => (1536, 1024),
            Aspect::Portrait => (1024, 1536),
            Aspect::Square => (1024, 1024),
        }
    }

    /// Accepts names (`wide`, `tall`), ratios (`16:9`, `9:16`, `1:1`) and
    /// `WxH` sizes. Anything else is `None`.
    pub fn parse_hint(hint: &str) -> Option<Aspect> {
        let h = hint.trim().to_ascii_lowercase();
        match h.as_str() {
            "landscape" | "wide" | "horizontal" => return Some(Aspect::Landscape),
            "portrait" | "tall" | "vertical" => return Some(Aspect::Portrait),
            "square" => return Some(Aspect::Square),
            _ => {}
        }
        let (w, h) = h.split_once(':').or_else(|| h.split_once('x'))?;
        let w: f64 = w.trim().parse().ok()?;
        let h: f64 = h.trim().parse().ok()?;
        if !(w > 0.0 && h > 0.0) {
            return None;
        }
        Some(if w > h {
            Aspect::Landscape
        } else if h > w {
            Aspect::Portrait
        } else {
            Aspect::Square
        })
    }
}

impl fmt::Display for Aspect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aspect {
    type Err = PlaceholderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Aspect::parse_hint(s).ok_or_else(|| PlaceholderError::ConfigError(format!("unknown aspect '{s}'")))
    }
}

#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub prompt: String,
    pub aspect: Aspect,
    /// Provider-specific configuration (e.g., model ID)
    pub options: serde_json::Value,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, aspect: Aspect) -> Self {
        Self {
            prompt: prompt.into(),
            aspect,
            options: serde_json::json!({}),
        }
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    /// Generates one image and returns its encoded bytes (usually PNG).
    async fn generate(&self, request: GenerationRequest) -> PlaceholderResult<Vec<u8>>;

    /// Returns the provider name (e.g., "openai", "gemini").
    fn name(&self) -> &'static str;
}

#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` under `key` and returns a URL the renderer can load.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> PlaceholderResult<String>;
}

#[async_trait]
pub trait PlaceholderCache: Send + Sync {
    async fn query_by_hash(
        &self,
        organization_id: &str,
        prompt_hash: &str,
    ) -> PlaceholderResult<Option<PlaceholderCacheEntry>>;

    async fn insert(&self, entry: PlaceholderCacheEntry) -> PlaceholderResult<()>;
}

/// One stored generation, scoped to an organization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceholderCacheEntry {
    pub organization_id: String,
    pub user_id: String,
    pub prompt_hash: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub prompt: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Who a resolution pass runs on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrgContext {
    pub organization_id: String,
    pub user_id: String,
}

impl OrgContext {
    pub fn new(organization_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            organization_id: organization_id.into(),
            user_id: user_id.into(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.organization_id.trim().is_empty()
    }
}
