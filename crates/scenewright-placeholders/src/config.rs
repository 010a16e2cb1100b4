use crate::providers::ProviderType;
use crate::Aspect;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

pub const DEFAULT_FALLBACK_IMAGE_URL: &str =
    "https://images.pexels.com/photos/1103970/pexels-photo-1103970.jpeg?auto=compress&cs=tinysrgb&w=1920";

/// Resolver settings. [`ResolverConfig::from_env`] overlays environment
/// variables on the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolverConfig {
    /// Shared URL every failed GENERATE degrades to.
    pub fallback_image_url: String,
    pub generation_timeout: Duration,
    pub thumbnail_timeout: Duration,
    pub thumbnail_max_dim: u32,
    pub default_aspect: Aspect,
    pub provider: ProviderType,
    /// Generator credential. Without one, GENERATE only serves cache hits.
    pub api_key: Option<String>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            fallback_image_url: DEFAULT_FALLBACK_IMAGE_URL.to_string(),
            generation_timeout: Duration::from_secs(60),
            thumbnail_timeout: Duration::from_secs(10),
            thumbnail_max_dim: 320,
            default_aspect: Aspect::Landscape,
            provider: ProviderType::OpenAI,
            api_key: None,
        }
    }
}

impl ResolverConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary source.
    /// Unparseable values keep the default and log a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("SCENEWRIGHT_FALLBACK_IMAGE_URL") {
            config.fallback_image_url = url.trim().to_string();
        }
        if let Some(secs) = setting::<u64>(&get, "SCENEWRIGHT_GENERATION_TIMEOUT_SECS") {
            config.generation_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = setting::<u64>(&get, "SCENEWRIGHT_THUMBNAIL_TIMEOUT_SECS") {
            config.thumbnail_timeout = Duration::from_secs(secs.max(1));
        }
        if let Some(dim) = setting::<u32>(&get, "SCENEWRIGHT_THUMBNAIL_MAX_DIM") {
            config.thumbnail_max_dim = dim.max(1);
        }
        if let Some(aspect) = setting::<Aspect>(&get, "SCENEWRIGHT_DEFAULT_ASPECT") {
            config.default_aspect = aspect;
        }
        if let Some(provider) = setting::<ProviderType>(&get, "SCENEWRIGHT_IMAGE_PROVIDER") {
            config.provider = provider;
        }
        config.api_key = match config.provider {
            ProviderType::OpenAI => get("OPENAI_API_KEY"),
            ProviderType::Gemini => get("GEMINI_API_KEY"),
        };
        config
    }
}

fn setting<T: FromStr>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let value = get(key)?;
    match value.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %value, "ignoring unparseable setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_without_env() {
        assert_eq!(ResolverConfig::from_lookup(lookup(&[])), ResolverConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = ResolverConfig::from_lookup(lookup(&[
            ("SCENEWRIGHT_FALLBACK_IMAGE_URL", "https://cdn.example.com/fallback.png"),
            ("SCENEWRIGHT_GENERATION_TIMEOUT_SECS", "15"),
            ("SCENEWRIGHT_THUMBNAIL_MAX_DIM", "128"),
            ("SCENEWRIGHT_DEFAULT_ASPECT", "9:16"),
            ("SCENEWRIGHT_IMAGE_PROVIDER", "gemini"),
            ("OPENAI_API_KEY", "sk-openai"),
            ("GEMINI_API_KEY", "g-key"),
        ]));
        assert_eq!(config.fallback_image_url, "https://cdn.example.com/fallback.png");
        assert_eq!(config.generation_timeout, Duration::from_secs(15));
        assert_eq!(config.thumbnail_max_dim, 128);
        assert_eq!(config.default_aspect, Aspect::Portrait);
        assert_eq!(config.provider, ProviderType::Gemini);
        assert_eq!(config.api_key.as_deref(), Some("g-key"));
    }

    #[test]
    fn test_bad_values_keep_defaults() {
        let config = ResolverConfig::from_lookup(lookup(&[
            ("SCENEWRIGHT_GENERATION_TIMEOUT_SECS", "soon"),
            ("SCENEWRIGHT_DEFAULT_ASPECT", "cinematic"),
            ("OPENAI_API_KEY", "   "),
        ]));
        assert_eq!(config.generation_timeout, Duration::from_secs(60));
        assert_eq!(config.default_aspect, Aspect::Landscape);
        assert_eq!(config.api_key, None);
    }
}
