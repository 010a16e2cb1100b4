//! The resolution pass: finds every token in a text and replaces it with a URL.

use crate::grammar::{self, GeneratePrompt, Placeholder, PlaceholderKind};
use crate::providers::create_provider;
use crate::{
    logos, pexels, thumbnail, GenerationRequest, ImageGenerator, ObjectStorage, OrgContext,
    PlaceholderCache, PlaceholderCacheEntry, PlaceholderError, PlaceholderResult, ResolverConfig,
};
use chrono::Utc;
use dashmap::DashMap;
use futures::future::join_all;
use image::ImageFormat;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{debug, info, instrument, warn};

/// One step of a GENERATE pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub message: String,
    /// 1-based.
    pub current: usize,
    pub total: usize,
}

pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &Progress);
}

impl<F> ProgressSink for F
where
    F: Fn(&Progress) + Send + Sync,
{
    fn report(&self, progress: &Progress) {
        self(progress)
    }
}

/// How a pass dispatches GENERATE tokens.
///
/// Tokens resolve one at a time by default. `parallel` dispatches all unique
/// prompts at once, and only applies when no progress sink is given.
#[derive(Clone, Copy, Default)]
pub struct ResolveOptions<'a> {
    pub progress: Option<&'a dyn ProgressSink>,
    pub parallel: bool,
}

impl<'a> ResolveOptions<'a> {
    pub fn with_progress(progress: &'a dyn ProgressSink) -> Self {
        Self {
            progress: Some(progress),
            parallel: false,
        }
    }

    pub fn parallel() -> Self {
        Self {
            progress: None,
            parallel: true,
        }
    }
}

struct Job {
    text: usize,
    slot: usize,
    prompt: GeneratePrompt,
    hash: String,
}

type FlightKey = (String, String);

pub struct PlaceholderResolver {
    generator: Option<Arc<dyn ImageGenerator>>,
    storage: Arc<dyn ObjectStorage>,
    cache: Arc<dyn PlaceholderCache>,
    config: ResolverConfig,
    in_flight: DashMap<FlightKey, Arc<Mutex<()>>>,
}

impl PlaceholderResolver {
    /// Builds the configured provider when the config carries a credential.
    pub fn new(
        config: ResolverConfig,
        storage: Arc<dyn ObjectStorage>,
        cache: Arc<dyn PlaceholderCache>,
    ) -> Self {
        let generator: Option<Arc<dyn ImageGenerator>> = config
            .api_key
            .clone()
            .map(|key| Arc::from(create_provider(config.provider, key)));
        Self {
            generator,
            storage,
            cache,
            config,
            in_flight: DashMap::new(),
        }
    }

    pub fn with_generator(mut self, generator: Arc<dyn ImageGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn generator_name(&self) -> Option<&'static str> {
        self.generator.as_ref().map(|g| g.name())
    }

    pub async fn resolve(&self, text: &str, ctx: &OrgContext) -> String {
        self.resolve_with(text, ctx, ResolveOptions::default()).await
    }

    /// Replaces every resolvable token. Unknown logos and unparseable GENERATE
    /// bodies stay as written; GENERATE failures become the fallback URL.
    pub async fn resolve_with(&self, text: &str, ctx: &OrgContext, options: ResolveOptions<'_>) -> String {
        match self.resolve_many(&[text], ctx, options).await.pop() {
            Some(resolved) => resolved,
            None => text.to_string(),
        }
    }

    /// Resolves several texts as one pass, e.g. the string fields of a
    /// structured document. Progress counts across all texts, and a prompt
    /// that appears in more than one text is generated once.
    #[instrument(level = "debug", skip_all, fields(org = %ctx.organization_id, texts = texts.len()))]
    pub async fn resolve_many(&self, texts: &[&str], ctx: &OrgContext, options: ResolveOptions<'_>) -> Vec<String> {
        let scanned: Vec<Vec<Placeholder<'_>>> = texts.iter().map(|text| grammar::scan(text)).collect();

        let mut replacements: Vec<Vec<Option<String>>> = Vec::with_capacity(texts.len());
        let mut jobs = Vec::new();
        for (text, tokens) in scanned.iter().enumerate() {
            let mut row = Vec::with_capacity(tokens.len());
            for (slot, token) in tokens.iter().enumerate() {
                let replacement = match token.kind {
                    PlaceholderKind::Logo => {
                        let url = logos::resolve(token.body);
                        if url.is_none() {
                            debug!(body = token.body, "unknown logo, leaving token");
                        }
                        url
                    }
                    PlaceholderKind::Pexels => Some(pexels::resolve(token.body)),
                    PlaceholderKind::Generate => {
                        if let Some(prompt) = GeneratePrompt::parse(token.body) {
                            let hash = prompt.hash(self.config.default_aspect);
                            jobs.push(Job { text, slot, prompt, hash });
                        }
                        None
                    }
                };
                row.push(replacement);
            }
            replacements.push(row);
        }

        let urls = self.resolve_jobs(&jobs, ctx, options).await;
        for (job, url) in jobs.iter().zip(urls) {
            replacements[job.text][job.slot] = Some(url);
        }
        texts
            .iter()
            .zip(&scanned)
            .zip(&replacements)
            .map(|((text, tokens), row)| splice(text, tokens, row))
            .collect()
    }

    /// One URL per job, in job order.
    async fn resolve_jobs(&self, jobs: &[Job], ctx: &OrgContext, options: ResolveOptions<'_>) -> Vec<String> {
        if jobs.is_empty() {
            return Vec::new();
        }

        if options.parallel && options.progress.is_none() {
            let mut seen = HashSet::new();
            let unique: Vec<&Job> = jobs.iter().filter(|j| seen.insert(j.hash.as_str())).collect();
            let urls = join_all(unique.iter().map(|job| self.generate_url(ctx, job))).await;
            let by_hash: HashMap<&str, String> = unique.iter().map(|j| j.hash.as_str()).zip(urls).collect();
            return jobs
                .iter()
                .map(|j| {
                    by_hash
                        .get(j.hash.as_str())
                        .cloned()
                        .unwrap_or_else(|| self.config.fallback_image_url.clone())
                })
                .collect();
        }

        let total = jobs.len();
        let mut memo: HashMap<&str, String> = HashMap::new();
        let mut urls = Vec::with_capacity(total);
        for (n, job) in jobs.iter().enumerate() {
            if let Some(sink) = options.progress {
                sink.report(&Progress {
                    message: format!("Generating image {}/{}: {}", n + 1, total, job.prompt.prompt),
                    current: n + 1,
                    total,
                });
            }
            let url = match memo.get(job.hash.as_str()) {
                Some(url) => url.clone(),
                None => {
                    let url = self.generate_url(ctx, job).await;
                    memo.insert(job.hash.as_str(), url.clone());
                    url
                }
            };
            urls.push(url);
        }
        urls
    }

    async fn generate_url(&self, ctx: &OrgContext, job: &Job) -> String {
        match self.try_generate(ctx, job).await {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, prompt = %job.prompt.prompt, "image generation failed, using fallback");
                self.config.fallback_image_url.clone()
            }
        }
    }

    /// Cache, then single-flight generation keyed by `(org, hash)`.
    async fn try_generate(&self, ctx: &OrgContext, job: &Job) -> PlaceholderResult<String> {
        if ctx.is_anonymous() {
            return Err(PlaceholderError::MissingIdentity);
        }
        let org = ctx.organization_id.trim();

        if let Some(hit) = self.cache.query_by_hash(org, &job.hash).await? {
            debug!(hash = %job.hash, "placeholder cache hit");
            return Ok(hit.url);
        }

        let flight = Flight::join(&self.in_flight, (org.to_string(), job.hash.clone()));
        let _guard = flight.lock().await;
        // Whoever held the lock before us may have filled the cache.
        match self.cache.query_by_hash(org, &job.hash).await? {
            Some(hit) => Ok(hit.url),
            None => self.generate_and_store(ctx, org, job).await,
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.len()
    }

    async fn generate_and_store(&self, ctx: &OrgContext, org: &str, job: &Job) -> PlaceholderResult<String> {
        let generator = self
            .generator
            .as_ref()
            .ok_or_else(|| PlaceholderError::ConfigError("no image generator configured".to_string()))?;

        let aspect = job.prompt.effective_aspect(self.config.default_aspect);
        let request = GenerationRequest::new(job.prompt.prompt.clone(), aspect);
        let limit = self.config.generation_timeout;
        let bytes = tokio::time::timeout(limit, generator.generate(request))
            .await
            .map_err(|_| PlaceholderError::Timeout {
                stage: "generation",
                after: limit,
            })??;
        info!(provider = generator.name(), bytes = bytes.len(), aspect = %aspect, "generated image");

        let (ext, content_type) = sniff(&bytes);
        let image_key = format!("{org}/{}.{ext}", job.hash);
        let (stored, thumb) = tokio::join!(
            self.storage.put(&image_key, bytes.clone(), content_type),
            thumbnail::derive(bytes, self.config.thumbnail_max_dim, self.config.thumbnail_timeout),
        );
        let url = stored?;

        let thumbnail_url = match thumb {
            Ok(thumb) => {
                let thumb_key = format!("{org}/thumbnails/{}.png", job.hash);
                match self.storage.put(&thumb_key, thumb, "image/png").await {
                    Ok(url) => Some(url),
                    Err(e) => {
                        warn!(error = %e, "thumbnail upload failed");
                        None
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "thumbnail derivation failed");
                None
            }
        };

        let entry = PlaceholderCacheEntry {
            organization_id: org.to_string(),
            user_id: ctx.user_id.clone(),
            prompt_hash: job.hash.clone(),
            url: url.clone(),
            thumbnail_url,
            prompt: job.prompt.prompt.clone(),
            tags: vec!["generated".to_string(), aspect.as_str().to_string()],
            created_at: Utc::now(),
        };
        if let Err(e) = self.cache.insert(entry).await {
            warn!(error = %e, "failed to record placeholder cache row");
        }
        Ok(url)
    }
}

/// A caller's share of one single-flight lock. Dropping it, including when
/// the owning future is cancelled, removes the map entry once no one else
/// holds the lock.
struct Flight<'a> {
    map: &'a DashMap<FlightKey, Arc<Mutex<()>>>,
    key: FlightKey,
    lock: Arc<Mutex<()>>,
}

impl<'a> Flight<'a> {
    fn join(map: &'a DashMap<FlightKey, Arc<Mutex<()>>>, key: FlightKey) -> Self {
        let lock = map.entry(key.clone()).or_default().clone();
        Self { map, key, lock }
    }

    async fn lock(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().await
    }
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        // The map's handle plus ours: nobody else is waiting.
        self.map.remove_if(&self.key, |_, f| Arc::strong_count(f) <= 2);
    }
}

/// File extension and MIME type of encoded image bytes. Unknown is PNG.
fn sniff(bytes: &[u8]) -> (&'static str, &'static str) {
    match image::guess_format(bytes) {
        Ok(ImageFormat::Jpeg) => ("jpg", "image/jpeg"),
        Ok(ImageFormat::WebP) => ("webp", "image/webp"),
        _ => ("png", "image/png"),
    }
}

fn splice(text: &str, tokens: &[Placeholder<'_>], replacements: &[Option<String>]) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (token, replacement) in tokens.iter().zip(replacements) {
        if let Some(url) = replacement {
            out.push_str(&text[last..token.range.start]);
            out.push_str(url);
            last = token.range.end;
        }
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryObjectStorage, MemoryPlaceholderCache};
    use std::sync::Mutex as StdMutex;

    fn resolver() -> PlaceholderResolver {
        PlaceholderResolver::new(
            ResolverConfig::default(),
            Arc::new(MemoryObjectStorage::default()),
            Arc::new(MemoryPlaceholderCache::new()),
        )
    }

    #[test]
    fn test_splice_keeps_unresolved_tokens() {
        let text = "a {{LOGO:x}} b {{PEXELS:y}} c";
        let tokens = grammar::scan(text);
        let out = splice(text, &tokens, &[None, Some("URL".to_string())]);
        assert_eq!(out, "a {{LOGO:x}} b URL c");
    }

    #[test]
    fn test_sniff() {
        assert_eq!(sniff(b"\x89PNG\r\n\x1a\n0000"), ("png", "image/png"));
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0, 0]), ("jpg", "image/jpeg"));
        assert_eq!(sniff(b"??"), ("png", "image/png"));
    }

    #[test]
    fn test_no_credential_means_no_generator() {
        assert_eq!(resolver().generator_name(), None);
        let with_key = PlaceholderResolver::new(
            ResolverConfig {
                api_key: Some("sk-test".into()),
                ..Default::default()
            },
            Arc::new(MemoryObjectStorage::default()),
            Arc::new(MemoryPlaceholderCache::new()),
        );
        assert_eq!(with_key.generator_name(), Some("openai"));
    }

    #[tokio::test]
    async fn test_static_tokens_and_closure_progress() {
        let seen = StdMutex::new(Vec::new());
        let sink = |p: &Progress| seen.lock().unwrap().push(p.current);
        let out = resolver()
            .resolve_with(
                "{{LOGO:NFL:Chiefs}} {{LOGO:NFL:Nowhere}} {{PEXELS:stadium}}",
                &OrgContext::new("org", "user"),
                ResolveOptions::with_progress(&sink),
            )
            .await;
        assert_eq!(
            out,
            "https://a.espncdn.com/i/teamlogos/nfl/500/kc.png {{LOGO:NFL:Nowhere}} \
             https://images.pexels.com/photos/270085/pexels-photo-270085.jpeg?auto=compress&cs=tinysrgb&w=1920"
        );
        assert!(seen.lock().unwrap().is_empty());
    }

    struct Stalled;

    #[async_trait::async_trait]
    impl ImageGenerator for Stalled {
        async fn generate(&self, _request: GenerationRequest) -> PlaceholderResult<Vec<u8>> {
            std::future::pending().await
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    #[tokio::test]
    async fn test_cancelled_pass_releases_flight_entry() {
        let r = resolver().with_generator(Arc::new(Stalled));
        let ctx = OrgContext::new("org", "user");
        let pass = r.resolve("{{GENERATE:never finishes}}", &ctx);
        let cancelled = tokio::time::timeout(std::time::Duration::from_millis(20), pass).await;
        assert!(cancelled.is_err());
        assert_eq!(r.in_flight_len(), 0);
    }

    #[tokio::test]
    async fn test_resolve_many_shares_one_pass() {
        let seen = StdMutex::new(Vec::new());
        let sink = |p: &Progress| seen.lock().unwrap().push((p.current, p.total));
        let r = resolver();
        let out = r
            .resolve_many(
                &["{{GENERATE:a}}", "plain", "{{LOGO:NFL:Chiefs}} {{GENERATE:b}}"],
                &OrgContext::new("org", "user"),
                ResolveOptions::with_progress(&sink),
            )
            .await;
        let fallback = r.config().fallback_image_url.clone();
        assert_eq!(out[0], fallback);
        assert_eq!(out[1], "plain");
        assert_eq!(out[2], format!("https://a.espncdn.com/i/teamlogos/nfl/500/kc.png {fallback}"));
        assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[tokio::test]
    async fn test_generate_without_generator_falls_back() {
        let r = resolver();
        let out = r
            .resolve("{{GENERATE:a stadium}}", &OrgContext::new("org", "user"))
            .await;
        assert_eq!(out, r.config().fallback_image_url);
    }
}
