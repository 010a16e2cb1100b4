//! Resolution passes against in-test generator, storage and cache fakes.

use async_trait::async_trait;
use image::{ImageBuffer, ImageFormat, Rgba};
use pretty_assertions::assert_eq;
use scenewright_placeholders::{
    Aspect, FsObjectStorage, GenerationRequest, ImageGenerator, MemoryObjectStorage,
    MemoryPlaceholderCache, ObjectStorage, OrgContext, PlaceholderCache, PlaceholderError,
    PlaceholderResolver, PlaceholderResult, Progress, ResolveOptions, ResolverConfig,
};
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

const FALLBACK: &str = "https://cdn.example.com/fallback.png";

fn png(width: u32, height: u32) -> Vec<u8> {
    let img = ImageBuffer::from_pixel(width, height, Rgba([20u8, 120, 220, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).unwrap();
    out.into_inner()
}

struct FakeGenerator {
    calls: AtomicUsize,
    delay: Duration,
    output: Vec<u8>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl FakeGenerator {
    fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            output: png(640, 360),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageGenerator for FakeGenerator {
    async fn generate(&self, request: GenerationRequest) -> PlaceholderResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(self.output.clone())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FailingGenerator;

#[async_trait]
impl ImageGenerator for FailingGenerator {
    async fn generate(&self, _request: GenerationRequest) -> PlaceholderResult<Vec<u8>> {
        Err(PlaceholderError::ProviderError("quota exceeded".to_string()))
    }

    fn name(&self) -> &'static str {
        "failing"
    }
}

struct FailingStorage;

#[async_trait]
impl ObjectStorage for FailingStorage {
    async fn put(&self, key: &str, _bytes: Vec<u8>, _content_type: &str) -> PlaceholderResult<String> {
        Err(PlaceholderError::Storage(format!("bucket unavailable for {key}")))
    }
}

struct Harness {
    generator: Arc<FakeGenerator>,
    storage: Arc<MemoryObjectStorage>,
    cache: Arc<MemoryPlaceholderCache>,
    resolver: PlaceholderResolver,
}

fn config() -> ResolverConfig {
    ResolverConfig {
        fallback_image_url: FALLBACK.to_string(),
        thumbnail_max_dim: 64,
        ..Default::default()
    }
}

fn harness_with(generator: FakeGenerator) -> Harness {
    let generator = Arc::new(generator);
    let storage = Arc::new(MemoryObjectStorage::new("https://cdn.example.com"));
    let cache = Arc::new(MemoryPlaceholderCache::new());
    let resolver = PlaceholderResolver::new(config(), storage.clone(), cache.clone())
        .with_generator(generator.clone());
    Harness {
        generator,
        storage,
        cache,
        resolver,
    }
}

fn harness() -> Harness {
    harness_with(FakeGenerator::new())
}

fn org() -> OrgContext {
    OrgContext::new("org-1", "user-1")
}

#[tokio::test]
async fn identical_prompts_resolve_to_one_url() {
    let h = harness();
    let text = r#"{"a":"{{GENERATE:"Sunset over a stadium"}}","b":"{{GENERATE:sunset   OVER a stadium}}"}"#;
    let out = h.resolver.resolve(text, &org()).await;

    assert_eq!(h.generator.calls(), 1);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    let a = value["a"].as_str().unwrap();
    assert_eq!(a, value["b"].as_str().unwrap());
    assert!(a.starts_with("https://cdn.example.com/org-1/"));
    assert!(a.ends_with(".png"));

    // Image plus thumbnail.
    assert_eq!(h.storage.len(), 2);
    assert_eq!(h.cache.len(), 1);
}

#[tokio::test]
async fn repeat_pass_is_a_cache_hit_scoped_to_the_org() {
    let h = harness();
    let first = h.resolver.resolve("{{GENERATE:a neon skyline}}", &org()).await;
    let second = h.resolver.resolve("{{GENERATE:\"A Neon Skyline\"}}", &org()).await;
    assert_eq!(first, second);
    assert_eq!(h.generator.calls(), 1);

    let other = h
        .resolver
        .resolve("{{GENERATE:a neon skyline}}", &OrgContext::new("org-2", "user-9"))
        .await;
    assert_eq!(h.generator.calls(), 2);
    assert!(other.contains("/org-2/"));
}

#[tokio::test]
async fn cache_row_records_the_generation() {
    let h = harness();
    let url = h.resolver.resolve("{{GENERATE:a stadium|9:16}}", &org()).await;

    let requests = h.generator.requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].prompt, "a stadium");
    assert_eq!(requests[0].aspect, Aspect::Portrait);

    let hash = scenewright_placeholders::grammar::GeneratePrompt::parse("a stadium|9:16")
        .unwrap()
        .hash(Aspect::Landscape);
    let row = h.cache.query_by_hash("org-1", &hash).await.unwrap().unwrap();
    assert_eq!(row.url, url);
    assert_eq!(row.user_id, "user-1");
    assert_eq!(row.tags, vec!["generated", "portrait"]);

    let thumb_url = row.thumbnail_url.unwrap();
    let key = thumb_url.trim_start_matches("https://cdn.example.com/");
    let thumb = h.storage.get(key).unwrap();
    assert_eq!(thumb.content_type, "image/png");
    let decoded = image::load_from_memory(&thumb.bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (64, 36));
}

#[tokio::test]
async fn progress_is_reported_per_occurrence() {
    let h = harness();
    let seen: Mutex<Vec<Progress>> = Mutex::new(Vec::new());
    let sink = |p: &Progress| seen.lock().unwrap().push(p.clone());
    let text = "{{GENERATE:one}} {{GENERATE:two}} {{GENERATE:ONE}} {{LOGO:NBA:Lakers}}";

    let out = h
        .resolver
        .resolve_with(text, &org(), ResolveOptions::with_progress(&sink))
        .await;

    let seen = seen.into_inner().unwrap();
    let steps: Vec<(usize, usize)> = seen.iter().map(|p| (p.current, p.total)).collect();
    assert_eq!(steps, vec![(1, 3), (2, 3), (3, 3)]);
    assert!(seen[1].message.contains("two"));
    assert_eq!(h.generator.calls(), 2);

    let parts: Vec<&str> = out.split(' ').collect();
    assert_eq!(parts[0], parts[2]);
    assert_ne!(parts[0], parts[1]);
    assert_eq!(parts[3], "https://a.espncdn.com/i/teamlogos/nba/500/lal.png");
}

#[tokio::test]
async fn parallel_dispatch_generates_each_prompt_once() {
    let h = harness_with(FakeGenerator::slow(Duration::from_millis(20)));
    let text = "{{GENERATE:red}} {{GENERATE:green}} {{GENERATE:blue}} {{GENERATE:Red}}";
    let out = h
        .resolver
        .resolve_with(text, &org(), ResolveOptions::parallel())
        .await;

    assert_eq!(h.generator.calls(), 3);
    let parts: Vec<&str> = out.split(' ').collect();
    assert_eq!(parts.len(), 4);
    assert_eq!(parts[0], parts[3]);
    assert!(parts.iter().all(|p| p.starts_with("https://cdn.example.com/org-1/")));
}

#[tokio::test]
async fn concurrent_passes_share_one_generation() {
    let h = harness_with(FakeGenerator::slow(Duration::from_millis(50)));
    let ctx = org();
    let (a, b) = tokio::join!(
        h.resolver.resolve("{{GENERATE:a packed stadium}}", &ctx),
        h.resolver.resolve("{{GENERATE:A packed  stadium}}", &ctx),
    );
    assert_eq!(a, b);
    assert_eq!(h.generator.calls(), 1);
    assert_eq!(h.cache.len(), 1);
}

#[tokio::test]
async fn failures_degrade_to_the_fallback() {
    let cache = Arc::new(MemoryPlaceholderCache::new());
    let failing = PlaceholderResolver::new(config(), Arc::new(MemoryObjectStorage::default()), cache.clone())
        .with_generator(Arc::new(FailingGenerator));
    assert_eq!(failing.resolve("{{GENERATE:x-ray}}", &org()).await, FALLBACK);

    let mut short = config();
    short.generation_timeout = Duration::from_millis(20);
    let timing_out = PlaceholderResolver::new(short, Arc::new(MemoryObjectStorage::default()), cache.clone())
        .with_generator(Arc::new(FakeGenerator::slow(Duration::from_secs(5))));
    assert_eq!(timing_out.resolve("bg: {{GENERATE:slow}}", &org()).await, format!("bg: {FALLBACK}"));

    let no_storage = PlaceholderResolver::new(config(), Arc::new(FailingStorage), cache.clone())
        .with_generator(Arc::new(FakeGenerator::new()));
    assert_eq!(no_storage.resolve("{{GENERATE:upload}}", &org()).await, FALLBACK);

    assert!(cache.is_empty());
}

#[tokio::test]
async fn missing_identity_skips_generation() {
    let h = harness();
    let out = h.resolver.resolve("{{GENERATE:a stadium}}", &OrgContext::new("", "user-1")).await;
    assert_eq!(out, FALLBACK);
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn thumbnail_failure_does_not_block_the_image() {
    let generator = FakeGenerator {
        output: b"definitely not an image".to_vec(),
        ..FakeGenerator::new()
    };
    let h = harness_with(generator);
    let url = h.resolver.resolve("{{GENERATE:glitch art}}", &org()).await;

    assert_ne!(url, FALLBACK);
    assert_eq!(h.storage.len(), 1);
    assert_eq!(h.cache.len(), 1);
}

#[tokio::test]
async fn logo_tokens_resolve_or_stay() {
    let h = harness();
    let out = h
        .resolver
        .resolve("{{LOGO:NFL:Chiefs}}|{{LOGO:NFL:Springfield Atoms}}|{{PEXELS:}}", &org())
        .await;
    assert_eq!(
        out,
        "https://a.espncdn.com/i/teamlogos/nfl/500/kc.png|{{LOGO:NFL:Springfield Atoms}}|{{PEXELS:}}"
    );
    assert_eq!(h.generator.calls(), 0);
}

#[tokio::test]
async fn filesystem_storage_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = PlaceholderResolver::new(
        config(),
        Arc::new(FsObjectStorage::new(dir.path())),
        Arc::new(MemoryPlaceholderCache::new()),
    )
    .with_generator(Arc::new(FakeGenerator::new()));

    let url = resolver.resolve("{{GENERATE:a quiet harbour}}", &org()).await;
    let path = url.strip_prefix("file://").unwrap();
    let bytes = std::fs::read(path).unwrap();
    assert_eq!(image::load_from_memory(&bytes).unwrap().width(), 640);
    assert!(dir.path().join("org-1/thumbnails").is_dir());
}
