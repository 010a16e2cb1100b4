//! A full AI turn: interpretation against a live scene, then placeholder
//! resolution over the resulting change set.

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use scenewright::placeholders::{GenerationRequest, PlaceholderResult};
use scenewright::{
    ElementContent, ImageGenerator, Interpreter, MemoryObjectStorage, MemoryPlaceholderCache,
    OrgContext, Phase, PlaceholderResolver, Progress, ResolveOptions, ResolverConfig, SceneIndex,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const REPLY: &str = r#"Here's a halftime board for the game.

```json
{
  "action": "create",
  "layer_type": "fullscreen",
  "elements": [
    {"name": "Backdrop", "element_type": "image", "width": 1920, "height": 1080,
     "content": {"src": "{{GENERATE:\"A packed stadium at dusk\"}}"}},
    {"name": "Inset", "element_type": "image", "position_x": 1400, "position_y": 60,
     "content": {"src": "{{GENERATE:a packed   STADIUM at dusk}}"}},
    {"name": "Home Logo", "element_type": "image", "position_x": 200, "position_y": 400,
     "content": {"src": "{{LOGO:NFL:Chiefs}}"}},
    {"name": "Away Logo", "element_type": "image", "position_x": 1500, "position_y": 400,
     "content": {"src": "{{LOGO:NFL:Gotham Rogues}}"}}
  ],
  "animations": [
    {"element_name": "Backdrop", "phase": "in", "duration": "1.2s"},
    {"element_name": "Scorebug", "phase": "loop"}
  ]
}
```"#;

struct CountingGenerator(AtomicUsize);

#[async_trait]
impl ImageGenerator for CountingGenerator {
    async fn generate(&self, _request: GenerationRequest) -> PlaceholderResult<Vec<u8>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(b"\x89PNG\r\n\x1a\nnot really".to_vec())
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}

fn src(cs: &scenewright::ChangeSet, name: &str) -> String {
    match &cs.find_element(name).unwrap().content {
        ElementContent::Image(img) => img.src.clone(),
        other => panic!("expected image, got {other:?}"),
    }
}

fn interpreter(generator: Arc<CountingGenerator>) -> Interpreter {
    let resolver = PlaceholderResolver::new(
        ResolverConfig::default(),
        Arc::new(MemoryObjectStorage::new("https://cdn.example.com")),
        Arc::new(MemoryPlaceholderCache::new()),
    )
    .with_generator(generator);
    Interpreter::new()
        .with_scene(SceneIndex::from_pairs([(Some("sb-1"), "Scorebug")]))
        .with_resolver(resolver)
}

#[tokio::test]
async fn turn_interprets_and_resolves() {
    let generator = Arc::new(CountingGenerator(AtomicUsize::new(0)));
    let interpreter = interpreter(generator.clone());

    let cs = interpreter
        .turn(REPLY, &OrgContext::new("org-1", "user-1"))
        .await
        .unwrap();

    assert_eq!(generator.0.load(Ordering::SeqCst), 1);
    let backdrop = src(&cs, "Backdrop");
    assert!(backdrop.starts_with("https://cdn.example.com/org-1/"));
    assert_eq!(backdrop, src(&cs, "Inset"));
    assert_eq!(src(&cs, "Home Logo"), "https://a.espncdn.com/i/teamlogos/nfl/500/kc.png");
    assert_eq!(src(&cs, "Away Logo"), "{{LOGO:NFL:Gotham Rogues}}");

    // The scorebug lives in the renderer's scene, not in this reply.
    assert_eq!(cs.animations.len(), 2);
    let scorebug = &cs.animations[1];
    assert_eq!(scorebug.element_id.as_deref(), Some("sb-1"));
    assert_eq!(scorebug.phase, Phase::Loop);
    assert_eq!(scorebug.iterations, -1);
    assert_eq!(cs.animations[0].duration, 1200.0);
}

#[tokio::test]
async fn anonymous_turn_falls_back_without_generating() {
    let generator = Arc::new(CountingGenerator(AtomicUsize::new(0)));
    let interpreter = interpreter(generator.clone());
    let progress: Mutex<Vec<Progress>> = Mutex::new(Vec::new());
    let sink = |p: &Progress| progress.lock().unwrap().push(p.clone());

    let cs = interpreter.interpret(REPLY).unwrap();
    let cs = interpreter
        .resolve_change_set(cs, &OrgContext::default(), ResolveOptions::with_progress(&sink))
        .await;

    let fallback = interpreter.resolver().unwrap().config().fallback_image_url.clone();
    assert_eq!(src(&cs, "Backdrop"), fallback);
    assert_eq!(src(&cs, "Inset"), fallback);
    assert_eq!(generator.0.load(Ordering::SeqCst), 0);
    assert_eq!(progress.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn no_payload_means_no_change() {
    let interpreter = Interpreter::new();
    let ctx = OrgContext::new("org-1", "user-1");
    assert!(interpreter.turn("Sure! What would you like on screen?", &ctx).await.is_none());

    // Without a resolver, placeholders are left for a later pass.
    let cs = interpreter.turn(REPLY, &ctx).await.unwrap();
    assert_eq!(src(&cs, "Home Logo"), "{{LOGO:NFL:Chiefs}}");
    // No scene, so the scorebug animation has nothing to target.
    assert_eq!(cs.animations.len(), 1);
}

const NEON_REPLY: &str = r#"{"elements": [
  {"name": "Sign", "element_type": "image", "content": {"src": "{{GENERATE:neon\tsign}}"}},
  {"name": "Caption", "element_type": "text", "content": {"text": "Say \"hi\" to {{GENERATE:neon sign}}"}}
]}"#;

fn text_of(cs: &scenewright::ChangeSet, name: &str) -> String {
    match &cs.find_element(name).unwrap().content {
        ElementContent::Text(t) => t.text.clone(),
        other => panic!("expected text, got {other:?}"),
    }
}

#[tokio::test]
async fn change_set_and_text_share_the_prompt_cache() {
    let generator = Arc::new(CountingGenerator(AtomicUsize::new(0)));
    let interpreter = interpreter(generator.clone());
    let ctx = OrgContext::new("org-1", "user-1");

    let from_text = interpreter
        .resolve_text("{{GENERATE:neon\tsign}}", &ctx, ResolveOptions::default())
        .await;
    let cs = interpreter.turn(NEON_REPLY, &ctx).await.unwrap();

    assert_eq!(generator.0.load(Ordering::SeqCst), 1);
    assert_eq!(src(&cs, "Sign"), from_text);
    assert_eq!(text_of(&cs, "Caption"), format!("Say \"hi\" to {from_text}"));
}

#[tokio::test]
async fn urls_needing_json_escapes_survive_resolution() {
    let generator = Arc::new(CountingGenerator(AtomicUsize::new(0)));
    let resolver = PlaceholderResolver::new(
        ResolverConfig::default(),
        Arc::new(MemoryObjectStorage::new(r#"C:\cdn\"quoted""#)),
        Arc::new(MemoryPlaceholderCache::new()),
    )
    .with_generator(generator.clone());
    let interpreter = Interpreter::new().with_resolver(resolver);

    let cs = interpreter
        .turn(NEON_REPLY, &OrgContext::new("org-1", "user-1"))
        .await
        .unwrap();

    assert_eq!(generator.0.load(Ordering::SeqCst), 1);
    let url = src(&cs, "Sign");
    assert!(url.starts_with(r#"C:\cdn\"quoted"/org-1/"#), "{url}");
    assert!(text_of(&cs, "Caption").ends_with(&url));
}
