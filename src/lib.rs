//! # Scenewright
//!
//! Interprets a conversational model's reply into a validated broadcast
//! graphics [`ChangeSet`] and resolves the image placeholders it carries.
//!
//! [`Interpreter`] ties both paths together for one AI turn:
//!
//! ```ignore
//! let interpreter = Interpreter::new().with_resolver(resolver);
//! if let Some(change_set) = interpreter.turn(&reply, &ctx).await {
//!     renderer.apply(change_set);
//! }
//! ```

use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub use scenewright_core::{
    expand_dynamic, expand_dynamic_strict, extract, interpret, interpret_strict, normalize,
    normalize_with_scene, process, synthesize_defaults, validate, ExprError, InterpretError,
    SceneIndex,
};
pub use scenewright_placeholders::{
    FsObjectStorage, ImageGenerator, MemoryObjectStorage, MemoryPlaceholderCache, ObjectStorage,
    OrgContext, PlaceholderCache, PlaceholderResolver, Progress, ProgressSink, ResolveOptions,
    ResolverConfig,
};
pub use scenewright_schema::*;

pub use scenewright_placeholders as placeholders;
pub use scenewright_schema as schema;

/// One AI turn: interpretation against the live scene, plus optional
/// placeholder resolution.
#[derive(Default, Clone)]
pub struct Interpreter {
    scene: SceneIndex,
    resolver: Option<Arc<PlaceholderResolver>>,
}

impl Interpreter {
    pub fn new() -> Self {
        Self::default()
    }

    /// The renderer's element table, used to resolve animation targets that
    /// the reply does not define itself.
    pub fn with_scene(mut self, scene: SceneIndex) -> Self {
        self.scene = scene;
        self
    }

    pub fn with_resolver(mut self, resolver: impl Into<Arc<PlaceholderResolver>>) -> Self {
        self.resolver = Some(resolver.into());
        self
    }

    pub fn scene(&self) -> &SceneIndex {
        &self.scene
    }

    pub fn resolver(&self) -> Option<&PlaceholderResolver> {
        self.resolver.as_deref()
    }

    /// `None` means the reply carried no payload; leave the scene untouched.
    pub fn interpret(&self, text: &str) -> Option<ChangeSet> {
        scenewright_core::interpret_with_scene(text, &self.scene)
    }

    /// Renders the dynamic block, appending its elements and animations.
    /// The returned change set no longer carries the block.
    pub fn expand(&self, change_set: &ChangeSet) -> ChangeSet {
        let mut expanded = change_set.clone();
        if let Some(block) = expanded.dynamic_elements.take() {
            let (elements, animations) = expand_dynamic(&block);
            debug!(elements = elements.len(), animations = animations.len(), "expanded dynamic block");
            expanded.elements.extend(elements);
            expanded.animations.extend(animations);
        }
        expanded
    }

    /// Resolves placeholders in free text. Without a resolver the text is
    /// returned as is.
    pub async fn resolve_text(&self, text: &str, ctx: &OrgContext, options: ResolveOptions<'_>) -> String {
        match &self.resolver {
            Some(resolver) => resolver.resolve_with(text, ctx, options).await,
            None => text.to_string(),
        }
    }

    /// Resolves placeholders in every string of a change set, as one pass.
    #[instrument(level = "debug", skip_all, fields(org = %ctx.organization_id))]
    pub async fn resolve_change_set(
        &self,
        change_set: ChangeSet,
        ctx: &OrgContext,
        options: ResolveOptions<'_>,
    ) -> ChangeSet {
        let Some(resolver) = &self.resolver else {
            return change_set;
        };
        let mut tree = match serde_json::to_value(&change_set) {
            Ok(tree) => tree,
            Err(e) => {
                warn!(error = %e, "could not serialize change set for resolution");
                return change_set;
            }
        };

        let mut texts = Vec::new();
        visit_strings(&mut tree, &mut |s| {
            if s.contains("{{") {
                texts.push(s.clone());
            }
        });
        if texts.is_empty() {
            return change_set;
        }

        let borrowed: Vec<&str> = texts.iter().map(String::as_str).collect();
        let mut resolved = resolver.resolve_many(&borrowed, ctx, options).await.into_iter();
        visit_strings(&mut tree, &mut |s| {
            if s.contains("{{") {
                if let Some(next) = resolved.next() {
                    *s = next;
                }
            }
        });

        match serde_json::from_value(tree) {
            Ok(change_set) => change_set,
            Err(e) => {
                warn!(error = %e, "resolved change set did not deserialize, keeping placeholders");
                change_set
            }
        }
    }

    /// Interprets a reply and resolves its placeholders sequentially.
    pub async fn turn(&self, text: &str, ctx: &OrgContext) -> Option<ChangeSet> {
        let change_set = self.interpret(text)?;
        Some(
            self.resolve_change_set(change_set, ctx, ResolveOptions::default())
                .await,
        )
    }
}

/// Every string value in document order. Object keys are left alone.
fn visit_strings(value: &mut serde_json::Value, f: &mut impl FnMut(&mut String)) {
    match value {
        serde_json::Value::String(s) => f(s),
        serde_json::Value::Array(items) => items.iter_mut().for_each(|v| visit_strings(v, f)),
        serde_json::Value::Object(map) => map.values_mut().for_each(|v| visit_strings(v, f)),
        _ => {}
    }
}
