//! # Scenewright Core
//!
//! Turns a conversational model's reply into a validated [`ChangeSet`]:
//!
//! 1. [`extract`] pulls a JSON payload out of free text, repairing truncation.
//! 2. [`normalize`] folds the payload's dialect onto the canonical model.
//! 3. [`validate`] clamps and defaults every field.
//! 4. [`synthesize_defaults`] gives keyframe-less animations a phase template.
//!
//! Every stage is pure and synchronous. Nothing here fails the caller: bad
//! input yields `None` or a smaller change set.

pub mod dynamic;
pub mod errors;
pub mod extract;
pub mod normalize;
pub mod scene;
pub mod synthesize;
pub mod validate;

pub use dynamic::{expand_dynamic, expand_dynamic_strict};
pub use errors::{ExprError, InterpretError};
pub use extract::extract;
pub use normalize::{normalize, normalize_with_scene, DialectRule, Draft};
pub use scene::SceneIndex;
pub use synthesize::synthesize_defaults;
pub use validate::validate;

pub use scenewright_schema as schema;
use scenewright_schema::ChangeSet;
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Runs normalize, validate and synthesize over an already extracted payload.
pub fn process(raw: &Map<String, Value>, scene: &SceneIndex) -> ChangeSet {
    synthesize_defaults(validate(normalize_with_scene(raw, scene)))
}

/// The whole pipeline. `None` means "no change": leave the scene untouched.
pub fn interpret(text: &str) -> Option<ChangeSet> {
    interpret_with_scene(text, &SceneIndex::default())
}

#[instrument(level = "debug", skip_all, fields(len = text.len(), scene = scene.len()))]
pub fn interpret_with_scene(text: &str, scene: &SceneIndex) -> Option<ChangeSet> {
    let raw = extract(text)?;
    let change_set = process(&raw, scene);
    debug!(
        elements = change_set.elements.len(),
        animations = change_set.animations.len(),
        deletions = change_set.elements_to_delete.len(),
        "interpreted reply"
    );
    Some(change_set)
}

/// Like [`interpret`], but reports why nothing came out.
pub fn interpret_strict(text: &str) -> Result<ChangeSet, InterpretError> {
    let change_set = interpret(text).ok_or(InterpretError::NoPayload)?;
    if change_set.is_empty() {
        return Err(InterpretError::EmptyChangeSet);
    }
    Ok(change_set)
}
