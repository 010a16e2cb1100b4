//! Dialect normalization.
//!
//! The payload is parsed once into a `serde_json` tree. An ordered list of
//! [`DialectRule`]s then folds whatever shape the model used into a [`Draft`],
//! and the draft is built into the canonical [`ChangeSet`]. A serialized
//! `ChangeSet` is just one more shape the rules understand, so normalizing
//! canonical output is a no-op.

mod animation;
mod coerce;
mod element;
pub mod rules;

pub use rules::{ActionRule, AnimationsRule, BlueprintRule, DynamicRule, ElementsRule};

use crate::scene::SceneIndex;
use scenewright_schema::{AnimationSpec, ChangeSet, ChangeType, DynamicBlock, ElementRef, ElementSpec};
use serde_json::{Map, Value};
use std::fmt;
use tracing::{debug, instrument};

/// One mapping from a payload shape onto the draft.
///
/// Rules run in a fixed order and only ever add to the draft.
pub trait DialectRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn matches(&self, raw: &Map<String, Value>) -> bool;
    fn apply(&self, raw: &Map<String, Value>, draft: &mut Draft);
}

static RULES: [&dyn DialectRule; 5] = [
    &ActionRule,
    &ElementsRule,
    &BlueprintRule,
    &AnimationsRule,
    &DynamicRule,
];

/// The rules [`normalize`] applies, in order.
pub fn rules() -> &'static [&'static dyn DialectRule] {
    &RULES
}

/// How an animation names its target, before resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetRef {
    /// The animation's own `id`, matched against element ids.
    pub id: Option<String>,
    /// `elementId` / `element_id`.
    pub element_id: Option<String>,
    /// `element_name` and its aliases.
    pub name: Option<String>,
}

impl TargetRef {
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.element_id.is_none() && self.name.is_none()
    }
}

impl fmt::Display for TargetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self
            .id
            .as_deref()
            .or(self.element_id.as_deref())
            .or(self.name.as_deref())
            .unwrap_or("<none>");
        f.write_str(label)
    }
}

/// An animation whose target has not been resolved yet.
#[derive(Debug, Clone)]
pub struct PendingAnimation {
    pub target: TargetRef,
    pub spec: AnimationSpec,
}

/// Intermediate state shared by the dialect rules.
#[derive(Debug, Default)]
pub struct Draft {
    pub change_type: Option<ChangeType>,
    pub layer_type: Option<String>,
    pub elements: Vec<ElementSpec>,
    pub animations: Vec<PendingAnimation>,
    pub elements_to_delete: Vec<String>,
    pub dynamic_elements: Option<DynamicBlock>,
}

impl Draft {
    /// Resolves animation targets and produces the change set.
    ///
    /// Animations whose target is neither in the payload nor in `scene` are dropped.
    pub fn build(self, scene: &SceneIndex) -> ChangeSet {
        let mut animations = Vec::with_capacity(self.animations.len());
        for pending in self.animations {
            match resolve_target(&pending.target, &self.elements, scene) {
                Some(target) => {
                    let mut spec = pending.spec;
                    spec.element_id = target.id;
                    spec.element_name = target.name;
                    animations.push(spec);
                }
                None => debug!(element = %pending.target, "dropping animation with unresolved target"),
            }
        }

        ChangeSet {
            change_type: self.change_type.unwrap_or_default(),
            layer_type: self.layer_type,
            elements: self.elements,
            animations,
            elements_to_delete: self.elements_to_delete,
            dynamic_elements: self.dynamic_elements,
        }
    }
}

fn element_ref(e: &ElementSpec) -> ElementRef {
    ElementRef {
        id: e.id.clone(),
        name: e.name.clone(),
    }
}

/// Id first, then `elementId`, then name; the payload wins over the live scene.
fn resolve_target(target: &TargetRef, elements: &[ElementSpec], scene: &SceneIndex) -> Option<ElementRef> {
    let by_id = |id: &str| {
        elements
            .iter()
            .find(|e| e.id.as_deref() == Some(id))
            .map(element_ref)
            .or_else(|| scene.by_id(id).cloned())
    };
    let by_name = |name: &str| {
        elements
            .iter()
            .find(|e| e.name == name)
            .map(element_ref)
            .or_else(|| scene.by_name(name).cloned())
    };
    let by_name_loose = |name: &str| {
        let needle = name.trim();
        elements
            .iter()
            .find(|e| e.name.trim().eq_ignore_ascii_case(needle))
            .map(element_ref)
            .or_else(|| scene.by_name_loose(name).cloned())
    };

    if let Some(found) = target.id.as_deref().and_then(by_id) {
        return Some(found);
    }
    if let Some(id) = target.element_id.as_deref() {
        if let Some(found) = by_id(id).or_else(|| by_name(id)) {
            return Some(found);
        }
    }
    let name = target.name.as_deref()?;
    by_name(name).or_else(|| by_name_loose(name))
}

/// Normalizes a raw payload without a live scene.
pub fn normalize(raw: &Map<String, Value>) -> ChangeSet {
    normalize_with_scene(raw, &SceneIndex::default())
}

/// Normalizes a raw payload, resolving animation targets against `scene` too.
#[instrument(level = "debug", skip_all, fields(keys = raw.len(), scene = scene.len()))]
pub fn normalize_with_scene(raw: &Map<String, Value>, scene: &SceneIndex) -> ChangeSet {
    let mut draft = Draft::default();
    for rule in rules() {
        if rule.matches(raw) {
            debug!(rule = rule.name(), "applying dialect rule");
            rule.apply(raw, &mut draft);
        }
    }
    draft.build(scene)
}
