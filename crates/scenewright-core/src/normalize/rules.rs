//! The dialect rules, applied in order by [`super::normalize_with_scene`].

use super::animation::{parse_animation, parse_phase_block};
use super::coerce::{as_string, first, first_string, numeric};
use super::element::parse_element;
use super::{DialectRule, Draft, TargetRef};
use scenewright_schema::{ChangeType, DynamicBlock, ElementSpec};
use serde_json::{Map, Value};
use tracing::{debug, warn};

const LAYER_KEYS: &[&str] = &["layerType", "layer_type", "layer"];
const DELETE_KEYS: &[&str] = &["elementsToDelete", "elements_to_delete", "delete"];
const DYNAMIC_KEYS: &[&str] = &["dynamicElements", "dynamic_elements", "dynamic"];

/// Container nodes of a blueprint tree: they offset children but are not drawn.
const CONTAINER_KINDS: &[&str] = &[
    "container", "group", "frame", "stack", "row", "column", "layout", "root", "view", "div",
];

/// Nesting limit for blueprint trees.
const MAX_LAYOUT_DEPTH: usize = 32;

/// `action`, `layerType` and deletions.
pub struct ActionRule;

impl DialectRule for ActionRule {
    fn name(&self) -> &'static str {
        "action"
    }

    fn matches(&self, raw: &Map<String, Value>) -> bool {
        raw.contains_key("action")
            || raw.get("type").is_some_and(Value::is_string)
            || first(raw, LAYER_KEYS).is_some()
            || first(raw, DELETE_KEYS).is_some()
    }

    fn apply(&self, raw: &Map<String, Value>, draft: &mut Draft) {
        let change_type = ["action", "type"]
            .iter()
            .filter_map(|k| raw.get(*k).and_then(Value::as_str))
            .find_map(ChangeType::parse_lenient);
        if change_type.is_some() {
            draft.change_type = change_type;
        }

        if let Some(layer) = first_string(raw, LAYER_KEYS) {
            draft.layer_type = Some(layer);
        }

        match first(raw, DELETE_KEYS) {
            Some(Value::Array(items)) => {
                draft
                    .elements_to_delete
                    .extend(items.iter().filter_map(deletion_ref));
            }
            Some(single) => draft.elements_to_delete.extend(deletion_ref(single)),
            None => {}
        }
    }
}

fn deletion_ref(value: &Value) -> Option<String> {
    match value {
        Value::Object(o) => first_string(o, &["id", "element_id", "elementId", "name", "element_name"]),
        other => as_string(other),
    }
}

/// `elements[]` in the action, simplified and canonical shapes.
pub struct ElementsRule;

impl DialectRule for ElementsRule {
    fn name(&self) -> &'static str {
        "elements"
    }

    fn matches(&self, raw: &Map<String, Value>) -> bool {
        matches!(raw.get("elements"), Some(Value::Array(_) | Value::Object(_)))
            || raw.get("element").is_some_and(Value::is_object)
    }

    fn apply(&self, raw: &Map<String, Value>, draft: &mut Draft) {
        match raw.get("elements") {
            Some(Value::Array(items)) => {
                for item in items {
                    match item.as_object() {
                        Some(obj) => {
                            push_element(obj, draft);
                        }
                        None => debug!("dropping non-object element entry"),
                    }
                }
            }
            // Keyed by name: {"Title": {...}, "Logo": {...}}
            Some(Value::Object(by_name)) => {
                for (name, item) in by_name {
                    if let Some(obj) = item.as_object() {
                        let mut obj = obj.clone();
                        obj.entry("name").or_insert_with(|| Value::String(name.clone()));
                        push_element(&obj, draft);
                    }
                }
            }
            _ => {}
        }

        if let Some(obj) = raw.get("element").and_then(Value::as_object) {
            push_element(obj, draft);
        }
    }
}

/// Parses one element plus any animations nested inside it.
fn push_element(obj: &Map<String, Value>, draft: &mut Draft) -> Option<usize> {
    let Some(element) = parse_element(obj, draft.elements.len() + 1) else {
        let name = first_string(obj, &["name", "id"]).unwrap_or_default();
        warn!(name = %name, "dropping element of undeterminable kind");
        return None;
    };

    let target = target_of(&element);
    match obj.get("animations") {
        Some(Value::Array(list)) => {
            for item in list.iter().filter_map(Value::as_object) {
                let mut pending = parse_animation(item);
                if pending.target.is_empty() {
                    pending.target = target.clone();
                }
                draft.animations.push(pending);
            }
        }
        Some(Value::Object(block)) => draft.animations.extend(parse_phase_block(block, &target)),
        _ => {}
    }
    if let Some(block) = obj.get("animation").and_then(Value::as_object) {
        draft.animations.extend(parse_phase_block(block, &target));
    }

    draft.elements.push(element);
    Some(draft.elements.len() - 1)
}

fn target_of(element: &ElementSpec) -> TargetRef {
    TargetRef {
        id: None,
        element_id: element.id.clone(),
        name: Some(element.name.clone()),
    }
}

/// A `layout` tree of nested `children[]` with relative positions.
pub struct BlueprintRule;

impl DialectRule for BlueprintRule {
    fn name(&self) -> &'static str {
        "blueprint"
    }

    fn matches(&self, raw: &Map<String, Value>) -> bool {
        layout_root(raw).is_some()
    }

    fn apply(&self, raw: &Map<String, Value>, draft: &mut Draft) {
        let Some(root) = layout_root(raw) else {
            return;
        };
        if draft.layer_type.is_none() {
            draft.layer_type = first_string(root, LAYER_KEYS);
        }
        visit_layout(root, (0.0, 0.0), draft, 0);
    }
}

fn layout_root(raw: &Map<String, Value>) -> Option<&Map<String, Value>> {
    raw.get("layout")
        .or_else(|| raw.get("blueprint").and_then(|b| b.get("layout")))
        .and_then(Value::as_object)
}

fn visit_layout(node: &Map<String, Value>, origin: (f64, f64), draft: &mut Draft, depth: usize) {
    if depth > MAX_LAYOUT_DEPTH {
        warn!(depth, "blueprint nesting too deep, ignoring subtree");
        return;
    }

    let children: Vec<&Map<String, Value>> = node
        .get("children")
        .and_then(Value::as_array)
        .map(|c| c.iter().filter_map(Value::as_object).collect())
        .unwrap_or_default();

    let local = (
        finite_or_zero(numeric(first(node, &["position_x", "x", "left"])).or(0.0)),
        finite_or_zero(numeric(first(node, &["position_y", "y", "top"])).or(0.0)),
    );
    let absolute = (origin.0 + local.0, origin.1 + local.1);

    let declared = first_string(node, &["type", "element_type", "kind"]);
    let is_container = declared
        .as_deref()
        .is_some_and(|t| CONTAINER_KINDS.contains(&t.trim().to_ascii_lowercase().as_str()));

    // The layout root is a container unless it explicitly says otherwise.
    if !is_container && (depth > 0 || declared.is_some()) {
        let pushed = if children.is_empty() || declared.is_some() {
            push_element(node, draft)
        } else {
            // Untyped node with children: a container unless its content says otherwise.
            parse_element(node, 0).and_then(|_| push_element(node, draft))
        };
        if let Some(index) = pushed {
            let el = &mut draft.elements[index];
            el.position_x = origin.0 + el.position_x;
            el.position_y = origin.1 + el.position_y;
        }
    }

    for child in children {
        visit_layout(child, absolute, draft, depth + 1);
    }
}

fn finite_or_zero(v: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        0.0
    }
}

/// Top-level `animations[]`, also accepting a lone `animation` object.
pub struct AnimationsRule;

impl DialectRule for AnimationsRule {
    fn name(&self) -> &'static str {
        "animations"
    }

    fn matches(&self, raw: &Map<String, Value>) -> bool {
        raw.get("animations").is_some_and(Value::is_array)
            || raw.get("animation").is_some_and(Value::is_object)
    }

    fn apply(&self, raw: &Map<String, Value>, draft: &mut Draft) {
        if let Some(list) = raw.get("animations").and_then(Value::as_array) {
            for item in list {
                match item.as_object() {
                    Some(obj) => draft.animations.push(parse_animation(obj)),
                    None => debug!("dropping non-object animation entry"),
                }
            }
        }
        if let Some(obj) = raw.get("animation").and_then(Value::as_object) {
            draft.animations.push(parse_animation(obj));
        }
    }
}

/// `dynamicElements`: data records plus element templates, kept loosely typed.
pub struct DynamicRule;

impl DialectRule for DynamicRule {
    fn name(&self) -> &'static str {
        "dynamic"
    }

    fn matches(&self, raw: &Map<String, Value>) -> bool {
        first(raw, DYNAMIC_KEYS).is_some_and(Value::is_object)
    }

    fn apply(&self, raw: &Map<String, Value>, draft: &mut Draft) {
        let Some(block) = first(raw, DYNAMIC_KEYS).and_then(Value::as_object) else {
            return;
        };
        let objects = |keys: &[&str]| -> Vec<Map<String, Value>> {
            first(block, keys)
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(Value::as_object).cloned().collect())
                .unwrap_or_default()
        };

        let dynamic = DynamicBlock {
            data: objects(&["data", "records", "rows"]),
            elements: objects(&["elements", "templates", "template"]),
            animations: objects(&["animations"]),
        };
        if dynamic.elements.is_empty() {
            debug!("ignoring dynamic block without element templates");
            return;
        }
        draft.dynamic_elements = Some(dynamic);
    }
}
