//! # Scenewright Schema
//!
//! The canonical scene-mutation model handed to the authoring tool after an AI
//! reply has been interpreted. Every type here is plain data: construction and
//! validation live in `scenewright-core`.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub mod animation;
pub mod element;

pub use animation::{AnimationSpec, Easing, EasingKeyword, KeyframeSpec, Phase};
pub use element::{
    ChartContent, CountdownContent, ElementContent, ElementKind, ElementSpec, IconContent,
    ImageContent, LineContent, MapContent, ShapeContent, SvgContent, TableContent,
    TextContent, TickerContent, VideoContent,
};

/// What the renderer should do with the elements of a [`ChangeSet`].
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    #[default]
    Create,
    Update,
    Replace,
    Delete,
}

impl ChangeType {
    /// Parses an action verb, tolerating case and a few synonyms the model likes to use.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "create" | "add" | "insert" | "new" => Some(ChangeType::Create),
            "update" | "modify" | "edit" | "animate" => Some(ChangeType::Update),
            "replace" | "reset" | "rebuild" => Some(ChangeType::Replace),
            "delete" | "remove" | "clear" => Some(ChangeType::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Create => "create",
            ChangeType::Update => "update",
            ChangeType::Replace => "replace",
            ChangeType::Delete => "delete",
        }
    }
}

/// One validated scene mutation, built fresh for every AI turn.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ChangeSet {
    #[serde(rename = "type", default)]
    pub change_type: ChangeType,
    /// Target layer for new elements ("fullscreen", "lower_third", ...).
    #[serde(rename = "layerType", default, skip_serializing_if = "Option::is_none")]
    pub layer_type: Option<String>,
    #[serde(default)]
    pub elements: Vec<ElementSpec>,
    #[serde(default)]
    pub animations: Vec<AnimationSpec>,
    /// Names or ids of elements to remove.
    #[serde(rename = "elementsToDelete", default)]
    pub elements_to_delete: Vec<String>,
    #[serde(
        rename = "dynamicElements",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub dynamic_elements: Option<DynamicBlock>,
}

impl ChangeSet {
    /// Returns `true` when applying this change set would not touch the scene.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
            && self.animations.is_empty()
            && self.elements_to_delete.is_empty()
            && self.dynamic_elements.is_none()
    }

    /// Finds an element by id first, then by name.
    pub fn find_element(&self, reference: &str) -> Option<&ElementSpec> {
        self.elements
            .iter()
            .find(|e| e.id.as_deref() == Some(reference))
            .or_else(|| self.elements.iter().find(|e| e.name == reference))
    }
}

/// A data-driven block: one set of template elements rendered once per data record.
///
/// Templates stay loosely typed because their fields may hold `{{field}}`
/// substitutions or `expression(...)` strings until they are expanded.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct DynamicBlock {
    /// Flat, short-key records.
    #[serde(default)]
    pub data: Vec<Map<String, Value>>,
    /// Element templates.
    #[serde(default)]
    pub elements: Vec<Map<String, Value>>,
    /// Animation templates, referencing template element names.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub animations: Vec<Map<String, Value>>,
}

/// Binds an element to a data field for template rendering.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Binding {
    /// Dotted path into the bound record, e.g. `team.score`.
    pub field: String,
    /// How the value is rendered: "text", "number", "image", ...
    #[serde(rename = "type", default = "default_binding_type")]
    pub binding_type: String,
}

fn default_binding_type() -> String {
    "text".to_string()
}

/// A reference to an element that already lives in the renderer's scene.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct ElementRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_change_type_wire_format() {
        let json = serde_json::to_string(&ChangeType::Replace).unwrap();
        assert_eq!(json, "\"replace\"");
        assert_eq!(ChangeType::parse_lenient(" Remove "), Some(ChangeType::Delete));
        assert_eq!(ChangeType::parse_lenient("explode"), None);
    }

    #[test]
    fn test_change_set_serialization() {
        let cs = ChangeSet {
            change_type: ChangeType::Update,
            layer_type: Some("lower_third".to_string()),
            elements: vec![ElementSpec::new(
                "Headline",
                ElementContent::Text(TextContent {
                    text: "Breaking".to_string(),
                }),
            )],
            elements_to_delete: vec!["Old Banner".to_string()],
            ..Default::default()
        };

        let value = serde_json::to_value(&cs).unwrap();
        assert_eq!(value["type"], "update");
        assert_eq!(value["layerType"], "lower_third");
        assert_eq!(value["elementsToDelete"][0], "Old Banner");
        assert_eq!(value["elements"][0]["element_type"], "text");
        assert_eq!(value["elements"][0]["content"]["text"], "Breaking");
        assert!(value.get("dynamicElements").is_none());

        let loaded: ChangeSet = serde_json::from_value(value).unwrap();
        assert_eq!(loaded, cs);
    }

    #[test]
    fn test_find_element_prefers_id() {
        let mut a = ElementSpec::new("Score", ElementContent::Text(TextContent::default()));
        a.id = Some("el-1".to_string());
        let b = ElementSpec::new("el-1", ElementContent::Text(TextContent::default()));
        let cs = ChangeSet {
            elements: vec![b, a],
            ..Default::default()
        };
        assert_eq!(cs.find_element("el-1").unwrap().name, "Score");
        assert!(cs.find_element("missing").is_none());
    }

    #[test]
    fn test_empty_change_set() {
        assert!(ChangeSet::default().is_empty());
    }
}
