//! Expansion of data-driven template blocks.
//!
//! Each data record renders every template once: `{{field}}` tokens are
//! substituted from the record, `expression(...)` literals in position and
//! delay fields are evaluated, and the result goes through the normal
//! normalize, validate and synthesize passes.

pub mod expr;

use crate::errors::ExprError;
use crate::normalize::normalize;
use crate::synthesize::synthesize_defaults;
use crate::validate::validate;
use scenewright_schema::{AnimationSpec, DynamicBlock, ElementSpec};
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::{instrument, warn};

pub use expr::evaluate;

/// Fields where `expression(...)` is evaluated. Anywhere else it stays literal text.
const EXPRESSION_FIELDS: &[&str] = &[
    "position_x",
    "x",
    "left",
    "positionX",
    "position_y",
    "y",
    "top",
    "positionY",
    "delay",
];

/// Keys an animation template uses to name its target.
const TARGET_NAME_KEYS: &[&str] = &["element_name", "elementName", "target", "element"];

/// Renders a dynamic block. Expressions that fail fall back to the field default.
pub fn expand_dynamic(block: &DynamicBlock) -> (Vec<ElementSpec>, Vec<AnimationSpec>) {
    expand(block, false).unwrap_or_default()
}

/// Like [`expand_dynamic`], but the first failing expression is an error.
pub fn expand_dynamic_strict(
    block: &DynamicBlock,
) -> Result<(Vec<ElementSpec>, Vec<AnimationSpec>), ExprError> {
    expand(block, true)
}

#[instrument(level = "debug", skip_all, fields(records = block.data.len(), templates = block.elements.len()))]
fn expand(
    block: &DynamicBlock,
    strict: bool,
) -> Result<(Vec<ElementSpec>, Vec<AnimationSpec>), ExprError> {
    let count = block.data.len();
    let mut elements = Vec::with_capacity(count * block.elements.len());
    let mut animations = Vec::new();

    for (index, record) in block.data.iter().enumerate() {
        let ctx = Record {
            fields: record,
            index,
            count,
        };
        let vars = ctx.variables();
        let mut renames: HashMap<String, String> = HashMap::new();

        for template in &block.elements {
            let mut element = ctx.substitute_map(template);
            // Templates whose name has no tokens would collide across records.
            if count > 1 {
                if let Some(Value::String(name)) = template.get("name") {
                    if element.get("name") == Some(&Value::String(name.clone())) {
                        let unique = format!("{name} {}", index + 1);
                        renames.insert(name.clone(), unique.clone());
                        element.insert("name".to_string(), Value::String(unique));
                    }
                }
            }
            evaluate_fields(&mut element, &vars, strict)?;
            elements.push(Value::Object(element));
        }

        for template in &block.animations {
            let mut anim = ctx.substitute_map(template);
            for key in TARGET_NAME_KEYS {
                let renamed = match anim.get(*key) {
                    Some(Value::String(target)) => renames.get(target).cloned(),
                    _ => None,
                };
                if let Some(unique) = renamed {
                    anim.insert((*key).to_string(), Value::String(unique));
                }
            }
            evaluate_fields(&mut anim, &vars, strict)?;
            animations.push(Value::Object(anim));
        }
    }

    let mut raw = Map::new();
    raw.insert("elements".to_string(), Value::Array(elements));
    raw.insert("animations".to_string(), Value::Array(animations));
    let change_set = synthesize_defaults(validate(normalize(&raw)));
    Ok((change_set.elements, change_set.animations))
}

fn evaluate_fields(
    obj: &mut Map<String, Value>,
    vars: &HashMap<String, f64>,
    strict: bool,
) -> Result<(), ExprError> {
    for key in EXPRESSION_FIELDS {
        let Some(body) = obj.get(*key).and_then(Value::as_str).and_then(expr::expression_body) else {
            continue;
        };
        match evaluate(body, vars) {
            Ok(v) => {
                obj.insert((*key).to_string(), Value::from(v));
            }
            Err(e) if strict => return Err(e),
            Err(e) => {
                warn!(field = *key, error = %e, "expression failed, using field default");
                obj.remove(*key);
            }
        }
    }
    Ok(())
}

struct Record<'a> {
    fields: &'a Map<String, Value>,
    index: usize,
    count: usize,
}

impl Record<'_> {
    /// `index`, `count` and every numeric record field.
    fn variables(&self) -> HashMap<String, f64> {
        let mut vars: HashMap<String, f64> = self
            .fields
            .iter()
            .filter_map(|(k, v)| {
                let n = match v {
                    Value::Number(n) => n.as_f64(),
                    Value::String(s) => s.trim().parse().ok(),
                    _ => None,
                }?;
                Some((k.clone(), n))
            })
            .collect();
        vars.insert("index".to_string(), self.index as f64);
        vars.insert("count".to_string(), self.count as f64);
        vars
    }

    fn lookup(&self, key: &str) -> Option<Value> {
        match key {
            "index" => Some(Value::from(self.index)),
            "count" => Some(Value::from(self.count)),
            _ => Some(self.fields.get(key).cloned().unwrap_or(Value::Null)),
        }
    }

    fn substitute_map(&self, template: &Map<String, Value>) -> Map<String, Value> {
        template
            .iter()
            .map(|(k, v)| (k.clone(), self.substitute(v)))
            .collect()
    }

    fn substitute(&self, value: &Value) -> Value {
        match value {
            Value::String(s) => self.substitute_str(s),
            Value::Array(items) => Value::Array(items.iter().map(|v| self.substitute(v)).collect()),
            Value::Object(map) => Value::Object(self.substitute_map(map)),
            other => other.clone(),
        }
    }

    /// A string that is exactly one token takes the field's JSON value as-is.
    fn substitute_str(&self, s: &str) -> Value {
        if let Some(key) = whole_token(s) {
            if let Some(v) = self.lookup(key) {
                return if v.is_null() { Value::String(String::new()) } else { v };
            }
        }

        let mut out = String::with_capacity(s.len());
        let mut rest = s;
        while let Some(open) = rest.find("{{") {
            out.push_str(&rest[..open]);
            let after = &rest[open + 2..];
            let Some(close) = after.find("}}") else {
                out.push_str(&rest[open..]);
                return Value::String(out);
            };
            let key = after[..close].trim();
            if !is_field_name(key) {
                // Not ours, e.g. an image placeholder, which may still wrap a field token.
                out.push_str("{{");
                rest = after;
                continue;
            }
            if let Some(v) = self.lookup(key) {
                out.push_str(&render(&v));
            }
            rest = &after[close + 2..];
        }
        out.push_str(rest);
        Value::String(out)
    }
}

fn whole_token(s: &str) -> Option<&str> {
    let key = s.strip_prefix("{{")?.strip_suffix("}}")?.trim();
    (is_field_name(key) && !key.contains("{{")).then_some(key)
}

fn is_field_name(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn render(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
