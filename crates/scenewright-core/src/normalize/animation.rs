//! Animation and keyframe parsing shared by the dialect rules.

use super::coerce::{first, first_string, millis, numeric, Numeric};
use super::{PendingAnimation, TargetRef};
use scenewright_schema::{AnimationSpec, Easing, KeyframeSpec, Phase};
use serde_json::{Map, Value};

/// Keyframe keys that are never animatable properties.
const KEYFRAME_RESERVED: &[&str] = &["position", "offset", "easing", "ease", "properties", "props", "values"];

/// Parses one entry of an `animations` array.
pub(crate) fn parse_animation(obj: &Map<String, Value>) -> PendingAnimation {
    let target = TargetRef {
        id: first_string(obj, &["id"]),
        element_id: first_string(obj, &["elementId", "element_id"]),
        name: first_string(obj, &["element_name", "elementName", "target", "element"]),
    };

    let phase = first(obj, &["phase"])
        .or_else(|| first(obj, &["type"]))
        .and_then(Value::as_str)
        .and_then(Phase::parse_lenient)
        .unwrap_or_default();

    let mut spec = AnimationSpec::new(String::new(), phase);
    apply_timing(obj, &mut spec);
    spec.keyframes = first(obj, &["keyframes", "frames"])
        .and_then(Value::as_array)
        .map(|list| parse_keyframes(list))
        .unwrap_or_default();

    PendingAnimation { target, spec }
}

/// Expands an `animation: {in, loop, out}` object into one animation per phase.
///
/// Each phase object carries `from`/`to` property maps, which become the
/// keyframes at 0 and 100.
pub(crate) fn parse_phase_block(block: &Map<String, Value>, target: &TargetRef) -> Vec<PendingAnimation> {
    let mut out = Vec::new();
    for (key, value) in block {
        let (Some(phase), Some(obj)) = (Phase::parse_lenient(key), value.as_object()) else {
            continue;
        };

        let mut spec = AnimationSpec::new(String::new(), phase);
        apply_timing(obj, &mut spec);
        spec.keyframes = match first(obj, &["keyframes"]).and_then(Value::as_array) {
            Some(list) => parse_keyframes(list),
            None => [("from", 0.0), ("to", 100.0)]
                .into_iter()
                .filter_map(|(k, position)| {
                    let props = obj.get(k)?.as_object()?;
                    Some(KeyframeSpec::new(position, coerce_properties(props.clone())))
                })
                .collect(),
        };
        out.push(PendingAnimation {
            target: target.clone(),
            spec,
        });
    }
    out
}

fn apply_timing(obj: &Map<String, Value>, spec: &mut AnimationSpec) {
    spec.duration = millis(first(obj, &["duration", "duration_ms", "durationMs"]))
        .or(AnimationSpec::DEFAULT_DURATION_MS);
    spec.delay = millis(first(obj, &["delay", "delay_ms", "delayMs"])).or(0.0);
    if let Some(easing) = first(obj, &["easing", "ease", "timing"])
        .and_then(Value::as_str)
        .and_then(Easing::parse_lenient)
    {
        spec.easing = easing;
    }
    if let Some(v) = first(obj, &["iterations", "iterationCount", "iteration_count", "repeat"]) {
        spec.iterations = iterations(v);
    }
}

/// `-1` for infinite, `0` for garbage (the validator restores the phase default).
fn iterations(value: &Value) -> i64 {
    match value {
        Value::Bool(true) => -1,
        Value::String(s) if s.trim().eq_ignore_ascii_case("infinite") => -1,
        other => match numeric(Some(other)) {
            Numeric::Value(v) if v.is_infinite() && v > 0.0 => -1,
            Numeric::Value(v) if v.is_finite() => v.round() as i64,
            _ => 0,
        },
    }
}

/// Parses keyframes, dropping non-object entries.
///
/// Accepts `position` (0-100), legacy `offset` (0-1, scaled ×100) and
/// flat properties beside them. Keyframes with neither are spread evenly.
pub(crate) fn parse_keyframes(list: &[Value]) -> Vec<KeyframeSpec> {
    let objects: Vec<&Map<String, Value>> = list.iter().filter_map(Value::as_object).collect();
    let n = objects.len();

    objects
        .into_iter()
        .enumerate()
        .map(|(i, obj)| {
            let position = match keyframe_position(obj) {
                Some(p) => p,
                None if n > 1 => i as f64 * 100.0 / (n - 1) as f64,
                None => 0.0,
            };

            let mut properties = first(obj, &["properties", "props", "values"])
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();
            for (key, value) in obj {
                if !KEYFRAME_RESERVED.contains(&key.as_str()) && !properties.contains_key(key) {
                    properties.insert(key.clone(), value.clone());
                }
            }

            KeyframeSpec {
                position,
                properties: coerce_properties(properties),
                easing: first(obj, &["easing", "ease"])
                    .and_then(Value::as_str)
                    .and_then(Easing::parse_lenient),
            }
        })
        .collect()
}

fn keyframe_position(obj: &Map<String, Value>) -> Option<f64> {
    if let Some(Value::String(s)) = obj.get("position") {
        match s.trim().to_ascii_lowercase().as_str() {
            "from" | "start" => return Some(0.0),
            "to" | "end" => return Some(100.0),
            _ => {}
        }
    }
    match numeric(obj.get("position")) {
        Numeric::Value(v) | Numeric::Percent(v) => return Some(v),
        Numeric::Invalid => return Some(f64::NAN),
        Numeric::Missing => {}
    }
    match numeric(obj.get("offset")) {
        Numeric::Value(v) => Some(v * 100.0),
        Numeric::Percent(v) => Some(v),
        Numeric::Invalid => Some(f64::NAN),
        Numeric::Missing => None,
    }
}

/// Numeric-looking `opacity` strings become numbers; everything else passes through.
fn coerce_properties(mut properties: Map<String, Value>) -> Map<String, Value> {
    let coerced = match properties.get("opacity") {
        Some(v @ Value::String(_)) => match numeric(Some(v)) {
            Numeric::Value(v) => Value::from(v),
            Numeric::Percent(p) => Value::from(p / 100.0),
            _ => Value::Null,
        },
        _ => return properties,
    };
    properties.insert("opacity".to_string(), coerced);
    properties
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_offset_scales_to_position() {
        let kfs = parse_keyframes(json!([{"offset": 0.5, "opacity": 1}]).as_array().unwrap());
        assert_eq!(kfs[0].position, 50.0);
        assert_eq!(kfs[0].properties["opacity"], json!(1));
    }

    #[test]
    fn test_flat_and_nested_properties_merge() {
        let kfs = parse_keyframes(
            json!([{"position": 0, "scale": 0.5, "properties": {"opacity": 0}}, "junk", null])
                .as_array()
                .unwrap(),
        );
        assert_eq!(kfs.len(), 1);
        assert_eq!(kfs[0].properties["scale"], json!(0.5));
        assert_eq!(kfs[0].properties["opacity"], json!(0));
    }

    #[test]
    fn test_missing_positions_are_spread() {
        let kfs = parse_keyframes(json!([{"opacity": 0}, {"opacity": 0.5}, {"opacity": 1}]).as_array().unwrap());
        let positions: Vec<f64> = kfs.iter().map(|k| k.position).collect();
        assert_eq!(positions, vec![0.0, 50.0, 100.0]);
    }

    #[test]
    fn test_timing_fields() {
        let pending = parse_animation(
            json!({"element_name": "Box", "phase": "Exit", "duration": "2s", "delay": "150ms",
                   "easing": "easeInOut", "iterations": "infinite"})
            .as_object()
            .unwrap(),
        );
        assert_eq!(pending.target.name.as_deref(), Some("Box"));
        assert_eq!(pending.spec.phase, Phase::Out);
        assert_eq!(pending.spec.duration, 2000.0);
        assert_eq!(pending.spec.delay, 150.0);
        assert_eq!(pending.spec.easing.to_string(), "ease-in-out");
        assert_eq!(pending.spec.iterations, -1);
    }

    #[test]
    fn test_phase_block() {
        let target = TargetRef {
            name: Some("Logo".to_string()),
            ..Default::default()
        };
        let block = json!({
            "in": {"from": {"opacity": 0}, "to": {"opacity": 1}, "duration": 400},
            "loop": {"from": {"rotation": 0}, "to": {"rotation": 360}},
            "sparkle": {"from": {}}
        });
        let anims = parse_phase_block(block.as_object().unwrap(), &target);
        assert_eq!(anims.len(), 2);
        let entrance = anims.iter().find(|a| a.spec.phase == Phase::In).unwrap();
        assert_eq!(entrance.spec.duration, 400.0);
        assert_eq!(entrance.spec.keyframes.len(), 2);
        assert_eq!(entrance.spec.keyframes[1].position, 100.0);
        let looping = anims.iter().find(|a| a.spec.phase == Phase::Loop).unwrap();
        assert_eq!(looping.spec.iterations, -1);
    }
}
