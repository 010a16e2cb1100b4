use scenewright_schema::{ChangeSet, KeyframeSpec, Phase};
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

/// Gives every animation with fewer than two keyframes a phase template, so
/// each one is playable on its own.
#[instrument(level = "debug", skip_all, fields(animations = change_set.animations.len()))]
pub fn synthesize_defaults(mut change_set: ChangeSet) -> ChangeSet {
    for anim in &mut change_set.animations {
        if anim.keyframes.len() < 2 {
            debug!(element = %anim.element_name, phase = anim.phase.as_str(), "synthesizing keyframes");
            anim.keyframes = phase_template(anim.phase);
        }
    }
    change_set
}

/// in: fade up, out: fade down, loop: one full turn.
pub fn phase_template(phase: Phase) -> Vec<KeyframeSpec> {
    let (property, from, to) = match phase {
        Phase::In => ("opacity", json!(0), json!(1)),
        Phase::Out => ("opacity", json!(1), json!(0)),
        Phase::Loop => ("rotation", json!(0), json!(360)),
    };
    vec![
        KeyframeSpec::new(0.0, single(property, from)),
        KeyframeSpec::new(100.0, single(property, to)),
    ]
}

fn single(key: &str, value: Value) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert(key.to_string(), value);
    map
}
