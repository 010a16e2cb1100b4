//! Field-level validation and clamping.
//!
//! Every field falls back to its own default; one bad field never discards
//! the element or animation it belongs to.

use scenewright_schema::{AnimationSpec, ChangeSet, Easing, ElementSpec, KeyframeSpec};
use serde_json::Value;
use tracing::{debug, instrument};

#[instrument(level = "debug", skip_all, fields(elements = change_set.elements.len(), animations = change_set.animations.len()))]
pub fn validate(mut change_set: ChangeSet) -> ChangeSet {
    for element in &mut change_set.elements {
        validate_element(element);
    }
    for animation in &mut change_set.animations {
        validate_animation(animation);
    }
    change_set
}

fn validate_element(el: &mut ElementSpec) {
    let (default_w, default_h) = el.kind().default_size();
    el.position_x = finite_or(el.position_x, 0.0);
    el.position_y = finite_or(el.position_y, 0.0);
    el.width = finite_or(el.width, default_w);
    el.height = finite_or(el.height, default_h);
    el.rotation = finite_or(el.rotation, 0.0);
    el.opacity = if el.opacity.is_finite() {
        el.opacity.clamp(0.0, 1.0)
    } else {
        1.0
    };
}

pub(crate) fn validate_animation(anim: &mut AnimationSpec) {
    anim.duration = clamp_duration(anim.duration);
    anim.delay = if anim.delay.is_finite() && anim.delay >= 0.0 {
        anim.delay
    } else {
        0.0
    };
    if !anim.easing.is_valid() {
        debug!(easing = %anim.easing, "invalid easing, using default");
        anim.easing = Easing::default();
    }
    if anim.iterations != -1 && anim.iterations < 1 {
        anim.iterations = anim.phase.default_iterations();
    }

    for kf in &mut anim.keyframes {
        validate_keyframe(kf);
    }
    // Stable, so keyframes sharing a position keep their authored order.
    anim.keyframes.sort_by(|a, b| a.position.total_cmp(&b.position));
}

fn clamp_duration(ms: f64) -> f64 {
    if !ms.is_finite() || ms <= 0.0 {
        AnimationSpec::DEFAULT_DURATION_MS
    } else {
        ms.clamp(1.0, AnimationSpec::MAX_DURATION_MS)
    }
}

fn validate_keyframe(kf: &mut KeyframeSpec) {
    kf.position = if kf.position.is_finite() {
        kf.position.clamp(0.0, 100.0)
    } else {
        0.0
    };

    match kf.properties.get("opacity").map(Value::as_f64) {
        None => {}
        Some(Some(v)) if v.is_finite() && (0.0..=1.0).contains(&v) => {}
        Some(Some(v)) if v.is_finite() => {
            kf.properties
                .insert("opacity".to_string(), Value::from(v.clamp(0.0, 1.0)));
        }
        Some(_) => {
            kf.properties.remove("opacity");
        }
    }

    if kf.easing.is_some_and(|e| !e.is_valid()) {
        kf.easing = None;
    }
}

fn finite_or(v: f64, default: f64) -> f64 {
    if v.is_finite() {
        v
    } else {
        default
    }
}
