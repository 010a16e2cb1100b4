use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Animation lifecycle stage.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Entrance.
    #[default]
    In,
    /// Continuous, while the element is on air.
    Loop,
    /// Exit.
    Out,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::In, Phase::Loop, Phase::Out];

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::In => "in",
            Phase::Loop => "loop",
            Phase::Out => "out",
        }
    }

    /// Accepts the canonical names plus the synonyms seen in model output.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in" | "enter" | "entrance" | "intro" | "entry" => Some(Phase::In),
            "loop" | "idle" | "continuous" | "ambient" | "hold" => Some(Phase::Loop),
            "out" | "exit" | "outro" | "leave" => Some(Phase::Out),
            _ => None,
        }
    }

    /// Iteration count used when the payload gives none: loops repeat forever.
    pub fn default_iterations(&self) -> i64 {
        match self {
            Phase::Loop => -1,
            Phase::In | Phase::Out => 1,
        }
    }
}

/// Named CSS timing functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EasingKeyword {
    Linear,
    Ease,
    EaseIn,
    EaseOut,
    EaseInOut,
    StepStart,
    StepEnd,
}

impl EasingKeyword {
    pub fn as_css(&self) -> &'static str {
        match self {
            EasingKeyword::Linear => "linear",
            EasingKeyword::Ease => "ease",
            EasingKeyword::EaseIn => "ease-in",
            EasingKeyword::EaseOut => "ease-out",
            EasingKeyword::EaseInOut => "ease-in-out",
            EasingKeyword::StepStart => "step-start",
            EasingKeyword::StepEnd => "step-end",
        }
    }

    fn from_css(value: &str) -> Option<Self> {
        match value {
            "linear" => Some(EasingKeyword::Linear),
            "ease" => Some(EasingKeyword::Ease),
            "ease-in" => Some(EasingKeyword::EaseIn),
            "ease-out" => Some(EasingKeyword::EaseOut),
            "ease-in-out" => Some(EasingKeyword::EaseInOut),
            "step-start" => Some(EasingKeyword::StepStart),
            "step-end" => Some(EasingKeyword::StepEnd),
            _ => None,
        }
    }
}

/// A CSS timing function: a keyword or a `cubic-bezier(x1, y1, x2, y2)` curve.
///
/// On the wire this is always the CSS string.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Easing {
    Keyword(EasingKeyword),
    CubicBezier([f64; 4]),
}

impl Default for Easing {
    fn default() -> Self {
        Easing::Keyword(EasingKeyword::EaseOut)
    }
}

impl Easing {
    /// Parses CSS syntax, also folding `ease_in`, `easeIn` and `EASE-IN` onto `ease-in`.
    pub fn parse_lenient(value: &str) -> Option<Self> {
        let folded = fold_easing_name(value.trim());
        if let Some(keyword) = EasingKeyword::from_css(&folded) {
            return Some(Easing::Keyword(keyword));
        }

        let args = folded
            .strip_prefix("cubic-bezier(")
            .or_else(|| folded.strip_prefix("cubic-bezier ("))?
            .strip_suffix(')')?;
        let parts: Vec<&str> = args.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return None;
        }
        let mut points = [0.0; 4];
        for (slot, part) in points.iter_mut().zip(&parts) {
            *slot = part.parse::<f64>().ok()?;
        }
        Some(Easing::CubicBezier(points))
    }

    /// CSS only accepts curves whose x coordinates stay inside `[0, 1]`.
    pub fn is_valid(&self) -> bool {
        match self {
            Easing::Keyword(_) => true,
            Easing::CubicBezier([x1, y1, x2, y2]) => {
                [x1, y1, x2, y2].iter().all(|v| v.is_finite())
                    && (0.0..=1.0).contains(x1)
                    && (0.0..=1.0).contains(x2)
            }
        }
    }
}

fn fold_easing_name(value: &str) -> String {
    let has_lower = value.chars().any(|c| c.is_ascii_lowercase());
    let mut out = String::with_capacity(value.len() + 4);
    for (i, c) in value.chars().enumerate() {
        if has_lower && c.is_ascii_uppercase() && i > 0 {
            out.push('-');
        }
        match c {
            '_' => out.push('-'),
            c => out.push(c.to_ascii_lowercase()),
        }
    }
    out
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Easing::Keyword(k) => f.write_str(k.as_css()),
            Easing::CubicBezier([x1, y1, x2, y2]) => {
                write!(f, "cubic-bezier({x1}, {y1}, {x2}, {y2})")
            }
        }
    }
}

impl FromStr for Easing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Easing::parse_lenient(s).ok_or_else(|| format!("unknown easing '{s}'"))
    }
}

impl Serialize for Easing {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Easing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Animated property values at one point of an animation's timeline.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct KeyframeSpec {
    /// Percentage of the animation's duration, 0 - 100.
    pub position: f64,
    #[serde(default)]
    pub properties: Map<String, Value>,
    /// Easing towards the next keyframe; falls back to the animation's easing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub easing: Option<Easing>,
}

impl KeyframeSpec {
    pub fn new(position: f64, properties: Map<String, Value>) -> Self {
        Self {
            position,
            properties,
            easing: None,
        }
    }
}

/// One animation bound to an element.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnimationSpec {
    /// Id of the target element, when it has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element_id: Option<String>,
    /// Name of the target element.
    pub element_name: String,
    #[serde(default)]
    pub phase: Phase,
    /// Milliseconds, 1 - 60000.
    pub duration: f64,
    /// Milliseconds, >= 0.
    #[serde(default)]
    pub delay: f64,
    #[serde(default)]
    pub easing: Easing,
    /// -1 repeats forever.
    pub iterations: i64,
    #[serde(default)]
    pub keyframes: Vec<KeyframeSpec>,
}

impl AnimationSpec {
    pub const DEFAULT_DURATION_MS: f64 = 500.0;
    pub const MAX_DURATION_MS: f64 = 60_000.0;

    /// A keyframe-less animation with every field at its default.
    pub fn new(element_name: impl Into<String>, phase: Phase) -> Self {
        Self {
            element_id: None,
            element_name: element_name.into(),
            phase,
            duration: Self::DEFAULT_DURATION_MS,
            delay: 0.0,
            easing: Easing::default(),
            iterations: phase.default_iterations(),
            keyframes: Vec::new(),
        }
    }
}
