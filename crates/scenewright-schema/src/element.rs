use crate::Binding;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Discriminant of [`ElementContent`], without payload.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Shape,
    Image,
    Icon,
    Chart,
    Table,
    Map,
    Video,
    Ticker,
    Countdown,
    Line,
    Svg,
}

impl ElementKind {
    pub const ALL: [ElementKind; 12] = [
        ElementKind::Text,
        ElementKind::Shape,
        ElementKind::Image,
        ElementKind::Icon,
        ElementKind::Chart,
        ElementKind::Table,
        ElementKind::Map,
        ElementKind::Video,
        ElementKind::Ticker,
        ElementKind::Countdown,
        ElementKind::Line,
        ElementKind::Svg,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Shape => "shape",
            ElementKind::Image => "image",
            ElementKind::Icon => "icon",
            ElementKind::Chart => "chart",
            ElementKind::Table => "table",
            ElementKind::Map => "map",
            ElementKind::Video => "video",
            ElementKind::Ticker => "ticker",
            ElementKind::Countdown => "countdown",
            ElementKind::Line => "line",
            ElementKind::Svg => "svg",
        }
    }

    /// Maps the many names the model uses for an element type onto a kind.
    ///
    /// Shape aliases ("rect", "circle", ...) map to [`ElementKind::Shape`]; the
    /// concrete shape is recovered by [`ElementKind::shape_alias`].
    pub fn parse_lenient(value: &str) -> Option<Self> {
        let v = value.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        let kind = match v.as_str() {
            "text" | "txt" | "label" | "heading" | "title" | "subtitle" | "paragraph" => {
                ElementKind::Text
            }
            "shape" | "rect" | "rectangle" | "box" | "circle" | "ellipse" | "triangle"
            | "polygon" | "rounded_rect" | "star" => ElementKind::Shape,
            "image" | "img" | "photo" | "picture" | "logo" | "background_image" => {
                ElementKind::Image
            }
            "icon" | "emoji" => ElementKind::Icon,
            "chart" | "graph" | "bar_chart" | "line_chart" | "pie_chart" => ElementKind::Chart,
            "table" | "grid" | "standings" => ElementKind::Table,
            "map" | "geo" => ElementKind::Map,
            "video" | "clip" => ElementKind::Video,
            "ticker" | "crawl" | "scroller" | "marquee" => ElementKind::Ticker,
            "countdown" | "timer" | "clock" => ElementKind::Countdown,
            "line" | "divider" | "rule" | "arrow" => ElementKind::Line,
            "svg" | "vector" => ElementKind::Svg,
            _ => return None,
        };
        Some(kind)
    }

    /// For shape aliases, the concrete shape the alias names.
    pub fn shape_alias(value: &str) -> Option<&'static str> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rect" | "rectangle" | "box" => Some("rectangle"),
            "rounded_rect" | "rounded-rect" => Some("rounded_rectangle"),
            "circle" => Some("circle"),
            "ellipse" => Some("ellipse"),
            "triangle" => Some("triangle"),
            "polygon" => Some("polygon"),
            "star" => Some("star"),
            _ => None,
        }
    }

    /// Default `(width, height)` in pixels when the payload does not give one.
    pub fn default_size(&self) -> (f64, f64) {
        match self {
            ElementKind::Text => (400.0, 60.0),
            ElementKind::Shape => (200.0, 200.0),
            ElementKind::Image => (400.0, 300.0),
            ElementKind::Icon => (64.0, 64.0),
            ElementKind::Chart => (600.0, 400.0),
            ElementKind::Table => (600.0, 300.0),
            ElementKind::Map => (800.0, 600.0),
            ElementKind::Video => (640.0, 360.0),
            ElementKind::Ticker => (1920.0, 60.0),
            ElementKind::Countdown => (300.0, 100.0),
            ElementKind::Line => (300.0, 4.0),
            ElementKind::Svg => (200.0, 200.0),
        }
    }
}

impl std::fmt::Display for ElementKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Type-specific payload of an element. Serialized as `element_type` + `content`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "element_type", content = "content", rename_all = "lowercase")]
pub enum ElementContent {
    Text(TextContent),
    Shape(ShapeContent),
    Image(ImageContent),
    Icon(IconContent),
    Chart(ChartContent),
    Table(TableContent),
    Map(MapContent),
    Video(VideoContent),
    Ticker(TickerContent),
    Countdown(CountdownContent),
    Line(LineContent),
    Svg(SvgContent),
}

impl ElementContent {
    pub fn kind(&self) -> ElementKind {
        match self {
            ElementContent::Text(_) => ElementKind::Text,
            ElementContent::Shape(_) => ElementKind::Shape,
            ElementContent::Image(_) => ElementKind::Image,
            ElementContent::Icon(_) => ElementKind::Icon,
            ElementContent::Chart(_) => ElementKind::Chart,
            ElementContent::Table(_) => ElementKind::Table,
            ElementContent::Map(_) => ElementKind::Map,
            ElementContent::Video(_) => ElementKind::Video,
            ElementContent::Ticker(_) => ElementKind::Ticker,
            ElementContent::Countdown(_) => ElementKind::Countdown,
            ElementContent::Line(_) => ElementKind::Line,
            ElementContent::Svg(_) => ElementKind::Svg,
        }
    }

    /// An empty payload of the given kind.
    pub fn empty(kind: ElementKind) -> Self {
        match kind {
            ElementKind::Text => ElementContent::Text(TextContent::default()),
            ElementKind::Shape => ElementContent::Shape(ShapeContent::default()),
            ElementKind::Image => ElementContent::Image(ImageContent::default()),
            ElementKind::Icon => ElementContent::Icon(IconContent::default()),
            ElementKind::Chart => ElementContent::Chart(ChartContent::default()),
            ElementKind::Table => ElementContent::Table(TableContent::default()),
            ElementKind::Map => ElementContent::Map(MapContent::default()),
            ElementKind::Video => ElementContent::Video(VideoContent::default()),
            ElementKind::Ticker => ElementContent::Ticker(TickerContent::default()),
            ElementKind::Countdown => ElementContent::Countdown(CountdownContent::default()),
            ElementKind::Line => ElementContent::Line(LineContent::default()),
            ElementKind::Svg => ElementContent::Svg(SvgContent::default()),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TextContent {
    pub text: String,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ShapeContent {
    /// "rectangle", "circle", "ellipse", ...
    pub shape: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub corner_radius: Option<f64>,
}

impl Default for ShapeContent {
    fn default() -> Self {
        Self {
            shape: "rectangle".to_string(),
            fill: None,
            corner_radius: None,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct ImageContent {
    /// Image URL, or a placeholder token awaiting resolution.
    pub src: String,
    /// How the image fits its box: "cover", "contain", "fill".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct IconContent {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ChartContent {
    /// "bar", "line", "pie", ...
    pub chart_type: String,
    #[serde(skip_serializing_if = "Value::is_null")]
    pub data: Value,
}

impl Default for ChartContent {
    fn default() -> Self {
        Self {
            chart_type: "bar".to_string(),
            data: Value::Null,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TableContent {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct MapContent {
    /// `[longitude, latitude]`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub center: Option<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct VideoContent {
    pub src: String,
    #[serde(rename = "loop")]
    pub looped: bool,
    pub muted: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct TickerContent {
    pub items: Vec<String>,
    /// Scroll speed in pixels per second.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct CountdownContent {
    /// ISO-8601 instant or a duration such as "10:00".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct LineContent {
    pub points: Vec<[f64; 2]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stroke_width: Option<f64>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
#[serde(default)]
pub struct SvgContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub markup: Option<String>,
}

/// One element to create or update.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ElementSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Join key when `id` is absent.
    pub name: String,
    #[serde(flatten)]
    pub content: ElementContent,
    /// Pixels, unclamped.
    pub position_x: f64,
    pub position_y: f64,
    pub width: f64,
    pub height: f64,
    /// Degrees.
    #[serde(default)]
    pub rotation: f64,
    /// 0.0 - 1.0
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub styles: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<Binding>,
}

fn default_opacity() -> f64 {
    1.0
}

impl ElementSpec {
    /// An element at the origin with the kind's default size.
    pub fn new(name: impl Into<String>, content: ElementContent) -> Self {
        let (width, height) = content.kind().default_size();
        Self {
            id: None,
            name: name.into(),
            content,
            position_x: 0.0,
            position_y: 0.0,
            width,
            height,
            rotation: 0.0,
            opacity: 1.0,
            styles: Map::new(),
            binding: None,
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.content.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_aliases() {
        assert_eq!(ElementKind::parse_lenient("Rect"), Some(ElementKind::Shape));
        assert_eq!(ElementKind::parse_lenient("bar-chart"), Some(ElementKind::Chart));
        assert_eq!(ElementKind::parse_lenient("IMG"), Some(ElementKind::Image));
        assert_eq!(ElementKind::parse_lenient("hologram"), None);
        assert_eq!(ElementKind::shape_alias("circle"), Some("circle"));
        assert_eq!(ElementKind::shape_alias("text"), None);
    }

    #[test]
    fn test_every_kind_round_trips_through_its_name() {
        for kind in ElementKind::ALL {
            assert_eq!(ElementKind::parse_lenient(kind.as_str()), Some(kind));
            assert_eq!(ElementContent::empty(kind).kind(), kind);
        }
    }

    #[test]
    fn test_element_serializes_flat_tag() {
        let el = ElementSpec::new(
            "Clip",
            ElementContent::Video(VideoContent {
                src: "https://cdn.example.com/a.mp4".to_string(),
                looped: true,
                muted: false,
            }),
        );
        let value = serde_json::to_value(&el).unwrap();
        assert_eq!(value["element_type"], "video");
        assert_eq!(value["content"]["loop"], true);
        assert_eq!(value["width"], 640.0);
        assert!(value.get("styles").is_none());
        assert!(value.get("id").is_none());
    }
}
