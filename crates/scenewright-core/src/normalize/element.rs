//! Builds typed [`ElementSpec`]s from loosely shaped element objects.

use super::coerce::{as_bool, as_string, finite, first, first_string, numeric, Numeric};
use scenewright_schema::{
    Binding, ChartContent, CountdownContent, ElementContent, ElementKind, ElementSpec,
    IconContent, ImageContent, LineContent, MapContent, ShapeContent, SvgContent, TableContent,
    TextContent, TickerContent, VideoContent,
};
use serde_json::{Map, Value};

const TYPE_KEYS: &[&str] = &["element_type", "type", "elementType", "kind"];
const NAME_KEYS: &[&str] = &["name", "element_name", "elementName"];
const ID_KEYS: &[&str] = &["id", "element_id", "elementId"];
const X_KEYS: &[&str] = &["position_x", "x", "left", "positionX"];
const Y_KEYS: &[&str] = &["position_y", "y", "top", "positionY"];

/// Element-level keys folded into `styles` when the payload puts them at the top.
const LOOSE_STYLE_KEYS: &[&str] = &[
    "color",
    "backgroundColor",
    "fontSize",
    "fontFamily",
    "fontWeight",
    "textAlign",
    "zIndex",
];

const IMAGE_SRC_KEYS: &[&str] = &["src", "url", "image", "imageUrl", "image_url"];

/// Builds an element, or `None` when its kind cannot be determined.
///
/// `ordinal` numbers generated names ("text 3") for elements with neither
/// name nor id.
pub(crate) fn parse_element(obj: &Map<String, Value>, ordinal: usize) -> Option<ElementSpec> {
    let type_name = first_string(obj, TYPE_KEYS);
    let source = Source::new(obj);
    let kind = type_name
        .as_deref()
        .and_then(ElementKind::parse_lenient)
        .or_else(|| infer_kind(&source))?;

    let shape_hint = type_name.as_deref().and_then(ElementKind::shape_alias);
    let content = build_content(kind, &source, shape_hint);

    let id = first_string(obj, ID_KEYS);
    let name = first_string(obj, NAME_KEYS)
        .map(|n| n.trim().to_string())
        .or_else(|| id.clone())
        .unwrap_or_else(|| format!("{kind} {ordinal}"));

    let position = obj.get("position").and_then(Value::as_object);
    let size = obj.get("size").and_then(Value::as_object);
    let (default_w, default_h) = kind.default_size();

    let position_x = coordinate(obj, position, X_KEYS, "x");
    let position_y = coordinate(obj, position, Y_KEYS, "y");
    let width = extent(obj, size, &["width", "w"], default_w);
    let height = extent(obj, size, &["height", "h"], default_h);

    let rotation = numeric(first(obj, &["rotation", "rotate", "angle"])).or(0.0);
    let opacity = match numeric(first(obj, &["opacity", "alpha"])) {
        Numeric::Percent(p) => p / 100.0,
        other => other.or(1.0),
    };

    Some(ElementSpec {
        id,
        name,
        content,
        position_x,
        position_y,
        width,
        height,
        rotation,
        opacity,
        styles: styles(obj),
        binding: binding(obj),
    })
}

fn coordinate(
    obj: &Map<String, Value>,
    nested: Option<&Map<String, Value>>,
    keys: &[&str],
    nested_key: &str,
) -> f64 {
    match (numeric(first(obj, keys)), nested) {
        (Numeric::Missing, Some(pos)) => numeric(pos.get(nested_key)).or(0.0),
        (n, _) => n.or(0.0),
    }
}

fn extent(
    obj: &Map<String, Value>,
    nested: Option<&Map<String, Value>>,
    keys: &[&str],
    default: f64,
) -> f64 {
    match (numeric(first(obj, keys)), nested) {
        (Numeric::Missing, Some(size)) => numeric(first(size, keys)).or(default),
        (n, _) => n.or(default),
    }
}

fn styles(obj: &Map<String, Value>) -> Map<String, Value> {
    let mut styles = first(obj, &["styles", "style"])
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();
    for key in LOOSE_STYLE_KEYS {
        if let Some(v) = obj.get(*key) {
            if !v.is_null() && !styles.contains_key(*key) {
                styles.insert((*key).to_string(), v.clone());
            }
        }
    }
    styles
}

fn binding(obj: &Map<String, Value>) -> Option<Binding> {
    match first(obj, &["binding", "bind", "dataField"])? {
        Value::String(field) if !field.trim().is_empty() => Some(Binding {
            field: field.trim().to_string(),
            binding_type: "text".to_string(),
        }),
        Value::Object(b) => {
            let field = first_string(b, &["field", "path", "key"])?;
            Some(Binding {
                field,
                binding_type: first_string(b, &["type", "as"]).unwrap_or_else(|| "text".to_string()),
            })
        }
        _ => None,
    }
}

/// Where content fields are read from: the `content` object first, then the
/// element itself.
struct Source<'a> {
    element: &'a Map<String, Value>,
    own: Option<&'a Map<String, Value>>,
    bare: Option<&'a str>,
}

impl<'a> Source<'a> {
    fn new(element: &'a Map<String, Value>) -> Self {
        let content = element.get("content");
        Self {
            element,
            own: content.and_then(Value::as_object),
            bare: content.and_then(Value::as_str),
        }
    }

    fn get(&self, keys: &[&str]) -> Option<&'a Value> {
        self.own
            .and_then(|own| first(own, keys))
            .or_else(|| first(self.element, keys))
    }

    /// Looks only inside `content`, for keys that mean something else on the element.
    fn own(&self, keys: &[&str]) -> Option<&'a Value> {
        self.own.and_then(|own| first(own, keys))
    }

    fn string(&self, keys: &[&str]) -> Option<String> {
        self.get(keys).and_then(as_string)
    }

    fn has(&self, keys: &[&str]) -> bool {
        self.get(keys).is_some()
    }
}

fn infer_kind(source: &Source<'_>) -> Option<ElementKind> {
    if source.bare.is_some() || source.has(&["text"]) {
        Some(ElementKind::Text)
    } else if source.has(IMAGE_SRC_KEYS) {
        Some(ElementKind::Image)
    } else if source.has(&["items", "headlines"]) {
        Some(ElementKind::Ticker)
    } else if source.has(&["points"]) {
        Some(ElementKind::Line)
    } else if source.has(&["markup", "svg"]) {
        Some(ElementKind::Svg)
    } else if source.has(&["columns", "rows"]) {
        Some(ElementKind::Table)
    } else {
        None
    }
}

fn build_content(kind: ElementKind, src: &Source<'_>, shape_hint: Option<&str>) -> ElementContent {
    let bare = src.bare.map(str::to_string);
    match kind {
        ElementKind::Text => ElementContent::Text(TextContent {
            text: bare
                .or_else(|| src.string(&["text", "value", "label"]))
                .unwrap_or_default(),
        }),
        ElementKind::Shape => ElementContent::Shape(ShapeContent {
            shape: src
                .own(&["shape"])
                .or_else(|| src.element.get("shape"))
                .and_then(as_string)
                .or_else(|| shape_hint.map(str::to_string))
                .unwrap_or_else(|| ShapeContent::default().shape),
            fill: src.string(&["fill", "backgroundColor", "color"]),
            corner_radius: finite(src.get(&[
                "corner_radius",
                "cornerRadius",
                "borderRadius",
                "radius",
            ])),
        }),
        ElementKind::Image => ElementContent::Image(ImageContent {
            src: bare.or_else(|| src.string(IMAGE_SRC_KEYS)).unwrap_or_default(),
            fit: src.string(&["fit", "objectFit", "object_fit"]),
        }),
        ElementKind::Icon => ElementContent::Icon(IconContent {
            name: bare
                .or_else(|| src.own(&["name", "icon"]).and_then(as_string))
                .or_else(|| src.element.get("icon").and_then(as_string))
                .unwrap_or_default(),
            library: src.string(&["library", "iconLibrary"]),
        }),
        ElementKind::Chart => ElementContent::Chart(ChartContent {
            chart_type: src
                .own(&["chart_type", "chartType", "type"])
                .or_else(|| first(src.element, &["chart_type", "chartType"]))
                .and_then(as_string)
                .unwrap_or_else(|| ChartContent::default().chart_type),
            data: src.get(&["data", "series"]).cloned().unwrap_or(Value::Null),
        }),
        ElementKind::Table => table(src),
        ElementKind::Map => ElementContent::Map(MapContent {
            center: src.get(&["center", "coordinates"]).and_then(lng_lat),
            zoom: finite(src.get(&["zoom"])),
            style: src
                .own(&["style", "mapStyle"])
                .or_else(|| src.element.get("mapStyle"))
                .and_then(as_string),
        }),
        ElementKind::Video => ElementContent::Video(VideoContent {
            src: bare.or_else(|| src.string(&["src", "url"])).unwrap_or_default(),
            looped: src.get(&["loop", "looped"]).and_then(as_bool).unwrap_or(false),
            muted: src.get(&["muted"]).and_then(as_bool).unwrap_or(false),
        }),
        ElementKind::Ticker => ElementContent::Ticker(TickerContent {
            items: src
                .get(&["items", "headlines"])
                .and_then(Value::as_array)
                .map(|items| items.iter().filter_map(ticker_item).collect())
                .or_else(|| bare.map(|t| vec![t]))
                .unwrap_or_default(),
            speed: finite(src.get(&["speed"])),
        }),
        ElementKind::Countdown => ElementContent::Countdown(CountdownContent {
            target: bare.or_else(|| src.string(&["target", "targetTime", "until", "duration"])),
            format: src.string(&["format"]),
        }),
        ElementKind::Line => ElementContent::Line(LineContent {
            points: src
                .get(&["points"])
                .and_then(Value::as_array)
                .map(|pts| pts.iter().filter_map(point).collect())
                .unwrap_or_default(),
            stroke_width: finite(src.get(&["stroke_width", "strokeWidth", "thickness"])),
        }),
        ElementKind::Svg => ElementContent::Svg(SvgContent {
            src: src.string(&["src", "url"]),
            markup: bare.or_else(|| src.string(&["markup", "svg", "svgContent"])),
        }),
    }
}

fn table(src: &Source<'_>) -> ElementContent {
    let columns: Vec<String> = src
        .get(&["columns", "headers"])
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .filter_map(|c| match c {
                    Value::Object(o) => first_string(o, &["label", "name", "key"]),
                    other => as_string(other),
                })
                .collect()
        })
        .unwrap_or_default();

    // Object rows are laid out in column order.
    let rows = src
        .get(&["rows", "data"])
        .and_then(Value::as_array)
        .map(|rows| {
            rows.iter()
                .filter_map(|row| match row {
                    Value::Array(cells) => Some(cells.clone()),
                    Value::Object(o) => Some(
                        columns
                            .iter()
                            .map(|c| o.get(c).cloned().unwrap_or(Value::Null))
                            .collect(),
                    ),
                    _ => None,
                })
                .collect()
        })
        .unwrap_or_default();

    ElementContent::Table(TableContent { columns, rows })
}

fn ticker_item(value: &Value) -> Option<String> {
    match value {
        Value::Object(o) => first_string(o, &["text", "title", "headline"]),
        other => as_string(other),
    }
}

fn pair(value: &Value, first_keys: &[&str], second_keys: &[&str]) -> Option<[f64; 2]> {
    match value {
        Value::Array(xs) if xs.len() >= 2 => Some([finite(xs.first())?, finite(xs.get(1))?]),
        Value::Object(o) => Some([finite(first(o, first_keys))?, finite(first(o, second_keys))?]),
        _ => None,
    }
}

fn point(value: &Value) -> Option<[f64; 2]> {
    pair(value, &["x"], &["y"])
}

fn lng_lat(value: &Value) -> Option<[f64; 2]> {
    pair(value, &["lng", "lon", "longitude"], &["lat", "latitude"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(v: Value) -> Option<ElementSpec> {
        parse_element(v.as_object().unwrap(), 1)
    }

    #[test]
    fn test_simplified_keys() {
        let el = parse(json!({
            "name": "Title", "type": "heading", "x": "100px", "y": 40,
            "w": "50%", "text": "Hello", "color": "#fff"
        }))
        .unwrap();
        assert_eq!(el.kind(), ElementKind::Text);
        assert_eq!(el.position_x, 100.0);
        assert_eq!(el.position_y, 40.0);
        assert_eq!(el.width, 400.0);
        assert_eq!(el.height, 60.0);
        assert_eq!(el.styles["color"], "#fff");
        assert_eq!(el.content, ElementContent::Text(TextContent { text: "Hello".into() }));
    }

    #[test]
    fn test_shape_alias_sets_shape() {
        let el = parse(json!({"name": "Dot", "type": "circle", "fill": "red"})).unwrap();
        match el.content {
            ElementContent::Shape(s) => {
                assert_eq!(s.shape, "circle");
                assert_eq!(s.fill.as_deref(), Some("red"));
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_kind_inference_and_names() {
        let img = parse(json!({"url": "https://x/y.png"})).unwrap();
        assert_eq!(img.kind(), ElementKind::Image);
        assert_eq!(img.name, "image 1");

        let by_id = parse(json!({"id": "t-1", "content": "Hi"})).unwrap();
        assert_eq!(by_id.kind(), ElementKind::Text);
        assert_eq!(by_id.name, "t-1");

        assert!(parse(json!({"name": "Mystery", "type": "hologram"})).is_none());
    }

    #[test]
    fn test_invalid_numbers_become_nan() {
        let el = parse(json!({"name": "A", "type": "text", "x": "left-ish", "opacity": "50%"})).unwrap();
        assert!(el.position_x.is_nan());
        assert_eq!(el.opacity, 0.5);
    }

    #[test]
    fn test_table_object_rows() {
        let el = parse(json!({
            "name": "Standings", "type": "table",
            "content": {"columns": ["Team", "W"], "rows": [{"Team": "KC", "W": 11}, ["BUF", 10]]}
        }))
        .unwrap();
        match el.content {
            ElementContent::Table(t) => {
                assert_eq!(t.rows[0], vec![json!("KC"), json!(11)]);
                assert_eq!(t.rows[1], vec![json!("BUF"), json!(10)]);
            }
            other => panic!("unexpected content {other:?}"),
        }
    }

    #[test]
    fn test_binding() {
        let el = parse(json!({"name": "Score", "type": "text", "binding": {"field": "home.score", "type": "number"}}))
            .unwrap();
        let binding = el.binding.unwrap();
        assert_eq!(binding.field, "home.score");
        assert_eq!(binding.binding_type, "number");
    }
}
