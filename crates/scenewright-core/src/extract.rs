//! Pulls a JSON payload out of free-form model output.
//!
//! Candidates are fenced blocks first, then bare `{...}` spans, both in
//! document order. Every candidate is parsed strictly before any is repaired,
//! so a well-formed later block beats a truncated earlier one.

use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Upper bound on back-off steps while repairing one candidate.
const MAX_BACKOFF_ATTEMPTS: usize = 64;

/// Extracts the first usable JSON object from `text`.
///
/// A top-level array of objects is wrapped as `{"elements": [...]}`.
/// Returns `None` when nothing can be recovered; never panics.
#[instrument(level = "debug", skip(text), fields(len = text.len()))]
pub fn extract(text: &str) -> Option<Map<String, Value>> {
    let candidates = candidates(text);
    debug!(count = candidates.len(), "collected payload candidates");

    for candidate in &candidates {
        if let Ok(value) = serde_json::from_str::<Value>(candidate) {
            if let Some(obj) = into_payload(value) {
                return Some(obj);
            }
        }
    }

    for candidate in &candidates {
        if let Some(obj) = repair(candidate) {
            debug!("recovered payload by repair");
            return Some(obj);
        }
    }

    debug!("no payload recovered");
    None
}

fn into_payload(value: Value) -> Option<Map<String, Value>> {
    match value {
        Value::Object(obj) => Some(obj),
        Value::Array(items) if items.iter().any(Value::is_object) => {
            let mut obj = Map::new();
            obj.insert("elements".to_string(), Value::Array(items));
            Some(obj)
        }
        _ => None,
    }
}

/// Collects candidate payload slices: fenced blocks, then bare brace spans.
fn candidates(text: &str) -> Vec<&str> {
    fn push<'a>(s: &'a str, out: &mut Vec<&'a str>) {
        let s = s.trim();
        if !s.is_empty() && !out.contains(&s) {
            out.push(s);
        }
    }

    let mut out = Vec::new();
    for block in fenced_blocks(text) {
        push(block, &mut out);
    }
    for span in brace_spans(text) {
        push(span, &mut out);
    }
    out
}

/// Bodies of ``` fences. An unterminated fence runs to the end of the text.
fn fenced_blocks(text: &str) -> Vec<&str> {
    let mut blocks = Vec::new();
    let mut rest = text;

    while let Some(open) = rest.find("```") {
        let after = &rest[open + 3..];
        // Skip the info string ("json", "JSON", ...) up to the end of the line.
        let body_start = match after.find('\n') {
            Some(nl) if after[..nl].trim().chars().all(|c| c.is_ascii_alphanumeric()) => nl + 1,
            _ => 0,
        };
        let body = &after[body_start..];
        match body.find("```") {
            Some(close) => {
                blocks.push(&body[..close]);
                rest = &body[close + 3..];
            }
            None => {
                blocks.push(body);
                break;
            }
        }
    }
    blocks
}

/// Bare top-level `{...}` spans. Quotes only matter once inside a span.
fn brace_spans(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'{' {
            i += 1;
            continue;
        }
        let start = i;
        let mut depth = 0usize;
        let mut in_string = false;
        let mut escaped = false;
        let mut end = bytes.len();

        while i < bytes.len() {
            let b = bytes[i];
            if in_string {
                if escaped {
                    escaped = false;
                } else if b == b'\\' {
                    escaped = true;
                } else if b == b'"' {
                    in_string = false;
                }
            } else {
                match b {
                    b'"' => in_string = true,
                    b'{' => depth += 1,
                    b'}' => {
                        depth = depth.saturating_sub(1);
                        if depth == 0 {
                            end = i + 1;
                            break;
                        }
                    }
                    _ => {}
                }
            }
            i += 1;
        }

        spans.push(&text[start..end]);
        i = end;
    }
    spans
}

/// Best-effort repair of a truncated or sloppy candidate.
///
/// Closes the structure as-is first, then backs off to earlier separators
/// until something parses into a non-empty payload.
fn repair(src: &str) -> Option<Map<String, Value>> {
    let mut end = src.len();

    for _ in 0..MAX_BACKOFF_ATTEMPTS {
        let closed = close_structure(&src[..end]);
        if let Ok(value) = serde_json::from_str::<Value>(&closed) {
            match into_payload(value) {
                Some(obj) if !obj.is_empty() => return Some(obj),
                _ => {}
            }
        }

        end = previous_cut(src, end)?;
    }
    None
}

/// The largest cut point below `end`: just before a `,` or just after a `{`/`[`.
fn previous_cut(src: &str, end: usize) -> Option<usize> {
    let mut best = None;
    scan(&src[..end], |pos, b, in_string| {
        if in_string {
            return;
        }
        let cut = match b {
            b',' => pos,
            b'{' | b'[' => pos + 1,
            _ => return,
        };
        if cut < end {
            best = Some(cut);
        }
    });
    best
}

/// Walks `src` byte by byte, reporting whether each byte sits inside a string.
fn scan(src: &str, mut visit: impl FnMut(usize, u8, bool)) -> (bool, bool) {
    let mut in_string = false;
    let mut escaped = false;
    for (pos, &b) in src.as_bytes().iter().enumerate() {
        if in_string {
            if escaped {
                escaped = false;
            } else if b == b'\\' {
                escaped = true;
            } else if b == b'"' {
                in_string = false;
                visit(pos, b, false);
                continue;
            }
            visit(pos, b, true);
        } else {
            if b == b'"' {
                in_string = true;
            }
            visit(pos, b, false);
        }
    }
    (in_string, escaped)
}

fn close_structure(src: &str) -> String {
    let mut stack: Vec<u8> = Vec::new();
    let (in_string, escaped) = scan(src, |_, b, in_string| {
        if in_string {
            return;
        }
        match b {
            b'{' => stack.push(b'}'),
            b'[' => stack.push(b']'),
            b'}' | b']' => {
                if stack.last() == Some(&b) {
                    stack.pop();
                }
            }
            _ => {}
        }
    });

    let mut out = src.to_string();
    if in_string {
        if escaped {
            out.pop();
        }
        out.push('"');
    }

    loop {
        let trimmed_len = out.trim_end().len();
        out.truncate(trimmed_len);
        if out.ends_with(',') {
            out.pop();
            continue;
        }
        if out.ends_with(':') {
            out.push_str(" null");
        }
        break;
    }

    while let Some(closer) = stack.pop() {
        out.push(closer as char);
    }
    drop_trailing_commas(&out)
}

/// Removes commas that directly precede a closing bracket.
fn drop_trailing_commas(src: &str) -> String {
    let bytes = src.as_bytes();
    let mut skip = Vec::new();
    scan(src, |pos, b, in_string| {
        if in_string || b != b',' {
            return;
        }
        let next = bytes[pos + 1..].iter().find(|c| !c.is_ascii_whitespace());
        if matches!(next, Some(b'}') | Some(b']')) {
            skip.push(pos);
        }
    });

    if skip.is_empty() {
        return src.to_string();
    }
    src.char_indices()
        .filter(|(i, _)| !skip.contains(i))
        .map(|(_, c)| c)
        .collect()
}
