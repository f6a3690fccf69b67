//! Prompt template rendering.
//!
//! Templates use two kinds of tags:
//!
//! - `{{name}}` substitutes the field `name` of the input object. Strings are
//!   inserted verbatim. A list of `{role, content}` objects becomes a
//!   transcript with one `role: content` line per entry. Line breaks inside
//!   `content` are written as a literal `\n`.
//! - `{{#name}} ... {{/name}}` wraps a section that is emitted only when
//!   `name` is present and non-empty. A newline directly after either
//!   section tag is consumed so omitted sections leave no blank lines.
//!
//! Rendering is a single pass over the parsed template. Substituted values
//! are never scanned for tags.

use crate::error::{Error, Result};
use regex::Regex;
use serde_json::Value;

const TAG_PATTERN: &str = r"\{\{([#/]?)(\w+)\}\}";

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Text(String),
    Field(String),
    Section { name: String, body: Vec<Segment> },
}

/// A parsed prompt template.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    source: String,
    segments: Vec<Segment>,
}

impl PromptTemplate {
    /// Parse a template, checking that every section is closed.
    pub fn parse(source: &str) -> Result<Self> {
        let tag = Regex::new(TAG_PATTERN).map_err(|e| Error::Template(e.to_string()))?;

        // Stack of open sections; the bottom frame is the template root.
        let mut frames: Vec<(Option<String>, Vec<Segment>)> = vec![(None, Vec::new())];
        let mut cursor = 0;

        for caps in tag.captures_iter(source) {
            let (Some(whole), Some(kind), Some(name)) = (caps.get(0), caps.get(1), caps.get(2))
            else {
                continue;
            };

            let current = frames
                .last_mut()
                .ok_or_else(|| Error::Template("section stack underflow".into()))?;
            if whole.start() > cursor {
                current
                    .1
                    .push(Segment::Text(source[cursor..whole.start()].to_string()));
            }
            cursor = whole.end();

            let name = name.as_str().to_string();
            match kind.as_str() {
                "#" => {
                    frames.push((Some(name), Vec::new()));
                    cursor = skip_newline(source, cursor);
                }
                "/" => {
                    let (open, body) = match frames.pop() {
                        Some((Some(open), body)) => (open, body),
                        _ => {
                            return Err(Error::Template(format!(
                                "section '{}' closed but never opened",
                                name
                            )))
                        }
                    };
                    if open != name {
                        return Err(Error::Template(format!(
                            "section '{}' closed by '{}'",
                            open, name
                        )));
                    }
                    frames
                        .last_mut()
                        .ok_or_else(|| Error::Template("section stack underflow".into()))?
                        .1
                        .push(Segment::Section { name: open, body });
                    cursor = skip_newline(source, cursor);
                }
                _ => current.1.push(Segment::Field(name)),
            }
        }

        if frames.len() > 1 {
            let open: Vec<_> = frames.iter().filter_map(|(name, _)| name.clone()).collect();
            return Err(Error::Template(format!(
                "unclosed section(s): {}",
                open.join(", ")
            )));
        }

        let (_, mut segments) = frames
            .pop()
            .ok_or_else(|| Error::Template("section stack underflow".into()))?;
        if cursor < source.len() {
            segments.push(Segment::Text(source[cursor..].to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// The unparsed template text.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Render against an input object. Missing fields render as empty.
    pub fn render(&self, values: &Value) -> String {
        let mut out = String::with_capacity(self.source.len());
        render_segments(&self.segments, values, &mut out);
        out
    }
}

fn skip_newline(source: &str, cursor: usize) -> usize {
    if source[cursor..].starts_with("\r\n") {
        cursor + 2
    } else if source[cursor..].starts_with('\n') {
        cursor + 1
    } else {
        cursor
    }
}

fn render_segments(segments: &[Segment], values: &Value, out: &mut String) {
    for segment in segments {
        match segment {
            Segment::Text(text) => out.push_str(text),
            Segment::Field(name) => {
                if let Some(value) = values.get(name) {
                    out.push_str(&format_value(value));
                }
            }
            Segment::Section { name, body } => {
                if values.get(name).is_some_and(is_present) {
                    render_segments(body, values, out);
                }
            }
        }
    }
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
        Value::Number(_) => true,
    }
}

fn format_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(format_line)
            .collect::<Vec<_>>()
            .join("\n"),
        other => other.to_string(),
    }
}

/// One transcript line per list entry.
fn format_line(item: &Value) -> String {
    match (
        item.get("role").and_then(Value::as_str),
        item.get("content").and_then(Value::as_str),
    ) {
        (Some(role), Some(content)) => format!("{}: {}", role, escape_line_breaks(content)),
        _ => format_value(item),
    }
}

/// Keep a turn on a single transcript line.
pub(crate) fn escape_line_breaks(content: &str) -> String {
    content
        .replace("\r\n", "\\n")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}
