//! Response decoding
//!
//! Boards answer with one line that is usually a JSON object
//! (`{"ok":true,"cmd":"PING","msg":"pong"}`), but debug prints can wrap it in
//! noise and some replies are plain text. Decoding never fails: a line that
//! yields no object is simply unstructured.

use serde_json::{Map, Value};

/// Decoded key/value payload of a reply
pub type Decoded = Map<String, Value>;

/// One reply line and its structured interpretation, if any
#[derive(Debug, Clone, PartialEq)]
pub struct Response {
    raw: String,
    decoded: Option<Decoded>,
}

impl Response {
    /// Build a response from a received line
    pub fn from_line(line: impl Into<String>) -> Self {
        let raw = line.into().trim().to_string();
        let decoded = decode_line(&raw);
        Self { raw, decoded }
    }

    /// The trimmed reply line exactly as received
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Structured payload, when the line carried a JSON object
    pub fn decoded(&self) -> Option<&Decoded> {
        self.decoded.as_ref()
    }

    /// Whether a structured payload was found
    pub fn is_structured(&self) -> bool {
        self.decoded.is_some()
    }

    /// The `ok` flag
    pub fn ok(&self) -> Option<bool> {
        self.field("ok").and_then(Value::as_bool)
    }

    /// The echoed command name
    pub fn cmd(&self) -> Option<&str> {
        self.field("cmd").and_then(Value::as_str)
    }

    /// Human-readable message
    pub fn msg(&self) -> Option<&str> {
        self.field("msg").and_then(Value::as_str)
    }

    /// Nested result values
    pub fn data(&self) -> Option<&Value> {
        self.field("data")
    }

    /// Any other field of the payload
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.decoded.as_ref().and_then(|d| d.get(key))
    }

    /// One-line `cmd | ok=<bool> | msg=<text>` summary of a structured reply
    pub fn summary(&self) -> Option<String> {
        let decoded = self.decoded.as_ref()?;
        let text = |key: &str| match decoded.get(key) {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };
        let ok = match decoded.get("ok") {
            Some(Value::Bool(b)) => b.to_string(),
            Some(Value::Null) | None => "none".to_string(),
            Some(other) => other.to_string(),
        };
        Some(format!("{} | ok={} | msg={}", text("cmd"), ok, text("msg")))
    }

    /// Pretty-printed payload for display
    pub fn pretty(&self) -> Option<String> {
        self.decoded
            .as_ref()
            .and_then(|d| serde_json::to_string_pretty(d).ok())
    }

    /// Split into decoded payload and raw text
    pub fn into_parts(self) -> (Option<Decoded>, String) {
        (self.decoded, self.raw)
    }
}

/// Extract a JSON object from a reply line.
///
/// Tries the whole line first, then the span from the first `{` to the last
/// `}`. A line that is valid JSON but not an object is not searched further.
/// Anything that is not an object yields `None`.
pub fn decode_line(line: &str) -> Option<Decoded> {
    let line = line.trim();
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(map)) => return Some(map),
        Ok(_) => return None,
        Err(_) => {}
    }

    let start = line.find('{')?;
    let end = line.rfind('}')?;
    if end <= start {
        return None;
    }
    parse_object(&line[start..=end])
}

fn parse_object(text: &str) -> Option<Decoded> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(map)) => Some(map),
        _ => None,
    }
}
