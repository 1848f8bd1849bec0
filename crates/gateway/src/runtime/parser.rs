//! Model output parser for the text-marker tool protocol.
//!
//! A raw completion carries up to three marker pairs:
//!
//! - `<thinking>…</thinking>` — private reasoning, stripped before
//!   anything is shown to the user;
//! - `<call>name(key=value, …)</call>` — tool invocations, keyword
//!   arguments in Python-style literal syntax;
//! - `<response>…</response>` — the final user-facing reply.
//!
//! Argument values parse to JSON values (strings, numbers, booleans,
//! null, nested lists/maps), falling back to the raw string when strict
//! literal parsing fails. A call whose argument text cannot be split at
//! all is dropped with a warning — never fatal to the other calls.

use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

use wf_domain::chat::{ParsedResponse, ToolCall};

use super::truncate_str;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Marker regexes
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn compile_regex(pattern: &str, label: &str) -> Option<Regex> {
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::error!(label, error = %e, "failed to compile parser regex");
            None
        }
    }
}

fn thinking_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile_regex(r"(?is)<thinking>(.*?)</thinking>", "thinking"))
        .as_ref()
}

fn call_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile_regex(r"(?is)<call>(.*?)</call>", "call"))
        .as_ref()
}

fn response_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| compile_regex(r"(?is)<response>(.*?)</response>", "response"))
        .as_ref()
}

fn call_expr_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        compile_regex(
            r"(?s)\A\s*([A-Za-z_][A-Za-z0-9_]*)\s*\((.*)\)\s*\z",
            "call_expr",
        )
    })
    .as_ref()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// parse — raw completion → ParsedResponse
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Classify one raw model completion.
pub fn parse(raw: &str) -> ParsedResponse {
    // ── 1. Extract and strip thinking blocks ──────────────────────
    let mut thinking_parts: Vec<String> = Vec::new();
    let cleaned = match thinking_regex() {
        Some(re) => {
            for cap in re.captures_iter(raw) {
                if let Some(m) = cap.get(1) {
                    let inner = m.as_str().trim();
                    if !inner.is_empty() {
                        thinking_parts.push(inner.to_owned());
                    }
                }
            }
            re.replace_all(raw, "").into_owned()
        }
        None => raw.to_owned(),
    };
    let cleaned = cleaned.trim().to_owned();
    let thinking = if thinking_parts.is_empty() {
        None
    } else {
        Some(thinking_parts.join("\n"))
    };

    // ── 2. Tool-call expressions ──────────────────────────────────
    let mut tool_calls: Vec<ToolCall> = Vec::new();
    if let Some(re) = call_regex() {
        for cap in re.captures_iter(&cleaned) {
            let Some(expr) = cap.get(1) else { continue };
            match parse_call_expr(expr.as_str()) {
                Ok(call) => tool_calls.push(call),
                Err(reason) => {
                    tracing::warn!(
                        expr = %truncate_str(expr.as_str(), 120),
                        reason = %reason,
                        "dropping unparseable tool call"
                    );
                }
            }
        }
    }

    if !tool_calls.is_empty() {
        return ParsedResponse::ToolCall {
            content: cleaned,
            tool_calls,
            thinking,
        };
    }

    // ── 3. Final-response block ───────────────────────────────────
    if let Some(re) = response_regex() {
        if let Some(m) = re.captures(&cleaned).and_then(|cap| cap.get(1)) {
            return ParsedResponse::FinalResponse {
                content: m.as_str().trim().to_owned(),
                thinking,
            };
        }
    }

    // ── 4. Bare text ──────────────────────────────────────────────
    ParsedResponse::FinalResponse {
        content: strip_marker_fragments(&cleaned),
        thinking,
    }
}

/// Remove leftover marker fragments and a conventional speaker label from
/// text the model produced without a proper response block.
fn strip_marker_fragments(text: &str) -> String {
    let mut out = text.to_owned();
    for frag in ["<call>", "</call>", "<response>", "</response>"] {
        out = out.replace(frag, "");
    }
    let out = out.trim();
    let out = out.strip_prefix("Assistant:").map(str::trim).unwrap_or(out);
    out.to_owned()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Call expressions
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_call_expr(expr: &str) -> Result<ToolCall, String> {
    let re = call_expr_regex().ok_or("call expression regex unavailable")?;
    let caps = re
        .captures(expr)
        .ok_or("not a name(key=value, ...) expression")?;
    let name = caps[1].to_owned();
    let args_text = caps.get(2).map(|m| m.as_str()).unwrap_or("");

    let mut args = Map::new();
    for piece in split_top_level(args_text, ',')? {
        let piece = piece.trim();
        if piece.is_empty() {
            continue;
        }
        let (key, value_text) = split_key_value(piece)?;
        args.insert(key.to_owned(), parse_literal(value_text));
    }

    Ok(ToolCall {
        name,
        args,
        raw_text: expr.trim().to_owned(),
    })
}

/// Split `key=value`, honoring quotes so `=` inside a string stays put.
fn split_key_value(piece: &str) -> Result<(&str, &str), String> {
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in piece.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '=' => {
                let key = piece[..i].trim();
                if key.is_empty() || !key.chars().all(|k| k.is_ascii_alphanumeric() || k == '_')
                {
                    return Err(format!("bad argument name '{key}'"));
                }
                return Ok((key, piece[i + 1..].trim()));
            }
            _ => {}
        }
    }
    Err(format!("argument '{}' has no '='", truncate_str(piece, 40)))
}

/// Split on `sep` at nesting depth zero, outside quotes. Errors on
/// unbalanced delimiters or an unterminated quote — the whole call is
/// then dropped by the caller.
fn split_top_level(s: &str, sep: char) -> Result<Vec<&str>, String> {
    let mut parts = Vec::new();
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth = depth
                    .checked_sub(1)
                    .ok_or_else(|| "unbalanced closing delimiter".to_string())?;
            }
            c if c == sep && depth == 0 => {
                parts.push(&s[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }

    if quote.is_some() {
        return Err("unterminated quote".into());
    }
    if depth != 0 {
        return Err("unbalanced delimiter".into());
    }
    parts.push(&s[start..]);
    Ok(parts)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Literal values
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Parse one argument value. Accepts quoted strings, integers, floats,
/// booleans, null, and nested list/map literals; anything else falls
/// back to the raw trimmed string.
fn parse_literal(s: &str) -> Value {
    let t = s.trim();

    if let Some(inner) = strip_quotes(t) {
        return Value::String(unescape(inner));
    }

    match t {
        "true" | "True" => return Value::Bool(true),
        "false" | "False" => return Value::Bool(false),
        "null" | "None" => return Value::Null,
        _ => {}
    }

    if let Ok(n) = t.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = t.parse::<f64>() {
        if let Some(n) = Number::from_f64(f) {
            return Value::Number(n);
        }
    }

    if t.starts_with('[') && t.ends_with(']') {
        if let Ok(parts) = split_top_level(&t[1..t.len() - 1], ',') {
            let items: Vec<Value> = parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .map(parse_literal)
                .collect();
            return Value::Array(items);
        }
    }

    if t.starts_with('{') && t.ends_with('}') {
        if let Some(map) = parse_map_literal(&t[1..t.len() - 1]) {
            return Value::Object(map);
        }
    }

    Value::String(t.to_owned())
}

fn parse_map_literal(inner: &str) -> Option<Map<String, Value>> {
    let parts = split_top_level(inner, ',').ok()?;
    let mut map = Map::new();
    for part in parts {
        let part = part.trim();
        if part.is_empty() {
            continue;
        }
        let (key_text, value_text) = split_once_top_level(part, ':')?;
        let key = match strip_quotes(key_text.trim()) {
            Some(inner) => unescape(inner),
            None => key_text.trim().to_owned(),
        };
        map.insert(key, parse_literal(value_text));
    }
    Some(map)
}

/// Split on the first `sep` at depth zero, outside quotes.
fn split_once_top_level(s: &str, sep: char) -> Option<(&str, &str)> {
    let mut depth: usize = 0;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth = depth.checked_sub(1)?,
            c if c == sep && depth == 0 => return Some((&s[..i], &s[i + c.len_utf8()..])),
            _ => {}
        }
    }
    None
}

/// `'x'` / `"x"` → `x`; anything else → `None`.
fn strip_quotes(t: &str) -> Option<&str> {
    let bytes = t.as_bytes();
    if t.len() >= 2 && (bytes[0] == b'\'' || bytes[0] == b'"') && bytes[t.len() - 1] == bytes[0] {
        Some(&t[1..t.len() - 1])
    } else {
        None
    }
}

fn unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
