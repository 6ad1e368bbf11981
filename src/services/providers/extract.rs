// src/services/providers/extract.rs
//! Pulls JSON and SVG payloads out of free-form model output.
//!
//! Models wrap their answers in prose or code fences often enough that every
//! adapter goes through these helpers instead of parsing the text directly.

use crate::errors::IconError;
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

static JSON_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)```(?:json)?[ \t]*\r?\n(.*?)```").expect("valid fence regex")
});
static SVG_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<svg\b.*?</svg>").expect("valid svg regex"));
static SVG_OPEN_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^<svg\b[^>]*>").expect("valid svg tag regex"));
static UNQUOTED_VIEWBOX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\s)viewBox=([0-9.\-]+(?: +[0-9.\-]+)*)").expect("valid viewBox regex")
});

const SVG_NAMESPACE: &str = "http://www.w3.org/2000/svg";

/// Candidate JSON texts in priority order: fenced blocks, then the outermost `open..close` span.
fn json_candidates(text: &str, open: char, close: char) -> Vec<&str> {
    let mut candidates: Vec<&str> = JSON_FENCE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect();
    if let (Some(start), Some(end)) = (text.find(open), text.rfind(close)) {
        if start < end {
            candidates.push(&text[start..=end]);
        }
    }
    candidates
}

/// First JSON object found in the text.
pub fn extract_json_object(text: &str) -> Option<Value> {
    json_candidates(text, '{', '}')
        .into_iter()
        .filter_map(|candidate| serde_json::from_str::<Value>(candidate).ok())
        .find(Value::is_object)
}

/// First non-empty JSON array found in the text, keeping its string items.
pub fn extract_string_array(text: &str) -> Option<Vec<String>> {
    json_candidates(text, '[', ']')
        .into_iter()
        .filter_map(|candidate| serde_json::from_str::<Vec<Value>>(candidate).ok())
        .map(|items| {
            items
                .into_iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect::<Vec<_>>()
        })
        .find(|items| !items.is_empty())
}

/// Every `<svg>...</svg>` block in the text, in order.
pub fn extract_svg_blocks(text: &str) -> Vec<String> {
    SVG_BLOCK
        .find_iter(text)
        .map(|m| m.as_str().trim().to_string())
        .filter(|svg| !svg.is_empty())
        .collect()
}

/// Best-effort repair: isolates the `<svg>` element, declares the SVG namespace
/// and quotes a bare `viewBox` value.
pub fn sanitize_svg(svg: &str) -> Option<String> {
    let block = SVG_BLOCK.find(svg)?.as_str().trim();
    let mut cleaned = block.to_string();

    let declares_namespace = SVG_OPEN_TAG
        .find(&cleaned)
        .map(|tag| tag.as_str().contains("xmlns="))
        .unwrap_or(false);
    if !declares_namespace {
        cleaned = cleaned.replacen("<svg", &format!("<svg xmlns=\"{}\"", SVG_NAMESPACE), 1);
    }

    Some(
        UNQUOTED_VIEWBOX
            .replace_all(&cleaned, "${1}viewBox=\"${2}\"")
            .into_owned(),
    )
}

pub fn parse_analysis_text(text: &str, vendor: &str) -> Result<Value, IconError> {
    extract_json_object(text).ok_or_else(|| {
        IconError::Analysis(format!("Failed to parse {} response as JSON", vendor))
    })
}

/// Strict parsing: the text must contain a non-empty JSON array of strings.
pub fn parse_svg_array(text: &str, vendor: &str) -> Result<Vec<String>, IconError> {
    extract_string_array(text).ok_or_else(|| {
        IconError::Generation(format!("Failed to parse {} response as SVG array", vendor))
    })
}

/// Lenient parsing: sanitizes array items and, when no usable array exists,
/// falls back to raw `<svg>` blocks anywhere in the text.
pub fn parse_svg_array_lenient(text: &str, vendor: &str) -> Result<Vec<String>, IconError> {
    if let Some(items) = extract_string_array(text) {
        let sanitized: Vec<String> = items.iter().filter_map(|svg| sanitize_svg(svg)).collect();
        if !sanitized.is_empty() {
            return Ok(sanitized);
        }
    }

    let sanitized: Vec<String> = extract_svg_blocks(text)
        .iter()
        .filter_map(|svg| sanitize_svg(svg))
        .collect();
    if sanitized.is_empty() {
        return Err(IconError::Generation(format!(
            "Failed to parse {} response as SVG array",
            vendor
        )));
    }
    warn!(
        "{} returned no usable JSON array, recovered {} raw SVG block(s)",
        vendor,
        sanitized.len()
    );
    Ok(sanitized)
}
