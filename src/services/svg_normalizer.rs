// src/services/svg_normalizer.rs
//! Canonical shape for accepted icons: a `viewBox` on the root element and no
//! explicit `width`/`height`, so every icon scales with its container.

use crate::models::ICON_VIEWBOX;
use log::debug;
use quick_xml::events::{BytesStart, Event};
use quick_xml::{Reader, Writer};

type RootAttributes = Vec<(Vec<u8>, Vec<u8>)>;

struct Rewritten {
    root_local_name: Vec<u8>,
    markup: String,
}

pub struct SvgNormalizer;

impl SvgNormalizer {
    /// Adds the default `viewBox` when missing and strips `width`/`height`.
    ///
    /// Returns the input unchanged when it cannot be parsed.
    pub fn normalize(svg: &str) -> String {
        match rewrite_root(svg, canonicalize_root) {
            Ok(rewritten) => rewritten.markup,
            Err(reason) => {
                debug!("Leaving SVG untouched ({})", reason);
                svg.to_string()
            }
        }
    }

    /// True when the markup is well-formed XML whose root element is `<svg>`.
    pub fn is_valid(svg: &str) -> bool {
        rewrite_root(svg, |_| {})
            .map(|rewritten| rewritten.root_local_name == b"svg")
            .unwrap_or(false)
    }
}

fn canonicalize_root(attributes: &mut RootAttributes) {
    if !attributes.iter().any(|(key, _)| key == b"viewBox") {
        attributes.push((b"viewBox".to_vec(), ICON_VIEWBOX.as_bytes().to_vec()));
    }
    attributes.retain(|(key, _)| key != b"width" && key != b"height");
}

fn escape_double_quotes(value: &[u8]) -> Vec<u8> {
    let mut escaped = Vec::with_capacity(value.len());
    for &byte in value {
        if byte == b'"' {
            escaped.extend_from_slice(b"&quot;");
        } else {
            escaped.push(byte);
        }
    }
    escaped
}

fn check_attributes(start: &BytesStart<'_>) -> Result<(), String> {
    for attribute in start.attributes() {
        attribute.map_err(|e| e.to_string())?;
    }
    Ok(())
}

fn rebuild_root(
    start: &BytesStart<'_>,
    edit: &impl Fn(&mut RootAttributes),
) -> Result<(Vec<u8>, BytesStart<'static>), String> {
    let mut attributes = RootAttributes::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(|e| e.to_string())?;
        attributes.push((attribute.key.as_ref().to_vec(), attribute.value.into_owned()));
    }
    edit(&mut attributes);

    let name = String::from_utf8_lossy(start.name().as_ref()).into_owned();
    let mut root = BytesStart::new(name);
    for (key, value) in &attributes {
        let value = escape_double_quotes(value);
        root.push_attribute((key.as_slice(), value.as_slice()));
    }
    Ok((start.local_name().as_ref().to_vec(), root))
}

/// Re-serializes the root element subtree, letting `edit` rewrite the root attributes.
///
/// Anything outside the root (prolog, doctype, comments) is dropped.
fn rewrite_root(svg: &str, edit: impl Fn(&mut RootAttributes)) -> Result<Rewritten, String> {
    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Vec::new());
    let mut depth = 0usize;
    let mut root_local_name: Option<Vec<u8>> = None;

    loop {
        let event = reader.read_event().map_err(|e| e.to_string())?;
        match &event {
            Event::Eof => break,
            Event::Start(start) | Event::Empty(start) => {
                check_attributes(start)?;
                if depth == 0 && root_local_name.is_some() {
                    return Err("content after the root element".to_string());
                }
            }
            Event::End(_) if depth == 0 => {
                return Err("closing tag without an open element".to_string());
            }
            Event::Text(text) if depth == 0 => {
                if text.iter().all(|b| b.is_ascii_whitespace()) {
                    continue;
                }
                return Err("text outside the root element".to_string());
            }
            Event::CData(_) if depth == 0 => {
                return Err("character data outside the root element".to_string());
            }
            Event::Decl(_) | Event::DocType(_) if depth > 0 => {
                return Err("declaration inside the document".to_string());
            }
            Event::Comment(_) | Event::PI(_) | Event::Decl(_) | Event::DocType(_) if depth == 0 => {
                continue;
            }
            _ => {}
        }

        let event = match event {
            Event::Start(start) if depth == 0 => {
                let (local_name, root) = rebuild_root(&start, &edit)?;
                root_local_name = Some(local_name);
                Event::Start(root)
            }
            Event::Empty(start) if depth == 0 => {
                let (local_name, root) = rebuild_root(&start, &edit)?;
                root_local_name = Some(local_name);
                Event::Empty(root)
            }
            other => other,
        };
        match &event {
            Event::Start(_) => depth += 1,
            Event::End(_) => depth -= 1,
            _ => {}
        }
        writer.write_event(event).map_err(|e| e.to_string())?;
    }

    if depth != 0 {
        return Err("unclosed element at end of input".to_string());
    }
    let root_local_name = root_local_name.ok_or_else(|| "no root element".to_string())?;
    let markup = String::from_utf8(writer.into_inner()).map_err(|e| e.to_string())?;

    Ok(Rewritten {
        root_local_name,
        markup,
    })
}
