//! SVG optimizer port plus the default `quick-xml` based minifier.
//!
//! The dispatcher only knows `SvgOptimizer`: markup in, smaller markup out.
//! `MinifyEngine` is a conservative, single-pass minifier:
//! - drops the XML declaration, doctype, processing instructions and comments
//! - drops `<metadata>`, `<title>`, `<desc>` and editor-namespace elements
//! - drops editor-namespace and empty attributes
//! - rounds numbers in geometry attributes and path data (arc flags kept intact)
//! - drops whitespace-only text outside text content elements
//! - collapses childless elements into self-closing tags

use std::{borrow::Cow, sync::OnceLock};

use async_trait::async_trait;
use quick_xml::{
    events::{attributes::Attribute, BytesStart, Event},
    Reader, Writer,
};
use regex::Regex;

use crate::{errors::OptimizeError, validate::is_svg_markup};

/// Black-box minification engine.
///
/// Implementations must not keep per-call mutable state: the dispatcher calls
/// `optimize` concurrently for unrelated conversations.
#[async_trait]
pub trait SvgOptimizer: Send + Sync {
    async fn optimize(&self, svg: String) -> Result<String, OptimizeError>;
}

const REMOVED_ELEMENTS: &[&[u8]] = &[b"metadata", b"title", b"desc"];
const EDITOR_PREFIXES: &[&[u8]] = &[b"inkscape", b"sodipodi", b"sketch", b"serif"];
const TEXT_ELEMENTS: &[&[u8]] = &[b"text", b"tspan", b"textPath"];
const NUMERIC_ATTRIBUTES: &[&[u8]] = &[
    b"points",
    b"viewBox",
    b"transform",
    b"gradientTransform",
    b"patternTransform",
    b"x",
    b"y",
    b"x1",
    b"y1",
    b"x2",
    b"y2",
    b"cx",
    b"cy",
    b"r",
    b"rx",
    b"ry",
    b"fx",
    b"fy",
    b"dx",
    b"dy",
    b"width",
    b"height",
    b"offset",
    b"opacity",
    b"fill-opacity",
    b"stroke-opacity",
    b"stroke-width",
    b"stroke-miterlimit",
    b"stroke-dashoffset",
    b"stroke-dasharray",
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MinifyOptions {
    /// Decimal places kept when rounding geometry numbers.
    pub float_precision: u8,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self { float_precision: 3 }
    }
}

#[derive(Clone, Debug, Default)]
pub struct MinifyEngine {
    opts: MinifyOptions,
}

impl MinifyEngine {
    pub fn new(opts: MinifyOptions) -> Self {
        Self { opts }
    }

    /// Synchronous minification; `optimize` runs this on the blocking pool.
    pub fn minify(&self, svg: &str) -> Result<String, OptimizeError> {
        let out = minify_document(svg, self.opts)?;
        if out.trim().is_empty() {
            return Err(OptimizeError::Empty);
        }
        // Guard the output contract: whatever we emit must still be an svg document.
        if !is_svg_markup(&out) {
            return Err(OptimizeError::Engine(
                "minified output failed svg validation".to_string(),
            ));
        }
        Ok(out)
    }
}

#[async_trait]
impl SvgOptimizer for MinifyEngine {
    async fn optimize(&self, svg: String) -> Result<String, OptimizeError> {
        let engine = self.clone();
        tokio::task::spawn_blocking(move || engine.minify(&svg))
            .await
            .map_err(|e| OptimizeError::Engine(format!("minifier task failed: {e}")))?
    }
}

fn minify_document(svg: &str, opts: MinifyOptions) -> Result<String, OptimizeError> {
    let mut reader = Reader::from_str(svg);
    let mut writer = Writer::new(Vec::with_capacity(svg.len()));

    let mut open: Vec<Vec<u8>> = Vec::new();
    // Start tag held back until we know whether the element has children.
    let mut pending: Option<BytesStart<'static>> = None;
    // Depth inside a removed subtree (0 = not skipping).
    let mut skipping = 0usize;
    let mut text_depth = 0usize;
    let mut seen_root = false;

    loop {
        let position = reader.buffer_position() as u64;
        let event = reader.read_event().map_err(|e| OptimizeError::Malformed {
            position,
            reason: e.to_string(),
        })?;

        if skipping > 0 {
            match event {
                Event::Start(_) => skipping += 1,
                Event::End(_) => skipping -= 1,
                Event::Eof => {
                    return Err(OptimizeError::Malformed {
                        position,
                        reason: "unexpected end of document".to_string(),
                    })
                }
                _ => {}
            }
            continue;
        }

        match event {
            Event::Eof => break,
            Event::Decl(_) | Event::PI(_) | Event::DocType(_) | Event::Comment(_) => {}
            Event::Start(e) => {
                check_root(&e, open.is_empty(), &mut seen_root)?;
                if is_removed_element(&e) {
                    skipping = 1;
                    continue;
                }
                flush_pending(&mut writer, &mut pending, position)?;
                if TEXT_ELEMENTS.contains(&e.local_name().as_ref()) {
                    text_depth += 1;
                }
                open.push(e.name().as_ref().to_vec());
                pending = Some(rewrite_start(&e, opts, position)?);
            }
            Event::Empty(e) => {
                check_root(&e, open.is_empty(), &mut seen_root)?;
                if is_removed_element(&e) {
                    continue;
                }
                flush_pending(&mut writer, &mut pending, position)?;
                let rewritten = rewrite_start(&e, opts, position)?;
                write(&mut writer, Event::Empty(rewritten), position)?;
            }
            Event::End(e) => {
                let Some(name) = open.pop() else {
                    return Err(OptimizeError::Malformed {
                        position,
                        reason: "closing tag without opening tag".to_string(),
                    });
                };
                if name != e.name().as_ref() {
                    return Err(OptimizeError::Malformed {
                        position,
                        reason: format!(
                            "expected </{}>, found </{}>",
                            String::from_utf8_lossy(&name),
                            String::from_utf8_lossy(e.name().as_ref())
                        ),
                    });
                }
                if TEXT_ELEMENTS.contains(&e.local_name().as_ref()) {
                    text_depth = text_depth.saturating_sub(1);
                }
                match pending.take() {
                    Some(start) => write(&mut writer, Event::Empty(start), position)?,
                    None => write(&mut writer, Event::End(e), position)?,
                }
            }
            Event::Text(t) => {
                if open.is_empty() {
                    if t.iter().all(u8::is_ascii_whitespace) {
                        continue;
                    }
                    return Err(OptimizeError::NotSvg);
                }
                if text_depth == 0 && t.iter().all(u8::is_ascii_whitespace) {
                    continue;
                }
                flush_pending(&mut writer, &mut pending, position)?;
                write(&mut writer, Event::Text(t), position)?;
            }
            other => {
                if open.is_empty() {
                    return Err(OptimizeError::NotSvg);
                }
                flush_pending(&mut writer, &mut pending, position)?;
                write(&mut writer, other, position)?;
            }
        }
    }

    if !open.is_empty() {
        return Err(OptimizeError::Malformed {
            position: reader.buffer_position() as u64,
            reason: format!(
                "unclosed element <{}>",
                String::from_utf8_lossy(open.last().map(Vec::as_slice).unwrap_or_default())
            ),
        });
    }
    if !seen_root {
        return Err(OptimizeError::NotSvg);
    }

    String::from_utf8(writer.into_inner()).map_err(|e| OptimizeError::Engine(e.to_string()))
}

fn check_root(e: &BytesStart<'_>, at_top: bool, seen_root: &mut bool) -> Result<(), OptimizeError> {
    if !at_top {
        return Ok(());
    }
    if *seen_root || e.local_name().as_ref() != b"svg" {
        return Err(OptimizeError::NotSvg);
    }
    *seen_root = true;
    Ok(())
}

fn is_removed_element(e: &BytesStart<'_>) -> bool {
    if REMOVED_ELEMENTS.contains(&e.local_name().as_ref()) {
        return true;
    }
    e.name()
        .prefix()
        .is_some_and(|p| EDITOR_PREFIXES.contains(&p.as_ref()))
}

fn is_editor_attribute(key: &[u8]) -> bool {
    let prefix = match key.strip_prefix(b"xmlns:") {
        Some(declared) => declared,
        None => match key.iter().position(|b| *b == b':') {
            Some(idx) => &key[..idx],
            None => return false,
        },
    };
    EDITOR_PREFIXES.contains(&prefix)
}

fn rewrite_start(
    e: &BytesStart<'_>,
    opts: MinifyOptions,
    position: u64,
) -> Result<BytesStart<'static>, OptimizeError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);

    for attr in e.attributes() {
        let attr = attr.map_err(|err| OptimizeError::Malformed {
            position,
            reason: err.to_string(),
        })?;
        let key = attr.key.as_ref();
        if is_editor_attribute(key) || attr.value.iter().all(u8::is_ascii_whitespace) {
            continue;
        }

        let value: Cow<'_, [u8]> = if key == b"d" {
            let raw = String::from_utf8_lossy(&attr.value);
            Cow::Owned(shorten_path_data(&raw, opts.float_precision).into_bytes())
        } else if NUMERIC_ATTRIBUTES.contains(&key) {
            let raw = String::from_utf8_lossy(&attr.value);
            Cow::Owned(shorten_numbers(&raw, opts.float_precision).into_bytes())
        } else {
            attr.value
        };

        out.push_attribute(Attribute {
            key: attr.key,
            value: double_quote_safe(value),
        });
    }

    Ok(out)
}

// Values are re-emitted inside double quotes; a value that came from a
// single-quoted attribute may still carry a raw `"`.
fn double_quote_safe(value: Cow<'_, [u8]>) -> Cow<'_, [u8]> {
    if !value.contains(&b'"') {
        return value;
    }
    let mut out = Vec::with_capacity(value.len() + 8);
    for b in value.iter() {
        if *b == b'"' {
            out.extend_from_slice(b"&quot;");
        } else {
            out.push(*b);
        }
    }
    Cow::Owned(out)
}

fn flush_pending(
    writer: &mut Writer<Vec<u8>>,
    pending: &mut Option<BytesStart<'static>>,
    position: u64,
) -> Result<(), OptimizeError> {
    match pending.take() {
        Some(start) => write(writer, Event::Start(start), position),
        None => Ok(()),
    }
}

fn write(writer: &mut Writer<Vec<u8>>, event: Event<'_>, position: u64) -> Result<(), OptimizeError> {
    writer
        .write_event(event)
        .map_err(|e| OptimizeError::Engine(format!("write failed near byte {position}: {e}")))
}

const NUMBER_PATTERN: &str = r"-?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?";

fn number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(NUMBER_PATTERN).expect("valid regex"))
}

fn leading_number_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(&format!("^{NUMBER_PATTERN}")).expect("valid regex"))
}

/// Round every number in an attribute value and collapse whitespace runs.
///
/// Separators and units are kept as-is, so values like `M10-5` or `1.50.5`
/// keep their meaning.
pub fn shorten_numbers(value: &str, precision: u8) -> String {
    let collapsed = collapse_whitespace(value);
    let mut out = String::with_capacity(collapsed.len());
    let mut last = 0;
    for m in number_re().find_iter(&collapsed) {
        out.push_str(&collapsed[last..m.start()]);
        push_number(&mut out, m.as_str(), &collapsed[m.end()..], precision);
        last = m.end();
    }
    out.push_str(&collapsed[last..]);
    out
}

/// Like [`shorten_numbers`], but aware of path commands: the large-arc and
/// sweep flags of `a`/`A` are single `0`/`1` characters and are copied as-is,
/// even when written without separators (`a10 10 0 01 20 0`).
pub fn shorten_path_data(d: &str, precision: u8) -> String {
    let collapsed = collapse_whitespace(d);
    let mut out = String::with_capacity(collapsed.len());
    let mut rest = collapsed.as_str();
    let mut in_arc = false;
    // Index of the next argument within the current command.
    let mut arg = 0usize;

    while let Some(ch) = rest.chars().next() {
        if in_arc && matches!(arg % 7, 3 | 4) && matches!(ch, '0' | '1') {
            out.push(ch);
            rest = &rest[1..];
            arg += 1;
            continue;
        }
        if let Some(m) = leading_number_re().find(rest) {
            let tail = &rest[m.end()..];
            push_number(&mut out, m.as_str(), tail, precision);
            rest = tail;
            arg += 1;
            continue;
        }
        if ch.is_ascii_alphabetic() {
            in_arc = matches!(ch, 'a' | 'A');
            arg = 0;
        }
        out.push(ch);
        rest = &rest[ch.len_utf8()..];
    }
    out
}

fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn push_number(out: &mut String, raw: &str, tail: &str, precision: u8) {
    let short = match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => format_number(v, precision),
        _ => raw.to_string(),
    };
    out.push_str(&short);
    // `1.0004.5` rounds to `1`; without a separator it would read as `1.5`.
    if tail.starts_with('.') && !short.contains('.') {
        out.push(' ');
    }
}

/// Shortest decimal spelling of `v` rounded to `precision` places.
pub fn format_number(v: f64, precision: u8) -> String {
    let mut s = format!("{:.*}", usize::from(precision), v);
    if s.contains('.') {
        s = s.trim_end_matches('0').trim_end_matches('.').to_string();
    }
    if s == "-0" {
        return "0".to_string();
    }
    if let Some(rest) = s.strip_prefix("0.") {
        return format!(".{rest}");
    }
    if let Some(rest) = s.strip_prefix("-0.") {
        return format!("-.{rest}");
    }
    s
}
