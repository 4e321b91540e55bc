//! SVG detection for inline markup and uploaded file names.

use quick_xml::{events::Event, Reader};

const SVG_SUFFIX: &str = ".svg";

/// True if `text` is well-formed XML with a single `<svg>` root element.
///
/// A leading XML declaration, doctype, comments and processing instructions are
/// allowed, as is surrounding whitespace. Anything else outside the root
/// (stray text, a second root) rejects the payload.
pub fn is_svg_markup(text: &str) -> bool {
    let mut reader = Reader::from_str(text);
    let mut depth = 0usize;
    let mut seen_root = false;

    loop {
        let event = match reader.read_event() {
            Ok(ev) => ev,
            Err(_) => return false,
        };

        match event {
            Event::Eof => return seen_root && depth == 0,
            Event::Start(e) => {
                if depth == 0 {
                    if seen_root || e.local_name().as_ref() != b"svg" {
                        return false;
                    }
                    seen_root = true;
                }
                depth += 1;
            }
            Event::Empty(e) => {
                if depth == 0 {
                    if seen_root || e.local_name().as_ref() != b"svg" {
                        return false;
                    }
                    seen_root = true;
                }
            }
            Event::End(_) => {
                if depth == 0 {
                    return false;
                }
                depth -= 1;
            }
            Event::Text(t) if depth == 0 => {
                if !t.iter().all(u8::is_ascii_whitespace) {
                    return false;
                }
            }
            Event::CData(_) if depth == 0 => return false,
            _ => {}
        }
    }
}

/// True if the file name ends in `.svg` (any case) and has a non-empty stem.
pub fn is_svg_file(file_name: &str) -> bool {
    strip_svg_suffix(file_name).is_some_and(|stem| !stem.is_empty())
}

/// The name without its `.svg` suffix (matched case-insensitively).
pub fn strip_svg_suffix(name: &str) -> Option<&str> {
    let cut = name.len().checked_sub(SVG_SUFFIX.len())?;
    let suffix = name.get(cut..)?;
    if suffix.eq_ignore_ascii_case(SVG_SUFFIX) {
        name.get(..cut)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_svg_documents() {
        assert!(is_svg_markup("<svg></svg>"));
        assert!(is_svg_markup("<svg/>"));
        assert!(is_svg_markup(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<!-- exported -->
<!DOCTYPE svg PUBLIC "-//W3C//DTD SVG 1.1//EN" "http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd">
<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 10 10"><rect width="10" height="10"/></svg>
"#
        ));
        assert!(is_svg_markup(
            r#"<svg:svg xmlns:svg="http://www.w3.org/2000/svg"></svg:svg>"#
        ));
    }

    #[test]
    fn rejects_non_svg_markup() {
        for text in [
            "hello world",
            "",
            "   ",
            "<html></html>",
            "<svg>",
            "<svg></g>",
            "<svg></svg><svg></svg>",
            "text before <svg></svg>",
            "<svg></svg> trailing",
            "<svg><rect></svg>",
            "/start",
        ] {
            assert!(!is_svg_markup(text), "{text:?} should not validate");
        }
    }

    #[test]
    fn svg_file_extension_is_case_insensitive() {
        assert!(is_svg_file("icon.svg"));
        assert!(is_svg_file("ICON.SVG"));
        assert!(is_svg_file("logo.final.Svg"));
        assert!(!is_svg_file("photo.png"));
        assert!(!is_svg_file("svg"));
        assert!(!is_svg_file(".svg"));
        assert!(!is_svg_file("icon.svg.png"));
        assert!(!is_svg_file("ж.svgz"));
    }

    #[test]
    fn strip_suffix_handles_multibyte_names() {
        assert_eq!(strip_svg_suffix("значок.svg"), Some("значок"));
        assert_eq!(strip_svg_suffix("значок"), None);
        assert_eq!(strip_svg_suffix("a"), None);
    }
}
