//! Formatting utilities for Telegram HTML parse mode.

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Wrap text in a `<code>` span, escaping its content.
pub fn inline_code(text: &str) -> String {
    format!("<code>{}</code>", escape_html(text))
}

/// Keep at most `max` chars, appending `...` when something was cut.
pub fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    format!("{}...", text.chars().take(max).collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape_html(r#"<svg a="1">&</svg>"#),
            "&lt;svg a=&quot;1&quot;&gt;&amp;&lt;/svg&gt;"
        );
    }

    #[test]
    fn inline_code_wraps_escaped_text() {
        assert_eq!(inline_code("<svg/>"), "<code>&lt;svg/&gt;</code>");
    }

    #[test]
    fn truncates_on_char_boundaries() {
        assert_eq!(truncate_chars("héllo", 10), "héllo");
        assert_eq!(truncate_chars("héllo", 2), "hé...");
    }
}
