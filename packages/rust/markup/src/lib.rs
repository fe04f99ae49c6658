//! Wiki markup rendering and plain-text extraction.
//!
//! Topic text goes through two stages before it is indexed: the wiki markup
//! is rendered to HTML, then the HTML is reduced to its visible text. Both
//! stages are exposed separately so callers can keep the intermediate HTML.

mod extract;
mod render;

use tracing::{debug, instrument};

/// Render wiki markup to an HTML fragment.
///
/// Supports headings, rules, nested lists, tables, preformatted blocks,
/// bold/italic emphasis, links, images, forced line breaks and `~` escapes.
/// All text is HTML-escaped.
pub fn render(markup: &str) -> String {
    render::render_html(markup)
}

/// Extract the visible text of an HTML fragment.
///
/// Block elements end lines, whitespace is collapsed, blank lines are dropped.
pub fn html_to_text(html: &str) -> String {
    extract::extract_text(html)
}

/// Render wiki markup and reduce it to plain text in one go.
#[instrument(skip_all, fields(markup_len = markup.len()))]
pub fn to_plain_text(markup: &str) -> String {
    if markup.is_empty() {
        return String::new();
    }

    let html = render(markup);
    let text = html_to_text(&html);

    debug!(html_len = html.len(), text_len = text.len(), "markup converted to text");
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn load_fixture(name: &str) -> String {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../../../fixtures/wiki")
            .join(name);
        fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read fixture {name}: {e}"))
    }

    #[test]
    fn empty_markup_is_empty_text() {
        assert_eq!(to_plain_text(""), "");
    }

    #[test]
    fn plain_text_has_no_markup_left() {
        let text = to_plain_text("= Title =\n\nSome **bold** text with a [[Link|label]].");
        assert_eq!(text, "Title\nSome bold text with a label.");
    }

    #[test]
    fn welcome_fixture_renders_every_block() {
        let html = render(&load_fixture("welcome.wiki"));

        assert!(html.contains("<h1>Welcome to the Wiki</h1>"));
        assert!(html.contains("<h2>Conventions</h2>"));
        assert!(html.contains("<strong>shared notebook</strong>"));
        assert!(html.contains("<em>documentation team</em>"));
        assert!(html.contains("<ol>"));
        assert!(html.contains("<th>Role</th>"));
        assert!(html.contains("<pre>curl -s"));
        assert!(html.contains("<hr/>"));
        assert!(html.contains("href=\"mailto:docs@example.org\""));
    }

    #[test]
    fn welcome_fixture_text() {
        let text = to_plain_text(&load_fixture("welcome.wiki"));

        assert!(text.starts_with("Welcome to the Wiki\n"));
        assert!(text.contains("This wiki is the shared notebook of the documentation team."));
        assert!(text.contains("Read the editing guide before changing a page."));
        assert!(text.contains("Page names use Title Case"));
        assert!(text.contains("Editor yes"));
        assert!(text.contains("curl -s http://localhost:8080/portal/jsp/site/Portal.jsp?page=wiki"));
        assert!(text.ends_with("Questions? Write to the docs team."));

        for leftover in ["**", "[[", "{{{", "<", "|="] {
            assert!(!text.contains(leftover), "text still contains {leftover:?}");
        }
    }
}
