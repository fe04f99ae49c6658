//! HTML to plain-text extraction.

use scraper::{ElementRef, Html};

/// Elements whose boundaries end a line of text.
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "blockquote", "dd", "div", "dl", "dt", "footer", "h1", "h2", "h3",
    "h4", "h5", "h6", "header", "li", "main", "ol", "p", "pre", "section", "table", "tr", "ul",
];

/// Elements whose content never reaches the text.
const SKIPPED_ELEMENTS: &[&str] = &["head", "noscript", "script", "style", "template"];

/// Extract the visible text of an HTML fragment.
pub(crate) fn extract_text(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    if !fragment.errors.is_empty() {
        tracing::trace!(errors = fragment.errors.len(), "html parse reported recoverable errors");
    }

    let mut raw = String::with_capacity(html.len());
    collect_text(fragment.root_element(), &mut raw);
    normalize_whitespace(&raw)
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            out.push_str(text);
            continue;
        }

        let Some(child_el) = ElementRef::wrap(child) else {
            continue;
        };

        let name = child_el.value().name();
        if SKIPPED_ELEMENTS.contains(&name) {
            continue;
        }

        match name {
            "br" | "hr" => out.push('\n'),
            "img" => {
                if let Some(alt) = child_el.value().attr("alt") {
                    out.push(' ');
                    out.push_str(alt);
                    out.push(' ');
                }
            }
            "td" | "th" => {
                out.push(' ');
                collect_text(child_el, out);
                out.push(' ');
            }
            _ if BLOCK_ELEMENTS.contains(&name) => {
                out.push('\n');
                collect_text(child_el, out);
                out.push('\n');
            }
            _ => collect_text(child_el, out),
        }
    }
}

/// Collapse whitespace runs inside lines, drop blank lines, trim.
fn normalize_whitespace(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_html_is_empty_text() {
        assert_eq!(extract_text(""), "");
        assert_eq!(extract_text("<p>   </p>"), "");
    }

    #[test]
    fn blocks_become_lines() {
        let text = extract_text("<h1>Title</h1><p>First   paragraph</p><p>Second</p>");
        assert_eq!(text, "Title\nFirst paragraph\nSecond");
    }

    #[test]
    fn inline_elements_do_not_break_lines() {
        let text = extract_text("<p>Some <strong>bold</strong> and <em>italic</em> text</p>");
        assert_eq!(text, "Some bold and italic text");
    }

    #[test]
    fn entities_are_decoded() {
        let text = extract_text("<p>a &lt; b &amp;&amp; c &quot;d&quot;</p>");
        assert_eq!(text, "a < b && c \"d\"");
    }

    #[test]
    fn scripts_and_styles_are_dropped() {
        let text = extract_text("<p>kept</p><script>var x = 1;</script><style>p{}</style>");
        assert_eq!(text, "kept");
    }

    #[test]
    fn table_cells_are_separated() {
        let text = extract_text("<table><tr><th>Name</th><th>Value</th></tr><tr><td>foo</td><td>bar</td></tr></table>");
        assert_eq!(text, "Name Value\nfoo bar");
    }

    #[test]
    fn images_contribute_alt_text() {
        let text = extract_text("<p>Logo:<img src=\"l.png\" alt=\"company logo\"/></p>");
        assert_eq!(text, "Logo: company logo");
    }

    #[test]
    fn line_breaks_split_lines() {
        assert_eq!(extract_text("<p>a<br/>b</p>"), "a\nb");
    }
}
