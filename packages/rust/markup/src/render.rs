//! Wiki markup to HTML renderer.
//!
//! Block structure is recognised line by line (headings, rules, lists,
//! tables, preformatted blocks, paragraphs); each block's text then goes
//! through the inline pass for emphasis, links, images and escapes.

use std::sync::LazyLock;

use regex::Regex;
use url::form_urlencoded;

/// Render wiki markup to an HTML fragment.
pub(crate) fn render_html(markup: &str) -> String {
    let mut renderer = BlockRenderer::default();
    for line in markup.lines() {
        renderer.line(line);
    }
    renderer.finish()
}

// ---------------------------------------------------------------------------
// Block pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Unordered,
    Ordered,
}

impl ListKind {
    fn from_marker(c: char) -> Self {
        if c == '#' {
            Self::Ordered
        } else {
            Self::Unordered
        }
    }

    fn tag(self) -> &'static str {
        match self {
            Self::Unordered => "ul",
            Self::Ordered => "ol",
        }
    }
}

/// Line-driven block state machine. Every open list level has exactly one open `<li>`.
#[derive(Default)]
struct BlockRenderer {
    out: String,
    paragraph: Vec<String>,
    lists: Vec<ListKind>,
    in_table: bool,
    pre: Option<Vec<String>>,
}

impl BlockRenderer {
    fn line(&mut self, line: &str) {
        static HEADING_RE: LazyLock<Regex> = LazyLock::new(|| {
            Regex::new(r"^\s*(={1,6})(?:\s+(.*?))?\s*=*\s*$").expect("valid regex")
        });
        static RULE_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^\s*-{4,}\s*$").expect("valid regex"));
        static LIST_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"^\s*([*#]+)\s+(.*)$").expect("valid regex"));

        if let Some(lines) = self.pre.as_mut() {
            if line.trim() == "}}}" {
                self.close_pre();
            } else {
                lines.push(line.to_string());
            }
            return;
        }

        let trimmed = line.trim();

        if trimmed.is_empty() {
            self.close_blocks();
            return;
        }

        if trimmed == "{{{" {
            self.close_blocks();
            self.pre = Some(Vec::new());
            return;
        }

        if let Some(caps) = HEADING_RE.captures(line) {
            self.close_blocks();
            let level = caps[1].len();
            let text = render_inline(caps.get(2).map_or("", |m| m.as_str()));
            self.out.push_str(&format!("<h{level}>{text}</h{level}>\n"));
            return;
        }

        if RULE_RE.is_match(line) {
            self.close_blocks();
            self.out.push_str("<hr/>\n");
            return;
        }

        if let Some(caps) = LIST_RE.captures(line) {
            self.flush_paragraph();
            self.close_table();
            let kinds: Vec<ListKind> = caps[1].chars().map(ListKind::from_marker).collect();
            self.list_item(&kinds, &caps[2]);
            return;
        }

        if trimmed.starts_with('|') {
            self.flush_paragraph();
            self.close_lists();
            self.table_row(trimmed);
            return;
        }

        // Continuation of an open list item keeps it open.
        if !self.lists.is_empty() {
            self.out.push(' ');
            self.out.push_str(&render_inline(trimmed));
            return;
        }

        self.close_table();
        self.paragraph.push(trimmed.to_string());
    }

    fn finish(mut self) -> String {
        if self.pre.is_some() {
            self.close_pre();
        }
        self.close_blocks();
        self.out
    }

    fn close_blocks(&mut self) {
        self.flush_paragraph();
        self.close_lists();
        self.close_table();
    }

    fn flush_paragraph(&mut self) {
        if self.paragraph.is_empty() {
            return;
        }
        let text = self.paragraph.join("\n");
        self.paragraph.clear();
        self.out.push_str("<p>");
        self.out.push_str(&render_inline(&text));
        self.out.push_str("</p>\n");
    }

    fn close_pre(&mut self) {
        if let Some(lines) = self.pre.take() {
            self.out.push_str("<pre>");
            self.out.push_str(&escape_html(&lines.join("\n")));
            self.out.push_str("</pre>\n");
        }
    }

    // --- Lists ---

    fn list_item(&mut self, kinds: &[ListKind], text: &str) {
        let common = self
            .lists
            .iter()
            .zip(kinds)
            .take_while(|(open, wanted)| open == wanted)
            .count();

        while self.lists.len() > common {
            self.pop_list();
        }

        if common == kinds.len() {
            // Sibling of the current item.
            self.out.push_str("</li>\n<li>");
        } else {
            for kind in &kinds[common..] {
                self.out.push_str(&format!("<{}>\n<li>", kind.tag()));
                self.lists.push(*kind);
            }
        }

        self.out.push_str(&render_inline(text));
    }

    fn pop_list(&mut self) {
        if let Some(kind) = self.lists.pop() {
            self.out.push_str(&format!("</li>\n</{}>", kind.tag()));
            if self.lists.is_empty() {
                self.out.push('\n');
            }
        }
    }

    fn close_lists(&mut self) {
        while !self.lists.is_empty() {
            self.pop_list();
        }
    }

    // --- Tables ---

    fn table_row(&mut self, line: &str) {
        if !self.in_table {
            self.out.push_str("<table>\n");
            self.in_table = true;
        }

        self.out.push_str("<tr>");
        for cell in split_cells(line) {
            match cell.strip_prefix('=') {
                Some(header) => {
                    self.out.push_str("<th>");
                    self.out.push_str(&render_inline(header.trim()));
                    self.out.push_str("</th>");
                }
                None => {
                    self.out.push_str("<td>");
                    self.out.push_str(&render_inline(cell.trim()));
                    self.out.push_str("</td>");
                }
            }
        }
        self.out.push_str("</tr>\n");
    }

    fn close_table(&mut self) {
        if self.in_table {
            self.out.push_str("</table>\n");
            self.in_table = false;
        }
    }
}

/// Split a table row on `|`, ignoring pipes inside `[[...]]` and `{{...}}`.
fn split_cells(line: &str) -> Vec<&str> {
    let body = line.strip_prefix('|').unwrap_or(line);
    let body = body.strip_suffix('|').unwrap_or(body);

    let bytes = body.as_bytes();
    let mut cells = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'[' | b'{' if bytes.get(i + 1) == Some(&bytes[i]) => {
                depth += 1;
                i += 2;
                continue;
            }
            b']' | b'}' if depth > 0 && bytes.get(i + 1) == Some(&bytes[i]) => {
                depth -= 1;
                i += 2;
                continue;
            }
            b'|' if depth == 0 => {
                cells.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
        i += 1;
    }
    cells.push(&body[start..]);
    cells
}

// ---------------------------------------------------------------------------
// Inline pass
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Strong,
    Em,
}

impl Emphasis {
    fn open(self) -> &'static str {
        match self {
            Self::Strong => "<strong>",
            Self::Em => "<em>",
        }
    }

    fn close(self) -> &'static str {
        match self {
            Self::Strong => "</strong>",
            Self::Em => "</em>",
        }
    }
}

/// Render inline markup. Unclosed emphasis is closed at the end of the text.
pub(crate) fn render_inline(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut open: Vec<Emphasis> = Vec::new();
    let mut rest = text;
    let mut prev: Option<char> = None;

    while let Some(c) = rest.chars().next() {
        if c == '~' {
            let mut chars = rest.chars();
            chars.next();
            if let Some(escaped) = chars.next() {
                push_escaped_char(&mut out, escaped);
                prev = Some(escaped);
                rest = chars.as_str();
                continue;
            }
        }

        if let Some(after) = rest.strip_prefix("{{{") {
            if let Some(end) = after.find("}}}") {
                out.push_str("<tt>");
                out.push_str(&escape_html(&after[..end]));
                out.push_str("</tt>");
                rest = &after[end + 3..];
                prev = Some('}');
                continue;
            }
        }

        if let Some(after) = rest.strip_prefix("[[") {
            if let Some(end) = after.find("]]") {
                out.push_str(&render_link(&after[..end]));
                rest = &after[end + 2..];
                prev = Some(']');
                continue;
            }
        }

        if let Some(after) = rest.strip_prefix("{{") {
            if let Some(end) = after.find("}}") {
                out.push_str(&render_image(&after[..end]));
                rest = &after[end + 2..];
                prev = Some('}');
                continue;
            }
        }

        if let Some(after) = rest.strip_prefix("\\\\") {
            out.push_str("<br/>");
            rest = after;
            prev = Some('\\');
            continue;
        }

        if let Some(after) = rest.strip_prefix("**") {
            toggle(&mut out, &mut open, Emphasis::Strong);
            rest = after;
            prev = Some('*');
            continue;
        }

        // `//` right after a scheme colon belongs to a URL, not to emphasis.
        if prev != Some(':') {
            if let Some(after) = rest.strip_prefix("//") {
                toggle(&mut out, &mut open, Emphasis::Em);
                rest = after;
                prev = Some('/');
                continue;
            }
        }

        push_escaped_char(&mut out, c);
        prev = Some(c);
        rest = &rest[c.len_utf8()..];
    }

    while let Some(emphasis) = open.pop() {
        out.push_str(emphasis.close());
    }

    out
}

/// Open `emphasis`, or close it if already open (re-opening anything nested inside it).
fn toggle(out: &mut String, open: &mut Vec<Emphasis>, emphasis: Emphasis) {
    let Some(pos) = open.iter().rposition(|e| *e == emphasis) else {
        out.push_str(emphasis.open());
        open.push(emphasis);
        return;
    };

    let nested: Vec<Emphasis> = open.drain(pos + 1..).collect();
    for inner in nested.iter().rev() {
        out.push_str(inner.close());
    }
    open.pop();
    out.push_str(emphasis.close());
    for inner in nested {
        out.push_str(inner.open());
        open.push(inner);
    }
}

fn render_link(inner: &str) -> String {
    let (target, label) = match inner.split_once('|') {
        Some((target, label)) => (target.trim(), label.trim()),
        None => (inner.trim(), inner.trim()),
    };

    let href = if target.contains("://") || target.starts_with("mailto:") {
        escape_html(target)
    } else {
        let encoded: String = form_urlencoded::byte_serialize(target.as_bytes()).collect();
        format!("?page_name={encoded}&amp;action=view")
    };

    let label = if label.is_empty() { target } else { label };
    format!("<a href=\"{href}\">{}</a>", render_inline(label))
}

fn render_image(inner: &str) -> String {
    let (src, alt) = match inner.split_once('|') {
        Some((src, alt)) => (src.trim(), alt.trim()),
        None => (inner.trim(), ""),
    };
    format!(
        "<img src=\"{}\" alt=\"{}\"/>",
        escape_html(src),
        escape_html(alt)
    )
}

// ---------------------------------------------------------------------------
// Escaping
// ---------------------------------------------------------------------------

fn push_escaped_char(out: &mut String, c: char) {
    match c {
        '&' => out.push_str("&amp;"),
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '"' => out.push_str("&quot;"),
        _ => out.push(c),
    }
}

/// Escape text for inclusion in HTML element content or attribute values.
pub(crate) fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        push_escaped_char(&mut out, c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_renders_nothing() {
        assert_eq!(render_html(""), "");
        assert_eq!(render_html("\n\n  \n"), "");
    }

    #[test]
    fn headings_with_and_without_closing_markers() {
        let html = render_html("= Title =\n=== Section");
        assert!(html.contains("<h1>Title</h1>"));
        assert!(html.contains("<h3>Section</h3>"));
    }

    #[test]
    fn equals_sign_without_space_is_plain_text() {
        let html = render_html("=> arrow means implies");
        assert_eq!(html, "<p>=&gt; arrow means implies</p>\n");
        assert!(render_html("== Closed ==\n").contains("<h2>Closed</h2>"));
    }

    #[test]
    fn paragraphs_split_on_blank_lines() {
        let html = render_html("first line\nsame paragraph\n\nsecond");
        assert_eq!(html, "<p>first line\nsame paragraph</p>\n<p>second</p>\n");
    }

    #[test]
    fn nested_lists_close_in_order() {
        let html = render_html("* one\n** one.a\n* two\n# first");
        assert_eq!(
            html,
            "<ul>\n<li>one<ul>\n<li>one.a</li>\n</ul></li>\n<li>two</li>\n</ul>\n<ol>\n<li>first</li>\n</ol>\n"
        );
    }

    #[test]
    fn bold_at_line_start_is_not_a_list() {
        let html = render_html("**Bold** start");
        assert_eq!(html, "<p><strong>Bold</strong> start</p>\n");
    }

    #[test]
    fn preformatted_block_is_escaped_verbatim() {
        let html = render_html("{{{\nlet x = a < b && **c**;\n}}}\nafter");
        assert!(html.contains("<pre>let x = a &lt; b &amp;&amp; **c**;</pre>"));
        assert!(html.contains("<p>after</p>"));
    }

    #[test]
    fn unterminated_pre_is_closed() {
        let html = render_html("{{{\ncode");
        assert_eq!(html, "<pre>code</pre>\n");
    }

    #[test]
    fn table_with_header_row() {
        let html = render_html("|=Name|=Value|\n|foo|[[Page|bar]]|");
        assert!(html.starts_with("<table>\n<tr><th>Name</th><th>Value</th></tr>"));
        assert!(html.contains("<td>foo</td>"));
        assert!(html.contains(">bar</a></td>"));
        assert!(html.ends_with("</table>\n"));
    }

    #[test]
    fn horizontal_rule() {
        assert_eq!(render_html("----"), "<hr/>\n");
    }

    #[test]
    fn inline_emphasis_and_unclosed_markers() {
        assert_eq!(render_inline("**b** //i//"), "<strong>b</strong> <em>i</em>");
        assert_eq!(render_inline("**open"), "<strong>open</strong>");
        assert_eq!(
            render_inline("**a //b** c//"),
            "<strong>a <em>b</em></strong><em> c</em>"
        );
    }

    #[test]
    fn urls_are_not_italic() {
        let html = render_inline("see http://example.com/x");
        assert_eq!(html, "see http://example.com/x");
    }

    #[test]
    fn links_images_and_breaks() {
        assert_eq!(
            render_inline("[[Home Page]]"),
            "<a href=\"?page_name=Home+Page&amp;action=view\">Home Page</a>"
        );
        assert_eq!(
            render_inline("[[https://rust-lang.org|Rust]]"),
            "<a href=\"https://rust-lang.org\">Rust</a>"
        );
        assert_eq!(
            render_inline("{{logo.png|The logo}}"),
            "<img src=\"logo.png\" alt=\"The logo\"/>"
        );
        assert_eq!(render_inline("a\\\\b"), "a<br/>b");
    }

    #[test]
    fn escapes_and_nowiki() {
        assert_eq!(render_inline("~**not bold~**"), "**not bold**");
        assert_eq!(render_inline("{{{**raw**}}}"), "<tt>**raw**</tt>");
        assert_eq!(render_inline("<script>"), "&lt;script&gt;");
    }
}
