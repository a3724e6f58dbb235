//! Markdown presentation for OCR results.
//!
//! Markdown is parsed with `pulldown-cmark`; table, paragraph and code events
//! are rewritten so long tokens wrap inside their container instead of
//! overflowing it. Everything else goes through the stock HTML writer.

use once_cell::sync::Lazy;
use pulldown_cmark::{html, Alignment, CodeBlockKind, CowStr, Event, Options, Parser, Tag, TagEnd};
use regex::Regex;
use std::path::{Path, PathBuf};

use crate::schema::OcrResponse;

/// Final extension of a filename, same rule the browser download used.
static EXTENSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\.[^/.]+$").expect("valid regex"));

static SCRIPT_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(?P<close>/?)script\b").expect("valid regex"));

static EVENT_HANDLER_ATTR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\s+on[a-z]+\s*=\s*(?:"[^"]*"|'[^']*'|[^\s>]+)"#).expect("valid regex")
});

const BREAK_ANYWHERE: &str = "break-anywhere";

/// A rendered [`OcrResponse`]: one header, one entry per result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedReport {
    pub header: String,
    pub entries: Vec<RenderedEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEntry {
    pub filename: String,
    pub html: String,
    pub raw_markdown: String,
}

/// A markdown file ready to be saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkdownDownload {
    pub file_name: String,
    pub contents: String,
}

impl MarkdownDownload {
    /// Save into `dir` and return the written path.
    ///
    /// Only the final path component of `file_name` is used.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        let name = Path::new(&self.file_name)
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "result.md".into());
        let path = dir.join(name);
        std::fs::write(&path, self.contents.as_bytes())?;
        Ok(path)
    }
}

impl RenderedEntry {
    /// Text placed on the clipboard by the copy action.
    pub fn clipboard_text(&self) -> &str {
        &self.raw_markdown
    }

    pub fn download(&self) -> MarkdownDownload {
        MarkdownDownload {
            file_name: download_file_name(&self.filename),
            contents: self.raw_markdown.clone(),
        }
    }
}

/// `doc.pdf` → `doc.md`; names without an extension just gain `.md`.
pub fn download_file_name(filename: &str) -> String {
    format!("{}.md", EXTENSION.replace(filename, ""))
}

/// Render every result of `data`. Pure: the same input gives the same output.
pub fn render(data: &OcrResponse) -> RenderedReport {
    let entries = data
        .results
        .iter()
        .map(|(filename, result)| RenderedEntry {
            filename: filename.clone(),
            html: markdown_to_html(&result.md_content),
            raw_markdown: result.md_content.clone(),
        })
        .collect();

    RenderedReport {
        header: format!("Backend: {} | Version: {}", data.backend, data.version),
        entries,
    }
}

/// Convert markdown to HTML with wrapping-friendly tables, paragraphs and code.
///
/// Raw HTML in the source is passed through, since OCR backends often emit
/// tables as HTML. Script tags and `on*` handler attributes are neutralized
/// first; other markup (links, images, styles) is trusted as the backend sent it.
pub fn markdown_to_html(markdown: &str) -> String {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_FOOTNOTES;

    let mut state = TableState::default();
    let events = Parser::new_ext(markdown, options).map(|event| state.rewrite(event));

    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, events);
    out
}

/// Tracks where we are inside a table while rewriting events.
#[derive(Default)]
struct TableState {
    alignments: Vec<Alignment>,
    in_head: bool,
    body_open: bool,
    column: usize,
}

impl TableState {
    fn rewrite<'a>(&mut self, event: Event<'a>) -> Event<'a> {
        let markup = match event {
            Event::Start(Tag::Table(alignments)) => {
                self.alignments = alignments;
                self.body_open = false;
                "<div class=\"table-scroll\"><table>\n".to_string()
            }
            Event::End(TagEnd::Table) => {
                let close_body = if self.body_open { "</tbody>\n" } else { "" };
                self.body_open = false;
                format!("{close_body}</table></div>\n")
            }
            Event::Start(Tag::TableHead) => {
                self.in_head = true;
                self.column = 0;
                "<thead><tr>".to_string()
            }
            Event::End(TagEnd::TableHead) => {
                self.in_head = false;
                "</tr></thead>\n".to_string()
            }
            Event::Start(Tag::TableRow) => {
                self.column = 0;
                if self.body_open {
                    "<tr>".to_string()
                } else {
                    self.body_open = true;
                    "<tbody>\n<tr>".to_string()
                }
            }
            Event::End(TagEnd::TableRow) => "</tr>\n".to_string(),
            Event::Start(Tag::TableCell) => {
                let tag = if self.in_head { "th" } else { "td" };
                let style = match self.alignments.get(self.column) {
                    Some(Alignment::Left) => " style=\"text-align: left\"",
                    Some(Alignment::Center) => " style=\"text-align: center\"",
                    Some(Alignment::Right) => " style=\"text-align: right\"",
                    _ => "",
                };
                format!("<{tag}{style}><div class=\"{BREAK_ANYWHERE}\">")
            }
            Event::End(TagEnd::TableCell) => {
                self.column += 1;
                let tag = if self.in_head { "th" } else { "td" };
                format!("</div></{tag}>")
            }
            Event::Start(Tag::Paragraph) => format!("<p class=\"{BREAK_ANYWHERE}\">"),
            Event::End(TagEnd::Paragraph) => "</p>\n".to_string(),
            Event::Start(Tag::CodeBlock(kind)) => match kind {
                CodeBlockKind::Fenced(lang) if !lang.is_empty() => {
                    let lang = lang.split(' ').next().unwrap_or_default();
                    format!(
                        "<pre class=\"{BREAK_ANYWHERE}\"><code class=\"language-{} {BREAK_ANYWHERE}\">",
                        escape_html(lang)
                    )
                }
                _ => format!("<pre class=\"{BREAK_ANYWHERE}\"><code class=\"{BREAK_ANYWHERE}\">"),
            },
            Event::End(TagEnd::CodeBlock) => "</code></pre>\n".to_string(),
            Event::Code(code) => {
                format!("<code class=\"{BREAK_ANYWHERE}\">{}</code>", escape_html(&code))
            }
            Event::Html(raw) => neutralize_raw_html(&raw),
            Event::InlineHtml(raw) => {
                return Event::InlineHtml(CowStr::from(neutralize_raw_html(&raw)))
            }
            other => return other,
        };
        Event::Html(CowStr::from(markup))
    }
}

impl RenderedReport {
    /// A standalone HTML page with copy, download and raw-view controls.
    pub fn to_html_document(&self) -> String {
        let mut page = String::new();
        page.push_str(DOCUMENT_HEAD);
        page.push_str("<header><h3>OCR Results</h3>\n<p class=\"meta\">");
        page.push_str(&escape_html(&self.header));
        page.push_str("</p></header>\n");

        for (index, entry) in self.entries.iter().enumerate() {
            let raw_id = format!("raw-{index}");
            let download_name = download_file_name(&entry.filename);

            page.push_str("<section class=\"card\">\n<div class=\"card-head\"><h4>");
            page.push_str(&escape_html(&entry.filename));
            page.push_str("</h4><div class=\"actions\">");
            page.push_str(&format!(
                "<button type=\"button\" data-action=\"copy\" data-target=\"{raw_id}\">Copy</button>"
            ));
            page.push_str(&format!(
                "<button type=\"button\" data-action=\"download\" data-target=\"{raw_id}\" data-filename=\"{}\">Download</button>",
                escape_html(&download_name)
            ));
            page.push_str("</div></div>\n<div class=\"prose break-anywhere\">\n");
            page.push_str(&entry.html);
            page.push_str("</div>\n<details><summary>View Raw Markdown</summary>\n");
            // HTML parsers drop one newline right after <pre>; emit it so the
            // source text survives intact.
            page.push_str(&format!("<pre id=\"{raw_id}\" class=\"raw break-anywhere\">\n"));
            page.push_str(&escape_html(&entry.raw_markdown));
            page.push_str("</pre>\n</details>\n</section>\n");
        }

        page.push_str(DOCUMENT_TAIL);
        page
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    // Writing into a String cannot fail.
    let _ = pulldown_cmark_escape::escape_html(&mut out, text);
    out
}

/// Turn `<script>` tags into text and strip inline event handlers from raw
/// HTML, so opening a saved report never runs code from OCR output.
fn neutralize_raw_html(raw: &str) -> String {
    let without_scripts = SCRIPT_TAG.replace_all(raw, "&lt;${close}script");
    EVENT_HANDLER_ATTR
        .replace_all(&without_scripts, "")
        .into_owned()
}

const DOCUMENT_HEAD: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>OCR Results</title>
<style>
body { font-family: system-ui, sans-serif; max-width: 56rem; margin: 2rem auto; padding: 0 1rem; color: #111827; }
header { text-align: center; }
.meta { color: #4b5563; font-size: .875rem; }
.card { border: 1px solid #e5e7eb; border-radius: .5rem; padding: 1.5rem; margin: 1.5rem 0; overflow: hidden; }
.card-head { display: flex; justify-content: space-between; align-items: center; }
.actions button { margin-left: .5rem; }
.prose { border: 1px solid #e5e7eb; border-radius: .5rem; padding: 1rem; background: #f9fafb; overflow: hidden; }
.break-anywhere { overflow-wrap: anywhere; word-break: break-word; }
.table-scroll { overflow-x: auto; width: 100%; }
table { min-width: 100%; border-collapse: collapse; table-layout: auto; }
th, td { border: 1px solid #d1d5db; padding: .5rem; font-size: .75rem; max-width: 20rem; text-align: left; }
th { background: #f3f4f6; font-weight: 500; }
tbody tr:nth-child(even) { background: #f9fafb; }
pre { overflow-x: auto; white-space: pre-wrap; }
details { margin-top: 1rem; }
summary { cursor: pointer; font-size: .875rem; font-weight: 500; }
pre.raw { background: #f3f4f6; border: 1px solid #e5e7eb; border-radius: .25rem; padding: .75rem; font-size: .875rem; }
</style>
</head>
<body>
"#;

const DOCUMENT_TAIL: &str = r#"<script>
document.addEventListener('click', function (event) {
  var button = event.target.closest('button[data-action]');
  if (!button) return;
  var text = document.getElementById(button.dataset.target).textContent;
  if (button.dataset.action === 'copy') {
    navigator.clipboard.writeText(text).then(function () { alert('Content copied to clipboard!'); });
    return;
  }
  var url = URL.createObjectURL(new Blob([text], { type: 'text/markdown' }));
  var a = document.createElement('a');
  a.href = url;
  a.download = button.dataset.filename;
  document.body.appendChild(a);
  a.click();
  document.body.removeChild(a);
  URL.revokeObjectURL(url);
});
</script>
</body>
</html>
"#;
