//! Markdown rendering for post bodies.

use ammonia::Builder as AmmoniaBuilder;
use comrak::options::Options;

/// Turns author-supplied markdown into HTML that is safe to serve.
pub trait MarkdownRenderer: Send + Sync {
    fn render(&self, markdown: &str) -> String;
}

/// Comrak (GitHub-flavoured extensions) followed by Ammonia sanitisation.
pub struct ComrakRenderer {
    options: Options<'static>,
    sanitizer: AmmoniaBuilder<'static>,
}

impl ComrakRenderer {
    pub fn new() -> Self {
        Self {
            options: default_options(),
            sanitizer: build_sanitizer(),
        }
    }
}

impl Default for ComrakRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer for ComrakRenderer {
    fn render(&self, markdown: &str) -> String {
        let html = comrak::markdown_to_html(markdown, &self.options);
        self.sanitizer.clean(&html).to_string()
    }
}

fn default_options() -> Options<'static> {
    let mut options = Options::default();

    let ext = &mut options.extension;
    ext.strikethrough = true;
    ext.table = true;
    ext.autolink = true;
    ext.tasklist = true;
    ext.footnotes = true;

    let render = &mut options.render;
    render.github_pre_lang = true;
    // Raw HTML passes through comrak; the sanitizer decides what survives.
    render.r#unsafe = true;

    options
}

fn build_sanitizer() -> AmmoniaBuilder<'static> {
    let mut builder = AmmoniaBuilder::default();
    builder.add_tags(&["input"]);
    builder.add_tag_attributes("input", &["type", "checked", "disabled"]);
    builder.add_tag_attributes("pre", &["lang"]);
    builder.add_tag_attributes("code", &["class"]);
    builder.add_tag_attributes("th", &["align"]);
    builder.add_tag_attributes("td", &["align"]);
    builder
}
