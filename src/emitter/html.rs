//! HTML span rendering
//!
//! ```text
//! keyword          <span class="hljs-keyword">
//! title.function   <span class="hljs-title function_">
//! language:json    <span class="language-json">
//! ```

use super::Renderer;

pub struct HtmlRenderer {
    prefix: String,
    buffer: String,
}

impl HtmlRenderer {
    pub fn new(class_prefix: &str) -> Self {
        Self {
            prefix: class_prefix.to_string(),
            buffer: String::new(),
        }
    }
}

impl Renderer for HtmlRenderer {
    type Output = String;

    fn open_node(&mut self, scope: &str) {
        let class = scope_to_css_class(scope, &self.prefix);
        self.buffer.push_str("<span class=\"");
        self.buffer.push_str(&class);
        self.buffer.push_str("\">");
    }

    fn close_node(&mut self, _scope: &str) {
        self.buffer.push_str("</span>");
    }

    fn add_text(&mut self, text: &str) {
        self.buffer.push_str(&escape_html(text));
    }

    fn finalize(self) -> String {
        self.buffer
    }
}

/// CSS class list for a scope. Sub-scopes after the first dot get one trailing
/// underscore per nesting level.
pub fn scope_to_css_class(scope: &str, prefix: &str) -> String {
    if let Some(language) = scope.strip_prefix("language:") {
        return format!("language-{language}");
    }
    let mut parts = scope.split('.');
    let mut class = format!("{prefix}{}", parts.next().unwrap_or_default());
    for (depth, part) in parts.enumerate() {
        class.push(' ');
        class.push_str(part);
        class.push_str(&"_".repeat(depth + 1));
    }
    class
}

pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            c => out.push(c),
        }
    }
    out
}
