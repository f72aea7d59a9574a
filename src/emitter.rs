//! Scope tree emitter
//!
//! The runtime reports what it finds as three events: open a scope, add text,
//! close the innermost scope. [`TokenTree`] turns those events into a
//! [`ScopeNode`] tree; renderers then walk the finished tree.
//!
//! ## Tree shape
//!
//! ```text
//! root (no scope)
//! ├── "let "
//! ├── keyword
//! │   └── "mut"
//! └── language:json        embedded grammar, its own root re-labelled
//!     └── ...
//! ```
//!
//! Adjacent text leaves are merged as they are added, and empty text is
//! dropped, so two trees built from the same event stream compare equal
//! regardless of how the text was chunked.

mod html;
mod tokens;

pub use html::{escape_html, scope_to_css_class, HtmlRenderer};
pub use tokens::{Token, TokenListRenderer};

use serde::Serialize;

/// A tree node: a text leaf or a (possibly scoped) interior node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Node {
    Text(String),
    Scope(ScopeNode),
}

/// Interior node. Only the root and plain-text sub-language results lack a
/// scope.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScopeNode {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    pub children: Vec<Node>,
}

impl ScopeNode {
    pub fn new(scope: Option<String>) -> Self {
        Self {
            scope,
            children: Vec::new(),
        }
    }

    /// Root holding a single text leaf.
    pub fn plain(text: &str) -> Self {
        let mut root = Self::default();
        root.push_text(text);
        root
    }

    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.children.last_mut() {
            Some(Node::Text(last)) => last.push_str(text),
            _ => self.children.push(Node::Text(text.to_string())),
        }
    }

    /// The text under this node with all scopes removed.
    pub fn text(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        for child in &self.children {
            match child {
                Node::Text(text) => out.push_str(text),
                Node::Scope(node) => node.collect_text(out),
            }
        }
    }

    /// Feed this tree to a renderer. Nodes without a scope contribute their
    /// children only.
    pub fn walk<R: Renderer + ?Sized>(&self, renderer: &mut R) {
        if let Some(scope) = &self.scope {
            renderer.open_node(scope);
        }
        for child in &self.children {
            match child {
                Node::Text(text) => renderer.add_text(text),
                Node::Scope(node) => node.walk(renderer),
            }
        }
        if let Some(scope) = &self.scope {
            renderer.close_node(scope);
        }
    }

    pub fn render<R: Renderer>(&self, mut renderer: R) -> R::Output {
        self.walk(&mut renderer);
        renderer.finalize()
    }
}

/// Output backend for a finished scope tree.
pub trait Renderer {
    type Output;

    fn open_node(&mut self, scope: &str);
    fn close_node(&mut self, scope: &str);
    fn add_text(&mut self, text: &str);
    fn finalize(self) -> Self::Output;
}

/// Builds a [`ScopeNode`] tree from open/close/text events.
///
/// Open nodes live on a stack and are attached to their parent when closed;
/// the root can never be popped.
#[derive(Debug, Clone)]
pub struct TokenTree {
    stack: Vec<ScopeNode>,
}

impl Default for TokenTree {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenTree {
    pub fn new() -> Self {
        Self {
            stack: vec![ScopeNode::default()],
        }
    }

    fn top(&mut self) -> &mut ScopeNode {
        let last = self.stack.len() - 1;
        &mut self.stack[last]
    }

    pub fn open_node(&mut self, scope: &str) {
        self.stack.push(ScopeNode::new(Some(scope.to_string())));
    }

    /// Close the innermost open node; a no-op at the root.
    pub fn close_node(&mut self) {
        if self.stack.len() > 1 {
            if let Some(node) = self.stack.pop() {
                self.top().children.push(Node::Scope(node));
            }
        }
    }

    pub fn close_all_nodes(&mut self) {
        while self.stack.len() > 1 {
            self.close_node();
        }
    }

    pub fn add_text(&mut self, text: &str) {
        self.top().push_text(text);
    }

    /// A one-leaf scoped span.
    pub fn add_keyword(&mut self, text: &str, scope: &str) {
        if text.is_empty() {
            return;
        }
        self.open_node(scope);
        self.add_text(text);
        self.close_node();
    }

    /// Attach another highlight's tree, labelled `language:NAME` when the
    /// embedded grammar is known.
    pub fn add_sublanguage(&mut self, mut tree: ScopeNode, language: Option<&str>) {
        if let Some(name) = language {
            tree.scope = Some(format!("language:{name}"));
        }
        self.top().children.push(Node::Scope(tree));
    }

    /// Number of open nodes, the root excluded.
    pub fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    pub fn finalize(mut self) -> ScopeNode {
        self.close_all_nodes();
        self.stack.pop().unwrap_or_default()
    }
}
