//! Flat token list rendering
//!
//! Flattens the scope tree into `(scope stack, text)` pairs, one per text
//! leaf, for consumers that colour text themselves (terminals, editors).

use super::Renderer;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    /// Enclosing scopes, outermost first.
    pub scopes: Vec<String>,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct TokenListRenderer {
    open: Vec<String>,
    tokens: Vec<Token>,
}

impl TokenListRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for TokenListRenderer {
    type Output = Vec<Token>;

    fn open_node(&mut self, scope: &str) {
        self.open.push(scope.to_string());
    }

    fn close_node(&mut self, _scope: &str) {
        self.open.pop();
    }

    fn add_text(&mut self, text: &str) {
        match self.tokens.last_mut() {
            Some(last) if last.scopes == self.open => last.text.push_str(text),
            _ => self.tokens.push(Token {
                scopes: self.open.clone(),
                text: text.to_string(),
            }),
        }
    }

    fn finalize(self) -> Vec<Token> {
        self.tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::emitter::TokenTree;

    #[test]
    fn flattens_scopes_outermost_first() {
        let mut tree = TokenTree::new();
        tree.add_text("echo ");
        tree.open_node("string");
        tree.add_text("\"");
        tree.add_keyword("$HOME", "variable");
        tree.add_text("\"");
        tree.close_node();

        let tokens = tree.finalize().render(TokenListRenderer::new());
        let flat: Vec<(Vec<&str>, &str)> = tokens
            .iter()
            .map(|t| (t.scopes.iter().map(String::as_str).collect(), t.text.as_str()))
            .collect();
        assert_eq!(
            flat,
            vec![
                (vec![], "echo "),
                (vec!["string"], "\""),
                (vec!["string", "variable"], "$HOME"),
                (vec!["string"], "\""),
            ]
        );
    }
}
