//! Syntax highlighting for the REPL.

use std::borrow::Cow;

use monkey_language::{Lexer, TokenKind};

const KEYWORD: &str = "\x1b[1;35m";
const STRING: &str = "\x1b[33m";
const NUMBER: &str = "\x1b[36m";
const BOOLEAN: &str = "\x1b[1;36m";
const ILLEGAL: &str = "\x1b[4;31m";
const RESET: &str = "\x1b[0m";

/// Highlighter for Monkey source.
///
/// Colors are taken from the lexer's token stream, so the highlighting
/// always agrees with how the line will actually be tokenized.
#[derive(Debug, Default)]
pub struct MonkeyHighlighter;

impl MonkeyHighlighter {
    /// Creates a new highlighter.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Highlights a line of input.
    #[allow(clippy::unused_self)]
    pub fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let mut result = String::with_capacity(line.len() * 2);
        let mut copied = 0;

        for token in Lexer::tokenize_all(line) {
            let Some(color) = color_for(&token.kind) else {
                continue;
            };
            let (start, end) = (token.span.start, token.span.end);
            if start < copied || end > line.len() || start >= end {
                continue;
            }
            result.push_str(&line[copied..start]);
            result.push_str(color);
            result.push_str(&line[start..end]);
            result.push_str(RESET);
            copied = end;
        }

        if copied == 0 {
            return Cow::Borrowed(line);
        }
        result.push_str(&line[copied..]);
        Cow::Owned(result)
    }
}

fn color_for(kind: &TokenKind) -> Option<&'static str> {
    match kind {
        TokenKind::Function
        | TokenKind::Let
        | TokenKind::If
        | TokenKind::Else
        | TokenKind::Return => Some(KEYWORD),
        TokenKind::True | TokenKind::False => Some(BOOLEAN),
        TokenKind::Int(_) => Some(NUMBER),
        TokenKind::String(_) => Some(STRING),
        TokenKind::Illegal(_) => Some(ILLEGAL),
        _ => None,
    }
}
