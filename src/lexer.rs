use anyhow::{anyhow, Result};
use logos::Logos;

// Tokens of the framing lines of a Unity text asset:
//   %YAML 1.1
//   %TAG !u! tag:unity3d.com,2011:
//   --- !u!129 &1
// Document bodies are plain YAML and never go through this lexer.
#[derive(Logos, Debug, PartialEq, Clone)]
pub enum TokenKind {
    #[regex(r"[ \t\r\n]+", logos::skip)]
    Whitespace,

    #[token("---")]
    DocStart,
    #[token("!u!")]
    UnityTag,
    #[token("&")]
    Anchor,
    #[token("stripped")]
    Stripped,
    #[regex(r"%[A-Z]+")]
    Directive,
    #[regex(r"[0-9]+\.[0-9]+")]
    Version,
    #[regex(r"-?[0-9]+")]
    Int,
    // Tag prefixes and other bare words, e.g. `tag:unity3d.com,2011:`
    #[regex(r"[A-Za-z][A-Za-z0-9_.:,/-]*")]
    Word,

    #[error]
    Error,
}

#[derive(Debug, Clone)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub col: usize,
}

/// Lex a single framing line. `line` is only used for diagnostics.
pub fn lex(input: &str, line: usize) -> Result<Vec<Token>> {
    let mut lex = TokenKind::lexer(input);
    let mut tokens = Vec::new();
    while let Some(kind) = lex.next() {
        let text = lex.slice().to_string();
        let col = lex.span().start + 1;
        if matches!(kind, TokenKind::Error) {
            return Err(anyhow!("lex error at {}:{} near '{}'", line, col, text));
        }
        tokens.push(Token { kind, text, col });
    }
    Ok(tokens)
}
