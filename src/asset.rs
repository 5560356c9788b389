//! Unity text-asset documents.
//!
//! A Unity `.asset` file is a YAML stream with a `%TAG !u!` preamble and one
//! document per serialized object, each introduced by `--- !u!<classID> &<fileID>`.
//! Generic YAML dumpers reorder, requote and reflow these files, so edits are
//! applied line by line and everything that is not edited is rendered back
//! exactly as it was read.

use thiserror::Error;

use crate::lexer::{self, TokenKind};

#[derive(Debug, Error)]
#[error("line {line}: {message}")]
pub struct AssetError {
    pub line: usize,
    pub message: String,
}

impl AssetError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self { line, message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentHeader {
    pub class_id: i64,
    pub file_id: i64,
    pub stripped: bool,
}

#[derive(Debug, Clone)]
pub struct AssetDocument {
    pub header: DocumentHeader,
    /// 1-based line of the `---` header in the source file.
    pub line: usize,
    header_text: String,
    body: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct UnityAsset {
    preamble: Vec<String>,
    documents: Vec<AssetDocument>,
}

impl UnityAsset {
    pub fn parse(text: &str) -> Result<Self, AssetError> {
        let mut preamble = Vec::new();
        let mut documents: Vec<AssetDocument> = Vec::new();

        for (idx, raw) in text.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            let content = raw.trim_end_matches(['\n', '\r']);
            if content.starts_with("---") {
                let header = parse_header(content, line_no)?;
                documents.push(AssetDocument {
                    header,
                    line: line_no,
                    header_text: raw.to_string(),
                    body: Vec::new(),
                });
                continue;
            }
            match documents.last_mut() {
                Some(doc) => doc.body.push(raw.to_string()),
                None => {
                    let trimmed = content.trim();
                    if trimmed.starts_with('%') {
                        lexer::lex(content, line_no).map_err(|e| AssetError::new(line_no, e.to_string()))?;
                    } else if !trimmed.is_empty() && !trimmed.starts_with('#') {
                        return Err(AssetError::new(line_no, "content before the first document header"));
                    }
                    preamble.push(raw.to_string());
                }
            }
        }

        if documents.is_empty() {
            return Err(AssetError::new(1, "no `--- !u!` documents found"));
        }
        for doc in &documents {
            doc.value()?;
        }
        Ok(Self { preamble, documents })
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in &self.preamble {
            out.push_str(line);
        }
        for doc in &self.documents {
            out.push_str(&doc.header_text);
            for line in &doc.body {
                out.push_str(line);
            }
        }
        out
    }

    pub fn document_by_class(&self, class_id: i64) -> Option<usize> {
        self.documents.iter().position(|d| d.header.class_id == class_id)
    }

    pub fn document_by_root_key(&self, key: &str) -> Option<usize> {
        self.documents.iter().position(|d| d.root_key() == Some(key))
    }

    pub fn document(&self, idx: usize) -> &AssetDocument {
        &self.documents[idx]
    }

    pub fn document_mut(&mut self, idx: usize) -> &mut AssetDocument {
        &mut self.documents[idx]
    }
}

fn parse_header(content: &str, line: usize) -> Result<DocumentHeader, AssetError> {
    let toks = lexer::lex(content, line).map_err(|e| AssetError::new(line, e.to_string()))?;
    let kinds: Vec<&TokenKind> = toks.iter().map(|t| &t.kind).collect();
    match kinds.as_slice() {
        [TokenKind::DocStart, TokenKind::UnityTag, TokenKind::Int, TokenKind::Anchor, TokenKind::Int, rest @ ..]
            if rest.is_empty() || rest == [&TokenKind::Stripped] =>
        {
            let number = |i: usize| {
                toks[i]
                    .text
                    .parse::<i64>()
                    .map_err(|e| AssetError::new(line, format!("column {}: {}", toks[i].col, e)))
            };
            Ok(DocumentHeader {
                class_id: number(2)?,
                file_id: number(4)?,
                stripped: !rest.is_empty(),
            })
        }
        _ => Err(AssetError::new(line, format!("malformed document header '{}'", content))),
    }
}

fn indent_of(line: &str) -> usize {
    line.len() - line.trim_start_matches(' ').len()
}

fn is_structural(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && !t.starts_with('#')
}

/// Key of a block-mapping line, `None` for sequence items and scalars.
fn key_of(line: &str) -> Option<&str> {
    let t = line.trim();
    if t.starts_with('-') || t.starts_with('#') {
        return None;
    }
    let (key, rest) = t.split_once(':')?;
    if rest.is_empty() || rest.starts_with(' ') {
        Some(key.trim_matches(|c| c == '\'' || c == '"'))
    } else {
        None
    }
}

fn is_plain_symbol_list(value: &str) -> bool {
    value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ';')
        && value.chars().next().map_or(true, |c| c.is_ascii_alphabetic() || c == '_')
}

impl AssetDocument {
    /// Top-level key of the body, `PlayerSettings` for a settings document.
    pub fn root_key(&self) -> Option<&str> {
        self.body
            .iter()
            .find(|l| is_structural(l))
            .filter(|l| indent_of(l) == 0)
            .and_then(|l| key_of(l))
    }

    fn body_text(&self) -> String {
        self.body.concat()
    }

    pub fn value(&self) -> Result<serde_yaml::Value, AssetError> {
        let body = self.body_text();
        if body.trim().is_empty() {
            return Ok(serde_yaml::Value::Null);
        }
        serde_yaml::from_str(&body).map_err(|e| {
            let line = e.location().map_or(self.line, |loc| self.line + loc.line());
            AssetError::new(line, e.to_string())
        })
    }

    /// Index into the body of the line holding the last key of `path`.
    ///
    /// Only block mappings are walked; a key whose children are written in
    /// flow style (`key: {a: b}`) has no child lines and yields `None`.
    pub fn locate(&self, path: &[&str]) -> Option<usize> {
        let mut lo = 0;
        let mut hi = self.body.len();
        let mut parent_indent: Option<usize> = None;
        let mut found = None;
        for segment in path {
            let child_indent = self.body[lo..hi]
                .iter()
                .find(|l| is_structural(l))
                .map(|l| indent_of(l))?;
            if parent_indent.is_some_and(|p| child_indent <= p) {
                return None;
            }
            let idx = (lo..hi).find(|&i| {
                let l = &self.body[i];
                is_structural(l) && indent_of(l) == child_indent && key_of(l) == Some(*segment)
            })?;
            let end = (idx + 1..hi)
                .find(|&i| is_structural(&self.body[i]) && indent_of(&self.body[i]) <= child_indent)
                .unwrap_or(hi);
            parent_indent = Some(child_indent);
            lo = idx + 1;
            hi = end;
            found = Some(idx);
        }
        found
    }

    /// Body lines taken by the entry whose key sits on line `idx`: the key
    /// line plus any continuation lines of a multi-line scalar.
    fn entry_span(&self, idx: usize) -> std::ops::Range<usize> {
        let key_indent = indent_of(&self.body[idx]);
        let mut end = idx + 1;
        let mut scan = idx + 1;
        while let Some(line) = self.body.get(scan) {
            scan += 1;
            // blank lines only belong to the value if deeper lines follow
            if line.trim().is_empty() {
                continue;
            }
            if indent_of(line) <= key_indent {
                break;
            }
            end = scan;
        }
        idx..end
    }

    /// Rewrite the scalar value of the key line at `idx` as a single line,
    /// keeping its indentation, key spelling and line terminator. Continuation
    /// lines of a folded value are dropped.
    pub fn replace_scalar(&mut self, idx: usize, value: &str) -> Option<()> {
        let line = self.body.get(idx)?;
        key_of(line)?;
        let content = line.trim_end_matches(['\n', '\r']);
        let eol = &line[content.len()..];
        let raw_key = content.trim_start().split_once(':')?.0;
        let rendered = if is_plain_symbol_list(value) {
            value.to_string()
        } else {
            format!("'{}'", value.replace('\'', "''"))
        };
        let indent = " ".repeat(indent_of(content));
        let replacement = format!("{indent}{raw_key}: {rendered}{eol}");
        let span = self.entry_span(idx);
        self.body.splice(span, [replacement]);
        Some(())
    }

    /// Source line number (1-based) of body line `idx`.
    pub fn source_line(&self, idx: usize) -> usize {
        self.line + idx + 1
    }
}
