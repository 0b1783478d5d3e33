//! Lexeme stream over the sqlparser tokenizer.
//!
//! The statement readers in this crate work on a flattened token stream with
//! whitespace and comments removed. Every lexeme keeps the byte range of its
//! source text so that clauses can be sliced out of the original statement
//! verbatim.

use sqlparser::dialect::MySqlDialect;
use sqlparser::keywords::Keyword;
use sqlparser::tokenizer::{Token, Tokenizer};
use std::ops::Range;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexemeKind {
    /// Unquoted word. `keyword` tells whether the dialect reserves it.
    Word { keyword: bool },
    /// Backtick-quoted identifier.
    QuotedIdent,
    String,
    Number,
    Placeholder,
    Symbol,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    /// Identifier or literal value with quotes removed, or the symbol text.
    pub value: String,
    /// Byte range in the text the lexeme was read from.
    pub span: Range<usize>,
    /// 1-based source line.
    pub line: usize,
}

impl Lexeme {
    /// Unquoted word equal to `kw`, ignoring case.
    pub fn is_kw(&self, kw: &str) -> bool {
        matches!(self.kind, LexemeKind::Word { .. }) && self.value.eq_ignore_ascii_case(kw)
    }

    pub fn is_any_kw(&self, kws: &[&str]) -> bool {
        kws.iter().any(|kw| self.is_kw(kw))
    }

    pub fn is_symbol(&self, sym: &str) -> bool {
        self.kind == LexemeKind::Symbol && self.value == sym
    }

    /// Word or quoted identifier.
    pub fn is_ident(&self) -> bool {
        matches!(self.kind, LexemeKind::Word { .. } | LexemeKind::QuotedIdent)
    }

    pub fn is_literal(&self) -> bool {
        matches!(
            self.kind,
            LexemeKind::String | LexemeKind::Number | LexemeKind::Placeholder
        )
    }

    pub fn is_quoted(&self) -> bool {
        self.kind == LexemeKind::QuotedIdent
    }
}

/// Tokenize `sql` with the MySQL dialect, dropping whitespace and comments.
pub fn tokenize(sql: &str) -> Result<Vec<Lexeme>, ParseError> {
    let dialect = MySqlDialect {};
    let tokens = Tokenizer::new(&dialect, sql)
        .tokenize_with_location()
        .map_err(|e| ParseError::Tokenize(e.to_string()))?;

    let index = LineIndex::new(sql);
    let starts: Vec<usize> = tokens
        .iter()
        .map(|t| index.offset(sql, t.span.start.line, t.span.start.column))
        .collect();

    let mut lexemes = Vec::with_capacity(tokens.len());
    for (i, t) in tokens.iter().enumerate() {
        let start = starts[i];
        let end = starts.get(i + 1).copied().unwrap_or(sql.len()).max(start);
        let line = t.span.start.line as usize;

        let (kind, value) = match &t.token {
            Token::Whitespace(_) | Token::EOF => continue,
            Token::Word(w) => match w.quote_style {
                Some(_) => (LexemeKind::QuotedIdent, w.value.clone()),
                None => (
                    LexemeKind::Word {
                        keyword: w.keyword != Keyword::NoKeyword,
                    },
                    w.value.clone(),
                ),
            },
            Token::SingleQuotedString(s)
            | Token::DoubleQuotedString(s)
            | Token::NationalStringLiteral(s)
            | Token::EscapedStringLiteral(s)
            | Token::HexStringLiteral(s) => (LexemeKind::String, s.clone()),
            Token::Number(n, _) => (LexemeKind::Number, n.clone()),
            Token::Placeholder(p) => (LexemeKind::Placeholder, p.clone()),
            other => (LexemeKind::Symbol, other.to_string()),
        };

        lexemes.push(Lexeme {
            kind,
            value,
            span: start..end,
            line,
        });
    }

    Ok(lexemes)
}

/// Byte offsets of line starts, for converting tokenizer locations.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(text: &str) -> Self {
        let starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { starts }
    }

    /// Byte offset of a 1-based (line, column) position, column counted in chars.
    fn offset(&self, text: &str, line: u64, column: u64) -> usize {
        let line_idx = (line as usize).saturating_sub(1);
        let Some(&line_start) = self.starts.get(line_idx) else {
            return text.len();
        };
        let col_idx = (column as usize).saturating_sub(1);
        text[line_start..]
            .char_indices()
            .nth(col_idx)
            .map(|(i, _)| line_start + i)
            .unwrap_or(text.len())
    }
}

/// Index of the lexeme closing the group opened at `open` (which must be `(`).
pub fn matching_paren(lexemes: &[Lexeme], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, lx) in lexemes.iter().enumerate().skip(open) {
        if lx.is_symbol("(") {
            depth += 1;
        } else if lx.is_symbol(")") {
            depth = depth.saturating_sub(1);
            if depth == 0 {
                return Some(i);
            }
        }
    }
    None
}

/// Split `lexemes` at top-level occurrences of the symbol `sep`.
pub fn split_top_level<'a>(lexemes: &'a [Lexeme], sep: &str) -> Vec<&'a [Lexeme]> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, lx) in lexemes.iter().enumerate() {
        if lx.is_symbol("(") {
            depth += 1;
        } else if lx.is_symbol(")") {
            depth = depth.saturating_sub(1);
        } else if depth == 0 && lx.is_symbol(sep) {
            parts.push(&lexemes[start..i]);
            start = i + 1;
        }
    }
    if start < lexemes.len() {
        parts.push(&lexemes[start..]);
    }
    parts
}

/// Source text covered by a run of lexemes.
pub fn slice_text<'a>(text: &'a str, lexemes: &[Lexeme]) -> &'a str {
    match (lexemes.first(), lexemes.last()) {
        (Some(first), Some(last)) => &text[first.span.start..last.span.end],
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_kinds_and_spans() {
        let sql = "SELECT `id`, name FROM t WHERE x = 'a''b' AND y = 10";
        let lexemes = tokenize(sql).unwrap();

        assert!(lexemes[0].is_kw("select"));
        assert_eq!(lexemes[1].kind, LexemeKind::QuotedIdent);
        assert_eq!(lexemes[1].value, "id");
        assert_eq!(&sql[lexemes[1].span.clone()], "`id`");

        let s = lexemes.iter().find(|l| l.kind == LexemeKind::String).unwrap();
        assert_eq!(s.value, "a'b");
        assert_eq!(&sql[s.span.clone()], "'a''b'");

        let n = lexemes.last().unwrap();
        assert_eq!(n.kind, LexemeKind::Number);
        assert_eq!(&sql[n.span.clone()], "10");
    }

    #[test]
    fn test_comments_are_dropped() {
        let sql = "-- leading\nSELECT 1 /* inline */ FROM dual\n";
        let lexemes = tokenize(sql).unwrap();
        let values: Vec<_> = lexemes.iter().map(|l| l.value.as_str()).collect();
        assert_eq!(values, vec!["SELECT", "1", "FROM", "dual"]);
        assert_eq!(lexemes[0].line, 2);
    }

    #[test]
    fn test_multibyte_offsets() {
        let sql = "SELECT 'héllo', ok FROM t";
        let lexemes = tokenize(sql).unwrap();
        let ok = lexemes.iter().find(|l| l.value == "ok").unwrap();
        assert_eq!(&sql[ok.span.clone()], "ok");
    }

    #[test]
    fn test_split_top_level() {
        let lexemes = tokenize("a, f(b, c), d").unwrap();
        let parts = split_top_level(&lexemes, ",");
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 6);
    }
}
