//! Statement fingerprints.
//!
//! Two statements that differ only in literal values, whitespace, comments or
//! keyword case produce the same fingerprint.

use crate::lexer::{Lexeme, LexemeKind, matching_paren, split_top_level};

/// Keywords after which an opening parenthesis is written with a space.
const SPACED_BEFORE_PAREN: &[&str] = &[
    "IN", "VALUES", "VALUE", "AND", "OR", "NOT", "ON", "FROM", "JOIN", "WHERE", "EXISTS",
    "SELECT", "AS", "UNION", "ALL", "USING", "SET", "WHEN", "THEN", "ELSE", "HAVING",
];

/// Fingerprint of a tokenized statement.
pub fn fingerprint(lexemes: &[Lexeme], case_sensitive: bool) -> String {
    let mut pieces = Vec::with_capacity(lexemes.len());
    normalize(lexemes, case_sensitive, &mut pieces);

    let mut out = String::new();
    let mut prev: Option<&Piece> = None;
    for piece in &pieces {
        if let Some(p) = prev
            && needs_space(p, piece)
        {
            out.push(' ');
        }
        out.push_str(&piece.text);
        prev = Some(piece);
    }
    out
}

struct Piece {
    text: String,
    /// Identifier or non-clause word that glues to a following `(`.
    callable: bool,
}

impl Piece {
    fn symbol(text: &str) -> Self {
        Self {
            text: text.to_string(),
            callable: false,
        }
    }
}

fn needs_space(prev: &Piece, next: &Piece) -> bool {
    match next.text.as_str() {
        "," | ")" | "." => return false,
        "(" if prev.callable => return false,
        _ => {}
    }
    !matches!(prev.text.as_str(), "(" | ".")
}

fn normalize(lx: &[Lexeme], case_sensitive: bool, out: &mut Vec<Piece>) {
    let mut i = 0;
    while i < lx.len() {
        let l = &lx[i];
        let opens_group = lx.get(i + 1).is_some_and(|n| n.is_symbol("("));

        if l.is_any_kw(&["VALUES", "VALUE"]) && opens_group {
            out.push(piece(l, case_sensitive));
            let Some(close) = matching_paren(lx, i + 1) else {
                normalize(&lx[i + 1..], case_sensitive, out);
                return;
            };
            normalize(&lx[i + 1..=close], case_sensitive, out);
            let mut next = close + 1;
            while lx.get(next).is_some_and(|c| c.is_symbol(","))
                && lx.get(next + 1).is_some_and(|o| o.is_symbol("("))
            {
                match matching_paren(lx, next + 1) {
                    Some(end) => next = end + 1,
                    None => break,
                }
            }
            i = next;
            continue;
        }

        if l.is_kw("IN")
            && opens_group
            && let Some(close) = matching_paren(lx, i + 1)
        {
            let inner = &lx[i + 2..close];
            if !inner.is_empty() && split_top_level(inner, ",").iter().all(|p| literal_item(p)) {
                out.push(piece(l, case_sensitive));
                out.extend(["(", "?", ")"].map(Piece::symbol));
                i = close + 1;
                continue;
            }
        }

        if (l.is_symbol("-") || l.is_symbol("+"))
            && lx.get(i + 1).is_some_and(|n| n.kind == LexemeKind::Number)
            && unary_position(i.checked_sub(1).map(|p| &lx[p]))
        {
            i += 1;
            continue;
        }

        out.push(piece(l, case_sensitive));
        i += 1;
    }
}

fn literal_item(part: &[Lexeme]) -> bool {
    match part {
        [single] => single.is_literal(),
        [sign, number] => {
            (sign.is_symbol("-") || sign.is_symbol("+")) && number.kind == LexemeKind::Number
        }
        _ => false,
    }
}

/// A sign is unary at the start, after an operator or after a keyword.
fn unary_position(prev: Option<&Lexeme>) -> bool {
    match prev {
        None => true,
        Some(p) => match p.kind {
            LexemeKind::Symbol => !p.is_symbol(")"),
            LexemeKind::Word { keyword } => keyword,
            _ => false,
        },
    }
}

fn piece(l: &Lexeme, case_sensitive: bool) -> Piece {
    let fold = |s: &str| {
        if case_sensitive {
            s.to_string()
        } else {
            s.to_lowercase()
        }
    };
    match l.kind {
        LexemeKind::String | LexemeKind::Number | LexemeKind::Placeholder => Piece::symbol("?"),
        LexemeKind::Word { keyword: true } => Piece {
            text: l.value.to_lowercase(),
            callable: !l.is_any_kw(SPACED_BEFORE_PAREN),
        },
        LexemeKind::Word { keyword: false } => Piece {
            text: fold(&l.value),
            callable: true,
        },
        LexemeKind::QuotedIdent => Piece {
            text: format!("`{}`", fold(&l.value)),
            callable: true,
        },
        LexemeKind::Symbol => Piece::symbol(&l.value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::tokenize;
    use pretty_assertions::assert_eq;

    fn fp(sql: &str) -> String {
        fingerprint(&tokenize(sql).unwrap(), false)
    }

    #[test]
    fn test_literals_abstracted() {
        assert_eq!(
            fp("SELECT a FROM t WHERE id = 42 AND name = 'bob'"),
            fp("select a   from t where id = 7 and name = \"alice\"")
        );
        assert_eq!(fp("SELECT * FROM t WHERE x = -5"), "select * from t where x = ?");
        assert_eq!(fp("SELECT qty - 1 FROM t"), "select qty - ? from t");
    }

    #[test]
    fn test_value_tuples_collapse() {
        assert_eq!(
            fp("INSERT INTO t (a, b) VALUES (1, 'x'), (2, 'y'), (3, 'z')"),
            "insert into t(a, b) values (?, ?)"
        );
        assert_eq!(
            fp("INSERT INTO t (a, b) VALUES (1, 'x')"),
            fp("INSERT INTO t (a, b) VALUES (1, 'x'), (2, 'y')")
        );
    }

    #[test]
    fn test_in_list_collapse() {
        assert_eq!(
            fp("DELETE FROM t WHERE id IN (1, 2, 3)"),
            "delete from t where id in (?)"
        );
        assert_eq!(fp("SELECT 1 FROM t WHERE id IN (4)"), fp("SELECT 1 FROM t WHERE id IN (5, 6)"));
    }

    #[test]
    fn test_comments_and_quotes() {
        assert_eq!(
            fp("/* hint */ SELECT `Id` FROM `Shop`.`Orders` -- trailing\n"),
            "select `id` from `shop`.`orders`"
        );
    }

    #[test]
    fn test_case_sensitive_identifiers_kept() {
        let lexemes = tokenize("SELECT `Id` FROM `Orders`").unwrap();
        assert_eq!(fingerprint(&lexemes, true), "select `Id` from `Orders`");
    }
}
