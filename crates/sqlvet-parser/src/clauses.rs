//! Top-level clause boundaries of DML statements.
//!
//! The affected-rows estimator and several rules need the text of a
//! statement's `FROM`, `WHERE`, `ORDER BY` or `LIMIT` clause. Only keywords at
//! parenthesis depth zero start a clause, so subqueries stay inside the clause
//! that contains them.

use std::ops::Range;

use crate::lexer::{Lexeme, slice_text};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Clause {
    Select,
    From,
    Where,
    GroupBy,
    Having,
    OrderBy,
    Limit,
    Set,
    Using,
    Values,
    OnDuplicate,
    Lock,
    /// Everything after the first top-level `UNION`.
    Union,
}

/// Clause bodies as lexeme index ranges.
#[derive(Debug, Clone, Default)]
pub struct Clauses {
    entries: Vec<(Clause, Range<usize>)>,
}

impl Clauses {
    pub fn scan(lx: &[Lexeme]) -> Self {
        let mut starts: Vec<(Clause, usize, usize)> = Vec::new();
        let mut depth = 0usize;
        let mut i = 0;

        while i < lx.len() {
            let l = &lx[i];
            if l.is_symbol("(") {
                depth += 1;
                i += 1;
                continue;
            }
            if l.is_symbol(")") {
                depth = depth.saturating_sub(1);
                i += 1;
                continue;
            }
            if depth > 0 {
                i += 1;
                continue;
            }

            let next = lx.get(i + 1);
            let found = if l.is_kw("SELECT") {
                Some((Clause::Select, 1))
            } else if l.is_kw("FROM") {
                Some((Clause::From, 1))
            } else if l.is_kw("WHERE") {
                Some((Clause::Where, 1))
            } else if l.is_kw("GROUP") && next.is_some_and(|n| n.is_kw("BY")) {
                Some((Clause::GroupBy, 2))
            } else if l.is_kw("HAVING") {
                Some((Clause::Having, 1))
            } else if l.is_kw("ORDER") && next.is_some_and(|n| n.is_kw("BY")) {
                Some((Clause::OrderBy, 2))
            } else if l.is_kw("LIMIT") {
                Some((Clause::Limit, 1))
            } else if l.is_kw("SET") {
                Some((Clause::Set, 1))
            } else if l.is_kw("USING") && !next.is_some_and(|n| n.is_symbol("(")) {
                Some((Clause::Using, 1))
            } else if l.is_any_kw(&["VALUES", "VALUE"]) {
                Some((Clause::Values, 1))
            } else if l.is_kw("ON") && next.is_some_and(|n| n.is_kw("DUPLICATE")) {
                Some((Clause::OnDuplicate, 1))
            } else if (l.is_kw("FOR") && next.is_some_and(|n| n.is_any_kw(&["UPDATE", "SHARE"])))
                || (l.is_kw("LOCK") && next.is_some_and(|n| n.is_kw("IN")))
            {
                Some((Clause::Lock, 1))
            } else if l.is_kw("UNION") {
                Some((Clause::Union, 1))
            } else {
                None
            };

            if let Some((clause, width)) = found {
                starts.push((clause, i, i + width));
                i += width;
                if matches!(clause, Clause::OnDuplicate | Clause::Union) {
                    break;
                }
            } else {
                i += 1;
            }
        }

        let mut entries: Vec<(Clause, Range<usize>)> = Vec::new();
        for (idx, (clause, _, body_start)) in starts.iter().enumerate() {
            let body_end = match starts.get(idx + 1) {
                Some((_, next_start, _)) => *next_start,
                None => lx.len(),
            };
            if !entries.iter().any(|(c, _)| c == clause) {
                entries.push((*clause, *body_start..body_end));
            }
        }
        Self { entries }
    }

    pub fn has(&self, clause: Clause) -> bool {
        self.entries.iter().any(|(c, _)| *c == clause)
    }

    pub fn has_union(&self) -> bool {
        self.has(Clause::Union)
    }

    /// Lexeme range of the clause body (keywords excluded).
    pub fn range(&self, clause: Clause) -> Option<Range<usize>> {
        self.entries
            .iter()
            .find(|(c, _)| *c == clause)
            .map(|(_, r)| r.clone())
    }

    pub fn lexemes<'a>(&self, clause: Clause, lx: &'a [Lexeme]) -> Option<&'a [Lexeme]> {
        self.range(clause).map(|r| &lx[r])
    }

    /// Source text of the clause body.
    pub fn text<'a>(&self, clause: Clause, text: &'a str, lx: &[Lexeme]) -> Option<&'a str> {
        self.lexemes(clause, lx)
            .map(|body| slice_text(text, body))
            .filter(|s| !s.is_empty())
    }
}
