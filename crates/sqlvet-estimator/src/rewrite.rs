//! Count-equivalent rewrites of DML statements.
//!
//! Grouped, limited, distinct, unioned or `FROM`-less selects cannot be turned
//! into a plain `COUNT` over the same clauses, so they are wrapped whole as a
//! derived table. Everything else becomes a fresh `SELECT COUNT(1)` over the
//! original `FROM`, `WHERE` and `ORDER BY`.

use sqlparser::ast::{Expr, SelectItem, SetExpr, Statement};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use sqlvet_parser::lexer::slice_text;
use sqlvet_parser::{Clause, Clauses, Lexeme, StatementEnvelope, StatementKind};

use crate::error::EstimateError;

/// What a statement's affected rows can be derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountQuery {
    /// Known without the server (`INSERT ... VALUES`).
    Literal(u64),
    /// A query returning the count as its single value.
    Query(String),
}

pub fn rewrite(stmt: &StatementEnvelope) -> Result<CountQuery, EstimateError> {
    let text = stmt.text.as_str();
    let lx = stmt.lexemes.as_slice();

    match &stmt.kind {
        StatementKind::Select(_) => Ok(CountQuery::Query(rewrite_select(text, lx)?)),
        StatementKind::Insert(insert) => {
            if let Some(rows) = insert.value_rows {
                return Ok(CountQuery::Literal(rows as u64));
            }
            let clauses = Clauses::scan(lx);
            let Some(select) = clauses.range(Clause::Select) else {
                return Err(EstimateError::UnsupportedStatementType(
                    "INSERT without VALUES or SELECT".to_string(),
                ));
            };
            let mut start = select.start - 1;
            while start > 0 && lx[start - 1].is_symbol("(") {
                start -= 1;
            }
            let end = clauses
                .range(Clause::OnDuplicate)
                .map(|r| r.start - 1)
                .unwrap_or(lx.len());
            Ok(CountQuery::Query(rewrite_select(text, &lx[start..end])?))
        }
        StatementKind::Update(_) => {
            let clauses = Clauses::scan(lx);
            let set = clauses.range(Clause::Set).ok_or_else(|| {
                EstimateError::UnsupportedStatementType("UPDATE without SET".to_string())
            })?;
            let mut start = 1;
            while lx
                .get(start)
                .is_some_and(|l| l.is_any_kw(&["LOW_PRIORITY", "IGNORE"]))
            {
                start += 1;
            }
            let tables = slice_text(text, &lx[start..set.start - 1]);
            Ok(CountQuery::Query(mutation_count(tables, text, lx, &clauses)))
        }
        StatementKind::Delete(_) => {
            let clauses = Clauses::scan(lx);
            let tables = clauses
                .text(Clause::Using, text, lx)
                .or_else(|| clauses.text(Clause::From, text, lx))
                .ok_or_else(|| {
                    EstimateError::UnsupportedStatementType("DELETE without FROM".to_string())
                })?;
            Ok(CountQuery::Query(mutation_count(tables, text, lx, &clauses)))
        }
        other => Err(EstimateError::UnsupportedStatementType(
            other.name().to_string(),
        )),
    }
}

fn rewrite_select(text: &str, lx: &[Lexeme]) -> Result<String, EstimateError> {
    let clauses = Clauses::scan(lx);
    let leading_select = lx.first().is_some_and(|l| l.is_kw("SELECT"));
    let distinct = lx
        .get(1)
        .is_some_and(|l| l.is_any_kw(&["DISTINCT", "DISTINCTROW"]));

    let from = clauses.text(Clause::From, text, lx);
    let must_wrap = !leading_select
        || distinct
        || from.is_none()
        || clauses.has(Clause::GroupBy)
        || clauses.has(Clause::Having)
        || clauses.has(Clause::Limit)
        || clauses.has_union();

    if must_wrap {
        let end = clauses
            .range(Clause::Lock)
            .map(|r| r.start - 1)
            .unwrap_or(lx.len());
        let body = slice_text(text, &lx[..end]);
        return Ok(format!("SELECT COUNT(*) FROM ({body}) AS t"));
    }

    let from = from.ok_or_else(|| {
        EstimateError::UnsupportedStatementType("SELECT without FROM".to_string())
    })?;
    let mut sql = format!("SELECT COUNT(1) FROM {from}");
    push_clause(&mut sql, "WHERE", clauses.text(Clause::Where, text, lx));
    push_clause(&mut sql, "ORDER BY", clauses.text(Clause::OrderBy, text, lx));
    Ok(sql)
}

fn mutation_count(tables: &str, text: &str, lx: &[Lexeme], clauses: &Clauses) -> String {
    let mut inner = String::new();
    push_clause(&mut inner, "WHERE", clauses.text(Clause::Where, text, lx));
    push_clause(&mut inner, "ORDER BY", clauses.text(Clause::OrderBy, text, lx));

    match clauses.text(Clause::Limit, text, lx) {
        Some(limit) => format!("SELECT COUNT(*) FROM (SELECT 1 FROM {tables}{inner} LIMIT {limit}) AS t"),
        None => format!("SELECT COUNT(1) FROM {tables}{inner}"),
    }
}

fn push_clause(sql: &mut String, keyword: &str, body: Option<&str>) {
    if let Some(body) = body {
        sql.push(' ');
        sql.push_str(keyword);
        sql.push(' ');
        sql.push_str(body);
    }
}

/// Re-parse a rewritten statement and require a lone `COUNT` in its select list.
pub fn validate_count_query(sql: &str) -> Result<(), EstimateError> {
    let reject = |reason: &str| EstimateError::RewriteValidationFailed {
        sql: sql.to_string(),
        reason: reason.to_string(),
    };

    let statements = Parser::parse_sql(&MySqlDialect {}, sql).map_err(|e| reject(&e.to_string()))?;
    let [Statement::Query(query)] = statements.as_slice() else {
        return Err(reject("expected a single query"));
    };
    let SetExpr::Select(select) = query.body.as_ref() else {
        return Err(reject("expected a plain SELECT"));
    };
    let [item] = select.projection.as_slice() else {
        return Err(reject("expected exactly one select item"));
    };
    let expr = match item {
        SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => expr,
        _ => return Err(reject("select item is not an expression")),
    };
    match expr {
        Expr::Function(f) if f.name.to_string().eq_ignore_ascii_case("count") => Ok(()),
        _ => Err(reject("select item is not a COUNT aggregate")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sqlvet_parser::SqlParser;

    fn rewritten(sql: &str) -> CountQuery {
        rewrite(&SqlParser::new().parse_one(sql).unwrap()).unwrap()
    }

    fn query(sql: &str) -> String {
        match rewritten(sql) {
            CountQuery::Query(q) => q,
            other => panic!("expected a query, got {other:?}"),
        }
    }

    #[test]
    fn test_insert_values_is_literal() {
        assert_eq!(
            rewritten("INSERT INTO t(c) VALUES (1),(2),(3)"),
            CountQuery::Literal(3)
        );
        assert_eq!(rewritten("INSERT INTO t SET c = 1"), CountQuery::Literal(1));
    }

    #[test]
    fn test_plain_select_becomes_count() {
        assert_eq!(
            query("SELECT * FROM t WHERE x = 1 ORDER BY id"),
            "SELECT COUNT(1) FROM t WHERE x = 1 ORDER BY id"
        );
        assert_eq!(
            query("SELECT a.id FROM a JOIN b ON a.id = b.a_id"),
            "SELECT COUNT(1) FROM a JOIN b ON a.id = b.a_id"
        );
    }

    #[test]
    fn test_grouped_or_limited_select_is_wrapped() {
        assert_eq!(
            query("SELECT x, COUNT(*) FROM t GROUP BY x HAVING COUNT(*) > 1"),
            "SELECT COUNT(*) FROM (SELECT x, COUNT(*) FROM t GROUP BY x HAVING COUNT(*) > 1) AS t"
        );
        assert_eq!(
            query("SELECT * FROM t LIMIT 10, 5"),
            "SELECT COUNT(*) FROM (SELECT * FROM t LIMIT 10, 5) AS t"
        );
        assert_eq!(
            query("SELECT DISTINCT x FROM t"),
            "SELECT COUNT(*) FROM (SELECT DISTINCT x FROM t) AS t"
        );
        assert_eq!(
            query("SELECT * FROM t WHERE id = 1 FOR UPDATE"),
            "SELECT COUNT(1) FROM t WHERE id = 1"
        );
    }

    #[test]
    fn test_insert_select_rewrites_inner_select() {
        assert_eq!(
            query("INSERT INTO t (a) SELECT a FROM s WHERE a > 1 ON DUPLICATE KEY UPDATE a = 2"),
            "SELECT COUNT(1) FROM s WHERE a > 1"
        );
    }

    #[test]
    fn test_update_and_delete() {
        assert_eq!(
            query("UPDATE t SET x = 1 WHERE y = 2"),
            "SELECT COUNT(1) FROM t WHERE y = 2"
        );
        assert_eq!(
            query("UPDATE t SET x = 1 LIMIT 5"),
            "SELECT COUNT(*) FROM (SELECT 1 FROM t LIMIT 5) AS t"
        );
        assert_eq!(
            query("DELETE FROM t WHERE y = 2 ORDER BY id LIMIT 3"),
            "SELECT COUNT(*) FROM (SELECT 1 FROM t WHERE y = 2 ORDER BY id LIMIT 3) AS t"
        );
        assert_eq!(
            query("DELETE t1 FROM t1 JOIN t2 ON t1.id = t2.id WHERE t2.x = 1"),
            "SELECT COUNT(1) FROM t1 JOIN t2 ON t1.id = t2.id WHERE t2.x = 1"
        );
    }

    #[test]
    fn test_other_statements_unsupported() {
        let stmt = SqlParser::new().parse_one("CREATE TABLE t (id int)").unwrap();
        assert!(matches!(
            rewrite(&stmt),
            Err(EstimateError::UnsupportedStatementType(_))
        ));
    }

    #[test]
    fn test_validation() {
        assert!(validate_count_query("SELECT COUNT(1) FROM t WHERE x = 1").is_ok());
        assert!(validate_count_query("SELECT count(*) AS n FROM (SELECT 1 FROM t) AS t").is_ok());
        assert!(matches!(
            validate_count_query("SELECT COUNT(1), x FROM t"),
            Err(EstimateError::RewriteValidationFailed { .. })
        ));
        assert!(matches!(
            validate_count_query("DELETE FROM t"),
            Err(EstimateError::RewriteValidationFailed { .. })
        ));
        assert!(matches!(
            validate_count_query("SELECT MAX(x) FROM t"),
            Err(EstimateError::RewriteValidationFailed { .. })
        ));
    }
}
