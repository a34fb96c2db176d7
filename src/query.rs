//! Select requests and native SQL parsing.
//!
//! Only a narrow `SELECT` subset is understood: one table, a conjunction of
//! `column <op> literal` comparisons, `IN (...)`, `BETWEEN`, and `LIMIT`.
//! Parsing goes through sqlparser-rs so quoting and literals follow real SQL
//! rules.

use sqlparser::ast::{
    BinaryOperator, Expr, SelectItem, SetExpr, Statement, TableFactor, UnaryOperator,
    Value as SqlValue,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use std::fmt;

use crate::error::{HandlerError, Result};
use crate::value::{ColumnType, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    In,
}

impl Operator {
    fn from_sql(op: &BinaryOperator) -> Result<Self> {
        match op {
            BinaryOperator::Eq => Ok(Operator::Eq),
            BinaryOperator::NotEq => Ok(Operator::NotEq),
            BinaryOperator::Lt => Ok(Operator::Lt),
            BinaryOperator::LtEq => Ok(Operator::LtEq),
            BinaryOperator::Gt => Ok(Operator::Gt),
            BinaryOperator::GtEq => Ok(Operator::GtEq),
            other => Err(HandlerError::invalid_query(format!(
                "unsupported operator in WHERE clause: {}",
                other
            ))),
        }
    }

    /// Operator to use when the literal sits on the left (`5 < x` is `x > 5`)
    fn flipped(self) -> Self {
        match self {
            Operator::Lt => Operator::Gt,
            Operator::LtEq => Operator::GtEq,
            Operator::Gt => Operator::Lt,
            Operator::GtEq => Operator::LtEq,
            other => other,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operator::Eq => "=",
            Operator::NotEq => "!=",
            Operator::Lt => "<",
            Operator::LtEq => "<=",
            Operator::Gt => ">",
            Operator::GtEq => ">=",
            Operator::In => "IN",
        };
        f.write_str(s)
    }
}

/// `column op literal`; `values` holds one literal except for `IN`
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: String,
    pub op: Operator,
    pub values: Vec<String>,
}

impl Condition {
    pub fn new(column: impl Into<String>, op: Operator, value: impl Into<String>) -> Self {
        Self {
            column: column.into().to_ascii_lowercase(),
            op,
            values: vec![value.into()],
        }
    }

    pub fn eq(column: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(column, Operator::Eq, value)
    }

    pub fn in_list<I, S>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            column: column.into().to_ascii_lowercase(),
            op: Operator::In,
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Evaluate against a row value of type `ty`. NULL never matches.
    pub fn matches(&self, value: &Value, ty: ColumnType) -> Result<bool> {
        if value.is_null() {
            return Ok(false);
        }

        let literals = self
            .values
            .iter()
            .map(|raw| {
                Value::from_literal(raw, ty).ok_or_else(|| {
                    HandlerError::invalid_query(format!(
                        "'{}' is not a valid {} for column {}",
                        raw, ty, self.column
                    ))
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let ordering = |literal: &Value| value.compare(literal);

        Ok(match self.op {
            Operator::Eq => literals.iter().any(|l| ordering(l).is_some_and(|o| o.is_eq())),
            Operator::In => literals.iter().any(|l| ordering(l).is_some_and(|o| o.is_eq())),
            Operator::NotEq => literals.iter().all(|l| ordering(l).is_some_and(|o| o.is_ne())),
            Operator::Lt => literals.iter().all(|l| ordering(l).is_some_and(|o| o.is_lt())),
            Operator::LtEq => literals.iter().all(|l| ordering(l).is_some_and(|o| o.is_le())),
            Operator::Gt => literals.iter().all(|l| ordering(l).is_some_and(|o| o.is_gt())),
            Operator::GtEq => literals.iter().all(|l| ordering(l).is_some_and(|o| o.is_ge())),
        })
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.op == Operator::In {
            write!(f, "{} IN ({})", self.column, self.values.join(", "))
        } else {
            write!(f, "{} {} '{}'", self.column, self.op, self.values.join(""))
        }
    }
}

/// A select against one virtual table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectRequest {
    pub table: String,
    pub conditions: Vec<Condition>,
    pub limit: Option<usize>,
    /// `None` selects every column
    pub projection: Option<Vec<String>>,
}

impl SelectRequest {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into().to_ascii_lowercase(),
            ..Self::default()
        }
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn filter_eq(self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter(Condition::eq(column, value))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.projection = Some(
            columns
                .into_iter()
                .map(|c| c.into().to_ascii_lowercase())
                .collect(),
        );
        self
    }

    /// Parse a native SQL statement into a select request.
    ///
    /// `FROM dune.queries` and `FROM queries` both address the `queries`
    /// table; the qualifier is dropped.
    pub fn parse(sql: &str) -> Result<Self> {
        let dialect = GenericDialect {};
        let statements = Parser::parse_sql(&dialect, sql)
            .map_err(|e| HandlerError::invalid_query(format!("failed to parse SQL: {}", e)))?;

        if statements.len() != 1 {
            return Err(HandlerError::invalid_query(format!(
                "expected exactly one statement, got {}",
                statements.len()
            )));
        }

        let query = match &statements[0] {
            Statement::Query(query) => query,
            _ => {
                return Err(HandlerError::invalid_query(
                    "only SELECT statements are supported",
                ))
            }
        };

        if query.order_by.is_some() {
            return Err(HandlerError::invalid_query("ORDER BY is not supported"));
        }
        if query.offset.is_some() {
            return Err(HandlerError::invalid_query("OFFSET is not supported"));
        }

        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select,
            _ => {
                return Err(HandlerError::invalid_query(
                    "only simple SELECT queries are supported",
                ))
            }
        };

        if select.distinct.is_some() {
            return Err(HandlerError::invalid_query("DISTINCT is not supported"));
        }

        if select.from.len() != 1 || !select.from[0].joins.is_empty() {
            return Err(HandlerError::invalid_query(
                "exactly one table must appear in FROM, joins are not supported",
            ));
        }

        let table = match &select.from[0].relation {
            TableFactor::Table { name, .. } => unqualified_table_name(&name.to_string()),
            _ => {
                return Err(HandlerError::invalid_query(
                    "unsupported table reference in FROM",
                ))
            }
        };

        let mut request = SelectRequest::new(table);
        request.projection = parse_projection(&select.projection)?;

        if let Some(selection) = &select.selection {
            collect_conditions(selection, &mut request.conditions)?;
        }

        if let Some(limit) = &query.limit {
            let raw = literal(limit)
                .ok_or_else(|| HandlerError::invalid_query("LIMIT must be a number"))?;
            let limit = raw
                .parse::<usize>()
                .map_err(|_| HandlerError::invalid_query(format!("invalid LIMIT: {}", raw)))?;
            request.limit = Some(limit);
        }

        Ok(request)
    }
}

fn unqualified_table_name(name: &str) -> String {
    name.rsplit('.')
        .next()
        .unwrap_or(name)
        .trim_matches(|c| c == '"' || c == '`')
        .to_ascii_lowercase()
}

fn parse_projection(items: &[SelectItem]) -> Result<Option<Vec<String>>> {
    let mut columns = Vec::with_capacity(items.len());
    for item in items {
        match item {
            SelectItem::Wildcard(_) => return Ok(None),
            SelectItem::UnnamedExpr(expr) => match column_name(expr) {
                Some(name) => columns.push(name),
                None => {
                    return Err(HandlerError::invalid_query(format!(
                        "only plain column names can be selected, got {}",
                        expr
                    )))
                }
            },
            other => {
                return Err(HandlerError::invalid_query(format!(
                    "unsupported select item: {}",
                    other
                )))
            }
        }
    }
    Ok(Some(columns))
}

fn collect_conditions(expr: &Expr, out: &mut Vec<Condition>) -> Result<()> {
    match expr {
        Expr::BinaryOp {
            left,
            op: BinaryOperator::And,
            right,
        } => {
            collect_conditions(left, out)?;
            collect_conditions(right, out)
        }
        Expr::Nested(inner) => collect_conditions(inner, out),
        Expr::BinaryOp { left, op, right } => {
            let op = Operator::from_sql(op)?;
            if let (Some(column), Some(value)) = (column_name(left), literal(right)) {
                out.push(Condition::new(column, op, value));
                Ok(())
            } else if let (Some(value), Some(column)) = (literal(left), column_name(right)) {
                out.push(Condition::new(column, op.flipped(), value));
                Ok(())
            } else {
                Err(HandlerError::invalid_query(format!(
                    "comparison must be between a column and a literal: {}",
                    expr
                )))
            }
        }
        Expr::InList {
            expr: column,
            list,
            negated: false,
        } => {
            let column = column_name(column).ok_or_else(|| {
                HandlerError::invalid_query(format!("IN must apply to a column: {}", expr))
            })?;
            let values = list
                .iter()
                .map(|item| {
                    literal(item).ok_or_else(|| {
                        HandlerError::invalid_query(format!("IN list must hold literals: {}", expr))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            out.push(Condition::in_list(column, values));
            Ok(())
        }
        Expr::Between {
            expr: column,
            negated: false,
            low,
            high,
        } => match (column_name(column), literal(low), literal(high)) {
            (Some(column), Some(low), Some(high)) => {
                out.push(Condition::new(column.clone(), Operator::GtEq, low));
                out.push(Condition::new(column, Operator::LtEq, high));
                Ok(())
            }
            _ => Err(HandlerError::invalid_query(format!(
                "BETWEEN must apply to a column with literal bounds: {}",
                expr
            ))),
        },
        other => Err(HandlerError::invalid_query(format!(
            "unsupported WHERE expression: {}",
            other
        ))),
    }
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.to_ascii_lowercase()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|i| i.value.to_ascii_lowercase()),
        _ => None,
    }
}

fn literal(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Value(v) => match &v.value {
            SqlValue::SingleQuotedString(s) => Some(s.clone()),
            SqlValue::Number(n, _) => Some(n.clone()),
            SqlValue::Boolean(b) => Some(b.to_string()),
            _ => None,
        },
        Expr::UnaryOp {
            op: UnaryOperator::Minus,
            expr,
        } => literal(expr).map(|n| format!("-{}", n)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_select() {
        let request =
            SelectRequest::parse("SELECT * FROM dune.contracts WHERE blockchain = 'ethereum' LIMIT 20")
                .unwrap();

        assert_eq!(request.table, "contracts");
        assert_eq!(request.conditions, vec![Condition::eq("blockchain", "ethereum")]);
        assert_eq!(request.limit, Some(20));
        assert_eq!(request.projection, None);
    }

    #[test]
    fn test_parse_projection_and_conjunction() {
        let request = SelectRequest::parse(
            "SELECT execution_id, state FROM executions WHERE query_id = 1234 AND (state != 'x')",
        )
        .unwrap();

        assert_eq!(
            request.projection,
            Some(vec!["execution_id".to_string(), "state".to_string()])
        );
        assert_eq!(request.conditions.len(), 2);
        assert_eq!(request.conditions[0], Condition::eq("query_id", "1234"));
        assert_eq!(request.conditions[1].op, Operator::NotEq);
    }

    #[test]
    fn test_literal_on_the_left_is_flipped() {
        let request = SelectRequest::parse("SELECT * FROM dex WHERE 100 < usd_liquidity").unwrap();
        assert_eq!(
            request.conditions,
            vec![Condition::new("usd_liquidity", Operator::Gt, "100")]
        );
    }

    #[test]
    fn test_in_and_between() {
        let request = SelectRequest::parse(
            "SELECT * FROM queries WHERE query_id IN (1, 2) AND version BETWEEN 1 AND 3",
        )
        .unwrap();

        assert_eq!(request.conditions[0], Condition::in_list("query_id", ["1", "2"]));
        assert_eq!(request.conditions[1], Condition::new("version", Operator::GtEq, "1"));
        assert_eq!(request.conditions[2], Condition::new("version", Operator::LtEq, "3"));
    }

    #[test]
    fn test_negative_literal() {
        let request = SelectRequest::parse("SELECT * FROM markets WHERE market_share > -1").unwrap();
        assert_eq!(request.conditions[0].values, vec!["-1".to_string()]);
    }

    #[test]
    fn test_rejects_unsupported_sql() {
        for sql in [
            "DELETE FROM queries",
            "SELECT * FROM queries WHERE query_id = 1 OR query_id = 2",
            "SELECT * FROM queries q JOIN executions e ON q.query_id = e.query_id",
            "SELECT count(*) FROM queries",
            "SELECT * FROM queries ORDER BY query_id",
            "SELECT * FROM queries LIMIT 'ten'",
            "SELECT * FROM queries; SELECT * FROM dex",
            "SELECT * FROM queries WHERE name LIKE 'x%'",
        ] {
            let err = SelectRequest::parse(sql).unwrap_err();
            assert!(matches!(err, HandlerError::InvalidQuery(_)), "accepted: {}", sql);
        }
    }

    #[test]
    fn test_condition_matching() {
        let eq = Condition::eq("blockchain", "ethereum");
        assert!(eq.matches(&Value::Text("ethereum".into()), ColumnType::String).unwrap());
        assert!(!eq.matches(&Value::Text("base".into()), ColumnType::String).unwrap());
        assert!(!eq.matches(&Value::Null, ColumnType::String).unwrap());

        let gt = Condition::new("usd_liquidity", Operator::Gt, "10.5");
        assert!(gt.matches(&Value::Float(11.0), ColumnType::Float).unwrap());
        assert!(!gt.matches(&Value::Float(10.5), ColumnType::Float).unwrap());

        let within = Condition::in_list("query_id", ["1", "2"]);
        assert!(within.matches(&Value::Integer(2), ColumnType::Integer).unwrap());
        assert!(!within.matches(&Value::Integer(3), ColumnType::Integer).unwrap());
    }

    #[test]
    fn test_condition_with_bad_literal_is_invalid_query() {
        let cond = Condition::eq("query_id", "abc");
        assert!(cond.matches(&Value::Integer(1), ColumnType::Integer).is_err());
    }

    #[test]
    fn test_builder() {
        let request = SelectRequest::new("Results")
            .filter_eq("Execution_ID", "01H")
            .limit(5)
            .columns(["row_number"]);
        assert_eq!(request.table, "results");
        assert_eq!(request.conditions[0].column, "execution_id");
        assert_eq!(request.limit, Some(5));
        assert_eq!(request.projection, Some(vec!["row_number".to_string()]));
    }
}
