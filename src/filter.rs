//! Per-field filter expressions compiled to SQL predicates.
//!
//! An expression is a list of clauses joined by `&` (AND) or `|` (OR), e.g.
//! `>=01.01.2024&<=31.12.2024`. Clauses are emitted in the order written and
//! no parentheses are added, so SQL's own AND/OR precedence applies.
//!
//! A clause may start with `==`, `~=` (not equal), `>=`, `<=`, `>` or `<`.
//! Without a prefix it is an equality test, or a `LIKE` when a text value
//! contains `%` or `_`. The expression `''` alone matches empty fields.

use tracing::debug;

use crate::error::{EngineError, Result};
use crate::format::{format_bool, Classification, Direction, FormatEngine, LogicalType};
use crate::metadata::FieldType;
use crate::schema::quote_ident;

/// Query operators for filter clauses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOperator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    Like,
}

// Two-character prefixes first.
const PREFIXES: [(&str, QueryOperator); 6] = [
    ("==", QueryOperator::Equal),
    ("~=", QueryOperator::NotEqual),
    (">=", QueryOperator::GreaterThanOrEqual),
    ("<=", QueryOperator::LessThanOrEqual),
    (">", QueryOperator::GreaterThan),
    ("<", QueryOperator::LessThan),
];

impl QueryOperator {
    pub fn as_sql(&self) -> &'static str {
        match self {
            QueryOperator::Equal => "=",
            QueryOperator::NotEqual => "<>",
            QueryOperator::GreaterThan => ">",
            QueryOperator::GreaterThanOrEqual => ">=",
            QueryOperator::LessThan => "<",
            QueryOperator::LessThanOrEqual => "<=",
            QueryOperator::Like => "LIKE",
        }
    }

    fn is_exact(&self) -> bool {
        matches!(self, QueryOperator::Equal | QueryOperator::NotEqual)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Connector {
    And,
    Or,
}

impl Connector {
    fn as_sql(&self) -> &'static str {
        match self {
            Connector::And => " AND ",
            Connector::Or => " OR ",
        }
    }
}

/// Split into clauses, each paired with the connector written before it.
fn split_clauses(expression: &str) -> Vec<(Option<Connector>, &str)> {
    let mut clauses = Vec::new();
    let mut connector = None;
    let mut start = 0;
    for (i, c) in expression.char_indices() {
        let next = match c {
            '&' => Connector::And,
            '|' => Connector::Or,
            _ => continue,
        };
        clauses.push((connector, &expression[start..i]));
        connector = Some(next);
        start = i + 1;
    }
    clauses.push((connector, &expression[start..]));
    clauses
}

fn split_operator(clause: &str) -> (Option<QueryOperator>, &str) {
    for (prefix, op) in PREFIXES {
        if let Some(rest) = clause.strip_prefix(prefix) {
            return (Some(op), rest.trim());
        }
    }
    (None, clause)
}

fn strip_quotes(value: &str) -> &str {
    value.trim_matches(|c| c == '\'' || c == '"')
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Compiles filter expressions against the display templates of a
/// [`FormatEngine`].
#[derive(Debug, Clone, Copy)]
pub struct FilterCompiler<'a> {
    format: &'a FormatEngine,
}

impl<'a> FilterCompiler<'a> {
    pub fn new(format: &'a FormatEngine) -> Self {
        Self { format }
    }

    /// Compile `expression` on `field` into a WHERE fragment.
    ///
    /// Returns an empty string when the expression has no clauses.
    pub fn compile(&self, field: &str, field_type: FieldType, expression: &str) -> Result<String> {
        let column = quote_ident(field);
        let expression = expression.trim();
        if expression == "''" {
            return Ok(format!("{} = ''", column));
        }

        let mut sql = String::new();
        let mut pending = None;
        for (connector, clause) in split_clauses(expression) {
            // An empty clause passes its connector on to the next one.
            pending = pending.or(connector);
            let clause = clause.trim();
            if clause.is_empty() {
                continue;
            }
            let predicate = self.compile_clause(&column, field, field_type, clause)?;
            if !sql.is_empty() {
                sql.push_str(pending.unwrap_or(Connector::And).as_sql());
            }
            sql.push_str(&predicate);
            pending = None;
        }
        Ok(sql)
    }

    fn compile_clause(
        &self,
        column: &str,
        field: &str,
        field_type: FieldType,
        clause: &str,
    ) -> Result<String> {
        let (op, value) = split_operator(clause);
        let op = op.unwrap_or_else(|| {
            if field_type == FieldType::Text && (value.contains('%') || value.contains('_')) {
                QueryOperator::Like
            } else {
                QueryOperator::Equal
            }
        });
        let operand = self.operand(field, field_type, op, value)?;
        Ok(format!("{} {} {}", column, op.as_sql(), operand))
    }

    fn operand(
        &self,
        field: &str,
        field_type: FieldType,
        op: QueryOperator,
        value: &str,
    ) -> Result<String> {
        match field_type {
            FieldType::Logical(LogicalType::Boolean) => {
                Ok(format_bool(strip_quotes(value), Direction::ToCanonical))
            }
            FieldType::Logical(ty) => {
                // Values that do not convert are compared verbatim.
                let canonical = match self.format.classify(value, ty) {
                    Classification::Canonical | Classification::Invalid => value.to_string(),
                    Classification::Display | Classification::Both => {
                        match self.format.to_canonical(value, ty) {
                            Ok(canonical) => canonical,
                            Err(err) => {
                                debug!(field, value, error = %err, "comparing operand verbatim");
                                value.to_string()
                            }
                        }
                    }
                };
                Ok(quote_literal(&canonical))
            }
            FieldType::Integer | FieldType::Real => {
                let number = strip_quotes(value);
                if !number.parse::<f64>().is_ok_and(f64::is_finite) {
                    return Err(EngineError::Filter {
                        field: field.to_string(),
                        reason: format!("'{}' is not a number", value),
                    });
                }
                Ok(number.to_string())
            }
            FieldType::Text if op.is_exact() => Ok(quote_literal(strip_quotes(value))),
            FieldType::Text | FieldType::Blob | FieldType::Untyped => Ok(quote_literal(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FormatConfig;

    fn compile(field_type: FieldType, expression: &str) -> Result<String> {
        let format = FormatEngine::new(&FormatConfig::default()).unwrap();
        FilterCompiler::new(&format).compile("f", field_type, expression)
    }

    #[test]
    fn test_date_range() {
        assert_eq!(
            compile(
                FieldType::Logical(LogicalType::Date),
                ">=01.01.2024&<=31.12.2024"
            )
            .unwrap(),
            "\"f\" >= '20240101' AND \"f\" <= '20241231'"
        );
    }

    #[test]
    fn test_unconvertible_date_is_compared_verbatim() {
        assert_eq!(
            compile(FieldType::Logical(LogicalType::Date), ">31.02.2024").unwrap(),
            "\"f\" > '31.02.2024'"
        );
        assert_eq!(
            compile(FieldType::Logical(LogicalType::Date), "<=20240615").unwrap(),
            "\"f\" <= '20240615'"
        );
    }

    #[test]
    fn test_separator_less_date_operand() {
        let format = FormatEngine::new(&FormatConfig {
            date_format: "ddmmyyyy".into(),
            ..FormatConfig::default()
        })
        .unwrap();
        let compiler = FilterCompiler::new(&format);
        assert_eq!(
            compiler
                .compile("f", FieldType::Logical(LogicalType::Date), ">=15062024")
                .unwrap(),
            "\"f\" >= '20240615'"
        );
    }

    #[test]
    fn test_numeric_quotes_are_stripped() {
        assert_eq!(compile(FieldType::Integer, "=='5'").unwrap(), "\"f\" = 5");
        assert_eq!(compile(FieldType::Integer, "5").unwrap(), "\"f\" = 5");
        assert_eq!(
            compile(FieldType::Real, ">1.5|<0").unwrap(),
            "\"f\" > 1.5 OR \"f\" < 0"
        );
        assert!(matches!(
            compile(FieldType::Integer, "five"),
            Err(EngineError::Filter { .. })
        ));
    }

    #[test]
    fn test_text_defaults() {
        assert_eq!(compile(FieldType::Text, "Jo%").unwrap(), "\"f\" LIKE 'Jo%'");
        assert_eq!(compile(FieldType::Text, "'Joe'").unwrap(), "\"f\" = 'Joe'");
        assert_eq!(
            compile(FieldType::Text, "~=O'Brien").unwrap(),
            "\"f\" <> 'O''Brien'"
        );
    }

    #[test]
    fn test_empty_literal_matches_empty_field() {
        for ty in [
            FieldType::Text,
            FieldType::Integer,
            FieldType::Logical(LogicalType::Time),
        ] {
            assert_eq!(compile(ty, " '' ").unwrap(), "\"f\" = ''");
        }
    }

    #[test]
    fn test_boolean_operand() {
        assert_eq!(
            compile(FieldType::Logical(LogicalType::Boolean), "true").unwrap(),
            "\"f\" = 1"
        );
        assert_eq!(
            compile(FieldType::Logical(LogicalType::Boolean), "~=1").unwrap(),
            "\"f\" <> 1"
        );
    }

    #[test]
    fn test_empty_clauses_are_skipped() {
        assert_eq!(compile(FieldType::Integer, "").unwrap(), "");
        assert_eq!(
            compile(FieldType::Integer, "1&&2|").unwrap(),
            "\"f\" = 1 AND \"f\" = 2"
        );
    }
}
