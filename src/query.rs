//! Query compiler
//!
//! Turns line-oriented query text into a `FilterSpec`:
//!
//! ```text
//! inc_name: symptom, ache
//! inc_ancestor: symptom
//! ```
//!
//! compiles to `{"name": {"inc": ["symptom", "ache"], "exc": []},
//! "ancestor": {"inc": ["symptom"], "exc": []}}`. Repeated dimensions
//! accumulate their values.

use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::filter::{Dimension, FilterSpec, parse_threshold};

#[derive(Parser)]
#[grammar = "query_grammar.pest"]
struct QueryParser;

/// Error type for query parsing failures
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query error: {0}")]
    Syntax(#[from] pest::error::Error<Rule>),

    #[error("Query error: line {line}: unknown directive {directive:?} (expected inc_ or exc_)")]
    UnknownDirective { line: usize, directive: String },

    #[error("Query error: unknown dimension: {0}")]
    UnknownDimension(String),

    #[error("Query error: text_length threshold is not a non-negative integer: {0:?}")]
    InvalidThreshold(String),

    #[error("Query error: {0}")]
    Malformed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Include,
    Exclude,
}

/// Compile query text into a labeled filter
pub fn build_query(input: &str) -> Result<FilterSpec, QueryError> {
    let mut pairs = QueryParser::parse(Rule::query, input)?;
    let mut spec = FilterSpec::new();

    let Some(query_pair) = pairs.next() else {
        return Ok(spec);
    };

    for pair in query_pair.into_inner() {
        match pair.as_rule() {
            Rule::directive => {
                let line = pair.line_col().0;
                let mut inner = pair.into_inner();

                let Some(key_pair) = inner.next() else {
                    return Err(QueryError::Malformed(format!(
                        "line {}: expected directive",
                        line
                    )));
                };
                let Some(value_list) = inner.next() else {
                    return Err(QueryError::Malformed(format!(
                        "line {}: expected values",
                        line
                    )));
                };

                let (action, dimension) = parse_key(key_pair.as_str(), line)?;
                let values = parse_values(value_list);

                if dimension == Dimension::TextLength {
                    if let Some(bad) = values.iter().find(|v| parse_threshold(v).is_none()) {
                        return Err(QueryError::InvalidThreshold(bad.clone()));
                    }
                }

                let selector = spec.selector_mut(dimension);
                match action {
                    Action::Include => selector.inc.extend(values),
                    Action::Exclude => selector.exc.extend(values),
                }
            }
            Rule::EOI => {} // End of input
            _ => {}
        }
    }

    Ok(spec)
}

/// Split `inc_<dimension>` / `exc_<dimension>`
fn parse_key(key: &str, line: usize) -> Result<(Action, Dimension), QueryError> {
    let (action, rest) = if let Some(rest) = key.strip_prefix("inc_") {
        (Action::Include, rest)
    } else if let Some(rest) = key.strip_prefix("exc_") {
        (Action::Exclude, rest)
    } else {
        return Err(QueryError::UnknownDirective {
            line,
            directive: key.to_string(),
        });
    };

    Ok((action, rest.parse()?))
}

/// Trimmed, non-empty values in order
fn parse_values(pair: pest::iterators::Pair<Rule>) -> Vec<String> {
    pair.into_inner()
        .map(|value| value.as_str().trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .collect()
}
