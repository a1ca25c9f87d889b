//! Maps a comparator and a literal value to a predicate builder.

use crate::error::Result;
use crate::filter::ComparatorKind;
use crate::sql::{LikePattern, Operand, Predicate, SqlValue};

/// How `%` and `_` inside a `CONTAINS`/`NOT_CONTAINS` value are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Wildcards {
    /// Passed through, so they act as `LIKE` wildcards.
    #[default]
    Pattern,
    /// Escaped, so they match themselves.
    Literal,
}

/// Returns a function that applies `kind` with `value` to any operand.
///
/// * `Equals` never matches NULL.
/// * `NotEquals` uses `IS DISTINCT FROM`, so NULL counts as "not equal".
/// * `NotContains` is satisfied by NULL.
pub fn resolve(
    kind: ComparatorKind,
    value: &str,
    wildcards: Wildcards,
) -> impl Fn(Operand) -> Predicate + use<> {
    let value = value.to_string();
    let pattern = move |value: &str| match wildcards {
        Wildcards::Pattern => LikePattern::containing(value),
        Wildcards::Literal => LikePattern::containing_literal(value),
    };
    move |operand| match kind {
        ComparatorKind::Equals => Predicate::Eq(operand, SqlValue::Text(value.clone())),
        ComparatorKind::NotEquals => {
            Predicate::DistinctFrom(operand, SqlValue::Text(value.clone()))
        }
        ComparatorKind::Contains => Predicate::Like(operand, pattern(&value)),
        ComparatorKind::NotContains => Predicate::NotLikeOrNull(operand, pattern(&value)),
    }
}

/// Like [`resolve`], starting from the wire token.
pub fn resolve_token(
    token: &str,
    value: &str,
    wildcards: Wildcards,
) -> Result<impl Fn(Operand) -> Predicate + use<>> {
    let kind: ComparatorKind = token.parse()?;
    Ok(resolve(kind, value, wildcards))
}
