//! Filter criteria as supplied by callers.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LogsiftError;

/// How a stored value relates to the value supplied with a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparatorKind {
    Equals,
    NotEquals,
    Contains,
    NotContains,
}

impl ComparatorKind {
    pub const ALL: [ComparatorKind; 4] = [
        ComparatorKind::Equals,
        ComparatorKind::NotEquals,
        ComparatorKind::Contains,
        ComparatorKind::NotContains,
    ];
    /// The wire token of the comparator.
    pub fn token(&self) -> &'static str {
        match self {
            ComparatorKind::Equals => "=",
            ComparatorKind::NotEquals => "!=",
            ComparatorKind::Contains => "CONTAINS",
            ComparatorKind::NotContains => "NOT_CONTAINS",
        }
    }
}

impl FromStr for ComparatorKind {
    type Err = LogsiftError;
    fn from_str(token: &str) -> Result<Self, Self::Err> {
        ComparatorKind::ALL
            .into_iter()
            .find(|kind| kind.token() == token)
            .ok_or_else(|| LogsiftError::UnknownComparator(token.to_string()))
    }
}

impl fmt::Display for ComparatorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.token())
    }
}

/// One `(field, comparator, value)` tuple.
///
/// The comparator is kept as its raw token so that an unknown token reaches
/// compilation, where it is reported as [`LogsiftError::UnknownComparator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriterion {
    pub field: String,
    pub comparator: String,
    #[serde(default)]
    pub value: Option<String>,
}

impl FilterCriterion {
    pub fn new(
        field: impl Into<String>,
        comparator: ComparatorKind,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            comparator: comparator.token().to_string(),
            value: Some(value.into()),
        }
    }
    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, ComparatorKind::Equals, value)
    }
    pub fn not_equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, ComparatorKind::NotEquals, value)
    }
    pub fn contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, ComparatorKind::Contains, value)
    }
    pub fn not_contains(field: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(field, ComparatorKind::NotContains, value)
    }
    /// The value, unless it is absent or empty.
    pub fn specified_value(&self) -> Option<&str> {
        self.value.as_deref().filter(|value| !value.is_empty())
    }
    pub fn comparator(&self) -> crate::error::Result<ComparatorKind> {
        self.comparator.parse()
    }
}

/// Explicit inclusion or exclusion of record ids, independent of the filters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionOverride {
    pub default_to_selected: bool,
    #[serde(default)]
    pub selected_ids: BTreeSet<String>,
    #[serde(default)]
    pub deselected_ids: BTreeSet<String>,
}

impl SelectionOverride {
    /// Everything in scope except `ids`.
    pub fn all_except<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default_to_selected: true,
            selected_ids: BTreeSet::new(),
            deselected_ids: ids.into_iter().map(Into::into).collect(),
        }
    }
    /// Nothing in scope except `ids`.
    pub fn only<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            default_to_selected: false,
            selected_ids: ids.into_iter().map(Into::into).collect(),
            deselected_ids: BTreeSet::new(),
        }
    }
}
