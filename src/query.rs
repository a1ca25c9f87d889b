//! Assembles filter, tag and selection predicates into one query.
//!
//! Compilation is a pure function of its inputs. The builder below is
//! consumed and returned by every step, collecting `(join, predicate)`
//! clauses in input order, and the final query is only materialized once
//! all filters have been planned.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::comparator::{self, Wildcards};
use crate::error::{LogsiftError, Result};
use crate::field::{self, ResolvedField};
use crate::filter::{FilterCriterion, SelectionOverride};
use crate::selection;
use crate::sql::{Column, Dialect, Join, Predicate, SqlValue, SqlWriter};
use crate::subject::Subject;
use crate::tags::{self, TagJoin};

/// What happens to a field that matches no known column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnknownFieldPolicy {
    /// Filter on a tag of that name; a typo simply matches no tag.
    #[default]
    Tag,
    /// Fail with `InvalidFieldReference` unless the name is a known tag.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileOptions {
    pub unknown_fields: UnknownFieldPolicy,
    /// Tag names accepted under [`UnknownFieldPolicy::Reject`].
    pub known_tags: BTreeSet<String>,
    pub escape_like_wildcards: bool,
    /// Status required of every record under an active selection override.
    pub success_status: i64,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Tag,
            known_tags: BTreeSet::new(),
            escape_like_wildcards: false,
            success_status: 200,
        }
    }
}

impl CompileOptions {
    /// Strict field checking against the given tag names.
    pub fn strict<I, S>(known_tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unknown_fields: UnknownFieldPolicy::Reject,
            known_tags: known_tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }
    fn wildcards(&self) -> Wildcards {
        if self.escape_like_wildcards {
            Wildcards::Literal
        } else {
            Wildcards::Pattern
        }
    }
}

/// What a rendered query selects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    /// Every matching id, newest first.
    Ids,
    /// One page of matching ids, newest first.
    Page { limit: u64, offset: u64 },
    Count,
}

/// SQL text and its bound parameters, ready for execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledQuery {
    pub dialect: Dialect,
    pub sql: String,
    pub params: Vec<SqlValue>,
    pub tag_joins: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BaseTable {
    table: &'static str,
    alias: &'static str,
}

/// A fully assembled query over one subject, not yet rendered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilteredQuery {
    base: BaseTable,
    id: Column,
    order_by: Column,
    joins: Vec<Join>,
    predicates: Vec<Predicate>,
    tag_joins: usize,
}

impl FilteredQuery {
    /// Fixed joins followed by one join per tag filter.
    pub fn joins(&self) -> &[Join] {
        &self.joins
    }
    pub fn tag_joins(&self) -> usize {
        self.tag_joins
    }
    pub fn render(&self, dialect: Dialect, projection: Projection) -> CompiledQuery {
        let mut writer = SqlWriter::new(dialect);
        writer.push("SELECT ");
        match projection {
            Projection::Count => writer.push("COUNT(*)"),
            Projection::Ids | Projection::Page { .. } => writer.column(&self.id),
        }
        writer.push(" FROM \"");
        writer.push(self.base.table);
        writer.push("\" AS ");
        writer.push(self.base.alias);
        for join in &self.joins {
            writer.join(join);
        }
        writer.push(" WHERE ");
        writer.conjunction(&self.predicates);
        if projection != Projection::Count {
            writer.push(" ORDER BY ");
            writer.column(&self.order_by);
            writer.push(" DESC, ");
            writer.column(&self.id);
        }
        if let Projection::Page { limit, offset } = projection {
            writer.push(" LIMIT ");
            writer.bind(SqlValue::Integer(clamp(limit)));
            writer.push(" OFFSET ");
            writer.bind(SqlValue::Integer(clamp(offset)));
        }
        let (sql, params) = writer.finish();
        CompiledQuery {
            dialect,
            sql,
            params,
            tag_joins: self.tag_joins,
        }
    }
}

fn clamp(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// One accumulated step: an optional join and the predicate it contributes.
#[derive(Debug, Clone)]
struct Clause {
    join: Option<Join>,
    predicate: Predicate,
}

#[derive(Debug, Clone)]
struct QueryBuilder {
    base: BaseTable,
    id: Column,
    order_by: Column,
    fixed_joins: Vec<Join>,
    scope: Vec<Predicate>,
    clauses: Vec<Clause>,
    tail: Vec<Predicate>,
}

impl QueryBuilder {
    fn for_subject<S: Subject>(scope_id: &str) -> Self {
        Self {
            base: BaseTable {
                table: S::TABLE,
                alias: S::ALIAS,
            },
            id: S::id(),
            order_by: S::order_by(),
            fixed_joins: S::joins(),
            scope: S::scope(scope_id),
            clauses: Vec::new(),
            tail: Vec::new(),
        }
    }
    fn filter(mut self, predicate: Predicate) -> Self {
        self.clauses.push(Clause {
            join: None,
            predicate,
        });
        self
    }
    fn tag(mut self, tag_join: TagJoin) -> Self {
        self.clauses.push(Clause {
            join: Some(tag_join.join),
            predicate: tag_join.predicate,
        });
        self
    }
    fn restrict(mut self, predicates: Vec<Predicate>) -> Self {
        self.tail.extend(predicates);
        self
    }
    fn build(self) -> FilteredQuery {
        let mut joins = self.fixed_joins;
        let mut predicates = self.scope;
        let mut tag_joins = 0;
        for clause in self.clauses {
            if let Some(join) = clause.join {
                joins.push(join);
                tag_joins += 1;
            }
            predicates.push(clause.predicate);
        }
        predicates.extend(self.tail);
        FilteredQuery {
            base: self.base,
            id: self.id,
            order_by: self.order_by,
            joins,
            predicates,
            tag_joins,
        }
    }
}

/// Compiles `filters` over subject `S`, restricted to `scope_id`.
pub fn compile_filters<S: Subject>(
    filters: &[FilterCriterion],
    scope_id: &str,
) -> Result<FilteredQuery> {
    compile_filters_with::<S>(filters, scope_id, None, &CompileOptions::default())
}

/// Like [`compile_filters`], additionally narrowed by `selection`.
pub fn compile_filters_with_selection<S: Subject>(
    filters: &[FilterCriterion],
    scope_id: &str,
    selection: &SelectionOverride,
) -> Result<FilteredQuery> {
    compile_filters_with::<S>(filters, scope_id, Some(selection), &CompileOptions::default())
}

pub fn compile_filters_with<S: Subject>(
    filters: &[FilterCriterion],
    scope_id: &str,
    selection: Option<&SelectionOverride>,
    options: &CompileOptions,
) -> Result<FilteredQuery> {
    let mut builder = QueryBuilder::for_subject::<S>(scope_id);
    for (position, filter) in filters.iter().enumerate() {
        // an absent or empty value means the filter was never specified
        let Some(value) = filter.specified_value() else {
            continue;
        };
        let comparator = comparator::resolve_token(&filter.comparator, value, options.wildcards())?;
        builder = match field::resolve::<S::Field>(&filter.field) {
            ResolvedField::KnownColumn(operand) => builder.filter(comparator(operand)),
            ResolvedField::TagField(name) => {
                if options.unknown_fields == UnknownFieldPolicy::Reject
                    && (S::TAGS.is_none() || !options.known_tags.contains(&name))
                {
                    return Err(LogsiftError::InvalidFieldReference(name));
                }
                match S::TAGS {
                    Some(tag_table) => builder.tag(tags::plan(
                        &tag_table,
                        S::id(),
                        position,
                        &name,
                        comparator,
                    )),
                    None => {
                        debug!(subject = S::NAME, field = %name, "no tag table, skipping filter");
                        builder
                    }
                }
            }
        };
    }
    if let Some(selection) = selection {
        builder = builder.restrict(selection::predicates(
            selection,
            S::id(),
            S::status(),
            options.success_status,
        ));
    }
    let query = builder.build();
    debug!(
        subject = S::NAME,
        filters = filters.len(),
        tag_joins = query.tag_joins(),
        selection = selection.is_some(),
        "compiled filters"
    );
    Ok(query)
}
