//! Plans one aliased left join per tag filter.
//!
//! Every tag filter gets its own join, even when several filters name the
//! same tag, so `color = red AND color = blue` asks for a record carrying
//! both tag rows instead of one row holding two values. A query with `n` tag
//! filters therefore carries `n` extra joins.

use crate::sql::{Column, Join, Operand, Predicate, SqlValue};
use crate::subject::TagTable;

/// Alias of one tag join, derived from the filter's position in the input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TagJoinAlias(String);

impl TagJoinAlias {
    pub fn for_position(tags: &TagTable, position: usize) -> Self {
        Self(format!("{}{}", tags.alias_prefix, position))
    }
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A planned tag join and the filter predicate routed to its value column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagJoin {
    pub join: Join,
    pub predicate: Predicate,
}

/// Plans the join for the tag filter at `position` in the input list.
///
/// The join is bound to the base record by `parent_id` and to the tag by
/// name; `comparator` is applied to the joined value column. Records without
/// the tag keep a NULL value, which the NULL-aware comparators admit.
pub fn plan(
    tags: &TagTable,
    parent_id: Column,
    position: usize,
    tag_name: &str,
    comparator: impl Fn(Operand) -> Predicate,
) -> TagJoin {
    let alias = TagJoinAlias::for_position(tags, position);
    let column = |name| Column::aliased(alias.as_str().to_string(), name);
    let join = Join {
        table: tags.table,
        alias: alias.as_str().to_string().into(),
        on: vec![
            Predicate::ColumnsEq(parent_id, column(tags.parent)),
            Predicate::Eq(
                Operand::Column(column(tags.name)),
                SqlValue::from(tag_name),
            ),
        ],
    };
    let predicate = comparator(Operand::Column(column(tags.value)));
    TagJoin { join, predicate }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comparator::{Wildcards, resolve};
    use crate::filter::ComparatorKind;
    use crate::subject::{LoggedCalls, Subject};

    #[test]
    fn alias_comes_from_position_not_name() {
        let Some(tags) = LoggedCalls::TAGS else {
            panic!("logged calls carry tags")
        };
        let red = resolve(ComparatorKind::Equals, "red", Wildcards::Pattern);
        let blue = resolve(ComparatorKind::Equals, "blue", Wildcards::Pattern);
        let first = plan(&tags, LoggedCalls::id(), 2, "color", red);
        let second = plan(&tags, LoggedCalls::id(), 5, "color", blue);
        assert_eq!(first.join.alias, "lct2");
        assert_eq!(second.join.alias, "lct5");
        assert_ne!(first.join, second.join);
    }

    #[test]
    fn binds_name_and_routes_value() {
        let Some(tags) = LoggedCalls::TAGS else {
            panic!("logged calls carry tags")
        };
        let not_prod = resolve(ComparatorKind::NotEquals, "prod", Wildcards::Pattern);
        let planned = plan(&tags, LoggedCalls::id(), 0, "env", not_prod);
        assert_eq!(planned.join.table, "LoggedCallTag");
        assert_eq!(
            planned.join.on[1],
            Predicate::Eq(
                Operand::Column(Column::aliased("lct0".to_string(), "name")),
                SqlValue::Text("env".to_string())
            )
        );
        assert_eq!(
            planned.predicate,
            Predicate::DistinctFrom(
                Operand::Column(Column::aliased("lct0".to_string(), "value")),
                SqlValue::Text("prod".to_string())
            )
        );
    }
}
