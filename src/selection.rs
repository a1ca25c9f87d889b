//! Narrows a query by explicitly selected or deselected record ids.

use crate::filter::SelectionOverride;
use crate::sql::{Column, Operand, Predicate, SqlValue};

/// Predicates for an active selection override.
///
/// `default_to_selected` decides which id set governs. Selecting from an
/// empty inclusion set matches nothing. When `status` is given, only records
/// whose status equals `success_status` remain eligible.
pub fn predicates(
    selection: &SelectionOverride,
    id: Column,
    status: Option<Column>,
    success_status: i64,
) -> Vec<Predicate> {
    let ids = |set: &std::collections::BTreeSet<String>| {
        set.iter().map(|id| SqlValue::Text(id.clone())).collect::<Vec<_>>()
    };
    let mut predicates = Vec::new();
    if selection.default_to_selected {
        if !selection.deselected_ids.is_empty() {
            predicates.push(Predicate::NotIn(
                Operand::Column(id),
                ids(&selection.deselected_ids),
            ));
        }
    } else if selection.selected_ids.is_empty() {
        predicates.push(Predicate::Never);
    } else {
        predicates.push(Predicate::In(Operand::Column(id), ids(&selection.selected_ids)));
    }
    if let Some(status) = status {
        predicates.push(Predicate::Eq(
            Operand::Column(status),
            SqlValue::Integer(success_status),
        ));
    }
    predicates
}
