//! Classifies filter field names as known columns or tag fields.

use std::fmt;

use crate::sql::{Column, Operand};

/// A filter field pre-bound to exactly one base-table column.
pub trait KnownField: Copy + Eq + fmt::Debug + 'static {
    // static stuff which needs to be implemented downstream
    const ALL: &'static [Self];
    fn name(&self) -> &'static str;
    fn column(&self) -> Column;
    // instance callable with pre-made implementation
    fn operand(&self) -> Operand {
        Operand::Text(self.column())
    }
    fn lookup(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|field| field.name() == name)
    }
}

/// Outcome of resolving a filter field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedField {
    /// The bound column, already coerced to text.
    KnownColumn(Operand),
    /// Not a known column; carries the field name verbatim.
    TagField(String),
}

/// Exact, case-sensitive lookup of `name` among the known fields `F`.
pub fn resolve<F: KnownField>(name: &str) -> ResolvedField {
    match F::lookup(name) {
        Some(field) => ResolvedField::KnownColumn(field.operand()),
        None => ResolvedField::TagField(name.to_string()),
    }
}
