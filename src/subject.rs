//! The subject areas a filter list can be compiled against.
//!
//! Each subject describes a fixed base schema: the base table and its alias,
//! the joins every query carries, the scope predicate, and the fields that
//! are bound to columns. Logged calls additionally have a tag side table.

use crate::field::KnownField;
use crate::sql::{Column, Join, Operand, Predicate, SqlValue};

/// A generic `(parent id, name, value)` side table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagTable {
    pub table: &'static str,
    /// Tag join aliases are this prefix followed by the filter position.
    pub alias_prefix: &'static str,
    pub parent: &'static str,
    pub name: &'static str,
    pub value: &'static str,
}

pub trait Subject {
    type Field: KnownField;
    const NAME: &'static str;
    const TABLE: &'static str;
    const ALIAS: &'static str;
    const TAGS: Option<TagTable>;
    /// Joins present in every query over this subject.
    fn joins() -> Vec<Join>;
    /// Restricts a query to one scope.
    fn scope(scope_id: &str) -> Vec<Predicate>;
    /// The status column constrained by an active selection override.
    fn status() -> Option<Column>;
    fn id() -> Column {
        Column::new(Self::ALIAS, "id")
    }
    /// Newest first.
    fn order_by() -> Column;
}

// ------------- Logged calls -------------
pub struct LoggedCalls;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoggedCallField {
    Request,
    Response,
    Model,
    StatusCode,
}

impl KnownField for LoggedCallField {
    const ALL: &'static [Self] = &[
        LoggedCallField::Request,
        LoggedCallField::Response,
        LoggedCallField::Model,
        LoggedCallField::StatusCode,
    ];
    fn name(&self) -> &'static str {
        match self {
            LoggedCallField::Request => "Request",
            LoggedCallField::Response => "Response",
            LoggedCallField::Model => "model",
            LoggedCallField::StatusCode => "Status Code",
        }
    }
    fn column(&self) -> Column {
        match self {
            LoggedCallField::Request => Column::new("lcmr", "reqPayload"),
            LoggedCallField::Response => Column::new("lcmr", "respPayload"),
            LoggedCallField::Model => Column::new("lc", "model"),
            LoggedCallField::StatusCode => Column::new("lcmr", "statusCode"),
        }
    }
}

impl Subject for LoggedCalls {
    type Field = LoggedCallField;
    const NAME: &'static str = "logged_calls";
    const TABLE: &'static str = "LoggedCall";
    const ALIAS: &'static str = "lc";
    const TAGS: Option<TagTable> = Some(TagTable {
        table: "LoggedCallTag",
        alias_prefix: "lct",
        parent: "loggedCallId",
        name: "name",
        value: "value",
    });
    fn joins() -> Vec<Join> {
        vec![Join {
            table: "LoggedCallModelResponse",
            alias: "lcmr".into(),
            on: vec![Predicate::ColumnsEq(
                Self::id(),
                Column::new("lcmr", "originalLoggedCallId"),
            )],
        }]
    }
    fn scope(scope_id: &str) -> Vec<Predicate> {
        vec![Predicate::Eq(
            Operand::Column(Column::new("lc", "projectId")),
            SqlValue::from(scope_id),
        )]
    }
    fn status() -> Option<Column> {
        Some(Column::new("lcmr", "statusCode"))
    }
    fn order_by() -> Column {
        Column::new("lc", "requestedAt")
    }
}

// ------------- Dataset entries -------------
pub struct DatasetEntries;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DatasetEntryField {
    Input,
    Output,
}

impl KnownField for DatasetEntryField {
    const ALL: &'static [Self] = &[DatasetEntryField::Input, DatasetEntryField::Output];
    fn name(&self) -> &'static str {
        match self {
            DatasetEntryField::Input => "Input",
            DatasetEntryField::Output => "Output",
        }
    }
    fn column(&self) -> Column {
        match self {
            DatasetEntryField::Input => Column::new("de", "messages"),
            DatasetEntryField::Output => Column::new("de", "output"),
        }
    }
}

impl Subject for DatasetEntries {
    type Field = DatasetEntryField;
    const NAME: &'static str = "dataset_entries";
    const TABLE: &'static str = "DatasetEntry";
    const ALIAS: &'static str = "de";
    const TAGS: Option<TagTable> = None;
    fn joins() -> Vec<Join> {
        Vec::new()
    }
    fn scope(scope_id: &str) -> Vec<Predicate> {
        vec![
            Predicate::Eq(
                Operand::Column(Column::new("de", "datasetId")),
                SqlValue::from(scope_id),
            ),
            Predicate::Eq(
                Operand::Column(Column::new("de", "outdated")),
                SqlValue::Bool(false),
            ),
        ]
    }
    fn status() -> Option<Column> {
        None
    }
    fn order_by() -> Column {
        Column::new("de", "createdAt")
    }
}
