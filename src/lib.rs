//! Logsift – compiles open-ended filter lists into parameterized SQL.
//!
//! A caller describes what it wants to see as a list of
//! [`filter::FilterCriterion`] values, each a `(field, comparator, value)`
//! triple. Fields either name a fixed column of the subject being filtered
//! (for logged calls: `Request`, `Response`, `model`, `Status Code`) or, when
//! they match nothing fixed, a free-form tag. Every tag filter gets its own
//! left join against the tag table so several conditions on tags (even on the
//! same tag) can be combined conjunctively.
//!
//! ## Modules
//! * [`filter`] – Filter criteria, comparator tokens and selection overrides.
//! * [`comparator`] – Turns a comparator and value into a predicate builder.
//! * [`field`] – Resolves field names into known columns or tag names.
//! * [`subject`] – The filterable record kinds and their tables.
//! * [`tags`] – Plans one aliased tag join per tag filter.
//! * [`selection`] – Explicit inclusion/exclusion of record ids.
//! * [`query`] – Assembles everything into a [`query::FilteredQuery`].
//! * [`sql`] – Predicate trees and rendering for SQLite and Postgres.
//! * [`store`] – SQLite store executing compiled queries.
//! * [`server`] – HTTP API over the store.
//! * [`settings`] – File and environment configuration.
//!
//! ## Quick Start
//! ```
//! use logsift::filter::FilterCriterion;
//! use logsift::query::{Projection, compile_filters};
//! use logsift::sql::Dialect;
//! use logsift::subject::LoggedCalls;
//!
//! let filters = [
//!     FilterCriterion::equals("env", "prod"),
//!     FilterCriterion::contains("Response", "timeout"),
//! ];
//! let query = compile_filters::<LoggedCalls>(&filters, "project-1").unwrap();
//! assert_eq!(query.tag_joins(), 1);
//! let compiled = query.render(Dialect::Postgres, Projection::Count);
//! assert!(compiled.sql.contains("lct0"));
//! assert!(!compiled.sql.contains("prod"));
//! ```

pub mod comparator;
pub mod error;
pub mod field;
pub mod filter;
pub mod query;
pub mod selection;
pub mod server;
pub mod settings;
pub mod sql;
pub mod store;
pub mod subject;
pub mod tags;

pub use error::{LogsiftError, Result};
pub use filter::{ComparatorKind, FilterCriterion, SelectionOverride};
pub use query::{
    CompileOptions, CompiledQuery, FilteredQuery, Projection, UnknownFieldPolicy, compile_filters,
    compile_filters_with, compile_filters_with_selection,
};
