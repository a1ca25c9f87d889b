//! Predicate trees and their rendering into parameterized SQL.
//!
//! Nothing a caller supplies is ever written into the SQL text. Table names,
//! column names and join aliases all originate in this crate; filter values,
//! tag names and scope identifiers travel as bound parameters.

use std::borrow::Cow;

use rusqlite::types::{ToSql, ToSqlOutput};
use serde::{Deserialize, Serialize};

/// The SQL flavor a query is rendered for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `$1` placeholders, `::text` casts.
    Postgres,
    /// `?1` placeholders, `CAST(.. AS TEXT)`.
    #[default]
    Sqlite,
}

impl Dialect {
    fn placeholder(&self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
        }
    }
    fn text_cast(&self, expression: &str) -> String {
        match self {
            Dialect::Postgres => format!("{expression}::text"),
            Dialect::Sqlite => format!("CAST({expression} AS TEXT)"),
        }
    }
}

/// A value bound to a placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Bool(bool),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Text(text) => Ok(ToSqlOutput::from(text.as_str())),
            SqlValue::Integer(integer) => Ok(ToSqlOutput::from(*integer)),
            SqlValue::Bool(flag) => Ok(ToSqlOutput::from(*flag)),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(text: &str) -> Self {
        SqlValue::Text(text.to_string())
    }
}
impl From<String> for SqlValue {
    fn from(text: String) -> Self {
        SqlValue::Text(text)
    }
}

/// A column qualified by the alias of the table it is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    alias: Cow<'static, str>,
    name: &'static str,
}

impl Column {
    pub const fn new(alias: &'static str, name: &'static str) -> Self {
        Self {
            alias: Cow::Borrowed(alias),
            name,
        }
    }
    pub fn aliased(alias: impl Into<Cow<'static, str>>, name: &'static str) -> Self {
        Self {
            alias: alias.into(),
            name,
        }
    }
    fn qualified(&self) -> String {
        format!("{}.\"{}\"", self.alias, self.name)
    }
}

/// Something a comparator can be applied to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Column(Column),
    /// The column coerced to its textual representation.
    Text(Column),
}

/// A `LIKE` pattern and whether it carries an escape character.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LikePattern {
    pub pattern: String,
    pub escaped: bool,
}

impl LikePattern {
    /// `%value%`, with `value` passed through untouched.
    pub fn containing(value: &str) -> Self {
        Self {
            pattern: format!("%{value}%"),
            escaped: false,
        }
    }
    /// `%value%`, with `\`, `%` and `_` in `value` matched literally.
    pub fn containing_literal(value: &str) -> Self {
        let mut pattern = String::with_capacity(value.len() + 2);
        pattern.push('%');
        for c in value.chars() {
            if matches!(c, '\\' | '%' | '_') {
                pattern.push('\\');
            }
            pattern.push(c);
        }
        pattern.push('%');
        Self {
            pattern,
            escaped: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Eq(Operand, SqlValue),
    DistinctFrom(Operand, SqlValue),
    Like(Operand, LikePattern),
    /// Satisfied by non-matching values and by NULL.
    NotLikeOrNull(Operand, LikePattern),
    /// Join condition between two columns.
    ColumnsEq(Column, Column),
    In(Operand, Vec<SqlValue>),
    NotIn(Operand, Vec<SqlValue>),
    /// Matches no row.
    Never,
}

/// A left join against `table` under `alias`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    pub table: &'static str,
    pub alias: Cow<'static, str>,
    pub on: Vec<Predicate>,
}

/// Accumulates SQL text and its parameters in placeholder order.
pub(crate) struct SqlWriter {
    dialect: Dialect,
    sql: String,
    params: Vec<SqlValue>,
}

impl SqlWriter {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            sql: String::new(),
            params: Vec::new(),
        }
    }
    pub(crate) fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }
    pub(crate) fn bind(&mut self, value: SqlValue) {
        self.params.push(value);
        let placeholder = self.dialect.placeholder(self.params.len());
        self.sql.push_str(&placeholder);
    }
    pub(crate) fn column(&mut self, column: &Column) {
        self.sql.push_str(&column.qualified());
    }
    pub(crate) fn operand(&mut self, operand: &Operand) {
        match operand {
            Operand::Column(column) => self.column(column),
            Operand::Text(column) => {
                let cast = self.dialect.text_cast(&column.qualified());
                self.sql.push_str(&cast);
            }
        }
    }
    fn like(&mut self, operand: &Operand, keyword: &str, pattern: &LikePattern) {
        self.operand(operand);
        self.push(keyword);
        self.bind(SqlValue::Text(pattern.pattern.clone()));
        if pattern.escaped {
            self.push(" ESCAPE '\\'");
        }
    }
    fn list(&mut self, values: &[SqlValue]) {
        self.push("(");
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                self.push(", ");
            }
            self.bind(value.clone());
        }
        self.push(")");
    }
    pub(crate) fn predicate(&mut self, predicate: &Predicate) {
        match predicate {
            Predicate::Eq(operand, value) => {
                self.operand(operand);
                self.push(" = ");
                self.bind(value.clone());
            }
            Predicate::DistinctFrom(operand, value) => {
                self.operand(operand);
                self.push(" IS DISTINCT FROM ");
                self.bind(value.clone());
            }
            Predicate::Like(operand, pattern) => self.like(operand, " LIKE ", pattern),
            Predicate::NotLikeOrNull(operand, pattern) => {
                self.push("(");
                self.like(operand, " NOT LIKE ", pattern);
                self.push(" OR ");
                self.operand(operand);
                self.push(" IS NULL)");
            }
            Predicate::ColumnsEq(left, right) => {
                self.column(left);
                self.push(" = ");
                self.column(right);
            }
            Predicate::In(_, values) if values.is_empty() => self.push("1 = 0"),
            Predicate::In(operand, values) => {
                self.operand(operand);
                self.push(" IN ");
                self.list(values);
            }
            Predicate::NotIn(_, values) if values.is_empty() => self.push("1 = 1"),
            Predicate::NotIn(operand, values) => {
                self.operand(operand);
                self.push(" NOT IN ");
                self.list(values);
            }
            Predicate::Never => self.push("1 = 0"),
        }
    }
    pub(crate) fn conjunction(&mut self, parts: &[Predicate]) {
        if parts.is_empty() {
            self.push("1 = 1");
            return;
        }
        for (i, part) in parts.iter().enumerate() {
            if i > 0 {
                self.push(" AND ");
            }
            self.predicate(part);
        }
    }
    pub(crate) fn join(&mut self, join: &Join) {
        self.push(" LEFT JOIN \"");
        self.push(join.table);
        self.push("\" AS ");
        self.push(&join.alias);
        self.push(" ON ");
        self.conjunction(&join.on);
    }
    pub(crate) fn finish(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }
}
