//! Parameterized SQL generation.
//!
//! A [`QuerySpec`] describes one operation on one table. [`QuerySpec::build`]
//! validates every identifier against `^[A-Za-z0-9_-]+$`, checks limit and
//! sort, and only then assembles SQL text. Identifiers are interpolated;
//! values never are: they travel as positional `?` parameters in
//! data-then-condition order.
//!
//! ```rust
//! use aapje::query::{Columns, QuerySpec, SelectOptions};
//! use serde_json::json;
//!
//! let stmt = QuerySpec::Select {
//!     table: "users",
//!     columns: &Columns::All,
//!     conditions: &json!({ "id": 42 }),
//!     options: &SelectOptions::new(),
//! }
//! .build()
//! .unwrap();
//!
//! assert_eq!(stmt.sql, "SELECT * FROM users WHERE id = ? LIMIT 1");
//! assert_eq!(stmt.params, [json!(42)]);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::Error;

static IDENTIFIER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+$").unwrap_or_else(|e| panic!("identifier pattern: {e}"))
});

/// Accepts a table / column / order-by name only if it matches
/// `^[A-Za-z0-9_-]+$`.
pub fn check_identifier(name: &str) -> Result<(), Error> {
    if IDENTIFIER.is_match(name) {
        Ok(())
    } else {
        Err(Error::InvalidIdentifier(name.to_owned()))
    }
}

// ── Statement ─────────────────────────────────────────────────────────────────

/// SQL text plus its positional parameters.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Statement {
    /// A hand-written statement. Only the parameters are escaped.
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self { sql: sql.into(), params }
    }
}

// ── Columns ───────────────────────────────────────────────────────────────────

/// The column list of a select.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Columns {
    /// `*`; skips column validation.
    #[default]
    All,
    List(Vec<String>),
}

impl Columns {
    pub fn list<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(columns.into_iter().map(Into::into).collect())
    }
}

/// `"*"` or an array of strings. A `"*"` inside an array is just a name
/// and fails validation.
impl TryFrom<&Value> for Columns {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let invalid = || Error::InvalidArgument("Columns must be '*' or an array of columns".into());
        match value {
            Value::String(s) if s == "*" => Ok(Self::All),
            Value::Array(items) => items.iter()
                .map(|v| v.as_str().map(str::to_owned).ok_or_else(invalid))
                .collect::<Result<_, _>>()
                .map(Self::List),
            _ => Err(invalid()),
        }
    }
}

// ── Sort / SelectOptions ──────────────────────────────────────────────────────

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Sort {
    Asc,
    Desc,
}

impl Sort {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Case-insensitive: `"desc"`, `"Desc"` and `"DESC"` are the same.
impl FromStr for Sort {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(Error::InvalidArgument(format!("Invalid sort: {s}"))),
        }
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordering and limit of a select.
///
/// `sort` without `order_by` has no effect. `limit` is ignored by
/// [`QuerySpec::Select`], which always fetches one row.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SelectOptions {
    pub order_by: Option<String>,
    pub sort: Option<Sort>,
    pub limit: Option<i64>,
}

impl SelectOptions {
    pub fn new() -> Self { Self::default() }

    pub fn order_by(mut self, column: impl Into<String>) -> Self {
        self.order_by = Some(column.into());
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Checked when the query is built: must be positive.
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    fn check(&self, with_limit: bool) -> Result<(), Error> {
        if let Some(column) = &self.order_by {
            check_identifier(column)?;
        }
        if with_limit {
            if let Some(limit) = self.limit.filter(|n| *n <= 0) {
                return Err(Error::InvalidArgument(format!("Invalid limit: {limit}")));
            }
        }
        Ok(())
    }
}

/// Reads `{"orderBy": "id", "sort": "desc", "limit": 5}` (`order_by` is
/// accepted too). `null` means no options.
impl TryFrom<&Value> for SelectOptions {
    type Error = Error;

    fn try_from(value: &Value) -> Result<Self, Self::Error> {
        let Some(map) = object(value, "options")? else {
            return Ok(Self::default());
        };

        let mut options = Self::default();
        if let Some(v) = map.get("orderBy").or_else(|| map.get("order_by")).filter(|v| !v.is_null()) {
            let column = v.as_str()
                .ok_or_else(|| Error::InvalidIdentifier(v.to_string()))?;
            options.order_by = Some(column.to_owned());
        }
        if let Some(v) = map.get("sort").filter(|v| !v.is_null()) {
            let sort = v.as_str()
                .ok_or_else(|| Error::InvalidArgument(format!("Invalid sort: {v}")))?;
            options.sort = Some(sort.parse()?);
        }
        if let Some(v) = map.get("limit").filter(|v| !v.is_null()) {
            let limit = v.as_i64()
                .filter(|n| *n > 0)
                .ok_or_else(|| Error::InvalidArgument(format!("Invalid limit: {}", display(v))))?;
            options.limit = Some(limit);
        }
        Ok(options)
    }
}

// ── QuerySpec ─────────────────────────────────────────────────────────────────

/// One database operation, before SQL generation.
///
/// `data` and `conditions` are JSON objects whose key order is kept.
/// `conditions` may also be `null`; both `null` and `{}` mean no `WHERE`.
#[derive(Clone, Copy, Debug)]
pub enum QuerySpec<'a> {
    Insert {
        table: &'a str,
        data: &'a Value,
    },
    Update {
        table: &'a str,
        data: &'a Value,
        conditions: &'a Value,
    },
    Delete {
        table: &'a str,
        conditions: &'a Value,
    },
    /// Like `SelectAll`, but always `LIMIT 1`.
    Select {
        table: &'a str,
        columns: &'a Columns,
        conditions: &'a Value,
        options: &'a SelectOptions,
    },
    SelectAll {
        table: &'a str,
        columns: &'a Columns,
        conditions: &'a Value,
        options: &'a SelectOptions,
    },
}

impl QuerySpec<'_> {
    /// Validates, then renders SQL and parameters.
    pub fn build(&self) -> Result<Statement, Error> {
        self.check()?;

        let mut params = Vec::new();
        let sql = match *self {
            Self::Insert { table, data } => {
                let data = fields(data, "data")?;
                let columns = data.keys().map(String::as_str).collect::<Vec<_>>().join(",");
                let placeholders = vec!["?"; data.len()].join(",");
                params.extend(data.values().cloned());
                format!("INSERT INTO {table} ({columns}) VALUES ({placeholders})")
            }
            Self::Update { table, data, conditions } => {
                let data = fields(data, "data")?;
                let set = data.keys().map(|k| format!("{k} = ?")).collect::<Vec<_>>().join(",");
                params.extend(data.values().cloned());
                let filter = where_clause(conditions, &mut params)?;
                format!("UPDATE {table} SET {set}{filter}")
            }
            Self::Delete { table, conditions } => {
                let filter = where_clause(conditions, &mut params)?;
                format!("DELETE FROM {table}{filter}")
            }
            Self::Select { table, columns, conditions, options } => {
                let mut sql = select_sql(table, columns, conditions, options, &mut params)?;
                sql.push_str(" LIMIT 1");
                sql
            }
            Self::SelectAll { table, columns, conditions, options } => {
                let mut sql = select_sql(table, columns, conditions, options, &mut params)?;
                if let Some(limit) = options.limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                sql
            }
        };

        Ok(Statement { sql, params })
    }

    /// Every identifier, the limit and the sort, before any SQL exists.
    fn check(&self) -> Result<(), Error> {
        match *self {
            Self::Insert { table, data } => {
                check_identifier(table)?;
                check_keys(fields(data, "data")?)
            }
            Self::Update { table, data, conditions } => {
                check_identifier(table)?;
                check_keys(fields(data, "data")?)?;
                check_conditions(conditions)
            }
            Self::Delete { table, conditions } => {
                check_identifier(table)?;
                check_conditions(conditions)
            }
            Self::Select { table, columns, conditions, options } => {
                check_identifier(table)?;
                check_columns(columns)?;
                options.check(false)?;
                check_conditions(conditions)
            }
            Self::SelectAll { table, columns, conditions, options } => {
                check_identifier(table)?;
                check_columns(columns)?;
                options.check(true)?;
                check_conditions(conditions)
            }
        }
    }
}

fn select_sql(
    table: &str,
    columns: &Columns,
    conditions: &Value,
    options: &SelectOptions,
    params: &mut Vec<Value>,
) -> Result<String, Error> {
    let columns = match columns {
        Columns::All => "*".to_owned(),
        Columns::List(list) => list.join(","),
    };
    let mut sql = format!("SELECT {columns} FROM {table}");
    sql.push_str(&where_clause(conditions, params)?);

    if let Some(order_by) = &options.order_by {
        sql.push_str(&format!(" ORDER BY {order_by}"));
        if let Some(sort) = options.sort {
            sql.push(' ');
            sql.push_str(sort.as_str());
        }
    }
    Ok(sql)
}

/// ` WHERE a = ? AND b = ?`, or nothing for `null` / `{}`.
fn where_clause(conditions: &Value, params: &mut Vec<Value>) -> Result<String, Error> {
    let Some(conditions) = object(conditions, "conditions")?.filter(|m| !m.is_empty()) else {
        return Ok(String::new());
    };
    let clauses = conditions.keys().map(|k| format!("{k} = ?")).collect::<Vec<_>>();
    params.extend(conditions.values().cloned());
    Ok(format!(" WHERE {}", clauses.join(" AND ")))
}

fn check_columns(columns: &Columns) -> Result<(), Error> {
    match columns {
        Columns::All => Ok(()),
        Columns::List(list) if list.is_empty() => {
            Err(Error::InvalidArgument("Columns must be '*' or a non-empty list".into()))
        }
        Columns::List(list) => list.iter().try_for_each(|c| check_identifier(c)),
    }
}

fn check_conditions(conditions: &Value) -> Result<(), Error> {
    match object(conditions, "conditions")? {
        Some(map) => check_keys(map),
        None => Ok(()),
    }
}

fn check_keys(map: &Map<String, Value>) -> Result<(), Error> {
    map.keys().try_for_each(|k| check_identifier(k))
}

/// Insert / update data: a non-empty object.
fn fields<'v>(value: &'v Value, what: &str) -> Result<&'v Map<String, Value>, Error> {
    object(value, what)?
        .filter(|m| !m.is_empty())
        .ok_or_else(|| Error::InvalidArgument(format!("{what} must be a non-empty object")))
}

/// `null` is no map; anything but an object is rejected.
fn object<'v>(value: &'v Value, what: &str) -> Result<Option<&'v Map<String, Value>>, Error> {
    match value {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map)),
        _ => Err(Error::InvalidArgument(format!("{what} must be an object"))),
    }
}

/// Strings without their JSON quotes, everything else as JSON.
fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
