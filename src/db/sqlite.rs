use std::future::{Future, ready};

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{Connection, params_from_iter};
use serde_json::{Number, Value};

use super::{Backend, DbConfig, Executed, Row};
use crate::error::Error;
use crate::query::Statement;

/// SQLite through `rusqlite`. Calls block the current task until the
/// statement finishes.
pub struct Sqlite {
    conn: Connection,
}

impl Backend for Sqlite {
    fn connect(config: &DbConfig) -> impl Future<Output = Result<Self, Error>> + Send {
        let opened = Connection::open(&config.database)
            .map(|conn| Self { conn })
            .map_err(Error::from);
        ready(opened)
    }

    fn execute(&mut self, stmt: &Statement) -> impl Future<Output = Result<Executed, Error>> + Send {
        ready(self.execute_now(stmt))
    }

    fn fetch(&mut self, stmt: &Statement) -> impl Future<Output = Result<Vec<Row>, Error>> + Send {
        ready(self.fetch_now(stmt))
    }
}

impl Sqlite {
    fn execute_now(&mut self, stmt: &Statement) -> Result<Executed, Error> {
        let params = bind(&stmt.params)?;
        let affected = self.conn
            .prepare(&stmt.sql)?
            .execute(params_from_iter(params))?;
        Ok(Executed {
            last_insert_id: u64::try_from(self.conn.last_insert_rowid()).unwrap_or(0),
            affected_rows: affected as u64,
        })
    }

    fn fetch_now(&mut self, stmt: &Statement) -> Result<Vec<Row>, Error> {
        let params = bind(&stmt.params)?;
        let mut prepared = self.conn.prepare(&stmt.sql)?;
        let names: Vec<String> = prepared.column_names().into_iter().map(str::to_owned).collect();

        let mut rows = prepared.query(params_from_iter(params))?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (i, name) in names.iter().enumerate() {
                record.insert(name.clone(), from_sqlite(row.get_ref(i)?));
            }
            out.push(record);
        }
        Ok(out)
    }
}

fn bind(values: &[Value]) -> Result<Vec<SqlValue>, Error> {
    values.iter().map(to_sqlite).collect()
}

/// SQLite integers are signed 64-bit; larger unsigned values are refused
/// rather than rounded through `REAL`.
fn to_sqlite(value: &Value) -> Result<SqlValue, Error> {
    Ok(match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None if n.is_u64() => {
                return Err(Error::InvalidArgument(format!("Integer out of range for SQLite: {n}")));
            }
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    })
}

fn from_sqlite(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
        ValueRef::Text(t) | ValueRef::Blob(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
    }
}
