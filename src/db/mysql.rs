use mysql_async::prelude::Queryable;
use mysql_async::{Conn, OptsBuilder, Params};
use serde_json::{Number, Value};

use super::{Backend, DbConfig, Executed, Row};
use crate::error::Error;
use crate::query::Statement;

/// MySQL / MariaDB over one `mysql_async` connection, `utf8mb4` session.
pub struct MySql {
    conn: Conn,
}

impl Backend for MySql {
    async fn connect(config: &DbConfig) -> Result<Self, Error> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(config.host.clone())
            .tcp_port(config.port)
            .user(Some(config.user.clone()))
            .pass(Some(config.password.clone()))
            .db_name(Some(config.database.clone()))
            .init(vec!["SET NAMES utf8mb4"]);
        let conn = Conn::new(opts).await?;
        Ok(Self { conn })
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<Executed, Error> {
        self.conn.exec_drop(stmt.sql.as_str(), params(&stmt.params)).await?;
        Ok(Executed {
            last_insert_id: self.conn.last_insert_id().unwrap_or(0),
            affected_rows: self.conn.affected_rows(),
        })
    }

    async fn fetch(&mut self, stmt: &Statement) -> Result<Vec<Row>, Error> {
        let rows: Vec<mysql_async::Row> = self.conn
            .exec(stmt.sql.as_str(), params(&stmt.params))
            .await?;
        Ok(rows.iter().map(into_row).collect())
    }
}

fn params(values: &[Value]) -> Params {
    if values.is_empty() {
        Params::Empty
    } else {
        Params::Positional(values.iter().map(to_mysql).collect())
    }
}

fn to_mysql(value: &Value) -> mysql_async::Value {
    use mysql_async::Value as My;

    match value {
        Value::Null => My::NULL,
        Value::Bool(b) => My::Int(i64::from(*b)),
        Value::Number(n) => match (n.as_i64(), n.as_u64()) {
            (Some(i), _) => My::Int(i),
            (None, Some(u)) => My::UInt(u),
            _ => My::Double(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => My::Bytes(s.clone().into_bytes()),
        // Arrays and objects are stored as their JSON text.
        other => My::Bytes(other.to_string().into_bytes()),
    }
}

fn into_row(row: &mysql_async::Row) -> Row {
    row.columns_ref()
        .iter()
        .enumerate()
        .map(|(i, column)| {
            let value = row.as_ref(i).map(from_mysql).unwrap_or(Value::Null);
            (column.name_str().into_owned(), value)
        })
        .collect()
}

fn from_mysql(value: &mysql_async::Value) -> Value {
    use mysql_async::Value as My;

    match value {
        My::NULL => Value::Null,
        My::Int(i) => Value::from(*i),
        My::UInt(u) => Value::from(*u),
        My::Float(f) => Number::from_f64(f64::from(*f)).map_or(Value::Null, Value::Number),
        My::Double(d) => Number::from_f64(*d).map_or(Value::Null, Value::Number),
        My::Bytes(b) => Value::String(String::from_utf8_lossy(b).into_owned()),
        My::Date(y, mo, d, h, mi, s, us) => {
            let mut text = format!("{y:04}-{mo:02}-{d:02} {h:02}:{mi:02}:{s:02}");
            if *us > 0 {
                text.push_str(&format!(".{us:06}"));
            }
            Value::String(text)
        }
        My::Time(negative, days, h, mi, s, us) => {
            let hours = u64::from(*days) * 24 + u64::from(*h);
            let sign = if *negative { "-" } else { "" };
            let mut text = format!("{sign}{hours:02}:{mi:02}:{s:02}");
            if *us > 0 {
                text.push_str(&format!(".{us:06}"));
            }
            Value::String(text)
        }
    }
}
