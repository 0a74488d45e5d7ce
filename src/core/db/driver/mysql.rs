/// MySQL driver backed by the blocking `mysql` crate.
///
/// Sessions run with autocommit off, so every statement joins a
/// transaction that only `commit` makes durable.
use crate::core::db::connection::ConnectionConfig;
use crate::core::db::driver::{Connector, DriverConnection};
use crate::core::db::value::{Row, Value};
use crate::core::{DbError, Result};
use crate::sql::count_placeholders;
use chrono::{Datelike, NaiveDate, Timelike};
use ::mysql::prelude::Queryable;
use ::mysql::{Conn, OptsBuilder, Params, Value as MyValue};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default, Clone, Copy)]
pub struct MysqlConnector;

impl Connector for MysqlConnector {
    fn connect(&self, config: &ConnectionConfig) -> Result<Box<dyn DriverConnection>> {
        debug!("Connecting to MySQL at {}:{}", config.host, config.port);
        let opts = OptsBuilder::new()
            .ip_or_hostname(Some(config.host.clone()))
            .tcp_port(config.port)
            .user(config.user.clone())
            .pass(config.password.clone())
            .db_name(config.database.clone())
            .init(session_init(config)?);
        let conn = Conn::new(opts)?;
        Ok(Box::new(MysqlConnection { conn }))
    }
}

/// Statements run on every new session.
fn session_init(config: &ConnectionConfig) -> Result<Vec<String>> {
    let charset = &config.charset;
    if charset.is_empty() || !charset.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(DbError::Config(format!("invalid charset {:?}", charset)));
    }
    Ok(vec![format!("SET NAMES {}", charset), "SET autocommit = 0".to_string()])
}

pub struct MysqlConnection {
    conn: Conn,
}

impl DriverConnection for MysqlConnection {
    fn ping(&mut self) -> Result<()> {
        self.conn.query_drop("SELECT 1")?;
        Ok(())
    }

    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<u64> {
        self.conn.exec_drop(sql, to_params(params))?;
        Ok(self.conn.affected_rows())
    }

    fn fetch_all(&mut self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        let rows: Vec<::mysql::Row> = self.conn.exec(sql, to_params(params))?;
        let mut columns: Option<Arc<[String]>> = None;
        Ok(rows
            .iter()
            .map(|row| convert_row(row, &mut columns))
            .collect())
    }

    fn execute_batch(&mut self, sql: &str, rows: &[Vec<Value>]) -> Result<()> {
        let template = MultiRowInsert::parse(sql).filter(|t| rows.iter().all(|r| r.len() == t.width));
        let Some(template) = template else {
            self.conn
                .exec_batch(sql, rows.iter().map(|params| to_params(params)))?;
            return Ok(());
        };

        for chunk in rows.chunks(template.rows_per_statement()) {
            let params: Vec<Value> = chunk.iter().flatten().cloned().collect();
            self.conn.exec_drop(template.sql(chunk.len()), to_params(&params))?;
        }
        Ok(())
    }

    fn stream_rows(
        &mut self,
        sql: &str,
        params: &[Value],
        sink: &mut dyn FnMut(Row) -> bool,
    ) -> Result<()> {
        let mut columns: Option<Arc<[String]>> = None;
        // Dropping the result early drains the remaining packets off the wire.
        for row in self.conn.exec_iter(sql, to_params(params))? {
            let row = row?;
            if !sink(convert_row(&row, &mut columns)) {
                break;
            }
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT")?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.conn.query_drop("ROLLBACK")?;
        Ok(())
    }
}

/// Prepared statements carry at most this many placeholders.
const MAX_STATEMENT_PARAMS: usize = 65_535;
const MAX_ROWS_PER_STATEMENT: usize = 1_000;

/// An `INSERT`/`REPLACE ... VALUES (..)` template whose row tuple can be
/// repeated so one statement carries many rows.
#[derive(Debug, PartialEq)]
struct MultiRowInsert<'a> {
    head: &'a str,
    tuple: &'a str,
    tail: &'a str,
    /// Placeholders per row
    width: usize,
}

impl<'a> MultiRowInsert<'a> {
    /// `None` unless `sql` is a single-tuple insert whose placeholders all
    /// sit inside the tuple. An `ON DUPLICATE KEY UPDATE` tail without
    /// placeholders is kept.
    fn parse(sql: &'a str) -> Option<Self> {
        let sql = sql.trim().trim_end_matches(';').trim_end();
        let upper = sql.to_ascii_uppercase();
        if !upper.starts_with("INSERT") && !upper.starts_with("REPLACE") {
            return None;
        }

        let unquoted = unquoted_mask(sql);
        let values_end = find_keyword(&upper, &unquoted, "VALUES")? + "VALUES".len();
        let open = values_end + (sql[values_end..].len() - sql[values_end..].trim_start().len());
        if !sql[open..].starts_with('(') {
            return None;
        }
        let close = matching_paren(sql, &unquoted, open)?;

        let tail = &sql[close + 1..];
        let rest = tail.trim_start().to_ascii_uppercase();
        if !(rest.is_empty() || rest.starts_with("ON DUPLICATE")) || count_placeholders(tail) > 0 {
            return None;
        }
        let tuple = &sql[open..=close];
        let width = count_placeholders(tuple);
        if width == 0 || count_placeholders(sql) != width {
            return None;
        }
        Some(MultiRowInsert { head: &sql[..open], tuple, tail, width })
    }

    fn rows_per_statement(&self) -> usize {
        (MAX_STATEMENT_PARAMS / self.width).clamp(1, MAX_ROWS_PER_STATEMENT)
    }

    fn sql(&self, rows: usize) -> String {
        format!("{}{}{}", self.head, vec![self.tuple; rows].join(", "), self.tail)
    }
}

/// `true` for every byte outside string literals and quoted identifiers.
fn unquoted_mask(sql: &str) -> Vec<bool> {
    let mut mask = vec![false; sql.len()];
    let mut quote: Option<u8> = None;
    let mut escaped = false;
    for (i, &b) in sql.as_bytes().iter().enumerate() {
        match quote {
            Some(_) if escaped => escaped = false,
            Some(q) if b == b'\\' && q != b'`' => escaped = true,
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if matches!(b, b'\'' | b'"' | b'`') => quote = Some(b),
            None => mask[i] = true,
        }
    }
    mask
}

/// Byte offset of the first unquoted occurrence of `keyword` as a whole word.
fn find_keyword(upper: &str, unquoted: &[bool], keyword: &str) -> Option<usize> {
    let bytes = upper.as_bytes();
    let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';
    upper.match_indices(keyword).map(|(i, _)| i).find(|&i| {
        let end = i + keyword.len();
        unquoted[i]
            && (i == 0 || !is_word(bytes[i - 1]))
            && (end == bytes.len() || !is_word(bytes[end]))
    })
}

fn matching_paren(sql: &str, unquoted: &[bool], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (i, &b) in sql.as_bytes().iter().enumerate().skip(open) {
        if !unquoted[i] {
            continue;
        }
        match b {
            b'(' => depth += 1,
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}

fn to_params(params: &[Value]) -> Params {
    if params.is_empty() {
        Params::Empty
    } else {
        Params::Positional(params.iter().map(to_mysql).collect())
    }
}

fn to_mysql(value: &Value) -> MyValue {
    match value {
        Value::Null => MyValue::NULL,
        Value::Bool(v) => MyValue::Int(i64::from(*v)),
        Value::Int(v) => MyValue::Int(*v),
        Value::UInt(v) => MyValue::UInt(*v),
        Value::Float(v) => MyValue::Double(*v),
        Value::Text(v) => MyValue::Bytes(v.clone().into_bytes()),
        Value::Bytes(v) => MyValue::Bytes(v.clone()),
        Value::DateTime(v) => MyValue::Date(
            v.year() as u16,
            v.month() as u8,
            v.day() as u8,
            v.hour() as u8,
            v.minute() as u8,
            v.second() as u8,
            v.nanosecond() / 1_000,
        ),
    }
}

fn from_mysql(value: &MyValue) -> Value {
    match value {
        MyValue::NULL => Value::Null,
        MyValue::Int(v) => Value::Int(*v),
        MyValue::UInt(v) => Value::UInt(*v),
        MyValue::Float(v) => Value::Float(f64::from(*v)),
        MyValue::Double(v) => Value::Float(*v),
        MyValue::Bytes(b) => match std::str::from_utf8(b) {
            Ok(s) => Value::Text(s.to_string()),
            Err(_) => Value::Bytes(b.clone()),
        },
        MyValue::Date(y, m, d, h, mi, s, us) => NaiveDate::from_ymd_opt(i32::from(*y), u32::from(*m), u32::from(*d))
            .and_then(|date| date.and_hms_micro_opt(u32::from(*h), u32::from(*mi), u32::from(*s), *us))
            // Zero dates ('0000-00-00') have no chrono equivalent.
            .map_or_else(|| Value::Text(format!("{y:04}-{m:02}-{d:02} {h:02}:{mi:02}:{s:02}")), Value::DateTime),
        MyValue::Time(negative, days, h, mi, s, us) => {
            let hours = days * 24 + u32::from(*h);
            let sign = if *negative { "-" } else { "" };
            Value::Text(format!("{sign}{hours:02}:{mi:02}:{s:02}.{us:06}"))
        }
    }
}

fn convert_row(row: &::mysql::Row, columns: &mut Option<Arc<[String]>>) -> Row {
    let names = columns
        .get_or_insert_with(|| {
            row.columns_ref()
                .iter()
                .map(|c| c.name_str().into_owned())
                .collect()
        })
        .clone();
    let values = (0..row.len())
        .map(|i| row.as_ref(i).map_or(Value::Null, from_mysql))
        .collect();
    Row::new(names, values)
}
