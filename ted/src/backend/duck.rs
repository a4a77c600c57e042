//! DuckDB through the embedded `duckdb` crate.
//!
//! The driver is synchronous, so every call runs on the blocking pool.
//! Cursors use a cloned connection and never hold the shared one.

use std::sync::{Arc, Mutex};

use duckdb::Connection;
use duckdb::types::{TimeUnit, Value as DuckValue};

use super::{Backend, ExecOutcome, RowStream};
use crate::dialect::{DbType, Dialect};
use crate::error::{Result, TedError};
use crate::query::BoundQuery;
use crate::value::Value;

pub struct DuckBackend {
    conn: Arc<Mutex<Connection>>,
    dialect: Dialect,
}

impl DuckBackend {
    /// `duckdb://path/to/file.duckdb` or `duckdb::memory:`.
    pub async fn open(dsn: &str) -> Result<Self> {
        let path = dsn
            .strip_prefix("duckdb://")
            .or_else(|| dsn.strip_prefix("duckdb:"))
            .unwrap_or(dsn)
            .to_string();
        let conn = tokio::task::spawn_blocking(move || {
            if path.is_empty() || path == ":memory:" {
                Connection::open_in_memory()
            } else {
                Connection::open(&path)
            }
        })
        .await
        .map_err(|e| TedError::Connect(e.to_string()))?
        .map_err(|e| TedError::Connect(e.to_string()))?;
        tracing::info!(db_type = "duckdb", "connected");
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            dialect: Dialect::new(DbType::Duckdb),
        })
    }

    async fn blocking<T, F>(&self, op: &'static str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> duckdb::Result<T> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|_| TedError::query(op, "connection mutex poisoned"))?;
            f(&mut guard).map_err(|e| TedError::query(op, e))
        })
        .await
        .map_err(|e| TedError::query(op, e))?
    }
}

fn bind(value: &Value) -> DuckValue {
    match value {
        Value::Null => DuckValue::Null,
        Value::Int(i) => DuckValue::BigInt(*i),
        Value::Float(f) => DuckValue::Double(*f),
        Value::Bool(b) => DuckValue::Boolean(*b),
        Value::Text(s) => DuckValue::Text(s.clone()),
        Value::Bytes(b) => DuckValue::Blob(b.clone()),
        Value::Timestamp(ts) => {
            DuckValue::Timestamp(TimeUnit::Microsecond, ts.and_utc().timestamp_micros())
        }
    }
}

fn decode(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i.into()),
        DuckValue::SmallInt(i) => Value::Int(i.into()),
        DuckValue::Int(i) => Value::Int(i.into()),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::UTinyInt(i) => Value::Int(i.into()),
        DuckValue::USmallInt(i) => Value::Int(i.into()),
        DuckValue::UInt(i) => Value::Int(i.into()),
        DuckValue::UBigInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(i.to_string())),
        DuckValue::HugeInt(i) => i64::try_from(i)
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(i.to_string())),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => Value::Text(d.to_string()),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        DuckValue::Blob(b) => Value::Bytes(b),
        DuckValue::Timestamp(unit, n) => {
            match chrono::DateTime::from_timestamp_micros(unit.to_micros(n)) {
                Some(dt) => Value::Timestamp(dt.naive_utc()),
                None => Value::Text(n.to_string()),
            }
        }
        other => Value::Text(format!("{other:?}")),
    }
}

fn run_query(conn: &Connection, sql: &str, params: &[DuckValue], width: usize) -> duckdb::Result<Vec<Vec<Value>>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(decode(row.get::<_, DuckValue>(i)?));
        }
        out.push(cells);
    }
    Ok(out)
}

fn params(query: &BoundQuery) -> Vec<DuckValue> {
    query.params.iter().map(bind).collect()
}

#[async_trait::async_trait]
impl Backend for DuckBackend {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    async fn query(&self, op: &'static str, query: &BoundQuery) -> Result<Vec<Vec<Value>>> {
        tracing::debug!(op, sql = %query.sql, "query");
        let sql = query.sql.clone();
        let params = params(query);
        let width = query.width;
        self.blocking(op, move |conn| run_query(conn, &sql, &params, width))
            .await
    }

    async fn execute(&self, op: &'static str, query: &BoundQuery) -> Result<ExecOutcome> {
        tracing::debug!(op, sql = %query.sql, "execute");
        let sql = query.sql.clone();
        let params = params(query);
        let n = self
            .blocking(op, move |conn| {
                conn.execute(&sql, duckdb::params_from_iter(params.iter()))
            })
            .await?;
        Ok(ExecOutcome {
            rows_affected: n as u64,
            last_insert_id: None,
        })
    }

    async fn execute_and_fetch(
        &self,
        op: &'static str,
        exec: &BoundQuery,
        fetch: &BoundQuery,
    ) -> Result<(ExecOutcome, Vec<Vec<Value>>)> {
        let exec_sql = exec.sql.clone();
        let exec_params = params(exec);
        let fetch_sql = fetch.sql.clone();
        let fetch_params = params(fetch);
        let width = fetch.width;
        self.blocking(op, move |conn| {
            let tx = conn.transaction()?;
            let n = tx.execute(&exec_sql, duckdb::params_from_iter(exec_params.iter()))?;
            let rows = run_query(&tx, &fetch_sql, &fetch_params, width)?;
            tx.commit()?;
            Ok((
                ExecOutcome {
                    rows_affected: n as u64,
                    last_insert_id: None,
                },
                rows,
            ))
        })
        .await
    }

    async fn stream(&self, op: &'static str, query: &BoundQuery) -> Result<RowStream> {
        tracing::debug!(op, sql = %query.sql, "open cursor");
        let cursor_conn = self
            .blocking(op, |conn| conn.try_clone())
            .await?;
        let (mut stream, sink) = RowStream::channel();
        let sql = query.sql.clone();
        let params = params(query);
        let width = query.width;
        let task = tokio::task::spawn_blocking(move || {
            let result = (|| -> duckdb::Result<()> {
                let mut stmt = cursor_conn.prepare(&sql)?;
                let mut rows = stmt.query(duckdb::params_from_iter(params.iter()))?;
                while let Some(row) = rows.next()? {
                    let mut cells = Vec::with_capacity(width);
                    for i in 0..width {
                        cells.push(decode(row.get::<_, DuckValue>(i)?));
                    }
                    if !sink.blocking_send(Ok(cells)) {
                        break;
                    }
                }
                Ok(())
            })();
            if let Err(e) = result {
                sink.blocking_send(Err(TedError::query(op, e)));
            }
        });
        stream.attach(task);
        Ok(stream)
    }
}
