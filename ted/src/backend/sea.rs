//! SQLite, PostgreSQL and MySQL through SeaORM's sqlx drivers.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use futures::StreamExt;
use rust_decimal::Decimal;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbBackend, QueryResult,
    Statement, StreamTrait, TransactionTrait,
};

use super::{Backend, ExecOutcome, RowStream};
use crate::dialect::{DbType, Dialect};
use crate::error::{Result, TedError};
use crate::query::BoundQuery;
use crate::value::Value;

pub struct SeaBackend {
    conn: DatabaseConnection,
    backend: DbBackend,
    dialect: Dialect,
}

impl SeaBackend {
    pub async fn connect(dsn: &str, db_type: DbType) -> Result<Self> {
        let mut opts = ConnectOptions::new(dsn.to_string());
        opts.sqlx_logging(false)
            .connect_timeout(Duration::from_secs(30));
        if db_type == DbType::Sqlite {
            // one connection: in-memory databases are per-connection
            opts.max_connections(1).min_connections(1);
        }
        let conn = Database::connect(opts)
            .await
            .map_err(|e| TedError::Connect(e.to_string()))?;
        Self::from_connection(conn).await
    }

    /// Wrap an already-open connection and probe its capabilities.
    pub async fn from_connection(conn: DatabaseConnection) -> Result<Self> {
        let backend = conn.get_database_backend();
        let dialect = probe_dialect(&conn, backend).await?;
        tracing::info!(
            db_type = %dialect.db_type,
            returning = dialect.supports_returning,
            row_values = dialect.supports_row_value_comparison,
            "connected"
        );
        Ok(Self {
            conn,
            backend,
            dialect,
        })
    }

    /// The underlying connection, for callers that run migrations.
    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }

    fn statement(&self, query: &BoundQuery) -> Statement {
        statement(self.backend, query)
    }

    fn outcome(&self, res: &sea_orm::ExecResult) -> ExecOutcome {
        // Postgres has no last-insert-id
        let last_insert_id = match self.backend {
            DbBackend::Postgres => None,
            _ => Some(res.last_insert_id()),
        };
        ExecOutcome {
            rows_affected: res.rows_affected(),
            last_insert_id,
        }
    }
}

async fn probe_dialect(conn: &DatabaseConnection, backend: DbBackend) -> Result<Dialect> {
    let probe = |sql: &str| Statement::from_string(backend, sql.to_string());
    match backend {
        DbBackend::Sqlite => {
            let row = conn
                .query_one(probe("SELECT sqlite_version()"))
                .await
                .map_err(|e| TedError::query("probe version", e))?;
            let version: String = row
                .map(|r| r.try_get_by_index(0))
                .transpose()
                .map_err(|e| TedError::query("probe version", e))?
                .unwrap_or_default();
            Ok(Dialect::sqlite(parse_sqlite_version(&version)))
        }
        DbBackend::Postgres => {
            let row = conn
                .query_one(probe(
                    "SELECT CAST(current_setting('server_version_num') AS integer)",
                ))
                .await
                .map_err(|e| TedError::query("probe version", e))?;
            let num: i32 = row
                .map(|r| r.try_get_by_index(0))
                .transpose()
                .map_err(|e| TedError::query("probe version", e))?
                .unwrap_or_default();
            Ok(Dialect::postgres(num.max(0) as u32))
        }
        DbBackend::MySql => Ok(Dialect::new(DbType::Mysql)),
    }
}

fn parse_sqlite_version(v: &str) -> (u32, u32) {
    let mut parts = v.split('.').map(|p| p.parse::<u32>().unwrap_or(0));
    (parts.next().unwrap_or(0), parts.next().unwrap_or(0))
}

fn statement(backend: DbBackend, query: &BoundQuery) -> Statement {
    Statement::from_sql_and_values(backend, query.sql.as_str(), query.params.iter().map(bind))
}

fn bind(value: &Value) -> sea_orm::Value {
    match value {
        Value::Null => sea_orm::Value::String(None),
        Value::Int(i) => sea_orm::Value::BigInt(Some(*i)),
        Value::Float(f) => sea_orm::Value::Double(Some(*f)),
        Value::Bool(b) => sea_orm::Value::Bool(Some(*b)),
        Value::Text(s) => s.clone().into(),
        Value::Bytes(b) => b.clone().into(),
        Value::Timestamp(ts) => (*ts).into(),
    }
}

/// Decode a result row into `width` scalars, trying driver types from most
/// to least specific.
fn decode_row(backend: DbBackend, row: &QueryResult, width: usize) -> Vec<Value> {
    (0..width).map(|i| decode_cell(backend, row, i)).collect()
}

fn decode_cell(backend: DbBackend, row: &QueryResult, i: usize) -> Value {
    macro_rules! attempt {
        ($ty:ty, $conv:expr) => {
            if let Ok(v) = row.try_get_by_index::<Option<$ty>>(i) {
                return v.map($conv).unwrap_or(Value::Null);
            }
        };
    }
    attempt!(i64, Value::Int);
    attempt!(i32, |v| Value::Int(v.into()));
    attempt!(i16, |v| Value::Int(v.into()));
    attempt!(i8, |v| Value::Int(v.into()));
    attempt!(u64, |v: u64| i64::try_from(v)
        .map(Value::Int)
        .unwrap_or_else(|_| Value::Text(v.to_string())));
    attempt!(f64, Value::Float);
    attempt!(f32, |v| Value::Float(v.into()));
    attempt!(Decimal, |v: Decimal| Value::Text(v.to_string()));
    attempt!(bool, Value::Bool);
    attempt!(NaiveDateTime, Value::Timestamp);
    attempt!(DateTime<Utc>, |v: DateTime<Utc>| Value::Text(v.to_rfc3339()));
    attempt!(NaiveDate, |v: NaiveDate| Value::Text(v.to_string()));
    attempt!(NaiveTime, |v: NaiveTime| Value::Text(v.to_string()));
    // SQLite would read any 16-byte blob as a uuid and any text as json
    if backend != DbBackend::Sqlite {
        attempt!(uuid::Uuid, |v: uuid::Uuid| Value::Text(v.to_string()));
        attempt!(serde_json::Value, |v: serde_json::Value| Value::Text(v.to_string()));
    }
    attempt!(String, Value::Text);
    attempt!(Vec<u8>, Value::Bytes);
    tracing::debug!(column = i, "undecodable cell");
    Value::Null
}

#[async_trait::async_trait]
impl Backend for SeaBackend {
    fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    async fn query(&self, op: &'static str, query: &BoundQuery) -> Result<Vec<Vec<Value>>> {
        tracing::debug!(op, sql = %query.sql, params = query.params.len(), "query");
        let rows = self
            .conn
            .query_all(self.statement(query))
            .await
            .map_err(|e| TedError::query(op, e))?;
        Ok(rows.iter().map(|r| decode_row(self.backend, r, query.width)).collect())
    }

    async fn execute(&self, op: &'static str, query: &BoundQuery) -> Result<ExecOutcome> {
        tracing::debug!(op, sql = %query.sql, params = query.params.len(), "execute");
        let res = self
            .conn
            .execute(self.statement(query))
            .await
            .map_err(|e| TedError::query(op, e))?;
        Ok(self.outcome(&res))
    }

    async fn execute_and_fetch(
        &self,
        op: &'static str,
        exec: &BoundQuery,
        fetch: &BoundQuery,
    ) -> Result<(ExecOutcome, Vec<Vec<Value>>)> {
        tracing::debug!(op, sql = %exec.sql, "execute in transaction");
        let txn = self.conn.begin().await.map_err(|e| TedError::query(op, e))?;
        let res = txn
            .execute(self.statement(exec))
            .await
            .map_err(|e| TedError::query(op, e))?;
        let outcome = self.outcome(&res);
        let rows = txn
            .query_all(self.statement(fetch))
            .await
            .map_err(|e| TedError::query(op, e))?;
        txn.commit().await.map_err(|e| TedError::query(op, e))?;
        Ok((outcome, rows.iter().map(|r| decode_row(self.backend, r, fetch.width)).collect()))
    }

    async fn stream(&self, op: &'static str, query: &BoundQuery) -> Result<RowStream> {
        tracing::debug!(op, sql = %query.sql, params = query.params.len(), "open cursor");
        let (mut stream, sink) = RowStream::channel();
        let conn = self.conn.clone();
        let stmt = self.statement(query);
        let width = query.width;
        let backend = self.backend;
        let task = tokio::spawn(async move {
            let rows = match conn.stream(stmt).await {
                Ok(rows) => rows,
                Err(e) => {
                    sink.send(Err(TedError::query(op, e))).await;
                    return;
                }
            };
            futures::pin_mut!(rows);
            while !sink.is_cancelled() {
                let item = match rows.next().await {
                    Some(Ok(row)) => Ok(decode_row(backend, &row, width)),
                    Some(Err(e)) => Err(TedError::query(op, e)),
                    None => break,
                };
                let failed = item.is_err();
                if !sink.send(item).await || failed {
                    break;
                }
            }
        });
        stream.attach(task);
        Ok(stream)
    }
}
