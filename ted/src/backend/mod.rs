//! Driver surface shared by every SQL backend.
//!
//! The engine never talks to a driver directly: it renders a [`BoundQuery`]
//! through the query builder and hands it to a [`Backend`].

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::dialect::{DbType, Dialect};
use crate::error::{Result, TedError};
use crate::query::BoundQuery;
use crate::value::Value;

#[cfg(feature = "duckdb")]
pub mod duck;
pub mod sea;

/// Result of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_id: Option<u64>,
}

#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    fn dialect(&self) -> &Dialect;

    /// Run a query and collect every row.
    async fn query(&self, op: &'static str, query: &BoundQuery) -> Result<Vec<Vec<Value>>>;

    /// Run a statement that returns no rows.
    async fn execute(&self, op: &'static str, query: &BoundQuery) -> Result<ExecOutcome>;

    /// Run `exec` then `fetch` inside a single transaction.
    async fn execute_and_fetch(
        &self,
        op: &'static str,
        exec: &BoundQuery,
        fetch: &BoundQuery,
    ) -> Result<(ExecOutcome, Vec<Vec<Value>>)>;

    /// Open a streaming cursor over `query`.
    async fn stream(&self, op: &'static str, query: &BoundQuery) -> Result<RowStream>;

    /// Convenience for single-row lookups.
    async fn query_row(&self, op: &'static str, query: &BoundQuery) -> Result<Option<Vec<Value>>> {
        Ok(self.query(op, query).await?.into_iter().next())
    }
}

/// Number of rows a producer may read ahead of the consumer.
const STREAM_READ_AHEAD: usize = 4;

/// An open streaming SELECT.
///
/// Rows are produced by a background task that owns the driver stream and
/// pushes decoded rows through a bounded channel. Dropping or closing the
/// stream stops the task and releases its connection.
pub struct RowStream {
    rx: mpsc::Receiver<Result<Vec<Value>>>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

/// Producer half handed to a backend's streaming task.
pub struct RowSink {
    tx: mpsc::Sender<Result<Vec<Value>>>,
    cancel: CancellationToken,
}

impl RowSink {
    /// Push one row; returns `false` once the consumer has gone away.
    pub async fn send(&self, row: Result<Vec<Value>>) -> bool {
        tokio::select! {
            res = self.tx.send(row) => res.is_ok(),
            _ = self.cancel.cancelled() => false,
        }
    }

    /// Blocking variant for producers running on a blocking thread.
    pub fn blocking_send(&self, row: Result<Vec<Value>>) -> bool {
        !self.cancel.is_cancelled() && self.tx.blocking_send(row).is_ok()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl RowStream {
    /// Create a channel pair; the caller spawns the producer with the sink
    /// and registers it with [`RowStream::attach`].
    pub fn channel() -> (RowStream, RowSink) {
        let (tx, rx) = mpsc::channel(STREAM_READ_AHEAD);
        let cancel = CancellationToken::new();
        (
            RowStream {
                rx,
                cancel: cancel.clone(),
                task: None,
            },
            RowSink { tx, cancel },
        )
    }

    pub fn attach(&mut self, task: JoinHandle<()>) {
        self.task = Some(task);
    }

    /// Next row, or `None` once the result set is exhausted.
    pub async fn next(&mut self) -> Option<Result<Vec<Value>>> {
        self.rx.recv().await
    }

    /// Stop the producer and wait until it has released its connection.
    /// Safe to call more than once.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        while self.rx.try_recv().is_ok() {}
        if let Some(task) = self.task.take()
            && let Err(e) = task.await
        {
            tracing::warn!(error = %e, "cursor task ended abnormally");
        }
    }
}

impl Drop for RowStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Open a backend for `dsn`. The scheme selects the driver.
pub async fn connect(dsn: &str) -> Result<Arc<dyn Backend>> {
    let db_type = db_type_of(dsn)
        .ok_or_else(|| TedError::UnsupportedBackend(format!("unrecognised DSN: {dsn}")))?;
    match db_type {
        DbType::Sqlite | DbType::Postgres | DbType::Mysql => {
            Ok(Arc::new(sea::SeaBackend::connect(dsn, db_type).await?))
        }
        #[cfg(feature = "duckdb")]
        DbType::Duckdb => Ok(Arc::new(duck::DuckBackend::open(dsn).await?)),
        #[cfg(not(feature = "duckdb"))]
        DbType::Duckdb => Err(TedError::UnsupportedBackend(
            "duckdb support was not compiled in (enable the `duckdb` feature)".to_string(),
        )),
    }
}

pub fn db_type_of(dsn: &str) -> Option<DbType> {
    let scheme = dsn.split(':').next()?;
    DbType::parse(scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scheme_selects_backend() {
        assert_eq!(db_type_of("sqlite://data.db?mode=rw"), Some(DbType::Sqlite));
        assert_eq!(db_type_of("sqlite::memory:"), Some(DbType::Sqlite));
        assert_eq!(db_type_of("postgres://u@h/db"), Some(DbType::Postgres));
        assert_eq!(db_type_of("postgresql://u@h/db"), Some(DbType::Postgres));
        assert_eq!(db_type_of("mysql://u@h/db"), Some(DbType::Mysql));
        assert_eq!(db_type_of("duckdb://file.duckdb"), Some(DbType::Duckdb));
        assert_eq!(db_type_of("oracle://x"), None);
    }

    #[tokio::test]
    async fn closing_a_stream_twice_is_harmless() {
        let (mut stream, sink) = RowStream::channel();
        let task = tokio::spawn(async move {
            let mut i = 0;
            while sink.send(Ok(vec![Value::Int(i)])).await {
                i += 1;
            }
        });
        stream.attach(task);
        assert_eq!(stream.next().await.unwrap().unwrap(), vec![Value::Int(0)]);
        stream.close().await;
        stream.close().await;
        assert!(stream.next().await.is_none());
    }
}
