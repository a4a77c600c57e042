//! Serialized job queue in front of the row engine.
//!
//! User commands and timer ticks are posted to one `mpsc` queue and handled
//! one at a time by the session task, which owns the engine. After each job
//! the session publishes a [`Snapshot`] on a `watch` channel for the UI.
//!
//! Jobs carry the epoch they were created in; opening a relation starts a new
//! epoch, so ticks aimed at a previous relation are dropped on arrival.

use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::backend::Backend;
use crate::engine::{PendingRow, RowEngine, Selection, Target};
use crate::error::Result;
use crate::query::SortColumn;
use crate::value::{Value, coerce};
use crate::window::Row;

pub const DEFAULT_IDLE: Duration = Duration::from_millis(300);
pub const DEFAULT_REFRESH: Duration = Duration::from_millis(500);

const QUEUE_DEPTH: usize = 64;

// ---------- jobs ----------

/// A user request.
#[derive(Debug, Clone)]
pub enum Command {
    Open(Target),
    /// Move the selection by rows; negative is up.
    MoveRows(isize),
    MoveCols(isize),
    PageDown,
    PageUp,
    Top,
    Bottom,
    Resize(usize),
    Select { row: usize, col: usize },
    Sort(Option<SortColumn>),
    /// Set the selected cell from user text.
    Update(String),
    Insert(PendingRow),
    Delete,
    /// Find the next row whose focused column equals the text, or the
    /// selected cell's value when `None`.
    Find(Option<String>),
    TogglePreview,
    /// Columns currently on screen. A foreign key is previewed only while
    /// all of its local columns are among them.
    ShowColumns(Range<usize>),
}

#[derive(Debug)]
pub enum Job {
    Command(Command),
    CursorIdle { epoch: u64, cursor_id: u64 },
    Refresh { epoch: u64 },
}

// ---------- timers ----------

/// Cursor inactivity timer and refresh ticker of one opened relation.
///
/// Both run as tasks that only post jobs; at most one of them is armed at a
/// time. Dropping the timers stops both.
pub struct Timers {
    jobs: mpsc::Sender<Job>,
    epoch: u64,
    idle: Duration,
    refresh: Duration,
    idle_task: Option<JoinHandle<()>>,
    refresh_task: Option<JoinHandle<()>>,
}

impl Timers {
    pub fn new(jobs: mpsc::Sender<Job>, epoch: u64, idle: Duration, refresh: Duration) -> Self {
        Self {
            jobs,
            epoch,
            idle,
            refresh,
            idle_task: None,
            refresh_task: None,
        }
    }

    pub fn cursor_opened(&mut self, cursor_id: u64) {
        if let Some(t) = self.refresh_task.take() {
            t.abort();
        }
        self.arm_idle(cursor_id);
    }

    /// Push the inactivity deadline back.
    pub fn cursor_used(&mut self, cursor_id: u64) {
        self.arm_idle(cursor_id);
    }

    pub fn cursor_closed(&mut self) {
        if let Some(t) = self.idle_task.take() {
            t.abort();
        }
        if self.refresh_task.is_none() && !self.refresh.is_zero() {
            self.refresh_task = Some(self.spawn_ticker());
        }
    }

    fn arm_idle(&mut self, cursor_id: u64) {
        if let Some(t) = self.idle_task.take() {
            t.abort();
        }
        let jobs = self.jobs.clone();
        let epoch = self.epoch;
        let idle = self.idle;
        self.idle_task = Some(tokio::spawn(async move {
            tokio::time::sleep(idle).await;
            let _ = jobs.send(Job::CursorIdle { epoch, cursor_id }).await;
        }));
    }

    fn spawn_ticker(&self) -> JoinHandle<()> {
        let jobs = self.jobs.clone();
        let epoch = self.epoch;
        let period = self.refresh;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                // a full queue is busy anyway; drop the tick
                if let Err(mpsc::error::TrySendError::Closed(_)) = jobs.try_send(Job::Refresh { epoch }) {
                    break;
                }
            }
        })
    }
}

impl Drop for Timers {
    fn drop(&mut self) {
        for task in [self.idle_task.take(), self.refresh_task.take()].into_iter().flatten() {
            task.abort();
        }
    }
}

// ---------- snapshot ----------

#[derive(Debug, Clone, PartialEq)]
pub struct Header {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
    pub editable: bool,
    pub key: bool,
}

/// What the UI draws.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub epoch: u64,
    pub title: String,
    pub headers: Vec<Header>,
    pub rows: Vec<Row>,
    pub selection: Selection,
    /// Rows cannot be inserted or deleted (views and ad-hoc queries).
    pub read_only: bool,
    pub sort: Option<SortColumn>,
    pub status: Option<String>,
    pub error: bool,
    pub preview: Option<String>,
    pub null_glyph: String,
}

// ---------- session ----------

#[derive(Debug, Clone)]
pub struct SessionOptions {
    pub capacity: usize,
    pub null_glyph: String,
    pub idle: Duration,
    pub refresh: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            capacity: 20,
            null_glyph: "NULL".to_string(),
            idle: DEFAULT_IDLE,
            refresh: DEFAULT_REFRESH,
        }
    }
}

/// Sending side of a running session.
#[derive(Clone)]
pub struct SessionHandle {
    jobs: mpsc::Sender<Job>,
    shutdown: CancellationToken,
}

impl SessionHandle {
    /// Queue a command. Returns `false` once the session has stopped.
    pub async fn send(&self, command: Command) -> bool {
        self.jobs.send(Job::Command(command)).await.is_ok()
    }

    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }
}

struct Session {
    backend: Arc<dyn Backend>,
    options: SessionOptions,
    engine: Option<RowEngine>,
    epoch: u64,
    jobs: mpsc::Sender<Job>,
    status: Option<String>,
    error: bool,
    show_preview: bool,
    preview: Option<String>,
    /// `None` until the UI reports its columns; everything counts as shown.
    visible: Option<Range<usize>>,
}

/// Start a session task over `backend`. Nothing is opened until a
/// [`Command::Open`] arrives.
pub fn spawn(
    backend: Arc<dyn Backend>,
    options: SessionOptions,
) -> (SessionHandle, watch::Receiver<Snapshot>, JoinHandle<()>) {
    let (jobs, rx) = mpsc::channel(QUEUE_DEPTH);
    let (updates, snapshots) = watch::channel(Snapshot {
        null_glyph: options.null_glyph.clone(),
        ..Default::default()
    });
    let shutdown = CancellationToken::new();
    let session = Session {
        backend,
        options,
        engine: None,
        epoch: 0,
        jobs: jobs.clone(),
        status: None,
        error: false,
        show_preview: false,
        preview: None,
        visible: None,
    };
    let task = tokio::spawn(session.run(rx, updates, shutdown.clone()));
    (SessionHandle { jobs, shutdown }, snapshots, task)
}

impl Session {
    async fn run(mut self, mut rx: mpsc::Receiver<Job>, updates: watch::Sender<Snapshot>, shutdown: CancellationToken) {
        loop {
            let job = tokio::select! {
                _ = shutdown.cancelled() => break,
                job = rx.recv() => match job {
                    Some(job) => job,
                    None => break,
                },
            };
            if self.handle(job).await {
                updates.send_replace(self.snapshot());
            }
        }
        if let Some(engine) = &mut self.engine {
            engine.close_cursor().await;
        }
        tracing::debug!("session stopped");
    }

    /// Returns whether anything visible may have changed.
    async fn handle(&mut self, job: Job) -> bool {
        match job {
            // layout only; keeps the status line
            Job::Command(Command::ShowColumns(columns)) => {
                self.visible = Some(columns);
                self.update_preview().await;
                true
            }
            Job::Command(command) => {
                self.status = None;
                self.error = false;
                if let Err(e) = self.command(command).await {
                    tracing::warn!(error = %e, "command failed");
                    self.fail(e.to_string());
                }
                self.update_preview().await;
                true
            }
            Job::CursorIdle { epoch, cursor_id } => {
                if epoch == self.epoch
                    && let Some(engine) = &mut self.engine
                {
                    engine.on_cursor_idle(cursor_id).await;
                }
                false
            }
            Job::Refresh { epoch } => {
                if epoch != self.epoch {
                    return false;
                }
                let Some(engine) = &mut self.engine else {
                    return false;
                };
                if let Err(e) = engine.refresh().await {
                    tracing::warn!(error = %e, "refresh failed");
                    self.fail(e.to_string());
                }
                true
            }
        }
    }

    fn fail(&mut self, message: String) {
        self.status = Some(message);
        self.error = true;
    }

    async fn command(&mut self, command: Command) -> Result<()> {
        let command = match command {
            Command::Open(target) => return self.open(target).await,
            Command::Resize(capacity) => {
                self.options.capacity = capacity;
                match &mut self.engine {
                    Some(engine) => return engine.resize(capacity).await,
                    None => return Ok(()),
                }
            }
            other => other,
        };
        let Some(engine) = &mut self.engine else {
            return Ok(());
        };
        match command {
            Command::Open(_) | Command::Resize(_) | Command::ShowColumns(_) => {}
            Command::MoveRows(n) if n >= 0 => engine.move_down(n.unsigned_abs()).await?,
            Command::MoveRows(n) => engine.move_up(n.unsigned_abs()).await?,
            Command::MoveCols(delta) => engine.move_col(delta),
            Command::PageDown => engine.page_down().await?,
            Command::PageUp => engine.page_up().await?,
            Command::Top => engine.top().await?,
            Command::Bottom => engine.bottom().await?,
            Command::Select { row, col } => engine.select(row, col),
            Command::Sort(sort) => engine.set_sort(sort).await?,
            Command::Update(text) => {
                let col = engine.selection().col;
                engine.update_cell(col, &text).await?;
            }
            Command::Insert(pending) => {
                engine.insert_row(&pending).await?;
                self.status = Some("row inserted".to_string());
            }
            Command::Delete => {
                engine.delete_row().await?;
                self.status = Some("row deleted".to_string());
            }
            Command::Find(text) => {
                let col = engine.selection().col;
                let needle = match text {
                    Some(t) => coerce(&t, &engine.relation().columns[col].type_name, engine.null_glyph()),
                    None => match engine.selected_row() {
                        Some(r) => r.data[col].clone(),
                        None => Value::Null,
                    },
                };
                self.status = match engine.find_and_select(col, &needle).await? {
                    None => Some(format!("no match for {}", needle.format(engine.null_glyph()))),
                    Some(found) if found.wrapped => Some("search wrapped".to_string()),
                    Some(_) => None,
                };
            }
            Command::TogglePreview => self.show_preview = !self.show_preview,
        }
        Ok(())
    }

    async fn open(&mut self, target: Target) -> Result<()> {
        if let Some(mut old) = self.engine.take() {
            old.close_cursor().await;
        }
        self.epoch += 1;
        self.preview = None;
        self.visible = None;
        let mut engine = RowEngine::open(
            self.backend.clone(),
            &target,
            self.options.capacity,
            &self.options.null_glyph,
        )
        .await?;
        engine.set_timers(Timers::new(
            self.jobs.clone(),
            self.epoch,
            self.options.idle,
            self.options.refresh,
        ));
        tracing::info!(epoch = self.epoch, relation = %engine.relation().name, "session opened relation");
        self.engine = Some(engine);
        Ok(())
    }

    /// Preview and enum metadata failures never fail the command.
    async fn update_preview(&mut self) {
        self.preview = None;
        if !self.show_preview {
            return;
        }
        let Some(engine) = &mut self.engine else {
            return;
        };
        let col = engine.selection().col;
        let visible: Vec<usize> = match &self.visible {
            Some(columns) => columns.clone().collect(),
            None => (0..engine.relation().columns.len()).collect(),
        };
        match engine.preview(col, &visible).await {
            Ok(p) => self.preview = p,
            Err(e) => tracing::warn!(error = %e, column = col, "foreign key preview failed"),
        }
    }

    fn snapshot(&self) -> Snapshot {
        let Some(engine) = &self.engine else {
            return Snapshot {
                epoch: self.epoch,
                status: self.status.clone(),
                error: self.error,
                null_glyph: self.options.null_glyph.clone(),
                ..Default::default()
            };
        };
        let relation = engine.relation();
        Snapshot {
            epoch: self.epoch,
            title: relation.name.clone(),
            headers: relation
                .columns
                .iter()
                .enumerate()
                .map(|(i, c)| Header {
                    name: c.name.clone(),
                    type_name: c.type_name.clone(),
                    nullable: c.nullable,
                    editable: relation.is_editable(i),
                    key: relation.key.contains(&i),
                })
                .collect(),
            rows: engine.window().iter().cloned().collect(),
            selection: engine.selection(),
            read_only: relation.is_view,
            sort: engine.sort(),
            status: self.status.clone(),
            error: self.error,
            preview: self.preview.clone(),
            null_glyph: self.options.null_glyph.clone(),
        }
    }
}
