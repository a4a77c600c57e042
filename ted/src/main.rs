use std::fs::OpenOptions;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use demo::{Migrator, MigratorTrait};
use ted::backend::{self, Backend, sea::SeaBackend};
use ted::config::{Config, ConnectArgs, redact_dsn};
use ted::dialect::DbType;
use ted::engine::Target;
use ted::session::{self, SessionOptions};

#[derive(Parser)]
#[command(
    name = "ted",
    version,
    about = "Terminal spreadsheet editor for a single SQL table or view",
    disable_help_flag = true
)]
struct Cli {
    /// Database: a name from .ted.yml, a DSN, or a SQLite file
    database: Option<String>,

    /// Table or view to open, or a SELECT statement
    table: Option<String>,

    #[arg(short = 'd', long = "database", value_name = "NAME")]
    database_flag: Option<String>,

    #[arg(short = 'h', long)]
    host: Option<String>,

    #[arg(short = 'p', long)]
    port: Option<u16>,

    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Falls back to TED_PASSWORD
    #[arg(long)]
    password: Option<String>,

    #[arg(long, visible_alias = "pg", conflicts_with_all = ["mysql", "duckdb"])]
    postgres: bool,

    #[arg(long, visible_alias = "my", conflicts_with = "duckdb")]
    mysql: bool,

    #[arg(long)]
    duckdb: bool,

    /// Open an in-memory SQLite database seeded with sample relations
    #[arg(long)]
    demo: bool,

    #[arg(long, action = ArgAction::Help)]
    help: Option<bool>,
}

impl Cli {
    fn db_type(&self) -> Option<DbType> {
        if self.postgres {
            Some(DbType::Postgres)
        } else if self.mysql {
            Some(DbType::Mysql)
        } else if self.duckdb {
            Some(DbType::Duckdb)
        } else {
            None
        }
    }

    /// `<database> <table>` positionally, or `-d <database> <table>`.
    fn target(&self) -> Result<(Option<String>, String), String> {
        let (database, table) = match (&self.database_flag, &self.database, &self.table) {
            (Some(d), Some(t), None) => (Some(d.clone()), t.clone()),
            (None, Some(d), Some(t)) => (Some(d.clone()), t.clone()),
            (None, Some(t), None) if self.demo => (None, t.clone()),
            (None, None, None) if self.demo => (None, "users".to_string()),
            _ => return Err("usage: ted [flags] <database> <table>".to_string()),
        };
        Ok((database, table))
    }
}

/// Logs go to the file named by `TED_LOG`; the terminal belongs to the UI.
fn init_tracing() -> Result<(), Box<dyn std::error::Error>> {
    let Ok(path) = std::env::var("TED_LOG") else {
        return Ok(());
    };
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ted: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();
    let config = Config::load()?;
    let (database, table) = cli.target()?;

    let backend: Arc<dyn Backend> = match database {
        None => {
            tracing::info!("seeding demo database");
            let demo = SeaBackend::connect("sqlite::memory:", DbType::Sqlite).await?;
            Migrator::up(demo.connection(), None).await?;
            Arc::new(demo)
        }
        Some(database) => {
            let args = ConnectArgs {
                db_type: cli.db_type(),
                host: cli.host.clone(),
                port: cli.port,
                user: cli.username.clone(),
                password: cli.password.clone(),
            };
            let dsn = config.resolve(&database, &args)?;
            tracing::info!(database = %redact_dsn(&dsn), "connecting to database");
            backend::connect(&dsn).await?
        }
    };

    let options = SessionOptions {
        null_glyph: config.null_glyph().to_string(),
        idle: config.idle(),
        refresh: config.refresh(),
        ..Default::default()
    };
    let (handle, snapshots, task) = session::spawn(backend, options);
    ted::tui::run(handle, snapshots, config, Target::parse(&table)).await?;
    task.await?;
    Ok(())
}
