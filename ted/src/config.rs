//! `.ted.yml` loading and DSN resolution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::dialect::DbType;
use crate::error::{Result, TedError};
use crate::session::{DEFAULT_IDLE, DEFAULT_REFRESH};
use crate::value::TypeClass;

pub const FILE_NAME: &str = ".ted.yml";

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub databases: BTreeMap<String, DatabaseConfig>,
    /// Default column width per type class (`integer`, `text`, ...).
    pub widths: BTreeMap<String, u16>,
    pub null: Option<String>,
    pub refresh_ms: Option<u64>,
    pub idle_ms: Option<u64>,
}

/// A named connection.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    #[serde(rename = "type")]
    pub kind: String,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub dbname: String,
}

/// Connection settings from the command line; each overrides the named entry.
#[derive(Debug, Clone, Default)]
pub struct ConnectArgs {
    pub db_type: Option<DbType>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
}

impl Config {
    /// `$PWD/.ted.yml`, else `$HOME/.ted.yml`, else defaults.
    pub fn load() -> Result<Self> {
        let candidates = [
            std::env::current_dir().ok(),
            std::env::var_os("HOME").map(PathBuf::from),
        ];
        for dir in candidates.into_iter().flatten() {
            let path = dir.join(FILE_NAME);
            if path.is_file() {
                return Self::from_file(&path);
            }
        }
        Ok(Self::default())
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config = Self::parse(&text).map_err(|e| TedError::Config(format!("{}: {e}", path.display())))?;
        tracing::info!(path = %path.display(), databases = config.databases.len(), "config loaded");
        Ok(config)
    }

    pub fn parse(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn null_glyph(&self) -> &str {
        self.null.as_deref().unwrap_or("NULL")
    }

    pub fn refresh(&self) -> Duration {
        self.refresh_ms.map_or(DEFAULT_REFRESH, Duration::from_millis)
    }

    pub fn idle(&self) -> Duration {
        self.idle_ms.map_or(DEFAULT_IDLE, Duration::from_millis)
    }

    /// Display width of a column of `declared_type`.
    pub fn width_for(&self, declared_type: &str) -> u16 {
        let class = TypeClass::of(declared_type);
        let (name, default) = match class {
            TypeClass::Integer => ("integer", 8),
            TypeClass::Float => ("float", 12),
            TypeClass::Decimal => ("decimal", 12),
            TypeClass::Bool => ("bool", 5),
            TypeClass::Bytes => ("bytes", 16),
            TypeClass::Timestamp => ("timestamp", 19),
            TypeClass::Text => ("text", 24),
        };
        self.widths.get(name).copied().unwrap_or(default)
    }

    /// Resolve the `<database>` argument: a named entry, an explicit DSN,
    /// or a file path for the selected (default SQLite) backend.
    pub fn resolve(&self, database: &str, args: &ConnectArgs) -> Result<String> {
        if let Some(entry) = self.databases.get(database) {
            let db_type = match args.db_type {
                Some(t) => t,
                None => DbType::parse(&entry.kind)
                    .ok_or_else(|| TedError::Config(format!("database {database}: unknown type {:?}", entry.kind)))?,
            };
            let merged = ConnectArgs {
                db_type: Some(db_type),
                host: args.host.clone().or_else(|| entry.host.clone()),
                port: args.port.or(entry.port),
                user: args.user.clone().or_else(|| entry.user.clone()),
                password: args.password.clone(),
            };
            return Ok(build_dsn(db_type, &entry.dbname, &merged));
        }
        if database.contains("://") || database.starts_with("sqlite:") {
            return Ok(database.to_string());
        }
        let db_type = args.db_type.unwrap_or(DbType::Sqlite);
        Ok(build_dsn(db_type, database, args))
    }
}

/// Build a connection URL. The password falls back to `TED_PASSWORD`.
pub fn build_dsn(db_type: DbType, dbname: &str, args: &ConnectArgs) -> String {
    match db_type {
        DbType::Sqlite => format!("sqlite://{dbname}?mode=rwc"),
        DbType::Duckdb => format!("duckdb://{dbname}"),
        DbType::Postgres | DbType::Mysql => {
            let password = args
                .password
                .clone()
                .or_else(|| std::env::var("TED_PASSWORD").ok());
            let user = args.user.as_deref().map(encode);
            let password = password.as_deref().map(encode);
            let host = args.host.as_deref().unwrap_or("localhost");
            let port = args.port.unwrap_or(if db_type == DbType::Postgres { 5432 } else { 3306 });
            format!(
                "{db_type}://{}{host}:{port}/{dbname}",
                userinfo(user.as_deref(), password.as_deref())
            )
        }
    }
}

/// `user:password@` ahead of the host; a password without a user is dropped.
fn userinfo(user: Option<&str>, password: Option<&str>) -> String {
    match (user, password) {
        (Some(u), Some(p)) => format!("{u}:{p}@"),
        (Some(u), None) => format!("{u}@"),
        (None, _) => String::new(),
    }
}

/// A DSN fit for logs: the password masked and query parameters dropped.
pub fn redact_dsn(dsn: &str) -> String {
    let base = dsn.split_once('?').map_or(dsn, |(base, _)| base);
    let Some((scheme, rest)) = base.split_once("://") else {
        return base.to_string();
    };
    match rest.rsplit_once('@') {
        Some((credentials, location)) => {
            let user = credentials.split_once(':').map_or(credentials, |(u, _)| u);
            let masked = credentials.contains(':').then_some("****");
            format!("{scheme}://{}{location}", userinfo(Some(user), masked))
        }
        None => base.to_string(),
    }
}

/// Percent-encode the characters that would break URL userinfo.
fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || b"-._~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}
