//! ted - terminal spreadsheet editor for SQL tables and views
//!
//! The library holds the relational engine (introspection, view lineage,
//! query building, the windowed row engine and mutations), the session queue
//! that serializes work against it, configuration and the terminal front end.

pub mod backend;
pub mod config;
pub mod dialect;
pub mod engine;
pub mod error;
pub mod query;
pub mod schema;
pub mod session;
pub mod tui;
pub mod value;
pub mod view;
pub mod window;
