// ⚙️ Configuration - command-line flags with environment fallbacks

use crate::db;
use anyhow::Result;
use clap::{Args, Parser};
use rusqlite::Connection;
use std::path::PathBuf;

/// Settings shared by the CLI and the server
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    /// SQLite database file (created if missing)
    #[arg(long = "database", env = "EXPENSE_DB_PATH", default_value = "expenses.db", global = true)]
    pub database: PathBuf,

    /// tracing filter directive, e.g. "info" or "expense_tracker=debug"
    #[arg(long = "log-filter", env = "RUST_LOG", default_value = "info", global = true)]
    pub log_filter: String,
}

impl CommonArgs {
    pub fn open_database(&self) -> Result<Connection> {
        db::open_database(&self.database)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "expense-server", version, about = "Expense tracker web server")]
pub struct ServerConfig {
    #[command(flatten)]
    pub common: CommonArgs,

    /// Address to listen on
    #[arg(long, env = "EXPENSE_BIND", default_value = "0.0.0.0:3000")]
    pub bind: String,

    /// Directory served under /static and holding the HTML pages
    #[arg(long = "static-dir", env = "EXPENSE_STATIC_DIR", default_value = "web")]
    pub static_dir: PathBuf,

    /// Lifetime of a login session
    #[arg(
        long = "session-ttl-hours",
        env = "EXPENSE_SESSION_TTL_HOURS",
        default_value_t = 24,
        value_parser = clap::value_parser!(i64).range(1..=24 * 365)
    )]
    pub session_ttl_hours: i64,
}

impl ServerConfig {
    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.session_ttl_hours)
    }
}
