//! SQLite persistence for the interaction log.

pub mod interactions;
mod schema;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::AppError;

pub use interactions::{Interaction, InteractionLog, NewInteraction};

pub type DbPool = Pool<SqliteConnectionManager>;

/// Open a pool for `sqlite://path`, a bare path, or `sqlite::memory:`, and
/// bring the schema up to date.
pub fn connect(database_url: &str, max_size: u32) -> Result<DbPool, AppError> {
    let location = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .unwrap_or(database_url);

    // Every in-memory connection is a separate database.
    let pool = match location {
        ":memory:" => Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .build(SqliteConnectionManager::memory())?,
        path => Pool::builder()
            .max_size(max_size.max(1))
            .build(SqliteConnectionManager::file(path))?,
    };
    let conn = pool.get()?;
    schema::init(&conn)?;

    tracing::info!(version = schema::SCHEMA_VERSION, location, "database ready");
    Ok(pool)
}

#[cfg(test)]
pub fn connect_memory() -> DbPool {
    connect("sqlite::memory:", 1).unwrap()
}
