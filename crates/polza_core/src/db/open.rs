//! Connection opening for the storage database.
//!
//! Both entry points share one bootstrap path and emit a `db_open` event
//! with mode, status and duration. Failures to establish the connection
//! carry the location that was being opened.

use super::migrations::apply_migrations;
use log::{error, info};
use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const MEMORY_LOCATION: &str = ":memory:";

pub type DbResult<T> = Result<T, DbError>;

/// Storage database failure.
#[derive(Debug)]
pub enum DbError {
    /// The database at `location` could not be opened or configured.
    Open {
        location: String,
        source: rusqlite::Error,
    },
    /// Migration `version` failed; nothing of the pending batch was kept.
    Migration { version: u32, source: rusqlite::Error },
    /// The database was written by a build with a newer schema.
    SchemaTooNew { found: u32, supported: u32 },
    /// A statement failed on an open connection.
    Sqlite(rusqlite::Error),
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { location, source } => {
                write!(f, "cannot open storage `{location}`: {source}")
            }
            Self::Migration { version, source } => {
                write!(f, "storage migration {version} failed: {source}")
            }
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "storage schema version {found} is newer than supported {supported}"
            ),
            Self::Sqlite(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Open { source, .. } | Self::Migration { source, .. } => Some(source),
            Self::Sqlite(err) => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Opens (or creates) the storage file at `path` and migrates it.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with("file", path.display().to_string(), || Connection::open(path))
}

/// Opens a throwaway in-memory storage database and migrates it.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(
        "memory",
        MEMORY_LOCATION.to_string(),
        Connection::open_in_memory,
    )
}

fn open_with<F>(mode: &'static str, location: String, connect: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let result = connect()
        .and_then(|conn| conn.busy_timeout(BUSY_TIMEOUT).map(|()| conn))
        .map_err(|source| DbError::Open { location, source })
        .and_then(|mut conn| apply_migrations(&mut conn).map(|()| conn));

    match &result {
        Ok(_) => info!(
            "event=db_open module=db status=ok mode={mode} duration_ms={}",
            started_at.elapsed().as_millis()
        ),
        Err(err) => error!(
            "event=db_open module=db status=error mode={mode} duration_ms={} error={}",
            started_at.elapsed().as_millis(),
            err
        ),
    }
    result
}
