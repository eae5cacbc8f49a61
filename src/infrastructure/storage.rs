use crate::infrastructure::error::InfraError;
use rusqlite::Connection;
use std::path::Path;

const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");
const SCHEMA_VERSION: i64 = 1;

/// Creates the cache tables and stamps `user_version`. A database written by
/// a newer build is refused rather than silently reused.
pub fn initialize_database(path: &Path) -> Result<(), InfraError> {
    let connection = Connection::open(path)?;
    let version: i64 = connection.query_row("PRAGMA user_version", [], |row| row.get(0))?;
    if version > SCHEMA_VERSION {
        return Err(InfraError::InvalidConfig(format!(
            "database {} has schema version {version}, newer than supported {SCHEMA_VERSION}",
            path.display()
        )));
    }

    connection.execute_batch(SCHEMA_SQL)?;
    connection.pragma_update(None, "user_version", SCHEMA_VERSION)?;
    Ok(())
}
