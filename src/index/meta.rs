//! Bookkeeping rows in `schema_meta`.
//!
//! The index is a cache: there is no upgrade path between schema versions.
//! A database written by a different schema version is refused on open and
//! has to be deleted and rebuilt from the store.

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension};

use super::{IndexError, IndexResult};

/// Layout of the tables created by [`super::schema::init_schema`].
pub const SCHEMA_VERSION: u32 = 1;

/// Identifier of the tokenizer that produced the stored semantic vectors.
/// Vectors from a different tokenizer are stale until the next rebuild.
pub const TOKENIZER_VERSION: &str = "lore-words-v1";

fn value(conn: &Connection, key: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT value FROM schema_meta WHERE key = ?1", [key], |row| row.get(0))
        .optional()
}

/// Stamp a freshly created database. An existing stamp is kept.
pub(crate) fn stamp_schema_version(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR IGNORE INTO schema_meta (key, value) VALUES ('schema_version', ?1)",
        [SCHEMA_VERSION.to_string()],
    )?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT value FROM schema_meta WHERE key = 'schema_version'",
        [],
        |row| {
            let raw: String = row.get(0)?;
            raw.parse::<u32>()
                .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))
        },
    )
}

/// Fail with [`IndexError::SchemaMismatch`] unless the database was written
/// with [`SCHEMA_VERSION`].
pub fn ensure_schema_version(conn: &Connection) -> IndexResult<()> {
    let found = schema_version(conn)?;
    if found != SCHEMA_VERSION {
        return Err(IndexError::SchemaMismatch {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// `None` until semantic vectors have been written.
pub fn tokenizer_version(conn: &Connection) -> rusqlite::Result<Option<String>> {
    value(conn, "tokenizer_version")
}

pub fn set_tokenizer_version(conn: &Connection, version: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO schema_meta (key, value) VALUES ('tokenizer_version', ?1)",
        [version],
    )?;
    Ok(())
}
