//! SQLite-backed project inventory.
//!
//! The database holds a single `projects` table. It is created on first open
//! and never migrated; rows are only ever appended.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::path::Path;

use crate::model::{ProjectRecord, Visibility};

/// Default database file name, relative to the working directory.
pub const DEFAULT_DB_FILE: &str = "projects.sqlite";

const CREATE_PROJECTS_TABLE: &str = "
CREATE TABLE IF NOT EXISTS projects (
    createdAt TEXT,
    name TEXT,
    owner_id TEXT,
    size INTEGER,
    url TEXT,
    visibility TEXT,
    path TEXT,
    submodule TEXT
);";

const INSERT_PROJECT: &str = "
INSERT INTO projects (createdAt, name, owner_id, size, url, visibility, path, submodule)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

const SELECT_PROJECTS: &str = "
SELECT createdAt, name, owner_id, size, url, visibility, path, submodule
FROM projects
ORDER BY rowid";

/// Outcome of [`ProjectStore::insert`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// A project with the same name already exists; nothing was written.
    AlreadyPresent,
}

/// Owner of the single database connection for a run.
///
/// Dropping the store releases the connection; [`ProjectStore::close`] does
/// the same but reports errors.
pub struct ProjectStore {
    conn: Connection,
}

impl ProjectStore {
    /// Open (or create) the database at `path`, enable WAL and ensure the schema.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("failed to create database directory {}", parent.display())
            })?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {}", path.display()))?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .context("failed to enable WAL journal mode")?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open an in-memory database with the schema applied.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Create the `projects` table if it does not exist yet.
    pub fn ensure_schema(&self) -> Result<()> {
        if !self.has_projects_table()? {
            self.conn
                .execute_batch(CREATE_PROJECTS_TABLE)
                .context("failed to create projects table")?;
        }
        Ok(())
    }

    fn has_projects_table(&self) -> Result<bool> {
        let found: Option<String> = self
            .conn
            .query_row(
                "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'projects'",
                [],
                |row| row.get(0),
            )
            .optional()
            .context("failed to inspect database schema")?;
        Ok(found.is_some())
    }

    /// Read every stored project in insertion order.
    pub fn read_all(&self) -> Result<Vec<ProjectRecord>> {
        let mut stmt = self
            .conn
            .prepare(SELECT_PROJECTS)
            .context("failed to prepare project query")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(RawProject {
                    created_at: row.get::<_, Option<String>>(0)?.unwrap_or_default(),
                    name: row.get::<_, Option<String>>(1)?.unwrap_or_default(),
                    owner_id: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    size: row.get::<_, Option<i64>>(3)?.unwrap_or_default(),
                    url: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
                    visibility: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
                    path: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
                    submodule: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
                })
            })
            .context("failed to query projects")?;

        let mut projects = Vec::new();
        for row in rows {
            let raw = row.context("failed to read project row")?;
            projects.push(raw.into_record());
        }
        Ok(projects)
    }

    /// Whether a project with exactly this name is stored.
    pub fn contains_name(&self, name: &str) -> Result<bool> {
        let found: Option<i64> = self
            .conn
            .query_row(
                "SELECT 1 FROM projects WHERE name = ?1 LIMIT 1",
                params![name],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("failed to look up project {name}"))?;
        Ok(found.is_some())
    }

    /// Append a project unless one with the same name is already stored.
    pub fn insert(&self, record: &ProjectRecord) -> Result<InsertOutcome> {
        if self.contains_name(&record.name)? {
            return Ok(InsertOutcome::AlreadyPresent);
        }
        let size = i64::try_from(record.size_kb)
            .with_context(|| format!("size of {} does not fit in the database", record.name))?;
        self.conn
            .execute(
                INSERT_PROJECT,
                params![
                    record.created_at,
                    record.name,
                    record.owner_id,
                    size,
                    record.url,
                    record.visibility.as_str(),
                    record.path,
                    record.submodule,
                ],
            )
            .with_context(|| format!("failed to insert project {}", record.name))?;
        Ok(InsertOutcome::Inserted)
    }

    /// Close the connection, surfacing any error SQLite reports.
    pub fn close(self) -> Result<()> {
        self.conn
            .close()
            .map_err(|(_, e)| e)
            .context("failed to close database")
    }
}

/// Row shape before validation of typed columns.
struct RawProject {
    created_at: String,
    name: String,
    owner_id: String,
    size: i64,
    url: String,
    visibility: String,
    path: String,
    submodule: String,
}

impl RawProject {
    /// Rows are never rejected; an unrecognized visibility reads as `Unknown`.
    fn into_record(self) -> ProjectRecord {
        let visibility = Visibility::parse(&self.visibility).unwrap_or(Visibility::Unknown);
        ProjectRecord {
            name: self.name,
            owner_id: self.owner_id,
            size_kb: u64::try_from(self.size).unwrap_or(0),
            url: self.url,
            visibility,
            created_at: self.created_at,
            path: self.path,
            submodule: self.submodule,
        }
    }
}
