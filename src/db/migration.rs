//! Versioned migration runner.
//!
//! Migrations are SQL files named `NNN_<slug>.sql` under `sql/migrations/`,
//! embedded at compile time. The runner records every applied version in
//! `schema_migrations`, honours `-- requires-table: <name>` directives and
//! tolerates `duplicate column` errors so re-applied `ADD COLUMN`
//! statements succeed.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, OptionalExtension};
use tracing::{debug, info};

/// A migration file as embedded in the binary.
#[derive(Debug, Clone, Copy)]
pub struct MigrationFile {
    pub file_name: &'static str,
    pub body: &'static str,
}

impl MigrationFile {
    pub const fn new(file_name: &'static str, body: &'static str) -> Self {
        Self { file_name, body }
    }
}

/// Every migration shipped with the binary, in any order.
pub const MIGRATION_FILES: &[MigrationFile] = &[
    MigrationFile::new(
        "001_initial_schema.sql",
        include_str!("../../sql/migrations/001_initial_schema.sql"),
    ),
    MigrationFile::new(
        "002_note_tackles_team.sql",
        include_str!("../../sql/migrations/002_note_tackles_team.sql"),
    ),
    MigrationFile::new(
        "003_alter_note_videos.sql",
        include_str!("../../sql/migrations/003_alter_note_videos.sql"),
    ),
];

/// Individual migration with its parsed version.
#[derive(Debug, Clone)]
pub struct Migration {
    pub version: u32,
    pub name: String,
    pub body: String,
}

impl Migration {
    /// Parses a migration from its file name.
    ///
    /// Returns `None` when the name does not follow `NNN_<slug>.sql`.
    pub fn from_file(file: &MigrationFile) -> Option<Self> {
        let stem = file.file_name.strip_suffix(".sql")?;
        let (prefix, slug) = stem.split_once('_')?;
        if prefix.is_empty() || slug.is_empty() || !prefix.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let version = prefix.parse().ok()?;
        Some(Self {
            version,
            name: slug.to_string(),
            body: file.body.to_string(),
        })
    }

    /// Checks if this migration has been recorded in `schema_migrations`.
    pub fn is_applied(&self, conn: &Connection) -> Result<bool> {
        let exists: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM schema_migrations WHERE version = ?1)",
            [self.version],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    /// Applies this migration inside one transaction and records it.
    ///
    /// Returns `false` when a required table is missing; in that case the
    /// body is not executed but the version is still recorded.
    pub fn apply(&self, conn: &mut Connection) -> Result<bool> {
        let tx = conn.transaction()?;

        let mut missing = Vec::new();
        for table in required_tables(&self.body) {
            if !table_exists(&tx, table)? {
                missing.push(table.to_string());
            }
        }

        let executed = missing.is_empty();
        if executed {
            for statement in split_statements(&self.body) {
                match tx.execute_batch(statement) {
                    Ok(()) => {}
                    Err(err) if is_duplicate_column(&err) => {
                        debug!(version = self.version, "ignoring duplicate column: {err}");
                    }
                    Err(err) => {
                        return Err(err).with_context(|| {
                            format!("migration {:03}_{} failed", self.version, self.name)
                        });
                    }
                }
            }
        } else {
            info!(
                version = self.version,
                missing = ?missing,
                "skipping migration body, required tables absent"
            );
        }

        tx.execute(
            "INSERT INTO schema_migrations (version) VALUES (?1)",
            [self.version],
        )?;
        tx.commit()?;
        Ok(executed)
    }
}

/// Outcome of a migration run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// Versions whose body was executed.
    pub applied: Vec<u32>,
    /// Versions recorded without executing the body.
    pub skipped: Vec<u32>,
}

/// Applies all pending embedded migrations.
pub fn apply_pending_migrations(conn: &mut Connection) -> Result<MigrationReport> {
    apply_migrations(conn, MIGRATION_FILES)
}

/// Applies pending migrations from an explicit file set.
///
/// Files are parsed and sorted by version; a malformed name or a repeated
/// version is an error. Running twice is a no-op the second time.
pub fn apply_migrations(conn: &mut Connection, files: &[MigrationFile]) -> Result<MigrationReport> {
    ensure_migration_table_exists(conn)?;

    let mut migrations = Vec::with_capacity(files.len());
    for file in files {
        let Some(migration) = Migration::from_file(file) else {
            bail!("invalid migration file name: {}", file.file_name);
        };
        migrations.push(migration);
    }
    migrations.sort_by_key(|m| m.version);
    if let Some(pair) = migrations.windows(2).find(|w| w[0].version == w[1].version) {
        bail!("duplicate migration version {}", pair[0].version);
    }

    let mut report = MigrationReport::default();
    for migration in &migrations {
        if migration.is_applied(conn)? {
            continue;
        }
        if migration.apply(conn)? {
            info!(version = migration.version, name = %migration.name, "applied migration");
            report.applied.push(migration.version);
        } else {
            report.skipped.push(migration.version);
        }
    }

    Ok(report)
}

/// Returns the tables listed in `-- requires-table: <name>` lines.
pub fn required_tables(body: &str) -> Vec<&str> {
    body.lines()
        .filter_map(|line| line.trim().strip_prefix("--"))
        .filter_map(|rest| rest.trim_start().strip_prefix("requires-table:"))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Splits a migration body on `;`, dropping empty and comment-only fragments.
pub fn split_statements(body: &str) -> Vec<&str> {
    body.split(';')
        .filter(|fragment| {
            fragment.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            })
        })
        .collect()
}

/// Checks the catalog for a table with the given name.
pub fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let found: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
            [name],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Creates the schema_migrations table if it doesn't exist.
fn ensure_migration_table_exists(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_migrations (version INTEGER PRIMARY KEY);")?;
    Ok(())
}

fn is_duplicate_column(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(msg)) => msg.contains("duplicate column"),
        other => other.to_string().contains("duplicate column"),
    }
}
