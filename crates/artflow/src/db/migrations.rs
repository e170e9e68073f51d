//! Schema migrations for the submissions database.
//!
//! Applied migrations are recorded in `_migrations`; `run_all` replays
//! whatever the stored version is missing. ALTER TABLE ADD COLUMN steps
//! first check the column so a half-recorded run stays re-runnable.

use rusqlite::Connection;

use super::error::DatabaseError;

struct Migration {
    version: u32,
    description: &'static str,
    sql: &'static str,
    kind: MigrationKind,
}

enum MigrationKind {
    Standard,
    /// ALTER TABLE ADD COLUMN; skipped when the column already exists.
    AddColumn {
        table: &'static str,
        column: &'static str,
    },
}

impl Migration {
    fn apply(&self, conn: &Connection) -> Result<(), DatabaseError> {
        let needed = match &self.kind {
            MigrationKind::Standard => true,
            MigrationKind::AddColumn { table, column } => !column_exists(conn, table, column)?,
        };

        if needed {
            conn.execute_batch(self.sql)
                .map_err(|e| DatabaseError::Migration {
                    version: self.version,
                    reason: e.to_string(),
                })?;
        }

        conn.execute(
            "INSERT INTO _migrations (version, description) VALUES (?1, ?2)",
            rusqlite::params![self.version, self.description],
        )?;
        Ok(())
    }
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "create_submissions_table",
        sql: "CREATE TABLE submissions (
                id TEXT PRIMARY KEY,
                client_name TEXT NOT NULL,
                title TEXT NOT NULL,
                request_type TEXT NOT NULL,
                requestor_email TEXT NOT NULL,
                payload TEXT NOT NULL,
                status TEXT NOT NULL,
                drive_result TEXT,
                task_result TEXT,
                error_step TEXT,
                error_message TEXT,
                retry_count INTEGER NOT NULL DEFAULT 0,
                error_at TEXT,
                created_at TEXT NOT NULL,
                last_modified TEXT NOT NULL
            );
            CREATE INDEX idx_submissions_status ON submissions(status);
            CREATE INDEX idx_submissions_created_at ON submissions(created_at);",
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 2,
        description: "index_requestor_email",
        sql: "CREATE INDEX idx_submissions_requestor_email
              ON submissions(requestor_email COLLATE NOCASE);",
        kind: MigrationKind::Standard,
    },
    Migration {
        version: 3,
        description: "add_completed_at",
        sql: "ALTER TABLE submissions ADD COLUMN completed_at TEXT;",
        kind: MigrationKind::AddColumn {
            table: "submissions",
            column: "completed_at",
        },
    },
];

/// Brings the schema up to the latest version.
pub fn run_all(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS _migrations (
            version INTEGER PRIMARY KEY,
            description TEXT NOT NULL,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    let applied: u32 = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM _migrations",
        [],
        |r| r.get(0),
    )?;

    for migration in MIGRATIONS.iter().filter(|m| m.version > applied) {
        log::info!(
            "Applying migration v{}: {}",
            migration.version,
            migration.description
        );
        migration.apply(conn)?;
    }

    Ok(())
}

fn column_exists(conn: &Connection, table: &str, column: &str) -> Result<bool, DatabaseError> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", table))?;
    let names = stmt.query_map([], |row| row.get::<_, String>("name"))?;
    for name in names {
        if name? == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_all_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();
        run_all(&conn).unwrap();

        let applied: u32 = conn
            .query_row("SELECT COUNT(*) FROM _migrations", [], |r| r.get(0))
            .unwrap();
        assert_eq!(applied as usize, MIGRATIONS.len());
    }

    #[test]
    fn test_submissions_table_exists_after_migrations() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        let count: u32 = conn
            .query_row("SELECT COUNT(*) FROM submissions", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_column_exists() {
        let conn = Connection::open_in_memory().unwrap();
        run_all(&conn).unwrap();

        assert!(column_exists(&conn, "submissions", "status").unwrap());
        assert!(column_exists(&conn, "submissions", "completed_at").unwrap());
        assert!(!column_exists(&conn, "submissions", "no_such_column").unwrap());
    }
}
