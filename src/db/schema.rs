use anyhow::{Context, Result};
use rusqlite::Connection;

struct Migration {
    version: &'static str,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001",
        name: "initial",
        sql: include_str!("migrations/001_initial.sql"),
    },
    Migration {
        version: "002",
        name: "one_active_mission_per_cat",
        sql: include_str!("migrations/002_one_active_mission_per_cat.sql"),
    },
];

pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .context("Failed to create schema_migrations table")?;

    let applied = get_applied_migrations(conn)?;

    for migration in MIGRATIONS {
        if !applied.iter().any(|v| v == migration.version) {
            apply_migration(conn, migration)?;
        }
    }

    Ok(())
}

fn get_applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations ORDER BY version")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(versions)
}

fn apply_migration(conn: &Connection, migration: &Migration) -> Result<()> {
    tracing::info!(
        "Applying migration {}: {}",
        migration.version,
        migration.name
    );

    let now = chrono::Utc::now().to_rfc3339();
    conn.execute_batch(&format!(
        "BEGIN TRANSACTION;
         {}
         INSERT INTO schema_migrations (version, name, applied_at) VALUES ('{}', '{}', '{}');
         COMMIT;",
        migration.sql, migration.version, migration.name, now
    ))
    .with_context(|| {
        format!(
            "Failed to apply migration {}: {}",
            migration.version, migration.name
        )
    })?;

    tracing::info!("Migration {} applied successfully", migration.version);
    Ok(())
}
