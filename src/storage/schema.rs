//! Versioned schema for the client database.

use std::collections::BTreeSet;

use anyhow::{Context, Result};
use rusqlite::Connection;

struct Migration {
    version: &'static str,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: "001",
    name: "kv_entries",
    sql: include_str!("migrations/001_initial.sql"),
}];

/// Bring the database up to the latest schema. Safe to call on every open.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TEXT NOT NULL
        )",
    )
    .context("Failed to create schema_migrations table")?;

    let applied = applied_versions(conn)?;
    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(m.version))
        .collect();

    if pending.is_empty() {
        tracing::debug!(version = ?applied.last(), "Schema up to date");
        return Ok(());
    }
    for migration in pending {
        apply(conn, migration)?;
    }
    Ok(())
}

fn applied_versions(conn: &Connection) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare("SELECT version FROM schema_migrations")?;
    let versions = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;
    Ok(versions)
}

/// Run one migration and record it in the same transaction.
fn apply(conn: &Connection, migration: &Migration) -> Result<()> {
    tracing::info!(
        version = migration.version,
        name = migration.name,
        "Applying migration"
    );

    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(migration.sql)
        .and_then(|_| {
            tx.execute(
                "INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)",
                (
                    migration.version,
                    migration.name,
                    chrono::Utc::now().to_rfc3339(),
                ),
            )
        })
        .with_context(|| format!("Failed to apply migration {}", migration.version))?;
    tx.commit()?;
    Ok(())
}
