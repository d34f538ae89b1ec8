use anyhow::{bail, Context, Result};
use log::info;
use rusqlite::Connection;

/// One schema step. `version` is what `PRAGMA user_version` reads after it ran.
struct Migration {
    version: i32,
    name: &'static str,
    sql: &'static str,
}

/// v1: the `plugin_data` key/value table holding the JSON settings, stats and
/// timer session blob.
const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "schema_v1.sql",
    sql: include_str!("schemas/schema_v1.sql"),
}];

fn latest_version() -> i32 {
    MIGRATIONS.last().map_or(0, |m| m.version)
}

fn user_version(conn: &Connection) -> Result<i32> {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .context("failed to read user_version pragma")
}

/// Brings the plugin database up to the latest schema in one transaction.
pub fn run_migrations(conn: &mut Connection) -> Result<()> {
    let current = user_version(conn)?;
    let latest = latest_version();

    if current > latest {
        bail!("plugin database is at schema {current}, this build only knows up to {latest}");
    }

    let pending: Vec<&Migration> = MIGRATIONS.iter().filter(|m| m.version > current).collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn
        .transaction()
        .context("failed to open migration transaction")?;
    for migration in pending {
        tx.execute_batch(migration.sql)
            .with_context(|| format!("failed to apply {}", migration.name))?;
        tx.pragma_update(None, "user_version", migration.version)
            .context("failed to update user_version pragma")?;
        info!("Plugin database migrated to {}", migration.name);
    }
    tx.commit().context("failed to commit migrations")?;

    Ok(())
}
