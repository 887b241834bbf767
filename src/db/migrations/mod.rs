//! Database schema migrations.
//!
//! Migration files are stored in this directory with the naming convention:
//! - `migration_NN_up.sql` - Upgrades schema from version `NN-1` to version `NN`
//! - `migration_NN_down.sql` - Downgrades schema from version `NN` to version `NN-1`
//!
//! A migration may also list columns that it adds to the `transactions` table. Those are added one
//! at a time and only when absent, because stores created by older releases (before
//! `schema_version` existed) can already have some of them.

use anyhow::{bail, Context};
use sqlx::{Executor, Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::Re;

/// The schema version this build of the program expects.
pub(crate) const CURRENT_VERSION: i32 = 2;

/// A column that a migration adds to the `transactions` table.
struct AddColumn {
    name: &'static str,
    definition: &'static str,
}

/// A database migration with up and down SQL.
struct Migration {
    /// The version this migration brings the database to (when going up).
    version: i32,
    /// SQL to execute when upgrading to this version.
    up_sql: &'static str,
    /// Columns to add, if missing, when upgrading to this version.
    up_columns: &'static [AddColumn],
    /// SQL to execute when downgrading from this version.
    down_sql: &'static str,
}

/// All available migrations in order.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        up_sql: include_str!("migration_01_up.sql"),
        up_columns: &[],
        down_sql: include_str!("migration_01_down.sql"),
    },
    Migration {
        version: 2,
        up_sql: "",
        up_columns: &[
            AddColumn {
                name: "currency",
                definition: "TEXT DEFAULT 'USD'",
            },
            AddColumn {
                name: "account",
                definition: "TEXT DEFAULT ''",
            },
            AddColumn {
                name: "memo",
                definition: "TEXT DEFAULT ''",
            },
        ],
        down_sql: include_str!("migration_02_down.sql"),
    },
];

/// Creates the `schema_version` table if it does not exist and returns the recorded version. A
/// store without version tracking is treated as version 0.
pub(crate) async fn bootstrap(pool: &SqlitePool) -> Re<i32> {
    sqlx::query("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .execute(pool)
        .await
        .context("Failed to create schema_version table")?;

    let row: (Option<i32>,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await
        .context("Failed to query schema version")?;

    match row.0 {
        Some(version) => Ok(version),
        None => {
            sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
                .execute(pool)
                .await
                .context("Failed to insert initial schema version")?;
            Ok(0)
        }
    }
}

/// Runs migrations to bring the database from `current_version` to `target_version`.
///
/// - If `current_version < target_version`, runs "up" migrations sequentially.
/// - If `current_version > target_version`, runs "down" migrations sequentially.
/// - Each migration is executed within a transaction that includes the schema_version update.
///
/// Validates all required migrations exist before running any of them.
pub(crate) async fn run(pool: &SqlitePool, current_ver: i32, target_ver: i32) -> Re<()> {
    if current_ver == target_ver {
        debug!("Database already at target version {target_ver}, no migrations needed");
        return Ok(());
    }

    validate_migrations(current_ver, target_ver)?;

    if current_ver < target_ver {
        for version in (current_ver + 1)..=target_ver {
            let migration = find(version)?;
            debug!("Running migration {version:02} (up)");
            run_single_migration(pool, migration.up_sql, migration.up_columns, version).await?;
        }
    } else {
        for version in (target_ver + 1..=current_ver).rev() {
            let migration = find(version)?;
            debug!("Running migration {version:02} (down)");
            run_single_migration(pool, migration.down_sql, &[], version - 1).await?;
        }
    }

    debug!("Migration complete, schema now at version {target_ver}");
    Ok(())
}

fn find(version: i32) -> Re<&'static Migration> {
    MIGRATIONS
        .iter()
        .find(|m| m.version == version)
        .with_context(|| format!("Migration {version} not found"))
}

/// Executes a single migration's SQL and column additions and updates schema_version, all within
/// a transaction.
async fn run_single_migration(
    pool: &SqlitePool,
    sql: &str,
    columns: &[AddColumn],
    new_version: i32,
) -> Re<()> {
    let mut tx = pool
        .begin()
        .await
        .context("Failed to begin migration transaction")?;

    if !sql.trim().is_empty() {
        tx.execute(sql)
            .await
            .context("Failed to execute migration SQL")?;
    }

    for column in columns {
        add_column_if_missing(&mut tx, column).await?;
    }

    sqlx::query("DELETE FROM schema_version")
        .execute(&mut *tx)
        .await
        .context("Failed to clear schema_version")?;

    sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
        .bind(new_version)
        .execute(&mut *tx)
        .await
        .context("Failed to update schema_version")?;

    tx.commit()
        .await
        .context("Failed to commit migration transaction")?;

    Ok(())
}

async fn add_column_if_missing(tx: &mut Transaction<'_, Sqlite>, column: &AddColumn) -> Re<()> {
    let existing: Vec<String> =
        sqlx::query_scalar("SELECT name FROM pragma_table_info('transactions')")
            .fetch_all(&mut **tx)
            .await
            .context("Failed to inspect the transactions table")?;

    if existing.iter().any(|name| name == column.name) {
        debug!("Column '{}' already present", column.name);
        return Ok(());
    }

    debug!("Adding column '{}' to transactions", column.name);
    let sql = format!(
        "ALTER TABLE transactions ADD COLUMN {} {}",
        column.name, column.definition
    );
    sqlx::query(&sql)
        .execute(&mut **tx)
        .await
        .with_context(|| format!("Failed to add column '{}'", column.name))?;
    Ok(())
}

/// Validates that migrations are available for all versions needed to go from
/// `current_version` to `target_version`.
fn validate_migrations(current_version: i32, target_version: i32) -> Re<()> {
    let (start, end) = if current_version < target_version {
        (current_version + 1, target_version)
    } else {
        (target_version + 1, current_version)
    };

    for version in start..=end {
        if !MIGRATIONS.iter().any(|m| m.version == version) {
            bail!(
                "Migration {version} is missing but required to migrate from version {current_version} to {target_version}"
            );
        }
    }

    Ok(())
}
