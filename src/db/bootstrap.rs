//! Startup schema bootstrap and auto-seed engine.
//!
//! There is no migration-version ledger; the live catalog is the only source
//! of truth. Base bootstrap is gated on the existence of the `matches` table,
//! additive column upgrades are gated on per-column introspection, and
//! seeding is gated on the `users` table being empty. Every step is safe to
//! repeat across process starts.

use log::info;
use rusqlite::Connection;

use crate::db::forward::extract_forward;
use crate::db::probe::{table_columns, table_exists};
use crate::db::source::MigrationSource;
use crate::error::MatchbookError;

/// Fixed, total-ordered bootstrap sequence. Never discovered by directory
/// scan; files are applied in exactly this order.
const MIGRATION_FILES: [&str; 3] = [
    "001_base_schema.sql",
    "002_add_deck_theme.sql",
    "003_add_match_mode.sql",
];

/// Existence of this table marks an already-bootstrapped store.
const MARKER_TABLE: &str = "matches";

/// Rows in this table disable auto-seeding.
const USER_TABLE: &str = "users";

const THEME_COLUMN_DEF: &str = "TEXT NOT NULL DEFAULT 'Midrange'";

const MODE_COLUMN_DEF: &str =
    "TEXT NOT NULL DEFAULT 'Ranked' CHECK (mode IN ('Ranked', 'Rating', 'Event'))";

const MODE_INDEX_SQL: &str = "CREATE INDEX IF NOT EXISTS idx_matches_mode ON matches (mode)";

/// Toggle values that disable auto-seeding, matched case-insensitively.
/// Anything else, including unset/empty, means enabled.
const SEED_DISABLED_VALUES: [&str; 4] = ["0", "false", "no", "off"];

/// Runs the full bootstrap sequence: base schema, additive column upgrades,
/// then seeding when the base bootstrap just ran and the guard allows it.
///
/// Returns whether the base schema was created in this run. Any error is
/// fatal to startup; the caller logs it and exits before binding the
/// listener.
pub fn run(
    conn: &mut Connection,
    source: &MigrationSource,
    auto_seed: &str,
) -> Result<bool, MatchbookError> {
    let base_applied = apply_base(conn, source)?;

    // Runs on both fresh and pre-existing stores. This is the only upgrade
    // path for databases created before these columns existed.
    ensure_column(conn, "deck_templates", "theme", THEME_COLUMN_DEF, &[])?;
    ensure_column(conn, MARKER_TABLE, "mode", MODE_COLUMN_DEF, &[MODE_INDEX_SQL])?;

    if base_applied && should_seed(auto_seed, conn)? {
        apply_seed(conn, source)?;
    }

    Ok(base_applied)
}

/// Applies the ordered migration list inside one transaction when the store
/// has no base schema yet. Returns `false` without touching the store when
/// the marker table already exists.
pub fn apply_base(
    conn: &mut Connection,
    source: &MigrationSource,
) -> Result<bool, MatchbookError> {
    if table_exists(conn, MARKER_TABLE)? {
        return Ok(false);
    }

    info!("Store has no base schema yet; applying base migrations");

    let tx = conn.transaction()?;
    for filename in MIGRATION_FILES {
        let contents = source.read_migration(filename)?;
        let forward = extract_forward(&contents);
        if forward.trim().is_empty() {
            continue;
        }
        tx.execute_batch(&forward)
            .map_err(|e| MatchbookError::Error(format!("apply migration {}: {}", filename, e)))?;
    }
    tx.commit()?;

    info!("Base schema is ready");
    Ok(true)
}

/// Adds `column` to `table` when introspection shows it missing, then creates
/// any supporting indexes. Runs directly against the live connection, outside
/// the base-bootstrap transaction.
pub fn ensure_column(
    conn: &Connection,
    table: &str,
    column: &str,
    definition: &str,
    indexes: &[&str],
) -> Result<(), MatchbookError> {
    if table_columns(conn, table)?.contains(column) {
        return Ok(());
    }

    // Identifiers and definitions are compiled-in constants, never user input.
    conn.execute_batch(&format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table, column, definition
    ))
    .map_err(|e| MatchbookError::Error(format!("add column {}.{}: {}", table, column, e)))?;

    for index_sql in indexes {
        conn.execute_batch(index_sql).map_err(|e| {
            MatchbookError::Error(format!("create index for {}.{}: {}", table, column, e))
        })?;
    }

    info!("Applied runtime migration: {}.{}", table, column);
    Ok(())
}

/// Seeding is a data guard, not a run-count guard: it is allowed only when
/// the toggle is not disabled and the user table holds zero rows, no matter
/// which process run asks.
pub fn should_seed(auto_seed: &str, conn: &Connection) -> Result<bool, MatchbookError> {
    let value = auto_seed.trim().to_ascii_lowercase();
    if SEED_DISABLED_VALUES.contains(&value.as_str()) {
        return Ok(false);
    }

    let user_count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {}", USER_TABLE),
        [],
        |row| row.get(0),
    )?;
    Ok(user_count == 0)
}

/// Executes the seed script as one batch. Seed files are plain SQL and are
/// not re-checked for directive markers.
pub fn apply_seed(conn: &Connection, source: &MigrationSource) -> Result<(), MatchbookError> {
    let seed_sql = source.read_seed()?;
    conn.execute_batch(&seed_sql)
        .map_err(|e| MatchbookError::Error(format!("apply seed: {}", e)))?;

    info!("Seed data inserted");
    Ok(())
}
