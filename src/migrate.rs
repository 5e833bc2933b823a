//! Per-vault schema migrations.
//!
//! Runs on every vault open and is safe to re-run: all statements either
//! use `IF NOT EXISTS` or check the current schema before acting.
//!
//! # Schema
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌───────────────┐
//! │    items     │──┐  │  item_tags   │  ┌──│     tags      │
//! │              │  │  │              │  │  │               │
//! │ id (PK,UUID) │  └──│ item_id      │  │  │ id (PK)       │
//! │ type         │     │ tag_id       │──┘  │ name (UNIQUE) │
//! │ url          │     └──────────────┘     └───────────────┘
//! │ title        │
//! │ content      │     ┌──────────────┐     ┌───────────────┐
//! │ summary      │     │relationships │     │   settings    │
//! │ raw_content  │──┐  │              │     │               │
//! │ image_path   │  ├──│ source_id    │     │ key (PK)      │
//! │ created_at   │  └──│ target_id    │     │ value         │
//! │ updated_at   │     │ relation_type│     └───────────────┘
//! └──────────────┘     │ strength     │
//!                      └──────────────┘
//! ```
//!
//! `items_fts` is an FTS5 external-content table over
//! `(title, content, summary)`, kept synchronized by insert/update/delete
//! triggers on `items`. Once an item commits, it is searchable.
//!
//! # Evolution
//!
//! Two upgrade paths exist for vaults created by older builds:
//!
//! - `image_path` is added with a bare `ALTER TABLE`; the duplicate-column
//!   error on current vaults is ignored.
//! - the `type` CHECK constraint originally allowed only `link`/`note`.
//!   SQLite cannot alter a CHECK constraint, so the migration probes with a
//!   throwaway `image` row and rebuilds the table via copy when the probe
//!   is rejected.

use anyhow::{Context, Result};
use sqlx::SqlitePool;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL CHECK(type IN ('link', 'note', 'image', 'search')),
    url TEXT,
    title TEXT NOT NULL,
    content TEXT,
    summary TEXT,
    raw_content TEXT,
    image_path TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT UNIQUE NOT NULL
);

CREATE TABLE IF NOT EXISTS item_tags (
    item_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    PRIMARY KEY (item_id, tag_id)
);

CREATE TABLE IF NOT EXISTS relationships (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    source_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    target_id TEXT NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    relation_type TEXT NOT NULL,
    strength REAL DEFAULT 1.0,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    UNIQUE(source_id, target_id, relation_type)
);

CREATE TABLE IF NOT EXISTS settings (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_type ON items(type);
CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at DESC);
CREATE INDEX IF NOT EXISTS idx_relationships_source ON relationships(source_id);
CREATE INDEX IF NOT EXISTS idx_relationships_target ON relationships(target_id);
"#;

const FTS_SCHEMA: &str = r#"
CREATE VIRTUAL TABLE items_fts USING fts5(
    title,
    content,
    summary,
    content='items',
    content_rowid='rowid'
);
"#;

const FTS_TRIGGERS: &str = r#"
CREATE TRIGGER IF NOT EXISTS items_ai AFTER INSERT ON items BEGIN
    INSERT INTO items_fts(rowid, title, content, summary)
    VALUES (NEW.rowid, NEW.title, NEW.content, NEW.summary);
END;

CREATE TRIGGER IF NOT EXISTS items_ad AFTER DELETE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, title, content, summary)
    VALUES ('delete', OLD.rowid, OLD.title, OLD.content, OLD.summary);
END;

CREATE TRIGGER IF NOT EXISTS items_au AFTER UPDATE ON items BEGIN
    INSERT INTO items_fts(items_fts, rowid, title, content, summary)
    VALUES ('delete', OLD.rowid, OLD.title, OLD.content, OLD.summary);
    INSERT INTO items_fts(rowid, title, content, summary)
    VALUES (NEW.rowid, NEW.title, NEW.content, NEW.summary);
END;
"#;

// Rebuild used when an old vault's CHECK constraint rejects the newer item
// types. Foreign keys are suspended for the duration of the table swap.
const REBUILD_TYPE_CONSTRAINT: &str = r#"
PRAGMA foreign_keys=OFF;

CREATE TABLE IF NOT EXISTS items_new (
    id TEXT PRIMARY KEY,
    type TEXT NOT NULL CHECK(type IN ('link', 'note', 'image', 'search')),
    url TEXT,
    title TEXT NOT NULL,
    content TEXT,
    summary TEXT,
    raw_content TEXT,
    image_path TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
);

INSERT OR IGNORE INTO items_new (id, type, url, title, content, summary, raw_content, created_at, updated_at)
SELECT id, type, url, title, content, summary, raw_content, created_at, updated_at FROM items;

DROP TABLE items;

ALTER TABLE items_new RENAME TO items;

CREATE INDEX IF NOT EXISTS idx_items_type ON items(type);
CREATE INDEX IF NOT EXISTS idx_items_created ON items(created_at DESC);

PRAGMA foreign_keys=ON;
"#;

/// Run all migrations against one vault's pool.
///
/// # Errors
///
/// Returns an error if any required statement fails; the caller must not
/// cache a vault whose migration failed.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::raw_sql(SCHEMA)
        .execute(pool)
        .await
        .context("apply base schema")?;

    // FTS5 virtual tables have no IF NOT EXISTS; check first.
    let fts_exists: bool = sqlx::query_scalar(
        "SELECT COUNT(*) > 0 FROM sqlite_master WHERE type='table' AND name='items_fts'",
    )
    .fetch_one(pool)
    .await?;

    if !fts_exists {
        sqlx::query(FTS_SCHEMA)
            .execute(pool)
            .await
            .context("create fts table")?;
    }

    sqlx::raw_sql(FTS_TRIGGERS)
        .execute(pool)
        .await
        .context("create fts triggers")?;

    // Older vaults predate the image_path column; the duplicate-column
    // error on current ones is expected.
    let _ = sqlx::query("ALTER TABLE items ADD COLUMN image_path TEXT")
        .execute(pool)
        .await;

    widen_type_constraint(pool).await?;

    Ok(())
}

/// Probe-and-rebuild for vaults whose `type` CHECK predates the `image`
/// and `search` variants.
async fn widen_type_constraint(pool: &SqlitePool) -> Result<()> {
    let probe = sqlx::query("INSERT INTO items (id, type, title) VALUES ('__probe__', 'image', 'probe')")
        .execute(pool)
        .await;

    match probe {
        Ok(_) => {
            sqlx::query("DELETE FROM items WHERE id = '__probe__'")
                .execute(pool)
                .await?;
        }
        Err(_) => {
            sqlx::raw_sql(REBUILD_TYPE_CONSTRAINT)
                .execute(pool)
                .await
                .context("widen item type constraint")?;

            // Dropping the old table took its triggers with it, and the
            // rebuilt rows have fresh rowids the FTS index knows nothing
            // about.
            sqlx::raw_sql(FTS_TRIGGERS)
                .execute(pool)
                .await
                .context("recreate fts triggers")?;
            sqlx::query("INSERT INTO items_fts(items_fts) VALUES('rebuild')")
                .execute(pool)
                .await
                .context("reindex fts")?;
        }
    }

    Ok(())
}
