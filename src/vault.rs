//! Single-owner vault storage: items, tags, full-text search, settings.
//!
//! A [`Vault`] wraps one owner's SQLite pool. Item writes are
//! transactional: the row and its tag associations commit together or not
//! at all. The FTS index is maintained by triggers (see [`crate::migrate`])
//! so anything visible to a reader is also searchable.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::models::{Item, ItemType, SearchResult};

#[derive(Clone)]
pub struct Vault {
    pool: SqlitePool,
}

impl Vault {
    pub fn new(pool: SqlitePool) -> Self {
        Vault { pool }
    }

    /// The underlying pool, for callers that need raw queries (tests,
    /// maintenance tooling).
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Inserts an item and its tag associations in one transaction.
    ///
    /// Assigns a UUID when `item.id` is empty and stamps both timestamps
    /// to now. Tag names are lowercased and trimmed; empties are dropped.
    pub async fn create_item(&self, item: &mut Item) -> Result<()> {
        if item.id.is_empty() {
            item.id = Uuid::new_v4().to_string();
        }
        item.created_at = Utc::now();
        item.updated_at = item.created_at;

        let mut tx = self.pool.begin().await.context("begin tx")?;

        sqlx::query(
            r#"
            INSERT INTO items (id, type, url, title, content, summary, raw_content, image_path, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&item.id)
        .bind(item.item_type.as_str())
        .bind(&item.url)
        .bind(&item.title)
        .bind(&item.content)
        .bind(&item.summary)
        .bind(&item.raw_content)
        .bind(&item.image_path)
        .bind(item.created_at)
        .bind(item.updated_at)
        .execute(&mut *tx)
        .await
        .context("insert item")?;

        set_item_tags(&mut tx, &item.id, &item.tags)
            .await
            .context("set tags")?;

        tx.commit().await.context("commit item")?;
        Ok(())
    }

    /// Fetches one item with its tags. `Ok(None)` when the id is unknown.
    pub async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        let row = sqlx::query(
            r#"
            SELECT id, type, url, title, content, summary, image_path, created_at, updated_at
            FROM items WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("query item")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let mut item = item_from_row(&row)?;
        item.tags = self.item_tags(&item.id).await?;
        Ok(Some(item))
    }

    /// Most-recent-first page of items.
    pub async fn list_items(&self, limit: i64, offset: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT id, type, url, title, content, summary, image_path, created_at, updated_at
            FROM items ORDER BY created_at DESC LIMIT ? OFFSET ?
            "#,
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("query items")?;

        self.items_with_tags(rows).await
    }

    /// Most-recent-first page of items carrying `tag`.
    pub async fn list_items_by_tag(&self, tag: &str, limit: i64, offset: i64) -> Result<Vec<Item>> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT i.id, i.type, i.url, i.title, i.content, i.summary, i.image_path, i.created_at, i.updated_at
            FROM items i
            JOIN item_tags it ON i.id = it.item_id
            JOIN tags t ON it.tag_id = t.id
            WHERE t.name = ?
            ORDER BY i.created_at DESC LIMIT ? OFFSET ?
            "#,
        )
        .bind(tag)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("query items by tag")?;

        self.items_with_tags(rows).await
    }

    /// Full-text match over (title, content, summary), best BM25 score
    /// first. The snippet highlights the matched region of the content
    /// column with `<mark>` delimiters.
    ///
    /// `query` reaches FTS5 verbatim; callers accepting untrusted input
    /// own operator sanitization.
    pub async fn search(&self, query: &str, limit: i64) -> Result<Vec<SearchResult>> {
        let rows = sqlx::query(
            r#"
            SELECT i.id, i.type, i.url, i.title, i.content, i.summary, i.image_path, i.created_at, i.updated_at,
                   snippet(items_fts, 1, '<mark>', '</mark>', '...', 32) AS snippet,
                   bm25(items_fts) AS score
            FROM items_fts
            JOIN items i ON items_fts.rowid = i.rowid
            WHERE items_fts MATCH ?
            ORDER BY score
            LIMIT ?
            "#,
        )
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("search")?;

        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            let mut item = item_from_row(&row)?;
            item.tags = self.item_tags(&item.id).await?;
            results.push(SearchResult {
                item,
                snippet: row.get("snippet"),
                score: row.get("score"),
            });
        }
        Ok(results)
    }

    /// Deletes an item; tag associations and relationships follow via the
    /// foreign-key cascades. Deleting an unknown id is a no-op.
    pub async fn delete_item(&self, id: &str) -> Result<()> {
        sqlx::query("DELETE FROM items WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("delete item")?;
        Ok(())
    }

    /// Every tag name in the vault, lexicographically ascending.
    pub async fn all_tags(&self) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar("SELECT name FROM tags ORDER BY name")
            .fetch_all(&self.pool)
            .await
            .context("query tags")?;
        Ok(tags)
    }

    pub async fn item_count(&self) -> Result<i64> {
        let count = sqlx::query_scalar("SELECT COUNT(*) FROM items")
            .fetch_one(&self.pool)
            .await
            .context("count items")?;
        Ok(count)
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let value = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .context("query setting")?;
        Ok(value)
    }

    pub async fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .context("set setting")?;
        Ok(())
    }

    async fn items_with_tags(&self, rows: Vec<SqliteRow>) -> Result<Vec<Item>> {
        let mut items = Vec::with_capacity(rows.len());
        for row in rows {
            let mut item = item_from_row(&row)?;
            item.tags = self.item_tags(&item.id).await.unwrap_or_default();
            items.push(item);
        }
        Ok(items)
    }

    pub(crate) async fn item_tags(&self, item_id: &str) -> Result<Vec<String>> {
        let tags = sqlx::query_scalar(
            r#"
            SELECT t.name FROM tags t
            JOIN item_tags it ON t.id = it.tag_id
            WHERE it.item_id = ?
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(tags)
    }
}

async fn set_item_tags(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item_id: &str,
    tags: &[String],
) -> Result<()> {
    sqlx::query("DELETE FROM item_tags WHERE item_id = ?")
        .bind(item_id)
        .execute(&mut **tx)
        .await?;

    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            continue;
        }
        sqlx::query("INSERT OR IGNORE INTO tags (name) VALUES (?)")
            .bind(&tag)
            .execute(&mut **tx)
            .await?;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO item_tags (item_id, tag_id)
            SELECT ?, id FROM tags WHERE name = ?
            "#,
        )
        .bind(item_id)
        .bind(&tag)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn item_from_row(row: &SqliteRow) -> Result<Item> {
    let type_str: String = row.get("type");
    let item_type = ItemType::parse(&type_str)
        .with_context(|| format!("unknown item type in db: {type_str}"))?;

    let created_at: DateTime<Utc> = row.get("created_at");
    let updated_at: DateTime<Utc> = row.get("updated_at");

    Ok(Item {
        id: row.get("id"),
        item_type,
        url: row.get("url"),
        title: row.get("title"),
        content: row.get("content"),
        summary: row.get("summary"),
        raw_content: None,
        image_path: row.get("image_path"),
        tags: Vec::new(),
        created_at,
        updated_at,
    })
}
