//! Vault store integration tests: CRUD, tags, FTS synchronization,
//! relationships, graph deduplication, settings, and schema migrations.

use std::time::Duration;

use tempfile::TempDir;

use stash::manager::VaultManager;
use stash::models::{Item, ItemType, Relationship};
use stash::vault::Vault;

fn new_manager() -> (TempDir, VaultManager) {
    let tmp = TempDir::new().unwrap();
    let manager = VaultManager::new(tmp.path().join("data")).unwrap();
    (tmp, manager)
}

fn note(title: &str, tags: &[&str]) -> Item {
    let mut item = Item::new(ItemType::Note);
    item.title = title.to_string();
    item.tags = tags.iter().map(|t| t.to_string()).collect();
    item
}

async fn create(vault: &Vault, mut item: Item) -> Item {
    vault.create_item(&mut item).await.unwrap();
    item
}

// Distinct created_at values keep recency ordering deterministic.
async fn tick() {
    tokio::time::sleep(Duration::from_millis(10)).await;
}

#[tokio::test]
async fn create_and_get_round_trip() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let mut item = Item::new(ItemType::Link);
    item.url = Some("https://example.com/post".to_string());
    item.title = "Post".to_string();
    item.content = Some("Hello".to_string());
    item.summary = Some("A greeting.".to_string());
    item.tags = vec![" Greeting ".to_string(), "example".to_string(), "  ".to_string()];

    vault.create_item(&mut item).await.unwrap();
    assert!(!item.id.is_empty(), "create assigns an id");

    let stored = vault.get_item(&item.id).await.unwrap().unwrap();
    assert_eq!(stored.item_type, ItemType::Link);
    assert_eq!(stored.url.as_deref(), Some("https://example.com/post"));
    assert_eq!(stored.title, "Post");
    assert_eq!(stored.content.as_deref(), Some("Hello"));
    assert_eq!(stored.summary.as_deref(), Some("A greeting."));
    assert_eq!(stored.tags, vec!["greeting", "example"]);

    manager.close().await;
}

#[tokio::test]
async fn get_missing_returns_none_and_delete_missing_is_noop() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    assert!(vault.get_item("nope").await.unwrap().is_none());
    vault.delete_item("nope").await.unwrap();

    manager.close().await;
}

#[tokio::test]
async fn listing_is_most_recent_first() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let a = create(&vault, note("First", &["go"])).await;
    tick().await;
    let b = create(&vault, note("Second", &["go", "dev"])).await;
    tick().await;
    let c = create(&vault, note("Third", &["dev"])).await;

    let items = vault.list_items(10, 0).await.unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![c.id.as_str(), b.id.as_str(), a.id.as_str()]);

    let page = vault.list_items(1, 1).await.unwrap();
    assert_eq!(page[0].id, b.id);

    let tagged = vault.list_items_by_tag("go", 10, 0).await.unwrap();
    let ids: Vec<&str> = tagged.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![b.id.as_str(), a.id.as_str()]);

    manager.close().await;
}

#[tokio::test]
async fn search_ranks_and_highlights_matches() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let mut go_item = note("Concurrency in Go", &[]);
    go_item.content = Some("Channels make concurrency manageable in Go programs.".to_string());
    let go_item = create(&vault, go_item).await;

    let mut recipes = note("Recipes", &[]);
    recipes.content = Some("A collection of soup recipes.".to_string());
    create(&vault, recipes).await;

    let results = vault.search("concurrency", 20).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].item.id, go_item.id);
    assert!(results[0].snippet.contains("<mark>concurrency</mark>"));

    manager.close().await;
}

#[tokio::test]
async fn fts_row_follows_update_and_delete() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let mut item = note("Draft", &[]);
    item.content = Some("about rust ownership".to_string());
    let item = create(&vault, item).await;

    assert_eq!(vault.search("ownership", 20).await.unwrap().len(), 1);

    // Any UPDATE goes through the sync triggers, not just store methods.
    sqlx::query("UPDATE items SET content = ? WHERE id = ?")
        .bind("about python decorators")
        .bind(&item.id)
        .execute(vault.pool())
        .await
        .unwrap();

    assert_eq!(vault.search("ownership", 20).await.unwrap().len(), 0);
    assert_eq!(vault.search("decorators", 20).await.unwrap().len(), 1);

    vault.delete_item(&item.id).await.unwrap();
    assert_eq!(vault.search("decorators", 20).await.unwrap().len(), 0);

    manager.close().await;
}

#[tokio::test]
async fn delete_cascades_tags_and_relationships() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let a = create(&vault, note("Alpha", &["go"])).await;
    let b = create(&vault, note("Beta", &["go"])).await;

    vault
        .create_relationship(&Relationship {
            id: 0,
            source_id: a.id.clone(),
            target_id: b.id.clone(),
            relation_type: "link".to_string(),
            strength: 1.0,
        })
        .await
        .unwrap();

    assert_eq!(vault.relationships(&a.id).await.unwrap().len(), 1);

    vault.delete_item(&a.id).await.unwrap();

    assert_eq!(vault.relationships(&b.id).await.unwrap().len(), 0);

    let orphaned: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM item_tags WHERE item_id = ?")
        .bind(&a.id)
        .fetch_one(vault.pool())
        .await
        .unwrap();
    assert_eq!(orphaned, 0);

    manager.close().await;
}

#[tokio::test]
async fn relationship_writes_reject_unknown_endpoints() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let a = create(&vault, note("Alpha", &[])).await;

    let result = vault
        .create_relationship(&Relationship {
            id: 0,
            source_id: a.id.clone(),
            target_id: "ghost".to_string(),
            relation_type: "link".to_string(),
            strength: 1.0,
        })
        .await;
    assert!(result.is_err(), "foreign keys must be enforced");

    manager.close().await;
}

#[tokio::test]
async fn tags_are_sorted_and_deduplicated() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    create(&vault, note("One", &["zeta", "Alpha"])).await;
    create(&vault, note("Two", &["alpha", "mid"])).await;

    assert_eq!(vault.all_tags().await.unwrap(), vec!["alpha", "mid", "zeta"]);
    assert_eq!(vault.item_count().await.unwrap(), 2);

    manager.close().await;
}

#[tokio::test]
async fn relationship_upsert_keeps_one_row_per_type() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let a = create(&vault, note("Alpha", &[])).await;
    let b = create(&vault, note("Beta", &[])).await;

    for strength in [0.55, 0.7] {
        vault
            .create_relationship(&Relationship {
                id: 0,
                source_id: a.id.clone(),
                target_id: b.id.clone(),
                relation_type: "tag".to_string(),
                strength,
            })
            .await
            .unwrap();
    }

    let rels = vault.relationships(&a.id).await.unwrap();
    assert_eq!(rels.len(), 1);
    assert!((rels[0].strength - 0.7).abs() < 1e-9);

    manager.close().await;
}

#[tokio::test]
async fn graph_reports_link_over_tag_for_the_same_pair() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let a = create(&vault, note("Alpha", &[])).await;
    let b = create(&vault, note("Beta", &[])).await;
    let c = create(&vault, note("Gamma", &[])).await;

    // Both mechanisms wrote to the {a, b} pair; only the link survives the
    // snapshot. The {b, c} tag edge has no competing link and passes.
    for (source, target, rel_type) in [
        (&a.id, &b.id, "link"),
        (&b.id, &a.id, "tag"),
        (&b.id, &c.id, "tag"),
    ] {
        vault
            .create_relationship(&Relationship {
                id: 0,
                source_id: source.to_string(),
                target_id: target.to_string(),
                relation_type: rel_type.to_string(),
                strength: 1.0,
            })
            .await
            .unwrap();
    }

    let (nodes, edges) = vault.graph().await.unwrap();
    assert_eq!(nodes.len(), 3);
    assert_eq!(edges.len(), 2);
    assert!(edges
        .iter()
        .any(|e| e.relation_type == "link" && e.source_id == a.id && e.target_id == b.id));
    assert!(edges
        .iter()
        .any(|e| e.relation_type == "tag" && e.source_id == b.id && e.target_id == c.id));

    manager.close().await;
}

#[tokio::test]
async fn delete_relationship_removes_the_pair() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    let a = create(&vault, note("Alpha", &[])).await;
    let b = create(&vault, note("Beta", &[])).await;

    vault
        .create_relationship(&Relationship {
            id: 0,
            source_id: a.id.clone(),
            target_id: b.id.clone(),
            relation_type: "link".to_string(),
            strength: 1.0,
        })
        .await
        .unwrap();

    vault.delete_relationship(&a.id, &b.id).await.unwrap();
    assert!(vault.relationships(&a.id).await.unwrap().is_empty());

    manager.close().await;
}

#[tokio::test]
async fn settings_upsert() {
    let (_tmp, manager) = new_manager();
    let vault = manager.vault(1).await.unwrap();

    assert_eq!(vault.get_setting("language").await.unwrap(), None);

    vault.set_setting("language", "en").await.unwrap();
    vault.set_setting("language", "ru").await.unwrap();

    assert_eq!(
        vault.get_setting("language").await.unwrap().as_deref(),
        Some("ru")
    );

    manager.close().await;
}

#[tokio::test]
async fn vaults_are_isolated_per_owner() {
    let (tmp, manager) = new_manager();

    let vault1 = manager.vault(1).await.unwrap();
    let vault2 = manager.vault(2).await.unwrap();

    create(&vault1, note("Private", &["secret"])).await;

    assert_eq!(vault1.item_count().await.unwrap(), 1);
    assert_eq!(vault2.item_count().await.unwrap(), 0);
    assert!(vault2.all_tags().await.unwrap().is_empty());

    assert!(tmp
        .path()
        .join("data")
        .join("users")
        .join("1")
        .join("vault.db")
        .exists());

    manager.close().await;
}

#[tokio::test]
async fn migrations_are_idempotent_across_reopen() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");

    let id = {
        let manager = VaultManager::new(&data_dir).unwrap();
        let vault = manager.vault(1).await.unwrap();
        let item = create(&vault, note("Persisted", &["keep"])).await;
        manager.close().await;
        item.id
    };

    let manager = VaultManager::new(&data_dir).unwrap();
    let vault = manager.vault(1).await.unwrap();

    let stored = vault.get_item(&id).await.unwrap().unwrap();
    assert_eq!(stored.title, "Persisted");
    assert_eq!(stored.tags, vec!["keep"]);

    create(&vault, note("Another", &[])).await;
    assert_eq!(vault.item_count().await.unwrap(), 2);

    manager.close().await;
}

#[tokio::test]
async fn legacy_vaults_gain_new_item_types_and_stay_searchable() {
    let tmp = TempDir::new().unwrap();
    let data_dir = tmp.path().join("data");

    // Fabricate a vault from a build that predates image/search items and
    // the image_path column.
    let user_dir = data_dir.join("users").join("7");
    std::fs::create_dir_all(&user_dir).unwrap();
    let pool = stash::db::connect(&user_dir.join("vault.db")).await.unwrap();
    sqlx::raw_sql(
        r#"
        CREATE TABLE items (
            id TEXT PRIMARY KEY,
            type TEXT NOT NULL CHECK(type IN ('link', 'note')),
            url TEXT,
            title TEXT NOT NULL,
            content TEXT,
            summary TEXT,
            raw_content TEXT,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
            updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        INSERT INTO items (id, type, title, content) VALUES ('old-1', 'note', 'Legacy Note', 'legacy words');
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    let manager = VaultManager::new(&data_dir).unwrap();
    let vault = manager.vault(7).await.unwrap();

    // The legacy row survives the rebuild and is indexed.
    let old = vault.get_item("old-1").await.unwrap().unwrap();
    assert_eq!(old.title, "Legacy Note");
    assert_eq!(vault.search("legacy", 20).await.unwrap().len(), 1);

    // The widened constraint accepts the newer variants.
    let mut image = Item::new(ItemType::Image);
    image.title = "Image".to_string();
    image.image_path = Some("images/x.png".to_string());
    image.tags = vec!["image".to_string()];
    vault.create_item(&mut image).await.unwrap();

    let mut search_item = Item::new(ItemType::Search);
    search_item.title = "Kubernetes".to_string();
    vault.create_item(&mut search_item).await.unwrap();

    assert_eq!(vault.item_count().await.unwrap(), 3);

    manager.close().await;
}
