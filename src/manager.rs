//! Lazy per-owner vault lifecycle.
//!
//! The manager owns the map of open vaults. A vault is materialized the
//! first time its owner submits or queries anything: the owner directory is
//! created, the database opened (WAL + foreign keys), and migrations run.
//! Opens that fail leave no cache entry behind.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use crate::db;
use crate::migrate;
use crate::vault::Vault;

pub struct VaultManager {
    data_dir: PathBuf,
    vaults: RwLock<HashMap<i64, Vault>>,
}

impl VaultManager {
    /// Creates the manager and its data directory.
    pub fn new(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("create data dir {}", data_dir.display()))?;
        Ok(VaultManager {
            data_dir,
            vaults: RwLock::new(HashMap::new()),
        })
    }

    /// Returns the owner's vault, opening it on first use.
    ///
    /// Double-checked: the read-locked fast path serves cached handles;
    /// on miss the write lock is taken and the map re-checked, so
    /// concurrent callers open each vault at most once.
    pub async fn vault(&self, owner_id: i64) -> Result<Vault> {
        if let Some(v) = self.vaults.read().await.get(&owner_id) {
            return Ok(v.clone());
        }

        let mut vaults = self.vaults.write().await;
        if let Some(v) = vaults.get(&owner_id) {
            return Ok(v.clone());
        }

        let vault = self.open_vault(owner_id).await?;
        vaults.insert(owner_id, vault.clone());
        Ok(vault)
    }

    async fn open_vault(&self, owner_id: i64) -> Result<Vault> {
        let user_dir = self.user_dir(owner_id);
        std::fs::create_dir_all(&user_dir)
            .with_context(|| format!("create user dir {}", user_dir.display()))?;

        let pool = db::connect(&user_dir.join("vault.db"))
            .await
            .context("open vault db")?;

        if let Err(e) = migrate::run_migrations(&pool).await {
            pool.close().await;
            return Err(e.context("run migrations"));
        }

        Ok(Vault::new(pool))
    }

    /// Base data directory.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Deterministic per-owner root: `<dataDir>/users/<ownerId>`.
    pub fn user_dir(&self, owner_id: i64) -> PathBuf {
        self.data_dir.join("users").join(owner_id.to_string())
    }

    /// Closes every open vault.
    pub async fn close(&self) {
        let mut vaults = self.vaults.write().await;
        for (_, vault) in vaults.drain() {
            vault.close().await;
        }
    }
}
