//! # Stash
//!
//! **A multi-tenant personal knowledge-capture backend.**
//!
//! Stash ingests heterogeneous submissions — web links, free-text notes,
//! images, and short topic queries — normalizes and enriches them, and
//! stores each in a per-owner vault: a SQLite database with an FTS5
//! full-text index, a tag table, and a lightweight knowledge graph of
//! typed, weighted edges. Vaults are queried over HTTP and exportable as
//! Obsidian-style markdown archives.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌──────────────┐   ┌─────────────────┐
//! │ CLI / HTTP │──▶│   Pipeline    │──▶│ per-owner vault  │
//! │ submission │   │ extract+LLM  │   │ SQLite+FTS5+graph│
//! └────────────┘   └──────┬───────┘   └────────┬────────┘
//!                         │                    │
//!                  ┌──────┴──────┐      ┌──────┴──────┐
//!                  │ web search  │      │ query facade│
//!                  │ page fetch  │      │ ask / export│
//!                  └─────────────┘      └─────────────┘
//! ```
//!
//! ## Data Flow
//!
//! 1. A submission arrives as a [`models::RawContent`] (CLI or HTTP).
//! 2. The **pipeline** ([`pipeline`]) dispatches on its kind: links are
//!    fetched and distilled ([`extract`]), topics are looked up
//!    ([`websearch`]), notes and captions are parsed for explicit titles
//!    and hashtags ([`parse`]).
//! 3. The **language model** ([`llm`]) contributes a title, summary, and
//!    tags; every enrichment step has a deterministic fallback, so a
//!    degraded item is stored even when all collaborators are down.
//! 4. The item commits to the owner's **vault** ([`vault`], opened lazily
//!    by [`manager`]); FTS triggers make it searchable on commit.
//! 5. **Relationship inference** ([`relate`]) links the new item into the
//!    knowledge graph via wiki-links and tag overlap.
//! 6. The vault is read through the **HTTP facade** ([`server`]) and
//!    serialized by the **exporter** ([`export`]).
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`models`] | Core types: `Item`, `Relationship`, `RawContent`, `SearchResult` |
//! | [`db`] | SQLite pool per vault file (WAL, foreign keys) |
//! | [`migrate`] | Idempotent per-vault schema migrations |
//! | [`manager`] | Lazy owner → vault map with double-checked opening |
//! | [`vault`] | Item CRUD, tags, BM25 search, settings |
//! | [`graph`] | Relationship storage and the deduplicated graph snapshot |
//! | [`detect`] | URL and short-topic detection |
//! | [`lang`] | Owner language preference (prompt steering only) |
//! | [`parse`] | Note titles, hashtags, wiki-links, tag normalization |
//! | [`extract`] | Page fetch + readable-text extraction |
//! | [`llm`] | Language-model enrichment client and prompts |
//! | [`websearch`] | DuckDuckGo topic lookup |
//! | [`pipeline`] | Staged ingestion with graceful degradation |
//! | [`relate`] | Wiki-link and tag-overlap edge inference |
//! | [`export`] | Obsidian-style zip exporter |
//! | [`server`] | Axum HTTP facade |

pub mod config;
pub mod db;
pub mod detect;
pub mod export;
pub mod extract;
pub mod graph;
pub mod lang;
pub mod llm;
pub mod manager;
pub mod migrate;
pub mod models;
pub mod parse;
pub mod pipeline;
pub mod relate;
pub mod server;
pub mod vault;
pub mod websearch;
