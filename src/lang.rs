//! Owner language preference.
//!
//! The language code steers the enrichment prompts only; there is no
//! runtime localization. Resolution order: process-wide cache (advisory),
//! the vault's `language` setting (authoritative), then the submission's
//! hint, then English.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::vault::Vault;

pub const LANGUAGE_SETTING: &str = "language";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lang {
    #[default]
    En,
    Ru,
}

impl Lang {
    pub fn code(&self) -> &'static str {
        match self {
            Lang::En => "en",
            Lang::Ru => "ru",
        }
    }
}

/// Maps a BCP 47-ish code to a supported language.
///
/// `ru`, `uk`, `be` (with any region subtag) map to Russian; everything
/// else degrades to English.
pub fn parse_lang(code: &str) -> Lang {
    let mut code = code.trim().to_lowercase();

    if let Some(idx) = code.find(['-', '_']) {
        code.truncate(idx);
    }

    match code.as_str() {
        "ru" | "uk" | "be" => Lang::Ru,
        _ => Lang::En,
    }
}

pub fn is_valid_lang(code: &str) -> bool {
    matches!(code.trim().to_lowercase().as_str(), "en" | "ru")
}

/// Process-wide per-owner language cache.
#[derive(Default)]
pub struct LangCache {
    inner: Mutex<HashMap<i64, Lang>>,
}

impl LangCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, owner_id: i64) -> Option<Lang> {
        self.inner.lock().unwrap().get(&owner_id).copied()
    }

    pub fn set(&self, owner_id: i64, lang: Lang) {
        self.inner.lock().unwrap().insert(owner_id, lang);
    }

    pub fn clear(&self, owner_id: i64) {
        self.inner.lock().unwrap().remove(&owner_id);
    }
}

/// Resolves the effective language for one owner.
///
/// The vault setting wins over the submission hint; whatever is resolved
/// is cached for the next submission.
pub async fn resolve(cache: &LangCache, vault: &Vault, owner_id: i64, hint: &str) -> Lang {
    if let Some(lang) = cache.get(owner_id) {
        return lang;
    }

    let lang = match vault.get_setting(LANGUAGE_SETTING).await {
        Ok(Some(stored)) => parse_lang(&stored),
        _ => parse_lang(hint),
    };

    cache.set(owner_id, lang);
    lang
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_subtags_are_stripped() {
        assert_eq!(parse_lang("ru-RU"), Lang::Ru);
        assert_eq!(parse_lang("ru_RU"), Lang::Ru);
        assert_eq!(parse_lang("en-US"), Lang::En);
    }

    #[test]
    fn slavic_neighbors_widen_to_russian() {
        assert_eq!(parse_lang("uk"), Lang::Ru);
        assert_eq!(parse_lang("be"), Lang::Ru);
    }

    #[test]
    fn unknown_codes_degrade_to_english() {
        assert_eq!(parse_lang("fr"), Lang::En);
        assert_eq!(parse_lang(""), Lang::En);
        assert_eq!(parse_lang("de-AT"), Lang::En);
    }

    #[test]
    fn cache_round_trip() {
        let cache = LangCache::new();
        assert_eq!(cache.get(7), None);
        cache.set(7, Lang::Ru);
        assert_eq!(cache.get(7), Some(Lang::Ru));
        cache.clear(7);
        assert_eq!(cache.get(7), None);
    }

    #[test]
    fn validity() {
        assert!(is_valid_lang("en"));
        assert!(is_valid_lang(" RU "));
        assert!(!is_valid_lang("uk"));
    }
}
