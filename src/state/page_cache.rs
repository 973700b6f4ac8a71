// ============================================================================
// PAGE CACHE - Caché de primeras páginas de listas perezosas
// ============================================================================
// Objeto explícito (no global): lo crea el AppContext y lo comparten los
// LazyLoader que lo reciben. Entradas con TTL por clave de filtros.
// ============================================================================

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::CONFIG;
use crate::state::ttl::CacheEntry;
use crate::utils::clock::SharedClock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: u32,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

impl Pagination {
    pub fn new(limit: usize) -> Self {
        Self { page: 1, limit, total: 0, has_more: true }
    }
}

/// Página cacheada: items crudos + paginación en el momento de guardarla
#[derive(Debug, Clone, PartialEq)]
pub struct CachedPage {
    pub items: Vec<Value>,
    pub pagination: Pagination,
}

#[derive(Clone)]
pub struct PageCache {
    entries: Rc<RefCell<HashMap<String, CacheEntry<CachedPage>>>>,
    ttl_ms: i64,
    clock: SharedClock,
}

impl PageCache {
    pub fn new(ttl_ms: i64, clock: SharedClock) -> Self {
        Self { entries: Rc::new(RefCell::new(HashMap::new())), ttl_ms, clock }
    }

    pub fn from_config(clock: SharedClock) -> Self {
        Self::new(CONFIG.cache_config.page_cache_ttl_ms, clock)
    }

    /// Entrada vigente; las caducadas se descartan al leerlas
    pub fn get(&self, key: &str) -> Option<CachedPage> {
        let now = self.clock.now_ms();
        let mut entries = self.entries.borrow_mut();
        match entries.get(key) {
            Some(entry) if entry.is_fresh(now, self.ttl_ms) => Some(entry.data.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, page: CachedPage) {
        let now = self.clock.now_ms();
        self.entries.borrow_mut().insert(key.into(), CacheEntry::new(page, now));
    }

    pub fn remove(&self, key: &str) {
        self.entries.borrow_mut().remove(key);
    }

    pub fn clear(&self) {
        self.entries.borrow_mut().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use serde_json::json;

    #[test]
    fn test_entries_expire_after_ttl() {
        let clock = ManualClock::new(0);
        let cache = PageCache::new(300_000, Rc::new(clock.clone()));
        let page = CachedPage { items: vec![json!({"id": 1})], pagination: Pagination::new(50) };

        cache.insert("ops_{}", page.clone());
        clock.advance(299_999);
        assert_eq!(cache.get("ops_{}"), Some(page));

        clock.advance(1);
        assert_eq!(cache.get("ops_{}"), None);
        assert!(cache.is_empty());
    }
}
