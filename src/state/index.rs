// ============================================================================
// ÍNDICES SECUNDARIOS - valor de campo -> conjunto de IDs
// ============================================================================
// Se reconstruyen completos tras cada mutación de la caché
// ============================================================================

use std::collections::{HashMap, HashSet};
use std::hash::Hash;

#[derive(Debug, Clone)]
pub struct SecondaryIndex<K: Eq + Hash> {
    entries: HashMap<K, HashSet<String>>,
}

impl<K: Eq + Hash> Default for SecondaryIndex<K> {
    fn default() -> Self {
        Self { entries: HashMap::new() }
    }
}

impl<K: Eq + Hash> SecondaryIndex<K> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn insert(&mut self, key: K, id: &str) {
        self.entries.entry(key).or_default().insert(id.to_string());
    }

    pub fn ids(&self, key: &K) -> Option<&HashSet<String>> {
        self.entries.get(key)
    }

    pub fn count(&self, key: &K) -> usize {
        self.entries.get(key).map_or(0, |ids| ids.len())
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&K, &HashSet<String>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Conserva solo los IDs presentes bajo `key` (ninguno si la clave no existe)
    pub fn retain_matching(&self, ids: &mut Vec<String>, key: &K) {
        match self.entries.get(key) {
            Some(set) => ids.retain(|id| set.contains(id)),
            None => ids.clear(),
        }
    }
}

impl SecondaryIndex<String> {
    /// IDs cuya clave contiene `term` (sin distinguir mayúsculas)
    pub fn ids_matching_substring(&self, term: &str) -> HashSet<String> {
        let term = term.to_lowercase();
        self.entries
            .iter()
            .filter(|(key, _)| key.to_lowercase().contains(&term))
            .flat_map(|(_, ids)| ids.iter().cloned())
            .collect()
    }
}
