// ============================================================================
// USE SEARCH DEBOUNCE - Búsqueda con debounce, historial y sugerencias
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::ApiResult;
use crate::hooks::use_debounce::{DebounceOptions, Debouncer};
use crate::utils::constants::{SEARCH_HISTORY_LIMIT, SUGGESTIONS_LIMIT};
use crate::utils::scheduler::{Spawner, Timers};

pub type SearchFn = Rc<dyn Fn(String) -> LocalBoxFuture<'static, ApiResult<()>>>;
pub type ClearFn = Rc<dyn Fn()>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    pub delay_ms: u32,
    /// Por debajo de esta longitud se limpia en vez de buscar
    pub min_length: usize,
    pub trim_whitespace: bool,
    pub case_sensitive: bool,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self { delay_ms: 300, min_length: 0, trim_whitespace: true, case_sensitive: false }
    }
}

impl SearchOptions {
    pub fn process(&self, term: &str) -> String {
        let trimmed = if self.trim_whitespace { term.trim() } else { term };
        if self.case_sensitive {
            trimmed.to_string()
        } else {
            trimmed.to_lowercase()
        }
    }
}

/// Historial acotado, el más reciente primero y sin duplicados
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHistory {
    entries: Vec<String>,
    limit: usize,
}

impl Default for SearchHistory {
    fn default() -> Self {
        Self::new(SEARCH_HISTORY_LIMIT)
    }
}

impl SearchHistory {
    pub fn new(limit: usize) -> Self {
        Self { entries: Vec::new(), limit }
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Un término repetido sube al frente en lugar de duplicarse
    pub fn add(&mut self, term: &str, options: &SearchOptions) {
        if term.is_empty() || term.chars().count() < options.min_length {
            return;
        }
        let processed = options.process(term);
        self.entries.retain(|entry| options.process(entry) != processed);
        self.entries.insert(0, term.to_string());
        self.entries.truncate(self.limit);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn suggestions(&self, current: &str, options: &SearchOptions) -> Vec<String> {
        if current.is_empty() {
            return self.entries.iter().take(SUGGESTIONS_LIMIT).cloned().collect();
        }
        let processed = options.process(current);
        self.entries
            .iter()
            .filter(|entry| {
                let candidate = options.process(entry);
                candidate.contains(&processed) && candidate != processed
            })
            .take(SUGGESTIONS_LIMIT)
            .cloned()
            .collect()
    }
}

struct SearchInner {
    options: SearchOptions,
    search_value: RefCell<String>,
    is_searching: Cell<bool>,
    history: RefCell<SearchHistory>,
    on_search: Option<SearchFn>,
    on_clear: Option<ClearFn>,
}

impl SearchInner {
    async fn execute(inner: Rc<SearchInner>, term: String) -> ApiResult<()> {
        let processed = inner.options.process(&term);
        if processed.chars().count() < inner.options.min_length {
            if let Some(on_clear) = &inner.on_clear {
                on_clear();
            }
            return Ok(());
        }

        inner.is_searching.set(true);
        let result = match &inner.on_search {
            Some(on_search) => on_search(processed).await,
            None => Ok(()),
        };
        inner.is_searching.set(false);

        match result {
            Ok(()) => {
                inner.history.borrow_mut().add(&term, &inner.options);
                Ok(())
            }
            Err(e) => {
                log::error!("❌ Error en búsqueda: {}", e);
                Err(e)
            }
        }
    }
}

/// Término de búsqueda debounced que dispara `on_search`/`on_clear`
#[derive(Clone)]
pub struct SearchDebouncer {
    debouncer: Debouncer<String>,
    inner: Rc<SearchInner>,
}

impl SearchDebouncer {
    pub fn new(
        options: SearchOptions,
        on_search: Option<SearchFn>,
        on_clear: Option<ClearFn>,
        timers: Timers,
        spawner: Spawner,
    ) -> Self {
        let debouncer = Debouncer::new(String::new(), DebounceOptions::with_delay(options.delay_ms), timers);
        let inner = Rc::new(SearchInner {
            options,
            search_value: RefCell::new(String::new()),
            is_searching: Cell::new(false),
            history: RefCell::new(SearchHistory::default()),
            on_search,
            on_clear,
        });

        let weak = Rc::downgrade(&inner);
        debouncer.subscribe(move |term| {
            if let Some(inner) = weak.upgrade() {
                spawner(Box::pin(async move {
                    let _ = SearchInner::execute(inner, term).await;
                }));
            }
        });

        Self { debouncer, inner }
    }

    pub fn search_value(&self) -> String {
        self.inner.search_value.borrow().clone()
    }

    pub fn debounced_value(&self) -> String {
        self.debouncer.value()
    }

    pub fn is_searching(&self) -> bool {
        self.inner.is_searching.get()
    }

    pub fn is_debouncing(&self) -> bool {
        self.debouncer.is_debouncing()
    }

    pub fn history(&self) -> Vec<String> {
        self.inner.history.borrow().entries().to_vec()
    }

    pub fn update_search(&self, term: impl Into<String>) {
        let term = term.into();
        *self.inner.search_value.borrow_mut() = term.clone();
        self.debouncer.set(term);
    }

    pub fn clear_search(&self) {
        self.inner.search_value.borrow_mut().clear();
        self.debouncer.cancel();
        if let Some(on_clear) = &self.inner.on_clear {
            on_clear();
        }
    }

    /// Busca sin esperar el debounce (el término actual si no se indica otro)
    pub async fn search_immediate(&self, term: Option<String>) -> ApiResult<()> {
        let term = term.unwrap_or_else(|| self.search_value());
        SearchInner::execute(self.inner.clone(), term).await
    }

    pub fn clear_history(&self) {
        self.inner.history.borrow_mut().clear();
    }

    pub fn suggestions(&self, current: &str) -> Vec<String> {
        self.inner.history.borrow().suggestions(current, &self.inner.options)
    }

    pub fn cancel(&self) {
        self.debouncer.cancel();
    }

    pub fn flush(&self) {
        self.debouncer.flush();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{local_spawner, manual_timers};
    use futures::executor::block_on;

    #[test]
    fn test_history_hoists_duplicates_and_is_bounded() {
        let options = SearchOptions::default();
        let mut history = SearchHistory::default();
        for i in 0..12 {
            history.add(&format!("NO{}", i), &options);
        }
        history.add("no5", &options);

        assert_eq!(history.entries().len(), 10);
        assert_eq!(history.entries()[0], "no5");
        assert_eq!(history.entries().iter().filter(|e| e.eq_ignore_ascii_case("no5")).count(), 1);
        assert_eq!(history.suggestions("", &options).len(), 5);
        assert_eq!(history.suggestions("NO1", &options), vec!["NO11", "NO10"]);
    }

    #[test]
    fn test_debounced_search_runs_callback_and_records_history() {
        let (scheduler, timers) = manual_timers();
        let (mut pool, spawner) = local_spawner();
        let searched = Rc::new(RefCell::new(Vec::new()));
        let cleared = Rc::new(Cell::new(0));

        let sink = searched.clone();
        let on_search: SearchFn = Rc::new(move |term| {
            sink.borrow_mut().push(term);
            Box::pin(async { Ok(()) })
        });
        let counter = cleared.clone();
        let on_clear: ClearFn = Rc::new(move || counter.set(counter.get() + 1));
        let options = SearchOptions { min_length: 3, ..SearchOptions::default() };
        let search = SearchDebouncer::new(options, Some(on_search), Some(on_clear), timers, spawner);

        search.update_search("  Ab");
        scheduler.advance(100);
        search.update_search("  ABC ");
        scheduler.advance(300);
        pool.run_until_stalled();

        assert_eq!(*searched.borrow(), vec!["abc"]);
        assert_eq!(search.history(), vec!["  ABC "]);

        search.update_search("a");
        scheduler.advance(300);
        pool.run_until_stalled();
        assert_eq!(cleared.get(), 1);

        block_on(search.search_immediate(Some("xyz".into()))).unwrap();
        assert_eq!(searched.borrow().last().map(String::as_str), Some("xyz"));

        search.clear_search();
        assert_eq!(cleared.get(), 2);
        assert_eq!(search.search_value(), "");
    }
}
