// ============================================================================
// USE LAZY LOADING - Lista paginada con carga incremental y caché
// ============================================================================

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::{ApiError, ApiResult};
use crate::models::operacion::OperacionDto;
use crate::models::pagination::{decode_items, normalize_page};
use crate::models::proceso::ProcesoDto;
use crate::services::api_client::ApiClient;
use crate::state::cancellation::{CancellationToken, RequestGeneration};
use crate::state::page_cache::{CachedPage, PageCache, Pagination};
use crate::state::reactivity::{ReactiveState, SubscriptionId};
use crate::utils::clock::SharedClock;

pub type FetchPageFn = Rc<dyn Fn(FetchParams) -> LocalBoxFuture<'static, ApiResult<Value>>>;

/// Entidades con identificador estable
pub trait Identified {
    fn id(&self) -> String;
}

impl Identified for OperacionDto {
    fn id(&self) -> String {
        self.id.clone()
    }
}

impl Identified for ProcesoDto {
    fn id(&self) -> String {
        self.id.clone()
    }
}

/// Acepta `id` o `_id`, numérico o texto
impl Identified for Value {
    fn id(&self) -> String {
        match self.get("id").or_else(|| self.get("_id")) {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct LazyFilters {
    pub search: String,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    /// Filtros adicionales pasados a `search`
    pub extra: BTreeMap<String, String>,
}

/// Parámetros que recibe la función de fetch
#[derive(Debug, Clone, PartialEq)]
pub struct FetchParams {
    pub page: u32,
    pub limit: usize,
    pub search: String,
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub extra: BTreeMap<String, String>,
}

impl FetchParams {
    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
        ];
        if !self.search.is_empty() {
            query.push(("search".to_string(), self.search.clone()));
        }
        if let Some(sort_by) = &self.sort_by {
            query.push(("sortBy".to_string(), sort_by.clone()));
        }
        query.push(("sortOrder".to_string(), self.sort_order.as_str().to_string()));
        query.extend(self.extra.iter().map(|(k, v)| (k.clone(), v.clone())));
        query
    }
}

/// Fetch estándar: GET `path` con los parámetros como query
pub fn api_fetcher(api: ApiClient, path: impl Into<String>) -> FetchPageFn {
    let path = path.into();
    Rc::new(move |params: FetchParams| {
        let api = api.clone();
        let path = path.clone();
        Box::pin(async move { api.get_with_query(path, params.to_query()).await })
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadingFlags {
    pub initial: bool,
    pub load_more: bool,
    pub search: bool,
}

impl LoadingFlags {
    pub fn any(&self) -> bool {
        self.initial || self.load_more || self.search
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LazyState<T> {
    pub items: Vec<T>,
    pub loading: LoadingFlags,
    pub pagination: Pagination,
    pub filters: LazyFilters,
    pub error: Option<String>,
    pub last_fetch: Option<i64>,
}

impl<T> LazyState<T> {
    fn new(limit: usize) -> Self {
        Self {
            items: Vec::new(),
            loading: LoadingFlags::default(),
            pagination: Pagination::new(limit),
            filters: LazyFilters::default(),
            error: None,
            last_fetch: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LazyOptions {
    pub initial_limit: usize,
    pub load_more_limit: usize,
    /// Prefijo de la clave en la PageCache; None desactiva la caché
    pub cache_key: Option<String>,
}

impl Default for LazyOptions {
    fn default() -> Self {
        Self { initial_limit: 50, load_more_limit: 50, cache_key: None }
    }
}

fn message_or(error: &ApiError, fallback: &str) -> String {
    let message = error.user_message();
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

/// Lista perezosa de `T`; los items se deserializan desde la respuesta
pub struct LazyLoader<T> {
    options: LazyOptions,
    fetch: FetchPageFn,
    cache: Option<PageCache>,
    clock: SharedClock,
    state: ReactiveState<LazyState<T>>,
    generation: RequestGeneration,
    token: CancellationToken,
    // Ticket de la última petición que levantó cada flag de carga
    initial_owner: Cell<u64>,
    load_more_owner: Cell<u64>,
}

impl<T: Identified + DeserializeOwned + Clone + 'static> LazyLoader<T> {
    pub fn new(options: LazyOptions, fetch: FetchPageFn, cache: Option<PageCache>, clock: SharedClock) -> Self {
        let state = ReactiveState::new(LazyState::new(options.initial_limit));
        Self {
            options,
            fetch,
            cache,
            clock,
            state,
            generation: RequestGeneration::new(),
            token: CancellationToken::new(),
            initial_owner: Cell::new(0),
            load_more_owner: Cell::new(0),
        }
    }

    pub fn snapshot(&self) -> LazyState<T> {
        self.state.snapshot()
    }

    pub fn with_state<R>(&self, reader: impl FnOnce(&LazyState<T>) -> R) -> R {
        self.state.with(reader)
    }

    pub fn items(&self) -> Vec<T> {
        self.state.with(|s| s.items.clone())
    }

    pub fn pagination(&self) -> Pagination {
        self.state.with(|s| s.pagination)
    }

    pub fn error(&self) -> Option<String> {
        self.state.with(|s| s.error.clone())
    }

    pub fn has_items(&self) -> bool {
        self.state.with(|s| !s.items.is_empty())
    }

    pub fn is_loading(&self) -> bool {
        self.state.with(|s| s.loading.any())
    }

    pub fn can_load_more(&self) -> bool {
        self.state.with(|s| s.pagination.has_more && !s.loading.any())
    }

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        self.state.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.state.unsubscribe(id);
    }

    fn page_cache_key(&self) -> Option<String> {
        let prefix = self.options.cache_key.as_ref()?;
        let mut filters = self.state.with(|s| {
            json!({
                "search": s.filters.search,
                "sortBy": s.filters.sort_by,
                "sortOrder": s.filters.sort_order.as_str(),
            })
        });
        let extra = self.state.with(|s| s.filters.extra.clone());
        if !extra.is_empty() {
            filters["extra"] = json!(extra);
        }
        Some(format!("{}_{}", prefix, filters))
    }

    fn params(&self) -> FetchParams {
        self.state.with(|s| FetchParams {
            page: s.pagination.page,
            limit: s.pagination.limit,
            search: s.filters.search.clone(),
            sort_by: s.filters.sort_by.clone(),
            sort_order: s.filters.sort_order,
            extra: s.filters.extra.clone(),
        })
    }

    /// La respuesta de `ticket` ya no debe tocar el estado
    fn is_stale(&self, ticket: u64) -> bool {
        self.token.is_cancelled() || !self.generation.is_current(ticket)
    }

    /// Primera página. Con `reset_pagination` vuelve a la página 1 y consulta la caché
    pub async fn load_initial(&self, reset_pagination: bool) -> ApiResult<()> {
        let ticket = self.generation.next();
        self.initial_owner.set(ticket);
        self.state.update(|s| {
            s.loading.initial = true;
            s.error = None;
            if reset_pagination {
                s.pagination.page = 1;
                s.pagination.limit = self.options.initial_limit;
                s.items.clear();
            }
        });

        let cache_key = self.page_cache_key();
        if reset_pagination {
            let cached = match (&self.cache, &cache_key) {
                (Some(cache), Some(key)) => cache.get(key),
                _ => None,
            };
            if let Some(cached) = cached {
                log::debug!("📦 Página servida desde caché: {:?}", cache_key);
                self.state.update(|s| {
                    s.items = decode_items(&cached.items);
                    s.pagination = cached.pagination;
                    s.loading.initial = false;
                });
                return Ok(());
            }
        }

        let params = self.params();
        let result = (self.fetch)(params.clone()).await;
        if self.is_stale(ticket) {
            log::debug!("🔄 Respuesta descartada (página {})", params.page);
            // El flag solo se baja si ninguna carga inicial posterior lo tomó
            if self.initial_owner.get() == ticket {
                self.state.update(|s| s.loading.initial = false);
            }
            return Ok(());
        }

        let body = match result {
            Ok(body) => body,
            Err(e) => {
                log::error!("❌ Error en carga inicial: {}", e);
                self.state.update(|s| {
                    s.error = Some(message_or(&e, "Error al cargar datos"));
                    s.loading.initial = false;
                });
                return Err(e);
            }
        };

        let page = normalize_page(&body, params.limit).into_page();
        let new_items: Vec<T> = page.decode();
        let now = self.clock.now_ms();
        let pagination = self.state.update(|s| {
            if reset_pagination {
                s.items = new_items;
            } else {
                s.items.extend(new_items);
            }
            s.pagination.total = page.total;
            s.pagination.has_more = page.has_more;
            s.last_fetch = Some(now);
            s.loading.initial = false;
            s.pagination
        });

        if reset_pagination {
            if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                cache.insert(key, CachedPage { items: page.items, pagination });
            }
        }
        Ok(())
    }

    /// Página siguiente; no-op si ya se está cargando o no hay más
    pub async fn load_more(&self) -> ApiResult<()> {
        if !self.can_load_more() {
            return Ok(());
        }
        let ticket = self.generation.next();
        self.load_more_owner.set(ticket);
        let limit = self.options.load_more_limit;
        self.state.update(|s| {
            s.loading.load_more = true;
            s.error = None;
            s.pagination.page += 1;
            s.pagination.limit = limit;
        });

        let params = self.params();
        let result = (self.fetch)(params.clone()).await;
        if self.is_stale(ticket) {
            log::debug!("🔄 Respuesta descartada (página {})", params.page);
            // La paginación ya pertenece a la carga que la invalidó
            if self.load_more_owner.get() == ticket {
                self.state.update(|s| s.loading.load_more = false);
            }
            return Ok(());
        }

        match result {
            Ok(body) => {
                let explicit_total = body.get("total").and_then(Value::as_u64).filter(|t| *t > 0);
                let page = normalize_page(&body, limit).into_page();
                let new_items: Vec<T> = page.decode();
                let now = self.clock.now_ms();
                self.state.update(|s| {
                    s.pagination.has_more = page.items.len() == limit;
                    if let Some(total) = explicit_total {
                        s.pagination.total = total as usize;
                    }
                    s.items.extend(new_items);
                    s.last_fetch = Some(now);
                    s.loading.load_more = false;
                });
                Ok(())
            }
            Err(e) => {
                log::error!("❌ Error cargando más datos: {}", e);
                // La página vuelve atrás para que el reintento no la salte
                self.state.update(|s| {
                    s.error = Some(message_or(&e, "Error al cargar más datos"));
                    s.pagination.page -= 1;
                    s.loading.load_more = false;
                });
                Err(e)
            }
        }
    }

    /// Nuevo término (y filtros extra); recarga desde la página 1
    pub async fn search(&self, term: impl Into<String>, extra: BTreeMap<String, String>) -> ApiResult<()> {
        let term = term.into();
        self.state.update(|s| {
            s.loading.search = true;
            s.error = None;
            s.filters.search = term;
            s.filters.extra.extend(extra);
        });

        let result = self.load_initial(true).await;
        self.state.update(|s| {
            s.loading.search = false;
            if let Err(e) = &result {
                s.error = Some(message_or(e, "Error en la búsqueda"));
            }
        });
        result
    }

    pub async fn update_sort(&self, sort_by: impl Into<String>, sort_order: SortOrder) -> ApiResult<()> {
        let sort_by = sort_by.into();
        self.state.update(|s| {
            s.filters.sort_by = Some(sort_by);
            s.filters.sort_order = sort_order;
        });
        self.load_initial(true).await
    }

    /// Recarga ignorando la caché de los filtros actuales
    pub async fn refresh(&self) -> ApiResult<()> {
        if let (Some(cache), Some(key)) = (&self.cache, self.page_cache_key()) {
            cache.remove(&key);
        }
        self.load_initial(true).await
    }

    /// Vuelve al estado inicial; lo que esté en vuelo se descarta
    pub fn reset(&self) {
        self.generation.bump();
        self.state.set(LazyState::new(self.options.initial_limit));
    }

    /// Fin de vida del consumidor: ninguna respuesta posterior muta el estado
    pub fn teardown(&self) {
        self.token.cancel();
        self.generation.bump();
    }

    pub fn get_item_by_id(&self, id: &str) -> Option<T> {
        self.state.with(|s| s.items.iter().find(|item| item.id() == id).cloned())
    }

    /// Modifica el item en sitio; false si no existe
    pub fn update_item(&self, id: &str, updater: impl FnOnce(&mut T)) -> bool {
        let exists = self.state.with(|s| s.items.iter().any(|item| item.id() == id));
        if !exists {
            return false;
        }
        self.state.update(|s| {
            if let Some(item) = s.items.iter_mut().find(|item| item.id() == id) {
                updater(item);
            }
        });
        true
    }

    pub fn remove_item(&self, id: &str) -> bool {
        let exists = self.state.with(|s| s.items.iter().any(|item| item.id() == id));
        if !exists {
            return false;
        }
        self.state.update(|s| {
            s.items.retain(|item| item.id() != id);
            s.pagination.total = s.pagination.total.saturating_sub(1);
        });
        true
    }

    pub fn add_item(&self, item: T, prepend: bool) {
        self.state.update(|s| {
            if prepend {
                s.items.insert(0, item);
            } else {
                s.items.push(item);
            }
            s.pagination.total += 1;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use futures::channel::oneshot;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use std::cell::{Cell, RefCell};

    type Calls = Rc<RefCell<Vec<FetchParams>>>;

    fn scripted(responses: Vec<ApiResult<Value>>) -> (FetchPageFn, Calls) {
        let calls: Calls = Rc::new(RefCell::new(Vec::new()));
        let queue = Rc::new(RefCell::new(responses.into_iter()));
        let sink = calls.clone();
        let fetch: FetchPageFn = Rc::new(move |params| {
            sink.borrow_mut().push(params);
            let next = queue.borrow_mut().next().unwrap_or(Ok(Value::Null));
            Box::pin(async move { next })
        });
        (fetch, calls)
    }

    fn ids(n: std::ops::Range<u32>) -> Value {
        Value::Array(n.map(|i| json!({ "id": format!("op{}", i) })).collect())
    }

    fn loader(fetch: FetchPageFn, limit: usize) -> LazyLoader<Value> {
        let options = LazyOptions { initial_limit: limit, load_more_limit: limit, cache_key: None };
        LazyLoader::new(options, fetch, None, Rc::new(ManualClock::new(0)))
    }

    #[test]
    fn test_short_first_page_has_no_more() {
        let (fetch, calls) = scripted(vec![Ok(json!({"data": [{"id": 1}, {"id": 2}], "total": 2}))]);
        let lazy = loader(fetch, 50);

        block_on(lazy.load_initial(true)).unwrap();

        let state = lazy.snapshot();
        assert_eq!(state.items.len(), 2);
        assert_eq!(state.pagination.total, 2);
        assert!(!state.pagination.has_more);
        assert_eq!(lazy.get_item_by_id("2"), Some(json!({"id": 2})));
        assert_eq!(calls.borrow()[0].page, 1);
        assert_eq!(calls.borrow()[0].limit, 50);
    }

    #[test]
    fn test_load_more_appends_and_is_noop_without_more() {
        let (fetch, calls) = scripted(vec![Ok(ids(0..2)), Ok(json!({"data": ids(2..3), "total": 3}))]);
        let lazy = loader(fetch, 2);

        block_on(lazy.load_initial(true)).unwrap();
        assert!(lazy.pagination().has_more);
        block_on(lazy.load_more()).unwrap();

        let state = lazy.snapshot();
        assert_eq!(state.items.len(), 3);
        assert_eq!(state.pagination.page, 2);
        assert_eq!(state.pagination.total, 3);
        assert!(!state.pagination.has_more);

        block_on(lazy.load_more()).unwrap();
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(lazy.pagination().page, 2);
    }

    #[test]
    fn test_failed_load_more_restores_page() {
        let (fetch, calls) = scripted(vec![Ok(ids(0..2)), Err(ApiError::Network("timeout".into())), Ok(ids(2..4))]);
        let lazy = loader(fetch, 2);

        block_on(lazy.load_initial(true)).unwrap();
        assert!(block_on(lazy.load_more()).is_err());
        assert_eq!(lazy.pagination().page, 1);
        assert_eq!(lazy.error().as_deref(), Some("Error de red: timeout"));

        block_on(lazy.load_more()).unwrap();
        assert_eq!(calls.borrow()[2].page, 2);
        assert_eq!(lazy.items().len(), 4);
    }

    #[test]
    fn test_unrecognized_shape_degrades_to_empty() {
        let (fetch, _) = scripted(vec![Ok(json!({"resultado": "ok"}))]);
        let lazy = loader(fetch, 50);

        block_on(lazy.load_initial(true)).unwrap();

        assert!(!lazy.has_items());
        assert!(!lazy.pagination().has_more);
        assert_eq!(lazy.error(), None);
    }

    #[test]
    fn test_cache_serves_repeat_initial_load_until_refresh() {
        let (fetch, calls) = scripted(vec![Ok(ids(0..3)), Ok(ids(0..1))]);
        let clock = Rc::new(ManualClock::new(0));
        let cache = PageCache::new(300_000, clock.clone());
        let options = LazyOptions { cache_key: Some("operaciones".into()), ..LazyOptions::default() };
        let lazy: LazyLoader<Value> = LazyLoader::new(options, fetch, Some(cache.clone()), clock);

        block_on(lazy.load_initial(true)).unwrap();
        block_on(lazy.load_initial(true)).unwrap();
        assert_eq!(calls.borrow().len(), 1);
        assert_eq!(lazy.items().len(), 3);

        block_on(lazy.refresh()).unwrap();
        assert_eq!(calls.borrow().len(), 2);
        assert_eq!(lazy.items().len(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_search_merges_filters_and_resets_page() {
        let (fetch, calls) = scripted(vec![Ok(ids(0..2)), Ok(ids(0..2)), Ok(ids(5..6))]);
        let lazy = loader(fetch, 2);

        block_on(lazy.load_initial(true)).unwrap();
        block_on(lazy.load_more()).unwrap();
        let extra = BTreeMap::from([("estado".to_string(), "false".to_string())]);
        block_on(lazy.search("NO12", extra)).unwrap();

        let last = calls.borrow().last().cloned().unwrap();
        assert_eq!(last.page, 1);
        assert_eq!(last.search, "NO12");
        assert_eq!(last.extra.get("estado").map(String::as_str), Some("false"));
        assert_eq!(lazy.items().len(), 1);
        assert!(!lazy.snapshot().loading.search);
    }

    #[test]
    fn test_local_mutators() {
        let (fetch, _) = scripted(vec![Ok(json!({"data": ids(0..3), "total": 3}))]);
        let lazy = loader(fetch, 50);
        block_on(lazy.load_initial(true)).unwrap();

        assert!(lazy.update_item("op1", |item| item["estado"] = json!(true)));
        assert_eq!(lazy.get_item_by_id("op1").unwrap()["estado"], json!(true));
        assert!(lazy.remove_item("op0"));
        assert!(!lazy.remove_item("op0"));
        lazy.add_item(json!({"id": "nuevo"}), true);

        let state = lazy.snapshot();
        assert_eq!(state.items[0].id(), "nuevo");
        assert_eq!(state.pagination.total, 3);

        lazy.reset();
        let state = lazy.snapshot();
        assert!(state.items.is_empty());
        assert!(state.pagination.has_more);
        assert_eq!(state.pagination.total, 0);
    }

    #[test]
    fn test_response_after_reset_is_discarded() {
        let (sender, receiver) = oneshot::channel::<ApiResult<Value>>();
        let receiver = Rc::new(RefCell::new(Some(receiver)));
        let fetch: FetchPageFn = Rc::new(move |_| {
            let pending = receiver.borrow_mut().take();
            Box::pin(async move {
                match pending {
                    Some(rx) => rx.await.unwrap_or(Err(ApiError::Cancelled)),
                    None => Ok(Value::Null),
                }
            })
        });
        let lazy = Rc::new(loader(fetch, 50));

        let mut pool = LocalPool::new();
        let task = lazy.clone();
        pool.spawner()
            .spawn_local(async move {
                let _ = task.load_initial(true).await;
            })
            .unwrap();
        pool.run_until_stalled();

        lazy.reset();
        sender.send(Ok(ids(0..3))).unwrap();
        pool.run_until_stalled();

        assert!(!lazy.has_items());
        assert!(!lazy.is_loading());
    }

    #[test]
    fn test_load_more_superseded_by_search_releases_flag() {
        let (sender, receiver) = oneshot::channel::<ApiResult<Value>>();
        let pending = Rc::new(RefCell::new(Some(receiver)));
        let calls = Rc::new(Cell::new(0usize));
        let counter = calls.clone();
        let fetch: FetchPageFn = Rc::new(move |_| {
            counter.set(counter.get() + 1);
            let deferred = if counter.get() == 2 { pending.borrow_mut().take() } else { None };
            Box::pin(async move {
                match deferred {
                    Some(rx) => rx.await.unwrap_or(Err(ApiError::Cancelled)),
                    None => Ok(ids(0..2)),
                }
            })
        });
        let lazy = Rc::new(loader(fetch, 2));
        block_on(lazy.load_initial(true)).unwrap();

        let mut pool = LocalPool::new();
        let task = lazy.clone();
        pool.spawner()
            .spawn_local(async move {
                let _ = task.load_more().await;
            })
            .unwrap();
        pool.run_until_stalled();
        assert!(lazy.is_loading());

        block_on(lazy.search("x", BTreeMap::new())).unwrap();
        sender.send(Ok(ids(5..7))).unwrap();
        pool.run_until_stalled();

        assert!(!lazy.is_loading());
        assert_eq!(lazy.items().len(), 2);
        assert_eq!(lazy.pagination().page, 1);

        block_on(lazy.load_more()).unwrap();
        assert_eq!(calls.get(), 4);
        assert_eq!(lazy.pagination().page, 2);
    }

    #[test]
    fn test_superseded_initial_load_keeps_newer_flag() {
        let receivers = Rc::new(RefCell::new(Vec::new()));
        let queue = receivers.clone();
        let fetch: FetchPageFn = Rc::new(move |_| {
            let (sender, receiver) = oneshot::channel::<ApiResult<Value>>();
            queue.borrow_mut().push(sender);
            Box::pin(async move { receiver.await.unwrap_or(Err(ApiError::Cancelled)) })
        });
        let lazy = Rc::new(loader(fetch, 2));

        let mut pool = LocalPool::new();
        for _ in 0..2 {
            let task = lazy.clone();
            pool.spawner()
                .spawn_local(async move {
                    let _ = task.load_initial(true).await;
                })
                .unwrap();
        }
        pool.run_until_stalled();
        let mut senders: Vec<_> = receivers.borrow_mut().drain(..).collect();
        assert_eq!(senders.len(), 2);

        // La primera respuesta llega tarde: la segunda carga sigue en curso
        let newer = senders.pop().unwrap();
        let older = senders.pop().unwrap();
        older.send(Ok(ids(0..2))).unwrap();
        pool.run_until_stalled();
        assert!(lazy.is_loading());
        assert!(!lazy.has_items());

        newer.send(Ok(ids(3..5))).unwrap();
        pool.run_until_stalled();
        assert!(!lazy.is_loading());
        assert_eq!(lazy.items().len(), 2);
    }
}
