// ============================================================================
// OPERACIONES STORE - Caché de operaciones con índices y TTL
// ============================================================================
// items por ID + índices por estado, número de orden y etapa. Los índices
// se reconstruyen completos tras cada mutación.
// ============================================================================

use std::collections::HashMap;

use crate::config::CONFIG;
use crate::error::{ApiError, ApiResult};
use crate::models::operacion::{Operacion, OperacionDto, OperacionPatch};
use crate::models::pagination::{decode, normalize_listing, Page, PageResult};
use crate::models::proceso::percentage;
use crate::services::api_client::ApiClient;
use crate::state::cancellation::{CancellationToken, RequestGeneration};
use crate::state::index::SecondaryIndex;
use crate::state::reactivity::{ReactiveState, SubscriptionId};
use crate::state::ttl::CacheStamp;
use crate::utils::clock::SharedClock;
use crate::utils::dates::to_iso;

const MAX_INVALIDATION_TRIGGERS: usize = 10;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperacionFilters {
    pub search: String,
    /// None = todas, Some(true) = finalizadas, Some(false) = pendientes
    pub estado: Option<bool>,
    pub current_stage: Option<String>,
    /// Rango de creación en ms (inclusive)
    pub date_range: Option<(i64, i64)>,
}

impl OperacionFilters {
    pub fn is_empty(&self) -> bool {
        self.search.is_empty() && self.estado.is_none() && self.current_stage.is_none() && self.date_range.is_none()
    }

    pub fn to_query(&self) -> Vec<(String, String)> {
        let mut query = Vec::new();
        if !self.search.is_empty() {
            query.push(("search".to_string(), self.search.clone()));
        }
        if let Some(estado) = self.estado {
            query.push(("estado".to_string(), estado.to_string()));
        }
        if let Some(stage) = &self.current_stage {
            query.push(("currentStage".to_string(), stage.clone()));
        }
        if let Some((start, end)) = self.date_range {
            query.push(("startDate".to_string(), to_iso(start)));
            query.push(("endDate".to_string(), to_iso(end)));
        }
        query
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OperacionesLoading {
    pub initial: bool,
    pub load_more: bool,
    pub search: bool,
    pub details: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorePagination {
    pub page: u32,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
    pub last_fetch: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperacionStats {
    pub total: usize,
    pub finalizadas: usize,
    pub pendientes: usize,
    pub porcentaje_completado: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvalidationTrigger {
    pub trigger: String,
    pub timestamp: i64,
}

/// Estado de la caché de operaciones
#[derive(Debug, Clone)]
pub struct OperacionesData {
    pub items: HashMap<String, Operacion>,
    pub pagination: StorePagination,
    pub filters: OperacionFilters,
    pub loading: OperacionesLoading,
    pub cache: CacheStamp,
    pub invalidation_triggers: Vec<InvalidationTrigger>,
    pub by_estado: SecondaryIndex<bool>,
    pub by_orden: SecondaryIndex<String>,
    pub by_stage: SecondaryIndex<String>,
    pub error: Option<String>,
}

impl OperacionesData {
    pub fn new(limit: usize, ttl_ms: i64) -> Self {
        Self {
            items: HashMap::new(),
            pagination: StorePagination { page: 1, limit, total: 0, has_more: true, last_fetch: None },
            filters: OperacionFilters::default(),
            loading: OperacionesLoading::default(),
            cache: CacheStamp::new(ttl_ms),
            invalidation_triggers: Vec::new(),
            by_estado: SecondaryIndex::new(),
            by_orden: SecondaryIndex::new(),
            by_stage: SecondaryIndex::new(),
            error: None,
        }
    }

    pub fn rebuild_indexes(&mut self) {
        self.by_estado.clear();
        self.by_orden.clear();
        self.by_stage.clear();
        for (id, operacion) in &self.items {
            self.by_estado.insert(operacion.estado_operacion, id);
            for orden in &operacion.ordenes {
                self.by_orden.insert(orden.clone(), id);
            }
            if let Some(stage) = &operacion.current_stage {
                self.by_stage.insert(stage.clone(), id);
            }
        }
    }

    /// Inserta (reemplazando la caché si `clear_existing`) y reindexa
    pub fn cache_operaciones(&mut self, operaciones: Vec<Operacion>, clear_existing: bool) {
        if clear_existing {
            self.items.clear();
        }
        for operacion in operaciones {
            self.items.insert(operacion.id.clone(), operacion);
        }
        self.rebuild_indexes();
    }

    /// Vista filtrada según los filtros actuales, más recientes primero
    pub fn paginated_items(&self) -> Vec<Operacion> {
        let mut ids: Vec<String> = self.items.keys().cloned().collect();

        if let Some(estado) = self.filters.estado {
            self.by_estado.retain_matching(&mut ids, &estado);
        }
        if !self.filters.search.trim().is_empty() {
            let matching = self.by_orden.ids_matching_substring(self.filters.search.trim());
            ids.retain(|id| matching.contains(id));
        }
        if let Some(stage) = &self.filters.current_stage {
            self.by_stage.retain_matching(&mut ids, stage);
        }

        let mut result: Vec<Operacion> = ids
            .iter()
            .filter_map(|id| self.items.get(id))
            .filter(|op| match self.filters.date_range {
                Some((start, end)) => op.created_ms >= start && op.created_ms <= end,
                None => true,
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_ms.cmp(&a.created_ms).then_with(|| a.id.cmp(&b.id)));
        result
    }

    pub fn stats(&self) -> OperacionStats {
        let total = self.items.len();
        let finalizadas = self.by_estado.count(&true);
        OperacionStats {
            total,
            finalizadas,
            pendientes: self.by_estado.count(&false),
            porcentaje_completado: percentage(finalizadas, total),
        }
    }

    /// Números de orden conocidos, ordenados
    pub fn all_tickets(&self) -> Vec<String> {
        let mut tickets: Vec<String> = self.by_orden.keys().cloned().collect();
        tickets.sort();
        tickets
    }

    fn clear_loading(&mut self) {
        self.loading.initial = false;
        self.loading.load_more = false;
        self.loading.search = false;
    }
}

/// Opciones de `fetch_operaciones`
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FetchOperacionesOptions {
    pub page: Option<u32>,
    pub limit: Option<usize>,
    pub force_refresh: bool,
    pub filters: OperacionFilters,
}

pub struct OperacionesStore {
    api: ApiClient,
    clock: SharedClock,
    state: ReactiveState<OperacionesData>,
    generation: RequestGeneration,
    token: CancellationToken,
}

impl OperacionesStore {
    pub fn new(api: ApiClient, clock: SharedClock) -> Self {
        Self::with_settings(api, clock, CONFIG.page_size, CONFIG.cache_config.operaciones_ttl_ms)
    }

    pub fn with_settings(api: ApiClient, clock: SharedClock, limit: usize, ttl_ms: i64) -> Self {
        Self {
            api,
            clock,
            state: ReactiveState::new(OperacionesData::new(limit, ttl_ms)),
            generation: RequestGeneration::new(),
            token: CancellationToken::new(),
        }
    }

    pub fn with_data<R>(&self, reader: impl FnOnce(&OperacionesData) -> R) -> R {
        self.state.with(reader)
    }

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        self.state.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.state.unsubscribe(id);
    }

    pub fn paginated_items(&self) -> Vec<Operacion> {
        self.state.with(OperacionesData::paginated_items)
    }

    pub fn get_by_id(&self, id: &str) -> Option<Operacion> {
        self.state.with(|d| d.items.get(id).cloned())
    }

    pub fn stats(&self) -> OperacionStats {
        self.state.with(OperacionesData::stats)
    }

    pub fn all_tickets(&self) -> Vec<String> {
        self.state.with(OperacionesData::all_tickets)
    }

    pub fn all_items(&self) -> Vec<Operacion> {
        self.state.with(|d| d.items.values().cloned().collect())
    }

    pub fn is_cache_valid(&self) -> bool {
        let now = self.clock.now_ms();
        self.state.with(|d| d.cache.is_valid(now))
    }

    pub fn loading(&self) -> OperacionesLoading {
        self.state.with(|d| d.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.state.with(|d| d.error.clone())
    }

    pub fn pagination(&self) -> StorePagination {
        self.state.with(|d| d.pagination)
    }

    fn is_stale(&self, ticket: u64) -> bool {
        self.token.is_cancelled() || !self.generation.is_current(ticket)
    }

    /// Carga paginada con caché. Ante 404 del endpoint paginado usa los legados
    pub async fn fetch_operaciones(&self, options: FetchOperacionesOptions) -> ApiResult<Vec<Operacion>> {
        let has_items = self.state.with(|d| !d.items.is_empty());
        if !options.force_refresh && self.is_cache_valid() && has_items {
            log::debug!("📦 Operaciones servidas desde caché");
            return Ok(self.paginated_items());
        }

        let page = options.page.unwrap_or(1);
        let limit = options.limit.unwrap_or_else(|| self.pagination().limit);
        let is_search = !options.filters.is_empty();
        self.state.update(|d| {
            if !has_items {
                d.loading.initial = true;
            } else if is_search {
                d.loading.search = true;
            } else {
                d.loading.load_more = true;
            }
            d.error = None;
        });

        let ticket = self.generation.next();
        let mut query = vec![("page".to_string(), page.to_string()), ("limit".to_string(), limit.to_string())];
        query.extend(options.filters.to_query());
        let result = self.api.get_with_query("/operacion/paginated", query).await;
        if self.is_stale(ticket) {
            log::debug!("🔄 Respuesta de operaciones descartada (página {})", page);
            return Ok(self.paginated_items());
        }

        let page_data = result.and_then(|body| match normalize_listing(&body) {
            PageResult::Empty => Err(ApiError::InvalidResponse("Respuesta de API inválida".to_string())),
            other => Ok(other.into_page()),
        });

        match page_data {
            Ok(page_data) => {
                self.store_page(page_data, page, limit);
                Ok(self.paginated_items())
            }
            Err(e) if e.is_not_found() => {
                log::warn!("⚠️ /operacion/paginated no disponible, usando endpoint legado");
                self.state.update(OperacionesData::clear_loading);
                self.fetch_operaciones_fallback(&options.filters).await
            }
            Err(e) => {
                log::error!("❌ Error cargando operaciones: {}", e);
                self.state.update(|d| {
                    d.clear_loading();
                    d.error = Some(e.user_message());
                });
                Err(e)
            }
        }
    }

    fn store_page(&self, page_data: Page, page: u32, limit: usize) {
        let now = self.clock.now_ms();
        let operaciones: Vec<Operacion> = page_data
            .decode::<OperacionDto>()
            .iter()
            .map(|dto| Operacion::from_dto(dto, false, now))
            .collect();
        log::info!("✅ {} operaciones cargadas (página {})", operaciones.len(), page);

        self.state.update(|d| {
            d.cache_operaciones(operaciones, page == 1);
            d.pagination = StorePagination {
                page,
                limit,
                total: page_data.total,
                has_more: page_data.has_more,
                last_fetch: Some(now),
            };
            d.cache.touch(now);
            d.clear_loading();
        });
    }

    /// `/operacion/estado/{bool}` si hay filtro de estado, si no `/operacion/all`
    async fn fetch_operaciones_fallback(&self, filters: &OperacionFilters) -> ApiResult<Vec<Operacion>> {
        self.state.update(|d| d.loading.initial = true);
        let path = match filters.estado {
            Some(estado) => format!("/operacion/estado/{}", estado),
            None => "/operacion/all".to_string(),
        };

        let ticket = self.generation.next();
        let result = self.api.get(path).await;
        if self.is_stale(ticket) {
            return Ok(self.paginated_items());
        }

        match result {
            Ok(body) => {
                let page_data = normalize_listing(&body).into_page();
                let total = page_data.total;
                let now = self.clock.now_ms();
                let operaciones: Vec<Operacion> = page_data
                    .decode::<OperacionDto>()
                    .iter()
                    .map(|dto| Operacion::from_dto(dto, false, now))
                    .collect();
                self.state.update(|d| {
                    d.cache_operaciones(operaciones, true);
                    d.pagination.page = 1;
                    d.pagination.total = total;
                    d.pagination.has_more = false;
                    d.pagination.last_fetch = Some(now);
                    d.cache.touch(now);
                    d.loading.initial = false;
                });
                Ok(self.paginated_items())
            }
            Err(e) => {
                log::error!("❌ Error en endpoint legado de operaciones: {}", e);
                self.state.update(|d| {
                    d.loading.initial = false;
                    d.error = Some(e.user_message());
                });
                Err(e)
            }
        }
    }

    /// Siguiente página con los filtros actuales; no-op sin más datos
    pub async fn load_more(&self) -> ApiResult<Vec<Operacion>> {
        let (has_more, busy, next_page, filters) =
            self.state.with(|d| (d.pagination.has_more, d.loading.load_more, d.pagination.page + 1, d.filters.clone()));
        if !has_more || busy {
            return Ok(self.paginated_items());
        }
        self.fetch_operaciones(FetchOperacionesOptions {
            page: Some(next_page),
            force_refresh: true,
            filters,
            ..FetchOperacionesOptions::default()
        })
        .await
    }

    /// Término vacío → vista local; si no, página 1 desde el servidor.
    /// Los errores se registran y devuelven lista vacía
    pub async fn search_operaciones(&self, term: &str) -> Vec<Operacion> {
        self.state.update(|d| d.filters.search = term.to_string());
        if term.trim().is_empty() {
            return self.paginated_items();
        }

        let filters = self.state.with(|d| d.filters.clone());
        self.state.update(|d| d.loading.search = true);
        let result = self
            .fetch_operaciones(FetchOperacionesOptions {
                page: Some(1),
                force_refresh: true,
                filters,
                ..FetchOperacionesOptions::default()
            })
            .await;
        self.state.update(|d| d.loading.search = false);

        match result {
            Ok(items) => items,
            Err(e) => {
                log::error!("❌ Error en búsqueda de operaciones: {}", e);
                Vec::new()
            }
        }
    }

    /// Detalle completo; ante error devuelve la copia cacheada sin detalles
    pub async fn fetch_operacion_details(&self, id: &str) -> ApiResult<Operacion> {
        let cached = self.get_by_id(id);
        if let Some(cached) = cached.as_ref().filter(|op| op.has_full_details) {
            return Ok(cached.clone());
        }

        self.state.update(|d| d.loading.details = true);
        let result = self.api.get(format!("/operacion/id/{}", id)).await.and_then(decode::<OperacionDto>);
        self.state.update(|d| d.loading.details = false);

        match result {
            Ok(dto) => {
                let operacion = Operacion::from_dto(&dto, true, self.clock.now_ms());
                let stored = operacion.clone();
                self.state.update(|d| d.cache_operaciones(vec![stored], false));
                Ok(operacion)
            }
            Err(e) => {
                log::error!("❌ Error cargando detalles de la operación {}: {}", id, e);
                match cached {
                    Some(cached) => Ok(cached.without_full_details()),
                    None => Err(e),
                }
            }
        }
    }

    /// Modifica los filtros y recarga desde la página 1
    pub async fn apply_filters(&self, change: impl FnOnce(&mut OperacionFilters)) -> ApiResult<Vec<Operacion>> {
        let filters = self.state.update(|d| {
            change(&mut d.filters);
            d.pagination.page = 1;
            d.filters.clone()
        });
        self.fetch_operaciones(FetchOperacionesOptions {
            page: Some(1),
            force_refresh: true,
            filters,
            ..FetchOperacionesOptions::default()
        })
        .await
    }

    pub async fn clear_filters(&self) -> ApiResult<Vec<Operacion>> {
        self.state.update(|d| {
            d.filters = OperacionFilters::default();
            d.pagination.page = 1;
        });
        self.fetch_operaciones(FetchOperacionesOptions {
            page: Some(1),
            force_refresh: true,
            ..FetchOperacionesOptions::default()
        })
        .await
    }

    pub fn invalidate_cache(&self, trigger: &str) {
        let now = self.clock.now_ms();
        self.state.update(|d| {
            d.cache.invalidate();
            d.invalidation_triggers.push(InvalidationTrigger { trigger: trigger.to_string(), timestamp: now });
            if d.invalidation_triggers.len() > MAX_INVALIDATION_TRIGGERS {
                d.invalidation_triggers.clear();
            }
        });
        log::debug!("🔄 Caché de operaciones invalidada ({})", trigger);
    }

    pub fn update_operacion(&self, id: &str, patch: &OperacionPatch) -> bool {
        let now = self.clock.now_ms();
        self.state.update(|d| match d.items.get_mut(id) {
            Some(operacion) => {
                patch.apply(operacion);
                operacion.last_updated = now;
                d.rebuild_indexes();
                true
            }
            None => false,
        })
    }

    pub fn remove_operacion(&self, id: &str) -> bool {
        self.state.update(|d| {
            let removed = d.items.remove(id).is_some();
            d.rebuild_indexes();
            removed
        })
    }

    /// Descarta respuestas en vuelo (fin de vida del consumidor)
    pub fn teardown(&self) {
        self.token.cancel();
        self.generation.bump();
    }
}
