// ============================================================================
// PROCESOS STORE - Caché de procesos por tipo con detalles bajo demanda
// ============================================================================
// Resúmenes por ID, pertenencia por tipo y detalles completos con TTL
// propio. Es el destino de las actualizaciones optimistas de detalles.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};

use crate::config::CONFIG;
use crate::error::{ApiError, ApiResult};
use crate::hooks::use_optimistic_updates::DetailStatusTarget;
use crate::models::pagination::normalize_listing;
use crate::models::proceso::{percentage, Detalle, Proceso, ProcesoDetails, ProcesoDto, TipoProceso};
use crate::services::api_client::ApiClient;
use crate::services::proceso_service::{ProcesoService, StatusUpdateOutcome};
use crate::state::cancellation::{CancellationToken, RequestGeneration};
use crate::state::index::SecondaryIndex;
use crate::state::reactivity::{ReactiveState, SubscriptionId};
use crate::state::ttl::CacheStamp;
use crate::utils::clock::SharedClock;
use crate::utils::dates::date_key;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProcesoFilters {
    pub tipo: Option<TipoProceso>,
    /// Nombre completo del responsable
    pub responsable: Option<String>,
    pub estado: Option<bool>,
    /// Nombre de la sede
    pub sede: Option<String>,
    pub date_range: Option<(i64, i64)>,
    pub num_orden: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProcesosLoading {
    pub initial: bool,
    pub load_more: bool,
    pub details: bool,
    pub updating: bool,
    pub search: bool,
}

impl ProcesosLoading {
    /// La página 1 es carga inicial; las siguientes, "cargar más"
    fn set_type_fetch(&mut self, page: u32, loading: bool) {
        if page == 1 {
            self.initial = loading;
        } else {
            self.load_more = loading;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipoPagination {
    pub page: u32,
    pub limit: usize,
    pub total: usize,
    pub has_more: bool,
}

impl TipoPagination {
    pub fn new(limit: usize) -> Self {
        Self { page: 1, limit, total: 0, has_more: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipoStats {
    pub tipo: TipoProceso,
    pub total: usize,
    pub completados: usize,
    pub pendientes: usize,
    pub porcentaje: u32,
}

#[derive(Debug, Clone)]
pub struct ProcesosData {
    pub items: HashMap<String, Proceso>,
    pub by_type: HashMap<TipoProceso, HashSet<String>>,
    pub details: HashMap<String, ProcesoDetails>,
    pub filters: ProcesoFilters,
    pub loading: ProcesosLoading,
    pub pagination: HashMap<TipoProceso, TipoPagination>,
    pub caches: HashMap<TipoProceso, CacheStamp>,
    pub by_responsable: SecondaryIndex<String>,
    pub by_estado: SecondaryIndex<bool>,
    pub by_sede: SecondaryIndex<String>,
    pub by_orden: SecondaryIndex<String>,
    pub by_date: SecondaryIndex<String>,
    pub error: Option<String>,
    limit: usize,
    details_ttl_ms: i64,
}

impl ProcesosData {
    pub fn new(limit: usize, ttl_ms: i64, details_ttl_ms: i64) -> Self {
        Self {
            items: HashMap::new(),
            by_type: HashMap::new(),
            details: HashMap::new(),
            filters: ProcesoFilters::default(),
            loading: ProcesosLoading::default(),
            pagination: TipoProceso::ALL.iter().map(|t| (*t, TipoPagination::new(limit))).collect(),
            caches: TipoProceso::ALL.iter().map(|t| (*t, CacheStamp::new(ttl_ms))).collect(),
            by_responsable: SecondaryIndex::new(),
            by_estado: SecondaryIndex::new(),
            by_sede: SecondaryIndex::new(),
            by_orden: SecondaryIndex::new(),
            by_date: SecondaryIndex::new(),
            error: None,
            limit,
            details_ttl_ms,
        }
    }

    pub fn rebuild_indexes(&mut self) {
        self.by_responsable.clear();
        self.by_estado.clear();
        self.by_sede.clear();
        self.by_orden.clear();
        self.by_date.clear();

        for (id, proceso) in &self.items {
            if let Some(responsable) = &proceso.responsable {
                self.by_responsable.insert(responsable.nombre.clone(), id);
            }
            self.by_estado.insert(proceso.estado, id);
            if let Some(sede) = &proceso.sede {
                self.by_sede.insert(sede.nombre.clone(), id);
            }
            if !proceso.fecha.is_empty() {
                self.by_date.insert(date_key(&proceso.fecha), id);
            }
        }
        for (id, details) in &self.details {
            for orden in details.detalles.iter().filter_map(|d| d.num_orden.as_ref()) {
                self.by_orden.insert(orden.clone(), id);
            }
        }
    }

    /// Guarda procesos; con `clear_type` primero vacía los del tipo
    pub fn cache_procesos(&mut self, tipo: TipoProceso, procesos: Vec<Proceso>, clear_type: bool) {
        if clear_type {
            if let Some(ids) = self.by_type.remove(&tipo) {
                for id in ids {
                    self.items.remove(&id);
                }
            }
        }
        for proceso in procesos {
            self.insert_proceso(proceso);
        }
        self.rebuild_indexes();
    }

    fn insert_proceso(&mut self, proceso: Proceso) {
        self.by_type.entry(proceso.tipo).or_default().insert(proceso.id.clone());
        self.items.insert(proceso.id.clone(), proceso);
    }

    fn sorted(&self, ids: impl Iterator<Item = String>) -> Vec<Proceso> {
        let mut result: Vec<Proceso> = ids.filter_map(|id| self.items.get(&id).cloned()).collect();
        result.sort_by(|a, b| b.fecha_ms.cmp(&a.fecha_ms).then_with(|| a.id.cmp(&b.id)));
        result
    }

    /// Procesos del tipo, más recientes primero
    pub fn by_type(&self, tipo: TipoProceso) -> Vec<Proceso> {
        match self.by_type.get(&tipo) {
            Some(ids) => self.sorted(ids.iter().cloned()),
            None => Vec::new(),
        }
    }

    pub fn filtered_procesos(&self) -> Vec<Proceso> {
        let filters = &self.filters;
        let mut ids: Vec<String> = match filters.tipo {
            Some(tipo) => self.by_type.get(&tipo).map(|s| s.iter().cloned().collect()).unwrap_or_default(),
            None => self.items.keys().cloned().collect(),
        };
        if let Some(responsable) = &filters.responsable {
            self.by_responsable.retain_matching(&mut ids, responsable);
        }
        if let Some(estado) = filters.estado {
            self.by_estado.retain_matching(&mut ids, &estado);
        }
        if let Some(sede) = &filters.sede {
            self.by_sede.retain_matching(&mut ids, sede);
        }
        if let Some(orden) = filters.num_orden.as_deref().filter(|o| !o.trim().is_empty()) {
            let matching = self.by_orden.ids_matching_substring(orden.trim());
            ids.retain(|id| matching.contains(id));
        }
        if let Some((start, end)) = filters.date_range {
            ids.retain(|id| {
                self.items
                    .get(id)
                    .and_then(|p| p.fecha_ms)
                    .is_some_and(|ms| ms >= start && ms <= end)
            });
        }
        self.sorted(ids.into_iter())
    }

    pub fn stats_by_type(&self) -> Vec<TipoStats> {
        TipoProceso::ALL
            .iter()
            .map(|tipo| {
                let procesos: Vec<&Proceso> = self
                    .by_type
                    .get(tipo)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| self.items.get(id))
                    .collect();
                let total = procesos.len();
                let completados = procesos.iter().filter(|p| p.estado).count();
                TipoStats {
                    tipo: *tipo,
                    total,
                    completados,
                    pendientes: total - completados,
                    porcentaje: percentage(completados, total),
                }
            })
            .collect()
    }

    pub fn unique_responsables(&self) -> Vec<String> {
        let mut values: Vec<String> = self.by_responsable.keys().cloned().collect();
        values.sort();
        values
    }

    pub fn unique_sedes(&self) -> Vec<String> {
        let mut values: Vec<String> = self.by_sede.keys().cloned().collect();
        values.sort();
        values
    }

    pub fn valid_details(&self, proceso_id: &str, now_ms: i64) -> Option<&ProcesoDetails> {
        self.details
            .get(proceso_id)
            .filter(|details| now_ms - details.last_fetch < self.details_ttl_ms)
    }

    /// Sustituye un proceso ya cacheado por la versión del servidor
    pub fn update_proceso(&mut self, proceso_id: &str, dto: &ProcesoDto, now_ms: i64) -> bool {
        if !self.items.contains_key(proceso_id) {
            return false;
        }
        let Some(proceso) = Proceso::from_dto(dto, now_ms) else {
            return false;
        };
        if dto.detalles.is_some() {
            if let Some(details) = ProcesoDetails::from_dto(dto, now_ms) {
                self.details.insert(proceso_id.to_string(), details);
            }
        }
        if let Some(old) = self.items.get(proceso_id) {
            if old.tipo != proceso.tipo {
                if let Some(ids) = self.by_type.get_mut(&old.tipo) {
                    ids.remove(proceso_id);
                }
            }
        }
        self.insert_proceso(proceso);
        self.rebuild_indexes();
        true
    }

    /// Cambia el estado de un detalle y recalcula el resumen del proceso
    pub fn set_detail_estado(&mut self, proceso_id: &str, detalle_id: &str, estado: bool, now_ms: i64) -> bool {
        let Some(details) = self.details.get_mut(proceso_id) else {
            return false;
        };
        let Some(detalle) = details.detalles.iter_mut().find(|d| d.id == detalle_id) else {
            return false;
        };
        detalle.estado = estado;
        details.refresh_counts();
        details.proceso.last_updated = now_ms;

        if let Some(item) = self.items.get_mut(proceso_id) {
            item.detalles_count = details.proceso.detalles_count;
            item.completed_count = details.proceso.completed_count;
            item.progreso = details.proceso.progreso;
            item.last_updated = now_ms;
        }
        self.rebuild_indexes();
        true
    }

    fn remove_type(&mut self, tipo: TipoProceso) {
        if let Some(ids) = self.by_type.remove(&tipo) {
            for id in ids {
                self.items.remove(&id);
                self.details.remove(&id);
            }
        }
        if let Some(stamp) = self.caches.get_mut(&tipo) {
            stamp.invalidate();
        }
        self.pagination.insert(tipo, TipoPagination::new(self.limit));
        self.rebuild_indexes();
    }
}

pub struct ProcesosStore {
    api: ApiClient,
    service: ProcesoService,
    clock: SharedClock,
    state: ReactiveState<ProcesosData>,
    // Una generación por tipo: listar secado no invalida lavado
    generations: RefCell<HashMap<TipoProceso, RequestGeneration>>,
    initial_in_flight: Cell<usize>,
    load_more_in_flight: Cell<usize>,
    token: CancellationToken,
}

impl ProcesosStore {
    pub fn new(api: ApiClient, service: ProcesoService, clock: SharedClock) -> Self {
        Self::with_settings(api, service, clock, CONFIG.procesos_page_size, CONFIG.cache_config.procesos_ttl_ms)
    }

    /// `ttl_ms` rige los listados por tipo; los detalles usan el TTL de detalles
    pub fn with_settings(api: ApiClient, service: ProcesoService, clock: SharedClock, limit: usize, ttl_ms: i64) -> Self {
        let data = ProcesosData::new(limit, ttl_ms, CONFIG.cache_config.proceso_details_ttl_ms);
        Self {
            api,
            service,
            clock,
            state: ReactiveState::new(data),
            generations: RefCell::new(HashMap::new()),
            initial_in_flight: Cell::new(0),
            load_more_in_flight: Cell::new(0),
            token: CancellationToken::new(),
        }
    }

    pub fn with_data<R>(&self, reader: impl FnOnce(&ProcesosData) -> R) -> R {
        self.state.with(reader)
    }

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        self.state.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.state.unsubscribe(id);
    }

    pub fn get_by_id(&self, id: &str) -> Option<Proceso> {
        self.state.with(|d| d.items.get(id).cloned())
    }

    pub fn get_by_type(&self, tipo: TipoProceso) -> Vec<Proceso> {
        self.state.with(|d| d.by_type(tipo))
    }

    pub fn filtered_procesos(&self) -> Vec<Proceso> {
        self.state.with(ProcesosData::filtered_procesos)
    }

    /// Procesos de un día (`YYYY-MM-DD`)
    pub fn get_by_date(&self, date: &str) -> Vec<Proceso> {
        self.state.with(|d| match d.by_date.ids(&date.to_string()) {
            Some(ids) => d.sorted(ids.iter().cloned()),
            None => Vec::new(),
        })
    }

    pub fn stats_by_type(&self) -> Vec<TipoStats> {
        self.state.with(ProcesosData::stats_by_type)
    }

    pub fn unique_responsables(&self) -> Vec<String> {
        self.state.with(ProcesosData::unique_responsables)
    }

    pub fn unique_sedes(&self) -> Vec<String> {
        self.state.with(ProcesosData::unique_sedes)
    }

    pub fn all_items(&self) -> Vec<Proceso> {
        self.state.with(|d| d.items.values().cloned().collect())
    }

    pub fn all_details(&self) -> Vec<ProcesoDetails> {
        self.state.with(|d| d.details.values().cloned().collect())
    }

    pub fn loading(&self) -> ProcesosLoading {
        self.state.with(|d| d.loading)
    }

    pub fn error(&self) -> Option<String> {
        self.state.with(|d| d.error.clone())
    }

    pub fn pagination(&self, tipo: TipoProceso) -> Option<TipoPagination> {
        self.state.with(|d| d.pagination.get(&tipo).copied())
    }

    pub fn is_type_cache_valid(&self, tipo: TipoProceso) -> bool {
        let now = self.clock.now_ms();
        self.state.with(|d| d.caches.get(&tipo).is_some_and(|stamp| stamp.is_valid(now)))
    }

    fn is_stale(&self, tipo: TipoProceso, ticket: u64) -> bool {
        self.token.is_cancelled()
            || !self.generations.borrow().get(&tipo).is_some_and(|generation| generation.is_current(ticket))
    }

    fn in_flight_counter(&self, page: u32) -> &Cell<usize> {
        if page == 1 {
            &self.initial_in_flight
        } else {
            &self.load_more_in_flight
        }
    }

    /// Cierra un listado por tipo; devuelve si queda alguno del mismo flag en vuelo
    fn release_type_fetch(&self, page: u32) -> bool {
        let counter = self.in_flight_counter(page);
        let remaining = counter.get().saturating_sub(1);
        counter.set(remaining);
        remaining > 0
    }

    /// Página de procesos de un tipo. Ante 404 usa el listado completo legado
    pub async fn fetch_procesos_by_type(&self, tipo: TipoProceso, page: u32, force_refresh: bool) -> ApiResult<Vec<Proceso>> {
        let has_items = self.state.with(|d| d.by_type.get(&tipo).is_some_and(|ids| !ids.is_empty()));
        if !force_refresh && page == 1 && has_items && self.is_type_cache_valid(tipo) {
            log::debug!("📦 Procesos de {} servidos desde caché", tipo);
            return Ok(self.get_by_type(tipo));
        }

        let limit = self.state.with(|d| d.limit);
        let counter = self.in_flight_counter(page);
        counter.set(counter.get() + 1);
        self.state.update(|d| {
            d.loading.set_type_fetch(page, true);
            d.error = None;
        });

        let ticket = self.generations.borrow_mut().entry(tipo).or_default().next();
        let query = vec![("page".to_string(), page.to_string()), ("limit".to_string(), limit.to_string())];
        let mut result = self
            .api
            .get_with_query(format!("/procesos/tipo/{}/paginated", tipo), query)
            .await
            .map(|body| (normalize_listing(&body).into_page(), true));
        if matches!(&result, Err(e) if e.is_not_found()) {
            log::warn!("⚠️ Paginación de procesos no disponible, usando /procesos/tipo/{}", tipo);
            result = self
                .api
                .get(format!("/procesos/tipo/{}", tipo))
                .await
                .map(|body| (normalize_listing(&body).into_page(), false));
        }

        let still_loading = self.release_type_fetch(page);
        if self.is_stale(tipo, ticket) {
            log::debug!("🔄 Respuesta de procesos de {} descartada", tipo);
            self.state.update(|d| d.loading.set_type_fetch(page, still_loading));
            return Ok(self.get_by_type(tipo));
        }

        match result {
            Ok((page_data, paginated)) => {
                let now = self.clock.now_ms();
                let procesos: Vec<Proceso> = page_data
                    .decode::<ProcesoDto>()
                    .iter()
                    .filter_map(|dto| Proceso::from_dto(dto, now))
                    .collect();
                log::info!("✅ {} procesos de {} cargados (página {})", procesos.len(), tipo, page);
                self.state.update(|d| {
                    d.cache_procesos(tipo, procesos, page == 1);
                    d.pagination.insert(
                        tipo,
                        TipoPagination {
                            page,
                            limit,
                            total: page_data.total,
                            has_more: paginated && page_data.has_more,
                        },
                    );
                    if let Some(stamp) = d.caches.get_mut(&tipo) {
                        stamp.touch(now);
                    }
                    d.loading.set_type_fetch(page, still_loading);
                });
                Ok(self.get_by_type(tipo))
            }
            Err(e) => {
                log::error!("❌ Error cargando procesos de {}: {}", tipo, e);
                self.state.update(|d| {
                    d.loading.set_type_fetch(page, still_loading);
                    d.error = Some(e.user_message());
                });
                Err(e)
            }
        }
    }

    pub async fn load_more_by_type(&self, tipo: TipoProceso) -> ApiResult<Vec<Proceso>> {
        let (has_more, busy, next) = self.state.with(|d| {
            let pagination = d.pagination.get(&tipo).copied().unwrap_or_else(|| TipoPagination::new(d.limit));
            (pagination.has_more, d.loading.load_more, pagination.page + 1)
        });
        if !has_more || busy {
            return Ok(self.get_by_type(tipo));
        }
        self.fetch_procesos_by_type(tipo, next, true).await
    }

    /// Detalles completos; los vigentes se sirven desde caché
    pub async fn fetch_proceso_details(&self, proceso_id: &str) -> ApiResult<ProcesoDetails> {
        let now = self.clock.now_ms();
        if let Some(details) = self.state.with(|d| d.valid_details(proceso_id, now).cloned()) {
            return Ok(details);
        }

        self.state.update(|d| d.loading.details = true);
        let result = self.service.get_proceso_with_status(proceso_id).await.and_then(|dto| {
            ProcesoDetails::from_dto(&dto, self.clock.now_ms())
                .ok_or_else(|| ApiError::InvalidResponse(format!("Tipo de proceso desconocido: {}", dto.tipo)))
        });

        match result {
            Ok(details) => {
                let stored = details.clone();
                self.state.update(|d| {
                    d.insert_proceso(stored.proceso.clone());
                    d.details.insert(proceso_id.to_string(), stored);
                    d.rebuild_indexes();
                    d.loading.details = false;
                });
                Ok(details)
            }
            Err(e) => {
                log::error!("❌ Error cargando detalles del proceso {}: {}", proceso_id, e);
                self.state.update(|d| {
                    d.loading.details = false;
                    d.error = Some(e.user_message());
                });
                Err(e)
            }
        }
    }

    /// Con caché poblada filtra localmente; si no, consulta al servidor
    pub async fn search_procesos(&self, term: &str, tipo: Option<TipoProceso>) -> ApiResult<Vec<Proceso>> {
        let term = term.trim().to_lowercase();
        let has_items = self.state.with(|d| !d.items.is_empty());
        if has_items {
            return Ok(self.state.with(|d| {
                let orden_matches = d.by_orden.ids_matching_substring(&term);
                let candidates: Vec<String> = match tipo {
                    Some(tipo) => d.by_type.get(&tipo).map(|s| s.iter().cloned().collect()).unwrap_or_default(),
                    None => d.items.keys().cloned().collect(),
                };
                let ids = candidates.into_iter().filter(|id| {
                    term.is_empty()
                        || orden_matches.contains(id)
                        || d.items.get(id).is_some_and(|p| matches_term(p, &term))
                });
                d.sorted(ids)
            }));
        }

        let mut query = Vec::new();
        if !term.is_empty() {
            query.push(("search".to_string(), term.clone()));
        }
        if let Some(tipo) = tipo {
            query.push(("tipo".to_string(), tipo.as_str().to_string()));
        }
        self.state.update(|d| d.loading.search = true);
        let result = self.fetch_filtered_procesos(&query).await;
        self.state.update(|d| d.loading.search = false);
        result
    }

    /// Consulta `/procesos/filter` y agrega lo recibido a la caché
    pub async fn fetch_filtered_procesos(&self, query: &[(String, String)]) -> ApiResult<Vec<Proceso>> {
        let dtos = match self.service.get_filtered_procesos(query).await {
            Ok(dtos) => dtos,
            Err(e) => {
                log::error!("❌ Error en búsqueda filtrada de procesos: {}", e);
                self.state.update(|d| d.error = Some(e.user_message()));
                return Err(e);
            }
        };
        let now = self.clock.now_ms();
        let procesos: Vec<Proceso> = dtos.iter().filter_map(|dto| Proceso::from_dto(dto, now)).collect();
        let stored = procesos.clone();
        self.state.update(|d| {
            for proceso in stored {
                d.insert_proceso(proceso);
            }
            d.rebuild_indexes();
        });
        Ok(procesos)
    }

    pub fn apply_filters(&self, change: impl FnOnce(&mut ProcesoFilters)) -> Vec<Proceso> {
        self.state.update(|d| change(&mut d.filters));
        self.filtered_procesos()
    }

    pub fn clear_filters(&self) {
        self.state.update(|d| d.filters = ProcesoFilters::default());
    }

    /// Descarta los procesos del tipo y sus detalles
    pub fn invalidate_type_cache(&self, tipo: TipoProceso) {
        self.state.update(|d| d.remove_type(tipo));
        log::debug!("🔄 Caché de procesos de {} invalidada", tipo);
    }

    pub fn invalidate_all(&self) {
        self.state.update(|d| {
            for tipo in TipoProceso::ALL {
                d.remove_type(tipo);
            }
        });
    }

    /// Solo actúa si el proceso ya está en caché
    pub fn update_proceso_in_cache(&self, proceso_id: &str, dto: &ProcesoDto) -> bool {
        let now = self.clock.now_ms();
        self.state.update(|d| d.update_proceso(proceso_id, dto, now))
    }

    pub fn set_updating(&self, updating: bool) {
        self.state.update(|d| d.loading.updating = updating);
    }

    pub fn teardown(&self) {
        self.token.cancel();
        for generation in self.generations.borrow().values() {
            generation.bump();
        }
    }
}

fn matches_term(proceso: &Proceso, term: &str) -> bool {
    proceso.id.to_lowercase().contains(term)
        || proceso.responsable.as_ref().is_some_and(|r| r.nombre.to_lowercase().contains(term))
        || proceso.sede.as_ref().is_some_and(|s| s.nombre.to_lowercase().contains(term))
}

impl DetailStatusTarget for ProcesosStore {
    fn detalle(&self, proceso_id: &str, detalle_id: &str) -> Option<Detalle> {
        self.state
            .with(|d| d.details.get(proceso_id).and_then(|details| details.detalle(detalle_id).cloned()))
    }

    fn set_detail_estado(&self, proceso_id: &str, detalle_id: &str, estado: bool) {
        let now = self.clock.now_ms();
        let updated = self.state.update(|d| d.set_detail_estado(proceso_id, detalle_id, estado, now));
        if !updated {
            log::warn!("⚠️ Detalle {} no encontrado en el proceso {}", detalle_id, proceso_id);
        }
    }

    fn reconcile(&self, proceso_id: &str, outcome: &StatusUpdateOutcome) {
        if let Some(dto) = &outcome.proceso {
            self.update_proceso_in_cache(proceso_id, dto);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::RetryPolicy;
    use crate::services::api_client::HttpTransport;
    use crate::test_support::{client, ok, status, DeferredTransport, MockTransport, RecordingSleeper};
    use crate::utils::clock::ManualClock;
    use futures::executor::{block_on, LocalPool};
    use futures::task::LocalSpawnExt;
    use serde_json::{json, Value};
    use std::rc::Rc;

    fn proceso(id: &str, tipo: &str, fecha: &str, responsable: &str, estado: bool) -> Value {
        json!({
            "_id": id,
            "tipo": tipo,
            "fecha": fecha,
            "estado": estado,
            "responsable": {"_id": format!("r-{}", responsable), "nombres": responsable, "apellidos": "Paz"},
            "sede": {"_id": "s1", "nombre": "Miraflores"}
        })
    }

    fn store<T: HttpTransport + 'static>(transport: &Rc<T>) -> (ProcesosStore, ManualClock) {
        let clock = ManualClock::new(0);
        let api = client(transport);
        let service = ProcesoService::new(api.clone(), RetryPolicy::from_config(), RecordingSleeper::new());
        (ProcesosStore::with_settings(api, service, Rc::new(clock.clone()), 30, 180_000), clock)
    }

    fn lavado_page() -> Value {
        json!({
            "data": [
                proceso("p1", "lavado", "2025-06-01T10:00:00Z", "Ana", true),
                proceso("p2", "lavado", "2025-06-02T10:00:00Z", "Luis", false),
                proceso("px", "desconocido", "2025-06-02T10:00:00Z", "Luis", false),
            ],
            "pagination": {"total": 2, "hasMore": true}
        })
    }

    #[test]
    fn test_fetch_by_type_caches_and_indexes() {
        let transport = MockTransport::sequence(vec![ok(lavado_page())]);
        let (store, clock) = store(&transport);

        let procesos = block_on(store.fetch_procesos_by_type(TipoProceso::Lavado, 1, false)).unwrap();

        assert_eq!(procesos.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["p2", "p1"]);
        assert_eq!(transport.urls()[0], "http://api/procesos/tipo/lavado/paginated");
        assert_eq!(store.unique_responsables(), vec!["Ana Paz", "Luis Paz"]);
        assert_eq!(store.unique_sedes(), vec!["Miraflores"]);
        assert_eq!(store.get_by_date("2025-06-01").len(), 1);
        assert!(store.pagination(TipoProceso::Lavado).unwrap().has_more);

        let lavado = store.stats_by_type().into_iter().find(|s| s.tipo == TipoProceso::Lavado).unwrap();
        assert_eq!((lavado.total, lavado.completados, lavado.porcentaje), (2, 1, 50));

        clock.advance(1000);
        block_on(store.fetch_procesos_by_type(TipoProceso::Lavado, 1, false)).unwrap();
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_concurrent_fetches_of_different_types_both_land() {
        let transport = DeferredTransport::new();
        let (store, _) = store(&transport);
        let store = Rc::new(store);

        let mut pool = LocalPool::new();
        for tipo in [TipoProceso::Lavado, TipoProceso::Secado] {
            let task = store.clone();
            pool.spawner()
                .spawn_local(async move {
                    let _ = task.fetch_procesos_by_type(tipo, 1, false).await;
                })
                .unwrap();
        }
        pool.run_until_stalled();
        assert_eq!(transport.pending_urls().len(), 2);

        let secado = json!({"data": [proceso("s1", "secado", "2025-06-01T10:00:00Z", "Eva", false)]});
        assert!(transport.respond("/secado/", ok(secado)));
        pool.run_until_stalled();
        assert!(store.loading().initial);

        assert!(transport.respond("/lavado/", ok(lavado_page())));
        pool.run_until_stalled();

        assert!(!store.loading().initial);
        assert!(store.is_type_cache_valid(TipoProceso::Lavado));
        assert!(store.is_type_cache_valid(TipoProceso::Secado));
        assert_eq!(store.get_by_type(TipoProceso::Lavado).len(), 2);
        assert_eq!(store.get_by_type(TipoProceso::Secado).len(), 1);
    }

    #[test]
    fn test_superseded_fetch_of_same_type_is_discarded() {
        let transport = DeferredTransport::new();
        let (store, _) = store(&transport);
        let store = Rc::new(store);

        let mut pool = LocalPool::new();
        for _ in 0..2 {
            let task = store.clone();
            pool.spawner()
                .spawn_local(async move {
                    let _ = task.fetch_procesos_by_type(TipoProceso::Lavado, 1, true).await;
                })
                .unwrap();
        }
        pool.run_until_stalled();

        let older = json!({"data": [proceso("viejo", "lavado", "2025-05-01T10:00:00Z", "Ana", true)]});
        assert!(transport.respond("/lavado/", ok(older)));
        pool.run_until_stalled();
        assert!(store.get_by_type(TipoProceso::Lavado).is_empty());
        assert!(store.loading().initial);

        assert!(transport.respond("/lavado/", ok(lavado_page())));
        pool.run_until_stalled();
        assert!(!store.loading().initial);
        assert_eq!(store.get_by_type(TipoProceso::Lavado).len(), 2);
        assert!(store.get_by_id("viejo").is_none());
    }

    #[test]
    fn test_not_found_uses_legacy_listing_without_more_pages() {
        let transport = MockTransport::sequence(vec![
            status(404),
            ok(json!([proceso("s1", "secado", "2025-06-01T10:00:00Z", "Eva", false)])),
        ]);
        let (store, _) = store(&transport);

        let procesos = block_on(store.fetch_procesos_by_type(TipoProceso::Secado, 1, false)).unwrap();

        assert_eq!(procesos.len(), 1);
        assert_eq!(transport.urls()[1], "http://api/procesos/tipo/secado");
        assert!(!store.pagination(TipoProceso::Secado).unwrap().has_more);
    }

    #[test]
    fn test_filters_combine_indexes() {
        let transport = MockTransport::sequence(vec![ok(lavado_page())]);
        let (store, _) = store(&transport);
        block_on(store.fetch_procesos_by_type(TipoProceso::Lavado, 1, false)).unwrap();

        let filtered = store.apply_filters(|f| {
            f.tipo = Some(TipoProceso::Lavado);
            f.estado = Some(false);
            f.sede = Some("Miraflores".into());
        });
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "p2");

        store.clear_filters();
        let by_responsable = store.apply_filters(|f| f.responsable = Some("Ana Paz".into()));
        assert_eq!(by_responsable[0].id, "p1");
    }

    #[test]
    fn test_detail_status_updates_summary_and_invalidation_drops_type() {
        let mut with_detalles = proceso("p1", "lavado", "2025-06-01T10:00:00Z", "Ana", false);
        with_detalles["detalles"] = json!([
            {"_id": "d1", "numOrden": "NO7", "estado": false},
            {"_id": "d2", "numOrden": "NO8", "estado": true}
        ]);
        let transport = MockTransport::sequence(vec![ok(lavado_page()), ok(with_detalles)]);
        let (store, _) = store(&transport);
        block_on(store.fetch_procesos_by_type(TipoProceso::Lavado, 1, false)).unwrap();

        let details = block_on(store.fetch_proceso_details("p1")).unwrap();
        assert_eq!(details.proceso.progreso, 50);
        block_on(store.fetch_proceso_details("p1")).unwrap();
        assert_eq!(transport.call_count(), 2);

        store.set_detail_estado("p1", "d1", true);
        assert_eq!(store.get_by_id("p1").unwrap().progreso, 100);
        assert_eq!(store.detalle("p1", "d1").map(|d| d.estado), Some(true));

        let found = block_on(store.search_procesos("no7", None)).unwrap();
        assert_eq!(found.len(), 1);

        store.invalidate_type_cache(TipoProceso::Lavado);
        assert!(store.get_by_type(TipoProceso::Lavado).is_empty());
        assert!(store.detalle("p1", "d1").is_none());
    }

    #[test]
    fn test_reconcile_only_touches_cached_procesos() {
        let transport = MockTransport::sequence(vec![ok(lavado_page())]);
        let (store, _) = store(&transport);
        block_on(store.fetch_procesos_by_type(TipoProceso::Lavado, 1, false)).unwrap();

        let mut dto: ProcesoDto =
            serde_json::from_value(proceso("p2", "lavado", "2025-06-02T10:00:00Z", "Luis", true)).unwrap();
        store.reconcile("p2", &StatusUpdateOutcome { proceso: Some(dto.clone()), message: "ok".into() });
        assert!(store.get_by_id("p2").unwrap().estado);

        dto.id = "nuevo".into();
        assert!(!store.update_proceso_in_cache("nuevo", &dto));
        assert!(store.get_by_id("nuevo").is_none());
    }
}
