// ============================================================================
// APP CONTEXT - Stores y servicios compartidos de la aplicación
// ============================================================================
// Se construye una vez al arrancar y se pasa explícitamente a las vistas.
// Todos los stores comparten el mismo ApiClient (y por tanto el token).
// ============================================================================

use std::rc::Rc;

use crate::hooks::use_dashboard_metrics::DashboardMetricsHandle;
use crate::hooks::use_lazy_loading::{api_fetcher, LazyLoader, LazyOptions};
use crate::hooks::use_optimistic_updates::{DetailStatusTarget, OptimisticUpdater};
use crate::models::operacion::OperacionDto;
use crate::services::api_client::ApiClient;
use crate::services::proceso_service::ProcesoService;
use crate::state::page_cache::PageCache;
use crate::stores::auth_store::AuthStore;
use crate::stores::dashboard_store::DashboardStore;
use crate::stores::operaciones_store::OperacionesStore;
use crate::stores::procesos_store::ProcesosStore;
use crate::utils::scheduler::{browser_spawner, Spawner, Timers};
use crate::utils::storage::{LocalStorage, SharedStorage};

pub struct AppContext {
    pub api: ApiClient,
    pub timers: Timers,
    pub spawner: Spawner,
    pub page_cache: PageCache,
    pub proceso_service: ProcesoService,
    pub auth: Rc<AuthStore>,
    pub operaciones: Rc<OperacionesStore>,
    pub procesos: Rc<ProcesosStore>,
    pub dashboard: Rc<DashboardStore>,
    pub optimistic: Rc<OptimisticUpdater>,
}

impl AppContext {
    pub fn new(
        api: ApiClient,
        proceso_service: ProcesoService,
        storage: SharedStorage,
        timers: Timers,
        spawner: Spawner,
    ) -> Self {
        let clock = timers.clock.clone();
        let auth = Rc::new(AuthStore::new(api.clone(), storage, clock.clone()));
        let operaciones = Rc::new(OperacionesStore::new(api.clone(), clock.clone()));
        let procesos = Rc::new(ProcesosStore::new(api.clone(), proceso_service.clone(), clock.clone()));
        let dashboard = Rc::new(DashboardStore::new(
            api.clone(),
            operaciones.clone(),
            procesos.clone(),
            timers.clone(),
            spawner.clone(),
        ));
        let target: Rc<dyn DetailStatusTarget> = procesos.clone();
        let optimistic = Rc::new(OptimisticUpdater::new(proceso_service.clone(), target, clock.clone()));

        Self {
            api,
            page_cache: PageCache::from_config(clock),
            timers,
            spawner,
            proceso_service,
            auth,
            operaciones,
            procesos,
            dashboard,
            optimistic,
        }
    }

    /// Contexto del navegador: fetch real, localStorage y timers de gloo
    pub fn browser() -> Self {
        let api = ApiClient::browser();
        let service = ProcesoService::browser(api.clone());
        Self::new(api, service, Rc::new(LocalStorage), Timers::browser(), browser_spawner())
    }

    /// Restaura la sesión y arranca el dashboard (con auto-refresh) si hay token vigente
    pub fn start(&self) -> bool {
        if !self.auth.check_auth() {
            log::info!("🔍 Sin sesión guardada");
            return false;
        }
        log::info!("✅ Sesión restaurada: {}", self.auth.company_legal_name());
        let dashboard = self.dashboard.clone();
        (self.spawner)(Box::pin(async move {
            let failures = dashboard.initialize_dashboard().await;
            if !failures.is_empty() {
                log::warn!("⚠️ Dashboard inicializado con {} métricas fallidas", failures.len());
            }
        }));
        true
    }

    /// Lista perezosa de operaciones sobre la PageCache compartida
    pub fn operaciones_loader(&self) -> LazyLoader<OperacionDto> {
        let options = LazyOptions { cache_key: Some("operaciones".to_string()), ..LazyOptions::default() };
        LazyLoader::new(
            options,
            api_fetcher(self.api.clone(), "/operacion/paginated"),
            Some(self.page_cache.clone()),
            self.timers.clock.clone(),
        )
    }

    pub fn dashboard_metrics(&self) -> DashboardMetricsHandle {
        DashboardMetricsHandle::new(self.dashboard.clone(), self.timers.clock.clone())
    }

    /// Cierra la sesión y vacía todas las cachés
    pub fn logout(&self) {
        self.teardown();
        self.auth.logout();
    }

    pub fn teardown(&self) {
        self.dashboard.destroy();
        self.operaciones.teardown();
        self.procesos.teardown();
        self.page_cache.clear();
        self.optimistic.clear_all_errors();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth_service::make_token;
    use crate::services::retry::RetryPolicy;
    use crate::test_support::{client, local_spawner, manual_timers, ok, MockTransport, RecordingSleeper};
    use crate::utils::constants::TOKEN_STORAGE_KEY;
    use crate::utils::storage::{KeyValueStorage, MemoryStorage};
    use futures::executor::block_on;
    use serde_json::json;

    fn proceso_with_detail() -> serde_json::Value {
        json!({
            "_id": "p1",
            "tipo": "lavado",
            "fecha": "2025-06-01T10:00:00Z",
            "estado": false,
            "detalles": [{"_id": "d1", "numOrden": "NO1", "cantidad": 4.5, "estado": false}]
        })
    }

    #[test]
    fn test_stores_share_the_session_token() {
        let token = make_token(json!({"companyId": "c1", "nombreLegal": "Lavandería SAC", "exp": 10_000}));
        let transport = MockTransport::new(|_, _| ok(json!({"data": [], "pagination": {"total": 0, "hasMore": false}})));
        let api = client(&transport);
        let service = ProcesoService::new(api.clone(), RetryPolicy::default(), RecordingSleeper::new());
        let storage = MemoryStorage::new();
        storage.set_item(TOKEN_STORAGE_KEY, &token).unwrap();
        let (_scheduler, timers) = manual_timers();
        let (_pool, spawner) = local_spawner();
        let context = AppContext::new(api, service, Rc::new(storage), timers, spawner);

        assert!(context.auth.check_auth());
        block_on(context.operaciones.fetch_operaciones(Default::default())).unwrap();

        let (_, request) = transport.calls().pop().unwrap();
        assert_eq!(request.header("Authorization"), Some(format!("Bearer {}", token).as_str()));
    }

    #[test]
    fn test_optimistic_updater_writes_through_procesos_store() {
        let transport = MockTransport::new(|url, _| {
            if url.ends_with("/procesos/p1") {
                ok(proceso_with_detail())
            } else {
                ok(json!({"message": "ok"}))
            }
        });
        let api = client(&transport);
        let service = ProcesoService::new(api.clone(), RetryPolicy::default(), RecordingSleeper::new());
        let (_scheduler, timers) = manual_timers();
        let (_pool, spawner) = local_spawner();
        let context = AppContext::new(api, service, Rc::new(MemoryStorage::new()), timers, spawner);

        block_on(context.procesos.fetch_proceso_details("p1")).unwrap();
        block_on(context.optimistic.update_detail_status("p1", "d1", true)).unwrap();

        assert_eq!(context.procesos.detalle("p1", "d1").map(|d| d.estado), Some(true));
        assert_eq!(context.optimistic.pending_count(), 0);
    }
}
