// ============================================================================
// DASHBOARD STORE - Métricas agregadas con TTL por métrica y auto-refresh
// ============================================================================
// Cada métrica tiene endpoint propio (o ninguno) y un cálculo local a
// partir de las cachés de operaciones y procesos cuando el servidor
// responde 404.
// ============================================================================

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::{Rc, Weak};

use futures::future::join_all;
use serde::de::DeserializeOwned;

use crate::config::{DashboardConfig, CONFIG};
use crate::error::{ApiError, ApiResult};
use crate::models::dashboard::{
    Alert, Bottleneck, DailyCount, DashboardMetrics, EmployeeMetric, Kpis, MachineStatus, MetricKind,
    ProcessDistributionEntry, Severity, SystemStatus, TimeFilter, Trends,
};
use crate::models::operacion::Operacion;
use crate::models::pagination::decode;
use crate::models::proceso::{percentage, Proceso, ProcesoDetails};
use crate::services::api_client::ApiClient;
use crate::state::reactivity::{ReactiveState, SubscriptionId};
use crate::state::ttl::CacheStamp;
use crate::stores::operaciones_store::{FetchOperacionesOptions, OperacionStats, OperacionesStore};
use crate::stores::procesos_store::{ProcesosStore, TipoStats};
use crate::utils::dates::{date_key, day_range_ms, to_iso};
use crate::utils::scheduler::{Spawner, TimerHandle, Timers};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const HOUR_MS: f64 = 60.0 * 60.0 * 1000.0;
const TREND_DAYS: i64 = 7;
const BOTTLENECK_MIN_TOTAL: usize = 5;

#[derive(Debug, Clone)]
pub struct DashboardData {
    pub metrics: DashboardMetrics,
    pub stamps: BTreeMap<MetricKind, CacheStamp>,
    pub loading: BTreeMap<MetricKind, bool>,
    pub initial_load: bool,
    pub time_filter: TimeFilter,
}

impl DashboardData {
    pub fn new(config: &DashboardConfig) -> Self {
        Self {
            metrics: DashboardMetrics::default(),
            stamps: MetricKind::ALL.iter().map(|k| (*k, CacheStamp::new(metric_ttl(config, *k)))).collect(),
            loading: MetricKind::ALL.iter().map(|k| (*k, false)).collect(),
            initial_load: false,
            time_filter: TimeFilter::default(),
        }
    }

    pub fn is_cache_valid(&self, kind: MetricKind, now_ms: i64) -> bool {
        self.metrics.has(kind) && self.stamps.get(&kind).is_some_and(|stamp| stamp.is_valid(now_ms))
    }

    fn invalidate(&mut self, kind: MetricKind) {
        if let Some(stamp) = self.stamps.get_mut(&kind) {
            stamp.invalidate();
        }
    }

    fn touch(&mut self, kind: MetricKind, now_ms: i64) {
        if let Some(stamp) = self.stamps.get_mut(&kind) {
            stamp.touch(now_ms);
        }
    }
}

pub fn metric_ttl(config: &DashboardConfig, kind: MetricKind) -> i64 {
    match kind {
        MetricKind::Kpis => config.kpis_ttl_ms,
        MetricKind::Trends => config.trends_ttl_ms,
        MetricKind::ProcessDistribution => config.process_distribution_ttl_ms,
        MetricKind::EmployeeMetrics => config.employee_metrics_ttl_ms,
        MetricKind::MachineStatus => config.machine_status_ttl_ms,
        MetricKind::Bottlenecks => config.bottlenecks_ttl_ms,
        MetricKind::Alerts => config.alerts_ttl_ms,
    }
}

/// Intervalo de auto-refresh de una métrica
pub fn refresh_interval(config: &DashboardConfig, kind: MetricKind) -> u32 {
    match kind {
        MetricKind::Kpis => config.kpis_refresh_ms,
        MetricKind::Alerts => config.alerts_refresh_ms,
        MetricKind::MachineStatus => config.machine_status_refresh_ms,
        _ => config.default_refresh_ms,
    }
}

pub struct DashboardStore {
    api: ApiClient,
    operaciones: Rc<OperacionesStore>,
    procesos: Rc<ProcesosStore>,
    timers: Timers,
    spawner: Spawner,
    config: DashboardConfig,
    state: ReactiveState<DashboardData>,
    refresh_handles: RefCell<Vec<TimerHandle>>,
}

impl DashboardStore {
    pub fn new(
        api: ApiClient,
        operaciones: Rc<OperacionesStore>,
        procesos: Rc<ProcesosStore>,
        timers: Timers,
        spawner: Spawner,
    ) -> Self {
        Self::with_config(api, operaciones, procesos, timers, spawner, CONFIG.dashboard_config.clone())
    }

    pub fn with_config(
        api: ApiClient,
        operaciones: Rc<OperacionesStore>,
        procesos: Rc<ProcesosStore>,
        timers: Timers,
        spawner: Spawner,
        config: DashboardConfig,
    ) -> Self {
        Self {
            api,
            operaciones,
            procesos,
            timers,
            spawner,
            state: ReactiveState::new(DashboardData::new(&config)),
            config,
            refresh_handles: RefCell::new(Vec::new()),
        }
    }

    // ========================================================================
    // LECTURA
    // ========================================================================

    pub fn metrics(&self) -> DashboardMetrics {
        self.state.with(|d| d.metrics.clone())
    }

    pub fn with_data<R>(&self, reader: impl FnOnce(&DashboardData) -> R) -> R {
        self.state.with(reader)
    }

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        self.state.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.state.unsubscribe(id);
    }

    pub fn is_cache_valid(&self, kind: MetricKind) -> bool {
        let now = self.timers.now_ms();
        self.state.with(|d| d.is_cache_valid(kind, now))
    }

    pub fn is_loading(&self, kind: MetricKind) -> bool {
        self.state.with(|d| d.loading.get(&kind).copied().unwrap_or(false))
    }

    pub fn is_initial_loading(&self) -> bool {
        self.state.with(|d| d.initial_load)
    }

    pub fn time_filter(&self) -> TimeFilter {
        self.state.with(|d| d.time_filter)
    }

    /// Rango (inicio, fin) en ms del filtro temporal actual
    pub fn current_date_range(&self) -> (i64, i64) {
        match self.time_filter() {
            TimeFilter::Custom { start_ms, end_ms } => (start_ms, end_ms),
            filter => day_range_ms(self.timers.now_ms(), filter.days().unwrap_or(1)),
        }
    }

    fn date_range_params(&self) -> Vec<(String, String)> {
        let (start, end) = self.current_date_range();
        vec![("startDate".to_string(), to_iso(start)), ("endDate".to_string(), to_iso(end))]
    }

    pub fn active_alerts(&self) -> Vec<Alert> {
        self.state.with(|d| d.metrics.alerts.clone().unwrap_or_default())
    }

    pub fn has_critical_alerts(&self) -> bool {
        self.state.with(|d| {
            d.metrics
                .alerts
                .iter()
                .flatten()
                .any(|alert| alert.severidad == Severity::Critical)
        })
    }

    pub fn system_status(&self) -> SystemStatus {
        self.state.with(|d| {
            let Some(kpis) = &d.metrics.kpis else {
                return SystemStatus::Loading;
            };
            let alertas = d.metrics.alerts.as_ref().map_or(0, Vec::len);
            system_status_for(kpis.eficiencia_general, alertas)
        })
    }

    // ========================================================================
    // CARGA DE MÉTRICAS
    // ========================================================================

    /// Refresca una métrica concreta
    pub async fn fetch_metric(&self, kind: MetricKind, force_refresh: bool) -> ApiResult<()> {
        match kind {
            MetricKind::Kpis => self.fetch_kpis(force_refresh).await.map(drop),
            MetricKind::Trends => self.fetch_trends(force_refresh).await.map(drop),
            MetricKind::ProcessDistribution => self.fetch_process_distribution(force_refresh).await.map(drop),
            MetricKind::EmployeeMetrics => self.fetch_employee_metrics(force_refresh).await.map(drop),
            MetricKind::MachineStatus => self.fetch_machine_status(force_refresh).await.map(drop),
            MetricKind::Bottlenecks => self.fetch_bottlenecks(force_refresh).await.map(drop),
            MetricKind::Alerts => self.fetch_alerts(force_refresh).await.map(drop),
        }
    }

    fn cached<T>(&self, kind: MetricKind, read: impl FnOnce(&DashboardMetrics) -> Option<T>) -> Option<T> {
        let now = self.timers.now_ms();
        self.state
            .with(|d| if d.is_cache_valid(kind, now) { read(&d.metrics) } else { None })
    }

    fn set_loading(&self, kind: MetricKind, loading: bool) {
        self.state.update(|d| {
            d.loading.insert(kind, loading);
        });
    }

    fn store_metric(&self, kind: MetricKind, write: impl FnOnce(&mut DashboardMetrics)) {
        let now = self.timers.now_ms();
        self.state.update(|d| {
            write(&mut d.metrics);
            d.touch(kind, now);
            d.loading.insert(kind, false);
        });
    }

    /// GET del endpoint de la métrica con el rango actual; None ante 404
    async fn fetch_remote<T: DeserializeOwned>(&self, kind: MetricKind) -> ApiResult<Option<T>> {
        let Some(endpoint) = kind.endpoint() else {
            return Ok(None);
        };
        match self.api.get_with_query(endpoint, self.date_range_params()).await {
            Ok(body) => decode(body).map(Some),
            Err(e) if e.is_not_found() => {
                log::info!("🔄 {} no disponible en el servidor, calculando localmente", kind);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn finish_with_error<T>(&self, kind: MetricKind, error: ApiError) -> ApiResult<T> {
        log::error!("❌ Error cargando {}: {}", kind, error);
        self.set_loading(kind, false);
        Err(error)
    }

    pub async fn fetch_kpis(&self, force_refresh: bool) -> ApiResult<Kpis> {
        if !force_refresh {
            if let Some(kpis) = self.cached(MetricKind::Kpis, |m| m.kpis.clone()) {
                return Ok(kpis);
            }
        }
        self.set_loading(MetricKind::Kpis, true);

        let kpis = match self.fetch_remote::<Kpis>(MetricKind::Kpis).await {
            Ok(Some(kpis)) => kpis,
            Ok(None) => match self.kpis_from_stores().await {
                Ok(kpis) => kpis,
                Err(e) => return self.finish_with_error(MetricKind::Kpis, e),
            },
            Err(e) => return self.finish_with_error(MetricKind::Kpis, e),
        };
        let stored = kpis.clone();
        self.store_metric(MetricKind::Kpis, |m| m.kpis = Some(stored));
        Ok(kpis)
    }

    pub async fn fetch_trends(&self, force_refresh: bool) -> ApiResult<Trends> {
        if !force_refresh {
            if let Some(trends) = self.cached(MetricKind::Trends, |m| m.trends.clone()) {
                return Ok(trends);
            }
        }
        self.set_loading(MetricKind::Trends, true);

        let trends = match self.fetch_remote::<Trends>(MetricKind::Trends).await {
            Ok(Some(trends)) => trends,
            Ok(None) => Trends {
                operaciones_por_dia: daily_counts(&self.operaciones.all_items(), self.timers.now_ms()),
                tiempos_por_proceso: Vec::new(),
                productividad_empleados: employee_metrics(&self.procesos.all_items()),
            },
            Err(e) => return self.finish_with_error(MetricKind::Trends, e),
        };
        let stored = trends.clone();
        self.store_metric(MetricKind::Trends, |m| m.trends = Some(stored));
        Ok(trends)
    }

    pub async fn fetch_process_distribution(&self, force_refresh: bool) -> ApiResult<Vec<ProcessDistributionEntry>> {
        if !force_refresh {
            if let Some(entries) = self.cached(MetricKind::ProcessDistribution, |m| m.process_distribution.clone()) {
                return Ok(entries);
            }
        }
        self.set_loading(MetricKind::ProcessDistribution, true);

        let entries = match self.fetch_remote::<Vec<ProcessDistributionEntry>>(MetricKind::ProcessDistribution).await {
            Ok(Some(entries)) => entries,
            Ok(None) => process_distribution(&self.procesos.stats_by_type()),
            Err(e) => return self.finish_with_error(MetricKind::ProcessDistribution, e),
        };
        let stored = entries.clone();
        self.store_metric(MetricKind::ProcessDistribution, |m| m.process_distribution = Some(stored));
        Ok(entries)
    }

    pub async fn fetch_employee_metrics(&self, force_refresh: bool) -> ApiResult<Vec<EmployeeMetric>> {
        if !force_refresh {
            if let Some(metrics) = self.cached(MetricKind::EmployeeMetrics, |m| m.employee_metrics.clone()) {
                return Ok(metrics);
            }
        }
        self.set_loading(MetricKind::EmployeeMetrics, true);

        let metrics = match self.fetch_remote::<Vec<EmployeeMetric>>(MetricKind::EmployeeMetrics).await {
            Ok(Some(metrics)) => metrics,
            Ok(None) => employee_metrics(&self.procesos.all_items()),
            Err(e) => return self.finish_with_error(MetricKind::EmployeeMetrics, e),
        };
        let stored = metrics.clone();
        self.store_metric(MetricKind::EmployeeMetrics, |m| m.employee_metrics = Some(stored));
        Ok(metrics)
    }

    /// Sin endpoint: siempre se deriva de los detalles cacheados
    pub async fn fetch_machine_status(&self, force_refresh: bool) -> ApiResult<Vec<MachineStatus>> {
        if !force_refresh {
            if let Some(machines) = self.cached(MetricKind::MachineStatus, |m| m.machine_status.clone()) {
                return Ok(machines);
            }
        }
        let machines = machine_status(&self.procesos.all_details());
        let stored = machines.clone();
        self.store_metric(MetricKind::MachineStatus, |m| m.machine_status = Some(stored));
        Ok(machines)
    }

    pub async fn fetch_bottlenecks(&self, force_refresh: bool) -> ApiResult<Vec<Bottleneck>> {
        if !force_refresh {
            if let Some(bottlenecks) = self.cached(MetricKind::Bottlenecks, |m| m.bottlenecks.clone()) {
                return Ok(bottlenecks);
            }
        }
        let bottlenecks = detect_bottlenecks(
            &self.procesos.stats_by_type(),
            self.config.alert_thresholds.eficiencia_minima,
        );
        let stored = bottlenecks.clone();
        self.store_metric(MetricKind::Bottlenecks, |m| m.bottlenecks = Some(stored));
        Ok(bottlenecks)
    }

    pub async fn fetch_alerts(&self, force_refresh: bool) -> ApiResult<Vec<Alert>> {
        if !force_refresh {
            if let Some(alerts) = self.cached(MetricKind::Alerts, |m| m.alerts.clone()) {
                return Ok(alerts);
            }
        }
        let now = self.timers.now_ms();
        let machines = self
            .state
            .with(|d| d.metrics.machine_status.clone())
            .unwrap_or_else(|| machine_status(&self.procesos.all_details()));
        let alerts = generate_alerts(&self.operaciones.all_items(), &machines, &self.config, now);
        if !alerts.is_empty() {
            log::warn!("⚠️ {} alertas activas", alerts.len());
        }
        let stored = alerts.clone();
        self.store_metric(MetricKind::Alerts, |m| m.alerts = Some(stored));
        Ok(alerts)
    }

    /// KPIs locales; carga operaciones si la caché está vacía
    async fn kpis_from_stores(&self) -> ApiResult<Kpis> {
        if self.operaciones.stats().total == 0 {
            self.operaciones.fetch_operaciones(FetchOperacionesOptions::default()).await?;
        }
        Ok(kpis_from(
            &self.operaciones.all_items(),
            &self.operaciones.stats(),
            self.timers.now_ms(),
        ))
    }

    /// Ejecuta varias métricas a la vez; devuelve solo las que fallaron
    async fn fetch_many(&self, kinds: &[MetricKind], force_refresh: bool) -> Vec<(MetricKind, ApiError)> {
        let results = join_all(kinds.iter().map(|kind| self.fetch_metric(*kind, force_refresh))).await;
        kinds
            .iter()
            .zip(results)
            .filter_map(|(kind, result)| result.err().map(|e| (*kind, e)))
            .collect()
    }

    // ========================================================================
    // CICLO DE VIDA
    // ========================================================================

    /// Carga inicial (KPIs, distribución, alertas) y arranque del auto-refresh
    pub async fn initialize_dashboard(self: &Rc<Self>) -> Vec<(MetricKind, ApiError)> {
        self.state.update(|d| d.initial_load = true);
        let errors = self
            .fetch_many(&[MetricKind::Kpis, MetricKind::ProcessDistribution, MetricKind::Alerts], false)
            .await;
        self.start_auto_refresh();
        self.state.update(|d| d.initial_load = false);
        log::info!("✅ Dashboard inicializado ({} errores)", errors.len());
        errors
    }

    pub async fn refresh_all_metrics(&self) -> Vec<(MetricKind, ApiError)> {
        self.state.update(|d| d.initial_load = true);
        let errors = self.fetch_many(&MetricKind::ALL, true).await;
        self.state.update(|d| d.initial_load = false);
        errors
    }

    /// Cambia el rango temporal, invalida lo dependiente y recarga
    pub async fn set_time_filter(&self, filter: TimeFilter) -> Vec<(MetricKind, ApiError)> {
        self.state.update(|d| {
            d.time_filter = filter;
            for kind in MetricKind::TIME_DEPENDENT {
                d.invalidate(kind);
            }
        });
        log::info!("🔍 Filtro temporal: {}", filter.label());
        self.fetch_many(&[MetricKind::Kpis, MetricKind::Trends, MetricKind::ProcessDistribution], true)
            .await
    }

    /// Un intervalo por métrica auto-refrescada; reemplaza los anteriores
    pub fn start_auto_refresh(self: &Rc<Self>) {
        self.stop_auto_refresh();
        if !self.config.auto_refresh_enabled {
            return;
        }

        let mut handles = Vec::new();
        for kind in MetricKind::AUTO_REFRESHED {
            let weak: Weak<Self> = Rc::downgrade(self);
            let spawner = self.spawner.clone();
            let handle = self.timers.schedule_interval(refresh_interval(&self.config, kind), move || {
                let Some(store) = weak.upgrade() else { return };
                spawner(Box::pin(async move {
                    if let Err(e) = store.fetch_metric(kind, true).await {
                        log::warn!("⚠️ Auto-refresh de {} falló: {}", kind, e);
                    }
                }));
            });
            handles.push(handle);
        }
        *self.refresh_handles.borrow_mut() = handles;
    }

    pub fn stop_auto_refresh(&self) {
        self.refresh_handles.borrow_mut().clear();
    }

    pub fn is_auto_refreshing(&self) -> bool {
        !self.refresh_handles.borrow().is_empty()
    }

    pub fn clear_cache(&self) {
        self.state.update(|d| {
            for kind in MetricKind::ALL {
                d.metrics.clear(kind);
                d.invalidate(kind);
            }
        });
    }

    pub fn destroy(&self) {
        self.stop_auto_refresh();
        self.clear_cache();
    }
}

// ============================================================================
// CÁLCULOS LOCALES
// ============================================================================

pub fn system_status_for(eficiencia: f64, alertas: usize) -> SystemStatus {
    if alertas > 5 || eficiencia < 60.0 {
        SystemStatus::Critical
    } else if alertas > 2 || eficiencia < 80.0 {
        SystemStatus::Warning
    } else {
        SystemStatus::Good
    }
}

fn day_of(millis: i64) -> String {
    date_key(&to_iso(millis))
}

pub fn kpis_from(operaciones: &[Operacion], stats: &OperacionStats, now_ms: i64) -> Kpis {
    let today = day_of(now_ms);
    let completadas_hoy = operaciones
        .iter()
        .filter(|op| op.estado_operacion && op.created_ms > 0 && day_of(op.created_ms) == today)
        .count();

    let durations: Vec<f64> = operaciones
        .iter()
        .filter_map(|op| match (op.fechas.inicio_ms, op.fechas.final_ms) {
            (Some(inicio), Some(fin)) if fin > inicio => Some((fin - inicio) as f64 / HOUR_MS),
            _ => None,
        })
        .collect();
    let tiempo_promedio = if durations.is_empty() {
        0.0
    } else {
        let avg = durations.iter().sum::<f64>() / durations.len() as f64;
        (avg * 10.0).round() / 10.0
    };

    Kpis {
        operaciones_activas: stats.pendientes as u32,
        completadas_hoy: completadas_hoy as u32,
        tiempo_promedio,
        eficiencia_general: f64::from(stats.porcentaje_completado),
        tendencias: BTreeMap::new(),
    }
}

/// Operaciones creadas y completadas por día, últimos 7 días (más antiguo primero)
pub fn daily_counts(operaciones: &[Operacion], now_ms: i64) -> Vec<DailyCount> {
    (0..TREND_DAYS)
        .rev()
        .map(|offset| {
            let date = day_of(now_ms - offset * DAY_MS);
            let del_dia: Vec<&Operacion> = operaciones
                .iter()
                .filter(|op| op.created_ms > 0 && day_of(op.created_ms) == date)
                .collect();
            DailyCount {
                operaciones: del_dia.len() as u32,
                completadas: del_dia.iter().filter(|op| op.estado_operacion).count() as u32,
                date,
            }
        })
        .collect()
}

pub fn process_distribution(stats: &[TipoStats]) -> Vec<ProcessDistributionEntry> {
    stats
        .iter()
        .map(|s| ProcessDistributionEntry {
            tipo: s.tipo.as_str().to_string(),
            total: s.total as u32,
            completados: s.completados as u32,
            pendientes: s.pendientes as u32,
            porcentaje: s.porcentaje,
        })
        .collect()
}

/// Procesos por responsable y su porcentaje completado, mayor carga primero
pub fn employee_metrics(procesos: &[Proceso]) -> Vec<EmployeeMetric> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    for proceso in procesos {
        let Some(responsable) = &proceso.responsable else { continue };
        let entry = counts.entry(responsable.nombre.clone()).or_default();
        entry.0 += 1;
        if proceso.estado {
            entry.1 += 1;
        }
    }
    let mut metrics: Vec<EmployeeMetric> = counts
        .into_iter()
        .map(|(nombre, (total, completados))| EmployeeMetric {
            nombre,
            operaciones: total as u32,
            eficiencia: percentage(completados, total),
        })
        .collect();
    metrics.sort_by(|a, b| b.operaciones.cmp(&a.operaciones).then_with(|| a.nombre.cmp(&b.nombre)));
    metrics
}

/// Utilización = porcentaje de detalles pendientes asignados a la máquina
pub fn machine_status(details: &[ProcesoDetails]) -> Vec<MachineStatus> {
    let mut machines: BTreeMap<String, (MachineStatus, usize, usize)> = BTreeMap::new();
    for detalle in details.iter().flat_map(|d| d.detalles.iter()) {
        let Some(maquina) = detalle.maquina.as_ref().filter(|m| !m.id.is_empty()) else {
            continue;
        };
        let entry = machines.entry(maquina.id.clone()).or_insert_with(|| {
            (
                MachineStatus {
                    id: maquina.id.clone(),
                    nombre: maquina.nombre.clone(),
                    tipo: maquina.tipo.clone().unwrap_or_default(),
                    ..MachineStatus::default()
                },
                0,
                0,
            )
        });
        entry.1 += 1;
        if !detalle.estado {
            entry.2 += 1;
        }
    }
    machines
        .into_values()
        .map(|(mut status, total, pendientes)| {
            status.utilizacion = percentage(pendientes, total);
            status.estado = if pendientes > 0 { "operativa" } else { "disponible" }.to_string();
            status
        })
        .collect()
}

pub fn detect_bottlenecks(stats: &[TipoStats], eficiencia_minima: f64) -> Vec<Bottleneck> {
    stats
        .iter()
        .filter(|s| f64::from(s.porcentaje) < eficiencia_minima && s.total > BOTTLENECK_MIN_TOTAL)
        .map(|s| Bottleneck {
            tipo: "proceso_lento".to_string(),
            proceso: s.tipo.as_str().to_string(),
            descripcion: format!("El proceso de {} tiene baja eficiencia ({}%)", s.tipo, s.porcentaje),
            severidad: Severity::Warning,
            sugerencia: format!("Revisar asignación de recursos para {}", s.tipo),
        })
        .collect()
}

/// Operaciones abiertas más allá del tiempo máximo y máquinas saturadas
pub fn generate_alerts(
    operaciones: &[Operacion],
    machines: &[MachineStatus],
    config: &DashboardConfig,
    now_ms: i64,
) -> Vec<Alert> {
    let thresholds = &config.alert_thresholds;
    let max_hours = thresholds.tiempo_maximo_proceso_ms as f64 / HOUR_MS;

    let mut alerts: Vec<Alert> = operaciones
        .iter()
        .filter(|op| !op.estado_operacion && op.created_ms > 0)
        .filter(|op| now_ms - op.created_ms > thresholds.tiempo_maximo_proceso_ms)
        .map(|op| Alert {
            id: format!("alert_op_{}", op.id),
            tipo: "retraso".to_string(),
            titulo: "Operación retrasada".to_string(),
            descripcion: format!("La operación #{} lleva más de {} horas en proceso", op.id, max_hours),
            severidad: Severity::Warning,
            timestamp: now_ms,
            operacion_id: Some(op.id.clone()),
            maquina_id: None,
        })
        .collect();
    alerts.sort_by(|a, b| a.id.cmp(&b.id));

    alerts.extend(
        machines
            .iter()
            .filter(|m| f64::from(m.utilizacion) > thresholds.capacidad_maxima_maquina)
            .map(|m| Alert {
                id: format!("alert_maq_{}", m.id),
                tipo: "maquina".to_string(),
                titulo: "Máquina con alta utilización".to_string(),
                descripcion: format!("La máquina {} está al {}% de capacidad", m.id, m.utilizacion),
                severidad: Severity::Critical,
                timestamp: now_ms,
                operacion_id: None,
                maquina_id: Some(m.id.clone()),
            }),
    );
    alerts
}
