// ============================================================================
// USE DASHBOARD METRICS - Fachada del dashboard para las vistas
// ============================================================================
// Envuelve el DashboardStore con errores por métrica, utilidades de
// formato y análisis derivados (cuellos de botella, insights, tarjetas KPI).
// ============================================================================

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::error::{ApiError, ApiResult};
use crate::models::dashboard::{Alert, Kpis, KpiTrend, MetricKind, Severity, SystemStatus, TimeFilter, TrendDirection};
use crate::stores::dashboard_store::DashboardStore;
use crate::utils::clock::SharedClock;

const BOTTLENECK_THRESHOLD: u32 = 70;

/// Clave del mapa de errores: una métrica o una acción general
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorKey {
    Metric(MetricKind),
    Initialization,
    RefreshAll,
    TimeFilter,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricTrend {
    /// Variación porcentual absoluta con un decimal
    pub change: String,
    pub trend: TrendDirection,
    pub is_positive: bool,
    pub is_negative: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricFormat {
    Number,
    Percentage,
    Currency,
    /// Horas
    Time,
    /// Milisegundos
    Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BottleneckInsight {
    pub tipo: String,
    pub eficiencia: u32,
    pub impacto: String,
    pub recomendacion: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceInsight {
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub action: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KpiCard {
    pub key: &'static str,
    pub title: &'static str,
    pub value: f64,
    pub format: MetricFormat,
    pub icon: &'static str,
    pub color: &'static str,
    pub trend: Option<KpiTrend>,
}

pub struct DashboardMetricsHandle {
    store: Rc<DashboardStore>,
    clock: SharedClock,
    is_refreshing: Cell<bool>,
    last_refresh: Cell<Option<i64>>,
    errors: RefCell<BTreeMap<ErrorKey, ApiError>>,
}

impl DashboardMetricsHandle {
    pub fn new(store: Rc<DashboardStore>, clock: SharedClock) -> Self {
        Self {
            store,
            clock,
            is_refreshing: Cell::new(false),
            last_refresh: Cell::new(None),
            errors: RefCell::new(BTreeMap::new()),
        }
    }

    pub fn store(&self) -> &Rc<DashboardStore> {
        &self.store
    }

    pub fn is_refreshing(&self) -> bool {
        self.is_refreshing.get()
    }

    pub fn last_refresh(&self) -> Option<i64> {
        self.last_refresh.get()
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.borrow().is_empty()
    }

    pub fn error(&self, key: ErrorKey) -> Option<ApiError> {
        self.errors.borrow().get(&key).cloned()
    }

    pub fn errors(&self) -> BTreeMap<ErrorKey, ApiError> {
        self.errors.borrow().clone()
    }

    fn mark_refreshed(&self) {
        self.last_refresh.set(Some(self.clock.now_ms()));
    }

    fn record_metric_errors(&self, failures: Vec<(MetricKind, ApiError)>) {
        let mut errors = self.errors.borrow_mut();
        for (kind, error) in failures {
            errors.insert(ErrorKey::Metric(kind), error);
        }
    }

    pub async fn initialize(&self) {
        let failures = self.store.initialize_dashboard().await;
        self.errors.borrow_mut().clear();
        if failures.is_empty() {
            self.mark_refreshed();
        } else {
            log::error!("❌ Error inicializando dashboard ({} métricas fallaron)", failures.len());
            if let Some((_, first)) = failures.first() {
                self.errors.borrow_mut().insert(ErrorKey::Initialization, first.clone());
            }
            self.record_metric_errors(failures);
        }
    }

    /// No hace nada mientras hay un refresco general en curso
    pub async fn refresh_metric(&self, kind: MetricKind, force_refresh: bool) -> ApiResult<()> {
        if self.is_refreshing.get() {
            return Ok(());
        }
        self.errors.borrow_mut().remove(&ErrorKey::Metric(kind));
        match self.store.fetch_metric(kind, force_refresh).await {
            Ok(()) => {
                self.mark_refreshed();
                Ok(())
            }
            Err(e) => {
                log::error!("❌ Error refrescando {}: {}", kind, e);
                self.errors.borrow_mut().insert(ErrorKey::Metric(kind), e.clone());
                Err(e)
            }
        }
    }

    pub async fn refresh_all_metrics(&self) {
        if self.is_refreshing.get() {
            return;
        }
        self.is_refreshing.set(true);
        let failures = self.store.refresh_all_metrics().await;
        self.errors.borrow_mut().clear();
        if let Some((_, first)) = failures.first() {
            self.errors.borrow_mut().insert(ErrorKey::RefreshAll, first.clone());
        }
        self.record_metric_errors(failures);
        self.mark_refreshed();
        self.is_refreshing.set(false);
    }

    pub async fn set_time_filter(&self, filter: TimeFilter) {
        let failures = self.store.set_time_filter(filter).await;
        if let Some((_, first)) = failures.first() {
            self.errors.borrow_mut().insert(ErrorKey::TimeFilter, first.clone());
        }
        self.record_metric_errors(failures);
        self.mark_refreshed();
    }

    pub fn kpis(&self) -> Option<Kpis> {
        self.store.with_data(|d| d.metrics.kpis.clone())
    }

    pub fn system_status(&self) -> SystemStatus {
        self.store.system_status()
    }

    pub fn critical_alerts(&self) -> Vec<Alert> {
        self.store
            .active_alerts()
            .into_iter()
            .filter(|alert| alert.severidad == Severity::Critical)
            .collect()
    }

    /// Distribuciones por debajo del umbral de eficiencia
    pub fn analyze_bottlenecks(&self) -> Vec<BottleneckInsight> {
        self.store.with_data(|d| {
            d.metrics
                .process_distribution
                .iter()
                .flatten()
                .filter(|entry| entry.porcentaje < BOTTLENECK_THRESHOLD)
                .map(|entry| BottleneckInsight {
                    tipo: entry.tipo.clone(),
                    eficiencia: entry.porcentaje,
                    impacto: "high".to_string(),
                    recomendacion: format!("Revisar asignación de recursos para {}", entry.tipo),
                })
                .collect()
        })
    }

    pub fn performance_insights(&self) -> Vec<PerformanceInsight> {
        self.kpis().map(|kpis| performance_insights(&kpis)).unwrap_or_default()
    }

    pub fn kpi_cards(&self) -> Vec<KpiCard> {
        self.kpis().map(|kpis| kpi_cards(&kpis)).unwrap_or_default()
    }

    /// Fin de vida de la vista: para el auto-refresh y limpia la caché
    pub fn teardown(&self) {
        self.store.destroy();
    }
}

pub fn performance_insights(kpis: &Kpis) -> Vec<PerformanceInsight> {
    let mut insights = Vec::new();
    if kpis.eficiencia_general < 70.0 {
        insights.push(PerformanceInsight {
            severity: Severity::Warning,
            title: "Eficiencia Baja".to_string(),
            description: "La eficiencia general está por debajo del 70%".to_string(),
            action: "Revisar procesos con mayor tiempo de ejecución".to_string(),
        });
    }
    if kpis.operaciones_activas > 50 {
        insights.push(PerformanceInsight {
            severity: Severity::Info,
            title: "Alta Carga de Trabajo".to_string(),
            description: "Hay muchas operaciones activas simultáneamente".to_string(),
            action: "Considerar redistribuir la carga de trabajo".to_string(),
        });
    }
    if kpis.tiempo_promedio > 4.0 {
        insights.push(PerformanceInsight {
            severity: Severity::Warning,
            title: "Tiempo Promedio Alto".to_string(),
            description: "Las operaciones están tomando más tiempo del esperado".to_string(),
            action: "Identificar cuellos de botella en los procesos".to_string(),
        });
    }
    insights
}

pub fn efficiency_color(eficiencia: f64) -> &'static str {
    if eficiencia >= 90.0 {
        "success"
    } else if eficiencia >= 75.0 {
        "warning"
    } else if eficiencia >= 60.0 {
        "orange"
    } else {
        "error"
    }
}

pub fn kpi_cards(kpis: &Kpis) -> Vec<KpiCard> {
    let trend = |key: &str| kpis.tendencias.get(key).cloned();
    vec![
        KpiCard {
            key: "operacionesActivas",
            title: "Operaciones Activas",
            value: f64::from(kpis.operaciones_activas),
            format: MetricFormat::Number,
            icon: "mdi-cog-play",
            color: "primary",
            trend: trend("operacionesActivas"),
        },
        KpiCard {
            key: "completadasHoy",
            title: "Completadas Hoy",
            value: f64::from(kpis.completadas_hoy),
            format: MetricFormat::Number,
            icon: "mdi-check-circle",
            color: "success",
            trend: trend("completadasHoy"),
        },
        KpiCard {
            key: "tiempoPromedio",
            title: "Tiempo Promedio",
            value: kpis.tiempo_promedio,
            format: MetricFormat::Time,
            icon: "mdi-clock-outline",
            color: "info",
            trend: trend("tiempoPromedio"),
        },
        KpiCard {
            key: "eficienciaGeneral",
            title: "Eficiencia General",
            value: kpis.eficiencia_general,
            format: MetricFormat::Percentage,
            icon: "mdi-speedometer",
            color: efficiency_color(kpis.eficiencia_general),
            trend: trend("eficienciaGeneral"),
        },
    ]
}

/// Variación respecto al valor previo; None si no hay base de comparación
pub fn metric_trend(current: f64, previous: f64) -> Option<MetricTrend> {
    if previous == 0.0 {
        return None;
    }
    let change = (current - previous) / previous * 100.0;
    let trend = if change > 0.0 {
        TrendDirection::Up
    } else if change < 0.0 {
        TrendDirection::Down
    } else {
        TrendDirection::Neutral
    };
    Some(MetricTrend {
        change: format!("{:.1}", change.abs()),
        trend,
        is_positive: change > 0.0,
        is_negative: change < 0.0,
    })
}

/// Formato de presentación en convención es-ES; "-" si no hay valor
pub fn format_metric_value(value: Option<f64>, format: MetricFormat) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    match format {
        MetricFormat::Number => format_es_number(value, 3, false),
        MetricFormat::Percentage => format!("{:.1}%", value),
        MetricFormat::Currency => format!("{} COP", format_es_number(value, 2, true)),
        MetricFormat::Time if value < 1.0 => format!("{}min", (value * 60.0).round()),
        MetricFormat::Time => format!("{:.1}h", value),
        MetricFormat::Duration => {
            let millis = value.max(0.0) as i64;
            format!("{}h {}m", millis / 3_600_000, (millis % 3_600_000) / 60_000)
        }
    }
}

/// Miles con punto (solo desde 5 cifras) y decimales con coma
fn format_es_number(value: f64, max_decimals: usize, fixed_decimals: bool) -> String {
    let formatted = format!("{:.*}", max_decimals, value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), ""));
    let frac = if fixed_decimals { frac_part } else { frac_part.trim_end_matches('0') };

    let grouped = if int_part.len() > 4 {
        let mut out = String::new();
        for (i, digit) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                out.push('.');
            }
            out.push(digit);
        }
        out
    } else {
        int_part.to_string()
    };

    let sign = if value < 0.0 && (int_part != "0" || !frac.is_empty()) { "-" } else { "" };
    if frac.is_empty() {
        format!("{}{}", sign, grouped)
    } else {
        format!("{}{},{}", sign, grouped, frac)
    }
}
