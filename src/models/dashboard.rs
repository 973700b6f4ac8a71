use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Métricas del dashboard; cada una con su TTL y su fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MetricKind {
    Kpis,
    Trends,
    ProcessDistribution,
    EmployeeMetrics,
    MachineStatus,
    Bottlenecks,
    Alerts,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Kpis,
        MetricKind::Trends,
        MetricKind::ProcessDistribution,
        MetricKind::EmployeeMetrics,
        MetricKind::MachineStatus,
        MetricKind::Bottlenecks,
        MetricKind::Alerts,
    ];

    /// Métricas que dependen del rango de fechas
    pub const TIME_DEPENDENT: [MetricKind; 4] = [
        MetricKind::Kpis,
        MetricKind::Trends,
        MetricKind::ProcessDistribution,
        MetricKind::EmployeeMetrics,
    ];

    /// Métricas refrescadas periódicamente mientras el dashboard está montado
    pub const AUTO_REFRESHED: [MetricKind; 3] = [MetricKind::Kpis, MetricKind::Alerts, MetricKind::MachineStatus];

    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::Kpis => "kpis",
            MetricKind::Trends => "trends",
            MetricKind::ProcessDistribution => "processDistribution",
            MetricKind::EmployeeMetrics => "employeeMetrics",
            MetricKind::MachineStatus => "machineStatus",
            MetricKind::Bottlenecks => "bottlenecks",
            MetricKind::Alerts => "alerts",
        }
    }

    /// Endpoint remoto, si la métrica tiene uno
    pub fn endpoint(&self) -> Option<&'static str> {
        match self {
            MetricKind::Kpis => Some("/dashboard/kpis"),
            MetricKind::Trends => Some("/dashboard/trends"),
            MetricKind::ProcessDistribution => Some("/dashboard/process-distribution"),
            MetricKind::EmployeeMetrics => Some("/dashboard/employee-metrics"),
            _ => None,
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Up,
    Down,
    #[default]
    Neutral,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct KpiTrend {
    #[serde(default)]
    pub change: f64,
    #[serde(default)]
    pub trend: TrendDirection,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Kpis {
    pub operaciones_activas: u32,
    pub completadas_hoy: u32,
    /// Horas
    pub tiempo_promedio: f64,
    pub eficiencia_general: f64,
    pub tendencias: BTreeMap<String, KpiTrend>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyCount {
    pub date: String,
    pub operaciones: u32,
    pub completadas: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessTime {
    pub proceso: String,
    pub tiempo: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Trends {
    pub operaciones_por_dia: Vec<DailyCount>,
    pub tiempos_por_proceso: Vec<ProcessTime>,
    pub productividad_empleados: Vec<EmployeeMetric>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessDistributionEntry {
    pub tipo: String,
    pub total: u32,
    pub completados: u32,
    pub pendientes: u32,
    pub porcentaje: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EmployeeMetric {
    pub nombre: String,
    pub operaciones: u32,
    pub eficiencia: u32,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineStatus {
    pub id: String,
    pub nombre: String,
    pub tipo: String,
    pub estado: String,
    pub utilizacion: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Info,
    Success,
    Warning,
    Critical,
}

impl Severity {
    pub fn color(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Critical => "error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub tipo: String,
    pub proceso: String,
    pub descripcion: String,
    pub severidad: Severity,
    pub sugerencia: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Alert {
    pub id: String,
    pub tipo: String,
    pub titulo: String,
    pub descripcion: String,
    pub severidad: Severity,
    pub timestamp: i64,
    pub operacion_id: Option<String>,
    pub maquina_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemStatus {
    Loading,
    Critical,
    Warning,
    Good,
}

impl SystemStatus {
    pub fn color(&self) -> &'static str {
        match self {
            SystemStatus::Good => "success",
            SystemStatus::Warning => "warning",
            SystemStatus::Critical => "error",
            SystemStatus::Loading => "grey",
        }
    }
}

/// Filtro temporal del dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimeFilter {
    #[default]
    Today,
    Week,
    Month,
    Quarter,
    Custom { start_ms: i64, end_ms: i64 },
}

impl TimeFilter {
    pub fn days(&self) -> Option<u32> {
        match self {
            TimeFilter::Today => Some(1),
            TimeFilter::Week => Some(7),
            TimeFilter::Month => Some(30),
            TimeFilter::Quarter => Some(90),
            TimeFilter::Custom { .. } => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TimeFilter::Today => "Hoy",
            TimeFilter::Week => "Esta Semana",
            TimeFilter::Month => "Este Mes",
            TimeFilter::Quarter => "Este Trimestre",
            TimeFilter::Custom { .. } => "Personalizado",
        }
    }
}

/// Valores cacheados de cada métrica
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardMetrics {
    pub kpis: Option<Kpis>,
    pub trends: Option<Trends>,
    pub process_distribution: Option<Vec<ProcessDistributionEntry>>,
    pub employee_metrics: Option<Vec<EmployeeMetric>>,
    pub machine_status: Option<Vec<MachineStatus>>,
    pub bottlenecks: Option<Vec<Bottleneck>>,
    pub alerts: Option<Vec<Alert>>,
}

impl DashboardMetrics {
    pub fn clear(&mut self, kind: MetricKind) {
        match kind {
            MetricKind::Kpis => self.kpis = None,
            MetricKind::Trends => self.trends = None,
            MetricKind::ProcessDistribution => self.process_distribution = None,
            MetricKind::EmployeeMetrics => self.employee_metrics = None,
            MetricKind::MachineStatus => self.machine_status = None,
            MetricKind::Bottlenecks => self.bottlenecks = None,
            MetricKind::Alerts => self.alerts = None,
        }
    }

    pub fn has(&self, kind: MetricKind) -> bool {
        match kind {
            MetricKind::Kpis => self.kpis.is_some(),
            MetricKind::Trends => self.trends.is_some(),
            MetricKind::ProcessDistribution => self.process_distribution.is_some(),
            MetricKind::EmployeeMetrics => self.employee_metrics.is_some(),
            MetricKind::MachineStatus => self.machine_status.is_some(),
            MetricKind::Bottlenecks => self.bottlenecks.is_some(),
            MetricKind::Alerts => self.alerts.is_some(),
        }
    }
}
