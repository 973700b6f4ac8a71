use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_url: String,
    pub environment: String,
    pub enable_logging: bool,
    pub retry_attempts: u32,
    pub retry_base_delay_ms: u32,
    pub search_debounce_ms: u32,
    pub page_size: usize,
    pub procesos_page_size: usize,
    pub cache_config: CacheConfig,
    pub dashboard_config: DashboardConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000".to_string(),
            environment: "development".to_string(),
            enable_logging: true,
            retry_attempts: 3,
            retry_base_delay_ms: 1000,
            search_debounce_ms: 300,
            page_size: 50,
            procesos_page_size: 30,
            cache_config: CacheConfig::default(),
            dashboard_config: DashboardConfig::default(),
        }
    }
}

/// TTLs de las cachés de entidades (ms)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub page_cache_ttl_ms: i64,
    pub operaciones_ttl_ms: i64,
    pub procesos_ttl_ms: i64,
    pub proceso_details_ttl_ms: i64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            page_cache_ttl_ms: 5 * 60 * 1000,
            operaciones_ttl_ms: 5 * 60 * 1000,
            procesos_ttl_ms: 3 * 60 * 1000,
            proceso_details_ttl_ms: 10 * 60 * 1000,
        }
    }
}

/// TTLs por métrica, intervalos de auto-refresh y umbrales de alertas
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    pub kpis_ttl_ms: i64,
    pub trends_ttl_ms: i64,
    pub process_distribution_ttl_ms: i64,
    pub employee_metrics_ttl_ms: i64,
    pub machine_status_ttl_ms: i64,
    pub bottlenecks_ttl_ms: i64,
    pub alerts_ttl_ms: i64,
    pub auto_refresh_enabled: bool,
    pub default_refresh_ms: u32,
    pub kpis_refresh_ms: u32,
    pub alerts_refresh_ms: u32,
    pub machine_status_refresh_ms: u32,
    pub alert_thresholds: AlertThresholds,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            kpis_ttl_ms: 2 * 60 * 1000,
            trends_ttl_ms: 5 * 60 * 1000,
            process_distribution_ttl_ms: 3 * 60 * 1000,
            employee_metrics_ttl_ms: 10 * 60 * 1000,
            machine_status_ttl_ms: 60 * 1000,
            bottlenecks_ttl_ms: 2 * 60 * 1000,
            alerts_ttl_ms: 30 * 1000,
            auto_refresh_enabled: true,
            default_refresh_ms: 60 * 1000,
            kpis_refresh_ms: 30 * 1000,
            alerts_refresh_ms: 15 * 1000,
            machine_status_refresh_ms: 20 * 1000,
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertThresholds {
    pub tiempo_maximo_proceso_ms: i64,
    pub eficiencia_minima: f64,
    pub capacidad_maxima_maquina: f64,
    pub retraso_maximo_ms: i64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            tiempo_maximo_proceso_ms: 4 * 60 * 60 * 1000,
            eficiencia_minima: 70.0,
            capacidad_maxima_maquina: 90.0,
            retraso_maximo_ms: 2 * 60 * 60 * 1000,
        }
    }
}

impl AppConfig {
    /// Carga la configuración desde variables de entorno en tiempo de compilación
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            api_url: option_env!("API_URL")
                .unwrap_or("http://localhost:3000").to_string(),
            environment: option_env!("ENVIRONMENT")
                .unwrap_or("development").to_string(),
            enable_logging: option_env!("ENABLE_LOGGING")
                .unwrap_or("true").parse().unwrap_or(true),
            retry_attempts: option_env!("RETRY_ATTEMPTS")
                .unwrap_or("3").parse().unwrap_or(3),
            retry_base_delay_ms: option_env!("RETRY_BASE_DELAY_MS")
                .unwrap_or("1000").parse().unwrap_or(1000),
            search_debounce_ms: option_env!("SEARCH_DEBOUNCE_MS")
                .unwrap_or("300").parse().unwrap_or(300),
            page_size: option_env!("PAGE_SIZE")
                .unwrap_or("50").parse().unwrap_or(50),
            procesos_page_size: option_env!("PROCESOS_PAGE_SIZE")
                .unwrap_or("30").parse().unwrap_or(30),
            ..defaults
        }
    }

    /// Verifica si el modo de logging está habilitado
    pub fn is_logging_enabled(&self) -> bool {
        self.enable_logging
    }

    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}

// Configuración global estática
lazy_static::lazy_static! {
    pub static ref CONFIG: AppConfig = AppConfig::from_env();
}
