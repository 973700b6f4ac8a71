pub mod auth_store;
pub mod dashboard_store;
pub mod operaciones_store;
pub mod procesos_store;

pub use auth_store::AuthStore;
pub use dashboard_store::DashboardStore;
pub use operaciones_store::OperacionesStore;
pub use procesos_store::ProcesosStore;
