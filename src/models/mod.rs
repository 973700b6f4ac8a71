pub mod auth;
pub mod dashboard;
pub mod operacion;
pub mod pagination;
pub mod proceso;

pub use auth::Company;
pub use dashboard::{DashboardMetrics, MetricKind, TimeFilter};
pub use operacion::{Operacion, OperacionDto, OperacionPatch};
pub use pagination::{normalize_listing, Page, PageResult};
pub use proceso::{Detalle, Proceso, ProcesoDetails, ProcesoDto, TipoProceso};
