pub mod api_client;
pub mod auth_service;
pub mod proceso_service;
pub mod retry;

pub use api_client::ApiClient;
pub use proceso_service::{ProcesoService, StatusUpdateOutcome};
pub use retry::RetryPolicy;
