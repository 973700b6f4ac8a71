// ============================================================================
// STATE MODULE - State Management con Rc<RefCell> + notificaciones
// ============================================================================

pub mod app_context;
pub mod cancellation;
pub mod index;
pub mod page_cache;
pub mod reactivity;
pub mod ttl;

pub use app_context::AppContext;
pub use cancellation::{CancellationToken, RequestGeneration};
pub use index::SecondaryIndex;
pub use page_cache::PageCache;
pub use reactivity::*;
pub use ttl::{CacheEntry, CacheStamp};
