pub mod use_dashboard_metrics;
pub mod use_debounce;
pub mod use_debounced_fn;
pub mod use_infinite_scroll;
pub mod use_lazy_loading;
pub mod use_optimistic_updates;
pub mod use_search_debounce;
pub mod use_virtualization;

pub use use_dashboard_metrics::DashboardMetricsHandle;
pub use use_debounce::{DebounceOptions, Debouncer};
pub use use_debounced_fn::DebouncedFn;
pub use use_infinite_scroll::InfiniteScroll;
pub use use_lazy_loading::{LazyLoader, LazyOptions};
pub use use_optimistic_updates::OptimisticUpdater;
pub use use_search_debounce::SearchDebouncer;
pub use use_virtualization::{VirtualGroupedList, VirtualTable, Virtualizer};
