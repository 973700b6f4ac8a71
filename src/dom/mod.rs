// ============================================================================
// DOM MODULE - Adaptadores sobre web_sys para scroll y tamaño
// ============================================================================

pub mod observers;

pub use observers::*;
