/// Clave del token JWT en localStorage
pub const TOKEN_STORAGE_KEY: &str = "token";

/// Tamaño máximo del historial de búsquedas
pub const SEARCH_HISTORY_LIMIT: usize = 10;

/// Número máximo de sugerencias de búsqueda
pub const SUGGESTIONS_LIMIT: usize = 5;

