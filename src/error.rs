// ============================================================================
// ERRORES - Taxonomía de errores de la capa de datos
// ============================================================================

use thiserror::Error;

/// Errores de comunicación con la API y de validación local
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Error de red: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Error de parseo: {0}")]
    Parse(String),

    #[error("Respuesta de API inválida: {0}")]
    InvalidResponse(String),

    #[error("Validación: {0}")]
    Validation(String),

    #[error("No autorizado")]
    Unauthorized,

    #[error("Operación cancelada")]
    Cancelled,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Status HTTP si el error viene de una respuesta del servidor
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            ApiError::Unauthorized => Some(401),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Errores de cliente (4xx) no se reintentan, salvo timeout (408) y rate limit (429).
    /// Sin status HTTP se reintenta, excepto validación y cancelación locales
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::Validation(_) | ApiError::Cancelled => false,
            _ => match self.status() {
                Some(408 | 429) => true,
                Some(400..=499) => false,
                _ => true,
            },
        }
    }

    /// Mensaje apto para mostrar en la vista
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Http { message, .. } if !message.is_empty() => message.clone(),
            ApiError::Validation(message) => message.clone(),
            ApiError::Unauthorized => "Credenciales inválidas".to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> ApiError {
        ApiError::Http { status, message: String::new() }
    }

    #[test]
    fn test_client_errors_not_retryable_except_timeout_and_rate_limit() {
        assert!(!http(400).is_retryable());
        assert!(!http(404).is_retryable());
        assert!(http(408).is_retryable());
        assert!(http(429).is_retryable());
        assert!(http(500).is_retryable());
        assert!(http(503).is_retryable());
        assert!(ApiError::Network("timeout".into()).is_retryable());
        assert!(!ApiError::Unauthorized.is_retryable());
    }

    #[test]
    fn test_errors_without_status_are_retried_unless_local() {
        assert!(ApiError::Parse("cuerpo truncado".into()).is_retryable());
        assert!(ApiError::InvalidResponse("sin data".into()).is_retryable());
        assert!(!ApiError::Validation("x".into()).is_retryable());
        assert!(!ApiError::Cancelled.is_retryable());
    }

    #[test]
    fn test_user_message_prefers_server_message() {
        let err = ApiError::Http { status: 422, message: "Detalle bloqueado".into() };
        assert_eq!(err.user_message(), "Detalle bloqueado");
        assert_eq!(http(500).user_message(), "HTTP 500: ");
        assert_eq!(ApiError::Unauthorized.user_message(), "Credenciales inválidas");
    }
}
