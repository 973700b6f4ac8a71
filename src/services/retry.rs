// ============================================================================
// RETRY - Reintentos con backoff exponencial
// ============================================================================

use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::config::CONFIG;
use crate::error::{ApiError, ApiResult};

/// Espera asíncrona inyectable (timers del navegador o instantánea en tests)
pub trait Sleeper {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()>;
}

/// Espera real con gloo-timers
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerSleeper;

impl Sleeper for TimerSleeper {
    fn sleep(&self, ms: u32) -> LocalBoxFuture<'static, ()> {
        Box::pin(gloo_timers::future::TimeoutFuture::new(ms))
    }
}

pub fn timer_sleeper() -> Rc<dyn Sleeper> {
    Rc::new(TimerSleeper)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Reintentos después del primer intento
    pub max_retries: u32,
    pub base_delay_ms: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_retries: 3, base_delay_ms: 1000 }
    }
}

impl RetryPolicy {
    pub fn from_config() -> Self {
        Self {
            max_retries: CONFIG.retry_attempts,
            base_delay_ms: CONFIG.retry_base_delay_ms,
        }
    }

    /// baseDelay × 2^attempt
    pub fn delay_for(&self, attempt: u32) -> u32 {
        self.base_delay_ms.saturating_mul(2u32.saturating_pow(attempt))
    }
}

/// Ejecuta `call` reintentando errores transitorios; los 4xx (salvo 408/429)
/// se devuelven de inmediato y tras agotar reintentos se devuelve el último error
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, sleeper: &dyn Sleeper, mut call: F) -> ApiResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = ApiResult<T>>,
{
    let mut last_error = None;

    for attempt in 0..=policy.max_retries {
        match call().await {
            Ok(value) => return Ok(value),
            Err(error) => {
                if !error.is_retryable() {
                    return Err(error);
                }
                if attempt == policy.max_retries {
                    last_error = Some(error);
                    break;
                }
                let delay = policy.delay_for(attempt);
                log::warn!("🔄 Intento {} fallido ({}), reintentando en {}ms", attempt + 1, error, delay);
                last_error = Some(error);
                sleeper.sleep(delay).await;
            }
        }
    }

    Err(last_error.unwrap_or_else(|| ApiError::Network("Reintentos agotados".to_string())))
}
