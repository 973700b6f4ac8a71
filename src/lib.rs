// ============================================================================
// LAVANDERÍA DASHBOARD - CAPA DE DATOS DEL CLIENTE (RUST + WASM)
// ============================================================================
// - Services: SOLO comunicación API (token Bearer, reintentos)
// - Stores: Cachés de entidades con TTL e índices secundarios
// - Hooks: Debounce, lazy loading, infinite scroll, virtualización,
//   actualizaciones optimistas y métricas del dashboard
// - State: Estado reactivo con Rc<RefCell> + AppContext
// - DOM: Adaptadores de observers sobre web_sys
// ============================================================================

pub mod config;
pub mod dom;
pub mod error;
pub mod hooks;
pub mod models;
pub mod services;
pub mod state;
pub mod stores;
pub mod utils;

#[cfg(test)]
mod test_support;

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;
use wasm_logger::Config;

use crate::config::CONFIG;
use crate::state::app_context::AppContext;

// Contexto global: se crea una sola vez en main()
thread_local! {
    static CONTEXT: RefCell<Option<Rc<AppContext>>> = const { RefCell::new(None) };
}

/// Contexto de la aplicación ya inicializado
pub fn app_context() -> Option<Rc<AppContext>> {
    CONTEXT.with(|cell| cell.borrow().clone())
}

#[wasm_bindgen(start)]
pub fn main() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();

    let level = if CONFIG.is_logging_enabled() { log::Level::Debug } else { log::Level::Warn };
    wasm_logger::init(Config::new(level));
    log::info!("🚀 Lavandería Dashboard - Rust + WASM ({})", CONFIG.environment);

    let context = Rc::new(AppContext::browser());
    context.start();
    CONTEXT.with(|cell| *cell.borrow_mut() = Some(context));
    Ok(())
}

/// Login de empresa llamable desde JavaScript
#[wasm_bindgen]
pub async fn login(company_name: String, company_password: String) -> Result<(), JsValue> {
    let context = app_context().ok_or_else(|| JsValue::from_str("App no inicializada"))?;
    context
        .auth
        .login(&company_name, &company_password)
        .await
        .map_err(|e| JsValue::from_str(&e.user_message()))?;
    context.start();
    Ok(())
}

#[wasm_bindgen]
pub fn logout() {
    if let Some(context) = app_context() {
        context.logout();
    }
}
