// ============================================================================
// AUTH STORE - Sesión de la empresa (token JWT + claims)
// ============================================================================

use std::rc::Rc;

use crate::error::ApiResult;
use crate::models::auth::Company;
use crate::services::api_client::ApiClient;
use crate::services::auth_service::{decode_claims, is_token_valid, perform_login};
use crate::state::reactivity::{ReactiveState, SubscriptionId};
use crate::utils::clock::SharedClock;
use crate::utils::constants::TOKEN_STORAGE_KEY;
use crate::utils::storage::{remove_from_storage, LocalStorage, SharedStorage};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AuthData {
    pub token: Option<String>,
    pub company: Option<Company>,
}

pub struct AuthStore {
    api: ApiClient,
    storage: SharedStorage,
    clock: SharedClock,
    state: ReactiveState<AuthData>,
}

impl AuthStore {
    pub fn new(api: ApiClient, storage: SharedStorage, clock: SharedClock) -> Self {
        Self { api, storage, clock, state: ReactiveState::new(AuthData::default()) }
    }

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        self.state.subscribe(callback)
    }

    pub fn token(&self) -> Option<String> {
        self.state.with(|d| d.token.clone())
    }

    pub fn company(&self) -> Option<Company> {
        self.state.with(|d| d.company.clone())
    }

    /// Token presente y no expirado
    pub fn is_authenticated(&self) -> bool {
        let now = self.clock.now_ms();
        self.state
            .with(|d| d.token.as_deref().is_some_and(|token| is_token_valid(token, now)))
    }

    pub fn company_legal_name(&self) -> String {
        self.company().map_or_else(|| "No Definido".to_string(), |c| c.legal_name())
    }

    pub fn company_planes(&self) -> Vec<String> {
        self.company().map_or_else(|| vec!["basic".to_string()], |c| c.planes)
    }

    fn adopt_token(&self, token: String) {
        let company = decode_claims(&token).map(Company::from);
        self.api.set_auth_token(Some(token.clone()));
        self.state.set(AuthData { token: Some(token), company });
    }

    /// Login de empresa; el token queda persistido y aplicado al cliente
    pub async fn login(&self, company_name: &str, company_password: &str) -> ApiResult<()> {
        let token = match perform_login(&self.api, company_name, company_password).await {
            Ok(token) => token,
            Err(e) => {
                log::error!("❌ Error de login: {}", e);
                return Err(e);
            }
        };

        if let Err(e) = self.storage.set_item(TOKEN_STORAGE_KEY, &token) {
            log::warn!("⚠️ No se pudo persistir el token: {}", e);
        }
        self.adopt_token(token);
        log::info!("✅ Sesión iniciada para {}", self.company_legal_name());
        Ok(())
    }

    /// Restaura la sesión guardada si el token sigue vigente
    pub fn check_auth(&self) -> bool {
        let Some(token) = self.storage.get_item(TOKEN_STORAGE_KEY) else {
            return false;
        };
        if !is_token_valid(&token, self.clock.now_ms()) {
            log::info!("🔄 Token guardado expirado");
            self.logout();
            return false;
        }
        self.adopt_token(token);
        true
    }

    pub fn logout(&self) {
        if let Err(e) = remove_from_storage(self.storage.as_ref(), TOKEN_STORAGE_KEY) {
            log::warn!("⚠️ No se pudo eliminar el token: {}", e);
        }
        self.api.set_auth_token(None);
        self.state.set(AuthData::default());
        log::info!("🔄 Sesión cerrada");
    }
}

/// Constructor del navegador: localStorage
pub fn browser_auth_store(api: ApiClient, clock: SharedClock) -> AuthStore {
    AuthStore::new(api, Rc::new(LocalStorage), clock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::services::auth_service::make_token;
    use crate::test_support::{client, ok, status, MockTransport};
    use crate::utils::clock::ManualClock;
    use crate::utils::storage::{KeyValueStorage, MemoryStorage};
    use futures::executor::block_on;
    use serde_json::json;

    fn valid_token() -> String {
        make_token(json!({"companyId": "c1", "nombreLegal": "Lavandería SAC", "plan": ["pro"], "exp": 10_000}))
    }

    #[test]
    fn test_login_persists_token_and_sets_header() {
        let transport = MockTransport::sequence(vec![ok(json!({"token": valid_token()}))]);
        let api = client(&transport);
        let storage = MemoryStorage::new();
        let store = AuthStore::new(api.clone(), Rc::new(storage.clone()), Rc::new(ManualClock::new(0)));

        block_on(store.login("acme", "secreta")).unwrap();

        assert!(store.is_authenticated());
        assert_eq!(store.company_legal_name(), "Lavandería SAC");
        assert_eq!(store.company_planes(), vec!["pro"]);
        assert_eq!(storage.get_item(TOKEN_STORAGE_KEY), Some(valid_token()));
        assert_eq!(api.auth_token(), Some(valid_token()));
    }

    #[test]
    fn test_failed_login_keeps_anonymous_state() {
        let transport = MockTransport::sequence(vec![status(401)]);
        let store = AuthStore::new(client(&transport), Rc::new(MemoryStorage::new()), Rc::new(ManualClock::new(0)));

        assert_eq!(block_on(store.login("acme", "mala")), Err(ApiError::Unauthorized));
        assert!(!store.is_authenticated());
        assert_eq!(store.company_legal_name(), "No Definido");
        assert_eq!(store.company_planes(), vec!["basic"]);
    }

    #[test]
    fn test_check_auth_restores_only_valid_tokens_and_logout_clears() {
        let transport = MockTransport::sequence(vec![status(500)]);
        let api = client(&transport);
        let storage = MemoryStorage::new();
        storage.set_item(TOKEN_STORAGE_KEY, &valid_token()).unwrap();
        let clock = ManualClock::new(0);
        let store = AuthStore::new(api.clone(), Rc::new(storage.clone()), Rc::new(clock.clone()));

        assert!(store.check_auth());
        assert_eq!(api.auth_token(), Some(valid_token()));

        store.logout();
        assert!(store.token().is_none());
        assert!(api.auth_token().is_none());
        assert!(storage.get_item(TOKEN_STORAGE_KEY).is_none());

        storage.set_item(TOKEN_STORAGE_KEY, &valid_token()).unwrap();
        clock.set(10_000_000);
        assert!(!store.check_auth());
        assert!(storage.get_item(TOKEN_STORAGE_KEY).is_none());
    }
}
