use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::error::{ApiError, ApiResult};
use crate::models::auth::{LoginRequest, LoginResponse, TokenClaims};
use crate::models::pagination::decode;
use crate::services::api_client::ApiClient;

/// POST /auth/login; devuelve el token emitido
pub async fn perform_login(api: &ApiClient, company_name: &str, company_password: &str) -> ApiResult<String> {
    let request = LoginRequest {
        company_name: company_name.to_string(),
        company_password: company_password.to_string(),
    };
    let body = serde_json::to_value(&request)
        .map_err(|e| ApiError::Parse(format!("Serialization error: {}", e)))?;

    let response = api.post("/auth/login", body).await.map_err(|e| match e {
        ApiError::Http { status: 401, .. } => ApiError::Unauthorized,
        other => other,
    })?;

    let LoginResponse { token } = decode(response)?;
    if token.is_empty() {
        return Err(ApiError::InvalidResponse("token vacío".to_string()));
    }
    Ok(token)
}

/// Decodifica el payload del JWT (sin verificar la firma)
pub fn decode_claims(token: &str) -> Option<TokenClaims> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// Válido mientras exp (segundos) sea posterior a `now_ms`
pub fn is_token_valid(token: &str, now_ms: i64) -> bool {
    decode_claims(token)
        .and_then(|claims| claims.exp)
        .is_some_and(|exp| exp.saturating_mul(1000) > now_ms)
}

#[cfg(test)]
pub(crate) fn make_token(claims: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.firma", header, payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{client, ok, status, MockTransport};
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_claims_decoded_and_expiry_checked() {
        let token = make_token(json!({"companyId": "c1", "nombreLegal": "Lavandería SAC", "exp": 2_000}));

        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.company_id.as_deref(), Some("c1"));
        assert!(is_token_valid(&token, 1_999_999));
        assert!(!is_token_valid(&token, 2_000_000));
        assert!(!is_token_valid("no-es-un-jwt", 0));
    }

    #[test]
    fn test_login_maps_401_to_unauthorized() {
        let transport = MockTransport::sequence(vec![status(401)]);
        let err = block_on(perform_login(&client(&transport), "acme", "mala")).unwrap_err();
        assert_eq!(err, ApiError::Unauthorized);

        let transport = MockTransport::sequence(vec![ok(json!({"token": "t"}))]);
        let token = block_on(perform_login(&client(&transport), "acme", "buena")).unwrap();
        assert_eq!(token, "t");
        assert_eq!(
            transport.calls()[0].1.body,
            Some(json!({"companyName": "acme", "companyPassword": "buena"}))
        );
    }
}
