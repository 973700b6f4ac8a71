// ============================================================================
// API CLIENT - SOLO COMUNICACIÓN HTTP
// ============================================================================
// NO tiene lógica de negocio: arma la URL, adjunta el token Bearer y
// traduce status/cuerpo a ApiResult<serde_json::Value>
// ============================================================================

use std::cell::RefCell;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use gloo_net::http::{Request, RequestBuilder};
use serde_json::Value;

use crate::config::CONFIG;
use crate::error::{ApiError, ApiResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
}

/// Petición independiente del transporte
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: HttpMethod,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self { method: HttpMethod::Post, body: Some(body), ..Self::get(path) }
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self { method: HttpMethod::Patch, body: Some(body), ..Self::get(path) }
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Respuesta cruda: status + cuerpo JSON (Null si vino vacío)
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Value,
}

/// Transporte HTTP (gloo-net en el navegador, mock en tests)
pub trait HttpTransport {
    fn send(&self, url: String, request: ApiRequest) -> LocalBoxFuture<'static, ApiResult<ApiResponse>>;
}

/// Transporte real sobre fetch (gloo-net)
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooTransport;

impl HttpTransport for GlooTransport {
    fn send(&self, url: String, request: ApiRequest) -> LocalBoxFuture<'static, ApiResult<ApiResponse>> {
        Box::pin(async move {
            let mut builder: RequestBuilder = match request.method {
                HttpMethod::Get => Request::get(&url),
                HttpMethod::Post => Request::post(&url),
                HttpMethod::Patch => Request::patch(&url),
            };
            if !request.query.is_empty() {
                builder = builder.query(request.query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
            }
            for (name, value) in &request.headers {
                builder = builder.header(name, value);
            }

            let response = match &request.body {
                Some(body) => builder
                    .json(body)
                    .map_err(|e| ApiError::Parse(format!("Serialization error: {}", e)))?
                    .send()
                    .await,
                None => builder.send().await,
            }
            .map_err(|e| ApiError::Network(e.to_string()))?;

            let status = response.status();
            let text = response
                .text()
                .await
                .map_err(|e| ApiError::Network(e.to_string()))?;
            let body = if text.trim().is_empty() {
                Value::Null
            } else {
                // Cuerpos no JSON (p.ej. páginas de error del proxy) se conservan como texto
                serde_json::from_str::<Value>(&text).unwrap_or_else(|_| Value::String(text.clone()))
            };

            Ok::<ApiResponse, ApiError>(ApiResponse { status, body })
        })
    }
}

/// Cliente API compartido; el token Bearer se adjunta a todas las peticiones
#[derive(Clone)]
pub struct ApiClient {
    base_url: String,
    transport: Rc<dyn HttpTransport>,
    auth_token: Rc<RefCell<Option<String>>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, transport: Rc<dyn HttpTransport>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            transport,
            auth_token: Rc::new(RefCell::new(None)),
        }
    }

    /// Cliente del navegador contra CONFIG.api_url
    pub fn browser() -> Self {
        Self::new(CONFIG.api_url.clone(), Rc::new(GlooTransport))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn set_auth_token(&self, token: Option<String>) {
        *self.auth_token.borrow_mut() = token;
    }

    pub fn auth_token(&self) -> Option<String> {
        self.auth_token.borrow().clone()
    }

    pub async fn execute(&self, mut request: ApiRequest) -> ApiResult<Value> {
        if let Some(token) = self.auth_token() {
            request.headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
        }
        let url = format!("{}{}", self.base_url, request.path);
        log::debug!("🌐 {:?} {}", request.method, url);

        let response = self.transport.send(url, request).await?;
        if (200..300).contains(&response.status) {
            Ok(response.body)
        } else {
            Err(ApiError::Http {
                status: response.status,
                message: server_message(&response.body),
            })
        }
    }

    pub async fn get(&self, path: impl Into<String>) -> ApiResult<Value> {
        self.execute(ApiRequest::get(path)).await
    }

    pub async fn get_with_query(&self, path: impl Into<String>, query: Vec<(String, String)>) -> ApiResult<Value> {
        self.execute(ApiRequest::get(path).with_query(query)).await
    }

    pub async fn post(&self, path: impl Into<String>, body: Value) -> ApiResult<Value> {
        self.execute(ApiRequest::post(path, body)).await
    }

    pub async fn patch(&self, path: impl Into<String>, body: Value) -> ApiResult<Value> {
        self.execute(ApiRequest::patch(path, body)).await
    }
}

/// `message` del cuerpo de error, o el cuerpo mismo si es texto
fn server_message(body: &Value) -> String {
    match body {
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        Value::String(text) => text.clone(),
        _ => String::new(),
    }
}
