use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub company_name: String,
    pub company_password: String,
}

#[derive(Clone, PartialEq, Serialize, Deserialize, Debug)]
pub struct LoginResponse {
    pub token: String,
}

/// Claims del JWT emitido por /auth/login
#[derive(Clone, PartialEq, Serialize, Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase", default)]
pub struct TokenClaims {
    pub company_id: Option<String>,
    pub nombre_legal: Option<String>,
    pub ruc: Option<String>,
    pub company_name: Option<String>,
    /// String o lista de planes según el emisor
    pub plan: Option<Value>,
    /// Segundos desde epoch
    pub exp: Option<i64>,
}

/// Empresa autenticada derivada de los claims
#[derive(Clone, PartialEq, Debug)]
pub struct Company {
    pub id: Option<String>,
    pub nombre_legal: Option<String>,
    pub ruc: Option<String>,
    pub nombre_empresa: Option<String>,
    pub planes: Vec<String>,
}

impl Company {
    /// Nombre legal o "No Definido"
    pub fn legal_name(&self) -> String {
        self.nombre_legal.clone().unwrap_or_else(|| "No Definido".to_string())
    }
}

impl From<TokenClaims> for Company {
    fn from(claims: TokenClaims) -> Self {
        let planes = match claims.plan {
            Some(Value::String(plan)) => vec![plan],
            Some(Value::Array(planes)) => planes
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        };
        Self {
            id: claims.company_id,
            nombre_legal: claims.nombre_legal,
            ruc: claims.ruc,
            nombre_empresa: claims.company_name,
            planes: if planes.is_empty() { vec!["basic".to_string()] } else { planes },
        }
    }
}
