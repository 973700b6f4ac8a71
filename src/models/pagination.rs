// ============================================================================
// PAGINACIÓN - Normalización de las formas de respuesta de listados
// ============================================================================
// La API responde listados con formas distintas según el endpoint; se
// resuelven una sola vez aquí en un resultado etiquetado.
// ============================================================================

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Página normalizada de items crudos
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub items: Vec<Value>,
    pub total: usize,
    pub has_more: bool,
}

impl Page {
    /// Deserializa los items; los que no encajan se descartan con aviso
    pub fn decode<T: DeserializeOwned>(&self) -> Vec<T> {
        decode_items(&self.items)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PageResult {
    Page(Page),
    Empty,
    Malformed(String),
}

impl PageResult {
    /// Forma no reconocida o vacía se degrada a página vacía sin más
    pub fn into_page(self) -> Page {
        match self {
            PageResult::Page(page) => page,
            PageResult::Empty => Page { items: Vec::new(), total: 0, has_more: false },
            PageResult::Malformed(shape) => {
                log::warn!("⚠️ Estructura de respuesta no reconocida: {}", shape);
                Page { items: Vec::new(), total: 0, has_more: false }
            }
        }
    }
}

fn as_count(value: Option<&Value>) -> Option<usize> {
    value.and_then(Value::as_u64).map(|n| n as usize).filter(|n| *n > 0)
}

fn as_flag(value: Option<&Value>) -> bool {
    value.and_then(Value::as_bool).unwrap_or(false)
}

fn shape_of(body: &Value) -> String {
    match body {
        Value::Object(map) => format!("objeto con claves {:?}", map.keys().collect::<Vec<_>>()),
        Value::String(_) => "texto".to_string(),
        Value::Number(_) => "número".to_string(),
        Value::Bool(_) => "booleano".to_string(),
        Value::Array(_) => "lista".to_string(),
        Value::Null => "null".to_string(),
    }
}

/// Respuestas del fetch de listas perezosas: `{data, total?, hasMore?}` o lista.
/// Sin `hasMore` explícito se asume que hay más si la página vino llena.
pub fn normalize_page(body: &Value, limit: usize) -> PageResult {
    match body {
        Value::Null => PageResult::Empty,
        Value::Array(items) => PageResult::Page(Page {
            total: items.len(),
            has_more: items.len() == limit,
            items: items.clone(),
        }),
        Value::Object(map) if map.get("data").is_some_and(|data| !data.is_null()) => {
            let items = map.get("data").and_then(Value::as_array).cloned().unwrap_or_default();
            Page {
                total: as_count(map.get("total")).unwrap_or(items.len()),
                has_more: as_flag(map.get("hasMore")) || items.len() == limit,
                items,
            }
            .into()
        }
        other => PageResult::Malformed(shape_of(other)),
    }
}

/// Respuestas de los endpoints de listados de las cachés de entidades:
/// `{data, meta{total, hasNextPage}}`, `{data, pagination{hasMore, total}}`,
/// lista directa o `{operaciones|items, total, hasNextPage}`
pub fn normalize_listing(body: &Value) -> PageResult {
    match body {
        Value::Null => PageResult::Empty,
        Value::Array(items) => PageResult::Page(Page {
            total: items.len(),
            has_more: false,
            items: items.clone(),
        }),
        Value::Object(map) => {
            let data = map.get("data").and_then(Value::as_array);
            if let (Some(items), Some(meta)) = (data, map.get("meta")) {
                return Page {
                    total: as_count(meta.get("total")).unwrap_or(0),
                    has_more: as_flag(meta.get("hasNextPage")),
                    items: items.clone(),
                }
                .into();
            }
            if let Some(items) = data {
                let pagination = map.get("pagination");
                return Page {
                    total: as_count(pagination.and_then(|p| p.get("total"))).unwrap_or(items.len()),
                    has_more: as_flag(pagination.and_then(|p| p.get("hasMore"))),
                    items: items.clone(),
                }
                .into();
            }
            match map.get("operaciones").or_else(|| map.get("items")).and_then(Value::as_array) {
                Some(items) => Page {
                    total: as_count(map.get("total")).unwrap_or(items.len()),
                    has_more: as_flag(map.get("hasNextPage")),
                    items: items.clone(),
                }
                .into(),
                None => PageResult::Malformed(shape_of(body)),
            }
        }
        other => PageResult::Malformed(shape_of(other)),
    }
}

impl From<Page> for PageResult {
    fn from(page: Page) -> Self {
        PageResult::Page(page)
    }
}

pub fn decode_items<T: DeserializeOwned>(items: &[Value]) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match serde_json::from_value::<T>(item.clone()) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                log::warn!("⚠️ Item descartado al parsear: {}", e);
                None
            }
        })
        .collect()
}

/// Deserializa un objeto único de la API
pub fn decode<T: DeserializeOwned>(body: Value) -> ApiResult<T> {
    serde_json::from_value(body).map_err(|e| ApiError::Parse(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_lazy_page_shapes() {
        let page = normalize_page(&json!({"data": [{"id": 1}, {"id": 2}], "total": 2}), 50).into_page();
        assert_eq!((page.items.len(), page.total, page.has_more), (2, 2, false));

        let full = normalize_page(&json!([1, 2]), 2).into_page();
        assert!(full.has_more);

        let explicit = normalize_page(&json!({"data": [1], "hasMore": true}), 50).into_page();
        assert!(explicit.has_more);

        assert!(matches!(normalize_page(&json!({"rows": []}), 50), PageResult::Malformed(_)));
        assert_eq!(normalize_page(&Value::Null, 50), PageResult::Empty);
        assert_eq!(normalize_page(&json!("oops"), 50).into_page().items.len(), 0);
    }

    #[test]
    fn test_listing_shapes() {
        let meta = normalize_listing(&json!({"data": [1, 2], "meta": {"total": 40, "hasNextPage": true}})).into_page();
        assert_eq!((meta.total, meta.has_more), (40, true));

        let pagination = normalize_listing(&json!({"data": [1], "pagination": {"hasMore": false}})).into_page();
        assert_eq!((pagination.total, pagination.has_more), (1, false));

        let legacy = normalize_listing(&json!({"operaciones": [1, 2, 3], "hasNextPage": true})).into_page();
        assert_eq!((legacy.total, legacy.has_more), (3, true));

        let bare = normalize_listing(&json!([1])).into_page();
        assert!(!bare.has_more);
    }
}
