// ============================================================================
// PROCESO SERVICE - Endpoints de procesos con reintentos
// ============================================================================

use std::rc::Rc;

use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::models::pagination::{decode, normalize_listing};
use crate::models::proceso::{DetalleStatusUpdate, ProcesoDto};
use crate::services::api_client::ApiClient;
use crate::services::retry::{timer_sleeper, with_retry, RetryPolicy, Sleeper};

/// Resultado de un cambio de estado confirmado por el servidor
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdateOutcome {
    /// Proceso actualizado, si el servidor lo devolvió
    pub proceso: Option<ProcesoDto>,
    pub message: String,
}

impl StatusUpdateOutcome {
    fn from_body(body: Value, default_message: &str) -> Self {
        let message = body
            .get("message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(default_message)
            .to_string();
        let proceso = body
            .get("_id")
            .is_some()
            .then(|| serde_json::from_value::<ProcesoDto>(body).ok())
            .flatten();
        Self { proceso, message }
    }
}

#[derive(Clone)]
pub struct ProcesoService {
    api: ApiClient,
    policy: RetryPolicy,
    sleeper: Rc<dyn Sleeper>,
}

impl ProcesoService {
    pub fn new(api: ApiClient, policy: RetryPolicy, sleeper: Rc<dyn Sleeper>) -> Self {
        Self { api, policy, sleeper }
    }

    /// Servicio del navegador con la política de CONFIG
    pub fn browser(api: ApiClient) -> Self {
        Self::new(api, RetryPolicy::from_config(), timer_sleeper())
    }

    pub async fn update_detail_status(
        &self,
        proceso_id: &str,
        detalle_id: &str,
        estado: bool,
    ) -> ApiResult<StatusUpdateOutcome> {
        let path = format!("/procesos/{}/detalles/{}/estado", proceso_id, detalle_id);
        let body = with_retry(&self.policy, self.sleeper.as_ref(), || {
            self.api.patch(path.clone(), json!({ "estado": estado }))
        })
        .await
        .map_err(|e| {
            log::error!("❌ Error actualizando estado del detalle {}: {}", detalle_id, e);
            e
        })?;

        Ok(StatusUpdateOutcome::from_body(body, "Estado actualizado correctamente"))
    }

    pub async fn batch_update_detail_status(
        &self,
        proceso_id: &str,
        updates: &[DetalleStatusUpdate],
    ) -> ApiResult<StatusUpdateOutcome> {
        let path = format!("/procesos/{}/detalles/batch-status", proceso_id);
        let payload = json!({ "updates": updates });
        let body = with_retry(&self.policy, self.sleeper.as_ref(), || {
            self.api.patch(path.clone(), payload.clone())
        })
        .await
        .map_err(|e| {
            log::error!("❌ Error en actualización por lote de {}: {}", proceso_id, e);
            e
        })?;

        Ok(StatusUpdateOutcome::from_body(body, "Estados actualizados correctamente"))
    }

    pub async fn get_proceso_with_status(&self, proceso_id: &str) -> ApiResult<ProcesoDto> {
        let path = format!("/procesos/{}", proceso_id);
        let body = with_retry(&self.policy, self.sleeper.as_ref(), || self.api.get(path.clone())).await?;
        decode(body)
    }

    /// GET /procesos/filter con filtros arbitrarios como query
    pub async fn get_filtered_procesos(&self, filters: &[(String, String)]) -> ApiResult<Vec<ProcesoDto>> {
        let query = filters.to_vec();
        let body = with_retry(&self.policy, self.sleeper.as_ref(), || {
            self.api.get_with_query("/procesos/filter", query.clone())
        })
        .await?;
        Ok(normalize_listing(&body).into_page().decode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::api_client::HttpMethod;
    use crate::test_support::{client, network_error, ok, status, MockTransport, RecordingSleeper};
    use futures::executor::block_on;

    fn service(transport: &Rc<MockTransport>) -> (ProcesoService, Rc<RecordingSleeper>) {
        let sleeper = RecordingSleeper::new();
        (ProcesoService::new(client(transport), RetryPolicy::default(), sleeper.clone()), sleeper)
    }

    #[test]
    fn test_update_detail_status_uses_server_message_and_process() {
        let transport = MockTransport::sequence(vec![ok(json!({
            "message": "Detalle actualizado",
            "_id": "p1",
            "tipo": "lavado",
            "detalles": [{"_id": "d1", "estado": true}]
        }))]);
        let (service, _) = service(&transport);

        let outcome = block_on(service.update_detail_status("p1", "d1", true)).unwrap();

        assert_eq!(outcome.message, "Detalle actualizado");
        assert_eq!(outcome.proceso.unwrap().id, "p1");
        let (url, request) = &transport.calls()[0];
        assert_eq!(url, "http://api/procesos/p1/detalles/d1/estado");
        assert_eq!(request.method, HttpMethod::Patch);
        assert_eq!(request.body, Some(json!({"estado": true})));
    }

    #[test]
    fn test_batch_update_defaults_message_and_retries_network_errors() {
        let transport = MockTransport::sequence(vec![network_error(), ok(json!({}))]);
        let (service, sleeper) = service(&transport);
        let updates = vec![DetalleStatusUpdate { detalle_id: "d1".into(), estado: true }];

        let outcome = block_on(service.batch_update_detail_status("p1", &updates)).unwrap();

        assert_eq!(outcome.message, "Estados actualizados correctamente");
        assert!(outcome.proceso.is_none());
        assert_eq!(sleeper.delays(), vec![1000]);
        assert_eq!(
            transport.calls()[1].1.body,
            Some(json!({"updates": [{"detalleId": "d1", "estado": true}]}))
        );
    }

    #[test]
    fn test_client_error_is_not_retried() {
        let transport = MockTransport::sequence(vec![status(400)]);
        let (service, sleeper) = service(&transport);

        let err = block_on(service.update_detail_status("p1", "d1", true)).unwrap_err();

        assert_eq!(err.status(), Some(400));
        assert_eq!(transport.call_count(), 1);
        assert!(sleeper.delays().is_empty());
    }

    #[test]
    fn test_filtered_procesos_sends_query() {
        let transport = MockTransport::sequence(vec![ok(json!([{"_id": "p1", "tipo": "secado"}]))]);
        let (service, _) = service(&transport);

        let procesos = block_on(service.get_filtered_procesos(&[("numOrden".into(), "NO1".into())])).unwrap();

        assert_eq!(procesos.len(), 1);
        assert_eq!(transport.calls()[0].1.query, vec![("numOrden".to_string(), "NO1".to_string())]);
    }
}
