// ============================================================================
// USE OPTIMISTIC UPDATES - Cambios de estado de detalles con rollback
// ============================================================================
// Por clave "{procesoId}-{detalleId}": Idle → Pending → Committed | Failed.
// Un fallo restaura el estado original y deja un registro de error; el
// reintento invierte el estado actual (ya revertido).
// ============================================================================

use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use crate::error::{ApiError, ApiResult};
use crate::models::proceso::{Detalle, DetalleStatusUpdate};
use crate::services::proceso_service::{ProcesoService, StatusUpdateOutcome};
use crate::state::reactivity::{ReactiveState, SubscriptionId};
use crate::utils::clock::SharedClock;
use crate::utils::process_status::validate_status_change;

/// Caché que contiene los detalles visibles (normalmente el ProcesosStore)
pub trait DetailStatusTarget {
    fn detalle(&self, proceso_id: &str, detalle_id: &str) -> Option<Detalle>;
    fn set_detail_estado(&self, proceso_id: &str, detalle_id: &str, estado: bool);
    /// Incorpora lo que el servidor devolvió tras confirmar
    fn reconcile(&self, proceso_id: &str, outcome: &StatusUpdateOutcome);
}

pub fn update_key(proceso_id: &str, detalle_id: &str) -> String {
    format!("{}-{}", proceso_id, detalle_id)
}

#[derive(Debug, Clone, PartialEq)]
pub struct PendingUpdate {
    pub original_status: bool,
    pub new_status: bool,
    pub timestamp: i64,
    pub batch_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateError {
    pub error: String,
    pub timestamp: i64,
    pub retry_count: u32,
    pub batch_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptimisticState {
    pub pending: HashMap<String, PendingUpdate>,
    pub errors: HashMap<String, UpdateError>,
}

pub type SuccessCallback = Rc<dyn Fn(&StatusUpdateOutcome)>;
pub type ErrorCallback = Rc<dyn Fn(&str)>;

pub struct OptimisticUpdater {
    service: ProcesoService,
    target: Rc<dyn DetailStatusTarget>,
    clock: SharedClock,
    state: ReactiveState<OptimisticState>,
    on_success: Option<SuccessCallback>,
    on_error: Option<ErrorCallback>,
}

impl OptimisticUpdater {
    pub fn new(service: ProcesoService, target: Rc<dyn DetailStatusTarget>, clock: SharedClock) -> Self {
        Self {
            service,
            target,
            clock,
            state: ReactiveState::default(),
            on_success: None,
            on_error: None,
        }
    }

    pub fn with_callbacks(mut self, on_success: Option<SuccessCallback>, on_error: Option<ErrorCallback>) -> Self {
        self.on_success = on_success;
        self.on_error = on_error;
        self
    }

    pub fn snapshot(&self) -> OptimisticState {
        self.state.snapshot()
    }

    pub fn subscribe(&self, callback: impl Fn() + 'static) -> SubscriptionId {
        self.state.subscribe(callback)
    }

    fn validate(&self, proceso_id: &str, detalle_id: &str, new_status: bool) -> ApiResult<()> {
        if self.has_pending_update(proceso_id, detalle_id) {
            return Err(ApiError::Validation(format!(
                "Ya hay una actualización en curso para el detalle {}",
                detalle_id
            )));
        }
        let detalle = self.target.detalle(proceso_id, detalle_id);
        validate_status_change(detalle.as_ref(), new_status).map_err(|errors| ApiError::Validation(errors.join(", ")))
    }

    fn notify_error(&self, message: &str) {
        if let Some(on_error) = &self.on_error {
            on_error(message);
        }
    }

    fn finish_success(&self, proceso_id: &str, outcome: &StatusUpdateOutcome) {
        self.target.reconcile(proceso_id, outcome);
        if let Some(on_success) = &self.on_success {
            on_success(outcome);
        }
    }

    /// Aplica el cambio en la caché antes de que el servidor lo confirme
    pub async fn update_detail_status(
        &self,
        proceso_id: &str,
        detalle_id: &str,
        new_status: bool,
    ) -> ApiResult<StatusUpdateOutcome> {
        self.validate(proceso_id, detalle_id, new_status)?;
        let key = update_key(proceso_id, detalle_id);
        let original_status = !new_status;
        let now = self.clock.now_ms();

        self.state.update(|s| {
            s.errors.remove(&key);
            s.pending.insert(key.clone(), PendingUpdate { original_status, new_status, timestamp: now, batch_key: None });
        });
        self.target.set_detail_estado(proceso_id, detalle_id, new_status);

        match self.service.update_detail_status(proceso_id, detalle_id, new_status).await {
            Ok(outcome) => {
                self.state.update(|s| {
                    s.pending.remove(&key);
                });
                log::info!("✅ Estado del detalle {} confirmado", detalle_id);
                self.finish_success(proceso_id, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                self.target.set_detail_estado(proceso_id, detalle_id, original_status);
                let message = message_or(&e, "Error al actualizar el estado");
                let now = self.clock.now_ms();
                self.state.update(|s| {
                    s.pending.remove(&key);
                    s.errors.insert(key.clone(), UpdateError { error: message.clone(), timestamp: now, retry_count: 0, batch_key: None });
                });
                log::warn!("⚠️ Rollback del detalle {}: {}", detalle_id, message);
                self.notify_error(&message);
                Err(e)
            }
        }
    }

    /// Reintenta un fallo registrado; None si no había error para esa clave
    pub async fn retry_update(&self, proceso_id: &str, detalle_id: &str) -> ApiResult<Option<StatusUpdateOutcome>> {
        let key = update_key(proceso_id, detalle_id);
        let Some(previous) = self.state.with(|s| s.errors.get(&key).cloned()) else {
            log::warn!("⚠️ No hay información de error para reintentar {}", key);
            return Ok(None);
        };
        let retry_count = previous.retry_count + 1;

        // Si el reintento no llega a salir, el registro de error se conserva
        let Some(current) = self.target.detalle(proceso_id, detalle_id) else {
            return Err(ApiError::Validation("Detalle no encontrado".to_string()));
        };
        let new_status = !current.estado;
        self.validate(proceso_id, detalle_id, new_status)?;
        log::info!("🔄 Reintento {} para {}", retry_count, key);

        match self.update_detail_status(proceso_id, detalle_id, new_status).await {
            Ok(outcome) => Ok(Some(outcome)),
            Err(e) => {
                self.state.update(|s| {
                    if let Some(error) = s.errors.get_mut(&key) {
                        error.retry_count = retry_count;
                    }
                });
                Err(e)
            }
        }
    }

    /// Lote todo-o-nada: cualquier fallo revierte todos los detalles
    pub async fn batch_update_details(
        &self,
        proceso_id: &str,
        updates: &[DetalleStatusUpdate],
    ) -> ApiResult<StatusUpdateOutcome> {
        let mut seen = HashSet::new();
        if let Some(repeated) = updates.iter().find(|u| !seen.insert(u.detalle_id.as_str())) {
            return Err(ApiError::Validation(format!("El detalle {} aparece más de una vez en el lote", repeated.detalle_id)));
        }
        let errors: Vec<String> = updates
            .iter()
            .filter_map(|u| self.validate(proceso_id, &u.detalle_id, u.estado).err())
            .map(|e| e.user_message())
            .collect();
        if !errors.is_empty() {
            return Err(ApiError::Validation(errors.join(", ")));
        }

        let now = self.clock.now_ms();
        let batch_key = format!("batch-{}-{}", proceso_id, now);
        let originals: Vec<(String, bool)> = updates.iter().map(|u| (u.detalle_id.clone(), !u.estado)).collect();

        self.state.update(|s| {
            for update in updates {
                let key = update_key(proceso_id, &update.detalle_id);
                s.errors.remove(&key);
                s.pending.insert(
                    key,
                    PendingUpdate {
                        original_status: !update.estado,
                        new_status: update.estado,
                        timestamp: now,
                        batch_key: Some(batch_key.clone()),
                    },
                );
            }
        });
        for update in updates {
            self.target.set_detail_estado(proceso_id, &update.detalle_id, update.estado);
        }

        let result = self.service.batch_update_detail_status(proceso_id, updates).await;
        let keys: Vec<String> = updates.iter().map(|u| update_key(proceso_id, &u.detalle_id)).collect();

        match result {
            Ok(outcome) => {
                self.state.update(|s| keys.iter().for_each(|key| {
                    s.pending.remove(key);
                }));
                log::info!("✅ Lote {} confirmado ({} detalles)", batch_key, updates.len());
                self.finish_success(proceso_id, &outcome);
                Ok(outcome)
            }
            Err(e) => {
                for (detalle_id, original) in &originals {
                    self.target.set_detail_estado(proceso_id, detalle_id, *original);
                }
                let message = message_or(&e, "Error en actualización por lotes");
                let now = self.clock.now_ms();
                self.state.update(|s| {
                    for key in &keys {
                        s.pending.remove(key);
                        s.errors.insert(
                            key.clone(),
                            UpdateError {
                                error: message.clone(),
                                timestamp: now,
                                retry_count: 0,
                                batch_key: Some(batch_key.clone()),
                            },
                        );
                    }
                });
                log::warn!("⚠️ Rollback del lote {}: {}", batch_key, message);
                self.notify_error(&message);
                Err(e)
            }
        }
    }

    pub fn has_pending_update(&self, proceso_id: &str, detalle_id: &str) -> bool {
        let key = update_key(proceso_id, detalle_id);
        self.state.with(|s| s.pending.contains_key(&key))
    }

    /// Un detalle está "actualizando" mientras su cambio esté pendiente
    pub fn is_updating(&self, proceso_id: &str, detalle_id: &str) -> bool {
        self.has_pending_update(proceso_id, detalle_id)
    }

    pub fn get_update_error(&self, proceso_id: &str, detalle_id: &str) -> Option<UpdateError> {
        let key = update_key(proceso_id, detalle_id);
        self.state.with(|s| s.errors.get(&key).cloned())
    }

    pub fn clear_update_error(&self, proceso_id: &str, detalle_id: &str) {
        let key = update_key(proceso_id, detalle_id);
        self.state.update(|s| {
            s.errors.remove(&key);
        });
    }

    pub fn clear_all_errors(&self) {
        self.state.update(|s| s.errors.clear());
    }

    pub fn pending_count(&self) -> usize {
        self.state.with(|s| s.pending.len())
    }
}

fn message_or(error: &ApiError, fallback: &str) -> String {
    let message = error.user_message();
    if message.is_empty() {
        fallback.to_string()
    } else {
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::retry::RetryPolicy;
    use crate::test_support::{client, ok, status, MockTransport, RecordingSleeper};
    use crate::utils::clock::ManualClock;
    use futures::executor::block_on;
    use serde_json::json;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeTarget {
        detalles: RefCell<HashMap<String, Detalle>>,
        writes: RefCell<Vec<(String, bool)>>,
        reconciled: Cell<u32>,
    }

    impl FakeTarget {
        fn with(ids: &[(&str, bool)]) -> Rc<Self> {
            let target = FakeTarget::default();
            for (id, estado) in ids {
                let detalle = Detalle {
                    id: id.to_string(),
                    num_orden: Some("NO1".into()),
                    cantidad: Some(2.0),
                    estado: *estado,
                    ..Detalle::default()
                };
                target.detalles.borrow_mut().insert(id.to_string(), detalle);
            }
            Rc::new(target)
        }

        fn estado(&self, id: &str) -> bool {
            self.detalles.borrow()[id].estado
        }
    }

    impl DetailStatusTarget for FakeTarget {
        fn detalle(&self, _proceso_id: &str, detalle_id: &str) -> Option<Detalle> {
            self.detalles.borrow().get(detalle_id).cloned()
        }

        fn set_detail_estado(&self, _proceso_id: &str, detalle_id: &str, estado: bool) {
            self.writes.borrow_mut().push((detalle_id.to_string(), estado));
            if let Some(detalle) = self.detalles.borrow_mut().get_mut(detalle_id) {
                detalle.estado = estado;
            }
        }

        fn reconcile(&self, _proceso_id: &str, _outcome: &StatusUpdateOutcome) {
            self.reconciled.set(self.reconciled.get() + 1);
        }
    }

    fn updater(transport: &Rc<MockTransport>, target: Rc<FakeTarget>) -> OptimisticUpdater {
        let service = ProcesoService::new(client(transport), RetryPolicy::default(), RecordingSleeper::new());
        OptimisticUpdater::new(service, target, Rc::new(ManualClock::new(1_000)))
    }

    #[test]
    fn test_success_commits_and_clears_pending() {
        let transport = MockTransport::sequence(vec![ok(json!({"message": "ok"}))]);
        let target = FakeTarget::with(&[("d1", false)]);
        let updater = updater(&transport, target.clone());

        let outcome = block_on(updater.update_detail_status("p1", "d1", true)).unwrap();

        assert_eq!(outcome.message, "ok");
        assert!(target.estado("d1"));
        assert_eq!(updater.pending_count(), 0);
        assert_eq!(target.reconciled.get(), 1);
    }

    #[test]
    fn test_failure_rolls_back_and_records_error() {
        let transport = MockTransport::sequence(vec![status(400)]);
        let target = FakeTarget::with(&[("d1", false)]);
        let messages = Rc::new(RefCell::new(Vec::new()));
        let sink = messages.clone();
        let updater = updater(&transport, target.clone())
            .with_callbacks(None, Some(Rc::new(move |m: &str| sink.borrow_mut().push(m.to_string()))));

        assert!(block_on(updater.update_detail_status("p1", "d1", true)).is_err());

        assert!(!target.estado("d1"));
        assert_eq!(*target.writes.borrow(), vec![("d1".to_string(), true), ("d1".to_string(), false)]);
        let error = updater.get_update_error("p1", "d1").unwrap();
        assert_eq!(error.retry_count, 0);
        assert_eq!(error.timestamp, 1_000);
        assert_eq!(messages.borrow().len(), 1);
        assert!(!updater.has_pending_update("p1", "d1"));
    }

    #[test]
    fn test_retry_inverts_rolled_back_status_and_counts() {
        let transport = MockTransport::sequence(vec![status(400), status(422), ok(json!({}))]);
        let target = FakeTarget::with(&[("d1", false)]);
        let updater = updater(&transport, target.clone());

        let _ = block_on(updater.update_detail_status("p1", "d1", true));
        assert!(block_on(updater.retry_update("p1", "d1")).is_err());
        assert_eq!(updater.get_update_error("p1", "d1").unwrap().retry_count, 1);

        let outcome = block_on(updater.retry_update("p1", "d1")).unwrap();
        assert!(outcome.is_some());
        assert!(target.estado("d1"));
        assert_eq!(transport.calls()[2].1.body, Some(json!({"estado": true})));
        assert_eq!(block_on(updater.retry_update("p1", "d1")).unwrap(), None);
    }

    #[test]
    fn test_retry_of_missing_detalle_keeps_error_record() {
        let transport = MockTransport::sequence(vec![status(400)]);
        let target = FakeTarget::with(&[("d1", false)]);
        let updater = updater(&transport, target.clone());

        let _ = block_on(updater.update_detail_status("p1", "d1", true));
        target.detalles.borrow_mut().remove("d1");

        let err = block_on(updater.retry_update("p1", "d1")).unwrap_err();

        assert_eq!(err, ApiError::Validation("Detalle no encontrado".into()));
        assert_eq!(updater.get_update_error("p1", "d1").unwrap().retry_count, 0);
        assert_eq!(transport.call_count(), 1);
    }

    #[test]
    fn test_batch_with_repeated_detalle_is_rejected() {
        let transport = MockTransport::sequence(vec![ok(json!({}))]);
        let target = FakeTarget::with(&[("d1", false)]);
        let updater = updater(&transport, target.clone());
        let updates = vec![
            DetalleStatusUpdate { detalle_id: "d1".into(), estado: true },
            DetalleStatusUpdate { detalle_id: "d1".into(), estado: false },
        ];

        let err = block_on(updater.batch_update_details("p1", &updates)).unwrap_err();

        assert!(matches!(err, ApiError::Validation(message) if message.contains("d1")));
        assert_eq!(transport.call_count(), 0);
        assert!(target.writes.borrow().is_empty());
        assert_eq!(updater.pending_count(), 0);
    }

    #[test]
    fn test_validation_rejects_unchanged_status_without_network() {
        let transport = MockTransport::sequence(vec![]);
        let target = FakeTarget::with(&[("d1", true)]);
        let updater = updater(&transport, target);

        let err = block_on(updater.update_detail_status("p1", "d1", true)).unwrap_err();

        assert_eq!(err, ApiError::Validation("El estado no ha cambiado".into()));
        assert_eq!(transport.call_count(), 0);
    }

    #[test]
    fn test_batch_failure_rolls_back_every_item() {
        let transport = MockTransport::sequence(vec![status(400)]);
        let target = FakeTarget::with(&[("d1", false), ("d2", true)]);
        let updater = updater(&transport, target.clone());
        let updates = vec![
            DetalleStatusUpdate { detalle_id: "d1".into(), estado: true },
            DetalleStatusUpdate { detalle_id: "d2".into(), estado: false },
        ];

        assert!(block_on(updater.batch_update_details("p1", &updates)).is_err());

        assert!(!target.estado("d1"));
        assert!(target.estado("d2"));
        let first = updater.get_update_error("p1", "d1").unwrap();
        let second = updater.get_update_error("p1", "d2").unwrap();
        assert_eq!(first.batch_key.as_deref(), Some("batch-p1-1000"));
        assert_eq!(first.batch_key, second.batch_key);
        assert_eq!(updater.pending_count(), 0);

        updater.clear_all_errors();
        assert!(updater.snapshot().errors.is_empty());
    }
}
