// ============================================================================
// USE INFINITE SCROLL - Disparo debounced de "cargar más"
// ============================================================================
// Dos estrategias con el mismo contrato: intersección de un centinela o
// distancia al final del contenedor. La detección DOM vive en dom::observers;
// aquí quedan el disparo, las guardas y el estado de error.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::ApiResult;
use crate::utils::scheduler::{Spawner, TimerHandle, Timers};

pub type LoadMoreFn = Rc<dyn Fn() -> LocalBoxFuture<'static, ApiResult<()>>>;
pub type Predicate = Rc<dyn Fn() -> bool>;

pub const DEFAULT_LOAD_DEBOUNCE_MS: u32 = 100;
pub const DEFAULT_SCROLL_THRESHOLD_PX: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScrollAxis {
    #[default]
    Vertical,
    Horizontal,
}

/// Dimensiones de scroll de un contenedor (o de la ventana)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub scroll_left: f64,
    pub scroll_height: f64,
    pub scroll_width: f64,
    pub client_height: f64,
    pub client_width: f64,
}

impl ScrollMetrics {
    pub fn position(&self, axis: ScrollAxis) -> f64 {
        match axis {
            ScrollAxis::Vertical => self.scroll_top,
            ScrollAxis::Horizontal => self.scroll_left,
        }
    }

    pub fn distance_to_end(&self, axis: ScrollAxis) -> f64 {
        match axis {
            ScrollAxis::Vertical => self.scroll_height - (self.scroll_top + self.client_height),
            ScrollAxis::Horizontal => self.scroll_width - (self.scroll_left + self.client_width),
        }
    }
}

/// Dentro del umbral (px) respecto al final
pub fn should_load_more(metrics: &ScrollMetrics, axis: ScrollAxis, threshold: f64) -> bool {
    metrics.distance_to_end(axis) <= threshold
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollMethod {
    IntersectionObserver,
    ScrollPosition,
    None,
}

impl ScrollMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScrollMethod::IntersectionObserver => "intersection-observer",
            ScrollMethod::ScrollPosition => "scroll-position",
            ScrollMethod::None => "none",
        }
    }
}

/// Intersección si hay soporte y se prefiere; si no, posición de scroll; si no, nada
pub fn select_method(supports_intersection: bool, prefer_intersection: bool, fallback_to_scroll: bool) -> ScrollMethod {
    if prefer_intersection && supports_intersection {
        ScrollMethod::IntersectionObserver
    } else if fallback_to_scroll {
        ScrollMethod::ScrollPosition
    } else {
        log::warn!("⚠️ No hay soporte para infinite scroll");
        ScrollMethod::None
    }
}

struct TriggerState {
    is_loading: Cell<bool>,
    has_error: Cell<bool>,
    error_message: RefCell<String>,
    paused: Cell<bool>,
    timer: RefCell<Option<TimerHandle>>,
    gate: RefCell<Option<Predicate>>,
}

/// Carga debounced con guardas de "cargando" y `can_load_more`
#[derive(Clone)]
pub struct LoadTrigger {
    load_more: LoadMoreFn,
    can_load_more: Predicate,
    debounce_ms: u32,
    timers: Timers,
    spawner: Spawner,
    state: Rc<TriggerState>,
}

impl LoadTrigger {
    pub fn new(
        load_more: LoadMoreFn,
        can_load_more: Predicate,
        debounce_ms: u32,
        timers: Timers,
        spawner: Spawner,
    ) -> Self {
        Self {
            load_more,
            can_load_more,
            debounce_ms,
            timers,
            spawner,
            state: Rc::new(TriggerState {
                is_loading: Cell::new(false),
                has_error: Cell::new(false),
                error_message: RefCell::new(String::new()),
                paused: Cell::new(false),
                timer: RefCell::new(None),
                gate: RefCell::new(None),
            }),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading.get()
    }

    pub fn has_error(&self) -> bool {
        self.state.has_error.get()
    }

    pub fn error_message(&self) -> String {
        self.state.error_message.borrow().clone()
    }

    pub fn is_paused(&self) -> bool {
        self.state.paused.get()
    }

    /// Condición extra evaluada al vencer el debounce (p.ej. distancia al final)
    pub fn set_gate(&self, gate: Option<Predicate>) {
        *self.state.gate.borrow_mut() = gate;
    }

    /// Reinicia el debounce; al vencer carga si las guardas lo permiten
    pub fn trigger(&self) {
        if self.state.paused.get() {
            return;
        }
        drop(self.state.timer.borrow_mut().take());
        let this = self.clone();
        let timer = self.timers.schedule(self.debounce_ms, move || this.fire());
        *self.state.timer.borrow_mut() = Some(timer);
    }

    fn fire(&self) {
        drop(self.state.timer.borrow_mut().take());
        if self.state.is_loading.get() || !(self.can_load_more)() {
            return;
        }
        let gate = self.state.gate.borrow().clone();
        if gate.is_some_and(|passes| !passes()) {
            return;
        }

        self.state.is_loading.set(true);
        self.state.has_error.set(false);
        self.state.error_message.borrow_mut().clear();

        let load = (self.load_more)();
        let state = self.state.clone();
        (self.spawner)(Box::pin(async move {
            if let Err(e) = load.await {
                log::error!("❌ Error en infinite scroll: {}", e);
                let message = e.user_message();
                state.has_error.set(true);
                *state.error_message.borrow_mut() = if message.is_empty() {
                    "Error al cargar más datos".to_string()
                } else {
                    message
                };
            }
            state.is_loading.set(false);
        }));
    }

    pub fn pause(&self) {
        self.state.paused.set(true);
        self.cancel();
    }

    pub fn resume(&self) {
        self.state.paused.set(false);
    }

    pub fn cancel(&self) {
        drop(self.state.timer.borrow_mut().take());
    }

    pub fn reset_error(&self) {
        self.state.has_error.set(false);
        self.state.error_message.borrow_mut().clear();
    }
}

/// Lado DOM de una estrategia (centinela observado o listener de scroll)
pub trait ViewportWatcher {
    /// Empieza a observar; `on_trigger` se llama en cada detección
    fn connect(&mut self, on_trigger: Rc<dyn Fn()>);
    fn disconnect(&mut self);
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    /// Condición a revalidar al vencer el debounce
    fn load_gate(&self) -> Option<Predicate> {
        None
    }
}

/// Infinite scroll compuesto; con `ScrollMethod::None` todo es no-op
pub struct InfiniteScroll {
    method: ScrollMethod,
    trigger: LoadTrigger,
    watcher: RefCell<Option<Box<dyn ViewportWatcher>>>,
    connected: Cell<bool>,
}

impl InfiniteScroll {
    pub fn new(method: ScrollMethod, trigger: LoadTrigger, watcher: Option<Box<dyn ViewportWatcher>>) -> Self {
        let watcher = if method == ScrollMethod::None { None } else { watcher };
        Self { method, trigger, watcher: RefCell::new(watcher), connected: Cell::new(false) }
    }

    pub fn method(&self) -> ScrollMethod {
        self.method
    }

    pub fn is_loading(&self) -> bool {
        self.trigger.is_loading()
    }

    pub fn has_error(&self) -> bool {
        self.trigger.has_error()
    }

    pub fn error_message(&self) -> String {
        self.trigger.error_message()
    }

    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    pub fn start(&self) {
        let mut watcher = self.watcher.borrow_mut();
        let Some(watcher) = watcher.as_mut() else { return };
        if self.connected.get() {
            return;
        }
        self.trigger.set_gate(watcher.load_gate());
        let trigger = self.trigger.clone();
        watcher.connect(Rc::new(move || trigger.trigger()));
        self.connected.set(true);
    }

    pub fn stop(&self) {
        if let Some(watcher) = self.watcher.borrow_mut().as_mut() {
            watcher.disconnect();
        }
        self.trigger.cancel();
        self.connected.set(false);
    }

    /// Desconecta y vuelve a conectar
    pub fn reset(&self) {
        self.stop();
        self.trigger.reset_error();
        self.start();
    }

    pub fn pause(&self) {
        if let Some(watcher) = self.watcher.borrow_mut().as_mut() {
            watcher.pause();
        }
        self.trigger.pause();
    }

    pub fn resume(&self) {
        if let Some(watcher) = self.watcher.borrow_mut().as_mut() {
            watcher.resume();
        }
        self.trigger.resume();
    }

    pub fn force_load_more(&self) {
        if self.method != ScrollMethod::None {
            self.trigger.trigger();
        }
    }
}

impl Drop for InfiniteScroll {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::test_support::{local_spawner, manual_timers};

    #[derive(Default)]
    struct FakeWatcher {
        on_trigger: Rc<RefCell<Option<Rc<dyn Fn()>>>>,
        disconnects: Rc<Cell<u32>>,
    }

    impl ViewportWatcher for FakeWatcher {
        fn connect(&mut self, on_trigger: Rc<dyn Fn()>) {
            *self.on_trigger.borrow_mut() = Some(on_trigger);
        }

        fn disconnect(&mut self) {
            self.on_trigger.borrow_mut().take();
            self.disconnects.set(self.disconnects.get() + 1);
        }
    }

    fn counting_load(calls: Rc<Cell<u32>>, fail: bool) -> LoadMoreFn {
        Rc::new(move || {
            calls.set(calls.get() + 1);
            Box::pin(async move {
                if fail {
                    Err(ApiError::Network("timeout".into()))
                } else {
                    Ok(())
                }
            })
        })
    }

    #[test]
    fn test_should_load_more_within_threshold() {
        let metrics = ScrollMetrics { scroll_top: 850.0, scroll_height: 1_000.0, client_height: 100.0, ..Default::default() };
        assert!(should_load_more(&metrics, ScrollAxis::Vertical, 100.0));
        let far = ScrollMetrics { scroll_top: 500.0, ..metrics };
        assert!(!should_load_more(&far, ScrollAxis::Vertical, 100.0));
    }

    #[test]
    fn test_method_selection_degrades_to_none() {
        assert_eq!(select_method(true, true, true), ScrollMethod::IntersectionObserver);
        assert_eq!(select_method(false, true, true), ScrollMethod::ScrollPosition);
        assert_eq!(select_method(true, false, true), ScrollMethod::ScrollPosition);
        assert_eq!(select_method(false, true, false), ScrollMethod::None);
    }

    #[test]
    fn test_intersections_are_debounced_and_guarded() {
        let (scheduler, timers) = manual_timers();
        let (mut pool, spawner) = local_spawner();
        let calls = Rc::new(Cell::new(0));
        let can_load = Rc::new(Cell::new(true));
        let gate = can_load.clone();
        let trigger = LoadTrigger::new(counting_load(calls.clone(), false), Rc::new(move || gate.get()), 100, timers, spawner);

        let watcher = FakeWatcher::default();
        let sentinel = watcher.on_trigger.clone();
        let scroll = InfiniteScroll::new(ScrollMethod::IntersectionObserver, trigger, Some(Box::new(watcher)));
        scroll.start();

        let fire = sentinel.borrow().clone().unwrap();
        fire();
        scheduler.advance(50);
        fire();
        scheduler.advance(100);
        pool.run_until_stalled();
        assert_eq!(calls.get(), 1);

        can_load.set(false);
        fire();
        scheduler.advance(100);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failed_load_records_error_and_stop_disconnects() {
        let (scheduler, timers) = manual_timers();
        let (mut pool, spawner) = local_spawner();
        let calls = Rc::new(Cell::new(0));
        let trigger = LoadTrigger::new(counting_load(calls.clone(), true), Rc::new(|| true), 100, timers, spawner);
        let watcher = FakeWatcher::default();
        let disconnects = watcher.disconnects.clone();
        let scroll = InfiniteScroll::new(ScrollMethod::ScrollPosition, trigger, Some(Box::new(watcher)));

        scroll.start();
        scroll.force_load_more();
        scheduler.advance(100);
        pool.run_until_stalled();

        assert!(scroll.has_error());
        assert_eq!(scroll.error_message(), "Error de red: timeout");
        assert!(!scroll.is_loading());

        scroll.stop();
        assert_eq!(disconnects.get(), 1);
        assert!(!scroll.is_connected());
    }

    #[test]
    fn test_none_method_is_inert() {
        let (scheduler, timers) = manual_timers();
        let (_pool, spawner) = local_spawner();
        let calls = Rc::new(Cell::new(0));
        let trigger = LoadTrigger::new(counting_load(calls.clone(), false), Rc::new(|| true), 100, timers, spawner);
        let scroll = InfiniteScroll::new(ScrollMethod::None, trigger, Some(Box::new(FakeWatcher::default())));

        scroll.start();
        scroll.force_load_more();
        scheduler.advance(1_000);

        assert!(!scroll.is_connected());
        assert_eq!(calls.get(), 0);
    }
}
