// ============================================================================
// USE DEBOUNCE - Valor con propagación retardada
// ============================================================================
// Opciones: immediate, leading, trailing (por defecto), max_wait.
// Los timers se cancelan al soltar su handle; un timer cancelado no muta nada.
// ============================================================================

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::state::reactivity::{ReactiveState, SubscriptionId};
use crate::utils::scheduler::{TimerHandle, Timers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceOptions {
    pub delay_ms: u32,
    /// Emite la primera llamada sin esperar
    pub immediate: bool,
    /// Emite al inicio de una ráfaga
    pub leading: bool,
    /// Emite al final de una ráfaga
    pub trailing: bool,
    /// Fuerza la emisión tras este tiempo aunque siga llegando input
    pub max_wait_ms: Option<u32>,
}

impl Default for DebounceOptions {
    fn default() -> Self {
        Self { delay_ms: 300, immediate: false, leading: false, trailing: true, max_wait_ms: None }
    }
}

impl DebounceOptions {
    pub fn with_delay(delay_ms: u32) -> Self {
        Self { delay_ms, ..Self::default() }
    }
}

struct DebounceState<T> {
    pending: Option<T>,
    is_debouncing: bool,
    timer: Option<TimerHandle>,
    max_timer: Option<TimerHandle>,
    last_call: Option<i64>,
    last_invoke: Option<i64>,
}

struct Shared<T> {
    state: RefCell<DebounceState<T>>,
    value: ReactiveState<T>,
}

impl<T: Clone + 'static> Shared<T> {
    fn invoke(&self, value: T, now_ms: i64) {
        let released = {
            let mut state = self.state.borrow_mut();
            state.last_invoke = Some(now_ms);
            state.is_debouncing = false;
            state.pending = None;
            (state.timer.take(), state.max_timer.take())
        };
        drop(released);
        self.value.set(value);
    }

    fn cancel(&self) {
        let released = {
            let mut state = self.state.borrow_mut();
            state.is_debouncing = false;
            state.last_call = None;
            state.pending = None;
            (state.timer.take(), state.max_timer.take())
        };
        drop(released);
    }
}

/// Valor debounced; los clones comparten estado
pub struct Debouncer<T> {
    options: DebounceOptions,
    shared: Rc<Shared<T>>,
    timers: Timers,
}

impl<T> Clone for Debouncer<T> {
    fn clone(&self) -> Self {
        Self { options: self.options, shared: self.shared.clone(), timers: self.timers.clone() }
    }
}

impl<T: Clone + 'static> Debouncer<T> {
    pub fn new(initial: T, options: DebounceOptions, timers: Timers) -> Self {
        Self {
            options,
            shared: Rc::new(Shared {
                state: RefCell::new(DebounceState {
                    pending: None,
                    is_debouncing: false,
                    timer: None,
                    max_timer: None,
                    last_call: None,
                    last_invoke: None,
                }),
                value: ReactiveState::new(initial),
            }),
            timers,
        }
    }

    /// Valor ya propagado
    pub fn value(&self) -> T {
        self.shared.value.snapshot()
    }

    pub fn is_debouncing(&self) -> bool {
        self.shared.state.borrow().is_debouncing
    }

    /// Milisegundos desde la última llamada a `set`, si hay ráfaga en curso
    pub fn time_since_last_call(&self) -> Option<i64> {
        let last_call = self.shared.state.borrow().last_call?;
        Some(self.timers.now_ms() - last_call)
    }

    /// Nuevo valor de entrada
    pub fn set(&self, new_value: T) {
        let now = self.timers.now_ms();
        let delay = i64::from(self.options.delay_ms);

        let invoke_now = {
            let mut state = self.shared.state.borrow_mut();
            state.last_call = Some(now);
            let first_call = state.last_invoke.is_none() && state.timer.is_none();
            let since_last_invoke = state.last_invoke.map_or(i64::MAX, |t| now - t);
            (self.options.immediate && first_call) || (self.options.leading && since_last_invoke >= delay)
        };
        if invoke_now {
            self.shared.invoke(new_value, now);
            return;
        }

        let previous = {
            let mut state = self.shared.state.borrow_mut();
            state.pending = Some(new_value);
            state.is_debouncing = true;
            state.timer.take()
        };
        drop(previous);

        let timer = self.timers.schedule(self.options.delay_ms, self.on_delay_elapsed());
        self.shared.state.borrow_mut().timer = Some(timer);

        if let Some(max_wait) = self.options.max_wait_ms {
            if self.shared.state.borrow().max_timer.is_none() {
                let max_timer = self.timers.schedule(max_wait, self.on_max_wait_elapsed());
                self.shared.state.borrow_mut().max_timer = Some(max_timer);
            }
        }
    }

    fn on_delay_elapsed(&self) -> impl FnOnce() + 'static {
        let weak: Weak<Shared<T>> = Rc::downgrade(&self.shared);
        let clock = self.timers.clock.clone();
        let trailing = self.options.trailing;
        move || {
            let Some(shared) = weak.upgrade() else { return };
            let (pending, released) = {
                let mut state = shared.state.borrow_mut();
                let released = state.timer.take();
                let pending = if trailing { state.pending.clone() } else { None };
                if pending.is_none() {
                    state.is_debouncing = false;
                }
                (pending, released)
            };
            drop(released);
            if let Some(value) = pending {
                shared.invoke(value, clock.now_ms());
            }
        }
    }

    fn on_max_wait_elapsed(&self) -> impl FnOnce() + 'static {
        let weak: Weak<Shared<T>> = Rc::downgrade(&self.shared);
        let clock = self.timers.clock.clone();
        move || {
            let Some(shared) = weak.upgrade() else { return };
            let pending = shared.state.borrow().pending.clone();
            if let Some(value) = pending {
                shared.invoke(value, clock.now_ms());
            }
            shared.cancel();
        }
    }

    /// Descarta lo pendiente; el timer ya no tendrá efecto
    pub fn cancel(&self) {
        self.shared.cancel();
    }

    /// Aplica ya el último valor pendiente
    pub fn flush(&self) {
        let pending = {
            let state = self.shared.state.borrow();
            state.timer.as_ref().and(state.pending.clone())
        };
        if let Some(value) = pending {
            self.shared.invoke(value, self.timers.now_ms());
            self.shared.cancel();
        }
    }

    /// Aviso con el valor propagado tras cada emisión
    pub fn subscribe(&self, callback: impl Fn(T) + 'static) -> SubscriptionId {
        let weak = Rc::downgrade(&self.shared);
        self.shared.value.subscribe(move || {
            if let Some(shared) = weak.upgrade() {
                callback(shared.value.snapshot());
            }
        })
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.shared.value.unsubscribe(id);
    }

    /// Limpieza al desmontar
    pub fn cleanup(&self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::manual_timers;

    fn recorded(debouncer: &Debouncer<&'static str>) -> Rc<RefCell<Vec<&'static str>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        debouncer.subscribe(move |value| sink.borrow_mut().push(value));
        log
    }

    #[test]
    fn test_burst_commits_only_last_value_after_delay() {
        let (scheduler, timers) = manual_timers();
        let debouncer = Debouncer::new("", DebounceOptions::with_delay(300), timers);
        let log = recorded(&debouncer);

        debouncer.set("a");
        scheduler.advance(100);
        debouncer.set("ab");
        scheduler.advance(100);
        debouncer.set("abc");
        assert!(debouncer.is_debouncing());

        scheduler.advance(299);
        assert_eq!(debouncer.value(), "");
        scheduler.advance(1);
        assert_eq!(debouncer.value(), "abc");
        assert_eq!(*log.borrow(), vec!["abc"]);
        assert!(!debouncer.is_debouncing());
    }

    #[test]
    fn test_cancel_makes_timer_inert() {
        let (scheduler, timers) = manual_timers();
        let debouncer = Debouncer::new("inicial", DebounceOptions::with_delay(300), timers);

        debouncer.set("nuevo");
        debouncer.cancel();
        scheduler.advance(1_000);

        assert_eq!(debouncer.value(), "inicial");
        assert!(!debouncer.is_debouncing());
    }

    #[test]
    fn test_flush_applies_pending_value_once() {
        let (scheduler, timers) = manual_timers();
        let debouncer = Debouncer::new("", DebounceOptions::with_delay(300), timers);
        let log = recorded(&debouncer);

        debouncer.flush();
        assert!(log.borrow().is_empty());

        debouncer.set("x");
        debouncer.flush();
        assert_eq!(debouncer.value(), "x");
        scheduler.advance(1_000);
        assert_eq!(*log.borrow(), vec!["x"]);
    }

    #[test]
    fn test_leading_invokes_when_idle_long_enough() {
        let (scheduler, timers) = manual_timers();
        let options = DebounceOptions { leading: true, ..DebounceOptions::with_delay(300) };
        let debouncer = Debouncer::new("", options, timers);
        let log = recorded(&debouncer);

        debouncer.set("a");
        assert_eq!(debouncer.value(), "a");

        scheduler.advance(100);
        debouncer.set("b");
        assert_eq!(debouncer.value(), "a");
        scheduler.advance(300);
        assert_eq!(debouncer.value(), "b");

        scheduler.advance(600);
        debouncer.set("c");
        assert_eq!(*log.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_max_wait_forces_emission_during_continuous_input() {
        let (scheduler, timers) = manual_timers();
        let options = DebounceOptions { max_wait_ms: Some(500), ..DebounceOptions::with_delay(300) };
        let debouncer = Debouncer::new(0, options, timers);

        for value in 1..=3 {
            debouncer.set(value);
            scheduler.advance(200);
        }
        // t=600: el maxWait venció en t=500 con el valor de t=400
        assert_eq!(debouncer.value(), 3);
        assert!(!debouncer.is_debouncing());
    }

    #[test]
    fn test_immediate_emits_first_call() {
        let (scheduler, timers) = manual_timers();
        let options = DebounceOptions { immediate: true, ..DebounceOptions::with_delay(300) };
        let debouncer = Debouncer::new("", options, timers);

        debouncer.set("primero");
        assert_eq!(debouncer.value(), "primero");

        debouncer.set("segundo");
        assert_eq!(debouncer.value(), "primero");
        scheduler.advance(300);
        assert_eq!(debouncer.value(), "segundo");
    }
}
