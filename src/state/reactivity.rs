// ============================================================================
// REACTIVITY - Estado compartido con notificación a subscribers
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::Rc;

type Callback = Rc<dyn Fn()>;

/// Identificador devuelto por `subscribe`, usado para desuscribirse
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

/// Estado reactivo: las vistas se suscriben y reciben aviso tras cada mutación
pub struct ReactiveState<T> {
    value: Rc<RefCell<T>>,
    subscribers: RefCell<Vec<(SubscriptionId, Callback)>>,
    next_id: Cell<u64>,
}

impl<T> ReactiveState<T> {
    pub fn new(value: T) -> Self {
        Self {
            value: Rc::new(RefCell::new(value)),
            subscribers: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Referencia compartida al valor interno
    pub fn get(&self) -> Rc<RefCell<T>> {
        self.value.clone()
    }

    /// Lee el valor sin clonarlo
    pub fn with<R>(&self, reader: impl FnOnce(&T) -> R) -> R {
        reader(&self.value.borrow())
    }

    pub fn set(&self, new_value: T) {
        *self.value.borrow_mut() = new_value;
        self.notify();
    }

    /// Muta el valor y notifica; el borrow se libera antes de avisar
    pub fn update<R>(&self, updater: impl FnOnce(&mut T) -> R) -> R {
        let result = updater(&mut self.value.borrow_mut());
        self.notify();
        result
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn() + 'static,
    {
        let id = SubscriptionId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.subscribers.borrow_mut().push((id, Rc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.subscribers.borrow_mut().retain(|(sub_id, _)| *sub_id != id);
    }

    fn notify(&self) {
        // Copia de los callbacks para permitir (des)suscripciones durante el aviso
        let callbacks: Vec<Callback> = self
            .subscribers
            .borrow()
            .iter()
            .map(|(_, callback)| callback.clone())
            .collect();
        for callback in callbacks {
            callback();
        }
    }
}

impl<T: Clone> ReactiveState<T> {
    pub fn snapshot(&self) -> T {
        self.value.borrow().clone()
    }
}

impl<T: Default> Default for ReactiveState<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_notifies_until_unsubscribed() {
        let state = ReactiveState::new(0);
        let hits = Rc::new(Cell::new(0));
        let hits_clone = hits.clone();
        let id = state.subscribe(move || hits_clone.set(hits_clone.get() + 1));

        state.update(|v| *v += 1);
        state.set(5);
        assert_eq!(hits.get(), 2);

        state.unsubscribe(id);
        state.set(6);
        assert_eq!(hits.get(), 2);
        assert_eq!(state.snapshot(), 6);
    }

    #[test]
    fn test_subscriber_can_read_state_during_notify() {
        let state = Rc::new(ReactiveState::new(vec![1]));
        let seen = Rc::new(Cell::new(0));
        let (state_clone, seen_clone) = (state.clone(), seen.clone());
        state.subscribe(move || seen_clone.set(state_clone.with(|v| v.len())));

        state.update(|v| v.push(2));
        assert_eq!(seen.get(), 2);
    }
}
