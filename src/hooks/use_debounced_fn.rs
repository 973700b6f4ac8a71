// ============================================================================
// USE DEBOUNCED FN - Debounce de una operación asíncrona
// ============================================================================
// Las llamadas de una misma ráfaga comparten un único resultado, obtenido
// con los últimos argumentos. Cancelar rechaza las esperas con Cancelled.
// ============================================================================

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::channel::oneshot;
use futures::future::LocalBoxFuture;

use crate::error::{ApiError, ApiResult};
use crate::hooks::use_debounce::DebounceOptions;
use crate::utils::scheduler::{Spawner, TimerHandle, Timers};

pub type AsyncFn<A, R> = Rc<dyn Fn(A) -> LocalBoxFuture<'static, ApiResult<R>>>;

type Waiter<R> = oneshot::Sender<ApiResult<R>>;

struct Inner<A, R> {
    func: AsyncFn<A, R>,
    options: DebounceOptions,
    timers: Timers,
    spawner: Spawner,
    is_executing: Cell<bool>,
    last_invoke: Cell<Option<i64>>,
    last_args: RefCell<Option<A>>,
    waiters: RefCell<Vec<Waiter<R>>>,
    timer: RefCell<Option<TimerHandle>>,
    max_timer: RefCell<Option<TimerHandle>>,
}

impl<A: 'static, R: Clone + 'static> Inner<A, R> {
    fn invoke(self: &Rc<Self>, args: A) -> LocalBoxFuture<'static, ApiResult<R>> {
        self.last_invoke.set(Some(self.timers.now_ms()));
        self.is_executing.set(true);
        let call = (self.func)(args);
        let weak = Rc::downgrade(self);
        Box::pin(async move {
            let result = call.await;
            if let Some(inner) = weak.upgrade() {
                inner.is_executing.set(false);
            }
            result
        })
    }

    /// Ejecuta con los últimos argumentos y resuelve todas las esperas
    fn fire(self: &Rc<Self>) {
        drop(self.timer.borrow_mut().take());
        let Some(args) = self.last_args.borrow_mut().take() else { return };
        let waiters: Vec<Waiter<R>> = self.waiters.borrow_mut().drain(..).collect();

        let call = self.invoke(args);
        (self.spawner)(Box::pin(async move {
            let result = call.await;
            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        }));
    }

    fn cancel(&self) {
        drop(self.timer.borrow_mut().take());
        drop(self.max_timer.borrow_mut().take());
        self.last_args.borrow_mut().take();
        // Soltar los senders rechaza las esperas
        self.waiters.borrow_mut().clear();
        self.is_executing.set(false);
    }
}

/// Función asíncrona debounced; los clones comparten estado
pub struct DebouncedFn<A, R> {
    inner: Rc<Inner<A, R>>,
}

impl<A, R> Clone for DebouncedFn<A, R> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<A: 'static, R: Clone + 'static> DebouncedFn<A, R> {
    pub fn new(func: AsyncFn<A, R>, options: DebounceOptions, timers: Timers, spawner: Spawner) -> Self {
        Self {
            inner: Rc::new(Inner {
                func,
                options,
                timers,
                spawner,
                is_executing: Cell::new(false),
                last_invoke: Cell::new(None),
                last_args: RefCell::new(None),
                waiters: RefCell::new(Vec::new()),
                timer: RefCell::new(None),
                max_timer: RefCell::new(None),
            }),
        }
    }

    pub fn is_executing(&self) -> bool {
        self.inner.is_executing.get()
    }

    pub fn is_pending(&self) -> bool {
        self.inner.timer.borrow().is_some()
    }

    /// Programa la llamada; el futuro resuelve con el resultado de la ráfaga
    pub fn call(&self, args: A) -> LocalBoxFuture<'static, ApiResult<R>> {
        let inner = &self.inner;
        let now = inner.timers.now_ms();
        let since_last_invoke = inner.last_invoke.get().map_or(i64::MAX, |t| now - t);

        if inner.options.leading && since_last_invoke >= i64::from(inner.options.delay_ms) {
            return inner.invoke(args);
        }

        *inner.last_args.borrow_mut() = Some(args);
        let (sender, receiver) = oneshot::channel();
        inner.waiters.borrow_mut().push(sender);

        drop(inner.timer.borrow_mut().take());
        let weak: Weak<Inner<A, R>> = Rc::downgrade(inner);
        let trailing = inner.options.trailing;
        let timer = inner.timers.schedule(inner.options.delay_ms, move || {
            let Some(inner) = weak.upgrade() else { return };
            if trailing {
                inner.fire();
            } else {
                drop(inner.timer.borrow_mut().take());
            }
        });
        *inner.timer.borrow_mut() = Some(timer);

        if let Some(max_wait) = inner.options.max_wait_ms {
            if inner.max_timer.borrow().is_none() {
                let weak = Rc::downgrade(inner);
                let max_timer = inner.timers.schedule(max_wait, move || {
                    let Some(inner) = weak.upgrade() else { return };
                    // fire ya suelta el timer de la ráfaga; la invocación sigue en curso
                    drop(inner.max_timer.borrow_mut().take());
                    inner.fire();
                });
                *inner.max_timer.borrow_mut() = Some(max_timer);
            }
        }

        Box::pin(async move { receiver.await.unwrap_or(Err(ApiError::Cancelled)) })
    }

    /// Ejecuta ya lo pendiente; None si no había llamada programada
    pub fn flush(&self) -> Option<LocalBoxFuture<'static, ApiResult<R>>> {
        let inner = &self.inner;
        if inner.timer.borrow().is_none() || inner.last_args.borrow().is_none() {
            return None;
        }
        let (sender, receiver) = oneshot::channel();
        inner.waiters.borrow_mut().push(sender);
        inner.fire();
        drop(inner.max_timer.borrow_mut().take());
        Some(Box::pin(async move { receiver.await.unwrap_or(Err(ApiError::Cancelled)) }))
    }

    pub fn cancel(&self) {
        self.inner.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{local_spawner, manual_timers};
    use futures::FutureExt;

    fn recording_fn(calls: Rc<RefCell<Vec<u32>>>) -> AsyncFn<u32, u32> {
        Rc::new(move |x: u32| {
            calls.borrow_mut().push(x);
            Box::pin(async move { Ok(x * 10) })
        })
    }

    #[test]
    fn test_burst_shares_one_result_with_latest_args() {
        let (scheduler, timers) = manual_timers();
        let (mut pool, spawner) = local_spawner();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let debounced = DebouncedFn::new(recording_fn(calls.clone()), DebounceOptions::with_delay(300), timers, spawner);

        let first = debounced.call(1);
        let second = debounced.call(2);
        scheduler.advance(300);
        pool.run_until_stalled();

        assert_eq!(*calls.borrow(), vec![2]);
        assert_eq!(first.now_or_never(), Some(Ok(20)));
        assert_eq!(second.now_or_never(), Some(Ok(20)));
        assert!(!debounced.is_executing());
    }

    #[test]
    fn test_cancel_rejects_waiters() {
        let (scheduler, timers) = manual_timers();
        let (mut pool, spawner) = local_spawner();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let debounced = DebouncedFn::new(recording_fn(calls.clone()), DebounceOptions::with_delay(300), timers, spawner);

        let pending = debounced.call(5);
        debounced.cancel();
        scheduler.advance(1_000);
        pool.run_until_stalled();

        assert!(calls.borrow().is_empty());
        assert_eq!(pending.now_or_never(), Some(Err(ApiError::Cancelled)));
    }

    #[test]
    fn test_flush_and_leading() {
        let (scheduler, timers) = manual_timers();
        let (mut pool, spawner) = local_spawner();
        let calls = Rc::new(RefCell::new(Vec::new()));
        let options = DebounceOptions { leading: true, ..DebounceOptions::with_delay(300) };
        let debounced = DebouncedFn::new(recording_fn(calls.clone()), options, timers, spawner);

        assert_eq!(debounced.call(1).now_or_never(), Some(Ok(10)));
        let waiting = debounced.call(2);
        assert!(debounced.is_pending());

        let flushed = debounced.flush().unwrap();
        pool.run_until_stalled();
        scheduler.advance(1_000);

        assert_eq!(*calls.borrow(), vec![1, 2]);
        assert_eq!(waiting.now_or_never(), Some(Ok(20)));
        assert_eq!(flushed.now_or_never(), Some(Ok(20)));
        assert!(debounced.flush().is_none());
    }

    #[test]
    fn test_max_wait_keeps_executing_until_call_resolves() {
        let (scheduler, timers) = manual_timers();
        let (mut pool, spawner) = local_spawner();
        let (sender, receiver) = oneshot::channel::<ApiResult<u32>>();
        let pending = Rc::new(RefCell::new(Some(receiver)));
        let func: AsyncFn<u32, u32> = Rc::new(move |_| {
            let deferred = pending.borrow_mut().take();
            Box::pin(async move {
                match deferred {
                    Some(rx) => rx.await.unwrap_or(Err(ApiError::Cancelled)),
                    None => Ok(0),
                }
            })
        });
        let options = DebounceOptions { max_wait_ms: Some(500), ..DebounceOptions::with_delay(300) };
        let debounced = DebouncedFn::new(func, options, timers, spawner);

        let first = debounced.call(1);
        scheduler.advance(200);
        let _second = debounced.call(2);
        scheduler.advance(200);
        let third = debounced.call(3);
        scheduler.advance(100);
        pool.run_until_stalled();

        assert!(debounced.is_executing());
        assert!(!debounced.is_pending());

        sender.send(Ok(30)).unwrap();
        pool.run_until_stalled();

        assert!(!debounced.is_executing());
        assert_eq!(first.now_or_never(), Some(Ok(30)));
        assert_eq!(third.now_or_never(), Some(Ok(30)));
    }
}
