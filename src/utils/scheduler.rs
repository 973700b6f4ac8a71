// ============================================================================
// SCHEDULER - Timers y tareas locales inyectables
// ============================================================================
// En el navegador: gloo_timers (setTimeout/setInterval) + spawn_local.
// En tests: ManualScheduler con tiempo virtual sobre ManualClock.
// ============================================================================

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::future::LocalBoxFuture;
use gloo_timers::callback::{Interval, Timeout};

use crate::utils::clock::{system_clock, Clock, ManualClock, SharedClock};

/// Handle de un timer programado: al soltarlo se cancela
pub struct TimerHandle {
    _guard: Box<dyn Any>,
}

impl TimerHandle {
    fn new(guard: impl Any) -> Self {
        Self { _guard: Box::new(guard) }
    }
}

impl std::fmt::Debug for TimerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("TimerHandle")
    }
}

/// Marca el timer como cancelado al soltarse; el callback queda inerte
struct CancelOnDrop(Rc<Cell<bool>>);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.set(true);
    }
}

/// Timer del navegador compartido entre el handle y su callback.
/// Soltar el handle suelta el Timeout (clearTimeout); al dispararse,
/// el callback lo saca de la ranura y el handle queda vacío.
struct TimerSlot<T>(Rc<RefCell<Option<T>>>);

impl<T> TimerSlot<T> {
    fn empty() -> Self {
        Self(Rc::new(RefCell::new(None)))
    }

    fn owner(&self) -> Weak<RefCell<Option<T>>> {
        Rc::downgrade(&self.0)
    }

    fn fill(&self, timer: T) {
        *self.0.borrow_mut() = Some(timer);
    }
}

impl<T> Drop for TimerSlot<T> {
    fn drop(&mut self) {
        // Se saca antes de soltarlo: el Drop del timer no debe ver la ranura prestada
        let pending = self.0.borrow_mut().take();
        drop(pending);
    }
}

/// Saca el timer disparado; None si su handle ya se soltó
fn take_fired<T>(owner: &Weak<RefCell<Option<T>>>) -> Option<T> {
    owner.upgrade().and_then(|slot| slot.borrow_mut().take())
}

pub trait Scheduler {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle;
    fn schedule_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TimerHandle;
}

pub type SharedScheduler = Rc<dyn Scheduler>;

/// Lanza una tarea local sin esperar su resultado
pub type Spawner = Rc<dyn Fn(LocalBoxFuture<'static, ()>)>;

/// Timers del navegador
#[derive(Debug, Clone, Copy, Default)]
pub struct GlooScheduler;

impl Scheduler for GlooScheduler {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        let slot = TimerSlot::empty();
        let owner = slot.owner();
        let timeout = Timeout::new(delay_ms, move || {
            // El Timeout se suelta al salir; el callback puede soltar su handle sin efecto
            let fired = take_fired(&owner);
            if fired.is_some() {
                callback();
            }
        });
        slot.fill(timeout);
        TimerHandle::new(slot)
    }

    fn schedule_interval(&self, period_ms: u32, mut callback: Box<dyn FnMut()>) -> TimerHandle {
        TimerHandle::new(Interval::new(period_ms, move || callback()))
    }
}

pub fn browser_scheduler() -> SharedScheduler {
    Rc::new(GlooScheduler)
}

pub fn browser_spawner() -> Spawner {
    Rc::new(|future| wasm_bindgen_futures::spawn_local(future))
}

/// Reloj + scheduler compartidos por los primitivos con timers
#[derive(Clone)]
pub struct Timers {
    pub clock: SharedClock,
    pub scheduler: SharedScheduler,
}

impl Timers {
    pub fn new(clock: SharedClock, scheduler: SharedScheduler) -> Self {
        Self { clock, scheduler }
    }

    pub fn browser() -> Self {
        Self::new(system_clock(), browser_scheduler())
    }

    /// Timers de tiempo virtual sobre un ManualScheduler
    pub fn manual(scheduler: &ManualScheduler) -> Self {
        Self::new(Rc::new(scheduler.clock().clone()), Rc::new(scheduler.clone()))
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    pub fn schedule(&self, delay_ms: u32, callback: impl FnOnce() + 'static) -> TimerHandle {
        self.scheduler.schedule(delay_ms, Box::new(callback))
    }

    pub fn schedule_interval(&self, period_ms: u32, callback: impl FnMut() + 'static) -> TimerHandle {
        self.scheduler.schedule_interval(period_ms, Box::new(callback))
    }
}

enum TaskCallback {
    Once(Box<dyn FnOnce()>),
    Repeat(Box<dyn FnMut()>, u32),
}

struct ManualTask {
    id: u64,
    due: i64,
    cancelled: Rc<Cell<bool>>,
    callback: TaskCallback,
}

#[derive(Default)]
struct ManualQueue {
    next_id: u64,
    tasks: Vec<ManualTask>,
}

/// Scheduler con tiempo virtual: `advance` dispara los timers vencidos en orden
#[derive(Clone, Default)]
pub struct ManualScheduler {
    clock: ManualClock,
    queue: Rc<RefCell<ManualQueue>>,
}

impl ManualScheduler {
    pub fn new(clock: ManualClock) -> Self {
        Self { clock, queue: Rc::default() }
    }

    pub fn clock(&self) -> &ManualClock {
        &self.clock
    }

    /// Timers activos (no cancelados)
    pub fn pending(&self) -> usize {
        self.queue
            .borrow()
            .tasks
            .iter()
            .filter(|task| !task.cancelled.get())
            .count()
    }

    pub fn advance(&self, ms: i64) {
        let target = self.clock.now_ms() + ms;
        loop {
            let next = {
                let mut queue = self.queue.borrow_mut();
                queue.tasks.retain(|task| !task.cancelled.get());
                let position = queue
                    .tasks
                    .iter()
                    .enumerate()
                    .filter(|(_, task)| task.due <= target)
                    .min_by_key(|(_, task)| (task.due, task.id))
                    .map(|(index, _)| index);
                position.map(|index| queue.tasks.remove(index))
            };
            let Some(task) = next else { break };

            self.clock.set(task.due);
            match task.callback {
                TaskCallback::Once(callback) => callback(),
                TaskCallback::Repeat(mut callback, period) => {
                    callback();
                    if !task.cancelled.get() {
                        self.queue.borrow_mut().tasks.push(ManualTask {
                            id: task.id,
                            due: task.due + i64::from(period.max(1)),
                            cancelled: task.cancelled,
                            callback: TaskCallback::Repeat(callback, period),
                        });
                    }
                }
            }
        }
        self.clock.set(target);
    }

    fn push(&self, delay_ms: u32, callback: TaskCallback) -> TimerHandle {
        let cancelled = Rc::new(Cell::new(false));
        let mut queue = self.queue.borrow_mut();
        let id = queue.next_id;
        queue.next_id += 1;
        queue.tasks.push(ManualTask {
            id,
            due: self.clock.now_ms() + i64::from(delay_ms),
            cancelled: cancelled.clone(),
            callback,
        });
        TimerHandle::new(CancelOnDrop(cancelled))
    }
}

impl Scheduler for ManualScheduler {
    fn schedule(&self, delay_ms: u32, callback: Box<dyn FnOnce()>) -> TimerHandle {
        self.push(delay_ms, TaskCallback::Once(callback))
    }

    fn schedule_interval(&self, period_ms: u32, callback: Box<dyn FnMut()>) -> TimerHandle {
        self.push(period_ms, TaskCallback::Repeat(callback, period_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_fire_in_due_order_and_drop_cancels() {
        let scheduler = ManualScheduler::new(ManualClock::new(0));
        let log = Rc::new(RefCell::new(Vec::new()));

        let (a, b) = (log.clone(), log.clone());
        let _late = scheduler.schedule(200, Box::new(move || a.borrow_mut().push("late")));
        let _early = scheduler.schedule(100, Box::new(move || b.borrow_mut().push("early")));
        let c = log.clone();
        let dropped = scheduler.schedule(150, Box::new(move || c.borrow_mut().push("dropped")));
        drop(dropped);

        scheduler.advance(199);
        assert_eq!(*log.borrow(), vec!["early"]);
        scheduler.advance(1);
        assert_eq!(*log.borrow(), vec!["early", "late"]);
        assert_eq!(scheduler.clock().now_ms(), 200);
    }

    struct DropCounter(Rc<Cell<u32>>);

    impl Drop for DropCounter {
        fn drop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_dropping_handle_releases_pending_timer() {
        let drops = Rc::new(Cell::new(0));
        let slot = TimerSlot::empty();
        let owner = slot.owner();
        slot.fill(DropCounter(drops.clone()));
        let handle = TimerHandle::new(slot);

        drop(handle);
        assert_eq!(drops.get(), 1);
        assert!(take_fired(&owner).is_none());
    }

    #[test]
    fn test_fired_timer_leaves_handle_empty() {
        let drops = Rc::new(Cell::new(0));
        let slot = TimerSlot::empty();
        let owner = slot.owner();
        slot.fill(DropCounter(drops.clone()));
        let handle = Rc::new(RefCell::new(Some(TimerHandle::new(slot))));

        // El callback suelta su propio handle mientras el timer sigue fuera de la ranura
        let fired = take_fired(&owner);
        assert!(fired.is_some());
        handle.borrow_mut().take();
        assert_eq!(drops.get(), 0);

        drop(fired);
        assert_eq!(drops.get(), 1);
        assert!(take_fired(&owner).is_none());
    }

    #[test]
    fn test_interval_repeats_until_handle_dropped() {
        let scheduler = ManualScheduler::new(ManualClock::new(0));
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let handle = scheduler.schedule_interval(30, Box::new(move || counter.set(counter.get() + 1)));

        scheduler.advance(95);
        assert_eq!(hits.get(), 3);

        drop(handle);
        scheduler.advance(100);
        assert_eq!(hits.get(), 3);
        assert_eq!(scheduler.pending(), 0);
    }
}
