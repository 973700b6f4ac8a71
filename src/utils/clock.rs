// ============================================================================
// CLOCK - Fuente de tiempo inyectable (ms desde epoch)
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

/// Fuente de tiempo en milisegundos
pub trait Clock {
    fn now_ms(&self) -> i64;
}

pub type SharedClock = Rc<dyn Clock>;

/// Reloj real basado en chrono
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Reloj manual para tests y simulaciones
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<i64>>,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self { now: Rc::new(Cell::new(start_ms)) }
    }

    pub fn advance(&self, ms: i64) {
        self.now.set(self.now.get() + ms);
    }

    pub fn set(&self, ms: i64) {
        self.now.set(ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.get()
    }
}

pub fn system_clock() -> SharedClock {
    Rc::new(SystemClock)
}
