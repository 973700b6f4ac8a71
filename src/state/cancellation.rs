// ============================================================================
// CANCELACIÓN - Token compartido + generación de peticiones
// ============================================================================
// Las peticiones en vuelo no se abortan; sus respuestas se descartan
// si el token fue cancelado o si la generación cambió entretanto.
// ============================================================================

use std::cell::Cell;
use std::rc::Rc;

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Rc<Cell<bool>>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.get()
    }
}

/// Contador de generaciones: cada nueva petición invalida las anteriores
#[derive(Debug, Clone, Default)]
pub struct RequestGeneration {
    current: Rc<Cell<u64>>,
}

impl RequestGeneration {
    pub fn new() -> Self {
        Self::default()
    }

    /// Abre una generación nueva y devuelve su ticket
    pub fn next(&self) -> u64 {
        let next = self.current.get() + 1;
        self.current.set(next);
        next
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.current.get() == ticket
    }

    /// Invalida todo lo que esté en vuelo
    pub fn bump(&self) {
        self.next();
    }
}
