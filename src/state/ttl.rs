// ============================================================================
// TTL - Marcas de tiempo de caché con tiempo de vida
// ============================================================================

/// Marca de última actualización; válida mientras `now - timestamp < ttl`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStamp {
    last_update: Option<i64>,
    ttl_ms: i64,
}

impl CacheStamp {
    pub fn new(ttl_ms: i64) -> Self {
        Self { last_update: None, ttl_ms }
    }

    pub fn is_valid(&self, now_ms: i64) -> bool {
        match self.last_update {
            Some(ts) => now_ms - ts < self.ttl_ms,
            None => false,
        }
    }

    pub fn touch(&mut self, now_ms: i64) {
        self.last_update = Some(now_ms);
    }

    pub fn invalidate(&mut self) {
        self.last_update = None;
    }

    pub fn last_update(&self) -> Option<i64> {
        self.last_update
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }
}

/// Valor cacheado junto con su instante de escritura
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub data: T,
    pub timestamp: i64,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, timestamp: i64) -> Self {
        Self { data, timestamp }
    }

    pub fn is_fresh(&self, now_ms: i64, ttl_ms: i64) -> bool {
        now_ms - self.timestamp < ttl_ms
    }
}
