use figment::Figment;
use figment::providers::{Env, Serialized};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Deserialize, Serialize)]
pub struct WorkerConfig {
    /// Comma-separated `"SOURCE -> TARGET"` route specs. No default; an empty
    /// route list fails startup.
    pub routes: String,
    pub db_pool_size: u32,
    pub conversion_workers: usize,
    pub delivery_workers: usize,
    pub poll_interval_seconds: u64,
    pub gc_interval_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            routes: String::new(),
            // The pool is the only shared resource; it is sized so that all
            // workers of both stages plus the garbage collector can hold a
            // connection without starving each other.
            db_pool_size: 16,
            conversion_workers: 7,
            delivery_workers: 7,
            poll_interval_seconds: 3,
            gc_interval_seconds: 300,
        }
    }
}

impl WorkerConfig {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default())).merge(Env::prefixed("TENSO_"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}
