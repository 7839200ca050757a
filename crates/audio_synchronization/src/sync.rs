//! Re-exports of the synchronization primitives this crate builds on, switched to loom's models under `--cfg loom`.
#[cfg(not(loom))]
mod std_backed {
    pub use std::sync::atomic::{AtomicU64, Ordering};
    #[cfg(test)]
    pub use std::sync::Arc;
    #[cfg(test)]
    pub use std::thread::spawn;

    #[cfg(test)]
    pub fn model(what: impl Fn() + Sync + Send + 'static) {
        what()
    }
}

#[cfg(not(loom))]
pub(crate) use std_backed::*;

#[cfg(loom)]
mod loom_backed {
    pub use loom::sync::atomic::{AtomicU64, Ordering};
    #[cfg(test)]
    pub use loom::sync::Arc;
    #[cfg(test)]
    pub use loom::thread::spawn;

    #[cfg(test)]
    pub fn model(what: impl Fn() + Sync + Send + 'static) {
        loom::model(what)
    }
}

#[cfg(loom)]
pub(crate) use loom_backed::*;
