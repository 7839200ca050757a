//! Primitives for synchronization in audio contexts.
//!
//! Everything here lets a render thread exchange data with control threads without entering the kernel or waiting for
//! an unbounded amount of time.  The render half of any exchange never blocks: at worst it performs a single atomic
//! load.
mod atomic_f32_pair;
mod sync;

pub use atomic_f32_pair::AtomicF32Pair;
