use crate::sync::{AtomicU64, Ordering};

/// Two `f32` values which are always read and written together.
///
/// Both halves are packed into one 64-bit atomic, so a reader gets a consistent snapshot of the pair in a single load
/// and can never observe one half of an update without the other.  Storing both halves is a single atomic store.
/// Changing only one half must preserve the other, which requires a CAS loop: writers may retry, readers never do.
///
/// Values are stored by bit pattern.  What comes out is exactly what went in, including negative zero, infinities and
/// NaN payloads.
pub struct AtomicF32Pair {
    storage: AtomicU64,
}

#[inline(always)]
fn pack(first: f32, second: f32) -> u64 {
    ((first.to_bits() as u64) << 32) | (second.to_bits() as u64)
}

#[inline(always)]
fn unpack(packed: u64) -> (f32, f32) {
    let first = f32::from_bits((packed >> 32) as u32);
    let second = f32::from_bits(packed as u32);
    (first, second)
}

impl AtomicF32Pair {
    pub fn new(first: f32, second: f32) -> AtomicF32Pair {
        AtomicF32Pair {
            storage: AtomicU64::new(pack(first, second)),
        }
    }

    /// Load both values as one snapshot.
    #[inline(always)]
    pub fn load(&self, ordering: Ordering) -> (f32, f32) {
        unpack(self.storage.load(ordering))
    }

    /// Replace both values at once.
    #[inline(always)]
    pub fn store(&self, first: f32, second: f32, ordering: Ordering) {
        self.storage.store(pack(first, second), ordering);
    }

    /// Apply `updater` to the current pair until the result can be stored without racing another writer.
    ///
    /// Returns the pair which was stored.  `updater` may run more than once and should therefore be pure.
    pub fn update(
        &self,
        mut updater: impl FnMut((f32, f32)) -> (f32, f32),
        ordering: Ordering,
    ) -> (f32, f32) {
        let mut current = self.storage.load(Ordering::Relaxed);
        loop {
            let (first, second) = updater(unpack(current));
            let new = pack(first, second);
            match self
                .storage
                .compare_exchange_weak(current, new, ordering, Ordering::Relaxed)
            {
                Ok(_) => return (first, second),
                Err(actual) => current = actual,
            }
        }
    }

    /// Replace the first value, preserving the second.
    pub fn store_first(&self, first: f32, ordering: Ordering) {
        self.update(|(_, second)| (first, second), ordering);
    }

    /// Replace the second value, preserving the first.
    pub fn store_second(&self, second: f32, ordering: Ordering) {
        self.update(|(first, _)| (first, second), ordering);
    }
}

impl std::fmt::Debug for AtomicF32Pair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (first, second) = self.load(Ordering::Relaxed);
        f.debug_tuple("AtomicF32Pair")
            .field(&first)
            .field(&second)
            .finish()
    }
}
