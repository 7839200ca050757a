use rustfft::num_complex::Complex32;

/// The spectra of the most recent input blocks, per input channel.
///
/// The steady-state engine never looks backward: each block's contribution is pushed into the future as soon as it
/// arrives.  A filter which starts mid-stream has missed those pushes, and this is what lets it catch up.
pub(crate) struct SpectrumHistory {
    /// `[channel][slot]`.
    blocks: Vec<Vec<Box<[Complex32]>>>,
    /// Slot of the most recent block.
    newest: usize,
    /// Valid blocks, at most the capacity.
    filled: usize,
}

impl SpectrumHistory {
    pub(crate) fn new(channels: usize, capacity: usize, transform_size: usize) -> SpectrumHistory {
        let blocks = (0..channels)
            .map(|_| {
                (0..capacity)
                    .map(|_| vec![Complex32::default(); transform_size].into_boxed_slice())
                    .collect()
            })
            .collect();

        SpectrumHistory {
            blocks,
            newest: 0,
            filled: 0,
        }
    }

    pub(crate) fn channels(&self) -> usize {
        self.blocks.len()
    }

    fn capacity(&self) -> usize {
        self.blocks.first().map_or(0, |c| c.len())
    }

    /// Record the spectra of the block just processed, one per channel.
    pub(crate) fn push(&mut self, spectra: &[Box<[Complex32]>]) {
        let capacity = self.capacity();
        if capacity == 0 {
            return;
        }

        self.newest = (self.newest + 1) % capacity;
        for (channel, spectrum) in self.blocks.iter_mut().zip(spectra.iter()) {
            channel[self.newest].copy_from_slice(spectrum);
        }
        self.filled = (self.filled + 1).min(capacity);
    }

    /// The spectrum of the block `age` blocks ago; age 1 is the most recent.
    ///
    /// `None` if that block was never recorded or has been overwritten.
    pub(crate) fn get(&self, channel: usize, age: usize) -> Option<&[Complex32]> {
        if age == 0 || age > self.filled {
            return None;
        }
        let capacity = self.capacity();
        let slot = (self.newest + capacity - (age - 1)) % capacity;
        Some(&self.blocks[channel][slot])
    }

    pub(crate) fn clear(&mut self) {
        self.filled = 0;
        self.newest = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(v: f32) -> Box<[Complex32]> {
        vec![Complex32::new(v, 0.0); 4].into_boxed_slice()
    }

    #[test]
    fn ages_count_back_from_newest() {
        let mut history = SpectrumHistory::new(1, 3, 4);
        assert!(history.get(0, 1).is_none());

        for v in 1..=5 {
            history.push(&[block(v as f32)]);
        }

        assert_eq!(history.get(0, 1).unwrap()[0].re, 5.0);
        assert_eq!(history.get(0, 2).unwrap()[0].re, 4.0);
        assert_eq!(history.get(0, 3).unwrap()[0].re, 3.0);
        assert!(history.get(0, 4).is_none());
        assert!(history.get(0, 0).is_none());

        history.clear();
        assert!(history.get(0, 1).is_none());
    }
}
