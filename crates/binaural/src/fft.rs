//! The fixed-size spectral transform shared by impulse response preprocessing and the convolution engines.
use std::sync::Arc;

use rustfft::num_complex::Complex32;
use rustfft::{Fft, FftPlanner};

use crate::config::validate_transform_size;
use crate::error::Result;

/// A planned forward/inverse transform pair of one size.
///
/// Planning is expensive and happens once; a plan is then shared by reference between everything that must agree on
/// the transform size.  Transforms are complex and unnormalized on the way in; [FftPlan::inverse] divides by `N`, so
/// an inverse of a forward reproduces the input.
pub struct FftPlan {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
}

/// Working memory for one thread's transforms, so that transforming never allocates.
pub struct FftScratch {
    scratch: Vec<Complex32>,
    work: Vec<Complex32>,
}

impl FftPlan {
    pub fn new(size: usize) -> Result<Arc<FftPlan>> {
        validate_transform_size(size)?;

        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        log::debug!("Planned transforms of size {}", size);

        Ok(Arc::new(FftPlan {
            size,
            forward,
            inverse,
        }))
    }

    /// `N`.
    pub fn size(&self) -> usize {
        self.size
    }

    /// `N / 2`: raw samples per partition and frames per engine block.
    pub fn hop(&self) -> usize {
        self.size / 2
    }

    pub fn make_scratch(&self) -> FftScratch {
        let scratch_len = self
            .forward
            .get_inplace_scratch_len()
            .max(self.inverse.get_inplace_scratch_len());
        FftScratch {
            scratch: vec![Complex32::default(); scratch_len],
            work: vec![Complex32::default(); self.size],
        }
    }

    /// Transform up to `N` real samples, zero-padded to `N`, into `output`.
    ///
    /// `output` must be exactly `N` long.
    pub fn forward(&self, time: &[f32], output: &mut [Complex32], scratch: &mut FftScratch) {
        debug_assert!(time.len() <= self.size);
        debug_assert_eq!(output.len(), self.size);

        let (used, padding) = output.split_at_mut(time.len());
        for (o, t) in used.iter_mut().zip(time) {
            *o = Complex32::new(*t, 0.0);
        }
        padding.fill(Complex32::default());

        self.forward
            .process_with_scratch(output, &mut scratch.scratch[..]);
    }

    /// Transform `spectrum` back to the time domain, writing the first `output.len()` real samples.
    ///
    /// `spectrum` is left untouched.  `output` may not be longer than `N`.
    pub fn inverse(&self, spectrum: &[Complex32], output: &mut [f32], scratch: &mut FftScratch) {
        debug_assert_eq!(spectrum.len(), self.size);
        debug_assert!(output.len() <= self.size);

        let FftScratch { scratch, work } = scratch;
        work.copy_from_slice(spectrum);
        self.inverse.process_with_scratch(&mut work[..], &mut scratch[..]);

        let norm = 1.0 / self.size as f32;
        for (o, w) in output.iter_mut().zip(work.iter()) {
            *o = w.re * norm;
        }
    }
}

impl std::fmt::Debug for FftPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftPlan").field("size", &self.size).finish()
    }
}
