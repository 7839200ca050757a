//! Uniformly partitioned convolution.
//!
//! Audio is processed in blocks of `N / 2` frames.  Each block is zero-padded to `N` and transformed once; its
//! spectrum is multiplied against every partition of the filter, and each product is accumulated into the pending
//! output block it lands in.  The oldest pending block is then complete, and is transformed back and emitted.  Work
//! per block is proportional to the number of partitions, never to the length of the stream.
mod block_buffer;
mod convolver;
mod direct;
mod history;
mod partitioned;

pub use convolver::Convolver;
pub use direct::convolve_direct;

pub(crate) use block_buffer::BlockBuffer;
pub(crate) use history::SpectrumHistory;
pub(crate) use partitioned::PartitionedConvolver;

use rustfft::num_complex::Complex32;

/// Lifecycle of a streaming engine.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EngineState {
    /// Constructed or reset; no audio processed yet.
    Init,
    /// At least one block has been processed.
    Streaming,
}

/// `acc += a * b`, elementwise.
#[inline]
fn mul_acc(acc: &mut [Complex32], a: &[Complex32], b: &[Complex32]) {
    for ((o, x), h) in acc.iter_mut().zip(a.iter()).zip(b.iter()) {
        *o += *x * *h;
    }
}

/// Filters with more channels than the input are fed channel 0 of a mono input on every channel.
#[inline]
fn input_channel_for(input_channels: usize, output_channel: usize) -> usize {
    if input_channels == 1 {
        0
    } else {
        output_channel
    }
}
