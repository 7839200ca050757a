use std::sync::Arc;

use rustfft::num_complex::Complex32;

use crate::error::{Error, Result};
use crate::fft::FftPlan;
use crate::hrtf::Direction;
use crate::reader::SignalReader;

/// One transformed slice of an impulse response: `N / 2` raw samples zero-padded to `N` and transformed.
pub type Partition = Box<[Complex32]>;

/// Frames pulled from the reader per call while loading.
const READ_CHUNK_FRAMES: usize = 4096;

/// A filter preprocessed for partitioned convolution.
///
/// The source signal is split per channel into partitions of `N / 2` samples, each zero-padded to `N` and transformed,
/// where `N` is the size of the [FftPlan] used to build it.  The padding is what lets a partition be multiplied by an
/// equally padded input block without circular aliasing.
///
/// Impulse responses never change after construction and are handed out as `Arc`s, so any number of engines on any
/// number of threads may read one concurrently.  Not `Clone`.
pub struct ImpulseResponse {
    /// `[channel][partition]`.
    channels: Box<[Box<[Partition]>]>,
    length: usize,
    transform_size: usize,
    direction: Option<Direction>,
}

impl ImpulseResponse {
    /// Read all of `reader` and preprocess it into a filter for `direction`.
    ///
    /// Fails with an invalid impulse response error if the reader has no channels or no frames.
    pub fn build(
        reader: &mut dyn SignalReader,
        plan: &FftPlan,
        direction: Direction,
    ) -> Result<Arc<ImpulseResponse>> {
        Self::build_inner(reader, plan, Some(direction))
    }

    /// Like [ImpulseResponse::build], for filters which are not part of an HRTF and so have no direction.
    pub fn build_undirected(
        reader: &mut dyn SignalReader,
        plan: &FftPlan,
    ) -> Result<Arc<ImpulseResponse>> {
        Self::build_inner(reader, plan, None)
    }

    fn build_inner(
        reader: &mut dyn SignalReader,
        plan: &FftPlan,
        direction: Option<Direction>,
    ) -> Result<Arc<ImpulseResponse>> {
        let channel_count = reader.channels();
        if channel_count == 0 {
            return Err(Error::invalid_impulse_response(
                "the source signal has no channels",
            ));
        }

        let samples = read_deinterleaved(reader, channel_count)?;
        let length = samples[0].len();
        if length == 0 {
            return Err(Error::invalid_impulse_response(
                "the source signal has no frames",
            ));
        }

        let hop = plan.hop();
        let partition_count = length.div_ceil(hop);
        let mut scratch = plan.make_scratch();

        let mut channels = Vec::new();
        channels.try_reserve_exact(channel_count)?;
        for channel in samples.iter() {
            let mut partitions = Vec::new();
            partitions.try_reserve_exact(partition_count)?;

            for chunk in channel.chunks(hop) {
                let mut block = Vec::new();
                block.try_reserve_exact(plan.size())?;
                block.resize(plan.size(), Complex32::default());
                plan.forward(chunk, &mut block, &mut scratch);
                partitions.push(block.into_boxed_slice());
            }

            debug_assert_eq!(partitions.len(), partition_count);
            channels.push(partitions.into_boxed_slice());
        }

        log::debug!(
            "Built impulse response: {} channels, {} frames, {} partitions of size {}",
            channel_count,
            length,
            partition_count,
            plan.size()
        );

        Ok(Arc::new(ImpulseResponse {
            channels: channels.into_boxed_slice(),
            length,
            transform_size: plan.size(),
            direction,
        }))
    }

    pub fn channels(&self) -> usize {
        self.channels.len()
    }

    /// Length of the source signal in frames.
    pub fn length(&self) -> usize {
        self.length
    }

    /// Partitions per channel: `ceil(length / (N / 2))`.
    pub fn partition_count(&self) -> usize {
        self.channels[0].len()
    }

    /// `N`, the size of the transform this was built with.
    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    /// The direction this filter was built for, if any.
    pub fn direction(&self) -> Option<Direction> {
        self.direction
    }

    /// Partitions of channel `n`, in order.
    ///
    /// # Panics
    ///
    /// If `n` is not less than [ImpulseResponse::channels].
    pub fn channel(&self, n: usize) -> &[Partition] {
        &self.channels[n]
    }
}

impl std::fmt::Debug for ImpulseResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImpulseResponse")
            .field("channels", &self.channels())
            .field("length", &self.length)
            .field("partitions", &self.partition_count())
            .field("transform_size", &self.transform_size)
            .field("direction", &self.direction)
            .finish()
    }
}

/// Read `reader` to exhaustion, splitting frames into one buffer per channel.
fn read_deinterleaved(
    reader: &mut dyn SignalReader,
    channel_count: usize,
) -> Result<Vec<Vec<f32>>> {
    let mut channels: Vec<Vec<f32>> = Vec::new();
    channels.try_reserve_exact(channel_count)?;
    for _ in 0..channel_count {
        let mut channel = Vec::new();
        if let Some(frames) = reader.frames() {
            channel.try_reserve_exact(usize::try_from(frames).unwrap_or(0))?;
        }
        channels.push(channel);
    }

    let mut interleaved = vec![0.0f32; READ_CHUNK_FRAMES * channel_count];
    loop {
        let got = reader.read_frames(&mut interleaved)?;
        if got == 0 {
            break;
        }

        for (ch, channel) in channels.iter_mut().enumerate() {
            channel.try_reserve(got)?;
            channel.extend(
                interleaved[..got * channel_count]
                    .iter()
                    .skip(ch)
                    .step_by(channel_count),
            );
        }
    }

    Ok(channels)
}
