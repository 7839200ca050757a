use std::sync::Arc;

use rustfft::num_complex::Complex32;

use super::{input_channel_for, mul_acc, SpectrumHistory};
use crate::error::{Error, Result};
use crate::fft::{FftPlan, FftScratch};
use crate::impulse_response::ImpulseResponse;

/// Streaming state for convolving against one filter.
///
/// For every output channel there is a ring of pending output blocks, kept as spectra.  Slot `head` is the block which
/// completes next; slot `head + p` receives the current input times partition `p`.  The ring is sized for the longest
/// filter this convolver may be given, so switching filters never reallocates.
///
/// All buffers are allocated by [PartitionedConvolver::new].  Nothing after that allocates.
pub(crate) struct PartitionedConvolver {
    plan: Arc<FftPlan>,
    impulse: Option<Arc<ImpulseResponse>>,

    /// `[channel][slot]`.
    slots: Vec<Vec<Box<[Complex32]>>>,
    head: usize,

    /// Second half of each channel's last inverse transform, which overlaps the next block.
    tails: Vec<Box<[f32]>>,

    /// The most recent block of output, `[channel][frame]`.
    output: Vec<Box<[f32]>>,

    time: Box<[f32]>,
    spectrum: Box<[Complex32]>,
    scratch: FftScratch,
}

impl PartitionedConvolver {
    /// A convolver producing `channels` outputs, able to hold filters of up to `max_partitions` partitions.
    pub(crate) fn new(
        plan: Arc<FftPlan>,
        channels: usize,
        max_partitions: usize,
    ) -> PartitionedConvolver {
        let size = plan.size();
        let hop = plan.hop();
        let capacity = max_partitions.max(1);

        let slots = (0..channels)
            .map(|_| {
                (0..capacity)
                    .map(|_| vec![Complex32::default(); size].into_boxed_slice())
                    .collect()
            })
            .collect();

        PartitionedConvolver {
            impulse: None,
            slots,
            head: 0,
            tails: (0..channels)
                .map(|_| vec![0.0f32; size - hop].into_boxed_slice())
                .collect(),
            output: (0..channels)
                .map(|_| vec![0.0f32; hop].into_boxed_slice())
                .collect(),
            time: vec![0.0f32; size].into_boxed_slice(),
            spectrum: vec![Complex32::default(); size].into_boxed_slice(),
            scratch: plan.make_scratch(),
            plan,
        }
    }

    fn capacity(&self) -> usize {
        self.slots.first().map_or(1, |s| s.len())
    }

    pub(crate) fn channels(&self) -> usize {
        self.output.len()
    }

    /// Check that `impulse` could be given to [PartitionedConvolver::set_impulse].
    pub(crate) fn check(&self, impulse: &ImpulseResponse) -> Result<()> {
        if impulse.transform_size() != self.plan.size() {
            return Err(Error::configuration(format!(
                "the impulse response was built with transform size {}, but the engine uses {}",
                impulse.transform_size(),
                self.plan.size()
            )));
        }

        if impulse.channels() != self.channels() {
            return Err(Error::configuration(format!(
                "the impulse response has {} channels, but the engine produces {}",
                impulse.channels(),
                self.channels()
            )));
        }

        if impulse.partition_count() > self.capacity() {
            return Err(Error::configuration(format!(
                "the impulse response has {} partitions, but the engine was sized for {}",
                impulse.partition_count(),
                self.capacity()
            )));
        }

        Ok(())
    }

    /// Replace the filter and clear all pending output.
    pub(crate) fn set_impulse(&mut self, impulse: Arc<ImpulseResponse>) -> Result<()> {
        self.check(&impulse)?;
        self.impulse = Some(impulse);
        self.clear();
        Ok(())
    }

    /// Drop all pending output, as if no audio had been processed.  The filter is kept.
    pub(crate) fn clear(&mut self) {
        for channel in self.slots.iter_mut() {
            for slot in channel.iter_mut() {
                slot.fill(Complex32::default());
            }
        }
        for tail in self.tails.iter_mut() {
            tail.fill(0.0);
        }
        for out in self.output.iter_mut() {
            out.fill(0.0);
        }
        self.head = 0;
    }

    /// Rebuild pending output from recent input, as if the current filter had been in use all along.
    ///
    /// Costs one multiply per (past block, partition) pair still affecting the future, about `P * P / 2`, plus one
    /// inverse transform per channel.
    pub(crate) fn prime(&mut self, history: &SpectrumHistory) {
        self.clear();

        let Some(impulse) = self.impulse.as_deref() else {
            return;
        };
        let partitions = impulse.partition_count();
        let capacity = self.capacity();
        let hop = self.plan.hop();

        for channel in 0..self.channels() {
            let input_channel = input_channel_for(history.channels(), channel);
            let parts = impulse.channel(channel);
            let slots = &mut self.slots[channel];

            // What each past block still owes the blocks yet to be output.
            for age in 1..partitions {
                let Some(past) = history.get(input_channel, age) else {
                    break;
                };
                for (p, part) in parts.iter().enumerate().skip(age) {
                    mul_acc(&mut slots[(self.head + p - age) % capacity], past, part);
                }
            }

            // The block before this one, of which only the overlapping second half matters.
            self.spectrum.fill(Complex32::default());
            for (age, part) in (1..=partitions).zip(parts.iter()) {
                let Some(past) = history.get(input_channel, age) else {
                    break;
                };
                mul_acc(&mut self.spectrum, past, part);
            }
            self.plan
                .inverse(&self.spectrum, &mut self.time, &mut self.scratch);
            self.tails[channel].copy_from_slice(&self.time[hop..]);
        }
    }

    /// Convolve one block, given its spectra, leaving the result in [PartitionedConvolver::output].
    ///
    /// `spectra` holds either one spectrum shared by every channel or one per channel.  Without a filter the output is
    /// silence.
    pub(crate) fn process(&mut self, spectra: &[Box<[Complex32]>]) {
        let Some(impulse) = self.impulse.as_deref() else {
            for out in self.output.iter_mut() {
                out.fill(0.0);
            }
            return;
        };

        let capacity = self.capacity();
        let hop = self.plan.hop();

        for channel in 0..self.output.len() {
            let input = &spectra[input_channel_for(spectra.len(), channel)];
            let slots = &mut self.slots[channel];

            for (p, part) in impulse.channel(channel).iter().enumerate() {
                mul_acc(&mut slots[(self.head + p) % capacity], input, part);
            }

            let ready = &mut slots[self.head];
            self.plan.inverse(ready, &mut self.time, &mut self.scratch);
            ready.fill(Complex32::default());

            let tail = &mut self.tails[channel];
            for ((out, now), before) in self.output[channel]
                .iter_mut()
                .zip(self.time[..hop].iter())
                .zip(tail.iter())
            {
                *out = now + before;
            }
            tail.copy_from_slice(&self.time[hop..]);
        }

        self.head = (self.head + 1) % capacity;
    }

    /// One channel of the block produced by the last call to [PartitionedConvolver::process].
    pub(crate) fn output(&self, channel: usize) -> &[f32] {
        &self.output[channel]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::close_floats::close_slices32;
    use crate::convolution::convolve_direct;
    use crate::reader::VecSignal;

    fn run(
        lane: &mut PartitionedConvolver,
        plan: &FftPlan,
        input: &[f32],
        history: Option<&mut SpectrumHistory>,
    ) -> Vec<f32> {
        let hop = plan.hop();
        let mut scratch = plan.make_scratch();
        let mut spectra = vec![vec![Complex32::default(); plan.size()].into_boxed_slice()];
        let mut out = vec![];
        let mut history = history;
        for block in input.chunks(hop) {
            plan.forward(block, &mut spectra[0], &mut scratch);
            lane.process(&spectra);
            out.extend_from_slice(&lane.output(0)[..block.len()]);
            if let Some(h) = history.as_deref_mut() {
                h.push(&spectra);
            }
        }
        out
    }

    #[test]
    fn matches_direct_convolution_block_for_block() {
        let plan = FftPlan::new(16).unwrap();
        let impulse: Vec<f32> = (0..29).map(|i| ((i * 7) % 5) as f32 - 2.0).collect();
        let ir = ImpulseResponse::build_undirected(&mut VecSignal::mono(impulse.clone()), &plan)
            .unwrap();

        let mut lane = PartitionedConvolver::new(plan.clone(), 1, ir.partition_count());
        lane.set_impulse(ir).unwrap();

        let input: Vec<f32> = (0..96).map(|i| ((i * 3) % 11) as f32 / 11.0 - 0.5).collect();
        let got = run(&mut lane, &plan, &input, None);
        let expected = convolve_direct(&input, &impulse);
        close_slices32(&got, &expected[..input.len()], 1e-3);
    }

    #[test]
    fn primed_lane_matches_one_which_ran_all_along() {
        let plan = FftPlan::new(8).unwrap();
        let impulse: Vec<f32> = (0..19).map(|i| 1.0 / (1 + i) as f32).collect();
        let ir = ImpulseResponse::build_undirected(&mut VecSignal::mono(impulse), &plan).unwrap();
        let partitions = ir.partition_count();

        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        let (before, after) = input.split_at(40);

        let mut all_along = PartitionedConvolver::new(plan.clone(), 1, partitions);
        all_along.set_impulse(ir.clone()).unwrap();
        let mut history = SpectrumHistory::new(1, partitions, plan.size());
        run(&mut all_along, &plan, before, Some(&mut history));

        let mut late = PartitionedConvolver::new(plan.clone(), 1, partitions);
        late.set_impulse(ir).unwrap();
        late.prime(&history);

        let expected = run(&mut all_along, &plan, after, None);
        let got = run(&mut late, &plan, after, None);
        close_slices32(&got, &expected, 1e-4);
    }

    #[test]
    fn rejects_mismatched_filters() {
        let plan = FftPlan::new(16).unwrap();
        let other = FftPlan::new(32).unwrap();
        let lane = PartitionedConvolver::new(plan.clone(), 1, 2);

        let wrong_size =
            ImpulseResponse::build_undirected(&mut VecSignal::mono(vec![1.0]), &other).unwrap();
        assert!(lane.check(&wrong_size).unwrap_err().is_configuration());

        let too_long =
            ImpulseResponse::build_undirected(&mut VecSignal::mono(vec![1.0; 40]), &plan).unwrap();
        assert!(lane.check(&too_long).unwrap_err().is_configuration());

        let stereo = ImpulseResponse::build_undirected(
            &mut VecSignal::from_channels(&[[1.0f32], [1.0]]),
            &plan,
        )
        .unwrap();
        assert!(lane.check(&stereo).unwrap_err().is_configuration());
    }

    #[test]
    fn no_filter_means_silence() {
        let plan = FftPlan::new(8).unwrap();
        let mut lane = PartitionedConvolver::new(plan.clone(), 2, 1);
        let got = run(&mut lane, &plan, &[1.0; 8], None);
        assert!(got.iter().all(|x| *x == 0.0));
    }
}
