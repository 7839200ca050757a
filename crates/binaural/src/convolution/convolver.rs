use std::sync::Arc;

use rustfft::num_complex::Complex32;

use super::{BlockBuffer, EngineState, PartitionedConvolver};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::fft::{FftPlan, FftScratch};
use crate::impulse_response::ImpulseResponse;

/// Streaming convolution against one fixed filter.
///
/// Input is either mono, in which case every filter channel convolves the same signal, or has one channel per filter
/// channel.  Output has one channel per filter channel.  Both are interleaved and may be any number of frames per
/// call; output lags input by [Convolver::latency] frames.
pub struct Convolver {
    impulse: Arc<ImpulseResponse>,
    blocks: BlockBuffer,
    core: ConvolverCore,
}

struct ConvolverCore {
    plan: Arc<FftPlan>,
    lane: PartitionedConvolver,
    input_channels: usize,
    /// One deinterleaved input channel.
    time: Box<[f32]>,
    /// `[input channel]`.
    spectra: Vec<Box<[Complex32]>>,
    scratch: FftScratch,
    state: EngineState,
    faults: u64,
}

impl Convolver {
    /// Attach `impulse` to a new engine.
    ///
    /// Fails with a configuration error if `plan`, `config` and `impulse` disagree about the transform size, or if
    /// `input_channels` is neither 1 nor the filter's channel count.
    pub fn new(
        impulse: Arc<ImpulseResponse>,
        plan: Arc<FftPlan>,
        input_channels: usize,
        config: EngineConfig,
    ) -> Result<Convolver> {
        config.validate()?;
        if plan.size() != config.transform_size() {
            return Err(Error::configuration(format!(
                "plan of size {} given to an engine configured for {}",
                plan.size(),
                config.transform_size()
            )));
        }

        let output_channels = impulse.channels();
        if input_channels != 1 && input_channels != output_channels {
            return Err(Error::configuration(format!(
                "{} input channels cannot feed a {}-channel filter",
                input_channels, output_channels
            )));
        }

        let mut lane =
            PartitionedConvolver::new(plan.clone(), output_channels, impulse.partition_count());
        lane.set_impulse(impulse.clone())?;

        let hop = plan.hop();
        Ok(Convolver {
            impulse,
            blocks: BlockBuffer::new(hop, input_channels, output_channels),
            core: ConvolverCore {
                lane,
                input_channels,
                time: vec![0.0f32; hop].into_boxed_slice(),
                spectra: (0..input_channels)
                    .map(|_| vec![Complex32::default(); plan.size()].into_boxed_slice())
                    .collect(),
                scratch: plan.make_scratch(),
                state: EngineState::Init,
                faults: 0,
                plan,
            },
        })
    }

    /// Convolve interleaved `input` into interleaved `output`.
    ///
    /// `output` must hold as many frames as `input`; if it does not, or if `input` is not a whole number of frames,
    /// `output` is filled with silence and the call is otherwise ignored.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        let ichans = self.core.input_channels;
        let ochans = self.core.lane.channels();
        if input.len() % ichans != 0 || input.len() / ichans * ochans != output.len() {
            rt_warn!(
                "Convolver given {} input samples and {} output samples; producing silence",
                input.len(),
                output.len()
            );
            output.fill(0.0);
            self.core.faults += 1;
            return;
        }

        let core = &mut self.core;
        self.blocks
            .process(input, output, |i, o| core.render_block(i, o));
    }

    /// Frames of delay between input and output.
    pub fn latency(&self) -> usize {
        self.core.plan.hop()
    }

    pub fn input_channels(&self) -> usize {
        self.core.input_channels
    }

    pub fn output_channels(&self) -> usize {
        self.core.lane.channels()
    }

    pub fn state(&self) -> EngineState {
        self.core.state
    }

    /// Calls to [Convolver::process] which produced silence instead of audio.
    pub fn faults(&self) -> u64 {
        self.core.faults
    }

    pub fn impulse(&self) -> &Arc<ImpulseResponse> {
        &self.impulse
    }

    /// Forget all audio processed so far.
    pub fn reset(&mut self) {
        self.blocks.clear();
        self.core.lane.clear();
        self.core.state = EngineState::Init;
    }
}

impl ConvolverCore {
    fn render_block(&mut self, input: &[f32], output: &mut [f32]) {
        self.state = EngineState::Streaming;

        let ichans = self.input_channels;
        for (ch, spectrum) in self.spectra.iter_mut().enumerate() {
            for (t, x) in self
                .time
                .iter_mut()
                .zip(input.iter().skip(ch).step_by(ichans))
            {
                *t = *x;
            }
            self.plan.forward(&self.time, spectrum, &mut self.scratch);
        }

        self.lane.process(&self.spectra);

        let ochans = self.lane.channels();
        for ch in 0..ochans {
            for (o, x) in output
                .iter_mut()
                .skip(ch)
                .step_by(ochans)
                .zip(self.lane.output(ch).iter())
            {
                *o = *x;
            }
        }
    }
}
