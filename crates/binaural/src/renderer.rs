//! Positional rendering of a mono signal through an [Hrtf].
use std::sync::Arc;

use rustfft::num_complex::Complex32;

use crate::config::EngineConfig;
use crate::convolution::{BlockBuffer, EngineState, PartitionedConvolver, SpectrumHistory};
use crate::error::{Error, Result};
use crate::fft::{FftPlan, FftScratch};
use crate::hrtf::{Direction, Hrtf};
use crate::source::Source;

/// Renders one mono sound as if it came from the direction held by a [Source].
///
/// Once per block the renderer reads the source's direction and asks the [Hrtf] which filter that selects.  When the
/// selection changes, the new filter is brought up to date with recent input and faded in over
/// [EngineConfig::crossfade_blocks] blocks while the old one fades out.  Changes which arrive during a crossfade are
/// picked up once it finishes.
///
/// Everything is allocated and validated by [BinauralRenderer::new].  [BinauralRenderer::process] never allocates,
/// locks, or fails; problems there produce silence and are counted by [BinauralRenderer::faults].
pub struct BinauralRenderer {
    blocks: BlockBuffer,
    core: RendererCore,
}

struct Crossfade {
    /// Frames of the crossfade already output.
    elapsed: usize,
}

struct RendererCore {
    hrtf: Arc<Hrtf>,
    source: Arc<Source>,
    plan: Arc<FftPlan>,

    /// Two lanes, so that the outgoing filter keeps running while the incoming one fades in.
    lanes: [PartitionedConvolver; 2],
    active: usize,

    /// Position in the [Hrtf] of the filter on the active lane, or on the incoming lane during a crossfade.
    selected: usize,
    fade: Option<Crossfade>,
    crossfade_frames: usize,

    history: SpectrumHistory,
    spectra: [Box<[Complex32]>; 1],
    scratch: FftScratch,

    channels: usize,
    state: EngineState,
    faults: u64,
}

impl BinauralRenderer {
    /// Build a renderer for `source` through `hrtf`.
    ///
    /// Every filter in `hrtf` is checked against `plan` and `config` here, so that a later change of direction can never
    /// select a filter the engine cannot use.  Fails with a configuration error if the index is empty or if any
    /// transform size disagrees.
    pub fn new(
        hrtf: Arc<Hrtf>,
        source: Arc<Source>,
        plan: Arc<FftPlan>,
        config: EngineConfig,
    ) -> Result<BinauralRenderer> {
        config.validate()?;
        if plan.size() != config.transform_size() {
            return Err(Error::configuration(format!(
                "plan of size {} given to an engine configured for {}",
                plan.size(),
                config.transform_size()
            )));
        }

        let (Some(transform_size), Some(channels)) = (hrtf.transform_size(), hrtf.channels())
        else {
            return Err(Error::configuration("the HRTF has no filters"));
        };
        if transform_size != plan.size() {
            return Err(Error::configuration(format!(
                "the HRTF was built with transform size {}, but the engine uses {}",
                transform_size,
                plan.size()
            )));
        }

        let max_partitions = hrtf.max_partitions();
        let mut lanes = [
            PartitionedConvolver::new(plan.clone(), channels, max_partitions),
            PartitionedConvolver::new(plan.clone(), channels, max_partitions),
        ];
        for (_, impulse) in hrtf.iter() {
            lanes[0].check(impulse)?;
        }

        let selected = hrtf
            .lookup_index(source.direction())
            .ok_or_else(|| Error::configuration("the HRTF has no filters"))?;
        let impulse = hrtf
            .impulse_at(selected)
            .ok_or_else(|| Error::configuration("the HRTF has no filters"))?
            .clone();
        lanes[0].set_impulse(impulse)?;

        log::debug!(
            "Binaural renderer: {} filters, {} channels, {} partitions at most, transform size {}",
            hrtf.len(),
            channels,
            max_partitions,
            plan.size()
        );

        let hop = plan.hop();
        Ok(BinauralRenderer {
            blocks: BlockBuffer::new(hop, 1, channels),
            core: RendererCore {
                lanes,
                active: 0,
                selected,
                fade: None,
                crossfade_frames: config.crossfade_blocks() * hop,
                history: SpectrumHistory::new(1, max_partitions, plan.size()),
                spectra: [vec![Complex32::default(); plan.size()].into_boxed_slice()],
                scratch: plan.make_scratch(),
                channels,
                state: EngineState::Init,
                faults: 0,
                hrtf,
                source,
                plan,
            },
        })
    }

    /// Render mono `input` into interleaved `output`.
    ///
    /// `output` must hold [BinauralRenderer::channels] samples per input sample.  If it does not, `output` is silenced,
    /// the fault is counted, and no input is consumed.
    pub fn process(&mut self, input: &[f32], output: &mut [f32]) {
        if input.len() * self.core.channels != output.len() {
            rt_warn!(
                "BinauralRenderer given {} input samples but room for {} output samples; producing silence",
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

    /// Output channels, which is the channel count of the filters.
    pub fn channels(&self) -> usize {
        self.core.channels
    }

    pub fn state(&self) -> EngineState {
        self.core.state
    }

    pub fn faults(&self) -> u64 {
        self.core.faults
    }

    pub fn source(&self) -> &Arc<Source> {
        &self.core.source
    }

    /// The direction under which the currently selected filter is registered.
    ///
    /// During a crossfade this is the filter being faded in.
    pub fn selected_direction(&self) -> Direction {
        self.core
            .hrtf
            .direction_at(self.core.selected)
            .unwrap_or_default()
    }

    pub fn is_crossfading(&self) -> bool {
        self.core.fade.is_some()
    }

    /// Forget all audio processed so far and finish any crossfade immediately.  The selected filter is kept.
    pub fn reset(&mut self) {
        let core = &mut self.core;
        if core.fade.take().is_some() {
            core.active = 1 - core.active;
        }
        for lane in core.lanes.iter_mut() {
            lane.clear();
        }
        core.history.clear();
        core.state = EngineState::Init;
        self.blocks.clear();
    }
}

impl RendererCore {
    fn render_block(&mut self, input: &[f32], output: &mut [f32]) {
        self.state = EngineState::Streaming;

        self.plan
            .forward(input, &mut self.spectra[0], &mut self.scratch);

        self.poll_direction();

        let incoming = 1 - self.active;
        self.lanes[self.active].process(&self.spectra);
        if self.fade.is_some() {
            self.lanes[incoming].process(&self.spectra);
        }

        self.mix(output);
        self.history.push(&self.spectra);
    }

    /// Start a crossfade if the source has moved to a direction which selects a different filter.
    fn poll_direction(&mut self) {
        if self.fade.is_some() {
            return;
        }

        let direction = self.source.direction();
        let Some(wanted) = self.hrtf.lookup_index(direction) else {
            return;
        };
        if wanted == self.selected {
            return;
        }
        let Some(impulse) = self.hrtf.impulse_at(wanted) else {
            return;
        };

        let incoming = &mut self.lanes[1 - self.active];
        if let Err(e) = incoming.set_impulse(impulse.clone()) {
            self.faults += 1;
            rt_error!("Unable to switch filters for {:?}: {}", direction, e);
            return;
        }
        incoming.prime(&self.history);

        rt_debug!(
            "Crossfading from filter {} to filter {} for {:?}",
            self.selected,
            wanted,
            direction
        );
        self.selected = wanted;
        self.fade = Some(Crossfade { elapsed: 0 });
    }

    fn mix(&mut self, output: &mut [f32]) {
        let channels = self.channels;
        let outgoing = &self.lanes[self.active];

        let Some(fade) = self.fade.as_mut() else {
            for ch in 0..channels {
                for (o, x) in output
                    .iter_mut()
                    .skip(ch)
                    .step_by(channels)
                    .zip(outgoing.output(ch).iter())
                {
                    *o = *x;
                }
            }
            return;
        };

        let incoming = &self.lanes[1 - self.active];
        let length = self.crossfade_frames as f32;
        for ch in 0..channels {
            for (frame, ((o, old), new)) in output
                .iter_mut()
                .skip(ch)
                .step_by(channels)
                .zip(outgoing.output(ch).iter())
                .zip(incoming.output(ch).iter())
                .enumerate()
            {
                let gain = (fade.elapsed + frame + 1) as f32 / length;
                *o = old * (1.0 - gain) + new * gain;
            }
        }

        fade.elapsed += self.plan.hop();
        if fade.elapsed >= self.crossfade_frames {
            self.fade = None;
            self.active = 1 - self.active;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, Ordering};

    use crate::close_floats::close_slices32;
    use crate::convolution::convolve_direct;
    use crate::impulse_response::ImpulseResponse;
    use crate::reader::VecSignal;

    fn test_signal(len: usize, seed: u64) -> Vec<f32> {
        use rand::{Rng, SeedableRng};
        let mut rng = rand_xoshiro::Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..len).map(|_| rng.gen_range(-1.0f32..1.0)).collect()
    }

    /// Filters for each `(azimuth, elevation, left, right)`.
    fn hrtf(plan: &FftPlan, filters: &[(f32, f32, Vec<f32>, Vec<f32>)]) -> Arc<Hrtf> {
        let mut hrtf = Hrtf::new();
        for (az, el, left, right) in filters {
            let ir = ImpulseResponse::build(
                &mut VecSignal::from_channels(&[left, right]),
                plan,
                Direction::new(*az, *el),
            )
            .unwrap();
            hrtf.insert(ir).unwrap();
        }
        Arc::new(hrtf)
    }

    fn renderer(
        hrtf: Arc<Hrtf>,
        source: Arc<Source>,
        plan: Arc<FftPlan>,
        crossfade_blocks: usize,
    ) -> BinauralRenderer {
        let config = EngineConfig::default()
            .set_transform_size(plan.size())
            .set_crossfade_blocks(crossfade_blocks);
        BinauralRenderer::new(hrtf, source, plan, config).unwrap()
    }

    /// Render `input` one block per call and return the output with the latency removed, split into channels.
    fn render_blocks(
        renderer: &mut BinauralRenderer,
        input: &[f32],
        mut before_block: impl FnMut(usize),
    ) -> Vec<Vec<f32>> {
        let hop = renderer.latency();
        let channels = renderer.channels();
        let mut output = vec![0.0f32; input.len() * channels];
        for (i, (block, out)) in input
            .chunks(hop)
            .zip(output.chunks_mut(hop * channels))
            .enumerate()
        {
            before_block(i);
            renderer.process(block, out);
        }

        (0..channels)
            .map(|ch| {
                output
                    .iter()
                    .skip(ch)
                    .step_by(channels)
                    .skip(hop)
                    .copied()
                    .collect()
            })
            .collect()
    }

    #[test]
    fn fixed_direction_matches_direct_convolution() {
        let plan = FftPlan::new(64).unwrap();
        let left = test_signal(150, 1);
        let right = test_signal(150, 2);
        let hrtf = hrtf(
            &plan,
            &[
                (0.0, 0.0, vec![1.0], vec![1.0]),
                (90.0, 0.0, left.clone(), right.clone()),
            ],
        );
        let source = Arc::new(Source::new(80.0, 5.0));
        let mut renderer = renderer(hrtf, source, plan, 1);
        assert_eq!(renderer.selected_direction(), Direction::new(90.0, 0.0));

        let input = test_signal(32 * 20, 3);
        let got = render_blocks(&mut renderer, &input, |_| {});
        let len = got[0].len();
        close_slices32(&got[0], &convolve_direct(&input, &left)[..len], 1e-3);
        close_slices32(&got[1], &convolve_direct(&input, &right)[..len], 1e-3);
        assert_eq!(renderer.state(), EngineState::Streaming);
        assert_eq!(renderer.faults(), 0);
    }

    #[test]
    fn after_a_switch_output_is_the_new_filter_convolved_with_all_input() {
        let plan = FftPlan::new(32).unwrap();
        let a = test_signal(40, 10);
        let b = test_signal(70, 11);
        let hrtf = hrtf(
            &plan,
            &[(0.0, 0.0, a.clone(), a.clone()), (90.0, 0.0, b.clone(), b.clone())],
        );
        let source = Arc::new(Source::new(0.0, 0.0));
        let mut renderer = renderer(hrtf, source.clone(), plan, 1);

        let hop = 16;
        let switch_at = 10;
        let input = test_signal(hop * 30, 12);
        let got = render_blocks(&mut renderer, &input, |i| {
            if i == switch_at {
                source.set_azimuth(90.0);
            }
        });

        // Block `switch_at` is the crossfade; output lags by one block, which render_blocks removed.
        let with_a = convolve_direct(&input, &a);
        let with_b = convolve_direct(&input, &b);
        let fade_start = switch_at * hop;
        let fade_end = fade_start + hop;
        close_slices32(&got[0][..fade_start], &with_a[..fade_start], 1e-3);
        close_slices32(&got[0][fade_end..], &with_b[fade_end..got[0].len()], 1e-3);
        assert_eq!(renderer.selected_direction(), Direction::new(90.0, 0.0));
        assert!(!renderer.is_crossfading());
    }

    #[test]
    fn switching_is_smooth() {
        let plan = FftPlan::new(64).unwrap();
        let hrtf = hrtf(
            &plan,
            &[(0.0, 0.0, vec![1.0], vec![1.0]), (90.0, 0.0, vec![-1.0], vec![-1.0])],
        );
        let source = Arc::new(Source::new(0.0, 0.0));
        let mut renderer = renderer(hrtf, source.clone(), plan, 1);

        // Peaks land on block boundaries, where an abrupt switch would jump by 2.
        let input: Vec<f32> = (0..32 * 40)
            .map(|i| (2.0 * std::f32::consts::PI * (i as f32 + 16.0) / 64.0).sin())
            .collect();
        let got = render_blocks(&mut renderer, &input, |i| match i {
            10 => source.set_azimuth(90.0),
            21 => source.set_azimuth(0.0),
            _ => {}
        });

        for ch in got.iter() {
            let max_step = ch
                .windows(2)
                .map(|w| (w[1] - w[0]).abs())
                .fold(0.0f32, f32::max);
            // A sine of period 64 moves at most 2 * pi / 64 per sample; the fade adds 2 / 32.
            assert!(max_step < 0.2, "step of {}", max_step);
        }

        // Settled on the first filter again, after being inverted in between.
        close_slices32(&got[0][32 * 30..32 * 38], &input[32 * 30..32 * 38], 1e-4);
        let inverted: Vec<f32> = input[32 * 15..32 * 20].iter().map(|x| -x).collect();
        close_slices32(&got[0][32 * 15..32 * 20], &inverted, 1e-4);
    }

    #[test]
    fn changes_during_a_crossfade_wait_for_it_to_finish() {
        let plan = FftPlan::new(16).unwrap();
        let hrtf = hrtf(
            &plan,
            &[
                (0.0, 0.0, vec![1.0], vec![1.0]),
                (90.0, 0.0, vec![0.5], vec![0.5]),
                (180.0, 0.0, vec![0.25], vec![0.25]),
            ],
        );
        let source = Arc::new(Source::new(0.0, 0.0));
        let mut renderer = renderer(hrtf, source.clone(), plan, 3);
        let block = [1.0f32; 8];
        let mut out = [0.0f32; 16];

        renderer.process(&block, &mut out);
        assert!(!renderer.is_crossfading());

        source.set_azimuth(90.0);
        renderer.process(&block, &mut out);
        assert!(renderer.is_crossfading());
        assert_eq!(renderer.selected_direction(), Direction::new(90.0, 0.0));

        source.set_azimuth(180.0);
        renderer.process(&block, &mut out);
        renderer.process(&block, &mut out);
        assert_eq!(renderer.selected_direction(), Direction::new(90.0, 0.0));
        assert!(!renderer.is_crossfading());

        renderer.process(&block, &mut out);
        assert!(renderer.is_crossfading());
        assert_eq!(renderer.selected_direction(), Direction::new(180.0, 0.0));
    }

    #[test]
    fn concurrent_moves_never_select_from_a_torn_direction() {
        let plan = FftPlan::new(32).unwrap();
        // The writer only ever publishes the diagonal; the off-diagonal filters are selected only by torn reads.
        let hrtf = hrtf(
            &plan,
            &[
                (0.0, 0.0, vec![1.0], vec![1.0]),
                (90.0, 90.0, vec![0.5, 0.5], vec![0.5, -0.5]),
                (0.0, 90.0, vec![100.0], vec![100.0]),
                (90.0, 0.0, vec![100.0], vec![100.0]),
            ],
        );
        let source = Arc::new(Source::new(0.0, 0.0));
        let mut renderer = renderer(hrtf, source.clone(), plan, 1);
        let stop = Arc::new(AtomicBool::new(false));

        let writer = {
            let source = source.clone();
            let stop = stop.clone();
            std::thread::spawn(move || {
                let mut flip = false;
                while !stop.load(Ordering::Relaxed) {
                    let v = if flip { 90.0 } else { 0.0 };
                    source.set_direction(Direction::new(v, v));
                    flip = !flip;
                }
            })
        };

        let input = test_signal(16, 5);
        let mut output = [0.0f32; 32];
        for _ in 0..20_000 {
            renderer.process(&input, &mut output);
            let d = renderer.selected_direction();
            assert_eq!(d.azimuth, d.elevation, "{:?}", d);
            assert!(output.iter().all(|x| x.is_finite() && x.abs() < 4.0));
        }

        stop.store(true, Ordering::Relaxed);
        writer.join().unwrap();
        assert_eq!(renderer.faults(), 0);
    }

    #[test]
    fn construction_validates_transform_sizes() {
        let plan_512 = FftPlan::new(512).unwrap();
        let plan_1024 = FftPlan::new(1024).unwrap();
        let hrtf_512 = hrtf(&plan_512, &[(0.0, 0.0, vec![1.0], vec![1.0])]);
        let source = Arc::new(Source::new(0.0, 0.0));

        let err = BinauralRenderer::new(
            hrtf_512.clone(),
            source.clone(),
            plan_1024.clone(),
            EngineConfig::default(),
        )
        .err()
        .unwrap();
        assert!(err.is_configuration());

        let err = BinauralRenderer::new(
            hrtf_512.clone(),
            source.clone(),
            plan_512.clone(),
            EngineConfig::default(),
        )
        .err()
        .unwrap();
        assert!(err.is_configuration());

        let err = BinauralRenderer::new(
            Arc::new(Hrtf::new()),
            source.clone(),
            plan_1024,
            EngineConfig::default(),
        )
        .err()
        .unwrap();
        assert!(err.is_configuration());

        let renderer = BinauralRenderer::new(
            hrtf_512,
            source,
            plan_512,
            EngineConfig::default().set_transform_size(512),
        )
        .unwrap();
        assert_eq!(renderer.state(), EngineState::Init);
        assert_eq!(renderer.latency(), 256);
        assert_eq!(renderer.channels(), 2);
    }

    #[test]
    fn wrong_buffer_sizes_are_faults() {
        let plan = FftPlan::new(16).unwrap();
        let hrtf = hrtf(&plan, &[(0.0, 0.0, vec![1.0], vec![1.0])]);
        let mut renderer = renderer(hrtf, Arc::new(Source::new(0.0, 0.0)), plan, 1);

        let mut output = [1.0f32; 10];
        renderer.process(&[1.0; 8], &mut output);
        assert!(output.iter().all(|x| *x == 0.0));
        assert_eq!(renderer.faults(), 1);
        assert_eq!(renderer.state(), EngineState::Init);
    }

    #[test]
    fn reset_finishes_crossfades() {
        let plan = FftPlan::new(16).unwrap();
        let hrtf = hrtf(
            &plan,
            &[(0.0, 0.0, vec![1.0], vec![1.0]), (90.0, 0.0, vec![0.5], vec![0.5])],
        );
        let source = Arc::new(Source::new(0.0, 0.0));
        let mut renderer = renderer(hrtf, source.clone(), plan, 4);
        let mut out = [0.0f32; 16];

        renderer.process(&[1.0; 8], &mut out);
        source.set_azimuth(90.0);
        renderer.process(&[1.0; 8], &mut out);
        assert!(renderer.is_crossfading());

        renderer.reset();
        assert!(!renderer.is_crossfading());
        assert_eq!(renderer.state(), EngineState::Init);

        // One block of latency, then the new filter alone.
        let mut out = [0.0f32; 32];
        renderer.process(&[1.0; 16], &mut out);
        assert!(out[..16].iter().all(|x| *x == 0.0));
        close_slices32(&out[16..], &[0.5; 16], 1e-5);
    }
}
