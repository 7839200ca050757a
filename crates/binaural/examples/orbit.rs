//! Move a sound in a circle around the listener and write the result to a wave file.
//!
//! The HRTF here is synthetic: each direction gets a pair of delayed, attenuated impulses approximating the difference
//! in arrival time and level between the ears.  Real measured sets load the same way, one [binaural::WavSignal] per
//! direction.
//!
//! Usage: `cargo run --example orbit -- output_path [mono_input.wav]`
use std::sync::Arc;

use anyhow::Result;

use binaural::{
    BinauralRenderer, Direction, EngineConfig, FftPlan, Hrtf, ImpulseResponse, SignalReader, Source, VecSignal,
    WavSignal,
};

const SR: u32 = 44100;

/// Impulse pair for a direction: the far ear hears the sound later and quieter.
fn synthetic_filter(azimuth: f32) -> [Vec<f32>; 2] {
    // Positive azimuths are to the right.
    let pan = azimuth.to_radians().sin();
    let max_delay = 30.0f32;
    let mut left = vec![0.0f32; max_delay as usize + 1];
    let mut right = left.clone();
    left[(max_delay * pan.max(0.0)) as usize] = 1.0 - 0.5 * pan.max(0.0);
    right[(max_delay * (-pan).max(0.0)) as usize] = 1.0 - 0.5 * (-pan).max(0.0);
    [left, right]
}

fn read_input(path: Option<&String>) -> Result<Vec<f32>> {
    let Some(path) = path else {
        // Three seconds of a 261 Hz sine.
        return Ok((0..SR * 3)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * 261.0 * i as f32 / SR as f32).sin())
            .collect());
    };

    let mut reader = WavSignal::open(path)?;
    anyhow::ensure!(reader.channels() == 1, "{} is not mono", path);
    let mut samples = vec![];
    let mut buf = vec![0.0f32; 4096];
    loop {
        let got = reader.read_frames(&mut buf)?;
        if got == 0 {
            break;
        }
        samples.extend_from_slice(&buf[..got]);
    }
    Ok(samples)
}

fn main() -> Result<()> {
    env_logger::init();

    let args = std::env::args().collect::<Vec<_>>();
    let file_path = args
        .get(1)
        .expect("Specify a file path as the first argument");
    let input = read_input(args.get(2))?;

    let config = EngineConfig::default().set_crossfade_blocks(2);
    let plan = FftPlan::new(config.transform_size())?;

    let mut hrtf = Hrtf::new();
    for azimuth in (0..360).step_by(10) {
        let azimuth = azimuth as f32;
        let ir = ImpulseResponse::build(
            &mut VecSignal::from_channels(&synthetic_filter(azimuth)),
            &plan,
            Direction::new(azimuth, 0.0),
        )?;
        hrtf.insert(ir)?;
    }

    let source = Arc::new(Source::new(0.0, 0.0));
    let mut renderer = BinauralRenderer::new(Arc::new(hrtf), source.clone(), plan, config)?;

    let spec = hound::WavSpec {
        channels: 2,
        sample_format: hound::SampleFormat::Float,
        bits_per_sample: 32,
        sample_rate: SR,
    };
    let mut writer = hound::WavWriter::create(file_path, spec)?;

    // One orbit every two seconds, updated every 10 ms the way a game loop would.
    let chunk = SR as usize / 100;
    let mut output = vec![0.0f32; chunk * 2];
    for (i, block) in input.chunks(chunk).enumerate() {
        let seconds = (i * chunk) as f32 / SR as f32;
        source.set_azimuth((seconds * 180.0) % 360.0);

        let out = &mut output[..block.len() * 2];
        renderer.process(block, out);
        for s in out.iter() {
            writer.write_sample(*s)?;
        }
    }

    writer.finalize()?;
    log::info!("Rendered with {} faults", renderer.faults());

    Ok(())
}
