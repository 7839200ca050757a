use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use binaural::{
    BinauralRenderer, Convolver, Direction, EngineConfig, FftPlan, Hrtf, ImpulseResponse, Source,
    VecSignal,
};

fn impulse(len: usize) -> Vec<f32> {
    (0..len).map(|i| 1.0 / (1 + i) as f32).collect()
}

pub fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("partitioned_convolution");

    for transform_size in [256usize, 1024] {
        for impulse_len in [128usize, 1024, 8192] {
            let hop = transform_size / 2;
            group.throughput(Throughput::Elements(hop as u64));
            group.bench_with_input(
                criterion::BenchmarkId::from_parameter(format!(
                    "transform_size={transform_size}, impulse_len={impulse_len}"
                )),
                &(transform_size, impulse_len),
                |b, (transform_size, impulse_len)| {
                    let plan = FftPlan::new(*transform_size).unwrap();
                    let ir = ImpulseResponse::build_undirected(
                        &mut VecSignal::from_channels(&[impulse(*impulse_len), impulse(*impulse_len)]),
                        &plan,
                    )
                    .unwrap();
                    let config = EngineConfig::default().set_transform_size(*transform_size);
                    let mut convolver = Convolver::new(ir, plan, 1, config).unwrap();

                    let input = (0..hop).map(|i| (i as f32 * 0.01).sin()).collect::<Vec<_>>();
                    let mut output = vec![0.0f32; hop * 2];
                    b.iter(|| {
                        convolver.process(&input, &mut output);
                        black_box(output.last());
                    });
                },
            );
        }
    }
    group.finish();

    let mut group = c.benchmark_group("binaural_renderer");
    for crossfade_blocks in [1usize, 4] {
        group.throughput(Throughput::Elements(512));
        group.bench_with_input(
            criterion::BenchmarkId::from_parameter(format!("crossfade_blocks={crossfade_blocks}")),
            &crossfade_blocks,
            |b, crossfade_blocks| {
                let plan = FftPlan::new(1024).unwrap();
                let mut hrtf = Hrtf::new();
                for az in (0..360).step_by(15) {
                    let ir = ImpulseResponse::build(
                        &mut VecSignal::from_channels(&[impulse(256), impulse(200)]),
                        &plan,
                        Direction::new(az as f32, 0.0),
                    )
                    .unwrap();
                    hrtf.insert(ir).unwrap();
                }

                let source = Arc::new(Source::new(0.0, 0.0));
                let config = EngineConfig::default().set_crossfade_blocks(*crossfade_blocks);
                let mut renderer =
                    BinauralRenderer::new(Arc::new(hrtf), source.clone(), plan, config).unwrap();

                let input = (0..512).map(|i| (i as f32 * 0.01).sin()).collect::<Vec<_>>();
                let mut output = vec![0.0f32; 1024];
                let mut azimuth = 0.0f32;
                b.iter(|| {
                    // Keep the source moving so that filter switches are part of the cost.
                    azimuth = (azimuth + 7.0) % 360.0;
                    source.set_azimuth(azimuth);
                    renderer.process(&input, &mut output);
                    black_box(output.last());
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
