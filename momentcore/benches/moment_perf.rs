use criterion::{black_box, criterion_group, criterion_main, Criterion};
extern crate momentcore as mc;
use mc::{CubeView, MomentSelection, ReduceOptions, Strategy};

const CHANNELS: usize = 128;
const HEIGHT: usize = 256;
const WIDTH: usize = 256;

fn make_cube() -> (Vec<f32>, Vec<f32>) {
    let n = CHANNELS * HEIGHT * WIDTH;
    let data = (0..n)
        .map(|i| {
            if i % 97 == 0 {
                f32::NAN
            } else {
                ((i as u64).wrapping_mul(2654435761) % 1000) as f32 * 1e-3
            }
        })
        .collect();
    let v = (0..CHANNELS).map(|c| -50.0 + c as f32 * 0.8).collect();
    (data, v)
}

fn bench_moments(c: &mut Criterion) {
    let (data, v) = make_cube();
    let cube = CubeView::new(&data, CHANNELS, HEIGHT, WIDTH).unwrap();
    let cases = [
        ("single_pass_parallel", ReduceOptions::default()),
        ("single_pass_serial", ReduceOptions::serial()),
        ("two_pass_parallel", ReduceOptions::default().with_strategy(Strategy::TwoPass)),
        ("two_pass_serial", ReduceOptions::serial().with_strategy(Strategy::TwoPass)),
    ];
    for (name, opts) in cases {
        c.bench_function(name, |b| {
            b.iter(|| {
                mc::reduce(&cube, &v, 0.8, MomentSelection::all(), black_box(&opts)).unwrap()
            })
        });
    }
}

criterion_group!(benches, bench_moments);
criterion_main!(benches);
