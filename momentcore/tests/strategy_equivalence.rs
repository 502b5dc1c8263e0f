use momentcore::{
    reduce, reduce_raw, CubeView, Moment, MomentMaps, MomentOutputs, MomentSelection, ReduceOptions,
    Strategy as ReduceStrategy,
};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::error::Error;

fn random_cube(rng: &mut StdRng, channels: usize, height: usize, width: usize) -> Vec<f32> {
    let pixels = height * width;
    let mut data = vec![0.0f32; channels * pixels];
    for p in 0..pixels {
        // a few fully masked and a few zero-flux pixels
        let kind = rng.gen_range(0..20);
        for c in 0..channels {
            data[c * pixels + p] = match kind {
                0 => f32::NAN,
                1 => 0.0,
                _ if rng.gen_bool(0.15) => f32::NAN,
                _ => rng.gen_range(0.0f32..10.0),
            };
        }
    }
    data
}

fn assert_close(a: &MomentMaps, b: &MomentMaps, vmax: f32, label: &str) {
    for m in Moment::ALL {
        let (x, y) = match (a.get(m), b.get(m)) {
            (Some(x), Some(y)) => (x, y),
            (None, None) => continue,
            _ => panic!("[{label}] {m} present in only one result"),
        };
        for (i, (&p, &q)) in x.iter().zip(y).enumerate() {
            if p.is_nan() || q.is_nan() {
                assert!(p.is_nan() && q.is_nan(), "[{label}] {m} pixel {i}: {p} vs {q}");
                continue;
            }
            let tol = 1e-5 * p.abs().max(q.abs()) + 1e-5 * vmax;
            assert!(
                (p - q).abs() <= tol,
                "[{label}] {m} pixel {i}: single {p}, two-pass {q}"
            );
        }
    }
}

#[test]
fn single_and_two_pass_agree_on_random_cubes() -> Result<(), Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for (channels, height, width) in [(1, 3, 3), (16, 9, 13), (64, 32, 17), (200, 5, 5)] {
        let data = random_cube(&mut rng, channels, height, width);
        let v: Vec<f32> = (0..channels).map(|c| -40.0 + c as f32 * 0.35).collect();
        let vmax = v.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        let cube = CubeView::new(&data, channels, height, width)?;

        let fast = reduce(&cube, &v, 0.35, MomentSelection::all(), &ReduceOptions::default().with_min_pixels_per_task(7))?;
        let oracle = reduce(
            &cube,
            &v,
            0.35,
            MomentSelection::all(),
            &ReduceOptions::serial().with_strategy(ReduceStrategy::TwoPass),
        )?;
        assert_close(&fast, &oracle, vmax, &format!("{channels}x{height}x{width}"));

        // Σi runs in the same channel order in both, so moment 0 matches exactly
        assert_eq!(bits(fast.mom0.as_ref().unwrap()), bits(oracle.mom0.as_ref().unwrap()));
    }
    Ok(())
}

#[test]
fn raw_entry_point_matches_reduce() -> Result<(), Box<dyn Error>> {
    let mut rng = StdRng::seed_from_u64(7);
    let (channels, height, width) = (12, 6, 4);
    let data = random_cube(&mut rng, channels, height, width);
    let v: Vec<f32> = (0..channels).map(|c| c as f32).collect();
    let cube = CubeView::new(&data, channels, height, width)?;
    let expected = reduce(&cube, &v, 2.0, MomentSelection::new(false, true, true), &ReduceOptions::default())?;

    let mut m1 = vec![0.0f32; height * width];
    let mut m2 = vec![0.0f32; height * width];
    reduce_raw(
        &data,
        &v,
        channels,
        height,
        width,
        2.0,
        false,
        true,
        true,
        MomentOutputs::new(None, Some(&mut m1[..]), Some(&mut m2[..])),
    )?;
    assert!(expected.mom0.is_none());
    assert_eq!(expected.mom1.as_deref().map(|m| bits(m)), Some(bits(&m1)));
    assert_eq!(expected.mom2.as_deref().map(|m| bits(m)), Some(bits(&m2)));
    Ok(())
}

fn bits(m: &[f32]) -> Vec<u32> {
    m.iter().map(|x| x.to_bits()).collect()
}

fn cube_strategy() -> impl Strategy<Value = (usize, usize, usize, Vec<f32>, Vec<f32>)> {
    (1usize..24, 1usize..6, 1usize..6).prop_flat_map(|(c, h, w)| {
        let sample = prop_oneof![4 => 0.0f32..50.0, 1 => Just(f32::NAN)];
        (
            Just(c),
            Just(h),
            Just(w),
            prop::collection::vec(sample, c * h * w),
            prop::collection::vec(-300.0f32..300.0, c),
        )
    })
}

proptest! {
    #[test]
    fn strategies_agree((c, h, w, data, v) in cube_strategy(), dv in 0.01f64..10.0) {
        let cube = CubeView::new(&data, c, h, w).unwrap();
        let vmax = v.iter().fold(0.0f32, |m, x| m.max(x.abs()));
        let fast = reduce(&cube, &v, dv, MomentSelection::all(), &ReduceOptions::default().with_min_pixels_per_task(2)).unwrap();
        let oracle = reduce(&cube, &v, dv, MomentSelection::all(), &ReduceOptions::serial().with_strategy(ReduceStrategy::TwoPass)).unwrap();
        assert_close(&fast, &oracle, vmax, "proptest");
        for &m2 in fast.mom2.as_ref().unwrap() {
            prop_assert!(m2.is_nan() || m2 >= 0.0);
        }
    }
}
