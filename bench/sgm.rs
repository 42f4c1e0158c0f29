use criterion::{black_box, criterion_group, criterion_main, Criterion};

use cv_sgm::aggregation::{AggregationConfig, PathAggregator};
use cv_sgm::cost_volume::CostVolume;
use cv_sgm::prelude::*;
use image::{ImageBuffer, Luma};
use rand::{rngs::StdRng, Rng, SeedableRng};

fn synthetic_pair(width: u32, height: u32, disparity: u32) -> StereoPair {
    let mut rng = StdRng::seed_from_u64(0);
    let left: Gray16Image =
        ImageBuffer::from_fn(width, height, |_, _| Luma([rng.random_range(0..256u16)]));
    let right = ImageBuffer::from_fn(width, height, |x, y| {
        if x + disparity < width {
            *left.get_pixel(x + disparity, y)
        } else {
            Luma([0])
        }
    });
    StereoPair::new(left, right).unwrap()
}

fn aggregation_bench(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(1);
    let mut volume = CostVolume::new(320, 240, 64);
    volume
        .as_mut_slice()
        .iter_mut()
        .for_each(|v| *v = rng.random_range(0..2048));

    for &paths in [8usize, 16].iter() {
        let mut agg = PathAggregator::new(AggregationConfig {
            paths,
            ..AggregationConfig::default()
        })
        .unwrap();
        c.bench_function(&format!("aggregate 320x240x64 {} paths", paths), |b| {
            b.iter(|| {
                agg.process(black_box(&volume), 0).unwrap();
            })
        });
    }
}

fn census_bench(c: &mut Criterion) {
    let pair = synthetic_pair(320, 240, 12);
    let mut alg = SgmCensus::new(CensusParams::default()).unwrap();

    c.bench_function("census sgm 320x240", |b| b.iter(|| alg.compute(black_box(&pair))));
}

fn hmi_bench(c: &mut Criterion) {
    let pair = synthetic_pair(320, 240, 12);
    let mut alg = SgmMutualInformation::new(HmiParams::default()).unwrap();

    c.bench_function("hmi sgm 320x240", |b| b.iter(|| alg.compute(black_box(&pair))));
}

criterion_group!(benches, aggregation_bench, census_bench, hmi_bench);
criterion_main!(benches);
