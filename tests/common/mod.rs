//! Helpers shared by the integration tests.

#![allow(dead_code)]

use cv_sgm::cost_volume::CostVolume;
use cv_sgm::prelude::*;
use image::{ImageBuffer, Luma};
use rand::{rngs::StdRng, Rng, SeedableRng};

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Image of uniformly random 8 bit values.
pub fn random_image(width: u32, height: u32, seed: u64) -> Gray16Image {
    let mut rng = StdRng::seed_from_u64(seed);
    ImageBuffer::from_fn(width, height, |_, _| Luma([rng.random_range(0..256u16)]))
}

/// Right image of a pair where every left pixel `x` matches right pixel `x - disparity`.
/// Columns with no left counterpart are filled with noise.
pub fn shifted_right(left: &Gray16Image, disparity: u32, seed: u64) -> Gray16Image {
    let mut rng = StdRng::seed_from_u64(seed);
    let width = left.width();
    ImageBuffer::from_fn(width, left.height(), |x, y| {
        if x + disparity < width {
            *left.get_pixel(x + disparity, y)
        } else {
            Luma([rng.random_range(0..256u16)])
        }
    })
}

/// Cost volume filled with uniform random values in `0..max`.
pub fn random_volume(width: usize, height: usize, range: usize, max: u16, seed: u64) -> CostVolume {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut volume = CostVolume::new(width, height, range);
    volume
        .as_mut_slice()
        .iter_mut()
        .for_each(|v| *v = rng.random_range(0..max));
    volume
}
