//! Tests for the census transform and matching cost functions

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

mod common;

use cv_sgm::census::{census_bits, census_transform, CensusImage};
use cv_sgm::cost::{fill_cost_volume, HammingCost, MutualInformationCost};
use cv_sgm::cost_volume::{CostVolume, DisparityRange};
use cv_sgm::prelude::*;
use cv_sgm::Error;
use image::{ImageBuffer, Luma};

use common::*;

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn census_window_sizes() {
    assert_eq!(8, census_bits(1));
    assert_eq!(24, census_bits(2));
    assert_eq!(48, census_bits(3));

    let img = random_image(8, 8, 1);
    for &radius in [0u32, 4].iter() {
        assert_eq!(
            Error::UnsupportedCensusRadius(radius),
            census_transform(&img, radius).unwrap_err()
        );
    }
}

#[test]
fn census_marks_brighter_neighbours() {
    let img: Gray16Image =
        ImageBuffer::from_fn(9, 9, |x, y| Luma([if (x, y) == (5, 5) { 200 } else { 10 }]));

    let census = census_transform(&img, 1).unwrap();
    assert_eq!((9, 9, 8), (census.width(), census.height(), census.bits()));
    assert_eq!(1, census.get(4, 4).count_ones());
    assert_eq!(1, census.get(6, 6).count_ones());
    assert_eq!(0, census.get(5, 5));
    assert_eq!(0, census.get(1, 1));

    // Flat image has no brighter neighbours, borders included
    let flat: Gray16Image = ImageBuffer::from_pixel(7, 5, Luma([42]));
    let census = census_transform(&flat, 3).unwrap();
    assert!(census.as_slice().iter().all(|&d| d == 0));
}

#[test]
fn hamming_cost_is_normalised() {
    let cost = HammingCost::new(24, 2047);
    assert_eq!(2047, cost.max_cost());

    let left = [0u64, 0xFF_FFFF, 0xFFF];
    let right = [0u64, 0, 0];
    let mut out = vec![0u16; 3];
    cost.compute_row(&left, &right, DisparityRange::new(0, 1).unwrap(), &mut out);
    assert_eq!(vec![0, 2047, 2047 * 12 / 24], out);
}

#[test]
fn unsampled_disparities_get_max_cost() {
    let left = CensusImage::from_raw(6, 1, 8, vec![0; 6]).unwrap();
    let right = CensusImage::from_raw(6, 1, 8, vec![0; 6]).unwrap();
    let cost = HammingCost::for_census(&left, 800);

    let mut volume = CostVolume::default();
    let range = DisparityRange::new(2, 3).unwrap();
    fill_cost_volume(&cost, left.as_slice(), right.as_slice(), 6, 1, range, &mut volume).unwrap();

    assert_eq!((6, 1, 3), volume.shape());
    for x in 0..6 {
        for d in 0..3 {
            let expected = if d < range.local_count(x) { 0 } else { 800 };
            assert_eq!(expected, volume.get(x, 0, d), "x={} d={}", x, d);
        }
    }
}

#[test]
fn census_cost_is_zero_at_true_disparity() {
    let left = random_image(40, 20, 3);
    let right = shifted_right(&left, 5, 4);
    let (lc, rc) = (
        census_transform(&left, 2).unwrap(),
        census_transform(&right, 2).unwrap(),
    );

    let mut volume = CostVolume::new(1, 1, 1);
    let range = DisparityRange::new(0, 10).unwrap();
    fill_cost_volume(
        &HammingCost::for_census(&lc, 2047),
        lc.as_slice(),
        rc.as_slice(),
        40,
        20,
        range,
        &mut volume,
    )
    .unwrap();

    // Away from the borders the true match has identical descriptors
    for y in 2..18 {
        for x in 7..33 {
            assert_eq!(0, volume.get(x, y, 5), "x={} y={}", x, y);
        }
    }
}

#[test]
fn mutual_information_cost_uses_scaled_table() {
    let mut model = MutualInformationModel::new();
    model.configure_histogram(255, 255);
    assert!(matches!(
        MutualInformationCost::new(&model),
        Err(Error::ModelNotTrained)
    ));

    model.diagonal_cost(1.0, 1000).unwrap();
    let cost = MutualInformationCost::new(&model).unwrap();
    assert_eq!(1000, cost.max_cost());

    let left = [7u16, 7, 7, 9];
    let right = [7u16, 7, 3, 3];
    let mut out = vec![0u16; 8];
    cost.compute_row(&left, &right, DisparityRange::new(0, 2).unwrap(), &mut out);
    assert_eq!(vec![50, 1000, 50, 50, 333, 50, 333, 333], out);
}

#[test]
fn mismatched_inputs_are_rejected() {
    let cost = HammingCost::new(8, 100);
    let mut volume = CostVolume::default();
    let range = DisparityRange::new(0, 4).unwrap();
    assert!(matches!(
        fill_cost_volume(&cost, &[0u64; 12], &[0u64; 10], 4, 3, range, &mut volume),
        Err(Error::DimensionMismatch { .. })
    ));
    assert!(CensusImage::from_raw(4, 3, 8, vec![0; 11]).is_none());
}
