//! Tests for image pyramids and disparity resampling

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

mod common;

use cv_sgm::prelude::*;
use cv_sgm::pyramid::{build_pyramid, resample_disparity};
use cv_sgm::Error;
use image::{ImageBuffer, Luma};

use common::*;

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn pyramid_halves_each_level() {
    let img = random_image(64, 48, 8);
    let pyramid = build_pyramid(&img, 3).unwrap();

    let sizes: Vec<(u32, u32)> = pyramid.iter().map(|p| p.dimensions()).collect();
    assert_eq!(vec![(64, 48), (32, 24), (16, 12)], sizes);
    assert_eq!(&img, &pyramid[0]);

    // Odd and tiny sizes never reach zero
    let tiny = random_image(3, 1, 9);
    let sizes: Vec<(u32, u32)> = build_pyramid(&tiny, 3)
        .unwrap()
        .iter()
        .map(|p| p.dimensions())
        .collect();
    assert_eq!(vec![(3, 1), (1, 1), (1, 1)], sizes);

    assert_eq!(
        Error::InvalidPyramidLevels(0),
        build_pyramid(&img, 0).unwrap_err()
    );
}

#[test]
fn pyramid_keeps_flat_regions_flat() {
    let img: Gray16Image = ImageBuffer::from_pixel(20, 20, Luma([77]));
    for level in build_pyramid(&img, 3).unwrap() {
        assert!(level.pixels().all(|p| (p[0] as i32 - 77).abs() <= 1));
    }
}

#[test]
fn upsampled_disparity_is_scaled() {
    let mut coarse = DisparityMap::filled(4, 3, 3, INVALID_DISPARITY);
    coarse.put(1, 1, INVALID_DISPARITY);

    let fine = resample_disparity(&coarse, 8, 6);
    assert_eq!((8, 6), (fine.width(), fine.height()));
    assert_eq!(6, fine.get(0, 0));
    assert_eq!(6, fine.get(7, 5));
    for (x, y) in [(2, 2), (3, 2), (2, 3), (3, 3)].iter() {
        assert_eq!(INVALID_DISPARITY, fine.get(*x, *y));
    }
    assert_eq!(Some(6), fine.max_disp);

    // Same size is a copy
    assert_eq!(coarse.as_slice(), resample_disparity(&coarse, 4, 3).as_slice());
}

#[test]
fn downsampled_disparity_is_scaled() {
    let fine = DisparityMap::filled(16, 8, 10, 1000);
    let coarse = resample_disparity(&fine, 8, 4);
    assert_eq!(1000, coarse.invalid());
    assert!(coarse.as_slice().iter().all(|&d| d == 5));
}
