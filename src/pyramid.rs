//! # Image pyramids
//!
//! Half resolution image pyramids and the matching disparity resampling used by the coarse to
//! fine mutual information driver.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::imageops::{self, FilterType};
use imageproc::filter::gaussian_blur_f32;

use crate::disparity::DisparityMap;
use crate::error::*;
use crate::frame::Gray16Image;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Blur applied before each halving.
const PYRAMID_SIGMA: f32 = 0.8;

// -----------------------------------------------------------------------------------------------
// FUNCTIONS
// -----------------------------------------------------------------------------------------------

/// Build `levels` images. Level 0 is the input, each following level has half the width and
/// height of the previous one.
pub fn build_pyramid(img: &Gray16Image, levels: usize) -> Result<Vec<Gray16Image>> {
    if levels == 0 {
        return Err(Error::InvalidPyramidLevels(levels));
    }

    let mut pyramid = Vec::with_capacity(levels);
    pyramid.push(img.clone());
    for _ in 1..levels {
        let prev = &pyramid[pyramid.len() - 1];
        let width = (prev.width() / 2).max(1);
        let height = (prev.height() / 2).max(1);
        let blurred = gaussian_blur_f32(prev, PYRAMID_SIGMA);
        pyramid.push(imageops::resize(&blurred, width, height, FilterType::Nearest));
    }
    Ok(pyramid)
}

/// Nearest neighbour resampling of a disparity map to a new size. Valid disparities are scaled
/// by the change in width, invalid pixels stay invalid.
pub fn resample_disparity(map: &DisparityMap, width: usize, height: usize) -> DisparityMap {
    let invalid = map.invalid();
    let mut out = DisparityMap::new(width, height, invalid);
    if map.width() == 0 || map.height() == 0 {
        return out;
    }

    let scale = width as f64 / map.width() as f64;
    for y in 0..height {
        let sy = (y * map.height() / height.max(1)).min(map.height() - 1);
        for x in 0..width {
            let sx = (x * map.width() / width.max(1)).min(map.width() - 1);
            if map.is_valid(sx, sy) {
                out.put(x, y, (map.get(sx, sy) as f64 * scale).round() as i32);
            }
        }
    }
    out.update_range();
    out
}
