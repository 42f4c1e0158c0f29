//! # General disparity objects
//!
//! This module provides generic disparity traits and structures for use by different algorithms.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::GrayImage;

use crate::error::*;
use crate::frame::StereoPair;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Default value written to pixels without a valid disparity.
pub const INVALID_DISPARITY: i32 = -1;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// An integer disparity map. Each pixel holds `d + min_disparity` or the `invalid` sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct DisparityMap {
    width: usize,
    height: usize,
    data: Vec<i32>,
    invalid: i32,
    /// Smallest valid disparity observed in the map.
    pub min_disp: Option<i32>,
    /// Largest valid disparity observed in the map.
    pub max_disp: Option<i32>,
}

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait DisparityAlgorithm {
    /// Compute the disparity map of the given stereo pair.
    fn compute(&mut self, pair: &StereoPair) -> Result<DisparityMap>;
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityMap {
    /// Create a map where every pixel is invalid.
    pub fn new(width: usize, height: usize, invalid: i32) -> Self {
        DisparityMap {
            width,
            height,
            data: vec![invalid; width * height],
            invalid,
            min_disp: None,
            max_disp: None,
        }
    }

    /// Create a map with every pixel set to `value`.
    pub fn filled(width: usize, height: usize, value: i32, invalid: i32) -> Self {
        let mut map = Self::new(width, height, invalid);
        map.data.iter_mut().for_each(|v| *v = value);
        map.update_range();
        map
    }

    /// Resize the map, discarding the contents. Storage is only reallocated when it grows.
    pub fn reshape(&mut self, width: usize, height: usize) {
        self.width = width;
        self.height = height;
        self.data.clear();
        self.data.resize(width * height, self.invalid);
        self.min_disp = None;
        self.max_disp = None;
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn invalid(&self) -> i32 {
        self.invalid
    }

    pub fn get(&self, x: usize, y: usize) -> i32 {
        self.data[y * self.width + x]
    }

    pub fn put(&mut self, x: usize, y: usize, val: i32) {
        self.data[y * self.width + x] = val
    }

    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        self.get(x, y) != self.invalid
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        &mut self.data
    }

    /// Recompute `min_disp` and `max_disp` from the valid pixels.
    pub fn update_range(&mut self) {
        let invalid = self.invalid;
        let mut valid = self.data.iter().copied().filter(|&v| v != invalid);
        let (min, max) = match valid.next() {
            Some(first) => valid.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))),
            None => {
                self.min_disp = None;
                self.max_disp = None;
                return;
            }
        };
        self.min_disp = Some(min);
        self.max_disp = Some(max);
    }

    /// Fraction of pixels which hold a valid disparity.
    pub fn valid_fraction(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        let valid = self.data.iter().filter(|&&v| v != self.invalid).count();
        valid as f32 / self.data.len() as f32
    }

    /// Converts the map into a Luma8 image. Invalid pixels become black.
    pub fn to_luma(&self) -> GrayImage {
        self.to_luma_scaled(1.0)
    }

    /// Converts the map to a normalised GrayImage.
    ///
    /// Normalises by the maximum observed disparity in the map. If the maximum disparity is not
    /// set then the function is equivalent to `.to_luma()`.
    pub fn to_luma_normalised(&self) -> GrayImage {
        let mult = match self.max_disp {
            Some(d) if d > 0 => 255.0 / d as f32,
            _ => 1.0,
        };
        self.to_luma_scaled(mult)
    }

    fn to_luma_scaled(&self, mult: f32) -> GrayImage {
        GrayImage::from_fn(self.width as u32, self.height as u32, |x, y| {
            let raw = self.get(x as usize, y as usize);
            let val = if raw == self.invalid {
                0.0
            } else {
                (raw as f32 * mult).max(0.0).min(255.0)
            };
            image::Luma([val as u8])
        })
    }
}
