//! # Cost volumes
//!
//! A cost volume is a 3D tensor `C[y][x][d]` of 16 bit costs. It is stored as a stack of rows,
//! each row an `x` by `d` slice, so that horizontal sweeps walk memory linearly.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Default largest value a matching cost may take. 16 paths of `DEFAULT_MAX_COST + 2000` still
/// fit inside a `u16`.
pub const DEFAULT_MAX_COST: u16 = 2047;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// The disparities searched: `min ..  min + count`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisparityRange {
    pub min: usize,
    pub count: usize,
}

/// Dense `height x width x range` cost tensor.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostVolume {
    width: usize,
    height: usize,
    range: usize,
    data: Vec<u16>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl DisparityRange {
    pub fn new(min: usize, count: usize) -> Result<Self> {
        if count == 0 {
            return Err(Error::EmptyDisparityRange);
        }
        Ok(Self { min, count })
    }

    /// Number of disparities that can be sampled at column `x`, i.e. those with
    /// `x - (d + min) >= 0`.
    #[inline]
    pub fn local_count(&self, x: usize) -> usize {
        (x + 1).saturating_sub(self.min).min(self.count)
    }

    /// Largest disparity in the range, inclusive.
    pub fn max(&self) -> usize {
        self.min + self.count - 1
    }

    /// True if `value` is a disparity inside the range.
    pub fn contains(&self, value: i64) -> bool {
        value >= self.min as i64 && value <= self.max() as i64
    }
}

impl CostVolume {
    pub fn new(width: usize, height: usize, range: usize) -> Self {
        Self {
            width,
            height,
            range,
            data: vec![0; width * height * range],
        }
    }

    /// Change the shape of the volume. Existing storage is reused when large enough and the
    /// contents are zeroed.
    pub fn reshape(&mut self, width: usize, height: usize, range: usize) {
        self.width = width;
        self.height = height;
        self.range = range;
        self.data.clear();
        self.data.resize(width * height * range, 0);
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn range(&self) -> usize {
        self.range
    }

    /// `(width, height, range)`
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.width, self.height, self.range)
    }

    #[inline]
    fn index(&self, x: usize, y: usize, d: usize) -> usize {
        (y * self.width + x) * self.range + d
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize, d: usize) -> u16 {
        self.data[self.index(x, y, d)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, d: usize, value: u16) {
        let idx = self.index(x, y, d);
        self.data[idx] = value;
    }

    /// Costs for every disparity at a single pixel.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u16] {
        let start = self.index(x, y, 0);
        &self.data[start..start + self.range]
    }

    #[inline]
    pub fn pixel_mut(&mut self, x: usize, y: usize) -> &mut [u16] {
        let start = self.index(x, y, 0);
        let range = self.range;
        &mut self.data[start..start + range]
    }

    /// Number of elements in a single row slice.
    pub fn row_len(&self) -> usize {
        self.width * self.range
    }

    pub fn fill(&mut self, value: u16) {
        self.data.iter_mut().for_each(|v| *v = value);
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [u16] {
        &mut self.data
    }

    /// Largest value in the volume, zero if empty.
    pub fn max_value(&self) -> u16 {
        self.data.iter().copied().max().unwrap_or(0)
    }
}
