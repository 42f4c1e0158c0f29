//! # Pixel matching costs
//!
//! A [`CostFunction`] turns one row of the left and right images into per-disparity matching
//! costs. The aggregation stage only sees the resulting [`CostVolume`], never a concrete cost.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rayon::prelude::*;

use crate::census::CensusImage;
use crate::cost_volume::{CostVolume, DisparityRange};
use crate::error::*;
use crate::mutual_information::{MutualInformationModel, PixelScale, ScaledCostTable};

// -----------------------------------------------------------------------------------------------
// TRAITS
// -----------------------------------------------------------------------------------------------

pub trait CostFunction: Sync {
    /// Per pixel value the cost is computed from.
    type Pixel: Copy + Send + Sync;

    /// Write the cost of every disparity at every pixel of a row into `out`, laid out as
    /// `out[x * range.count + d]`. Values are in `0..=self.max_cost()`. Disparities that cannot
    /// be sampled at `x` are given the maximum cost.
    fn compute_row(
        &self,
        left: &[Self::Pixel],
        right: &[Self::Pixel],
        range: DisparityRange,
        out: &mut [u16],
    );

    /// Largest cost this function produces.
    fn max_cost(&self) -> u16;
}

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Hamming distance between census descriptors, normalised so that a complete mismatch costs
/// `max_cost`.
#[derive(Debug, Clone, Copy)]
pub struct HammingCost {
    bits: u32,
    max_cost: u16,
}

/// Table lookup into a trained [`MutualInformationModel`].
#[derive(Debug, Clone, Copy)]
pub struct MutualInformationCost<'a> {
    table: &'a ScaledCostTable,
    left: PixelScale,
    right: PixelScale,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl HammingCost {
    pub fn new(bits: u32, max_cost: u16) -> Self {
        Self {
            bits: bits.max(1),
            max_cost,
        }
    }

    pub fn for_census(census: &CensusImage, max_cost: u16) -> Self {
        Self::new(census.bits(), max_cost)
    }

    #[inline]
    fn score(&self, a: u64, b: u64) -> u16 {
        let dist = (a ^ b).count_ones().min(self.bits);
        ((dist * self.max_cost as u32) / self.bits) as u16
    }
}

impl CostFunction for HammingCost {
    type Pixel = u64;

    fn compute_row(&self, left: &[u64], right: &[u64], range: DisparityRange, out: &mut [u16]) {
        for (x, costs) in out.chunks_mut(range.count).enumerate() {
            let local = range.local_count(x);
            let l = left[x];
            for (d, c) in costs.iter_mut().enumerate() {
                *c = if d < local {
                    self.score(l, right[x - d - range.min])
                } else {
                    self.max_cost
                };
            }
        }
    }

    fn max_cost(&self) -> u16 {
        self.max_cost
    }
}

impl<'a> MutualInformationCost<'a> {
    /// Fails with `ModelNotTrained` unless the model has an integer cost table.
    pub fn new(model: &'a MutualInformationModel) -> Result<Self> {
        Ok(Self {
            table: model.scaled_table()?,
            left: model.left_scale()?,
            right: model.right_scale()?,
        })
    }
}

impl<'a> CostFunction for MutualInformationCost<'a> {
    type Pixel = u16;

    fn compute_row(&self, left: &[u16], right: &[u16], range: DisparityRange, out: &mut [u16]) {
        let max_cost = self.table.max_cost();
        for (x, costs) in out.chunks_mut(range.count).enumerate() {
            let local = range.local_count(x);
            let l = self.left.apply(left[x] as u32);
            for (d, c) in costs.iter_mut().enumerate() {
                *c = if d < local {
                    let r = self.right.apply(right[x - d - range.min] as u32);
                    self.table.get(l, r).min(max_cost)
                } else {
                    max_cost
                };
            }
        }
    }

    fn max_cost(&self) -> u16 {
        self.table.max_cost()
    }
}

/// Fill `volume` with the costs of two row-major `width x height` images. The volume is
/// reshaped to fit, reusing its storage.
pub fn fill_cost_volume<C: CostFunction>(
    cost: &C,
    left: &[C::Pixel],
    right: &[C::Pixel],
    width: usize,
    height: usize,
    range: DisparityRange,
    volume: &mut CostVolume,
) -> Result<()> {
    if left.len() != width * height || right.len() != width * height {
        return Err(Error::DimensionMismatch {
            left: (width, left.len() / width.max(1)),
            right: (width, right.len() / width.max(1)),
        });
    }
    if range.count == 0 {
        return Err(Error::EmptyDisparityRange);
    }

    volume.reshape(width, height, range.count);
    if width == 0 || height == 0 {
        return Ok(());
    }

    let row_len = volume.row_len();
    volume
        .as_mut_slice()
        .par_chunks_mut(row_len)
        .enumerate()
        .for_each(|(y, out)| {
            let span = y * width..(y + 1) * width;
            cost.compute_row(&left[span.clone()], &right[span], range, out);
        });

    Ok(())
}
