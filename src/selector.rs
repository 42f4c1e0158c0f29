//! # Disparity selection
//!
//! Winner-take-all selection over an aggregated cost volume. Each pixel is handled
//! independently:
//!
//! - only disparities with `x - (d + min_disparity) >= 0` are considered, pixels with none are
//!   invalid;
//! - on equal cost the smaller disparity wins;
//! - optionally the winner is rejected if its cost exceeds `max_error`;
//! - optionally the right image pixel it matches selects its own best disparity from the same
//!   volume, and the two must agree within `right_to_left_tolerance`.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cost_volume::{CostVolume, DisparityRange};
use crate::disparity::{DisparityMap, INVALID_DISPARITY};
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SelectorConfig {
    /// Value written to pixels without a disparity.
    pub invalid: i32,
    /// Largest allowed difference between left and right selections. Negative disables the
    /// check.
    pub right_to_left_tolerance: i32,
    /// Reject winners with an aggregated cost above this.
    pub max_error: Option<u32>,
}

#[derive(Debug, Clone)]
pub struct DisparitySelector {
    config: SelectorConfig,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            invalid: INVALID_DISPARITY,
            right_to_left_tolerance: 1,
            max_error: None,
        }
    }
}

impl SelectorConfig {
    /// The invalid sentinel must not be a disparity that can be selected.
    pub fn validate(&self, range: DisparityRange) -> Result<()> {
        if range.contains(self.invalid as i64) {
            return Err(Error::InvalidSentinel(self.invalid));
        }
        Ok(())
    }
}

impl DisparitySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Select a disparity for every pixel of `aggregated` and write it into `out`, which is
    /// reshaped to the volume's size.
    pub fn select(
        &self,
        aggregated: &CostVolume,
        min_disparity: usize,
        out: &mut DisparityMap,
    ) -> Result<()> {
        let (width, height, count) = aggregated.shape();
        let range = DisparityRange::new(min_disparity, count)?;
        self.config.validate(range)?;

        if out.invalid() == self.config.invalid {
            out.reshape(width, height);
        } else {
            *out = DisparityMap::new(width, height, self.config.invalid);
        }
        if width == 0 || height == 0 {
            return Ok(());
        }

        out.as_mut_slice()
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, px) in row.iter_mut().enumerate() {
                    *px = self.select_pixel(aggregated, range, x, y);
                }
            });

        out.update_range();
        Ok(())
    }

    fn select_pixel(
        &self,
        aggregated: &CostVolume,
        range: DisparityRange,
        x: usize,
        y: usize,
    ) -> i32 {
        let invalid = self.config.invalid;
        let (d, cost) = match select_left(aggregated, range, x, y) {
            Some(best) => best,
            None => return invalid,
        };

        if let Some(max_error) = self.config.max_error {
            if cost as u32 > max_error {
                return invalid;
            }
        }

        let tolerance = self.config.right_to_left_tolerance;
        if tolerance >= 0 {
            let xr = x - d - range.min;
            let agree = match select_right(aggregated, range, xr, y) {
                Some(dr) => (d as i64 - dr as i64).abs() <= tolerance as i64,
                None => false,
            };
            if !agree {
                return invalid;
            }
        }

        (d + range.min) as i32
    }
}

/// Best disparity offset and its cost for left image pixel `(x, y)`. Ties keep the smaller
/// disparity.
pub fn select_left(
    aggregated: &CostVolume,
    range: DisparityRange,
    x: usize,
    y: usize,
) -> Option<(usize, u16)> {
    let local = range.local_count(x);
    if local == 0 {
        return None;
    }
    let costs = &aggregated.pixel(x, y)[..local];
    let mut best = 0;
    let mut best_cost = costs[0];
    for (d, &c) in costs.iter().enumerate().skip(1) {
        if c < best_cost {
            best = d;
            best_cost = c;
        }
    }
    Some((best, best_cost))
}

/// Best disparity offset for right image pixel `(xr, y)`, found by looking at the left pixels
/// `xr + d + min` that would match it. Ties keep the smaller disparity.
pub fn select_right(
    aggregated: &CostVolume,
    range: DisparityRange,
    xr: usize,
    y: usize,
) -> Option<usize> {
    let width = aggregated.width();
    let mut best = None;
    let mut best_cost = std::u16::MAX;
    for d in 0..range.count {
        let xl = xr + d + range.min;
        if xl >= width {
            break;
        }
        let c = aggregated.get(xl, y, d);
        if best.is_none() || c < best_cost {
            best = Some(d);
            best_cost = c;
        }
    }
    best
}
