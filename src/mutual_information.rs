//! # Mutual information matching cost
//!
//! Learns a matching cost from the joint distribution of corresponding left/right intensities,
//! following Hirschmuller's "Stereo processing by semiglobal matching and mutual information".
//!
//! Training runs as a chain of separate artifacts, each derived from the previous one:
//!
//! 1. [`JointHistogram`]: counts of `(right, left)` intensity pairs under a disparity map.
//! 2. [`Probabilities`]: the joint and marginal probability mass, optionally Parzen smoothed.
//! 3. [`CostTable`]: `cost(l, r) = -log P(l, r) + log P(l) + log P(r)` as `f32`.
//! 4. [`ScaledCostTable`]: the cost table rescaled once into `0..=max_cost` for the cost volume.
//!
//! Mutual information does not scale well past 8 bits because the joint distribution becomes
//! too sparse, so intensities are rescaled into the histogram's bin range before counting. Left
//! and right may come from sensors with different bit depths.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::{debug, warn};

use crate::disparity::DisparityMap;
use crate::error::*;
use crate::frame::{check_same_shape, Gray16Image};

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Probabilities below this are treated as zero when taking logarithms.
pub const MIN_PROBABILITY: f32 = std::f32::EPSILON;

/// Largest histogram value accepted by the matchers, 12 bits per image.
pub const MAX_HISTOGRAM_VALUE: u16 = 4095;

/// Parzen smoothing radius of a freshly created model.
pub const DEFAULT_SMOOTHING_RADIUS: usize = 1;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Maps raw pixel values from an image's intensity range into histogram bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelScale {
    pub input_max: u32,
    pub histogram_max: u32,
}

/// Joint intensity counts, indexed `[right][left]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JointHistogram {
    left_bins: usize,
    right_bins: usize,
    counts: Vec<u32>,
    total: u64,
}

/// Joint and marginal probability mass derived from a [`JointHistogram`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Probabilities {
    left_bins: usize,
    right_bins: usize,
    joint: Vec<f32>,
    left: Vec<f32>,
    right: Vec<f32>,
}

/// Floating point matching cost for every `(left, right)` bin pair. Always finite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CostTable {
    left_bins: usize,
    right_bins: usize,
    values: Vec<f32>,
}

/// Integer matching cost in `0..=max_cost` for every `(left, right)` bin pair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaledCostTable {
    left_bins: usize,
    right_bins: usize,
    max_cost: u16,
    values: Vec<u16>,
}

/// Trainable mutual information cost.
///
/// Call [`configure_histogram`](Self::configure_histogram) first, then either
/// [`process`](Self::process) with a disparity estimate or [`diagonal_cost`](Self::diagonal_cost)
/// when none is available. [`precompute_scaled_cost`](Self::precompute_scaled_cost) must follow
/// `process` before the integer lookup is used.
#[derive(Debug, Clone, Default)]
pub struct MutualInformationModel {
    shape: Option<(u16, u16)>,
    input_max: Option<(u32, u32)>,
    kernel: Vec<f32>,
    histogram: JointHistogram,
    probabilities: Probabilities,
    costs: CostTable,
    scaled: ScaledCostTable,
    smooth_work: Vec<f32>,
    trained: bool,
    scaled_ready: bool,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl PixelScale {
    /// `round(v * histogram_max / input_max)`, clamped to `histogram_max`.
    #[inline]
    pub fn apply(&self, value: u32) -> usize {
        scale_pixel_value(value, self.input_max, self.histogram_max)
    }
}

/// Rescale a raw intensity into a histogram bin.
#[inline]
pub fn scale_pixel_value(value: u32, input_max: u32, histogram_max: u32) -> usize {
    if input_max == 0 {
        return 0;
    }
    if input_max == histogram_max {
        return value.min(histogram_max) as usize;
    }
    let v = value.min(input_max) as u64;
    ((v * histogram_max as u64 + input_max as u64 / 2) / input_max as u64) as usize
}

impl JointHistogram {
    fn reshape(&mut self, left_bins: usize, right_bins: usize) {
        self.left_bins = left_bins;
        self.right_bins = right_bins;
        self.counts.clear();
        self.counts.resize(left_bins * right_bins, 0);
        self.total = 0;
    }

    fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
        self.total = 0;
    }

    #[inline]
    fn increment(&mut self, left: usize, right: usize) {
        self.counts[right * self.left_bins + left] += 1;
        self.total += 1;
    }

    pub fn get(&self, left: usize, right: usize) -> u32 {
        self.counts[right * self.left_bins + left]
    }

    /// Number of samples counted.
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn left_bins(&self) -> usize {
        self.left_bins
    }

    pub fn right_bins(&self) -> usize {
        self.right_bins
    }
}

impl Probabilities {
    fn reshape(&mut self, left_bins: usize, right_bins: usize) {
        self.left_bins = left_bins;
        self.right_bins = right_bins;
        self.joint.clear();
        self.joint.resize(left_bins * right_bins, 0.0);
        self.left.clear();
        self.left.resize(left_bins, 0.0);
        self.right.clear();
        self.right.resize(right_bins, 0.0);
    }

    /// Normalise the histogram by its sample count, smooth the joint mass with `kernel` and derive
    /// the marginals from the result.
    fn compute(&mut self, hist: &JointHistogram, kernel: &[f32], work: &mut Vec<f32>) {
        let norm = if hist.total > 0 {
            1.0 / hist.total as f32
        } else {
            0.0
        };
        for (p, &c) in self.joint.iter_mut().zip(hist.counts.iter()) {
            *p = c as f32 * norm;
        }

        if kernel.len() > 1 {
            smooth_2d(&mut self.joint, self.left_bins, self.right_bins, kernel, work);
            // Border renormalisation changes the total mass slightly
            let mass: f32 = self.joint.iter().sum();
            if mass > 0.0 {
                self.joint.iter_mut().for_each(|p| *p /= mass);
            }
        }

        self.left.iter_mut().for_each(|v| *v = 0.0);
        for (r, row) in self.joint.chunks(self.left_bins).enumerate() {
            let mut sum = 0.0f32;
            for (l, &p) in row.iter().enumerate() {
                sum += p;
                self.left[l] += p;
            }
            self.right[r] = sum;
        }
    }

    pub fn joint(&self, left: usize, right: usize) -> f32 {
        self.joint[right * self.left_bins + left]
    }

    pub fn left(&self, left: usize) -> f32 {
        self.left[left]
    }

    pub fn right(&self, right: usize) -> f32 {
        self.right[right]
    }
}

impl CostTable {
    fn reshape(&mut self, left_bins: usize, right_bins: usize) {
        self.left_bins = left_bins;
        self.right_bins = right_bins;
        self.values.clear();
        self.values.resize(left_bins * right_bins, 0.0);
    }

    /// Negative pointwise mutual information. Pairs that were never observed get the largest
    /// representable cost, `-log(MIN_PROBABILITY)`, rather than infinity.
    fn compute(&mut self, probs: &Probabilities) {
        let cap = Self::unseen_cost();
        for r in 0..self.right_bins {
            let log_pr = probs.right[r].max(MIN_PROBABILITY).ln();
            for l in 0..self.left_bins {
                let p = probs.joint[r * self.left_bins + l];
                let v = if p < MIN_PROBABILITY {
                    cap
                } else {
                    let log_pl = probs.left[l].max(MIN_PROBABILITY).ln();
                    (-p.ln() + log_pl + log_pr).min(cap)
                };
                self.values[r * self.left_bins + l] = v;
            }
        }
    }

    /// Cost assigned to intensity pairs with zero probability.
    pub fn unseen_cost() -> f32 {
        -MIN_PROBABILITY.ln()
    }

    #[inline]
    pub fn get(&self, left: usize, right: usize) -> f32 {
        self.values[right * self.left_bins + left]
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// `(min, max)` over the whole table.
    pub fn bounds(&self) -> (f32, f32) {
        self.values
            .iter()
            .fold((std::f32::MAX, -std::f32::MAX), |(lo, hi), &v| (lo.min(v), hi.max(v)))
    }
}

impl ScaledCostTable {
    fn reshape(&mut self, left_bins: usize, right_bins: usize) {
        self.left_bins = left_bins;
        self.right_bins = right_bins;
        self.values.clear();
        self.values.resize(left_bins * right_bins, 0);
    }

    /// Linear rescale so the cheapest pair maps to 0 and the most expensive to `max_cost`.
    fn compute(&mut self, costs: &CostTable, max_cost: u16) {
        self.max_cost = max_cost;
        let (lo, hi) = costs.bounds();
        let range = hi - lo;
        if !(range > 0.0) || !range.is_finite() {
            self.values.iter_mut().for_each(|v| *v = 0);
            return;
        }
        let scale = max_cost as f32 / range;
        for (out, &v) in self.values.iter_mut().zip(costs.values.iter()) {
            *out = ((v - lo) * scale).round().max(0.0).min(max_cost as f32) as u16;
        }
    }

    #[inline]
    pub fn get(&self, left: usize, right: usize) -> u16 {
        self.values[right * self.left_bins + left]
    }

    pub fn max_cost(&self) -> u16 {
        self.max_cost
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.values
    }
}

impl MutualInformationModel {
    /// Create a model without a histogram, smoothing with [`DEFAULT_SMOOTHING_RADIUS`].
    pub fn new() -> Self {
        let mut model = Self::default();
        model.configure_smoothing(DEFAULT_SMOOTHING_RADIUS);
        model
    }

    /// Allocate a `(max_right_value + 1) x (max_left_value + 1)` joint histogram and the tables
    /// derived from it. Any previous training is discarded.
    pub fn configure_histogram(&mut self, max_left_value: u16, max_right_value: u16) {
        let left_bins = max_left_value as usize + 1;
        let right_bins = max_right_value as usize + 1;
        self.shape = Some((max_left_value, max_right_value));
        self.histogram.reshape(left_bins, right_bins);
        self.probabilities.reshape(left_bins, right_bins);
        self.costs.reshape(left_bins, right_bins);
        self.scaled.reshape(left_bins, right_bins);
        self.trained = false;
        self.scaled_ready = false;
        debug!(
            "Configured MI histogram with {} x {} bins",
            right_bins, left_bins
        );
    }

    /// Largest raw intensity of the left and right images. Defaults to the histogram maxima, in
    /// which case no rescaling happens.
    pub fn configure_input(&mut self, max_left_input: u32, max_right_input: u32) {
        self.input_max = Some((max_left_input, max_right_input));
    }

    /// Gaussian Parzen smoothing applied to the joint probability. A radius of 0 disables it.
    pub fn configure_smoothing(&mut self, radius: usize) {
        self.kernel = gaussian_kernel(radius);
    }

    fn configured_shape(&self) -> Result<(u16, u16)> {
        self.shape.ok_or(Error::HistogramNotConfigured)
    }

    pub fn left_scale(&self) -> Result<PixelScale> {
        let (max_left, _) = self.configured_shape()?;
        let input = self.input_max.map(|m| m.0).unwrap_or(max_left as u32);
        Ok(PixelScale {
            input_max: input,
            histogram_max: max_left as u32,
        })
    }

    pub fn right_scale(&self) -> Result<PixelScale> {
        let (_, max_right) = self.configured_shape()?;
        let input = self.input_max.map(|m| m.1).unwrap_or(max_right as u32);
        Ok(PixelScale {
            input_max: input,
            histogram_max: max_right as u32,
        })
    }

    /// Rescale a raw left image value into its histogram bin.
    pub fn scale_left_value(&self, value: u32) -> Result<usize> {
        Ok(self.left_scale()?.apply(value))
    }

    /// Rescale a raw right image value into its histogram bin.
    pub fn scale_right_value(&self, value: u32) -> Result<usize> {
        Ok(self.right_scale()?.apply(value))
    }

    /// Train the model from a disparity estimate. Every table is rebuilt from scratch.
    pub fn process(
        &mut self,
        left: &Gray16Image,
        right: &Gray16Image,
        disparity: &DisparityMap,
    ) -> Result<()> {
        self.compute_joint_histogram(left, right, disparity)?;
        self.compute_probabilities()?;
        self.compute_entropy()
    }

    /// Count intensity pairs `(left(x, y), right(x - d, y))` for every pixel with a valid
    /// disparity `d` whose match lies inside the right image.
    pub fn compute_joint_histogram(
        &mut self,
        left: &Gray16Image,
        right: &Gray16Image,
        disparity: &DisparityMap,
    ) -> Result<()> {
        let left_scale = self.left_scale()?;
        let right_scale = self.right_scale()?;
        check_same_shape(left, right)?;
        let (width, height) = (left.width() as usize, left.height() as usize);
        if (disparity.width(), disparity.height()) != (width, height) {
            return Err(Error::DimensionMismatch {
                left: (width, height),
                right: (disparity.width(), disparity.height()),
            });
        }

        self.trained = false;
        self.scaled_ready = false;
        self.histogram.clear();

        let invalid = disparity.invalid();
        let (lraw, rraw) = (left.as_raw(), right.as_raw());
        for y in 0..height {
            let row = y * width;
            for x in 0..width {
                let d = disparity.get(x, y);
                if d == invalid {
                    continue;
                }
                let xr = x as i64 - d as i64;
                if xr < 0 || xr >= width as i64 {
                    continue;
                }
                let l = left_scale.apply(lraw[row + x] as u32);
                let r = right_scale.apply(rraw[row + xr as usize] as u32);
                self.histogram.increment(l, r);
            }
        }

        if self.histogram.total == 0 {
            warn!("No valid correspondences while training mutual information");
        } else {
            debug!("MI joint histogram built from {} samples", self.histogram.total);
        }
        Ok(())
    }

    /// Normalise the joint histogram into probability mass.
    pub fn compute_probabilities(&mut self) -> Result<()> {
        self.configured_shape()?;
        self.probabilities
            .compute(&self.histogram, &self.kernel, &mut self.smooth_work);
        Ok(())
    }

    /// Derive the floating point cost table from the probabilities.
    pub fn compute_entropy(&mut self) -> Result<()> {
        self.configured_shape()?;
        self.costs.compute(&self.probabilities);
        self.trained = true;
        self.scaled_ready = false;
        Ok(())
    }

    /// Floating point cost between two histogram bins.
    pub fn cost(&self, left_bin: usize, right_bin: usize) -> Result<f32> {
        Ok(self.cost_table()?.get(left_bin, right_bin))
    }

    /// Rescale the whole cost table into `0..=max_cost`.
    pub fn precompute_scaled_cost(&mut self, max_cost: u16) -> Result<()> {
        if !self.trained {
            return Err(Error::ModelNotTrained);
        }
        self.scaled.compute(&self.costs, max_cost);
        self.scaled_ready = true;
        Ok(())
    }

    /// Integer cost between two histogram bins.
    pub fn cost_scaled(&self, left_bin: usize, right_bin: usize) -> Result<u16> {
        Ok(self.scaled_table()?.get(left_bin, right_bin))
    }

    /// Initialise the integer table without training. Pairs where the right value is close to
    /// `scale_left_to_right` times the left value are cheap, everything else expensive.
    pub fn diagonal_cost(&mut self, scale_left_to_right: f64, max_cost: u16) -> Result<()> {
        self.configured_shape()?;
        let cost_low = max_cost / 20;
        let cost_high = max_cost / 3;
        let (left_bins, right_bins) = (self.scaled.left_bins, self.scaled.right_bins);
        for r in 0..right_bins {
            let row = &mut self.scaled.values[r * left_bins..(r + 1) * left_bins];
            for (l, v) in row.iter_mut().enumerate() {
                let matching = (l as f64 * scale_left_to_right)
                    .round()
                    .max(0.0)
                    .min((right_bins - 1) as f64) as usize;
                *v = if matching == r { cost_low } else { cost_high };
            }
        }
        self.scaled.max_cost = max_cost;
        self.trained = false;
        self.scaled_ready = true;
        Ok(())
    }

    /// Initialise the integer table with a single constant cost.
    pub fn flat_cost(&mut self, value: u16) -> Result<()> {
        self.configured_shape()?;
        self.scaled.values.iter_mut().for_each(|v| *v = value);
        self.scaled.max_cost = value;
        self.trained = false;
        self.scaled_ready = true;
        Ok(())
    }

    /// True once a cost table has been derived from data.
    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn histogram(&self) -> Result<&JointHistogram> {
        self.configured_shape()?;
        Ok(&self.histogram)
    }

    pub fn probabilities(&self) -> Result<&Probabilities> {
        self.configured_shape()?;
        Ok(&self.probabilities)
    }

    pub fn cost_table(&self) -> Result<&CostTable> {
        if !self.trained {
            return Err(Error::ModelNotTrained);
        }
        Ok(&self.costs)
    }

    pub fn scaled_table(&self) -> Result<&ScaledCostTable> {
        if !self.scaled_ready {
            return Err(Error::ModelNotTrained);
        }
        Ok(&self.scaled)
    }
}

/// Normalised Gaussian weights for `-radius..=radius`.
fn gaussian_kernel(radius: usize) -> Vec<f32> {
    if radius == 0 {
        return vec![1.0];
    }
    let sigma = (2 * radius + 1) as f32 / 5.0;
    let weights: Vec<f32> = (0..=2 * radius)
        .map(|i| {
            let t = i as f32 - radius as f32;
            (-t * t / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f32 = weights.iter().sum();
    weights.into_iter().map(|w| w / sum).collect()
}

/// Separable convolution of a `width x height` table. Weights falling outside the table are
/// dropped and the remainder renormalised.
fn smooth_2d(data: &mut [f32], width: usize, height: usize, kernel: &[f32], work: &mut Vec<f32>) {
    let radius = (kernel.len() / 2) as isize;
    work.clear();
    work.resize(data.len(), 0.0);

    for y in 0..height {
        for x in 0..width {
            let (mut acc, mut wsum) = (0.0f32, 0.0f32);
            for (k, &w) in kernel.iter().enumerate() {
                let xx = x as isize + k as isize - radius;
                if xx >= 0 && (xx as usize) < width {
                    acc += data[y * width + xx as usize] * w;
                    wsum += w;
                }
            }
            work[y * width + x] = acc / wsum;
        }
    }

    for y in 0..height {
        for x in 0..width {
            let (mut acc, mut wsum) = (0.0f32, 0.0f32);
            for (k, &w) in kernel.iter().enumerate() {
                let yy = y as isize + k as isize - radius;
                if yy >= 0 && (yy as usize) < height {
                    acc += work[yy as usize * width + x] * w;
                    wsum += w;
                }
            }
            data[y * width + x] = acc / wsum;
        }
    }
}
