//! # Semi-global cost aggregation
//!
//! Sums the cost along up to 16 straight paths through every pixel. The cost of a single path is
//! found with dynamic programming:
//!
//! ```text
//! Lr(p,d) = C(p,d) + min( Lr(p-r,d),
//!                         Lr(p-r,d-1) + P1,
//!                         Lr(p-r,d+1) + P1,
//!                         min_k Lr(p-r,k) + P2 ) - min_k Lr(p-r,k)
//! ```
//!
//! `P1` penalises a one step change in disparity and `P2` any larger jump. Subtracting the
//! previous minimum bounds every path value by `C(p,d) + P2`, which is what lets the sum over all
//! paths live in a `u16`. Terms whose disparity does not exist at the previous pixel are left out
//! of the minimum.
//!
//! Paths only visit columns `x >= min_disparity`, the pixels with at least one disparity that
//! can be sampled. Near the left border fewer disparities exist and each pixel only stores its
//! valid ones.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::cost_volume::{CostVolume, DisparityRange, DEFAULT_MAX_COST};
use crate::error::*;

// -----------------------------------------------------------------------------------------------
// CONSTANTS
// -----------------------------------------------------------------------------------------------

/// Every supported direction. A configuration with `n` paths uses the first `n`.
pub const DIRECTIONS: [Direction; 16] = [
    Direction::new(1, 0),
    Direction::new(-1, 0),
    Direction::new(0, 1),
    Direction::new(0, -1),
    Direction::new(1, 1),
    Direction::new(-1, -1),
    Direction::new(-1, 1),
    Direction::new(1, -1),
    Direction::new(1, 2),
    Direction::new(2, 1),
    Direction::new(2, -1),
    Direction::new(1, -2),
    Direction::new(-1, -2),
    Direction::new(-2, -1),
    Direction::new(-2, 1),
    Direction::new(-1, 2),
];

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Step taken between consecutive pixels of a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Direction {
    pub dx: i32,
    pub dy: i32,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct AggregationConfig {
    /// Penalty for a disparity change of one.
    pub penalty1: u32,
    /// Penalty for any larger disparity change.
    pub penalty2: u32,
    /// Number of path directions, 1 to 16.
    pub paths: usize,
    /// Largest cost present in the input volume.
    pub max_cost: u16,
    /// Split the directions across the rayon thread pool.
    pub parallel: bool,
}

/// The region paths are traced through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathGeometry {
    pub width: usize,
    pub height: usize,
    pub range: DisparityRange,
}

/// Aggregation context. Owns the aggregated volume and every work buffer, all of which are
/// reused until the image size or disparity range changes.
#[derive(Debug)]
pub struct PathAggregator {
    config: AggregationConfig,
    geometry: Option<PathGeometry>,
    aggregated: CostVolume,
    lanes: Vec<Lane>,
}

/// Private state of one worker. `work` holds `Lr` for every pixel of the current path, one row
/// of `range.count` values per pixel.
#[derive(Debug, Default)]
struct Lane {
    work: Vec<u16>,
    starts: Vec<(usize, usize)>,
    partial: CostVolume,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Direction {
    pub const fn new(dx: i32, dy: i32) -> Self {
        Self { dx, dy }
    }
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            penalty1: 200,
            penalty2: 2000,
            paths: 8,
            max_cost: DEFAULT_MAX_COST,
            parallel: true,
        }
    }
}

impl AggregationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.penalty1 == 0 || self.penalty2 <= self.penalty1 {
            return Err(Error::InvalidPenalties {
                penalty1: self.penalty1,
                penalty2: self.penalty2,
            });
        }
        if self.paths == 0 || self.paths > DIRECTIONS.len() {
            return Err(Error::InvalidPathCount(self.paths));
        }
        // Every path contributes at most max_cost + penalty2
        let worst = self.paths as u64 * (self.max_cost as u64 + self.penalty2 as u64);
        if worst > std::u16::MAX as u64 {
            return Err(Error::AccumulatorOverflow {
                paths: self.paths,
                max_cost: self.max_cost,
                penalty2: self.penalty2,
            });
        }
        Ok(())
    }

    /// The directions swept by this configuration.
    pub fn directions(&self) -> &'static [Direction] {
        &DIRECTIONS[..self.paths.min(DIRECTIONS.len())]
    }
}

impl PathGeometry {
    pub fn new(width: usize, height: usize, range: DisparityRange) -> Self {
        Self {
            width,
            height,
            range,
        }
    }

    /// First column with a valid disparity.
    pub fn first_column(&self) -> usize {
        self.range.min.min(self.width)
    }

    /// Number of columns visited by paths.
    pub fn effective_width(&self) -> usize {
        self.width - self.first_column()
    }

    /// Upper bound on the number of pixels in any path.
    pub fn max_path_length(&self) -> usize {
        self.effective_width().max(self.height)
    }

    /// Number of pixels visited when stepping from `(x0, y0)` by `dir` until leaving the region.
    pub fn path_length(&self, x0: usize, y0: usize, dir: Direction) -> usize {
        let x0 = match x0.checked_sub(self.first_column()) {
            Some(x) => x,
            None => return 0,
        };
        let along_x = axis_length(x0, dir.dx, self.effective_width());
        let along_y = axis_length(y0, dir.dy, self.height);
        along_x.min(along_y)
    }

    /// Calls `f` once for every pixel whose predecessor along `dir` lies outside the region.
    /// Each pixel in the region belongs to exactly one path starting at one of these pixels.
    pub fn for_each_start<F: FnMut(usize, usize)>(&self, dir: Direction, mut f: F) {
        let x_lo = self.first_column();
        let (w, h) = (self.width, self.height);
        if x_lo >= w || h == 0 {
            return;
        }

        let step_x = dir.dx.unsigned_abs() as usize;
        let step_y = dir.dy.unsigned_abs() as usize;
        let cols = if dir.dx > 0 {
            x_lo..(x_lo + step_x).min(w)
        } else if dir.dx < 0 {
            w.saturating_sub(step_x).max(x_lo)..w
        } else {
            x_lo..x_lo
        };
        let rows = if dir.dy > 0 {
            0..step_y.min(h)
        } else if dir.dy < 0 {
            h.saturating_sub(step_y)..h
        } else {
            0..0
        };

        for y in 0..h {
            for x in cols.clone() {
                f(x, y);
            }
        }
        for y in rows {
            for x in (x_lo..w).filter(|x| !cols.contains(x)) {
                f(x, y);
            }
        }
    }
}

/// Number of samples `t0, t0 + step, ...` inside `0..length`.
pub fn axis_length(t0: usize, step: i32, length: usize) -> usize {
    if t0 >= length {
        return 0;
    }
    let s = step.unsigned_abs() as usize;
    if step > 0 {
        (length - t0 + s - 1) / s
    } else if step < 0 {
        t0 / s + 1
    } else {
        std::usize::MAX
    }
}

/// Path cost at a single disparity, checking which neighbours exist. `prev` holds the previous
/// pixel's values for its valid disparities only.
#[inline]
pub fn step_border_d(d: usize, cost: u16, prev: &[u16], min_prev: u32, p1: u32, p2: u32) -> u16 {
    let mut best = min_prev + p2;
    if d < prev.len() {
        best = best.min(prev[d] as u32);
    }
    if d >= 1 && d - 1 < prev.len() {
        best = best.min(prev[d - 1] as u32 + p1);
    }
    if d + 1 < prev.len() {
        best = best.min(prev[d + 1] as u32 + p1);
    }
    (cost as u32 + best - min_prev) as u16
}

/// Path cost for disparities `1..n-1` when the current and previous pixel share all `n`
/// disparities. `d = 0` and `d = n-1` are left for [`step_border_d`].
#[inline]
pub fn step_inner_d(cost: &[u16], prev: &[u16], min_prev: u32, p1: u32, p2: u32, out: &mut [u16]) {
    let n = cost.len();
    if n < 3 {
        return;
    }
    let jump = min_prev + p2;
    for ((o, &c), w) in out[1..n - 1]
        .iter_mut()
        .zip(cost[1..n - 1].iter())
        .zip(prev.windows(3))
    {
        let best = (w[1] as u32)
            .min(w[0] as u32 + p1)
            .min(w[2] as u32 + p1)
            .min(jump);
        *o = (c as u32 + best - min_prev) as u16;
    }
}

/// Compute one step of the recurrence for every valid disparity of the current pixel.
#[inline]
pub fn step(cost: &[u16], prev: &[u16], p1: u32, p2: u32, out: &mut [u16]) {
    let min_prev = prev.iter().copied().min().unwrap_or(0) as u32;
    let n = cost.len();
    if n >= 3 && prev.len() == n {
        step_inner_d(cost, prev, min_prev, p1, p2, out);
        out[0] = step_border_d(0, cost[0], prev, min_prev, p1, p2);
        out[n - 1] = step_border_d(n - 1, cost[n - 1], prev, min_prev, p1, p2);
    } else {
        for (d, (o, &c)) in out.iter_mut().zip(cost.iter()).enumerate() {
            *o = step_border_d(d, c, prev, min_prev, p1, p2);
        }
    }
}

/// Score the path starting at `(x0, y0)` and add it onto `target`.
fn score_path(
    geom: &PathGeometry,
    config: &AggregationConfig,
    cost: &CostVolume,
    (x0, y0): (usize, usize),
    dir: Direction,
    work: &mut [u16],
    target: &mut CostVolume,
) {
    let n = geom.range.count;
    let length = geom.path_length(x0, y0, dir);
    if length == 0 {
        return;
    }

    // No predecessor, Lr(p,d) = C(p,d)
    let mut prev_local = geom.range.local_count(x0);
    work[..prev_local].copy_from_slice(&cost.pixel(x0, y0)[..prev_local]);

    let (mut x, mut y) = (x0 as isize, y0 as isize);
    for i in 1..length {
        x += dir.dx as isize;
        y += dir.dy as isize;
        let local = geom.range.local_count(x as usize);
        let (done, rest) = work.split_at_mut(i * n);
        let prev = &done[(i - 1) * n..(i - 1) * n + prev_local];
        let c = &cost.pixel(x as usize, y as usize)[..local];
        step(c, prev, config.penalty1, config.penalty2, &mut rest[..local]);
        prev_local = local;
    }

    let (mut x, mut y) = (x0 as isize, y0 as isize);
    for i in 0..length {
        let local = geom.range.local_count(x as usize);
        let lr = &work[i * n..i * n + local];
        let out = target.pixel_mut(x as usize, y as usize);
        for (a, &v) in out[..local].iter_mut().zip(lr.iter()) {
            *a = a.saturating_add(v);
        }
        x += dir.dx as isize;
        y += dir.dy as isize;
    }
}

/// Score every path along one direction. Paths of one direction never share a pixel.
fn score_direction(
    geom: &PathGeometry,
    config: &AggregationConfig,
    cost: &CostVolume,
    dir: Direction,
    lane: &mut Lane,
    target: &mut CostVolume,
) {
    lane.starts.clear();
    let starts = &mut lane.starts;
    geom.for_each_start(dir, |x, y| starts.push((x, y)));
    trace!(
        "Scoring direction ({}, {}) over {} paths",
        dir.dx,
        dir.dy,
        lane.starts.len()
    );
    for &start in lane.starts.iter() {
        score_path(geom, config, cost, start, dir, &mut lane.work, target);
    }
}

impl PathAggregator {
    pub fn new(config: AggregationConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            geometry: None,
            aggregated: CostVolume::default(),
            lanes: Vec::new(),
        })
    }

    pub fn config(&self) -> &AggregationConfig {
        &self.config
    }

    /// Size every buffer for the given image and disparity range.
    pub fn reshape(&mut self, width: usize, height: usize, range: DisparityRange) {
        let geom = PathGeometry::new(width, height, range);
        let directions = self.config.directions().len();
        let lane_count = if self.config.parallel {
            rayon::current_num_threads().max(1).min(directions)
        } else {
            1
        };

        self.aggregated.reshape(width, height, range.count);
        self.lanes.resize_with(lane_count, Lane::default);
        let work_len = geom.max_path_length() * range.count;
        for lane in self.lanes.iter_mut() {
            lane.work.clear();
            lane.work.resize(work_len, 0);
            if lane_count > 1 {
                lane.partial.reshape(width, height, range.count);
            } else {
                lane.partial.reshape(0, 0, 0);
            }
        }
        self.geometry = Some(geom);

        debug!(
            "Aggregator reshaped to {}x{}x{} with {} lane(s)",
            width, height, range.count, lane_count
        );
    }

    /// Aggregate `cost` along every configured direction. `cost` is indexed by image column and
    /// disparity offset from `min_disparity`, and no entry may exceed the configured `max_cost`.
    pub fn process(&mut self, cost: &CostVolume, min_disparity: usize) -> Result<&CostVolume> {
        let (width, height, count) = cost.shape();
        let range = DisparityRange::new(min_disparity, count)?;
        let found = cost.max_value();
        if found > self.config.max_cost {
            return Err(Error::CostAboveMaximum {
                found,
                max_cost: self.config.max_cost,
            });
        }
        let geom = PathGeometry::new(width, height, range);
        if self.geometry != Some(geom) {
            self.reshape(width, height, range);
        }

        let config = &self.config;
        let directions = config.directions();
        let lane_count = self.lanes.len();

        if lane_count == 1 {
            self.aggregated.fill(0);
            let lane = &mut self.lanes[0];
            for &dir in directions {
                score_direction(&geom, config, cost, dir, lane, &mut self.aggregated);
            }
        } else {
            self.lanes.par_iter_mut().enumerate().for_each(|(i, lane)| {
                let mut partial = std::mem::take(&mut lane.partial);
                partial.fill(0);
                for &dir in directions.iter().skip(i).step_by(lane_count) {
                    score_direction(&geom, config, cost, dir, lane, &mut partial);
                }
                lane.partial = partial;
            });
            self.reduce_lanes();
        }

        Ok(&self.aggregated)
    }

    /// Sum the partial volumes of every lane into the aggregated volume.
    fn reduce_lanes(&mut self) {
        let row_len = self.aggregated.row_len();
        if row_len == 0 {
            return;
        }
        let lanes = &self.lanes;
        self.aggregated
            .as_mut_slice()
            .par_chunks_mut(row_len)
            .enumerate()
            .for_each(|(y, out)| {
                out.iter_mut().for_each(|v| *v = 0);
                for lane in lanes {
                    let src = &lane.partial.as_slice()[y * row_len..(y + 1) * row_len];
                    for (a, &b) in out.iter_mut().zip(src.iter()) {
                        *a = a.saturating_add(b);
                    }
                }
            });
    }

    /// Result of the last call to [`process`](Self::process).
    pub fn aggregated(&self) -> &CostVolume {
        &self.aggregated
    }

    /// Length of the path from `(x0, y0)` along `(dx, dy)` in the current geometry, zero before
    /// the first reshape.
    pub fn compute_path_length(&self, x0: usize, y0: usize, dx: i32, dy: i32) -> usize {
        self.geometry
            .map(|g| g.path_length(x0, y0, Direction::new(dx, dy)))
            .unwrap_or(0)
    }
}
