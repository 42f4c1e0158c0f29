//! # Semi-global matching
//!
//! End to end disparity algorithms built from the cost, aggregation and selection stages.
//!
//! - [`SgmCensus`] matches census descriptors with the Hamming distance at full resolution.
//! - [`SgmMutualInformation`] learns a mutual information cost and refines it coarse to fine
//!   over an image pyramid, retraining the cost from each level's disparity map.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::aggregation::{AggregationConfig, PathAggregator};
use crate::census::{census_transform, CensusImage};
use crate::cost::{fill_cost_volume, HammingCost, MutualInformationCost};
use crate::cost_volume::{CostVolume, DisparityRange};
use crate::disparity::{DisparityAlgorithm, DisparityMap};
use crate::error::*;
use crate::frame::{Gray16Image, StereoPair};
use crate::mutual_information::{MutualInformationModel, MAX_HISTOGRAM_VALUE};
use crate::pyramid::{build_pyramid, resample_disparity};
use crate::selector::{DisparitySelector, SelectorConfig};

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Parameters shared by every SGM variant.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct SgmParams {
    pub min_disparity: usize,
    /// Number of disparities searched, starting at `min_disparity`.
    pub disparity_range: usize,
    pub aggregation: AggregationConfig,
    pub selector: SelectorConfig,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CensusParams {
    pub sgm: SgmParams,
    /// Radius of the square census window, 1 to 3.
    pub radius: u32,
}

/// How the mutual information cost is initialised at the coarsest pyramid level when no seed
/// disparity is given.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub enum CoarseInit {
    /// Cheap cost where `right = scale_left_to_right * left`.
    Diagonal { scale_left_to_right: f64 },
    /// Every intensity pair costs the same.
    Flat,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct HmiParams {
    pub sgm: SgmParams,
    /// Number of pyramid levels, including full resolution.
    pub pyramid_levels: usize,
    /// Training and matching passes per level.
    pub iterations: usize,
    /// Largest histogram bin for left intensities.
    pub max_left_value: u16,
    /// Largest histogram bin for right intensities.
    pub max_right_value: u16,
    /// Largest raw left intensity, when it differs from `max_left_value`.
    pub input_max_left: Option<u32>,
    /// Largest raw right intensity, when it differs from `max_right_value`.
    pub input_max_right: Option<u32>,
    /// Parzen smoothing radius of the joint distribution.
    pub smoothing_radius: usize,
    pub init: CoarseInit,
}

/// Census + Hamming distance SGM.
#[derive(Debug)]
pub struct SgmCensus {
    params: CensusParams,
    volume: CostVolume,
    aggregator: PathAggregator,
    selector: DisparitySelector,
}

/// Hierarchical mutual information SGM.
#[derive(Debug)]
pub struct SgmMutualInformation {
    params: HmiParams,
    model: MutualInformationModel,
    volume: CostVolume,
    aggregator: PathAggregator,
    selector: DisparitySelector,
    seed: Option<DisparityMap>,
    cancel: Option<Arc<AtomicBool>>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl Default for SgmParams {
    fn default() -> Self {
        Self {
            min_disparity: 0,
            disparity_range: 64,
            aggregation: AggregationConfig::default(),
            selector: SelectorConfig::default(),
        }
    }
}

impl SgmParams {
    pub fn range(&self) -> Result<DisparityRange> {
        DisparityRange::new(self.min_disparity, self.disparity_range)
    }

    pub fn validate(&self) -> Result<()> {
        let range = self.range()?;
        self.aggregation.validate()?;
        self.selector.validate(range)
    }
}

impl Default for CensusParams {
    fn default() -> Self {
        Self {
            sgm: SgmParams::default(),
            radius: 2,
        }
    }
}

impl Default for CoarseInit {
    fn default() -> Self {
        CoarseInit::Diagonal {
            scale_left_to_right: 1.0,
        }
    }
}

impl Default for HmiParams {
    fn default() -> Self {
        Self {
            sgm: SgmParams::default(),
            pyramid_levels: 3,
            iterations: 1,
            max_left_value: 255,
            max_right_value: 255,
            input_max_left: None,
            input_max_right: None,
            smoothing_radius: 1,
            init: CoarseInit::default(),
        }
    }
}

impl HmiParams {
    pub fn validate(&self) -> Result<()> {
        self.sgm.validate()?;
        if self.pyramid_levels == 0 {
            return Err(Error::InvalidPyramidLevels(self.pyramid_levels));
        }
        if self.iterations == 0 {
            return Err(Error::InvalidIterations(self.iterations));
        }
        if self.max_left_value > MAX_HISTOGRAM_VALUE || self.max_right_value > MAX_HISTOGRAM_VALUE
        {
            return Err(Error::HistogramTooLarge {
                max_left: self.max_left_value,
                max_right: self.max_right_value,
                limit: MAX_HISTOGRAM_VALUE,
            });
        }
        Ok(())
    }

    /// Disparity range searched at a pyramid level.
    pub fn level_range(&self, level: usize) -> DisparityRange {
        let scale = 1usize << level;
        DisparityRange {
            min: self.sgm.min_disparity / scale,
            count: ((self.sgm.disparity_range + scale - 1) / scale).max(1),
        }
    }
}

impl SgmCensus {
    pub fn new(params: CensusParams) -> Result<Self> {
        params.sgm.validate()?;
        if params.radius == 0 || params.radius > 3 {
            return Err(Error::UnsupportedCensusRadius(params.radius));
        }
        Ok(Self {
            aggregator: PathAggregator::new(params.sgm.aggregation.clone())?,
            selector: DisparitySelector::new(params.sgm.selector.clone()),
            volume: CostVolume::default(),
            params,
        })
    }

    pub fn params(&self) -> &CensusParams {
        &self.params
    }

    /// Compute disparity from census images produced elsewhere.
    pub fn compute_census(
        &mut self,
        left: &CensusImage,
        right: &CensusImage,
    ) -> Result<DisparityMap> {
        let (width, height) = (left.width(), left.height());
        if (right.width(), right.height()) != (width, height) {
            return Err(Error::DimensionMismatch {
                left: (width, height),
                right: (right.width(), right.height()),
            });
        }

        let range = self.params.sgm.range()?;
        let cost = HammingCost::for_census(left, self.params.sgm.aggregation.max_cost);
        fill_cost_volume(
            &cost,
            left.as_slice(),
            right.as_slice(),
            width,
            height,
            range,
            &mut self.volume,
        )?;

        let aggregated = self.aggregator.process(&self.volume, range.min)?;
        let mut disp_map = DisparityMap::new(width, height, self.params.sgm.selector.invalid);
        self.selector.select(aggregated, range.min, &mut disp_map)?;
        Ok(disp_map)
    }
}

impl DisparityAlgorithm for SgmCensus {
    fn compute(&mut self, pair: &StereoPair) -> Result<DisparityMap> {
        info!(
            "Computing census SGM disparity for {}x{} pair",
            pair.width(),
            pair.height()
        );
        let left = census_transform(pair.left(), self.params.radius)?;
        let right = census_transform(pair.right(), self.params.radius)?;
        self.compute_census(&left, &right)
    }
}

impl SgmMutualInformation {
    pub fn new(params: HmiParams) -> Result<Self> {
        params.validate()?;

        let mut model = MutualInformationModel::new();
        model.configure_histogram(params.max_left_value, params.max_right_value);
        model.configure_input(
            params.input_max_left.unwrap_or(params.max_left_value as u32),
            params.input_max_right.unwrap_or(params.max_right_value as u32),
        );
        model.configure_smoothing(params.smoothing_radius);

        Ok(Self {
            aggregator: PathAggregator::new(params.sgm.aggregation.clone())?,
            selector: DisparitySelector::new(params.sgm.selector.clone()),
            volume: CostVolume::default(),
            model,
            seed: None,
            cancel: None,
            params,
        })
    }

    pub fn params(&self) -> &HmiParams {
        &self.params
    }

    /// The cost model as trained by the last computation.
    pub fn model(&self) -> &MutualInformationModel {
        &self.model
    }

    /// Full resolution disparity used to train the cost at the coarsest level instead of
    /// [`CoarseInit`].
    pub fn set_seed(&mut self, seed: Option<DisparityMap>) {
        self.seed = seed;
    }

    /// Flag checked between iterations. Setting it aborts the computation with
    /// [`Error::Cancelled`].
    pub fn set_cancel_flag(&mut self, flag: Arc<AtomicBool>) {
        self.cancel = Some(flag);
    }

    fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.load(Ordering::Relaxed) => Err(Error::Cancelled),
            _ => Ok(()),
        }
    }

    fn train(
        &mut self,
        left: &Gray16Image,
        right: &Gray16Image,
        disparity: &DisparityMap,
    ) -> Result<()> {
        self.model.process(left, right, disparity)?;
        self.model
            .precompute_scaled_cost(self.params.sgm.aggregation.max_cost)
    }

    /// Match with the current cost model: cost volume, aggregation, selection.
    fn estimate(
        &mut self,
        left: &Gray16Image,
        right: &Gray16Image,
        range: DisparityRange,
    ) -> Result<DisparityMap> {
        let (width, height) = (left.width() as usize, left.height() as usize);
        let cost = MutualInformationCost::new(&self.model)?;
        fill_cost_volume(
            &cost,
            left.as_raw(),
            right.as_raw(),
            width,
            height,
            range,
            &mut self.volume,
        )?;

        let aggregated = self.aggregator.process(&self.volume, range.min)?;
        let mut disp_map = DisparityMap::new(width, height, self.params.sgm.selector.invalid);
        self.selector.select(aggregated, range.min, &mut disp_map)?;
        Ok(disp_map)
    }

    /// Prepare the cost model for the coarsest level.
    fn initialise(&mut self, left: &Gray16Image, right: &Gray16Image) -> Result<()> {
        let max_cost = self.params.sgm.aggregation.max_cost;
        if let Some(seed) = self.seed.take() {
            let scaled = resample_disparity(&seed, left.width() as usize, left.height() as usize);
            let trained = self.train(left, right, &scaled);
            self.seed = Some(seed);
            return trained;
        }
        match self.params.init {
            CoarseInit::Diagonal {
                scale_left_to_right,
            } => self.model.diagonal_cost(scale_left_to_right, max_cost),
            CoarseInit::Flat => self.model.flat_cost(0),
        }
    }
}

impl DisparityAlgorithm for SgmMutualInformation {
    fn compute(&mut self, pair: &StereoPair) -> Result<DisparityMap> {
        info!(
            "Computing mutual information SGM disparity for {}x{} pair over {} levels",
            pair.width(),
            pair.height(),
            self.params.pyramid_levels
        );

        let lefts = build_pyramid(pair.left(), self.params.pyramid_levels)?;
        let rights = build_pyramid(pair.right(), self.params.pyramid_levels)?;
        let coarsest = lefts.len() - 1;

        self.initialise(&lefts[coarsest], &rights[coarsest])?;
        let mut disp_map = self.estimate(
            &lefts[coarsest],
            &rights[coarsest],
            self.params.level_range(coarsest),
        )?;

        for level in (0..=coarsest).rev() {
            let (left, right) = (&lefts[level], &rights[level]);
            let range = self.params.level_range(level);
            if level != coarsest {
                disp_map =
                    resample_disparity(&disp_map, left.width() as usize, left.height() as usize);
            }

            for iteration in 0..self.params.iterations {
                self.check_cancelled()?;
                self.train(left, right, &disp_map)?;
                disp_map = self.estimate(left, right, range)?;
                debug!(
                    "Level {} iteration {}: {:.1}% valid",
                    level,
                    iteration,
                    disp_map.valid_fraction() * 100.0
                );
            }
        }

        Ok(disp_map)
    }
}
