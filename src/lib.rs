//! # Semi-Global Matching
//!
//! This crate provides dense disparity map computation for rectified stereo pairs using
//! Semi-Global Matching, with either a census/Hamming matching cost or a hierarchically trained
//! mutual information cost.

// -----------------------------------------------------------------------------------------------
// MODULES
// -----------------------------------------------------------------------------------------------

pub mod aggregation;
pub mod census;
pub mod cost;
pub mod cost_volume;
mod disparity;
mod error;
mod frame;
pub mod mutual_information;
pub mod pyramid;
pub mod selector;
pub mod sgm;

// -----------------------------------------------------------------------------------------------
// EXPORTS
// -----------------------------------------------------------------------------------------------

pub use error::{Error, Result};

pub mod prelude {
    pub use crate::aggregation::{AggregationConfig, PathAggregator};
    pub use crate::cost::CostFunction;
    pub use crate::cost_volume::{CostVolume, DisparityRange, DEFAULT_MAX_COST};
    pub use crate::disparity::{DisparityAlgorithm, DisparityMap, INVALID_DISPARITY};
    pub use crate::frame::{Gray16Image, StereoPair};
    pub use crate::mutual_information::MutualInformationModel;
    pub use crate::selector::{DisparitySelector, SelectorConfig};
    pub use crate::sgm::{CensusParams, HmiParams, SgmCensus, SgmMutualInformation, SgmParams};
}
