//! # Error standards
//!
//! This module provides a standardised error enum and result type for this crate.

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Standard result type used in the sgm crate.
pub type Result<T> = std::result::Result<T, Error>;

// -----------------------------------------------------------------------------------------------
// ENUMERATIONS
// -----------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Disparity range must contain at least one disparity")]
    EmptyDisparityRange,

    #[error(
        "Penalties must satisfy 0 < penalty1 < penalty2, got penalty1={penalty1}, \
         penalty2={penalty2}"
    )]
    InvalidPenalties { penalty1: u32, penalty2: u32 },

    #[error("Number of paths must be 1 to 16, inclusive. Not {0}")]
    InvalidPathCount(usize),

    #[error(
        "{paths} paths with max_cost={max_cost} and penalty2={penalty2} can overflow the 16 bit \
         aggregated cost"
    )]
    AccumulatorOverflow { paths: usize, max_cost: u16, penalty2: u32 },

    #[error("Image dimensions do not match: left is {left:?}, right is {right:?}")]
    DimensionMismatch {
        left: (usize, usize),
        right: (usize, usize),
    },

    #[error("Cost volume holds a cost of {found}, above the configured max_cost={max_cost}")]
    CostAboveMaximum { found: u16, max_cost: u16 },

    #[error("Invalid disparity value {0} lies inside the disparity range")]
    InvalidSentinel(i32),

    #[error("Histogram must be configured before the mutual information model is used")]
    HistogramNotConfigured,

    #[error("Mutual information cost requested before the model was trained")]
    ModelNotTrained,

    #[error("Census radius {0} is not supported, use 1, 2 or 3")]
    UnsupportedCensusRadius(u32),

    #[error("Pyramid must have at least one level, got {0}")]
    InvalidPyramidLevels(usize),

    #[error("At least one iteration per pyramid level is required, got {0}")]
    InvalidIterations(usize),

    #[error(
        "Histogram of {max_left} x {max_right} values is too large, the limit per image is \
         {limit}"
    )]
    HistogramTooLarge {
        max_left: u16,
        max_right: u16,
        limit: u16,
    },

    #[error("Disparity computation was cancelled")]
    Cancelled,
}
