//! # Stereo frames
//!
//! Rectified left/right image pairs fed to the disparity algorithms. Images are stored as 16 bit
//! single band buffers so that 8 bit and 12 bit sensors share one container.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use image::{GrayImage, ImageBuffer, Luma};

use crate::error::*;

// -----------------------------------------------------------------------------------------------
// TYPES
// -----------------------------------------------------------------------------------------------

/// Single band image with up to 16 bits per pixel.
pub type Gray16Image = ImageBuffer<Luma<u16>, Vec<u16>>;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// A rectified stereo pair. Both images always have the same dimensions.
#[derive(Debug, Clone)]
pub struct StereoPair {
    left: Gray16Image,
    right: Gray16Image,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl StereoPair {
    /// Create a new pair, failing if the images differ in size.
    pub fn new(left: Gray16Image, right: Gray16Image) -> Result<Self> {
        check_same_shape(&left, &right)?;
        Ok(Self { left, right })
    }

    /// Build a pair from two 8 bit images.
    pub fn from_luma8(left: &GrayImage, right: &GrayImage) -> Result<Self> {
        Self::new(widen(left), widen(right))
    }

    pub fn left(&self) -> &Gray16Image {
        &self.left
    }

    pub fn right(&self) -> &Gray16Image {
        &self.right
    }

    pub fn width(&self) -> usize {
        self.left.width() as usize
    }

    pub fn height(&self) -> usize {
        self.left.height() as usize
    }
}

/// Returns an error if the two images do not have identical dimensions.
pub fn check_same_shape(left: &Gray16Image, right: &Gray16Image) -> Result<()> {
    if left.dimensions() != right.dimensions() {
        return Err(Error::DimensionMismatch {
            left: (left.width() as usize, left.height() as usize),
            right: (right.width() as usize, right.height() as usize),
        });
    }
    Ok(())
}

/// Converts an 8 bit image into a 16 bit one without rescaling the values.
pub fn widen(img: &GrayImage) -> Gray16Image {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        Luma([img.get_pixel(x, y)[0] as u16])
    })
}
