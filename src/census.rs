//! # Census transform
//!
//! Encodes the ordinal pattern of each pixel's square neighbourhood as a bit string. A bit is set
//! when the neighbour is brighter than the centre. Pixels outside the image take the value of the
//! nearest border pixel.

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

use rayon::prelude::*;

use crate::error::*;
use crate::frame::Gray16Image;

// -----------------------------------------------------------------------------------------------
// DATA STRUCTURES
// -----------------------------------------------------------------------------------------------

/// Census descriptors for every pixel of an image.
#[derive(Debug, Clone, PartialEq)]
pub struct CensusImage {
    width: usize,
    height: usize,
    bits: u32,
    data: Vec<u64>,
}

// -----------------------------------------------------------------------------------------------
// IMPLEMENTATIONS
// -----------------------------------------------------------------------------------------------

impl CensusImage {
    /// Wrap precomputed descriptors. `data` is row major and `bits` the descriptor length.
    pub fn from_raw(width: usize, height: usize, bits: u32, data: Vec<u64>) -> Option<Self> {
        if data.len() != width * height || bits == 0 || bits > 64 {
            return None;
        }
        Some(Self {
            width,
            height,
            bits,
            data,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of meaningful bits in every descriptor.
    pub fn bits(&self) -> u32 {
        self.bits
    }

    pub fn get(&self, x: usize, y: usize) -> u64 {
        self.data[y * self.width + x]
    }

    pub fn as_slice(&self) -> &[u64] {
        &self.data
    }
}

/// Number of descriptor bits produced by a square window of the given radius.
pub fn census_bits(radius: u32) -> u32 {
    let side = 2 * radius + 1;
    side * side - 1
}

/// Compute the census transform over a `(2r+1) x (2r+1)` window. Radii above 3 do not fit in 64
/// bits and are rejected.
pub fn census_transform(img: &Gray16Image, radius: u32) -> Result<CensusImage> {
    if radius == 0 || radius > 3 {
        return Err(Error::UnsupportedCensusRadius(radius));
    }

    let width = img.width() as usize;
    let height = img.height() as usize;
    let raw = img.as_raw();
    let r = radius as isize;
    let mut data = vec![0u64; width * height];

    if width > 0 {
        data.par_chunks_mut(width).enumerate().for_each(|(y, row)| {
            for (x, out) in row.iter_mut().enumerate() {
                let center = raw[y * width + x];
                let mut desc = 0u64;
                for j in -r..=r {
                    let yy = clamp(y as isize + j, height);
                    for i in -r..=r {
                        if i == 0 && j == 0 {
                            continue;
                        }
                        let xx = clamp(x as isize + i, width);
                        desc <<= 1;
                        if raw[yy * width + xx] > center {
                            desc |= 1;
                        }
                    }
                }
                *out = desc;
            }
        });
    }

    Ok(CensusImage {
        width,
        height,
        bits: census_bits(radius),
        data,
    })
}

#[inline]
fn clamp(v: isize, len: usize) -> usize {
    v.max(0).min(len as isize - 1) as usize
}
