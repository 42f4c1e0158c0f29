//! Tests for winner-take-all disparity selection

// -----------------------------------------------------------------------------------------------
// IMPORTS
// -----------------------------------------------------------------------------------------------

mod common;

use cv_sgm::cost_volume::{CostVolume, DisparityRange};
use cv_sgm::prelude::*;
use cv_sgm::selector::{select_left, select_right};
use cv_sgm::Error;

// -----------------------------------------------------------------------------------------------
// HELPERS
// -----------------------------------------------------------------------------------------------

fn selector(tolerance: i32) -> DisparitySelector {
    DisparitySelector::new(SelectorConfig {
        right_to_left_tolerance: tolerance,
        ..SelectorConfig::default()
    })
}

/// Volume with a zero cost at `d = (x + y) % range` and 200 elsewhere.
fn diagonal_volume(width: usize, height: usize, range: usize) -> CostVolume {
    let mut volume = CostVolume::new(width, height, range);
    volume.fill(200);
    for y in 0..height {
        for x in 0..width {
            volume.set(x, y, (x + y) % range, 0);
        }
    }
    volume
}

/// Volume with cost 10 at `d = 5` and 200 elsewhere.
fn single_minimum_volume() -> CostVolume {
    let mut volume = CostVolume::new(30, 3, 12);
    volume.fill(200);
    for y in 0..3 {
        for x in 0..30 {
            volume.set(x, y, 5, 10);
        }
    }
    volume
}

// -----------------------------------------------------------------------------------------------
// TESTS
// -----------------------------------------------------------------------------------------------

#[test]
fn selects_known_minimum() {
    let (width, height, n) = (25, 6, 8);
    let volume = diagonal_volume(width, height, n);

    let mut disp = DisparityMap::new(0, 0, INVALID_DISPARITY);
    selector(-1).select(&volume, 0, &mut disp).unwrap();

    assert_eq!((width, height), (disp.width(), disp.height()));
    for y in 0..height {
        for x in 0..width {
            let target = (x + y) % n;
            let local = (x + 1).min(n);
            let expected = if target < local { target } else { 0 };
            assert_eq!(expected as i32, disp.get(x, y), "x={} y={}", x, y);
        }
    }
    assert_eq!(Some(0), disp.min_disp);
    assert_eq!(Some(n as i32 - 1), disp.max_disp);
}

#[test]
fn minimum_disparity_offsets_selection() {
    let (width, height, n, min) = (25, 6, 8, 5);
    let volume = diagonal_volume(width, height, n);

    let mut disp = DisparityMap::new(width, height, INVALID_DISPARITY);
    selector(-1).select(&volume, min, &mut disp).unwrap();

    for y in 0..height {
        for x in 0..width {
            let found = disp.get(x, y);
            if x < min {
                assert_eq!(INVALID_DISPARITY, found, "x={} y={}", x, y);
                continue;
            }
            let target = (x + y) % n;
            let local = (x + 1 - min).min(n);
            let expected = if target < local { target + min } else { min };
            assert_eq!(expected as i32, found, "x={} y={}", x, y);
        }
    }
}

#[test]
fn ties_keep_smaller_disparity() {
    let mut volume = CostVolume::new(10, 1, 6);
    volume.fill(50);
    volume.set(9, 0, 2, 7);
    volume.set(9, 0, 4, 7);

    let range = DisparityRange::new(0, 6).unwrap();
    assert_eq!(Some((2, 7)), select_left(&volume, range, 9, 0));
    assert_eq!(Some((0, 50)), select_left(&volume, range, 3, 0));

    let mut disp = DisparityMap::new(10, 1, INVALID_DISPARITY);
    selector(-1).select(&volume, 0, &mut disp).unwrap();
    assert_eq!(2, disp.get(9, 0));
}

#[test]
fn right_to_left_check_rejects_disagreement() {
    let k = 3;
    let mut volume = single_minimum_volume();
    let range = DisparityRange::new(0, 12).unwrap();

    // Consistent before the right pixel gains a cheaper match
    assert_eq!(Some((5, 10)), select_left(&volume, range, 20, 1));
    assert_eq!(Some(5), select_right(&volume, range, 15, 1));
    let mut disp = DisparityMap::new(30, 3, INVALID_DISPARITY);
    selector(0).select(&volume, 0, &mut disp).unwrap();
    assert_eq!(5, disp.get(20, 1));

    volume.set(15 + 5 + k, 1, 5 + k, 0);
    assert_eq!(Some(5 + k), select_right(&volume, range, 15, 1));

    for tolerance in 0..k as i32 {
        selector(tolerance).select(&volume, 0, &mut disp).unwrap();
        assert_eq!(INVALID_DISPARITY, disp.get(20, 1), "tolerance {}", tolerance);
    }
    for tolerance in k as i32..k as i32 + 2 {
        selector(tolerance).select(&volume, 0, &mut disp).unwrap();
        assert_eq!(5, disp.get(20, 1), "tolerance {}", tolerance);
    }

    // Negative tolerance turns the check off
    selector(-1).select(&volume, 0, &mut disp).unwrap();
    assert_eq!(5, disp.get(20, 1));
}

#[test]
fn right_scan_stops_at_image_edge() {
    let volume = single_minimum_volume();
    let range = DisparityRange::new(0, 12).unwrap();

    // Only xl = 27, 28, 29 exist for xr = 27
    assert_eq!(Some(0), select_right(&volume, range, 27, 0));
    assert_eq!(Some(5), select_right(&volume, range, 24, 0));
    assert_eq!(None, select_right(&volume, range, 30, 0));

    let shifted = DisparityRange::new(4, 12).unwrap();
    assert_eq!(None, select_right(&volume, shifted, 26, 0));
}

#[test]
fn max_error_rejects_expensive_winners() {
    let volume = single_minimum_volume();
    let strict = DisparitySelector::new(SelectorConfig {
        right_to_left_tolerance: -1,
        max_error: Some(9),
        ..SelectorConfig::default()
    });
    let loose = DisparitySelector::new(SelectorConfig {
        right_to_left_tolerance: -1,
        max_error: Some(10),
        ..SelectorConfig::default()
    });

    let mut disp = DisparityMap::new(30, 3, INVALID_DISPARITY);
    strict.select(&volume, 0, &mut disp).unwrap();
    assert_eq!(INVALID_DISPARITY, disp.get(20, 1));
    assert_eq!(0.0, disp.valid_fraction());

    loose.select(&volume, 0, &mut disp).unwrap();
    assert_eq!(5, disp.get(20, 1));
}

#[test]
fn custom_sentinel_is_written() {
    let volume = single_minimum_volume();
    let sel = DisparitySelector::new(SelectorConfig {
        invalid: 1000,
        right_to_left_tolerance: -1,
        max_error: None,
    });

    // The output map takes on the selector's sentinel
    let mut disp = DisparityMap::new(5, 5, INVALID_DISPARITY);
    sel.select(&volume, 3, &mut disp).unwrap();
    assert_eq!(1000, disp.invalid());
    assert_eq!(1000, disp.get(2, 0));
    assert_eq!(8, disp.get(20, 0));
}

#[test]
fn sentinel_inside_range_is_rejected() {
    let volume = single_minimum_volume();
    let sel = DisparitySelector::new(SelectorConfig {
        invalid: 4,
        ..SelectorConfig::default()
    });
    let mut disp = DisparityMap::new(30, 3, 4);
    assert_eq!(
        Error::InvalidSentinel(4),
        sel.select(&volume, 0, &mut disp).unwrap_err()
    );
    assert!(sel.select(&volume, 5, &mut disp).is_ok());
}
