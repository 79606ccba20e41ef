//! # Deviation Segmentation
//!
//! Classifies a recorded run against an official trail polyline and splits it
//! into contiguous colored segments by how far each traveled piece has strayed.
//!
//! ## Algorithm
//! 1. Walk consecutive point pairs of the run polyline
//! 2. For each pair, measure the trailing point's nearest distance to the reference
//! 3. Classify against the warn/critical thresholds
//! 4. Merge consecutive pairs sharing a classification into one segment
//!
//! Output segments partition the run in traversal order and no two adjacent
//! segments share a color. The classification deliberately uses the trailing
//! point of each pair as representative of the whole sub-segment, favoring the
//! newest measurement.

use crate::{geo_utils, GeoPoint};

/// Configuration for deviation classification.
///
/// Precondition: `critical_threshold_meters >= warn_threshold_meters >= 0.0`.
/// Violating this is a caller error and is not defended against.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DeviationConfig {
    /// Color tag for sub-segments within the warn threshold
    pub normal_color: String,
    /// Color tag for sub-segments between the warn and critical thresholds
    pub warn_color: String,
    /// Color tag for sub-segments at or beyond the critical threshold
    pub critical_color: String,
    /// Deviation at which a sub-segment turns warn-colored (meters)
    pub warn_threshold_meters: f64,
    /// Deviation at which a sub-segment turns critical-colored (meters)
    pub critical_threshold_meters: f64,
}

impl Default for DeviationConfig {
    fn default() -> Self {
        Self {
            normal_color: "#3bb2d0".to_string(),
            warn_color: "#f1f075".to_string(),
            critical_color: "#e55e5e".to_string(),
            warn_threshold_meters: 15.24,     // 50 ft
            critical_threshold_meters: 22.86, // 75 ft
        }
    }
}

/// A maximal contiguous piece of the run sharing one deviation classification.
///
/// Always holds at least 2 points. Consecutive segments returned by
/// [`segment_route`] overlap by one point at each boundary so each can be
/// drawn as a standalone polyline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ColoredSegment {
    /// Color tag from the [`DeviationConfig`] that produced this segment
    pub color: String,
    /// Points of this segment, in traversal order
    pub points: Vec<GeoPoint>,
}

/// Classify a run polyline against a reference polyline.
///
/// Returns contiguous colored segments in traversal order; adjacent segments
/// never share a color. Degenerate inputs degrade rather than error: a run
/// with fewer than 2 points yields no segments, and a reference with fewer
/// than 2 points yields a single segment tagged with the normal color
/// containing the whole run. Pairs touching a non-finite coordinate are
/// silently skipped.
///
/// Complexity is O(run_len x reference_len); hosts with long polylines should
/// reduce both with [`geo_utils::downsample`] before calling repeatedly.
///
/// # Example
///
/// ```rust
/// use trail_analytics::{GeoPoint, DeviationConfig, segment_route};
///
/// let reference = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.001)];
/// let run = vec![
///     GeoPoint::new(0.0, 0.0),
///     GeoPoint::new(0.0, 0.0005),
///     GeoPoint::new(0.001, 0.0005), // ~111m off the trail
/// ];
///
/// let segments = segment_route(&run, &reference, &DeviationConfig::default());
/// assert_eq!(segments.len(), 2);
/// assert_eq!(segments[1].color, DeviationConfig::default().critical_color);
/// ```
pub fn segment_route(
    run: &[GeoPoint],
    reference: &[GeoPoint],
    config: &DeviationConfig,
) -> Vec<ColoredSegment> {
    if run.len() < 2 {
        return Vec::new();
    }

    if reference.len() < 2 {
        // No usable reference: the whole run renders as on-trail
        return vec![ColoredSegment {
            color: config.normal_color.clone(),
            points: run.to_vec(),
        }];
    }

    let mut segments: Vec<ColoredSegment> = Vec::new();
    let mut current_points: Vec<GeoPoint> = Vec::new();
    let mut current_color = String::new();

    for i in 1..run.len() {
        let prev = run[i - 1];
        let curr = run[i];

        // Malformed fixes are dropped, not surfaced
        if !prev.is_valid() || !curr.is_valid() {
            continue;
        }

        // Trailing point represents the whole sub-segment
        let deviation = geo_utils::nearest_distance_to_polyline(&curr, reference);
        let color = classify(deviation, config);

        if current_points.is_empty() {
            current_color = color.to_string();
            current_points.push(prev);
        } else if color != current_color {
            close_group(&mut segments, &mut current_points, &mut current_color);
            current_color = color.to_string();
            current_points.push(prev);
        }

        current_points.push(curr);
    }

    close_group(&mut segments, &mut current_points, &mut current_color);
    segments
}

/// Map a deviation distance to its color tag.
fn classify<'a>(deviation: f64, config: &'a DeviationConfig) -> &'a str {
    if deviation >= config.critical_threshold_meters {
        &config.critical_color
    } else if deviation >= config.warn_threshold_meters {
        &config.warn_color
    } else {
        &config.normal_color
    }
}

/// Emit the current group, dropping it if it holds fewer than 2 points.
fn close_group(
    segments: &mut Vec<ColoredSegment>,
    points: &mut Vec<GeoPoint>,
    color: &mut String,
) {
    if points.len() >= 2 {
        segments.push(ColoredSegment {
            color: std::mem::take(color),
            points: std::mem::take(points),
        });
    } else {
        points.clear();
        color.clear();
    }
}

/// Classify many recorded runs against one reference trail in parallel.
///
/// Same contract as [`segment_route`] applied per run; output order matches
/// input order. Recommended when coloring a leaderboard's worth of runs.
#[cfg(feature = "parallel")]
pub fn segment_routes_parallel(
    runs: &[Vec<GeoPoint>],
    reference: &[GeoPoint],
    config: &DeviationConfig,
) -> Vec<Vec<ColoredSegment>> {
    use rayon::prelude::*;

    log::info!(
        "Segmenting {} runs against a {}-point reference",
        runs.len(),
        reference.len()
    );

    runs.par_iter()
        .map(|run| segment_route(run, reference, config))
        .collect()
}
