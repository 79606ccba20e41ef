//! # Geographic Utilities
//!
//! Core geographic computation utilities for trail deviation analysis.
//!
//! This module provides the distance primitives used throughout the analytics
//! library. All functions are designed to be efficient and accurate for GPS
//! trajectory data at trail scale (tens of meters to low kilometers).
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`project`] | Equirectangular projection of a coordinate into local meters |
//! | [`point_to_segment_distance`] | Perpendicular distance from a point to a polyline segment |
//! | [`nearest_distance_to_polyline`] | Minimum distance from a point to any segment of a polyline |
//! | [`haversine_distance`] | Great-circle distance between two GPS points |
//! | [`polyline_length`] | Total length of a GPS track in meters |
//! | [`downsample`] | Reduce a polyline to a bounded point count for repeated scans |
//!
//! ## Example
//!
//! ```rust
//! use trail_analytics::{GeoPoint, geo_utils};
//!
//! let trail = vec![
//!     GeoPoint::new(39.7392, -104.9903),  // Denver
//!     GeoPoint::new(39.7400, -104.9910),
//!     GeoPoint::new(39.7410, -104.9920),
//! ];
//!
//! // How far has a rider strayed from the trail?
//! let rider = GeoPoint::new(39.7395, -104.9890);
//! let deviation = geo_utils::nearest_distance_to_polyline(&rider, &trail);
//! println!("Deviation: {:.0}m", deviation);
//!
//! // Total trail length
//! let length = geo_utils::polyline_length(&trail);
//! println!("Trail length: {:.0}m", length);
//! ```
//!
//! ## Algorithm Notes
//!
//! ### Planar Approximation
//!
//! Deviation distances use a local equirectangular projection anchored at the
//! segment's own mid-latitude: `x = lon * cos(ref_lat) * 111,320`,
//! `y = lat * 111,320`. Anchoring per segment keeps the local error small for
//! thresholds on the order of tens of feet. This is intentionally cheap and is
//! NOT suitable for long-range geodesy.
//!
//! ### Haversine Formula
//!
//! Track distance accumulation uses the haversine great-circle formula, the
//! standard method for GPS distance calculation, accurate to within 0.3% for
//! most practical applications.
//!
//! ### Coordinate System
//!
//! All functions expect WGS84 coordinates (latitude/longitude in degrees),
//! which is the standard used by GPS receivers and mapping services.

use geo::{Coord, LineString, Point, Haversine, Distance, algorithm::simplify::Simplify};
use crate::GeoPoint;

/// Meters per degree of latitude (and of longitude at the equator).
const METERS_PER_DEGREE: f64 = 111_320.0;

// =============================================================================
// Planar Projection
// =============================================================================

/// Project a coordinate into a local planar frame, in meters.
///
/// Equirectangular approximation: `x = lon * cos(ref_lat) * 111,320`,
/// `y = lat * 111,320`. Valid for short ranges around `ref_lat`.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees
/// * `lon` - Longitude in degrees
/// * `ref_lat` - Reference latitude (in degrees) anchoring the projection
///
/// # Returns
///
/// `(x, y)` in meters east/north of the (0, 0) graticule origin.
#[inline]
pub fn project(lat: f64, lon: f64, ref_lat: f64) -> (f64, f64) {
    let x = lon * ref_lat.to_radians().cos() * METERS_PER_DEGREE;
    let y = lat * METERS_PER_DEGREE;
    (x, y)
}

/// Perpendicular distance in meters from point `p` to the segment `[a, b]`.
///
/// All three points are projected into a plane anchored at the segment's
/// mid-latitude, then the distance to the clamped parametric projection of
/// `p` onto `[a, b]` is computed (`t` clamped to `[0, 1]`). A degenerate
/// segment (`a == b`) reduces to point-to-point distance.
///
/// The value is non-negative and invariant under swapping `a` and `b`.
///
/// # Example
///
/// ```rust
/// use trail_analytics::{GeoPoint, geo_utils};
///
/// let a = GeoPoint::new(0.0, 0.0);
/// let b = GeoPoint::new(0.0, 0.001); // ~111m east at the equator
/// let p = GeoPoint::new(0.0001, 0.0005); // ~11m north of the midpoint
///
/// let dist = geo_utils::point_to_segment_distance(&p, &a, &b);
/// assert!((dist - 11.1).abs() < 0.5);
/// ```
pub fn point_to_segment_distance(p: &GeoPoint, a: &GeoPoint, b: &GeoPoint) -> f64 {
    let ref_lat = (a.latitude + b.latitude) / 2.0;

    let (px, py) = project(p.latitude, p.longitude, ref_lat);
    let (ax, ay) = project(a.latitude, a.longitude, ref_lat);
    let (bx, by) = project(b.latitude, b.longitude, ref_lat);

    let dx = bx - ax;
    let dy = by - ay;
    let len_sq = dx * dx + dy * dy;

    if len_sq == 0.0 {
        // Degenerate segment: point-to-point distance
        return ((px - ax).powi(2) + (py - ay).powi(2)).sqrt();
    }

    let t = (((px - ax) * dx + (py - ay) * dy) / len_sq).clamp(0.0, 1.0);
    let cx = ax + t * dx;
    let cy = ay + t * dy;

    ((px - cx).powi(2) + (py - cy).powi(2)).sqrt()
}

/// Minimum distance in meters from `p` to any segment of `polyline`.
///
/// Linear scan over consecutive point pairs. Returns `f64::INFINITY` when the
/// polyline has fewer than 2 points. No spatial index is used: a linear scan
/// is correct and fast enough for polylines of a few hundred points. Callers
/// that invoke this repeatedly against long polylines should [`downsample`]
/// first.
///
/// # Example
///
/// ```rust
/// use trail_analytics::{GeoPoint, geo_utils};
///
/// let p = GeoPoint::new(0.0, 0.0);
/// assert_eq!(geo_utils::nearest_distance_to_polyline(&p, &[]), f64::INFINITY);
/// ```
pub fn nearest_distance_to_polyline(p: &GeoPoint, polyline: &[GeoPoint]) -> f64 {
    if polyline.len() < 2 {
        return f64::INFINITY;
    }

    polyline
        .windows(2)
        .map(|w| point_to_segment_distance(p, &w[0], &w[1]))
        .fold(f64::INFINITY, f64::min)
}

// =============================================================================
// Track Distance Functions
// =============================================================================

/// Calculate the great-circle distance between two GPS points using the
/// haversine formula.
///
/// Returns the distance in meters along the Earth's surface (assuming a
/// spherical Earth with radius 6,371 km).
///
/// # Example
///
/// ```rust
/// use trail_analytics::{GeoPoint, geo_utils};
///
/// let london = GeoPoint::new(51.5074, -0.1278);
/// let paris = GeoPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_distance(&london, &paris);
/// assert!((distance - 343_560.0).abs() < 1000.0); // ~344 km
/// ```
#[inline]
pub fn haversine_distance(p1: &GeoPoint, p2: &GeoPoint) -> f64 {
    let point1 = Point::new(p1.longitude, p1.latitude);
    let point2 = Point::new(p2.longitude, p2.latitude);
    Haversine::distance(point1, point2)
}

/// Calculate the total length of a polyline (GPS track) in meters.
///
/// Sums the haversine distance between consecutive points. Empty or
/// single-point tracks return 0.0.
pub fn polyline_length(points: &[GeoPoint]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    points
        .windows(2)
        .map(|w| haversine_distance(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Downsampling
// =============================================================================

/// Reduce a polyline to a bounded number of points.
///
/// Invalid points are dropped, the remainder is simplified with
/// Douglas-Peucker at `tolerance_degrees`, and the result is uniformly
/// sampled down to `max_points` if still too long. Inputs with fewer than 3
/// valid points are returned as-is.
///
/// Deviation segmentation is O(run_len x reference_len); hosts recording long
/// sessions against long official trails should pass both polylines through
/// this before segmenting repeatedly.
///
/// # Arguments
///
/// * `points` - Polyline to reduce
/// * `tolerance_degrees` - Douglas-Peucker tolerance (0.0001 ~ 11 meters)
/// * `max_points` - Hard cap on the output point count (>= 2)
pub fn downsample(points: &[GeoPoint], tolerance_degrees: f64, max_points: usize) -> Vec<GeoPoint> {
    let coords: Vec<Coord> = points
        .iter()
        .filter(|p| p.is_valid())
        .map(|p| Coord { x: p.longitude, y: p.latitude })
        .collect();

    if coords.len() < 3 {
        return coords.iter().map(|c| GeoPoint::new(c.y, c.x)).collect();
    }

    let simplified = LineString::new(coords).simplify(&tolerance_degrees);

    // Uniform sampling cap, keeping traversal order
    let final_coords: Vec<Coord> = if simplified.0.len() > max_points && max_points >= 2 {
        let step = simplified.0.len() as f64 / max_points as f64;
        (0..max_points)
            .map(|i| simplified.0[(i as f64 * step) as usize])
            .collect()
    } else {
        simplified.0
    };

    final_coords.iter().map(|c| GeoPoint::new(c.y, c.x)).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
