//! # Trail Analytics
//!
//! Route-deviation and live GPS track analytics for trail recording.
//!
//! This library provides:
//! - Deviation classification of a recorded run against an official trail polyline
//! - Incremental live statistics (distance, duration, speed extrema) during recording
//! - Cheap planar-projection distance primitives tuned for trail scale
//!
//! ## Features
//!
//! - **`parallel`** - Enable batch segmentation with rayon
//! - **`serde`** - Enable serde derives and the persisted run-record payload
//! - **`ffi`** - Enable FFI bindings for mobile platforms (iOS/Android)
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use trail_analytics::{GeoPoint, TrackFix, TrackAggregator, DeviationConfig, segment_route};
//!
//! // Record a short session
//! let mut aggregator = TrackAggregator::new();
//! aggregator.start();
//! aggregator.add_fix(TrackFix::new(0.0, 0.0, 2.0, 0));
//! aggregator.add_fix(TrackFix::new(0.0, 0.0003, 3.0, 1000));
//! aggregator.add_fix(TrackFix::new(0.001, 0.0006, 4.0, 2000));
//!
//! let stats = aggregator.snapshot();
//! println!("{:.0}m in {:.0}s", stats.distance_meters, stats.duration_seconds);
//!
//! // Color the run against the official trail
//! let run = aggregator.route();
//! aggregator.finish();
//! let trail = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.001)];
//! let segments = segment_route(&run, &trail, &DeviationConfig::default());
//! for segment in &segments {
//!     println!("{}: {} points", segment.color, segment.points.len());
//! }
//! ```

// Distance primitives (planar projection + haversine)
pub mod geo_utils;

// Deviation classification of runs against reference trails
pub mod deviation;
pub use deviation::{ColoredSegment, DeviationConfig, segment_route};

#[cfg(feature = "parallel")]
pub use deviation::segment_routes_parallel;

// Live statistics over a growing fix sequence
pub mod tracker;
pub use tracker::{TrackAggregator, recompute_stats};

#[cfg(feature = "serde")]
pub use tracker::RunRecord;

#[cfg(feature = "ffi")]
uniffi::setup_scaffolding!();

/// Initialize logging for Android (only used in FFI)
#[cfg(all(feature = "ffi", target_os = "android"))]
fn init_logging() {
    use android_logger::Config;
    use log::LevelFilter;

    android_logger::init_once(
        Config::default()
            .with_max_level(LevelFilter::Debug)
            .with_tag("TrailAnalyticsRust")
    );
}

#[cfg(all(feature = "ffi", not(target_os = "android")))]
fn init_logging() {
    // No-op on non-Android platforms
}

// ============================================================================
// Core Types
// ============================================================================

/// A GPS coordinate with latitude and longitude.
///
/// # Example
/// ```
/// use trail_analytics::GeoPoint;
/// let point = GeoPoint::new(39.7392, -104.9903); // Denver
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    /// Create a new GPS point.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Check if the point has valid coordinates.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }
}

/// One GPS sample with position, motion, and time metadata.
///
/// Produced by the host's location provider once per callback and handed to a
/// [`TrackAggregator`] for the duration of one recording session.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackFix {
    pub latitude: f64,
    pub longitude: f64,
    /// Ground speed in m/s; negative or NaN means unknown
    pub speed: f64,
    /// Course over ground in degrees
    pub heading: f64,
    /// Altitude in meters above the WGS84 ellipsoid
    pub altitude: f64,
    /// Horizontal accuracy radius in meters
    pub accuracy: f64,
    /// Epoch milliseconds
    pub timestamp_ms: i64,
}

impl TrackFix {
    /// Create a fix from the fields the analytics actually consume; heading,
    /// altitude, and accuracy default to 0.
    pub fn new(latitude: f64, longitude: f64, speed: f64, timestamp_ms: i64) -> Self {
        Self {
            latitude,
            longitude,
            speed,
            heading: 0.0,
            altitude: 0.0,
            accuracy: 0.0,
            timestamp_ms,
        }
    }

    /// Coordinate part of this fix.
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    /// Whether the provider reported a usable speed.
    pub fn has_known_speed(&self) -> bool {
        self.speed.is_finite() && self.speed >= 0.0
    }
}

/// Running statistics for the active recording session.
///
/// Derived solely from the current fix sequence; recomputed on every
/// [`TrackAggregator::snapshot`], never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "ffi", derive(uniffi::Record))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LiveStats {
    /// Cumulative traveled distance in meters
    pub distance_meters: f64,
    /// Elapsed time between first and last fix in seconds, never negative
    pub duration_seconds: f64,
    /// `distance_meters / duration_seconds`, or 0 while duration is 0
    pub avg_speed: f64,
    /// Minimum reported speed in m/s (0 until a speed is known)
    pub min_speed: f64,
    /// Maximum reported speed in m/s (0 until a speed is known)
    pub max_speed: f64,
}

// ============================================================================
// FFI Exports (only when feature enabled)
// ============================================================================

#[cfg(feature = "ffi")]
mod ffi {
    use super::*;
    use log::{debug, info};

    /// Get the default deviation configuration.
    #[uniffi::export]
    pub fn default_deviation_config() -> DeviationConfig {
        init_logging();
        DeviationConfig::default()
    }

    /// Classify one run against a reference trail.
    #[uniffi::export]
    pub fn ffi_segment_route(
        run: Vec<GeoPoint>,
        reference: Vec<GeoPoint>,
        config: DeviationConfig,
    ) -> Vec<ColoredSegment> {
        init_logging();
        debug!(
            "[TrailAnalyticsRust] segment_route: {} run points vs {} reference points",
            run.len(),
            reference.len()
        );
        let segments = segment_route(&run, &reference, &config);
        info!("[TrailAnalyticsRust] segment_route produced {} segments", segments.len());
        segments
    }

    /// Classify a run supplied as a flat coordinate buffer [lat1, lng1, lat2, lng2, ...].
    /// Avoids deserializing GeoPoint objects when the host holds a TypedArray.
    #[uniffi::export]
    pub fn segment_route_flat(
        run_coords: Vec<f64>,
        reference_coords: Vec<f64>,
        config: DeviationConfig,
    ) -> Vec<ColoredSegment> {
        init_logging();

        let run: Vec<GeoPoint> = run_coords
            .chunks_exact(2)
            .map(|chunk| GeoPoint::new(chunk[0], chunk[1]))
            .collect();
        let reference: Vec<GeoPoint> = reference_coords
            .chunks_exact(2)
            .map(|chunk| GeoPoint::new(chunk[0], chunk[1]))
            .collect();

        segment_route(&run, &reference, &config)
    }

    /// One recorded run for batch segmentation
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct RunTrack {
        pub run_id: String,
        pub points: Vec<GeoPoint>,
    }

    /// Segmentation result for one run in a batch
    #[derive(Debug, Clone, uniffi::Record)]
    pub struct RunSegments {
        pub run_id: String,
        pub segments: Vec<ColoredSegment>,
    }

    /// Classify many runs against one reference trail (single FFI call).
    /// Uses parallel processing when the `parallel` feature is enabled.
    #[uniffi::export]
    pub fn ffi_segment_runs_batch(
        runs: Vec<RunTrack>,
        reference: Vec<GeoPoint>,
        config: DeviationConfig,
    ) -> Vec<RunSegments> {
        init_logging();
        info!(
            "[TrailAnalyticsRust] segment_runs_batch: {} runs vs {} reference points",
            runs.len(),
            reference.len()
        );

        let start = std::time::Instant::now();

        #[cfg(feature = "parallel")]
        let all_segments = {
            let polylines: Vec<Vec<GeoPoint>> = runs.iter().map(|r| r.points.clone()).collect();
            segment_routes_parallel(&polylines, &reference, &config)
        };

        #[cfg(not(feature = "parallel"))]
        let all_segments: Vec<Vec<ColoredSegment>> = runs
            .iter()
            .map(|r| segment_route(&r.points, &reference, &config))
            .collect();

        let results: Vec<RunSegments> = runs
            .into_iter()
            .zip(all_segments)
            .map(|(run, segments)| RunSegments { run_id: run.run_id, segments })
            .collect();

        let elapsed = start.elapsed();
        info!("[TrailAnalyticsRust] segment_runs_batch: {} runs in {:?}", results.len(), elapsed);

        results
    }

    /// Recompute live statistics from a full fix sequence.
    /// Matches the incremental aggregation path fix-for-fix.
    #[uniffi::export]
    pub fn live_stats_from_fixes(fixes: Vec<TrackFix>) -> LiveStats {
        init_logging();
        debug!("[TrailAnalyticsRust] live_stats_from_fixes: {} fixes", fixes.len());
        recompute_stats(&fixes)
    }

    /// Reduce a polyline to at most `max_points` points.
    /// Hosts should run long trails and recordings through this before
    /// segmenting repeatedly.
    #[uniffi::export]
    pub fn downsample_polyline(
        points: Vec<GeoPoint>,
        tolerance_degrees: f64,
        max_points: u32,
    ) -> Vec<GeoPoint> {
        init_logging();
        let reduced = geo_utils::downsample(&points, tolerance_degrees, max_points as usize);
        debug!(
            "[TrailAnalyticsRust] downsample_polyline: {} -> {} points",
            points.len(),
            reduced.len()
        );
        reduced
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geo_point_validation() {
        assert!(GeoPoint::new(39.7392, -104.9903).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 181.0).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn test_track_fix_speed_known() {
        assert!(TrackFix::new(0.0, 0.0, 2.0, 0).has_known_speed());
        assert!(TrackFix::new(0.0, 0.0, 0.0, 0).has_known_speed());
        assert!(!TrackFix::new(0.0, 0.0, -1.0, 0).has_known_speed());
        assert!(!TrackFix::new(0.0, 0.0, f64::NAN, 0).has_known_speed());
    }

    /// Full pipeline: record fixes, read live stats, then color the finished
    /// run against the official trail.
    #[test]
    fn test_record_then_segment_pipeline() {
        let trail = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.001)];

        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(TrackFix::new(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(TrackFix::new(0.0, 0.0003, 3.0, 1000));
        aggregator.add_fix(TrackFix::new(0.0, 0.0006, 4.0, 2000));
        aggregator.add_fix(TrackFix::new(0.001, 0.0006, 4.0, 3000));

        let stats = aggregator.snapshot();
        assert_eq!(stats.min_speed, 2.0);
        assert_eq!(stats.max_speed, 4.0);
        assert_eq!(stats.duration_seconds, 3.0);
        assert!((stats.avg_speed - stats.distance_meters / 3.0).abs() < 1e-9);

        let run = aggregator.route();
        let fixes = aggregator.finish();
        assert_eq!(fixes.len(), 4);

        let config = DeviationConfig::default();
        let segments = segment_route(&run, &trail, &config);

        // On-trail portion stays normal, the ~111m stray tail turns critical
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].color, config.normal_color);
        assert_eq!(segments[1].color, config.critical_color);
    }

    #[test]
    fn test_segmenting_a_downsampled_run_still_partitions() {
        let trail = vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 0.01)];
        let run: Vec<GeoPoint> = (0..1000)
            .map(|i| GeoPoint::new(0.0, i as f64 * 0.00001))
            .collect();

        let reduced = geo_utils::downsample(&run, 0.0001, 200);
        assert!(reduced.len() <= 200);

        let config = DeviationConfig::default();
        let segments = segment_route(&reduced, &trail, &config);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].color, config.normal_color);
    }
}
