//! # Live Track Aggregation
//!
//! Owns the growing fix sequence for one active recording session and exposes
//! O(1)-incremental live statistics (distance, duration, speed extrema).
//!
//! The aggregator is driven, not self-scheduling: the host's location provider
//! calls [`TrackAggregator::add_fix`] at its own cadence and the recording UI
//! reads [`TrackAggregator::snapshot`] whenever it redraws. Calls must be
//! serialized per instance; the aggregator is not designed for concurrent
//! mutation from multiple producers.

use std::time::{SystemTime, UNIX_EPOCH};

use crate::{geo_utils, GeoPoint, LiveStats, TrackFix};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionState {
    Idle,
    Recording,
}

/// Incremental statistics accumulator for one recording session.
///
/// State machine: Idle -> Recording -> Idle, via [`start`](Self::start) and
/// [`finish`](Self::finish). [`add_fix`](Self::add_fix) is only valid while
/// recording; calling it on a closed session is a precondition violation
/// (checked by `debug_assert`, ignored in release builds).
///
/// # Example
///
/// ```rust
/// use trail_analytics::{TrackAggregator, TrackFix};
///
/// let mut aggregator = TrackAggregator::new();
/// aggregator.start();
/// aggregator.add_fix(TrackFix::new(0.0, 0.0, 2.0, 0));
/// aggregator.add_fix(TrackFix::new(0.0, 0.000018, 3.0, 1000));
///
/// let stats = aggregator.snapshot();
/// assert_eq!(stats.duration_seconds, 1.0);
/// assert_eq!(stats.min_speed, 2.0);
///
/// let fixes = aggregator.finish();
/// assert_eq!(fixes.len(), 2);
/// ```
#[derive(Debug)]
pub struct TrackAggregator {
    state: SessionState,
    fixes: Vec<TrackFix>,
    session_started_ms: Option<i64>,
    distance_meters: f64,
    min_speed: f64,
    max_speed: f64,
    has_speed: bool,
}

impl TrackAggregator {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            fixes: Vec::new(),
            session_started_ms: None,
            distance_meters: 0.0,
            min_speed: 0.0,
            max_speed: 0.0,
            has_speed: false,
        }
    }

    /// Begin a recording session, discarding any previous state.
    pub fn start(&mut self) {
        self.state = SessionState::Recording;
        self.fixes.clear();
        self.session_started_ms = Some(now_epoch_ms());
        self.distance_meters = 0.0;
        self.min_speed = 0.0;
        self.max_speed = 0.0;
        self.has_speed = false;
    }

    /// Ingest one GPS fix and update the running aggregates.
    ///
    /// A fix with a non-finite or out-of-range coordinate is dropped, matching
    /// the segmenter's malformed-fix policy. A fix whose coordinates exactly
    /// match the last accepted fix is also dropped; GPS providers may repeat a
    /// stationary reading. Negative or NaN speed is treated as unknown and
    /// excluded from the speed extrema.
    pub fn add_fix(&mut self, fix: TrackFix) {
        debug_assert!(
            self.state == SessionState::Recording,
            "add_fix outside an active recording session"
        );

        if !fix.position().is_valid() {
            return;
        }

        if let Some(last) = self.fixes.last() {
            if fix.latitude == last.latitude && fix.longitude == last.longitude {
                return;
            }
            self.distance_meters +=
                geo_utils::haversine_distance(&last.position(), &fix.position());
        }

        if fix.has_known_speed() {
            if self.has_speed {
                self.min_speed = self.min_speed.min(fix.speed);
                self.max_speed = self.max_speed.max(fix.speed);
            } else {
                // First known speed seeds both extrema
                self.min_speed = fix.speed;
                self.max_speed = fix.speed;
                self.has_speed = true;
            }
        }

        self.fixes.push(fix);
    }

    /// Current live statistics. Pure read, no mutation.
    pub fn snapshot(&self) -> LiveStats {
        let duration_seconds = self.duration_seconds();
        let avg_speed = if duration_seconds > 0.0 {
            self.distance_meters / duration_seconds
        } else {
            0.0
        };

        LiveStats {
            distance_meters: self.distance_meters,
            duration_seconds,
            avg_speed,
            min_speed: self.min_speed,
            max_speed: self.max_speed,
        }
    }

    /// Close the session and hand back the accumulated fix sequence.
    ///
    /// The aggregator returns to Idle with its aggregates cleared, so a
    /// post-finish [`snapshot`](Self::snapshot) is all-zero and consistent
    /// with the empty fix sequence. Hosts persisting a run must snapshot
    /// before finishing. `add_fix` is invalid until the next
    /// [`start`](Self::start).
    pub fn finish(&mut self) -> Vec<TrackFix> {
        self.state = SessionState::Idle;
        self.session_started_ms = None;
        self.distance_meters = 0.0;
        self.min_speed = 0.0;
        self.max_speed = 0.0;
        self.has_speed = false;
        std::mem::take(&mut self.fixes)
    }

    /// Accepted fixes so far, in arrival order.
    pub fn fixes(&self) -> &[TrackFix] {
        &self.fixes
    }

    /// Bare coordinate view of the accepted fixes, for segmentation.
    pub fn route(&self) -> Vec<GeoPoint> {
        self.fixes.iter().map(|f| f.position()).collect()
    }

    /// Wall-clock time `start` was called, epoch milliseconds.
    pub fn started_at_ms(&self) -> Option<i64> {
        self.session_started_ms
    }

    pub fn is_recording(&self) -> bool {
        self.state == SessionState::Recording
    }

    /// Elapsed time between the first and last accepted fix, floored at 0.
    fn duration_seconds(&self) -> f64 {
        match (self.fixes.first(), self.fixes.last()) {
            (Some(first), Some(last)) => {
                ((last.timestamp_ms - first.timestamp_ms) as f64 / 1000.0).max(0.0)
            }
            _ => 0.0,
        }
    }
}

impl Default for TrackAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Recompute statistics from a full fix sequence in one pass.
///
/// Applies the same rules as the incremental path (duplicate suppression,
/// haversine distance, unknown-speed exclusion), so for any fix sequence the
/// result matches feeding the fixes through a [`TrackAggregator`] one at a
/// time. Used to validate persisted runs.
pub fn recompute_stats(fixes: &[TrackFix]) -> LiveStats {
    let mut aggregator = TrackAggregator::new();
    aggregator.start();
    for fix in fixes {
        aggregator.add_fix(*fix);
    }
    aggregator.snapshot()
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Backend payload for one finished run.
///
/// Assembled from a closed session's fixes and stats; serialization to the
/// run-record endpoint is the persistence collaborator's job.
#[cfg(feature = "serde")]
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    pub trail_id: String,
    pub coords: Vec<GeoPoint>,
    pub duration_seconds: f64,
    pub avg_speed: f64,
    pub vehicle_id: String,
}

#[cfg(feature = "serde")]
impl RunRecord {
    /// Build the payload for a finished session.
    pub fn from_session(
        trail_id: impl Into<String>,
        vehicle_id: impl Into<String>,
        fixes: &[TrackFix],
        stats: &LiveStats,
    ) -> Self {
        Self {
            trail_id: trail_id.into(),
            coords: fixes.iter().map(|f| f.position()).collect(),
            duration_seconds: stats.duration_seconds,
            avg_speed: stats.avg_speed,
            vehicle_id: vehicle_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_fix(lat: f64, lng: f64, speed: f64, timestamp_ms: i64) -> TrackFix {
        TrackFix::new(lat, lng, speed, timestamp_ms)
    }

    #[test]
    fn test_empty_session_snapshot_is_zeroed() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        let stats = aggregator.snapshot();
        assert_eq!(stats.distance_meters, 0.0);
        assert_eq!(stats.duration_seconds, 0.0);
        assert_eq!(stats.avg_speed, 0.0);
    }

    #[test]
    fn test_start_records_wall_clock() {
        let mut aggregator = TrackAggregator::new();
        assert!(aggregator.started_at_ms().is_none());
        aggregator.start();
        assert!(aggregator.started_at_ms().unwrap() > 0);
        assert!(aggregator.is_recording());
    }

    #[test]
    fn test_three_fix_session() {
        // Fixes one second apart, each ~2m further east along the equator
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(0.0, 0.000018, 3.0, 1000));
        aggregator.add_fix(make_fix(0.0, 0.000036, 4.0, 2000));

        let stats = aggregator.snapshot();
        assert_eq!(stats.min_speed, 2.0);
        assert_eq!(stats.max_speed, 4.0);
        assert_eq!(stats.duration_seconds, 2.0);
        assert!(stats.distance_meters > 3.0 && stats.distance_meters < 5.0);
        assert!((stats.avg_speed - stats.distance_meters / 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_duplicate_coordinates_are_dropped() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        let before = aggregator.snapshot();

        // Stationary reading repeated by the GPS provider
        aggregator.add_fix(make_fix(0.0, 0.0, 5.0, 1000));

        let after = aggregator.snapshot();
        assert_eq!(aggregator.fixes().len(), 1);
        assert_eq!(after.distance_meters, before.distance_meters);
        assert_eq!(after.max_speed, 2.0);
    }

    #[test]
    fn test_first_fix_seeds_speed_extrema() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 3.5, 0));

        let stats = aggregator.snapshot();
        assert_eq!(stats.min_speed, 3.5);
        assert_eq!(stats.max_speed, 3.5);
    }

    #[test]
    fn test_unknown_speed_excluded_from_extrema() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, -1.0, 0));
        aggregator.add_fix(make_fix(0.0, 0.000018, 2.0, 1000));
        aggregator.add_fix(make_fix(0.0, 0.000036, f64::NAN, 2000));

        let stats = aggregator.snapshot();
        assert_eq!(stats.min_speed, 2.0);
        assert_eq!(stats.max_speed, 2.0);
    }

    #[test]
    fn test_duration_floored_at_zero() {
        // Out-of-order timestamps must not produce a negative duration
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 5000));
        aggregator.add_fix(make_fix(0.0, 0.000018, 2.0, 3000));

        let stats = aggregator.snapshot();
        assert_eq!(stats.duration_seconds, 0.0);
        assert_eq!(stats.avg_speed, 0.0);
    }

    #[test]
    fn test_snapshot_is_idempotent() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(0.0, 0.000018, 3.0, 1000));

        let first = aggregator.snapshot();
        let second = aggregator.snapshot();
        assert_eq!(first.distance_meters, second.distance_meters);
        assert_eq!(first.duration_seconds, second.duration_seconds);
        assert_eq!(first.avg_speed, second.avg_speed);
        assert_eq!(first.min_speed, second.min_speed);
        assert_eq!(first.max_speed, second.max_speed);
    }

    #[test]
    fn test_finish_returns_fixes_and_closes() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(0.0, 0.000018, 3.0, 1000));

        let fixes = aggregator.finish();
        assert_eq!(fixes.len(), 2);
        assert!(!aggregator.is_recording());
        assert!(aggregator.fixes().is_empty());
    }

    #[test]
    fn test_snapshot_after_finish_is_zeroed() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(0.0, 0.001, 3.0, 1000));
        aggregator.finish();

        // A closed session holds no fixes, so its stats must be all-zero
        // rather than a mix of stale aggregates and empty-sequence values
        let stats = aggregator.snapshot();
        assert_eq!(stats.distance_meters, 0.0);
        assert_eq!(stats.duration_seconds, 0.0);
        assert_eq!(stats.avg_speed, 0.0);
        assert_eq!(stats.min_speed, 0.0);
        assert_eq!(stats.max_speed, 0.0);
        assert!(aggregator.started_at_ms().is_none());
    }

    #[test]
    fn test_malformed_fix_is_dropped() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(f64::NAN, 0.0005, 9.0, 1000));
        aggregator.add_fix(make_fix(0.0, 0.001, 3.0, 2000));

        let stats = aggregator.snapshot();
        assert_eq!(aggregator.fixes().len(), 2);
        assert!(stats.distance_meters.is_finite());
        assert!(stats.distance_meters > 0.0);
        // The malformed fix's speed never reaches the extrema
        assert_eq!(stats.max_speed, 3.0);
    }

    #[test]
    fn test_start_resets_previous_session() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(0.0, 0.001, 3.0, 1000));
        aggregator.finish();

        aggregator.start();
        let stats = aggregator.snapshot();
        assert_eq!(stats.distance_meters, 0.0);
        assert_eq!(stats.max_speed, 0.0);
        assert!(aggregator.fixes().is_empty());
    }

    #[test]
    fn test_route_view_matches_fix_positions() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(0.0001, 0.0002, 3.0, 1000));

        let route = aggregator.route();
        assert_eq!(route.len(), 2);
        assert_eq!(route[1], GeoPoint::new(0.0001, 0.0002));
    }

    #[test]
    fn test_recompute_matches_incremental() {
        let fixes = vec![
            make_fix(0.0, 0.0, 2.0, 0),
            make_fix(0.0, 0.0, 2.0, 500), // duplicate
            make_fix(0.0, 0.000018, -1.0, 1000),
            make_fix(0.0, 0.000036, 4.0, 2000),
        ];

        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        for fix in &fixes {
            aggregator.add_fix(*fix);
        }
        let incremental = aggregator.snapshot();
        let recomputed = recompute_stats(&fixes);

        assert_eq!(incremental.distance_meters, recomputed.distance_meters);
        assert_eq!(incremental.duration_seconds, recomputed.duration_seconds);
        assert_eq!(incremental.avg_speed, recomputed.avg_speed);
        assert_eq!(incremental.min_speed, recomputed.min_speed);
        assert_eq!(incremental.max_speed, recomputed.max_speed);
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_run_record_payload_shape() {
        let mut aggregator = TrackAggregator::new();
        aggregator.start();
        aggregator.add_fix(make_fix(0.0, 0.0, 2.0, 0));
        aggregator.add_fix(make_fix(0.0, 0.000018, 3.0, 1000));

        let stats = aggregator.snapshot();
        let fixes = aggregator.finish();
        let record = RunRecord::from_session("trail-7", "vehicle-3", &fixes, &stats);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["trailId"], "trail-7");
        assert_eq!(json["vehicleId"], "vehicle-3");
        assert_eq!(json["coords"].as_array().unwrap().len(), 2);
        assert_eq!(json["durationSeconds"], 1.0);
    }
}
