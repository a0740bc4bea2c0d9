// core/localization.rs

// Pose types and the short rolling history used to estimate how tracked
// objects move. Speed, travel direction and heading correction are computed
// by a swappable `Smoother` handed to the analyzer at construction.

// Dependencies
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::analyzer::is_similar_angle;
use super::geometry::{self, Point};

/// Position and facing direction of an object on the pitch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pose {
    /// Centroid, in centimetres.
    pub position: Point,
    /// Facing direction in degrees, `[0, 360)`.
    pub facing: f64,
}

impl Pose {
    /// Builds a pose, normalising the facing direction.
    pub fn new(x: f64, y: f64, facing: f64) -> Self {
        Pose {
            position: Point::new(x, y),
            facing: geometry::normalize_angle(facing),
        }
    }
}

/// A pose together with how fast and where the object is travelling.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KinematicPose {
    /// Where the object is and where it faces.
    pub pose: Pose,
    /// Travel speed in cm/s.
    pub speed: f64,
    /// Travel direction in degrees, `[0, 360)`. May differ from the facing.
    pub travel_direction: f64,
}

impl KinematicPose {
    /// A pose that is not moving.
    pub fn at_rest(pose: Pose) -> Self {
        KinematicPose {
            pose,
            speed: 0.0,
            travel_direction: pose.facing,
        }
    }

    /// A pose moving at `speed` towards `travel_direction`.
    pub fn moving(pose: Pose, speed: f64, travel_direction: f64) -> Self {
        KinematicPose {
            pose,
            speed,
            travel_direction: geometry::normalize_angle(travel_direction),
        }
    }

    /// Current position.
    pub fn position(&self) -> Point {
        self.pose.position
    }

    /// Current facing direction.
    pub fn facing(&self) -> f64 {
        self.pose.facing
    }

    /// Where the object will be after `seconds`, assuming it keeps its
    /// current speed and travel direction.
    pub fn extrapolate(&self, seconds: f64) -> Point {
        geometry::point_on_line(self.pose.position, self.travel_direction, self.speed * seconds)
    }
}

/// One raw observation of an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sighting {
    /// Capture time in seconds.
    pub timestamp: f64,
    /// Observed centroid.
    pub position: Point,
    /// Observed (uncorrected) facing direction.
    pub facing: f64,
}

/// Bounded FIFO of past sightings; the oldest entry is evicted once the
/// capacity is reached.
#[derive(Debug, Clone)]
pub struct HistoryWindow {
    samples: VecDeque<Sighting>,
    capacity: usize,
}

impl HistoryWindow {
    /// Creates an empty window holding at most `capacity` sightings.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        HistoryWindow {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a sighting, evicting the oldest one when full.
    pub fn push(&mut self, sighting: Sighting) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sighting);
    }

    /// Number of stored sightings.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether nothing has been stored yet.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Maximum number of stored sightings.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The most recent sighting.
    pub fn latest(&self) -> Option<&Sighting> {
        self.samples.back()
    }

    /// The sighting `n` frames before the latest one (`0` is the latest).
    pub fn nth_latest(&self, n: usize) -> Option<&Sighting> {
        let len = self.samples.len();
        if n >= len { None } else { self.samples.get(len - 1 - n) }
    }

    /// Sightings from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &Sighting> {
        self.samples.iter()
    }
}

/// Policy that turns a history of sightings into motion estimates.
pub trait Smoother: Send {
    /// Travel speed in cm/s.
    fn speed(&self, history: &HistoryWindow) -> f64;

    /// Travel direction in degrees, `[0, 360)`.
    fn direction(&self, history: &HistoryWindow) -> f64;

    /// Corrected facing direction for a new raw heading, judged against the
    /// sightings already in `history` (which does not yet contain it).
    fn facing(&self, history: &HistoryWindow, raw: f64) -> f64;
}

/// Finite-difference smoother over a fixed span of frames with single-frame
/// heading outlier rejection.
#[derive(Debug, Clone)]
pub struct WindowedSmoother {
    /// How many frames back the displacement is measured over.
    pub span: usize,
    /// Heading jumps larger than this (degrees) are suspicious.
    pub outlier_threshold: f64,
    /// Displacements shorter than this (cm) count as standing still.
    pub min_displacement: f64,
}

impl Default for WindowedSmoother {
    fn default() -> Self {
        WindowedSmoother {
            span: 5,
            outlier_threshold: 60.0,
            min_displacement: 0.5,
        }
    }
}

impl WindowedSmoother {
    fn endpoints<'a>(&self, history: &'a HistoryWindow) -> Option<(&'a Sighting, &'a Sighting)> {
        let newest = history.latest()?;
        let back = self.span.max(1).min(history.len().saturating_sub(1));
        if back == 0 {
            return None;
        }
        let oldest = history.nth_latest(back)?;
        Some((oldest, newest))
    }
}

impl Smoother for WindowedSmoother {
    fn speed(&self, history: &HistoryWindow) -> f64 {
        let Some((oldest, newest)) = self.endpoints(history) else {
            return 0.0;
        };
        let elapsed = newest.timestamp - oldest.timestamp;
        if elapsed <= geometry::EPSILON {
            return 0.0;
        }
        nalgebra::distance(&oldest.position, &newest.position) / elapsed
    }

    fn direction(&self, history: &HistoryWindow) -> f64 {
        let Some(newest) = history.latest() else {
            return 0.0;
        };
        match self.endpoints(history) {
            Some((oldest, newest))
                if nalgebra::distance(&oldest.position, &newest.position) >= self.min_displacement =>
            {
                geometry::direction_to(oldest.position, newest.position)
            }
            _ => geometry::normalize_angle(newest.facing),
        }
    }

    fn facing(&self, history: &HistoryWindow, raw: f64) -> f64 {
        let raw = geometry::normalize_angle(raw);
        let (Some(previous), Some(before)) = (history.nth_latest(0), history.nth_latest(1)) else {
            return raw;
        };
        let jumped = !is_similar_angle(raw, previous.facing, self.outlier_threshold);
        let settled = is_similar_angle(previous.facing, before.facing, self.outlier_threshold);
        if jumped && settled {
            log::debug!(
                "Rejecting heading outlier {:.1} (previous {:.1})",
                raw,
                previous.facing
            );
            geometry::normalize_angle(previous.facing)
        } else {
            raw
        }
    }
}
