//! Perception inputs and the world snapshot handed to decision making.
//!
//! A [`PerceptionFrame`] is what the camera pipeline delivers each frame; any
//! object may be missing. A [`WorldSnapshot`] is the analyzer's complete,
//! gap-filled view of the pitch at one instant.

use std::io::{BufRead, ErrorKind};

use serde::{Deserialize, Serialize};

use super::geometry::Point;
use super::localization::{KinematicPose, Pose};

/// Fixed dimensions of the pitch and which goal the own robot attacks.
///
/// The origin is the pitch centre. Goals lie on the `min_x` and `max_x`
/// lines, between `bottom_post_y` and `top_post_y`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PitchGeometry {
    /// Left boundary (cm).
    pub min_x: f64,
    /// Right boundary (cm).
    pub max_x: f64,
    /// Bottom boundary (cm).
    pub min_y: f64,
    /// Top boundary (cm).
    pub max_y: f64,
    /// y of the upper goal post, same at both ends.
    pub top_post_y: f64,
    /// y of the lower goal post, same at both ends.
    pub bottom_post_y: f64,
    /// True when the own robot shoots at the `max_x` goal.
    pub attacking_right: bool,
}

impl Default for PitchGeometry {
    fn default() -> Self {
        PitchGeometry {
            min_x: -122.0,
            max_x: 122.0,
            min_y: -61.0,
            max_y: 61.0,
            top_post_y: 30.0,
            bottom_post_y: -30.0,
            attacking_right: true,
        }
    }
}

impl PitchGeometry {
    /// x of the goal line the own robot shoots at.
    pub fn target_goal_x(&self) -> f64 {
        if self.attacking_right { self.max_x } else { self.min_x }
    }

    /// x of the goal line the own robot defends.
    pub fn defended_goal_x(&self) -> f64 {
        if self.attacking_right { self.min_x } else { self.max_x }
    }

    /// `(top, bottom)` posts of the goal being attacked.
    pub fn target_posts(&self) -> (Point, Point) {
        let x = self.target_goal_x();
        (Point::new(x, self.top_post_y), Point::new(x, self.bottom_post_y))
    }

    /// Middle of the defended goal mouth.
    pub fn defended_goal_middle(&self) -> Point {
        Point::new(self.defended_goal_x(), self.centre_y())
    }

    /// y of the line halfway between the side walls.
    pub fn centre_y(&self) -> f64 {
        (self.min_y + self.max_y) / 2.0
    }

    /// +1 when the attacked goal is towards +x, -1 otherwise.
    pub fn attack_sign(&self) -> f64 {
        if self.attacking_right { 1.0 } else { -1.0 }
    }

    /// Whether `point` is at least `margin` away from every wall.
    pub fn contains_with_margin(&self, point: Point, margin: f64) -> bool {
        point.x >= self.min_x + margin
            && point.x <= self.max_x - margin
            && point.y >= self.min_y + margin
            && point.y <= self.max_y - margin
    }

    /// Pulls `point` inside the pitch, `margin` away from the walls.
    pub fn clamp_with_margin(&self, point: Point, margin: f64) -> Point {
        let clamp = |value: f64, low: f64, high: f64| {
            if low > high { (low + high) / 2.0 } else { value.clamp(low, high) }
        };
        Point::new(
            clamp(point.x, self.min_x + margin, self.max_x - margin),
            clamp(point.y, self.min_y + margin, self.max_y - margin),
        )
    }
}

/// Raw per-frame output of the vision system.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerceptionFrame {
    /// Capture time in seconds.
    pub timestamp: f64,
    /// Own robot, if detected.
    #[serde(default)]
    pub own: Option<Pose>,
    /// Opponent robot, if detected.
    #[serde(default)]
    pub opponent: Option<Pose>,
    /// Ball centroid, if detected.
    #[serde(default)]
    pub ball: Option<Point>,
}

/// Error reading a stream of perception frames.
#[derive(Debug)]
pub enum FrameStreamError {
    /// The underlying reader failed; the stream ends.
    Io(std::io::Error),
    /// One document was not a perception frame; the stream goes on.
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for FrameStreamError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FrameStreamError::Io(e) => write!(f, "cannot read perception stream: {}", e),
            FrameStreamError::Parse(e) => write!(f, "unreadable perception frame: {}", e),
        }
    }
}

impl std::error::Error for FrameStreamError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameStreamError::Io(e) => Some(e),
            FrameStreamError::Parse(e) => Some(e),
        }
    }
}

/// Perception frames from a YAML document stream, yielded as soon as each
/// document is closed.
///
/// A document ends at a `---` line (start of the next one), a `...` line, or
/// end of input. Nothing past the closing marker is read, so a live feed is
/// consumed frame by frame.
pub struct FrameStream<R> {
    reader: R,
    line: String,
    document: String,
    finished: bool,
}

impl<R: BufRead> FrameStream<R> {
    /// Reads frames from `reader`.
    pub fn new(reader: R) -> Self {
        FrameStream {
            reader,
            line: String::new(),
            document: String::new(),
            finished: false,
        }
    }

    fn take_document(&mut self) -> Option<Result<PerceptionFrame, FrameStreamError>> {
        if self.document.trim().is_empty() {
            self.document.clear();
            return None;
        }
        let text = std::mem::take(&mut self.document);
        Some(serde_yaml::from_str(&text).map_err(FrameStreamError::Parse))
    }
}

impl<R: BufRead> Iterator for FrameStream<R> {
    type Item = Result<PerceptionFrame, FrameStreamError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.finished {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => self.finished = true,
                Ok(_) => {
                    let marker = matches!(self.line.trim_end(), "---" | "...");
                    if !marker {
                        self.document.push_str(&self.line);
                    } else if let Some(frame) = self.take_document() {
                        return Some(frame);
                    }
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => {
                    self.finished = true;
                    return Some(Err(FrameStreamError::Io(e)));
                }
            }
        }
        self.take_document()
    }
}

/// Which tracked objects are being carried over from an old sighting for
/// longer than the analyzer tolerates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Staleness {
    /// Own robot.
    pub own: bool,
    /// Opponent robot.
    pub opponent: bool,
    /// Ball.
    pub ball: bool,
}

/// Complete estimated state of the pitch at one instant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSnapshot {
    /// Time of the perception frame this was built from, in seconds.
    pub timestamp: f64,
    /// Own robot.
    pub own: KinematicPose,
    /// Opponent robot.
    pub opponent: KinematicPose,
    /// Ball; its facing mirrors its travel direction.
    pub ball: KinematicPose,
    /// Pitch and goal geometry.
    pub pitch: PitchGeometry,
    /// Objects whose estimate is too old to act on.
    #[serde(default)]
    pub staleness: Staleness,
}

impl WorldSnapshot {
    /// Builds a snapshot in which every estimate is fresh.
    pub fn new(
        timestamp: f64,
        own: KinematicPose,
        opponent: KinematicPose,
        ball: KinematicPose,
        pitch: PitchGeometry,
    ) -> Self {
        WorldSnapshot {
            timestamp,
            own,
            opponent,
            ball,
            pitch,
            staleness: Staleness::default(),
        }
    }
}

/// What the warm-up gate made of one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Still settling; drop the frame.
    WarmingUp,
    /// The first frame let through.
    FirstFrame,
    /// Let through.
    Admitted,
}

/// Discards the first few frames after start-up while the camera settles.
#[derive(Debug, Clone)]
pub struct WarmupGate {
    remaining: u32,
    opened: bool,
}

impl WarmupGate {
    /// A gate that swallows `frames` frames.
    pub fn new(frames: u32) -> Self {
        WarmupGate {
            remaining: frames,
            opened: false,
        }
    }

    /// Judges the next frame; each call consumes one warm-up frame.
    pub fn admit(&mut self) -> Admission {
        if self.remaining > 0 {
            self.remaining -= 1;
            return Admission::WarmingUp;
        }
        if self.opened {
            Admission::Admitted
        } else {
            self.opened = true;
            Admission::FirstFrame
        }
    }

    /// Whether all warm-up frames have been consumed.
    pub fn is_warm(&self) -> bool {
        self.remaining == 0
    }
}
