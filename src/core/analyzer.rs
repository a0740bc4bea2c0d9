// core/analyzer.rs

//! World analysis: turns perception frames into [`WorldSnapshot`]s and
//! answers the spatial questions decision making asks about them.
//!
//! The predicates are free functions over a snapshot's values so they can be
//! used (and tested) without a running tracker. [`WorldAnalyzer`] owns the
//! only mutable state: one [`HistoryWindow`] and staleness counter per
//! tracked object.

// Dependencies
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::geometry::{self, Point};
use super::localization::{HistoryWindow, KinematicPose, Pose, Sighting, Smoother, WindowedSmoother};
use super::perception::{Admission, PerceptionFrame, PitchGeometry, Staleness, WarmupGate, WorldSnapshot};

/// Physical constants and thresholds used by the analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    /// Robot chassis length (cm).
    pub robot_length: f64,
    /// Robot chassis width (cm).
    pub robot_width: f64,
    /// Extra reach ahead of the chassis that still counts as holding the ball.
    pub length_clearance: f64,
    /// Extra lateral slack when holding the ball.
    pub width_clearance: f64,
    /// Look-ahead horizon for predictive possession (s).
    pub lookahead_seconds: f64,
    /// Side of the square placed over an obstacle when testing for blocking.
    pub blocking_box_size: f64,
    /// Length of the facing ray used for blocking tests.
    pub blocking_ray_length: f64,
    /// Cone half-angle used when already inside the blocking box.
    pub blocking_cone: f64,
    /// Opponent closer than this may block a shot.
    pub shot_block_distance: f64,
    /// Opponent within this bearing blocks a shot.
    pub shot_block_cone: f64,
    /// Distance of the kicking position behind the ball.
    pub standoff_distance: f64,
    /// Ball counts as between the posts only when this far inside them.
    pub post_clearance: f64,
    /// Kicking positions must keep this far from the walls.
    pub pitch_margin: f64,
    /// Sightings kept per tracked object.
    pub history_capacity: usize,
    /// Missed frames after which an estimate is stale.
    pub max_stale_frames: u32,
    /// Heading jump that counts as a single-frame outlier (deg).
    pub facing_outlier_threshold: f64,
    /// Frames over which speed and direction are measured.
    pub smoothing_span: usize,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        AnalyzerConfig {
            robot_length: 20.0,
            robot_width: 18.0,
            length_clearance: 2.0,
            width_clearance: 0.0,
            lookahead_seconds: 0.35,
            blocking_box_size: 24.0,
            blocking_ray_length: 50.0,
            blocking_cone: 30.0,
            shot_block_distance: 30.0,
            shot_block_cone: 30.0,
            standoff_distance: 25.0,
            post_clearance: 5.0,
            pitch_margin: 13.0,
            history_capacity: 64,
            max_stale_frames: 15,
            facing_outlier_threshold: 60.0,
            smoothing_span: 5,
        }
    }
}

impl AnalyzerConfig {
    /// Distance from the centroid to the point where a held ball sits.
    pub fn reach(&self) -> f64 {
        self.robot_length / 2.0 + self.length_clearance
    }

    /// Lateral slack around that point.
    pub fn grip(&self) -> f64 {
        self.robot_width / 2.0 + self.width_clearance
    }
}

/// Whether the ball is in the robot's mouth.
pub fn has_ball(config: &AnalyzerConfig, robot: &Pose, ball: Point) -> bool {
    let front = geometry::point_on_line(robot.position, robot.facing, config.reach());
    nalgebra::distance(&front, &ball) <= config.grip()
}

/// [`has_ball`] applied to both objects' positions a short time ahead.
pub fn would_have_ball(config: &AnalyzerConfig, robot: &KinematicPose, ball: &KinematicPose) -> bool {
    let horizon = config.lookahead_seconds;
    let future = Pose {
        position: robot.extrapolate(horizon),
        facing: robot.facing(),
    };
    has_ball(config, &future, ball.extrapolate(horizon))
}

/// Whether `obstacle` sits in front of `me` along its facing direction.
pub fn opponent_blocking_path(config: &AnalyzerConfig, me: &Pose, obstacle: Point) -> bool {
    let half = config.blocking_box_size / 2.0;
    let min = Point::new(obstacle.x - half, obstacle.y - half);
    let max = Point::new(obstacle.x + half, obstacle.y + half);

    let inside = me.position.x >= min.x && me.position.x <= max.x && me.position.y >= min.y && me.position.y <= max.y;
    if inside {
        if nalgebra::distance(&me.position, &obstacle) <= geometry::EPSILON {
            return true;
        }
        return geometry::angle_to(obstacle, me.position, me.facing).abs() <= config.blocking_cone;
    }

    let ray_end = geometry::point_on_line(me.position, me.facing, config.blocking_ray_length);
    geometry::segment_intersects_rect(me.position, ray_end, min, max)
}

/// Whether two angles are within `threshold` degrees of each other, across
/// the 0/360 seam.
pub fn is_similar_angle(a: f64, b: f64, threshold: f64) -> bool {
    let a = geometry::normalize_angle(a);
    let b = geometry::normalize_angle(b);
    let (big, small) = if a >= b { (a, b) } else { (b, a) };
    if big - small <= threshold {
        return true;
    }
    // the seam: big close to 360 and small close to 0
    big >= 360.0 - threshold && small <= threshold - (360.0 - big)
}

/// Whether `me` can shoot now: no opponent close in front, and the facing
/// direction points between the posts of the attacked goal.
pub fn shot_on_goal(config: &AnalyzerConfig, pitch: &PitchGeometry, me: &KinematicPose, opponent: &KinematicPose) -> bool {
    let to_opponent = nalgebra::distance(&me.position(), &opponent.position());
    let bearing = geometry::angle_to(opponent.position(), me.position(), me.facing());
    if to_opponent <= config.shot_block_distance && bearing.abs() <= config.shot_block_cone {
        return false;
    }

    let (top, bottom) = pitch.target_posts();
    let to_top = geometry::direction_to(me.position(), top);
    let to_bottom = geometry::direction_to(me.position(), bottom);
    if pitch.attacking_right {
        geometry::angle_within_bounds(me.facing(), to_bottom, to_top)
    } else {
        geometry::angle_within_bounds(me.facing(), to_top, to_bottom)
    }
}

/// Stand-off point behind the ball from which a straight run pushes it
/// towards the attacked goal.
pub fn kicking_position(config: &AnalyzerConfig, pitch: &PitchGeometry, ball: Point) -> Point {
    let back = -pitch.attack_sign();
    let standoff = config.standoff_distance;
    let behind = Point::new(ball.x + back * standoff, ball.y);

    let between_posts =
        ball.y < pitch.top_post_y - config.post_clearance && ball.y > pitch.bottom_post_y + config.post_clearance;
    let candidate = if between_posts {
        behind
    } else {
        let side = (2.0 * standoff * standoff).sqrt();
        let outward = if ball.y > pitch.centre_y() { 1.0 } else { -1.0 };
        Point::new(ball.x + back * side, ball.y + outward * side)
    };

    if pitch.contains_with_margin(candidate, config.pitch_margin) {
        candidate
    } else if pitch.contains_with_margin(behind, config.pitch_margin) {
        behind
    } else {
        ball
    }
}

/// Whether `robot` is nearer than the ball to the goal line at `goal_x`,
/// measured along x only.
pub fn goal_side(goal_x: f64, robot: Point, ball: Point) -> bool {
    (goal_x - robot.x).abs() < (goal_x - ball.x).abs()
}

/// Whether the own robot sits between the ball and the goal it defends.
pub fn defensive_side(pitch: &PitchGeometry, me: Point, ball: Point) -> bool {
    goal_side(pitch.defended_goal_x(), me, ball)
}

/// Rolling estimate of one tracked object.
#[derive(Debug, Clone)]
struct Track {
    history: HistoryWindow,
    last: Option<KinematicPose>,
    frames_unseen: u32,
}

impl Track {
    fn new(capacity: usize) -> Self {
        Track {
            history: HistoryWindow::new(capacity),
            last: None,
            frames_unseen: 0,
        }
    }

    /// Folds one frame's detection (or the lack of one) into the track.
    /// Returns the current estimate and whether it is stale, or `None` if
    /// the object has never been seen.
    fn observe(
        &mut self,
        timestamp: f64,
        seen: Option<(Point, f64)>,
        smoother: &dyn Smoother,
        max_stale: u32,
    ) -> Option<(KinematicPose, bool)> {
        match seen {
            Some((position, raw_facing)) => {
                let facing = smoother.facing(&self.history, raw_facing);
                self.history.push(Sighting {
                    timestamp,
                    position,
                    facing: geometry::normalize_angle(raw_facing),
                });
                let estimate = KinematicPose::moving(
                    Pose::new(position.x, position.y, facing),
                    smoother.speed(&self.history),
                    smoother.direction(&self.history),
                );
                self.last = Some(estimate);
                self.frames_unseen = 0;
                Some((estimate, false))
            }
            None => {
                let mut last = self.last?;
                // position only: an unseen object is not extrapolated
                last.speed = 0.0;
                self.frames_unseen = self.frames_unseen.saturating_add(1);
                Some((last, self.frames_unseen > max_stale))
            }
        }
    }
}

/// Stateful front end of the analysis layer.
pub struct WorldAnalyzer {
    config: AnalyzerConfig,
    pitch: PitchGeometry,
    smoother: Box<dyn Smoother>,
    warmup: WarmupGate,
    own: Track,
    opponent: Track,
    ball: Track,
    snapshots: u64,
}

impl WorldAnalyzer {
    /// Creates an analyzer with the default windowed smoother.
    pub fn new(config: AnalyzerConfig, pitch: PitchGeometry, warmup_frames: u32) -> Self {
        let smoother = WindowedSmoother {
            span: config.smoothing_span,
            outlier_threshold: config.facing_outlier_threshold,
            ..WindowedSmoother::default()
        };
        Self::with_smoother(config, pitch, warmup_frames, Box::new(smoother))
    }

    /// Creates an analyzer with a caller-supplied smoothing policy.
    pub fn with_smoother(
        config: AnalyzerConfig,
        pitch: PitchGeometry,
        warmup_frames: u32,
        smoother: Box<dyn Smoother>,
    ) -> Self {
        let capacity = config.history_capacity;
        WorldAnalyzer {
            config,
            pitch,
            smoother,
            warmup: WarmupGate::new(warmup_frames),
            own: Track::new(capacity),
            opponent: Track::new(capacity),
            ball: Track::new(capacity),
            snapshots: 0,
        }
    }

    /// Analyzer thresholds.
    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Pitch the analyzer reasons about.
    pub fn pitch(&self) -> &PitchGeometry {
        &self.pitch
    }

    /// Number of snapshots produced so far.
    pub fn snapshots_produced(&self) -> u64 {
        self.snapshots
    }

    /// Sightings currently held for the own robot, opponent and ball.
    pub fn history_lengths(&self) -> (usize, usize, usize) {
        (self.own.history.len(), self.opponent.history.len(), self.ball.history.len())
    }

    /// Consumes one perception frame. Returns `None` during warm-up and
    /// until every object has been seen at least once.
    pub fn ingest(&mut self, frame: &PerceptionFrame) -> Option<WorldSnapshot> {
        match self.warmup.admit() {
            Admission::WarmingUp => return None,
            Admission::FirstFrame => info!("Camera warm-up complete"),
            Admission::Admitted => {}
        }

        let max_stale = self.config.max_stale_frames;
        let smoother = self.smoother.as_ref();
        let own = self.own.observe(
            frame.timestamp,
            frame.own.map(|p| (p.position, p.facing)),
            smoother,
            max_stale,
        );
        let opponent = self.opponent.observe(
            frame.timestamp,
            frame.opponent.map(|p| (p.position, p.facing)),
            smoother,
            max_stale,
        );
        let ball_facing = self.ball.last.map_or(0.0, |b| b.travel_direction);
        let ball = self
            .ball
            .observe(frame.timestamp, frame.ball.map(|p| (p, ball_facing)), smoother, max_stale);

        let (Some((own, own_stale)), Some((opponent, opponent_stale)), Some((mut ball, ball_stale))) =
            (own, opponent, ball)
        else {
            debug!("Frame at {:.3}s: not every object seen yet, no snapshot", frame.timestamp);
            return None;
        };
        // the ball has no heading of its own
        ball.pose.facing = ball.travel_direction;

        let staleness = Staleness {
            own: own_stale,
            opponent: opponent_stale,
            ball: ball_stale,
        };
        if staleness != Staleness::default() {
            debug!("Stale estimates at {:.3}s: {:?}", frame.timestamp, staleness);
        }

        self.snapshots += 1;
        Some(WorldSnapshot {
            timestamp: frame.timestamp,
            own,
            opponent,
            ball,
            pitch: self.pitch,
            staleness,
        })
    }
}
