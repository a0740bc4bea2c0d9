// navigation/step.rs

//! Primitive steps: the atomic motions a plan is made of.
//!
//! Each step carries what it needs both to produce its command frame and to
//! judge, from a fresh snapshot, whether it has finished or gone wrong.

use serde::{Deserialize, Serialize};

use crate::core::geometry::{self, Point};
use crate::core::perception::WorldSnapshot;

/// Completion and failure tolerances shared by all steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepTolerances {
    /// Bearing error accepted when far from the target (deg).
    pub far_turn_threshold: f64,
    /// Bearing error accepted inside `close_distance` (deg).
    pub close_turn_threshold: f64,
    /// Distance under which the tighter threshold applies (cm).
    pub close_distance: f64,
    /// A spin fails once its error exceeds the starting error by this much.
    pub spin_overshoot_margin: f64,
    /// An arc fails once it ends up this much further away than it started.
    pub arc_drift_margin: f64,
    /// Time a kick needs before the next step may start (s).
    pub kick_settle_seconds: f64,
    /// Any motion step still unfinished after this long has failed (s).
    pub step_timeout_seconds: f64,
}

impl Default for StepTolerances {
    fn default() -> Self {
        StepTolerances {
            far_turn_threshold: 25.0,
            close_turn_threshold: 10.0,
            close_distance: 30.0,
            spin_overshoot_margin: 30.0,
            arc_drift_margin: 15.0,
            kick_settle_seconds: 0.5,
            step_timeout_seconds: 5.0,
        }
    }
}

impl StepTolerances {
    /// Bearing error that still counts as facing a target `distance` away.
    pub fn turning_threshold(&self, distance: f64) -> f64 {
        if distance <= self.close_distance {
            self.close_turn_threshold
        } else {
            self.far_turn_threshold
        }
    }
}

/// Parameters of an arc move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArcMove {
    /// Where the arc should end.
    pub destination: Point,
    /// Wheel speed, always positive; direction comes from the variant.
    pub speed: i32,
    /// Arc radius (cm).
    pub radius: i32,
    /// Signed central angle swept (deg, positive anti-clockwise).
    pub angle: i32,
    /// Arrival tolerance (cm).
    pub threshold: f64,
    /// Distance to the destination when the arc was planned.
    pub start_distance: f64,
}

/// One atomic motion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PrimitiveStep {
    /// Drive straight ahead to `destination`.
    GoForward {
        /// Target point.
        destination: Point,
        /// Drive speed.
        speed: i32,
        /// Arrival tolerance (cm).
        threshold: f64,
    },
    /// Reverse straight to `destination`.
    GoBackward {
        /// Target point.
        destination: Point,
        /// Drive speed.
        speed: i32,
        /// Arrival tolerance (cm).
        threshold: f64,
    },
    /// Turn anti-clockwise on the spot to face `target`.
    SpinLeft {
        /// Point to face.
        target: Point,
        /// Turn speed.
        speed: i32,
        /// Commanded rotation (deg, non-negative).
        angle: i32,
        /// Signed bearing error when the spin was planned.
        start_error: f64,
    },
    /// Turn clockwise on the spot to face `target`.
    SpinRight {
        /// Point to face.
        target: Point,
        /// Turn speed.
        speed: i32,
        /// Commanded rotation (deg, non-negative).
        angle: i32,
        /// Signed bearing error when the spin was planned.
        start_error: f64,
    },
    /// Forward arc curving left.
    ArcForwardLeft(ArcMove),
    /// Forward arc curving right.
    ArcForwardRight(ArcMove),
    /// Reverse arc around a centre on the robot's left.
    ArcBackwardLeft(ArcMove),
    /// Reverse arc around a centre on the robot's right.
    ArcBackwardRight(ArcMove),
    /// Fire the kicker.
    Kick {
        /// Kick power.
        power: i32,
    },
    /// Halt.
    Stop,
}

/// What a step is judged against.
#[derive(Debug, Clone, Copy)]
pub struct StepContext<'a> {
    /// Latest snapshot.
    pub snapshot: &'a WorldSnapshot,
    /// Seconds since the step was dispatched.
    pub elapsed: f64,
    /// Shared tolerances.
    pub tolerances: &'a StepTolerances,
}

impl StepContext<'_> {
    fn distance_to(&self, point: Point) -> f64 {
        nalgebra::distance(&self.snapshot.own.position(), &point)
    }

    fn bearing_to(&self, point: Point) -> f64 {
        geometry::angle_to(point, self.snapshot.own.position(), self.snapshot.own.facing())
    }

    fn rear_bearing_to(&self, point: Point) -> f64 {
        geometry::angle_to(point, self.snapshot.own.position(), self.snapshot.own.facing() + 180.0)
    }
}

impl PrimitiveStep {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveStep::GoForward { .. } => "GoForward",
            PrimitiveStep::GoBackward { .. } => "GoBackward",
            PrimitiveStep::SpinLeft { .. } => "SpinLeft",
            PrimitiveStep::SpinRight { .. } => "SpinRight",
            PrimitiveStep::ArcForwardLeft(_) => "ArcForwardLeft",
            PrimitiveStep::ArcForwardRight(_) => "ArcForwardRight",
            PrimitiveStep::ArcBackwardLeft(_) => "ArcBackwardLeft",
            PrimitiveStep::ArcBackwardRight(_) => "ArcBackwardRight",
            PrimitiveStep::Kick { .. } => "Kick",
            PrimitiveStep::Stop => "Stop",
        }
    }

    fn arc(&self) -> Option<&ArcMove> {
        match self {
            PrimitiveStep::ArcForwardLeft(arc)
            | PrimitiveStep::ArcForwardRight(arc)
            | PrimitiveStep::ArcBackwardLeft(arc)
            | PrimitiveStep::ArcBackwardRight(arc) => Some(arc),
            _ => None,
        }
    }

    /// Whether the step has achieved what it set out to do.
    pub fn is_successful(&self, ctx: &StepContext) -> bool {
        match self {
            PrimitiveStep::GoForward {
                destination, threshold, ..
            }
            | PrimitiveStep::GoBackward {
                destination, threshold, ..
            } => ctx.distance_to(*destination) <= *threshold,
            PrimitiveStep::SpinLeft { target, .. } | PrimitiveStep::SpinRight { target, .. } => {
                let threshold = ctx.tolerances.turning_threshold(ctx.distance_to(*target));
                ctx.bearing_to(*target).abs() <= threshold
            }
            PrimitiveStep::Kick { .. } => ctx.elapsed >= ctx.tolerances.kick_settle_seconds,
            PrimitiveStep::Stop => true,
            _ => self
                .arc()
                .is_some_and(|arc| ctx.distance_to(arc.destination) <= arc.threshold),
        }
    }

    /// Whether the step can no longer succeed and the plan must be rebuilt.
    /// Only meaningful once [`PrimitiveStep::is_successful`] returned false.
    pub fn has_failed(&self, ctx: &StepContext) -> bool {
        let timed_out = ctx.elapsed > ctx.tolerances.step_timeout_seconds;
        match self {
            PrimitiveStep::GoForward { destination, .. } => {
                let distance = ctx.distance_to(*destination);
                timed_out || ctx.bearing_to(*destination).abs() > ctx.tolerances.turning_threshold(distance)
            }
            PrimitiveStep::GoBackward { destination, .. } => {
                let distance = ctx.distance_to(*destination);
                timed_out || ctx.rear_bearing_to(*destination).abs() > ctx.tolerances.turning_threshold(distance)
            }
            PrimitiveStep::SpinLeft {
                target, start_error, ..
            }
            | PrimitiveStep::SpinRight {
                target, start_error, ..
            } => timed_out || ctx.bearing_to(*target).abs() > start_error.abs() + ctx.tolerances.spin_overshoot_margin,
            PrimitiveStep::Kick { .. } | PrimitiveStep::Stop => false,
            _ => self.arc().is_some_and(|arc| {
                timed_out || ctx.distance_to(arc.destination) > arc.start_distance + ctx.tolerances.arc_drift_margin
            }),
        }
    }
}
