// src/navigation/planner.rs
// Intent planners: each turns the current snapshot into a fresh queue of
// primitive steps. Plans are short on purpose; the executor replans from the
// latest snapshot whenever one runs out.

use std::collections::VecDeque;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use super::step::{ArcMove, PrimitiveStep, StepTolerances};
use crate::core::analyzer::{self, AnalyzerConfig};
use crate::core::geometry::{self, Point};
use crate::core::localization::Pose;
use crate::core::perception::WorldSnapshot;
use crate::strategy::Intent;

/// Speeds, distances and tolerances used when building plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Speed for ordinary driving.
    pub cruising_speed: i32,
    /// Speed for spins.
    pub turning_speed: i32,
    /// Speed when driving into the ball before a kick.
    pub moving_kick_speed: i32,
    /// Kick power.
    pub kick_power: i32,
    /// Spins are commanded this many degrees short of the full turn.
    pub spin_undershoot: f64,
    /// Arrival tolerance for drive and arc steps (cm).
    pub arrival_threshold: f64,
    /// Within this distance of the kicking position the strike begins (cm).
    pub strike_distance: f64,
    /// Radius kept clear around the opponent while approaching (cm).
    pub danger_radius: f64,
    /// Distance from the defended goal mouth to the guard point (cm).
    pub guard_distance: f64,
    /// Targets straight behind and closer than this are reached in reverse.
    pub reverse_distance: f64,
    /// Arcs are only used for targets at least this far away.
    pub arc_min_distance: f64,
    /// Arcs are only used for bearings up to this (deg).
    pub arc_max_bearing: f64,
    /// Whether arc moves may be planned at all.
    pub use_arcs: bool,
    /// Duration of a full kick cycle, strike and return (s).
    pub kick_cycle_seconds: f64,
    /// Step completion tolerances.
    pub tolerances: StepTolerances,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig {
            cruising_speed: 10,
            turning_speed: 10,
            moving_kick_speed: 25,
            kick_power: 54,
            spin_undershoot: 10.0,
            arrival_threshold: 8.0,
            strike_distance: 12.0,
            danger_radius: 25.0,
            guard_distance: 30.0,
            reverse_distance: 40.0,
            arc_min_distance: 30.0,
            arc_max_bearing: 60.0,
            use_arcs: true,
            kick_cycle_seconds: 2.0,
            tolerances: StepTolerances::default(),
        }
    }
}

/// Builds step queues for each intent.
#[derive(Debug, Clone)]
pub struct Planner {
    config: PlannerConfig,
    analyzer: AnalyzerConfig,
}

impl Planner {
    /// Creates a planner.
    pub fn new(config: PlannerConfig, analyzer: AnalyzerConfig) -> Self {
        Planner { config, analyzer }
    }

    /// Planner settings.
    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Builds a plan for `intent`. Never returns an empty queue: a planner
    /// that finds nothing to do yields a single `Stop`.
    pub fn plan(&self, intent: Intent, snapshot: &WorldSnapshot) -> VecDeque<PrimitiveStep> {
        let mut steps: VecDeque<PrimitiveStep> = match intent {
            Intent::Hold => vec![PrimitiveStep::Stop],
            Intent::Attack => self.plan_attack(snapshot),
            Intent::Defend => self.plan_defend(snapshot),
            Intent::TakeShot => self.plan_shot(snapshot),
        }
        .into();

        if steps.is_empty() {
            warn!("No steps for {:?}, falling back to Stop", intent);
            steps.push_back(PrimitiveStep::Stop);
        }
        debug!("Planned {:?}: {} step(s)", intent, steps.len());
        steps
    }

    fn plan_attack(&self, snapshot: &WorldSnapshot) -> Vec<PrimitiveStep> {
        let own = snapshot.own.pose;
        let ball = snapshot.ball.position();
        let target = analyzer::kicking_position(&self.analyzer, &snapshot.pitch, ball);

        if nalgebra::distance(&own.position, &target) > self.config.strike_distance {
            let waypoint = self.detour(snapshot, target).unwrap_or(target);
            return self.approach(&own, waypoint, self.config.cruising_speed);
        }

        // in position: face the ball, drive into it and kick
        let mut steps = Vec::new();
        steps.extend(self.face(&own, ball));
        steps.push(PrimitiveStep::GoForward {
            destination: ball,
            speed: self.config.moving_kick_speed,
            threshold: self.analyzer.reach(),
        });
        steps.push(PrimitiveStep::Kick {
            power: self.config.kick_power,
        });
        steps
    }

    fn plan_defend(&self, snapshot: &WorldSnapshot) -> Vec<PrimitiveStep> {
        let own = snapshot.own.pose;
        let ball = snapshot.ball.position();
        let goal = snapshot.pitch.defended_goal_middle();

        let to_ball = ball - goal;
        let length = to_ball.norm();
        let guard = if length <= geometry::EPSILON {
            Point::new(goal.x + snapshot.pitch.attack_sign() * self.config.guard_distance, goal.y)
        } else {
            goal + to_ball * (self.config.guard_distance.min(length / 2.0) / length)
        };
        let guard = snapshot.pitch.clamp_with_margin(guard, self.analyzer.pitch_margin);

        let mut steps = self.approach(&own, guard, self.config.cruising_speed);
        if steps.is_empty() {
            steps.extend(self.face(&own, ball));
        }
        if steps.is_empty() {
            steps.push(PrimitiveStep::Stop);
        }
        steps
    }

    fn plan_shot(&self, _snapshot: &WorldSnapshot) -> Vec<PrimitiveStep> {
        vec![PrimitiveStep::Kick {
            power: self.config.kick_power,
        }]
    }

    /// Waypoint that skirts the opponent when the straight run to `target`
    /// would pass too close to it or the opponent is dead ahead and nearer
    /// than the target.
    fn detour(&self, snapshot: &WorldSnapshot, target: Point) -> Option<Point> {
        if snapshot.staleness.opponent {
            return None;
        }
        let own = snapshot.own.pose;
        let opponent = snapshot.opponent.position();
        let radius = self.config.danger_radius;

        let crosses = geometry::line_circle_intersections(own.position, target, opponent, radius).count() > 0;
        let ahead = analyzer::opponent_blocking_path(&self.analyzer, &own, opponent)
            && nalgebra::distance(&own.position, &opponent) < nalgebra::distance(&own.position, &target);
        if !crosses && !ahead {
            return None;
        }

        let waypoint = geometry::tangent_intersection(own.position, target, opponent, radius)?;
        if snapshot.pitch.contains_with_margin(waypoint, self.analyzer.pitch_margin) {
            debug!("Detouring around opponent via ({:.1}, {:.1})", waypoint.x, waypoint.y);
            Some(waypoint)
        } else {
            None
        }
    }

    /// Spin towards `target` if not already facing it.
    fn face(&self, from: &Pose, target: Point) -> Option<PrimitiveStep> {
        let distance = nalgebra::distance(&from.position, &target);
        let bearing = geometry::angle_to(target, from.position, from.facing);
        if bearing.abs() <= self.config.tolerances.turning_threshold(distance) {
            return None;
        }
        Some(self.spin(target, bearing))
    }

    fn spin(&self, target: Point, bearing: f64) -> PrimitiveStep {
        // undershoot, but never so much that the spin would do nothing
        let magnitude = bearing.abs();
        let angle = (magnitude - self.config.spin_undershoot.min(magnitude / 2.0)).round() as i32;
        let speed = self.config.turning_speed;
        if bearing >= 0.0 {
            PrimitiveStep::SpinLeft {
                target,
                speed,
                angle,
                start_error: bearing,
            }
        } else {
            PrimitiveStep::SpinRight {
                target,
                speed,
                angle,
                start_error: bearing,
            }
        }
    }

    /// Steps that take the robot from `from` to `target`: a straight drive
    /// when already aligned, a reverse when the target is close behind, an
    /// arc for moderate bearings, otherwise spin then drive.
    fn approach(&self, from: &Pose, target: Point, speed: i32) -> Vec<PrimitiveStep> {
        let threshold = self.config.arrival_threshold;
        let distance = nalgebra::distance(&from.position, &target);
        if distance <= threshold {
            return Vec::new();
        }

        let turn = self.config.tolerances.turning_threshold(distance);
        let bearing = geometry::angle_to(target, from.position, from.facing);
        let rear_bearing = geometry::angle_to(target, from.position, from.facing + 180.0);
        let close_behind = distance <= self.config.reverse_distance;

        if bearing.abs() <= turn {
            return vec![PrimitiveStep::GoForward {
                destination: target,
                speed,
                threshold,
            }];
        }
        if close_behind && rear_bearing.abs() <= turn {
            return vec![PrimitiveStep::GoBackward {
                destination: target,
                speed,
                threshold,
            }];
        }

        if self.config.use_arcs && distance >= self.config.arc_min_distance {
            if bearing.abs() <= self.config.arc_max_bearing {
                let arc = self.arc_move(from.position, from.facing, target, bearing, speed, distance);
                return vec![if bearing > 0.0 {
                    PrimitiveStep::ArcForwardLeft(arc)
                } else {
                    PrimitiveStep::ArcForwardRight(arc)
                }];
            }
            if close_behind && rear_bearing.abs() <= self.config.arc_max_bearing {
                let arc = self.arc_move(from.position, from.facing + 180.0, target, rear_bearing, speed, distance);
                // target anti-clockwise of the rear heading lies on the robot's right
                return vec![if rear_bearing > 0.0 {
                    PrimitiveStep::ArcBackwardRight(arc)
                } else {
                    PrimitiveStep::ArcBackwardLeft(arc)
                }];
            }
        }

        vec![
            self.spin(target, bearing),
            PrimitiveStep::GoForward {
                destination: target,
                speed,
                threshold,
            },
        ]
    }

    /// Arc from `start` along `heading` that ends at `target`, whose bearing
    /// relative to `heading` is `bearing`.
    fn arc_move(&self, start: Point, heading: f64, target: Point, bearing: f64, speed: i32, distance: f64) -> ArcMove {
        // chord = 2r·sin(φ) and the arc sweeps twice the bearing
        let radius = distance / (2.0 * bearing.to_radians().sin().abs());
        let central = 2.0 * bearing;
        let end = geometry::arc_endpoint(start, heading, radius, central);
        debug!(
            "Arc r={:.1} sweep={:.1} ends ({:.1}, {:.1}) for target ({:.1}, {:.1})",
            radius, central, end.x, end.y, target.x, target.y
        );
        ArcMove {
            destination: end,
            speed,
            radius: radius.round() as i32,
            angle: central.round() as i32,
            threshold: self.config.arrival_threshold,
            start_distance: distance,
        }
    }
}
