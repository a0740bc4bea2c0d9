//! Strategy selection
//!
//! Maps each world snapshot to a high-level [`Intent`]. The policy itself is
//! the pure function [`select_intent`]; [`StrategySelector`] adds the
//! operator stop request and transition logging on top of it.

use log::info;
use serde::{Deserialize, Serialize};

use crate::core::analyzer::{self, AnalyzerConfig};
use crate::core::perception::WorldSnapshot;

/// High-level behavioural goal for the own robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Intent {
    /// Stand still.
    Hold,
    /// Get behind the ball and drive it at the goal.
    Attack,
    /// Get between the ball and the defended goal.
    Defend,
    /// Kick now.
    TakeShot,
}

/// Knobs for the selection policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Also defend when the opponent is only predicted to reach the ball.
    pub defend_on_prediction: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            defend_on_prediction: true,
        }
    }
}

/// Decides the intent for one snapshot. First matching rule wins:
///
/// 1. stop requested, or the own robot is no longer tracked: `Hold`
/// 2. opponent has (or is about to have) the ball and is goal-side of it
///    with respect to its own goal: `Defend`
/// 3. own robot has the ball with a clear shot: `TakeShot`
/// 4. otherwise `Attack`
///
/// `previous` does not influence the decision; replanning on change is the
/// executor's business.
pub fn select_intent(
    config: &StrategyConfig,
    analyzer_config: &AnalyzerConfig,
    snapshot: &WorldSnapshot,
    _previous: Option<Intent>,
    stop_requested: bool,
) -> Intent {
    if stop_requested || snapshot.staleness.own {
        return Intent::Hold;
    }

    let ball_known = !snapshot.staleness.ball;
    let ball = snapshot.ball.position();

    if ball_known && !snapshot.staleness.opponent {
        let opponent = &snapshot.opponent;
        let possession = analyzer::has_ball(analyzer_config, &opponent.pose, ball)
            || (config.defend_on_prediction && analyzer::would_have_ball(analyzer_config, opponent, &snapshot.ball));
        // the opponent defends the goal we attack
        let facing_our_goal = analyzer::goal_side(snapshot.pitch.target_goal_x(), opponent.position(), ball);
        if possession && facing_our_goal {
            return Intent::Defend;
        }
    }

    if ball_known
        && analyzer::has_ball(analyzer_config, &snapshot.own.pose, ball)
        && analyzer::shot_on_goal(analyzer_config, &snapshot.pitch, &snapshot.own, &snapshot.opponent)
    {
        return Intent::TakeShot;
    }

    Intent::Attack
}

/// Stateful wrapper around [`select_intent`].
#[derive(Debug, Clone, Default)]
pub struct StrategySelector {
    config: StrategyConfig,
    stop_requested: bool,
}

impl StrategySelector {
    /// Creates a selector with no pending stop request.
    pub fn new(config: StrategyConfig) -> Self {
        StrategySelector {
            config,
            stop_requested: false,
        }
    }

    /// Forces `Hold` until [`StrategySelector::resume`] is called.
    pub fn request_stop(&mut self) {
        if !self.stop_requested {
            info!("Stop requested");
        }
        self.stop_requested = true;
    }

    /// Lifts a stop request.
    pub fn resume(&mut self) {
        if self.stop_requested {
            info!("Resuming play");
        }
        self.stop_requested = false;
    }

    /// Whether a stop request is pending.
    pub fn stop_requested(&self) -> bool {
        self.stop_requested
    }

    /// Picks the intent for `snapshot`, logging when it differs from
    /// `previous`.
    pub fn select(&self, analyzer_config: &AnalyzerConfig, snapshot: &WorldSnapshot, previous: Option<Intent>) -> Intent {
        let intent = select_intent(&self.config, analyzer_config, snapshot, previous, self.stop_requested);
        if previous != Some(intent) {
            info!("Intent {:?} -> {:?} at {:.3}s", previous, intent, snapshot.timestamp);
        }
        intent
    }
}
