//! Navigation system for the striker
//!
//! Plan-and-execute state machine. An [`Intent`] is decomposed by the
//! [`Planner`] into a queue of [`PrimitiveStep`]s; the [`PlanExecutor`]
//! dispatches them one at a time through the [`Controller`] and, on every
//! snapshot, checks the step in flight for success or failure.
//!
//! States: `Idle -> Planning -> Executing -> (Succeeded | Failed) -> Planning`.
//! A new intent, or `Idle`, plans and dispatches within the same tick. A
//! finished plan or a failed step leaves the executor in `Succeeded` or
//! `Failed`, and the next snapshot rebuilds the plan from scratch.

pub mod controller;
pub mod planner;
pub mod step;

pub use controller::{Controller, Dispatch, KickLatch, frame_for};
pub use planner::{Planner, PlannerConfig};
pub use step::{ArcMove, PrimitiveStep, StepContext, StepTolerances};

use std::collections::VecDeque;

use log::{debug, info, warn};

use crate::core::analyzer::AnalyzerConfig;
use crate::core::perception::WorldSnapshot;
use crate::link::{CommandFrame, CommandSink, LinkError};
use crate::strategy::Intent;

/// Where the executor is in its cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    /// Nothing planned yet.
    Idle,
    /// A plan is about to be (re)built.
    Planning,
    /// A step is in flight.
    Executing,
    /// The plan ran out; replan on the next snapshot.
    Succeeded,
    /// A step failed or could not be delivered; replan on the next snapshot.
    Failed,
}

/// Step awaiting completion.
#[derive(Debug, Clone, Copy)]
struct InFlight {
    step: PrimitiveStep,
    dispatched_at: f64,
}

/// Outcome of one tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    /// State after the tick.
    pub state: ExecutorState,
    /// Whether a new plan was built this tick.
    pub replanned: bool,
    /// Steps that completed this tick.
    pub completed: Vec<PrimitiveStep>,
    /// Step that failed this tick.
    pub failed: Option<PrimitiveStep>,
    /// Step dispatched this tick and how.
    pub dispatched: Option<(PrimitiveStep, Dispatch)>,
}

/// Navigation status
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationStatus {
    /// Current state
    pub state: ExecutorState,
    /// Intent being executed
    pub intent: Option<Intent>,
    /// Step in flight
    pub active_step: Option<PrimitiveStep>,
    /// Steps still queued behind it
    pub queued_steps: usize,
    /// Plans built so far
    pub plans_built: u64,
    /// Steps that failed so far
    pub step_failures: u64,
}

/// Supervises plans for the own robot.
pub struct PlanExecutor {
    planner: Planner,
    controller: Controller,
    tolerances: StepTolerances,
    state: ExecutorState,
    intent: Option<Intent>,
    plan: VecDeque<PrimitiveStep>,
    in_flight: Option<InFlight>,
    plans_built: u64,
    step_failures: u64,
}

impl PlanExecutor {
    /// Creates an idle executor.
    pub fn new(config: PlannerConfig, analyzer: AnalyzerConfig) -> Self {
        let controller = Controller::new(config.kick_cycle_seconds);
        let tolerances = config.tolerances.clone();
        PlanExecutor {
            planner: Planner::new(config, analyzer),
            controller,
            tolerances,
            state: ExecutorState::Idle,
            intent: None,
            plan: VecDeque::new(),
            in_flight: None,
            plans_built: 0,
            step_failures: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> ExecutorState {
        self.state
    }

    /// Intent the current plan serves.
    pub fn intent(&self) -> Option<Intent> {
        self.intent
    }

    /// Step awaiting completion.
    pub fn active_step(&self) -> Option<PrimitiveStep> {
        self.in_flight.map(|f| f.step)
    }

    /// Steps queued behind the active one.
    pub fn queued_steps(&self) -> impl Iterator<Item = &PrimitiveStep> {
        self.plan.iter()
    }

    /// Number of plans built since creation.
    pub fn plans_built(&self) -> u64 {
        self.plans_built
    }

    /// Summary for status reporting.
    pub fn status(&self) -> NavigationStatus {
        NavigationStatus {
            state: self.state,
            intent: self.intent,
            active_step: self.active_step(),
            queued_steps: self.plan.len(),
            plans_built: self.plans_built,
            step_failures: self.step_failures,
        }
    }

    /// Advances the state machine with one snapshot.
    ///
    /// A link error while dispatching is treated as a step failure: the plan
    /// is dropped, the executor is left in `Failed`, and the error is returned
    /// so the caller can react.
    pub fn tick<S: CommandSink + ?Sized>(
        &mut self,
        snapshot: &WorldSnapshot,
        intent: Intent,
        sink: &mut S,
    ) -> Result<TickReport, LinkError> {
        let mut report = TickReport {
            state: self.state,
            replanned: false,
            completed: Vec::new(),
            failed: None,
            dispatched: None,
        };

        if self.intent != Some(intent) {
            if let Some(previous) = self.intent {
                info!("Abandoning {:?} plan for {:?}", previous, intent);
            }
            self.intent = Some(intent);
            self.enter_planning();
        }

        if matches!(
            self.state,
            ExecutorState::Idle | ExecutorState::Succeeded | ExecutorState::Failed
        ) {
            self.enter_planning();
        }

        if self.state == ExecutorState::Planning {
            self.plan = self.planner.plan(intent, snapshot);
            self.plans_built += 1;
            report.replanned = true;
            self.dispatch_next(snapshot, sink, &mut report)?;
        } else if let Some(active) = self.in_flight {
            let ctx = StepContext {
                snapshot,
                elapsed: snapshot.timestamp - active.dispatched_at,
                tolerances: &self.tolerances,
            };
            if active.step.is_successful(&ctx) {
                debug!("{} succeeded", active.step.name());
                self.in_flight = None;
                report.completed.push(active.step);
                self.dispatch_next(snapshot, sink, &mut report)?;
            } else if active.step.has_failed(&ctx) {
                warn!("{} failed after {:.2}s, replanning", active.step.name(), ctx.elapsed);
                self.fail();
                report.failed = Some(active.step);
            }
        }

        report.state = self.state;
        Ok(report)
    }

    /// Drops the plan and sends `Stop` straight away, bypassing duplicate
    /// suppression. Leaves the executor in `Failed`.
    pub fn emergency_stop<S: CommandSink + ?Sized>(&mut self, sink: &mut S) -> Result<(), LinkError> {
        self.plan.clear();
        self.in_flight = None;
        self.state = ExecutorState::Failed;
        self.controller.forget();
        sink.deliver(&CommandFrame::stop())?;
        Ok(())
    }

    fn enter_planning(&mut self) {
        self.plan.clear();
        self.in_flight = None;
        self.state = ExecutorState::Planning;
    }

    fn fail(&mut self) {
        self.plan.clear();
        self.in_flight = None;
        // whatever the robot was told no longer achieves anything
        self.controller.forget();
        self.step_failures += 1;
        self.state = ExecutorState::Failed;
    }

    /// Pops and dispatches the next step, or marks the plan finished.
    fn dispatch_next<S: CommandSink + ?Sized>(
        &mut self,
        snapshot: &WorldSnapshot,
        sink: &mut S,
        report: &mut TickReport,
    ) -> Result<(), LinkError> {
        let Some(step) = self.plan.pop_front() else {
            debug!("Plan for {:?} complete", self.intent);
            self.state = ExecutorState::Succeeded;
            return Ok(());
        };

        assert!(self.in_flight.is_none(), "a step is already in flight");
        match self.controller.dispatch(&step, snapshot.timestamp, sink) {
            Ok(how) => {
                debug!("Dispatched {} ({:?})", step.name(), how);
                self.in_flight = Some(InFlight {
                    step,
                    dispatched_at: snapshot.timestamp,
                });
                self.state = ExecutorState::Executing;
                report.dispatched = Some((step, how));
                Ok(())
            }
            Err(e) => {
                warn!("Could not deliver {}: {}", step.name(), e);
                self.fail();
                report.failed = Some(step);
                report.state = self.state;
                Err(e)
            }
        }
    }
}
