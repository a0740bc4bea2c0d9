// src/navigation/controller.rs
// Turns primitive steps into command frames and hands them to the link.
// Keeps the kick latch and remembers the last confirmed frame so that a
// motion the robot is already executing is not sent again.

use log::{debug, info};

use super::step::PrimitiveStep;
use crate::link::{CommandFrame, CommandSink, LinkError, Opcode};

/// Command frame for a step.
pub fn frame_for(step: &PrimitiveStep) -> CommandFrame {
    match *step {
        PrimitiveStep::GoForward { speed, .. } => CommandFrame::forward(speed),
        PrimitiveStep::GoBackward { speed, .. } => CommandFrame::backward(speed),
        PrimitiveStep::SpinLeft { speed, angle, .. } => CommandFrame::spin(speed, angle.abs()),
        PrimitiveStep::SpinRight { speed, angle, .. } => CommandFrame::spin(speed, -angle.abs()),
        PrimitiveStep::ArcForwardLeft(arc) | PrimitiveStep::ArcForwardRight(arc) => {
            CommandFrame::arc(arc.speed, arc.angle, arc.radius)
        }
        PrimitiveStep::ArcBackwardLeft(arc) | PrimitiveStep::ArcBackwardRight(arc) => {
            CommandFrame::arc(-arc.speed, arc.angle, arc.radius)
        }
        PrimitiveStep::Kick { power } => CommandFrame::kick(power),
        PrimitiveStep::Stop => CommandFrame::stop(),
    }
}

/// Single-flight guard for the kicker: while a kick cycle (strike plus
/// return to rest) is running, further kicks are dropped.
#[derive(Debug, Clone)]
pub struct KickLatch {
    cycle_seconds: f64,
    busy_until: Option<f64>,
}

impl KickLatch {
    /// A latch whose kick cycle lasts `cycle_seconds`.
    pub fn new(cycle_seconds: f64) -> Self {
        KickLatch {
            cycle_seconds,
            busy_until: None,
        }
    }

    /// Whether a kick started earlier is still running at `now`.
    pub fn is_busy(&self, now: f64) -> bool {
        self.busy_until.is_some_and(|until| now < until)
    }

    /// Claims the kicker at `now`; false if it is still busy.
    pub fn try_fire(&mut self, now: f64) -> bool {
        if self.is_busy(now) {
            return false;
        }
        self.busy_until = Some(now + self.cycle_seconds);
        true
    }

    /// Gives the kicker back, e.g. when the kick frame never got through.
    pub fn release(&mut self) {
        self.busy_until = None;
    }
}

/// What happened to a step handed to the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The frame was confirmed by the actuator.
    Sent {
        /// Writes needed.
        attempts: u32,
    },
    /// Same frame as the one the robot is already executing; not resent.
    Unchanged,
    /// A kick is already running; this one was dropped.
    KickIgnored,
}

/// Step-to-wire front end used by the plan executor.
#[derive(Debug, Clone)]
pub struct Controller {
    latch: KickLatch,
    last_confirmed: Option<CommandFrame>,
}

impl Controller {
    /// Creates a controller whose kick cycle lasts `kick_cycle_seconds`.
    pub fn new(kick_cycle_seconds: f64) -> Self {
        Controller {
            latch: KickLatch::new(kick_cycle_seconds),
            last_confirmed: None,
        }
    }

    /// Sends the frame for `step` unless it would be a no-op.
    pub fn dispatch<S: CommandSink + ?Sized>(
        &mut self,
        step: &PrimitiveStep,
        now: f64,
        sink: &mut S,
    ) -> Result<Dispatch, LinkError> {
        let frame = frame_for(step);
        let is_kick = frame.opcode() == Opcode::Kick;

        if is_kick {
            if !self.latch.try_fire(now) {
                info!("Kick already in progress, ignoring");
                return Ok(Dispatch::KickIgnored);
            }
        } else if self.last_confirmed == Some(frame) {
            debug!("{} unchanged, not resending", step.name());
            return Ok(Dispatch::Unchanged);
        }

        match sink.deliver(&frame) {
            Ok(ack) => {
                self.last_confirmed = Some(frame);
                Ok(Dispatch::Sent { attempts: ack.attempts })
            }
            Err(e) => {
                // the robot's state is unknown now
                self.last_confirmed = None;
                if is_kick {
                    self.latch.release();
                }
                Err(e)
            }
        }
    }

    /// Forgets the last confirmed frame so the next one is always sent.
    pub fn forget(&mut self) {
        self.last_confirmed = None;
    }

    /// Last frame the actuator confirmed.
    pub fn last_confirmed(&self) -> Option<CommandFrame> {
        self.last_confirmed
    }

    /// Whether the kicker is busy at `now`.
    pub fn kicking(&self, now: f64) -> bool {
        self.latch.is_busy(now)
    }
}
