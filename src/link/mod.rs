//! Command link to the robot
//!
//! Delivers [`CommandFrame`]s with at most one frame in flight: every frame is
//! written, then the actuator's echo is read back and compared byte for byte.
//! A missing or garbled echo resends the identical frame, up to a fixed
//! number of attempts. Transport failures are returned to the caller.

pub mod frame;
pub mod transport;

pub use frame::{CommandFrame, FRAME_LEN, Opcode};
pub use transport::{LoopbackActuator, StreamTransport, Transport};

use std::collections::VecDeque;

use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

/// Command link error types
#[derive(Debug)]
pub enum LinkError {
    /// Underlying read or write failed
    Io(std::io::Error),
    /// No echo arrived within the transport's read timeout
    Timeout,
    /// Every attempt went unconfirmed
    RetriesExhausted {
        /// Number of times the frame was written
        attempts: u32,
    },
    /// Bytes that are not a valid command frame
    MalformedFrame(String),
}

impl std::fmt::Display for LinkError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            LinkError::Io(e) => write!(f, "transport I/O error: {}", e),
            LinkError::Timeout => write!(f, "timed out waiting for echo"),
            LinkError::RetriesExhausted { attempts } => {
                write!(f, "frame unconfirmed after {} attempts", attempts)
            }
            LinkError::MalformedFrame(msg) => write!(f, "malformed frame: {}", msg),
        }
    }
}

impl std::error::Error for LinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LinkError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for LinkError {
    fn from(e: std::io::Error) -> Self {
        LinkError::Io(e)
    }
}

/// Link settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Actuator address for TCP transports
    pub address: String,
    /// Writes per frame before giving up
    pub max_attempts: u32,
    /// How long to wait for each echo, in milliseconds
    pub read_timeout_ms: u64,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            address: "127.0.0.1:6789".to_string(),
            max_attempts: 5,
            read_timeout_ms: 250,
        }
    }
}

/// Confirmation that the actuator echoed a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    /// Writes needed, starting at 1
    pub attempts: u32,
}

/// Running link counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    /// Frames confirmed by an echo
    pub confirmed: u64,
    /// Extra writes caused by missing or wrong echoes
    pub resends: u64,
    /// Sends that ended in an error
    pub failures: u64,
}

/// Anything the executor can hand frames to.
pub trait CommandSink {
    /// Delivers one frame, blocking until it is confirmed or has failed.
    fn deliver(&mut self, frame: &CommandFrame) -> Result<Ack, LinkError>;
}

/// Acknowledged frame delivery over a [`Transport`].
pub struct CommandLink<T: Transport> {
    transport: T,
    config: LinkConfig,
    stats: LinkStats,
    // writes whose echo may still be on its way, oldest first
    late_echoes: VecDeque<[u8; FRAME_LEN]>,
}

impl<T: Transport> CommandLink<T> {
    /// Wraps a connected transport.
    pub fn new(transport: T, config: LinkConfig) -> Self {
        CommandLink {
            transport,
            config,
            stats: LinkStats::default(),
            late_echoes: VecDeque::new(),
        }
    }

    /// Sends `frame` and waits for its echo, resending the same bytes on a
    /// timeout or mismatch.
    ///
    /// Echoes of earlier resends that arrive late are read past without
    /// costing an attempt.
    pub fn send(&mut self, frame: &CommandFrame) -> Result<Ack, LinkError> {
        let allowed = self.config.max_attempts.max(1);
        for attempt in 1..=allowed {
            debug!("Sending {:?} (attempt {}/{})", frame, attempt, allowed);
            if let Err(e) = self.transport.write_frame(frame.as_bytes()) {
                self.stats.failures += 1;
                self.late_echoes.clear();
                error!("Write of {:?} failed: {}", frame, e);
                return Err(e);
            }

            loop {
                match self.transport.read_frame() {
                    Ok(echo) if echo == *frame.as_bytes() => {
                        self.stats.confirmed += 1;
                        // the stream is ordered: anything older was lost
                        self.late_echoes.clear();
                        self.late_echoes
                            .extend(std::iter::repeat_n(*frame.as_bytes(), attempt as usize - 1));
                        return Ok(Ack { attempts: attempt });
                    }
                    Ok(echo) if self.late_echoes.front() == Some(&echo) => {
                        self.late_echoes.pop_front();
                        debug!("Skipping late echo of an earlier frame");
                    }
                    Ok(_) => {
                        warn!("Echo of {:?} does not match, resending", frame);
                        break;
                    }
                    Err(LinkError::Timeout) => {
                        warn!("No echo for {:?}, resending", frame);
                        break;
                    }
                    Err(e) => {
                        self.stats.failures += 1;
                        self.late_echoes.clear();
                        error!("Read after {:?} failed: {}", frame, e);
                        return Err(e);
                    }
                }
            }
            if attempt < allowed {
                self.stats.resends += 1;
            }
        }

        self.stats.failures += 1;
        self.late_echoes.clear();
        self.late_echoes
            .extend(std::iter::repeat_n(*frame.as_bytes(), allowed as usize));
        error!("{:?} unconfirmed after {} attempts", frame, allowed);
        Err(LinkError::RetriesExhausted { attempts: allowed })
    }

    /// Resets the actuator side of the link.
    pub fn reset(&mut self) -> Result<Ack, LinkError> {
        info!("Resetting command link");
        self.send(&CommandFrame::reset())
    }

    /// Stops the robot and ends the session.
    pub fn terminate(&mut self) -> Result<(), LinkError> {
        info!("Terminating command link");
        self.send(&CommandFrame::stop())?;
        self.send(&CommandFrame::terminate())?;
        Ok(())
    }

    /// Counters since the link was created.
    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    /// Settings in use.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// The underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: Transport> CommandSink for CommandLink<T> {
    fn deliver(&mut self, frame: &CommandFrame) -> Result<Ack, LinkError> {
        self.send(frame)
    }
}
