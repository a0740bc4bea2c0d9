// link/transport.rs

// Byte-level seam under the command link. Anything that can move 32-byte
// frames both ways can carry commands: a TCP socket to the simulator or the
// radio bridge, any Read + Write stream, or the in-process loopback used for
// dry runs.

use std::collections::VecDeque;
use std::io::{ErrorKind, Read, Write};
use std::net::TcpStream;
use std::time::Duration;

use log::{debug, info};

use super::LinkError;
use super::frame::{CommandFrame, FRAME_LEN};

/// Moves whole frames to and from the actuator.
pub trait Transport {
    /// Writes one frame. Partial writes are errors.
    fn write_frame(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), LinkError>;

    /// Reads one frame, or [`LinkError::Timeout`] if none arrives in time.
    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], LinkError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write_frame(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), LinkError> {
        (**self).write_frame(frame)
    }

    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], LinkError> {
        (**self).read_frame()
    }
}

fn classify(error: std::io::Error) -> LinkError {
    match error.kind() {
        ErrorKind::WouldBlock | ErrorKind::TimedOut => LinkError::Timeout,
        _ => LinkError::Io(error),
    }
}

/// Frames over any byte stream.
///
/// A read that times out partway through a frame keeps the bytes it got;
/// the next read continues filling the same frame, so the stream never
/// drifts off the 32-byte boundary.
#[derive(Debug)]
pub struct StreamTransport<S> {
    stream: S,
    partial: [u8; FRAME_LEN],
    filled: usize,
}

impl<S: Read + Write> StreamTransport<S> {
    /// Wraps an already connected stream.
    pub fn new(stream: S) -> Self {
        StreamTransport {
            stream,
            partial: [0; FRAME_LEN],
            filled: 0,
        }
    }

    /// Bytes of an unfinished frame held from an earlier read.
    pub fn buffered(&self) -> usize {
        self.filled
    }

    /// Gives the stream back.
    pub fn into_inner(self) -> S {
        self.stream
    }
}

impl StreamTransport<TcpStream> {
    /// Connects to a simulator or bridge, bounding each read and write by
    /// `timeout`.
    pub fn connect(address: &str, timeout: Duration) -> Result<Self, LinkError> {
        let stream = TcpStream::connect(address)?;
        stream.set_read_timeout(Some(timeout))?;
        stream.set_write_timeout(Some(timeout))?;
        stream.set_nodelay(true)?;
        info!("Connected to actuator at {}", address);
        Ok(StreamTransport::new(stream))
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn write_frame(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), LinkError> {
        self.stream.write_all(frame).map_err(classify)?;
        self.stream.flush().map_err(classify)
    }

    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], LinkError> {
        while self.filled < FRAME_LEN {
            match self.stream.read(&mut self.partial[self.filled..]) {
                Ok(0) => {
                    return Err(LinkError::Io(std::io::Error::new(
                        ErrorKind::UnexpectedEof,
                        "actuator closed the stream",
                    )));
                }
                Ok(n) => self.filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    if self.filled > 0 {
                        debug!("Echo interrupted after {} of {} bytes", self.filled, FRAME_LEN);
                    }
                    return Err(classify(e));
                }
            }
        }
        self.filled = 0;
        Ok(self.partial)
    }
}

/// In-process actuator that accepts every frame and echoes it back.
#[derive(Debug, Default)]
pub struct LoopbackActuator {
    pending: VecDeque<[u8; FRAME_LEN]>,
    executed: Vec<CommandFrame>,
}

impl LoopbackActuator {
    /// An actuator that has executed nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every well-formed frame received so far, in order.
    pub fn executed(&self) -> &[CommandFrame] {
        &self.executed
    }
}

impl Transport for LoopbackActuator {
    fn write_frame(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), LinkError> {
        if let Ok(decoded) = CommandFrame::decode(frame) {
            self.executed.push(decoded);
        }
        self.pending.push_back(*frame);
        Ok(())
    }

    fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], LinkError> {
        self.pending.pop_front().ok_or(LinkError::Timeout)
    }
}
