// link/frame.rs

// Fixed 32-byte command frame exchanged with the actuator. Byte 0 is the
// opcode, bytes 1-3 are reserved and zero, then up to three big-endian i32
// parameters from byte 4 on; the rest is zero padding.

use std::fmt;

use super::LinkError;

/// Size of every frame on the wire.
pub const FRAME_LEN: usize = 32;

const PARAM_OFFSET: usize = 4;
const MAX_PARAMS: usize = 3;

/// Operation selected by the first byte of a frame.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    /// Halt all motion.
    Stop = 0,
    /// Drive forward at `speed`.
    Forward = 1,
    /// Drive backward at `speed`.
    Backward = 2,
    /// Fire the kicker with `power`.
    Kick = 3,
    /// Spin by `angle` at `speed`, or arc when a radius follows.
    Spin = 4,
    /// Reset the link.
    Reset = 126,
    /// End the session.
    Terminate = 127,
}

impl TryFrom<u8> for Opcode {
    type Error = LinkError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        match byte {
            0 => Ok(Opcode::Stop),
            1 => Ok(Opcode::Forward),
            2 => Ok(Opcode::Backward),
            3 => Ok(Opcode::Kick),
            4 => Ok(Opcode::Spin),
            126 => Ok(Opcode::Reset),
            127 => Ok(Opcode::Terminate),
            other => Err(LinkError::MalformedFrame(format!("unknown opcode {}", other))),
        }
    }
}

/// One command as it travels over the wire.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame {
    bytes: [u8; FRAME_LEN],
}

impl CommandFrame {
    fn build(opcode: Opcode, params: &[i32]) -> Self {
        debug_assert!(params.len() <= MAX_PARAMS);
        let mut bytes = [0u8; FRAME_LEN];
        bytes[0] = opcode as u8;
        for (i, value) in params.iter().take(MAX_PARAMS).enumerate() {
            let start = PARAM_OFFSET + i * 4;
            bytes[start..start + 4].copy_from_slice(&value.to_be_bytes());
        }
        CommandFrame { bytes }
    }

    /// Halt; all-zero payload.
    pub fn stop() -> Self {
        Self::build(Opcode::Stop, &[])
    }

    /// Drive forward.
    pub fn forward(speed: i32) -> Self {
        Self::build(Opcode::Forward, &[speed])
    }

    /// Drive backward.
    pub fn backward(speed: i32) -> Self {
        Self::build(Opcode::Backward, &[speed])
    }

    /// Fire the kicker.
    pub fn kick(power: i32) -> Self {
        Self::build(Opcode::Kick, &[power])
    }

    /// Spin on the spot; positive `angle` is anti-clockwise.
    pub fn spin(speed: i32, angle: i32) -> Self {
        Self::build(Opcode::Spin, &[speed, angle])
    }

    /// Drive an arc of `radius` sweeping `angle` degrees (positive is
    /// anti-clockwise). Negative `speed` drives the arc in reverse.
    pub fn arc(speed: i32, angle: i32, radius: i32) -> Self {
        Self::build(Opcode::Spin, &[speed, angle, radius])
    }

    /// Reset the link.
    pub fn reset() -> Self {
        Self::build(Opcode::Reset, &[])
    }

    /// End the session.
    pub fn terminate() -> Self {
        Self::build(Opcode::Terminate, &[])
    }

    /// Validates raw bytes received from the wire.
    pub fn decode(bytes: &[u8]) -> Result<Self, LinkError> {
        let bytes: [u8; FRAME_LEN] = bytes
            .try_into()
            .map_err(|_| LinkError::MalformedFrame(format!("expected {} bytes, got {}", FRAME_LEN, bytes.len())))?;
        Opcode::try_from(bytes[0])?;
        if bytes[1..PARAM_OFFSET].iter().any(|b| *b != 0) {
            return Err(LinkError::MalformedFrame("reserved bytes are not zero".to_string()));
        }
        if bytes[PARAM_OFFSET + MAX_PARAMS * 4..].iter().any(|b| *b != 0) {
            return Err(LinkError::MalformedFrame("padding is not zero".to_string()));
        }
        Ok(CommandFrame { bytes })
    }

    /// Operation code.
    pub fn opcode(&self) -> Opcode {
        // frames are only built through the constructors or `decode`
        Opcode::try_from(self.bytes[0]).unwrap_or(Opcode::Stop)
    }

    /// Parameter `index` (0..3); zero when unused.
    pub fn param(&self, index: usize) -> i32 {
        if index >= MAX_PARAMS {
            return 0;
        }
        let start = PARAM_OFFSET + index * 4;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.bytes[start..start + 4]);
        i32::from_be_bytes(raw)
    }

    /// All three parameter slots.
    pub fn params(&self) -> [i32; MAX_PARAMS] {
        [self.param(0), self.param(1), self.param(2)]
    }

    /// Wire representation.
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.bytes
    }
}

impl fmt::Debug for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CommandFrame")
            .field("opcode", &self.opcode())
            .field("params", &self.params())
            .finish()
    }
}
