// core/mod.rs

// Spatial foundation of the striker: geometry, pose estimation, perception
// types and the world analyzer that ties them together.

pub mod analyzer;
pub mod geometry;
pub mod localization;
pub mod perception;

// Re-export key types for a unified API
pub use analyzer::{AnalyzerConfig, WorldAnalyzer};
pub use geometry::Point;
pub use localization::{HistoryWindow, KinematicPose, Pose, Sighting, Smoother, WindowedSmoother};
pub use perception::{
    Admission, FrameStream, FrameStreamError, PerceptionFrame, PitchGeometry, Staleness, WarmupGate, WorldSnapshot,
};
