//! Striker - autonomy core for a camera-guided ball-playing robot
//!
//! Each camera frame runs one tick through the pipeline
//! `WorldAnalyzer -> StrategySelector -> PlanExecutor -> CommandLink`.
//! Ticks never overlap: a tick that waits on the link holds up the next
//! frame, since the robot has no command queue of its own.

#![warn(missing_docs)]
#![warn(unused_extern_crates)]

pub mod core;
pub mod link;
pub mod navigation;
pub mod strategy;

// Re-export commonly used items for easier access
pub use crate::core::{
    AnalyzerConfig, FrameStream, FrameStreamError, KinematicPose, PerceptionFrame, PitchGeometry, Point, Pose, WorldAnalyzer, WorldSnapshot,
};
pub use link::{CommandFrame, CommandLink, CommandSink, LinkConfig, LinkError, LinkStats, Transport};
pub use navigation::{ExecutorState, NavigationStatus, PlanExecutor, PlannerConfig, PrimitiveStep, TickReport};
pub use strategy::{Intent, StrategyConfig, StrategySelector};

use log::{error, info, warn};
use std::path::Path;

/// Main configuration structure for the striker
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct StrikerConfig {
    /// Pitch dimensions and attacking direction
    pub pitch: PitchGeometry,
    /// World analysis thresholds
    pub analyzer: AnalyzerConfig,
    /// Intent selection policy
    pub strategy: StrategyConfig,
    /// Plan building and step tolerances
    pub planner: PlannerConfig,
    /// Command link settings
    pub link: LinkConfig,
    /// Camera frames ignored at start-up
    pub warmup_frames: u32,
}

impl Default for StrikerConfig {
    fn default() -> Self {
        StrikerConfig {
            pitch: PitchGeometry::default(),
            analyzer: AnalyzerConfig::default(),
            strategy: StrategyConfig::default(),
            planner: PlannerConfig::default(),
            link: LinkConfig::default(),
            warmup_frames: 10,
        }
    }
}

impl StrikerConfig {
    /// Loads a configuration from a YAML file; missing keys keep defaults.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path.as_ref()).map_err(ConfigError::Io)?;
        serde_yaml::from_reader(file).map_err(ConfigError::Parse)
    }

    /// Parses a configuration from YAML text.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(ConfigError::Parse)
    }
}

/// Configuration loading error types
#[derive(Debug)]
pub enum ConfigError {
    /// File could not be read
    Io(std::io::Error),
    /// File is not valid configuration YAML
    Parse(serde_yaml::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read configuration: {}", e),
            ConfigError::Parse(e) => write!(f, "invalid configuration: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Striker error types
#[derive(Debug)]
pub enum StrikerError {
    /// Command link failure; a stop has been attempted
    Link(LinkError),
    /// Configuration error
    Config(ConfigError),
    /// Frames arrived before the link was initialized
    NotInitialized,
}

impl std::fmt::Display for StrikerError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            StrikerError::Link(e) => write!(f, "Link error: {}", e),
            StrikerError::Config(e) => write!(f, "Configuration error: {}", e),
            StrikerError::NotInitialized => write!(f, "System not initialized"),
        }
    }
}

impl std::error::Error for StrikerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StrikerError::Link(e) => Some(e),
            StrikerError::Config(e) => Some(e),
            StrikerError::NotInitialized => None,
        }
    }
}

impl From<LinkError> for StrikerError {
    fn from(e: LinkError) -> Self {
        StrikerError::Link(e)
    }
}

impl From<ConfigError> for StrikerError {
    fn from(e: ConfigError) -> Self {
        StrikerError::Config(e)
    }
}

/// Combined system status
#[derive(Debug, Clone, PartialEq)]
pub struct SystemStatus {
    /// Plan executor status
    pub navigation: NavigationStatus,
    /// Link counters
    pub link: LinkStats,
    /// Snapshots the analyzer has produced
    pub snapshots: u64,
    /// Whether an operator stop is in force
    pub stop_requested: bool,
    /// Overall operational status
    pub operational: bool,
}

/// Primary entry point: owns every stage of the tick pipeline.
pub struct Striker<T: Transport> {
    config: StrikerConfig,
    analyzer: WorldAnalyzer,
    selector: StrategySelector,
    executor: PlanExecutor,
    link: CommandLink<T>,
    is_initialized: bool,
}

impl<T: Transport> Striker<T> {
    /// Assembles the pipeline over an already connected transport.
    pub fn new(config: StrikerConfig, transport: T) -> Self {
        let analyzer = WorldAnalyzer::new(config.analyzer.clone(), config.pitch, config.warmup_frames);
        let selector = StrategySelector::new(config.strategy.clone());
        let executor = PlanExecutor::new(config.planner.clone(), config.analyzer.clone());
        let link = CommandLink::new(transport, config.link.clone());
        Striker {
            config,
            analyzer,
            selector,
            executor,
            link,
            is_initialized: false,
        }
    }

    /// Resets the link; frames are refused until this succeeds.
    pub fn initialize(&mut self) -> Result<(), StrikerError> {
        info!("Initializing striker...");
        self.link.reset()?;
        self.is_initialized = true;
        info!("Striker initialized, waiting for {} warm-up frames", self.config.warmup_frames);
        Ok(())
    }

    /// Runs one tick for a perception frame. `Ok(None)` while the analyzer
    /// cannot yet produce a snapshot.
    pub fn process_frame(&mut self, frame: &PerceptionFrame) -> Result<Option<TickReport>, StrikerError> {
        if !self.is_initialized {
            return Err(StrikerError::NotInitialized);
        }
        match self.analyzer.ingest(frame) {
            Some(snapshot) => self.tick(&snapshot).map(Some),
            None => Ok(None),
        }
    }

    /// Runs strategy and execution for an already analyzed snapshot.
    ///
    /// On a link failure a best-effort stop is sent before the error is
    /// returned.
    pub fn tick(&mut self, snapshot: &WorldSnapshot) -> Result<TickReport, StrikerError> {
        if !self.is_initialized {
            return Err(StrikerError::NotInitialized);
        }
        let intent = self
            .selector
            .select(&self.config.analyzer, snapshot, self.executor.intent());

        match self.executor.tick(snapshot, intent, &mut self.link) {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Command link failed: {}; forcing stop", e);
                if let Err(stop_error) = self.executor.emergency_stop(&mut self.link) {
                    error!("Stop could not be delivered either: {}", stop_error);
                }
                Err(StrikerError::Link(e))
            }
        }
    }

    /// Forces `Hold` from the next tick on.
    pub fn request_stop(&mut self) {
        self.selector.request_stop();
    }

    /// Lifts a stop request.
    pub fn resume(&mut self) {
        self.selector.resume();
    }

    /// Stops the robot and terminates the link.
    pub fn shutdown(&mut self) -> Result<(), StrikerError> {
        info!("Shutting down striker...");
        self.selector.request_stop();
        if let Err(e) = self.link.terminate() {
            warn!("Link did not terminate cleanly: {}", e);
            self.is_initialized = false;
            return Err(e.into());
        }
        self.is_initialized = false;
        info!("Striker shutdown complete");
        Ok(())
    }

    /// Get current system status
    pub fn get_status(&self) -> SystemStatus {
        SystemStatus {
            navigation: self.executor.status(),
            link: self.link.stats(),
            snapshots: self.analyzer.snapshots_produced(),
            stop_requested: self.selector.stop_requested(),
            operational: self.is_initialized,
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &StrikerConfig {
        &self.config
    }

    /// The command link.
    pub fn link(&self) -> &CommandLink<T> {
        &self.link
    }
}
