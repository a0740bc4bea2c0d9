// src/main.rs
// Entry point for the striker: reads perception frames from stdin as a YAML
// document stream and drives the robot over the command link.
//
// Each frame is ticked as soon as its document closes (a `---` or `...`
// line), so a live camera feed can be piped straight in.
//
// Without --loopback the link connects over TCP to `link.address` from the
// configuration (the simulator or the radio bridge).

use clap::Parser;
use log::{error, info, warn};
use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

use striker::link::{LoopbackActuator, StreamTransport, Transport};
use striker::{FrameStream, FrameStreamError, Striker, StrikerConfig, StrikerError};

#[derive(Parser)]
#[command(name = "striker", about = "Autonomy core for a camera-guided ball-playing robot")]
struct Cli {
    /// YAML configuration file; built-in defaults when omitted
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Echo commands in-process instead of connecting to an actuator
    #[arg(long)]
    loopback: bool,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging for debugging
    env_logger::init();
    let cli = Cli::parse();
    info!("Starting striker autonomy core...");

    let config = match &cli.config {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            StrikerConfig::from_yaml_file(path)?
        }
        None => StrikerConfig::default(),
    };

    let transport: Box<dyn Transport> = if cli.loopback {
        info!("Using loopback actuator");
        Box::new(LoopbackActuator::new())
    } else {
        let timeout = Duration::from_millis(config.link.read_timeout_ms);
        Box::new(StreamTransport::connect(&config.link.address, timeout)?)
    };

    let mut striker = Striker::new(config, transport);
    striker.initialize()?;

    // One tick per perception frame, strictly in order
    for next in FrameStream::new(io::stdin().lock()) {
        let frame = match next {
            Ok(frame) => frame,
            Err(FrameStreamError::Parse(e)) => {
                warn!("Skipping unreadable perception frame: {}", e);
                continue;
            }
            Err(e) => {
                error!("{}", e);
                break;
            }
        };
        match striker.process_frame(&frame) {
            Ok(Some(report)) => info!(
                "t={:.3}s state={:?} dispatched={:?}",
                frame.timestamp,
                report.state,
                report.dispatched.map(|(step, _)| step.name())
            ),
            Ok(None) => {}
            Err(StrikerError::Link(e)) => error!("Tick at {:.3}s lost the link: {}", frame.timestamp, e),
            Err(e) => return Err(e.into()),
        }
    }

    info!("Perception stream ended");
    striker.shutdown()?;
    info!("Final status: {:?}", striker.get_status());
    Ok(())
}
