#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use std::collections::VecDeque;
    use std::io::{self, BufReader, Cursor, ErrorKind, Read};
    use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
    use std::time::Duration;
    use striker::link::{CommandFrame, FRAME_LEN, LinkError, LoopbackActuator, Opcode, Transport};
    use striker::{
        ExecutorState, FrameStream, FrameStreamError, Intent, PerceptionFrame, Point, Pose, Striker, StrikerConfig,
        StrikerError,
    };

    // Echoes a fixed number of frames, then the radio dies
    struct FailingRadio {
        healthy_frames: usize,
        written: Vec<[u8; FRAME_LEN]>,
        pending: VecDeque<[u8; FRAME_LEN]>,
    }

    impl Transport for FailingRadio {
        fn write_frame(&mut self, frame: &[u8; FRAME_LEN]) -> Result<(), LinkError> {
            self.written.push(*frame);
            self.pending.push_back(*frame);
            Ok(())
        }

        fn read_frame(&mut self) -> Result<[u8; FRAME_LEN], LinkError> {
            if self.healthy_frames == 0 {
                return Err(LinkError::Io(io::Error::new(ErrorKind::ConnectionReset, "radio down")));
            }
            self.healthy_frames -= 1;
            self.pending.pop_front().ok_or(LinkError::Timeout)
        }
    }

    // Camera feed that stays open until the sender is dropped
    struct LiveFeed {
        chunks: Receiver<Vec<u8>>,
        current: Cursor<Vec<u8>>,
    }

    impl Read for LiveFeed {
        fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
            loop {
                let n = self.current.read(out)?;
                if n > 0 || out.is_empty() {
                    return Ok(n);
                }
                match self.chunks.recv_timeout(Duration::from_secs(2)) {
                    Ok(chunk) => self.current = Cursor::new(chunk),
                    Err(RecvTimeoutError::Timeout) => {
                        return Err(io::Error::new(ErrorKind::TimedOut, "feed went quiet"));
                    }
                    Err(RecvTimeoutError::Disconnected) => return Ok(0),
                }
            }
        }
    }

    fn frame_yaml(timestamp: f64) -> String {
        format!(
            "timestamp: {:.1}\n\
             own: {{position: [-50.0, 0.0], facing: 90.0}}\n\
             opponent: {{position: [100.0, 50.0], facing: 180.0}}\n\
             ball: [50.0, 0.0]\n",
            timestamp
        )
    }

    #[fixture]
    fn config() -> StrikerConfig {
        StrikerConfig {
            warmup_frames: 0,
            ..StrikerConfig::default()
        }
    }

    fn frame(timestamp: f64, facing: f64) -> PerceptionFrame {
        PerceptionFrame {
            timestamp,
            own: Some(Pose::new(-50.0, 0.0, facing)),
            opponent: Some(Pose::new(100.0, 50.0, 180.0)),
            ball: Some(Point::new(50.0, 0.0)),
        }
    }

    #[test]
    fn test_default_config_values() {
        let config = StrikerConfig::default();
        assert_eq!(config.warmup_frames, 10);
        assert_eq!(config.analyzer.history_capacity, 64);
        assert_eq!(config.analyzer.lookahead_seconds, 0.35);
        assert_eq!(config.planner.kick_power, 54);
        assert_eq!(config.planner.tolerances.far_turn_threshold, 25.0);
        assert_eq!(config.planner.tolerances.close_turn_threshold, 10.0);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = "warmup_frames: 3\npitch:\n  attacking_right: false\nlink:\n  max_attempts: 2\n";
        let config = StrikerConfig::from_yaml_str(yaml).unwrap();
        assert_eq!(config.warmup_frames, 3);
        assert!(!config.pitch.attacking_right);
        assert_eq!(config.pitch.max_x, 122.0);
        assert_eq!(config.link.max_attempts, 2);
        assert_eq!(config.link.read_timeout_ms, 250);
        assert_eq!(config.analyzer.standoff_distance, 25.0);
    }

    #[test]
    fn test_invalid_yaml_is_reported() {
        assert!(StrikerConfig::from_yaml_str("warmup_frames: [oops").is_err());
        assert!(StrikerConfig::from_yaml_file("/nonexistent/striker.yaml").is_err());
    }

    #[test]
    fn test_config_round_trips_through_yaml() {
        let config = StrikerConfig::default();
        let text = serde_yaml::to_string(&config).unwrap();
        assert_eq!(StrikerConfig::from_yaml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_perception_frame_yaml_with_gaps() {
        let yaml = "timestamp: 1.5\nown:\n  position: [10.0, -5.0]\n  facing: 90.0\nball: [0.0, 0.0]\n";
        let frame: PerceptionFrame = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(frame.own, Some(Pose::new(10.0, -5.0, 90.0)));
        assert!(frame.opponent.is_none());
        assert_eq!(frame.ball, Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn test_frames_arrive_while_feed_is_open() {
        let (sender, chunks) = mpsc::channel();
        let feed = LiveFeed {
            chunks,
            current: Cursor::new(Vec::new()),
        };
        let mut frames = FrameStream::new(BufReader::new(feed));

        sender.send(format!("---\n{}---\n", frame_yaml(0.0)).into_bytes()).unwrap();
        let first = frames.next().expect("first frame").unwrap();
        assert_eq!(first.timestamp, 0.0);
        assert_eq!(first.own, Some(Pose::new(-50.0, 0.0, 90.0)));

        // A document end marker closes a frame just as well
        sender.send(format!("{}...\n", frame_yaml(0.1)).into_bytes()).unwrap();
        assert_eq!(frames.next().expect("second frame").unwrap().timestamp, 0.1);

        // A bad document is reported and the stream carries on
        sender.send(b"timestamp: [oops\n---\n".to_vec()).unwrap();
        assert!(matches!(frames.next(), Some(Err(FrameStreamError::Parse(_)))));

        // The last frame needs no marker once the feed closes
        sender.send(frame_yaml(0.2).into_bytes()).unwrap();
        drop(sender);
        assert_eq!(frames.next().expect("last frame").unwrap().timestamp, 0.2);
        assert!(frames.next().is_none());
    }

    #[rstest]
    fn test_live_feed_ticks_before_it_closes(config: StrikerConfig) {
        let (sender, chunks) = mpsc::channel();
        let feed = LiveFeed {
            chunks,
            current: Cursor::new(Vec::new()),
        };
        let mut frames = FrameStream::new(BufReader::new(feed));
        let mut striker = Striker::new(config, LoopbackActuator::new());
        striker.initialize().unwrap();

        sender.send(format!("{}---\n", frame_yaml(0.0)).into_bytes()).unwrap();
        let frame = frames.next().expect("frame").unwrap();
        let report = striker.process_frame(&frame).unwrap().expect("snapshot produced");
        assert_eq!(report.state, ExecutorState::Executing);
        assert_eq!(striker.link().transport().executed().last().map(|f| f.opcode()), Some(Opcode::Spin));
        drop(sender);
    }

    #[rstest]
    fn test_frames_refused_before_initialize(config: StrikerConfig) {
        let mut striker = Striker::new(config, LoopbackActuator::new());
        assert!(matches!(striker.process_frame(&frame(0.0, 90.0)), Err(StrikerError::NotInitialized)));
    }

    #[rstest]
    fn test_full_pipeline_over_loopback(config: StrikerConfig) {
        let mut striker = Striker::new(config, LoopbackActuator::new());
        striker.initialize().unwrap();

        let report = striker.process_frame(&frame(0.0, 90.0)).unwrap().expect("snapshot produced");
        assert_eq!(report.state, ExecutorState::Executing);
        assert_eq!(striker.get_status().navigation.intent, Some(Intent::Attack));

        striker.request_stop();
        striker.process_frame(&frame(0.1, 90.0)).unwrap();
        assert_eq!(striker.get_status().navigation.intent, Some(Intent::Hold));

        striker.shutdown().unwrap();
        let executed = striker.link().transport().executed();
        let opcodes: Vec<Opcode> = executed.iter().map(|f| f.opcode()).collect();
        assert_eq!(
            opcodes,
            vec![Opcode::Reset, Opcode::Spin, Opcode::Stop, Opcode::Stop, Opcode::Terminate]
        );
        assert!(!striker.get_status().operational);
    }

    #[rstest]
    fn test_warmup_swallows_first_frames(mut config: StrikerConfig) {
        config.warmup_frames = 2;
        let mut striker = Striker::new(config, LoopbackActuator::new());
        striker.initialize().unwrap();
        assert!(striker.process_frame(&frame(0.0, 90.0)).unwrap().is_none());
        assert!(striker.process_frame(&frame(0.1, 90.0)).unwrap().is_none());
        assert!(striker.process_frame(&frame(0.2, 90.0)).unwrap().is_some());
        assert_eq!(striker.get_status().snapshots, 1);
    }

    #[rstest]
    fn test_link_loss_forces_stop_attempt(config: StrikerConfig) {
        // Only the reset gets through
        let radio = FailingRadio {
            healthy_frames: 1,
            written: Vec::new(),
            pending: VecDeque::new(),
        };
        let mut striker = Striker::new(config, radio);
        striker.initialize().unwrap();

        let result = striker.process_frame(&frame(0.0, 90.0));
        assert!(matches!(result, Err(StrikerError::Link(LinkError::Io(_)))));

        let status = striker.get_status();
        assert_eq!(status.navigation.state, ExecutorState::Failed);
        assert_eq!(status.navigation.active_step, None);

        // The last thing written was a stop
        let written = &striker.link().transport().written;
        assert_eq!(written.last(), Some(CommandFrame::stop().as_bytes()));
    }
}
