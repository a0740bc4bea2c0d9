#[cfg(test)]
mod tests {
    use rstest::{fixture, rstest};
    use striker::core::analyzer::*;
    use striker::core::geometry::Point;
    use striker::core::localization::{KinematicPose, Pose};
    use striker::core::perception::{Admission, PerceptionFrame, PitchGeometry, WarmupGate};

    #[fixture]
    fn config() -> AnalyzerConfig {
        AnalyzerConfig::default()
    }

    fn frame(timestamp: f64, own: Option<Pose>, opponent: Option<Pose>, ball: Option<Point>) -> PerceptionFrame {
        PerceptionFrame {
            timestamp,
            own,
            opponent,
            ball,
        }
    }

    fn full_frame(timestamp: f64, own: Pose) -> PerceptionFrame {
        frame(
            timestamp,
            Some(own),
            Some(Pose::new(100.0, 40.0, 180.0)),
            Some(Point::new(0.0, 0.0)),
        )
    }

    #[rstest]
    #[case(12.0, 0.0, 0.0, true)]
    #[case(112.0, 0.0, 0.0, false)]
    #[case(12.0, 8.0, 0.0, true)]
    #[case(12.0, 10.0, 0.0, false)]
    #[case(-12.0, 0.0, 0.0, false)]
    #[case(0.0, 12.0, 90.0, true)]
    fn test_has_ball(config: AnalyzerConfig, #[case] x: f64, #[case] y: f64, #[case] facing: f64, #[case] expected: bool) {
        // Mouth sits half a length plus clearance ahead of the centroid
        assert_eq!(config.reach(), 12.0);
        let robot = Pose::new(0.0, 0.0, facing);
        assert_eq!(has_ball(&config, &robot, Point::new(x, y)), expected);
    }

    #[rstest]
    fn test_would_have_ball_with_incoming_ball(config: AnalyzerConfig) {
        let robot = KinematicPose::at_rest(Pose::new(0.0, 0.0, 0.0));
        // 80 cm/s for 0.35 s brings the ball 28 cm closer
        let ball = KinematicPose::moving(Pose::new(40.0, 0.0, 180.0), 80.0, 180.0);
        assert!(would_have_ball(&config, &robot, &ball));

        let resting = KinematicPose::at_rest(Pose::new(40.0, 0.0, 0.0));
        assert!(!would_have_ball(&config, &robot, &resting));
    }

    #[rstest]
    fn test_would_have_ball_with_moving_robot(config: AnalyzerConfig) {
        let robot = KinematicPose::moving(Pose::new(0.0, 0.0, 0.0), 80.0, 0.0);
        let ball = KinematicPose::at_rest(Pose::new(40.0, 0.0, 0.0));
        assert!(would_have_ball(&config, &robot, &ball));
    }

    #[rstest]
    #[case(44.0, 184.0, 140.0, true)]
    #[case(90.0, 89.0, 1.0, true)]
    #[case(350.0, 5.0, 20.0, true)]
    #[case(355.0, 2.0, 10.0, true)]
    #[case(350.0, 5.0, 10.0, false)]
    #[case(0.0, 180.0, 90.0, false)]
    #[case(-10.0, 10.0, 25.0, true)]
    fn test_is_similar_angle(#[case] a: f64, #[case] b: f64, #[case] threshold: f64, #[case] expected: bool) {
        assert_eq!(is_similar_angle(a, b, threshold), expected);
        assert_eq!(is_similar_angle(b, a, threshold), expected);
    }

    #[rstest]
    #[case(Point::new(40.0, 0.0), true)]
    #[case(Point::new(40.0, 30.0), false)]
    #[case(Point::new(60.0, 0.0), true)]
    #[case(Point::new(80.0, 0.0), false)]
    #[case(Point::new(-40.0, 0.0), false)]
    fn test_opponent_blocking_path(config: AnalyzerConfig, #[case] obstacle: Point, #[case] expected: bool) {
        let me = Pose::new(0.0, 0.0, 0.0);
        assert_eq!(opponent_blocking_path(&config, &me, obstacle), expected);
    }

    #[rstest]
    #[case(180.0, true)]
    #[case(0.0, false)]
    fn test_blocking_falls_back_to_cone_inside_box(config: AnalyzerConfig, #[case] facing: f64, #[case] expected: bool) {
        let me = Pose::new(5.0, 0.0, facing);
        assert_eq!(opponent_blocking_path(&config, &me, Point::origin()), expected);
    }

    #[rstest]
    #[case(0.0, Point::new(-100.0, 50.0), true)]
    #[case(30.0, Point::new(-100.0, 50.0), false)]
    #[case(0.0, Point::new(20.0, 0.0), false)]
    #[case(0.0, Point::new(0.0, 20.0), true)]
    fn test_shot_on_goal_attacking_right(
        config: AnalyzerConfig,
        #[case] facing: f64,
        #[case] opponent: Point,
        #[case] expected: bool,
    ) {
        let pitch = PitchGeometry::default();
        let me = KinematicPose::at_rest(Pose::new(0.0, 0.0, facing));
        let them = KinematicPose::at_rest(Pose::new(opponent.x, opponent.y, 90.0));
        assert_eq!(shot_on_goal(&config, &pitch, &me, &them), expected);
    }

    #[rstest]
    #[case(180.0, true)]
    #[case(0.0, false)]
    fn test_shot_on_goal_attacking_left(config: AnalyzerConfig, #[case] facing: f64, #[case] expected: bool) {
        let pitch = PitchGeometry {
            attacking_right: false,
            ..PitchGeometry::default()
        };
        let me = KinematicPose::at_rest(Pose::new(0.0, 0.0, facing));
        let them = KinematicPose::at_rest(Pose::new(100.0, 50.0, 0.0));
        assert_eq!(shot_on_goal(&config, &pitch, &me, &them), expected);
    }

    #[rstest]
    #[case(true, Point::new(0.0, 0.0), Point::new(-25.0, 0.0))]
    #[case(false, Point::new(0.0, 0.0), Point::new(25.0, 0.0))]
    #[case(true, Point::new(0.0, 40.0), Point::new(-25.0, 40.0))]
    #[case(true, Point::new(-115.0, 0.0), Point::new(-115.0, 0.0))]
    fn test_kicking_position(
        config: AnalyzerConfig,
        #[case] attacking_right: bool,
        #[case] ball: Point,
        #[case] expected: Point,
    ) {
        let pitch = PitchGeometry {
            attacking_right,
            ..PitchGeometry::default()
        };
        let position = kicking_position(&config, &pitch, ball);
        assert!((position - expected).norm() < 1e-9, "got {:?}", position);
    }

    #[rstest]
    fn test_kicking_position_diagonal_on_wide_pitch(config: AnalyzerConfig) {
        let pitch = PitchGeometry {
            min_y: -100.0,
            max_y: 100.0,
            ..PitchGeometry::default()
        };
        let side = 50.0_f64.sqrt() * 5.0;
        let above = kicking_position(&config, &pitch, Point::new(0.0, 40.0));
        assert!((above - Point::new(-side, 40.0 + side)).norm() < 1e-9);
        let below = kicking_position(&config, &pitch, Point::new(0.0, -40.0));
        assert!((below - Point::new(-side, -40.0 - side)).norm() < 1e-9);
    }

    #[rstest]
    #[case(Point::new(-60.0, 0.0), true)]
    #[case(Point::new(30.0, 0.0), false)]
    fn test_defensive_side(#[case] me: Point, #[case] expected: bool) {
        let pitch = PitchGeometry::default();
        assert_eq!(defensive_side(&pitch, me, Point::new(0.0, 0.0)), expected);
    }

    #[test]
    fn test_goal_side_uses_x_only() {
        assert!(goal_side(122.0, Point::new(50.0, 60.0), Point::new(0.0, 0.0)));
        assert!(!goal_side(122.0, Point::new(-10.0, 0.0), Point::new(0.0, 50.0)));
    }

    #[rstest]
    fn test_warmup_frames_are_ignored(config: AnalyzerConfig) {
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 3);
        for i in 0..3 {
            assert!(analyzer.ingest(&full_frame(i as f64 * 0.1, Pose::new(0.0, 0.0, 0.0))).is_none());
        }
        assert!(analyzer.ingest(&full_frame(0.3, Pose::new(0.0, 0.0, 0.0))).is_some());
        assert_eq!(analyzer.snapshots_produced(), 1);
    }

    #[rstest]
    #[case(0, vec![Admission::FirstFrame, Admission::Admitted])]
    #[case(2, vec![Admission::WarmingUp, Admission::WarmingUp, Admission::FirstFrame, Admission::Admitted])]
    fn test_warmup_gate_marks_first_frame(#[case] frames: u32, #[case] expected: Vec<Admission>) {
        let mut gate = WarmupGate::new(frames);
        let verdicts: Vec<Admission> = expected.iter().map(|_| gate.admit()).collect();
        assert_eq!(verdicts, expected);
        assert!(gate.is_warm());
    }

    #[rstest]
    fn test_no_snapshot_until_everything_seen(config: AnalyzerConfig) {
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        let partial = frame(0.0, Some(Pose::new(0.0, 0.0, 0.0)), Some(Pose::new(50.0, 0.0, 0.0)), None);
        assert!(analyzer.ingest(&partial).is_none());
        assert!(analyzer.ingest(&full_frame(0.1, Pose::new(0.0, 0.0, 0.0))).is_some());
    }

    #[rstest]
    fn test_history_window_is_bounded(mut config: AnalyzerConfig) {
        config.history_capacity = 4;
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        for i in 0..10 {
            analyzer.ingest(&full_frame(i as f64 * 0.1, Pose::new(i as f64, 0.0, 0.0)));
        }
        assert_eq!(analyzer.history_lengths(), (4, 4, 4));
    }

    #[rstest]
    fn test_speed_and_direction_from_history(config: AnalyzerConfig) {
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        let mut snapshot = None;
        // 10 cm every 0.1 s along +y
        for i in 0..8 {
            snapshot = analyzer.ingest(&full_frame(i as f64 * 0.1, Pose::new(0.0, i as f64 * 10.0, 90.0)));
        }
        let snapshot = snapshot.expect("snapshot after warm-up");
        assert!((snapshot.own.speed - 100.0).abs() < 1e-6);
        assert!((snapshot.own.travel_direction - 90.0).abs() < 1e-6);
        assert_eq!(snapshot.ball.speed, 0.0);
    }

    #[rstest]
    fn test_ball_facing_follows_travel(config: AnalyzerConfig) {
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        let mut snapshot = None;
        for i in 0..4 {
            snapshot = analyzer.ingest(&frame(
                i as f64 * 0.1,
                Some(Pose::new(0.0, 0.0, 0.0)),
                Some(Pose::new(100.0, 0.0, 0.0)),
                Some(Point::new(50.0, -(i as f64) * 5.0)),
            ));
        }
        let ball = snapshot.expect("snapshot").ball;
        assert!((ball.travel_direction - 270.0).abs() < 1e-6);
        assert_eq!(ball.facing(), ball.travel_direction);
    }

    #[rstest]
    fn test_single_frame_heading_outlier_rejected(config: AnalyzerConfig) {
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        let headings = [0.0, 0.0, 0.0, 180.0, 0.0];
        let facings: Vec<f64> = headings
            .iter()
            .enumerate()
            .filter_map(|(i, h)| analyzer.ingest(&full_frame(i as f64 * 0.1, Pose::new(0.0, 0.0, *h))))
            .map(|s| s.own.facing())
            .collect();
        assert_eq!(facings, vec![0.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[rstest]
    fn test_sustained_turn_is_accepted(config: AnalyzerConfig) {
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        let headings = [0.0, 0.0, 180.0, 180.0, 180.0];
        let facings: Vec<f64> = headings
            .iter()
            .enumerate()
            .filter_map(|(i, h)| analyzer.ingest(&full_frame(i as f64 * 0.1, Pose::new(0.0, 0.0, *h))))
            .map(|s| s.own.facing())
            .collect();
        // Only the first frame of the turn is held back
        assert_eq!(facings, vec![0.0, 0.0, 0.0, 180.0, 180.0]);
    }

    #[rstest]
    fn test_unseen_object_is_held_still(config: AnalyzerConfig) {
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        // Opponent drives 10 cm every 0.1 s towards the ball
        for i in 0..6 {
            let opponent = Pose::new(100.0 - i as f64 * 10.0, 0.0, 180.0);
            analyzer.ingest(&frame(
                i as f64 * 0.1,
                Some(Pose::new(-50.0, 0.0, 0.0)),
                Some(opponent),
                Some(Point::new(0.0, 0.0)),
            ));
        }

        let snapshot = analyzer
            .ingest(&frame(0.6, Some(Pose::new(-50.0, 0.0, 0.0)), None, Some(Point::new(0.0, 0.0))))
            .expect("last known opponent reused");
        assert!(!snapshot.staleness.opponent);
        assert_eq!(snapshot.opponent.position(), Point::new(50.0, 0.0));
        assert_eq!(snapshot.opponent.speed, 0.0);
        assert_eq!(snapshot.opponent.extrapolate(0.35), Point::new(50.0, 0.0));
    }

    #[rstest]
    fn test_missing_detections_become_stale(mut config: AnalyzerConfig) {
        config.max_stale_frames = 2;
        let mut analyzer = WorldAnalyzer::new(config, PitchGeometry::default(), 0);
        analyzer.ingest(&full_frame(0.0, Pose::new(0.0, 0.0, 0.0)));

        let without_ball = |t: f64| {
            frame(
                t,
                Some(Pose::new(0.0, 0.0, 0.0)),
                Some(Pose::new(100.0, 40.0, 180.0)),
                None,
            )
        };
        for i in 1..=2 {
            let snapshot = analyzer.ingest(&without_ball(i as f64 * 0.1)).expect("last known ball reused");
            assert!(!snapshot.staleness.ball);
            assert_eq!(snapshot.ball.position(), Point::new(0.0, 0.0));
        }
        let snapshot = analyzer.ingest(&without_ball(0.3)).expect("still produced");
        assert!(snapshot.staleness.ball);
        assert!(!snapshot.staleness.own);

        // A fresh detection clears the flag
        let snapshot = analyzer.ingest(&full_frame(0.4, Pose::new(0.0, 0.0, 0.0))).expect("snapshot");
        assert!(!snapshot.staleness.ball);
    }
}
