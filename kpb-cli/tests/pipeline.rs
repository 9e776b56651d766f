use image::{GrayImage, Luma};
use kpb_cli::{
    BenchConfig, CSV_HEADER, CsvReport, FrameBuffer, ImageSequence, InMemorySource, Outcome, RegionFilter,
    ReportSink, RunController, run_sweep,
};
use kpb_core::{DescriptorMatrix, Descriptors, DistanceMetric, Keypoint, Rect};
use kpb_describe::{DescribeResult, DescriptorExtractor, DescriptorKind};
use kpb_detect::{DetectResult, DetectorKind, DetectorParams, KeypointDetector};
use kpb_match::MatcherConfig;

/// Six bright squares spread over the width of a 160x120 frame, three in
/// each half, drifting right by up to two pixels.
fn scene(i: usize) -> GrayImage {
    let dx = (i % 3) as u32;
    let mut img = GrayImage::from_pixel(160, 120, Luma([30]));
    for k in 0..6u32 {
        let (cx, cy) = (12 + k * 24 + dx, 30 + (k % 3) * 25);
        for y in cy..cy + 8 {
            for x in cx..cx + 8 {
                img.put_pixel(x, y, Luma([220]));
            }
        }
    }
    img
}

fn sequence(n: usize) -> InMemorySource {
    InMemorySource::new((0..n).map(scene).collect())
}

fn only(detector: &str, descriptor: &str) -> BenchConfig {
    BenchConfig {
        detectors: vec![detector.to_string()],
        descriptors: vec![descriptor.to_string()],
        filter_to_roi: false,
        ..BenchConfig::default()
    }
}

/// 100 keypoints on a line, the first 50 left of x = 50
struct LineDetector;

impl KeypointDetector for LineDetector {
    fn name(&self) -> &'static str {
        "LINE"
    }

    fn detect_keypoints(&self, _img: &GrayImage) -> DetectResult<Vec<Keypoint>> {
        Ok((0..100).map(|i| Keypoint::new(i as f32, 10.0, 7.0)).collect())
    }
}

/// 32-byte rows derived from the keypoint position and the frame brightness
struct HashExtractor;

impl DescriptorExtractor for HashExtractor {
    fn name(&self) -> &'static str {
        "HASH"
    }

    fn metric(&self) -> DistanceMetric {
        DistanceMetric::Hamming
    }

    fn compute(&self, keypoints: &[Keypoint], img: &GrayImage) -> DescribeResult<Descriptors> {
        let shade = img.get_pixel(0, 0)[0] as u64;
        let mut rows = DescriptorMatrix::with_capacity(32, keypoints.len());
        for kp in keypoints {
            let mut s = (kp.x as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15) ^ shade;
            let row: Vec<u8> = (0..32)
                .map(|_| {
                    s ^= s << 13;
                    s ^= s >> 7;
                    s ^= s << 17;
                    s as u8
                })
                .collect();
            rows.push_row(&row);
        }
        Ok(Descriptors::Binary(rows))
    }
}

#[test]
fn ten_frames_of_fifty_filtered_rows() {
    let source = InMemorySource::new((0..10).map(|i| GrayImage::from_pixel(8, 8, Luma([i as u8 % 2]))).collect());
    let mut run = RunController::new(
        &LineDetector,
        &HashExtractor,
        FrameBuffer::default(),
        RegionFilter::new(Some(Rect::new(0, 0, 49, 20))),
        MatcherConfig::default(),
    );
    let metrics = run.run(&source).unwrap();

    assert_eq!(metrics.len(), 10);
    assert_eq!(metrics.match_counts.len(), 10);
    assert_eq!(metrics.match_counts[0], 0);
    assert!(metrics.keypoint_counts.iter().all(|&n| n == 50));
    for i in 1..10 {
        assert!(metrics.match_counts[i] <= metrics.keypoint_counts[i]);
    }
    let frame = run.buffer().latest().unwrap();
    assert_eq!(frame.descriptors.as_ref().unwrap().rows(), 50);
    assert!(frame.matches_to_prev.iter().all(|m| m.query_idx < 50 && m.train_idx < 50));
}

#[test]
fn region_filter_halves_keypoints_over_ten_frames() {
    let params = DetectorParams::default();
    let detector = DetectorKind::Fast.build(&params).unwrap();
    let extractor = DescriptorKind::Brief.build(&params).unwrap();
    let source = sequence(10);

    let mut full = RunController::new(
        detector.as_ref(),
        extractor.as_ref(),
        FrameBuffer::default(),
        RegionFilter::disabled(),
        MatcherConfig::default(),
    );
    let all = full.run(&source).unwrap();

    let mut left = RunController::new(
        detector.as_ref(),
        extractor.as_ref(),
        FrameBuffer::default(),
        RegionFilter::new(Some(Rect::new(0, 0, 80, 120))),
        MatcherConfig::default(),
    );
    let metrics = left.run(&source).unwrap();

    assert_eq!(metrics.len(), 10);
    assert_eq!(metrics.match_counts[0], 0);
    for i in 0..10 {
        assert!(metrics.keypoint_counts[i] > 0);
        assert!(metrics.keypoint_counts[i] < all.keypoint_counts[i]);
        assert!(metrics.match_counts[i] <= metrics.keypoint_counts[i]);
        assert!(metrics.match_counts[i] <= metrics.keypoint_counts[i.saturating_sub(1)]);
    }
    let cur = left.buffer().latest().unwrap();
    assert_eq!(cur.descriptors.as_ref().unwrap().cols(), 32);
    assert!(cur.keypoints.iter().all(|kp| kp.x <= 80.0));
}

#[test]
fn unknown_detector_fails_and_sweep_continues() {
    let cfg = BenchConfig {
        detectors: vec!["XYZ".into(), "FAST".into()],
        ..only("FAST", "ORB")
    };
    let mut report = CsvReport::new(Vec::new()).unwrap();
    let outcomes = run_sweep(&cfg, &sequence(3), &mut report);

    match &outcomes[0] {
        Outcome::Failed { detector, error, .. } => {
            assert_eq!(detector, "XYZ");
            assert!(error.contains("unsupported detector type"));
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(outcomes[1].metrics().map(|m| m.len()), Some(3));

    let text = String::from_utf8(report.into_inner()).unwrap();
    assert_eq!(text.lines().count(), 1 + 3);
    assert!(text.lines().skip(1).all(|l| l.starts_with("FAST,ORB,")));
}

#[test]
fn akaze_descriptor_with_fast_keypoints_is_skipped() {
    let mut report = CsvReport::new(Vec::new()).unwrap();
    let outcomes = run_sweep(&only("FAST", "AKAZE"), &sequence(3), &mut report);
    assert_eq!(outcomes.len(), 1);
    assert!(matches!(&outcomes[0], Outcome::Skipped { descriptor, .. } if descriptor == "AKAZE"));
    assert!(outcomes[0].metrics().is_none());
    let text = String::from_utf8(report.into_inner()).unwrap();
    assert_eq!(text.lines().collect::<Vec<_>>(), vec![CSV_HEADER]);
}

#[test]
fn sweep_reads_numbered_files_and_appends_csv() {
    let dir = tempfile::tempdir().unwrap();
    for i in 0..4 {
        scene(i).save(dir.path().join(format!("frame_{:03}.png", i))).unwrap();
    }
    let mut cfg = only("HARRIS", "BRISK");
    cfg.source = ImageSequence {
        base_path: dir.path().to_path_buf(),
        prefix: "frame_".into(),
        start_index: 0,
        end_index: 3,
        fill_width: 3,
        extension: ".png".into(),
    };
    cfg.output = dir.path().join("experiment.csv");
    cfg.visualize = Some(dir.path().join("vis"));

    for _ in 0..2 {
        let mut report = CsvReport::append(&cfg.output).unwrap();
        let outcomes = run_sweep(&cfg, &cfg.source, &mut report);
        assert!(outcomes[0].metrics().is_some());
        report.flush().unwrap();
    }

    let text = std::fs::read_to_string(&cfg.output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2 * (1 + 4));
    assert_eq!(lines[5], CSV_HEADER);
    assert!(lines[1].starts_with("HARRIS,BRISK,0,"));
    assert!(lines[4].starts_with("HARRIS,BRISK,3,"));
    // one image per frame after the first
    assert_eq!(std::fs::read_dir(dir.path().join("vis")).unwrap().count(), 3);
}

#[test]
fn missing_images_fail_the_configuration() {
    let mut cfg = only("FAST", "BRIEF");
    cfg.source.base_path = "/nonexistent/kpbench".into();
    let mut report = CsvReport::new(Vec::new()).unwrap();
    let outcomes = run_sweep(&cfg, &cfg.source, &mut report);
    assert!(matches!(&outcomes[0], Outcome::Failed { error, .. } if error.contains("cannot load")));
}
