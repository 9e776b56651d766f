use crate::buffer::FrameBuffer;
use crate::config::BenchConfig;
use crate::error::BenchResult;
use crate::pipeline::{RunController, RunMetrics};
use crate::report::ReportSink;
use crate::roi::RegionFilter;
use crate::source::FrameSource;
use crate::visualize::MatchVisualizer;
use kpb_describe::DescriptorKind;
use kpb_detect::DetectorKind;

/// What happened to one detector/descriptor configuration
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Completed {
        detector: String,
        descriptor: String,
        metrics: RunMetrics,
    },
    /// Incompatible pair, nothing was processed
    Skipped {
        detector: String,
        descriptor: String,
        reason: String,
    },
    Failed {
        detector: String,
        descriptor: String,
        error: String,
    },
}

impl Outcome {
    pub fn detector(&self) -> &str {
        match self {
            Outcome::Completed { detector, .. }
            | Outcome::Skipped { detector, .. }
            | Outcome::Failed { detector, .. } => detector,
        }
    }

    pub fn descriptor(&self) -> &str {
        match self {
            Outcome::Completed { descriptor, .. }
            | Outcome::Skipped { descriptor, .. }
            | Outcome::Failed { descriptor, .. } => descriptor,
        }
    }

    pub fn metrics(&self) -> Option<&RunMetrics> {
        match self {
            Outcome::Completed { metrics, .. } => Some(metrics),
            _ => None,
        }
    }
}

/// Runs every configured descriptor against every configured detector.
///
/// Descriptors form the outer loop. A failing configuration is logged and
/// recorded; the remaining configurations still run.
pub struct Sweep<'a> {
    config: &'a BenchConfig,
    visualizer: Option<MatchVisualizer>,
}

impl<'a> Sweep<'a> {
    /// Takes the visualisation directory from `config`
    pub fn new(config: &'a BenchConfig) -> Self {
        Self {
            config,
            visualizer: config.visualize.as_ref().map(MatchVisualizer::new),
        }
    }

    pub fn run(&self, source: &dyn FrameSource, sink: &mut dyn ReportSink) -> Vec<Outcome> {
        let total = self.config.descriptors.len() * self.config.detectors.len();
        log::info!("sweep of {} configurations over {} frames", total, source.len());

        let mut outcomes = Vec::with_capacity(total);
        for descriptor in &self.config.descriptors {
            for detector in &self.config.detectors {
                let outcome = match self.run_pair(detector, descriptor, source, sink) {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        log::error!("{} + {} failed: {}", detector, descriptor, e);
                        Outcome::Failed {
                            detector: detector.clone(),
                            descriptor: descriptor.clone(),
                            error: e.to_string(),
                        }
                    }
                };
                outcomes.push(outcome);
            }
        }

        if let Err(e) = sink.flush() {
            log::error!("flushing report failed: {}", e);
        }
        let completed = outcomes.iter().filter(|o| o.metrics().is_some()).count();
        log::info!("sweep finished: {} of {} configurations completed", completed, total);
        outcomes
    }

    fn run_pair(
        &self,
        detector: &str,
        descriptor: &str,
        source: &dyn FrameSource,
        sink: &mut dyn ReportSink,
    ) -> BenchResult<Outcome> {
        let descriptor_kind: DescriptorKind = descriptor.parse()?;
        let detector_kind: DetectorKind = detector.parse()?;
        if !descriptor_kind.accepts(detector_kind) {
            let reason = format!(
                "{} descriptors need {} keypoints",
                descriptor_kind,
                descriptor_kind.required_detector().unwrap_or(detector_kind)
            );
            log::warn!("skipping {} + {}: {}", detector_kind, descriptor_kind, reason);
            return Ok(Outcome::Skipped {
                detector: detector_kind.to_string(),
                descriptor: descriptor_kind.to_string(),
                reason,
            });
        }

        let params = &self.config.detector_params;
        let detector_impl = detector_kind.build(params)?;
        let extractor = descriptor_kind.build(params)?;
        log::info!("running {} + {}", detector_kind, descriptor_kind);

        let mut run = RunController::new(
            detector_impl.as_ref(),
            extractor.as_ref(),
            FrameBuffer::new(self.config.buffer_size),
            RegionFilter::new(self.config.region()),
            self.config.matcher.clone(),
        );
        let (det_name, desc_name) = (detector_kind.as_str(), descriptor_kind.as_str());
        let metrics = match &self.visualizer {
            Some(vis) => run.run_with(source, |i, buffer| {
                if let Err(e) = vis.save(det_name, desc_name, i, buffer) {
                    log::warn!("{} + {}: frame {} not visualised: {}", det_name, desc_name, i, e);
                }
                Ok(())
            })?,
            None => run.run(source)?,
        };

        sink.record(det_name, desc_name, &metrics)?;
        log::info!(
            "{} + {}: {} frames, {} matches in total",
            det_name,
            desc_name,
            metrics.len(),
            metrics.total_matches()
        );
        Ok(Outcome::Completed {
            detector: det_name.to_string(),
            descriptor: desc_name.to_string(),
            metrics,
        })
    }
}

/// Convenience wrapper around [`Sweep`]
pub fn run_sweep(config: &BenchConfig, source: &dyn FrameSource, sink: &mut dyn ReportSink) -> Vec<Outcome> {
    Sweep::new(config).run(source, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use image::{GrayImage, Luma};

    #[derive(Default)]
    struct Recorder(Vec<(String, String, usize)>);

    impl ReportSink for Recorder {
        fn record(&mut self, detector: &str, descriptor: &str, metrics: &RunMetrics) -> BenchResult<()> {
            self.0.push((detector.into(), descriptor.into(), metrics.len()));
            Ok(())
        }
    }

    fn frames(n: usize) -> InMemorySource {
        InMemorySource::new(
            (0..n)
                .map(|i| GrayImage::from_fn(64, 64, |x, y| Luma([if (x + i as u32) / 8 % 2 == y / 8 % 2 { 40 } else { 200 }])))
                .collect(),
        )
    }

    fn config(detectors: &[&str], descriptors: &[&str]) -> BenchConfig {
        BenchConfig {
            detectors: detectors.iter().map(|s| s.to_string()).collect(),
            descriptors: descriptors.iter().map(|s| s.to_string()).collect(),
            filter_to_roi: false,
            ..BenchConfig::default()
        }
    }

    #[test]
    fn test_descriptor_is_the_outer_loop() {
        let cfg = config(&["FAST", "HARRIS"], &["BRIEF", "ORB"]);
        let mut sink = Recorder::default();
        let outcomes = run_sweep(&cfg, &frames(2), &mut sink);
        let order: Vec<(&str, &str)> = outcomes.iter().map(|o| (o.detector(), o.descriptor())).collect();
        assert_eq!(
            order,
            vec![("FAST", "BRIEF"), ("HARRIS", "BRIEF"), ("FAST", "ORB"), ("HARRIS", "ORB")]
        );
        assert_eq!(sink.0.len(), 4);
        assert!(sink.0.iter().all(|(_, _, rows)| *rows == 2));
    }

    #[test]
    fn test_unknown_names_fail_without_stopping() {
        let cfg = config(&["XYZ", "FAST"], &["BRIEF", "NOPE"]);
        let mut sink = Recorder::default();
        let outcomes = run_sweep(&cfg, &frames(2), &mut sink);
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(&outcomes[0], Outcome::Failed { error, .. } if error.contains("unsupported detector type")));
        assert!(outcomes[1].metrics().is_some());
        assert!(matches!(&outcomes[2], Outcome::Failed { error, .. } if error.contains("unsupported descriptor type")));
        assert_eq!(sink.0.len(), 1);
    }

    #[test]
    fn test_first_frame_never_matches() {
        let cfg = config(&["FAST", "HARRIS", "SHITOMASI"], &["BRIEF", "ORB", "BRISK"]);
        let mut sink = Recorder::default();
        let outcomes = run_sweep(&cfg, &frames(3), &mut sink);
        assert_eq!(outcomes.len(), 9);
        for outcome in &outcomes {
            let metrics = outcome.metrics().unwrap_or_else(|| panic!("{:?} did not complete", outcome));
            assert_eq!(metrics.len(), 3);
            assert_eq!(metrics.match_counts[0], 0, "{} + {}", outcome.detector(), outcome.descriptor());
        }
    }

    #[test]
    fn test_unwritable_visualisation_dir_only_warns() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not_a_dir");
        std::fs::write(&blocker, b"x").unwrap();
        let mut cfg = config(&["HARRIS"], &["BRIEF"]);
        cfg.visualize = Some(blocker.join("vis"));

        let mut sink = Recorder::default();
        let outcomes = run_sweep(&cfg, &frames(3), &mut sink);
        assert!(matches!(&outcomes[0], Outcome::Completed { metrics, .. } if metrics.len() == 3));
        assert_eq!(sink.0, vec![("HARRIS".to_string(), "BRIEF".to_string(), 3)]);
        assert!(!blocker.join("vis").exists());
    }

    #[test]
    fn test_akaze_descriptor_skips_foreign_keypoints() {
        let cfg = config(&["FAST"], &["AKAZE"]);
        let mut sink = Recorder::default();
        let outcomes = run_sweep(&cfg, &frames(2), &mut sink);
        assert!(matches!(&outcomes[0], Outcome::Skipped { detector, .. } if detector == "FAST"));
        assert!(sink.0.is_empty());
    }
}
