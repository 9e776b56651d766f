use crate::buffer::{Frame, FrameBuffer};
use crate::error::BenchResult;
use crate::roi::RegionFilter;
use crate::source::FrameSource;
use image::GrayImage;
use kpb_describe::DescriptorExtractor;
use kpb_detect::KeypointDetector;
use kpb_match::{MatcherConfig, match_descriptors};

/// Counts and timings of one processed frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameMetrics {
    pub keypoints: usize,
    pub matches: usize,
    /// Seconds spent in detection
    pub detect_time: f64,
    /// Seconds spent in description
    pub describe_time: f64,
}

/// Per-frame series of one run, indexed by frame position
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunMetrics {
    pub keypoint_counts: Vec<usize>,
    pub match_counts: Vec<usize>,
    pub detect_times: Vec<f64>,
    pub describe_times: Vec<f64>,
}

impl RunMetrics {
    pub fn push(&mut self, m: FrameMetrics) {
        self.keypoint_counts.push(m.keypoints);
        self.match_counts.push(m.matches);
        self.detect_times.push(m.detect_time);
        self.describe_times.push(m.describe_time);
    }

    pub fn len(&self) -> usize {
        self.keypoint_counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keypoint_counts.is_empty()
    }

    pub fn frame(&self, i: usize) -> Option<FrameMetrics> {
        Some(FrameMetrics {
            keypoints: *self.keypoint_counts.get(i)?,
            matches: *self.match_counts.get(i)?,
            detect_time: *self.detect_times.get(i)?,
            describe_time: *self.describe_times.get(i)?,
        })
    }

    pub fn total_matches(&self) -> usize {
        self.match_counts.iter().sum()
    }
}

/// Runs detect, filter, describe and match for one detector/descriptor
/// pair over a stream of frames.
pub struct RunController<'a> {
    detector: &'a dyn KeypointDetector,
    extractor: &'a dyn DescriptorExtractor,
    buffer: FrameBuffer,
    region: RegionFilter,
    matcher: MatcherConfig,
}

impl<'a> RunController<'a> {
    pub fn new(
        detector: &'a dyn KeypointDetector,
        extractor: &'a dyn DescriptorExtractor,
        buffer: FrameBuffer,
        region: RegionFilter,
        matcher: MatcherConfig,
    ) -> Self {
        Self {
            detector,
            extractor,
            buffer,
            region,
            matcher,
        }
    }

    pub fn buffer(&self) -> &FrameBuffer {
        &self.buffer
    }

    /// Process the next image of the sequence
    pub fn process_frame(&mut self, image: GrayImage) -> BenchResult<FrameMetrics> {
        self.buffer.push(Frame::new(image));
        let Some(frame) = self.buffer.latest_mut() else {
            unreachable!("buffer holds the frame just pushed");
        };

        let (keypoints, detect_time) = self.detector.detect(&frame.image)?;
        frame.keypoints = self.region.apply(keypoints);

        let (descriptors, describe_time) = self.extractor.describe(&frame.keypoints, &frame.image)?;
        frame.descriptors = Some(descriptors);
        let keypoints = frame.keypoints.len();

        let mut matches = 0;
        if let Some((prev, cur)) = self.buffer.latest_pair_mut() {
            if let (Some(prev_desc), Some(cur_desc)) = (&prev.descriptors, &cur.descriptors) {
                cur.matches_to_prev =
                    match_descriptors(&prev.keypoints, &cur.keypoints, prev_desc, cur_desc, &self.matcher)?;
                matches = cur.matches_to_prev.len();
            }
        }

        let metrics = FrameMetrics {
            keypoints,
            matches,
            detect_time,
            describe_time,
        };
        log::debug!(
            "{}/{}: {} keypoints, {} matches, detect {:.6}s, describe {:.6}s",
            self.detector.name(),
            self.extractor.name(),
            metrics.keypoints,
            metrics.matches,
            metrics.detect_time,
            metrics.describe_time
        );
        Ok(metrics)
    }

    /// Process every frame of `source` in order.
    ///
    /// `on_frame` sees the buffer after each frame, e.g. to render matches.
    pub fn run_with<S, F>(&mut self, source: &S, mut on_frame: F) -> BenchResult<RunMetrics>
    where
        S: FrameSource + ?Sized,
        F: FnMut(usize, &FrameBuffer) -> BenchResult<()>,
    {
        let mut metrics = RunMetrics::default();
        for i in 0..source.len() {
            let image = source.frame(i)?;
            metrics.push(self.process_frame(image)?);
            on_frame(i, &self.buffer)?;
        }
        Ok(metrics)
    }

    pub fn run<S: FrameSource + ?Sized>(&mut self, source: &S) -> BenchResult<RunMetrics> {
        self.run_with(source, |_, _| Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::InMemorySource;
    use image::Luma;
    use kpb_describe::DescriptorKind;
    use kpb_detect::{DetectorKind, DetectorParams};
    use kpb_match::SelectorKind;

    /// Bright squares on a dark background, shifted by `dx` pixels
    fn squares(dx: u32) -> GrayImage {
        let mut img = GrayImage::from_pixel(160, 120, Luma([30]));
        for i in 0..6u32 {
            let (cx, cy) = (20 + i * 22 + dx, 30 + (i % 3) * 25);
            for y in cy..cy + 8 {
                for x in cx..cx + 8 {
                    img.put_pixel(x, y, Luma([220]));
                }
            }
        }
        img
    }

    #[test]
    fn test_first_frame_has_no_matches() {
        let params = DetectorParams::default();
        let detector = DetectorKind::Fast.build(&params).unwrap();
        let extractor = DescriptorKind::Brief.build(&params).unwrap();
        let mut run = RunController::new(
            detector.as_ref(),
            extractor.as_ref(),
            FrameBuffer::default(),
            RegionFilter::disabled(),
            MatcherConfig {
                selector: SelectorKind::NearestNeighbor,
                ..MatcherConfig::default()
            },
        );
        let first = run.process_frame(squares(0)).unwrap();
        assert!(first.keypoints > 0);
        assert_eq!(first.matches, 0);
        let second = run.process_frame(squares(1)).unwrap();
        // one nearest neighbour per keypoint of the previous frame
        assert_eq!(second.matches, first.keypoints);
        assert_eq!(run.buffer().len(), 2);
        let cur = run.buffer().latest().unwrap();
        assert!(cur.matches_to_prev.iter().all(|m| m.train_idx < second.keypoints));
    }

    #[test]
    fn test_run_length_equals_frame_count() {
        let params = DetectorParams::default();
        let detector = DetectorKind::Harris.build(&params).unwrap();
        let extractor = DescriptorKind::Orb.build(&params).unwrap();
        let source = InMemorySource::new((0..4).map(squares).collect());
        let mut run = RunController::new(
            detector.as_ref(),
            extractor.as_ref(),
            FrameBuffer::new(2),
            RegionFilter::disabled(),
            MatcherConfig::default(),
        );
        let metrics = run.run(&source).unwrap();
        assert_eq!(metrics.len(), 4);
        assert_eq!(metrics.match_counts[0], 0);
        assert_eq!(metrics.frame(3).unwrap().keypoints, metrics.keypoint_counts[3]);
        assert!(metrics.frame(4).is_none());
    }
}
