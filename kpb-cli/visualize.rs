use crate::buffer::{Frame, FrameBuffer};
use crate::error::BenchResult;
use image::imageops;
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_circle_mut, draw_line_segment_mut};
use std::path::{Path, PathBuf};

const KEYPOINT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const MATCH_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

/// Writes the previous and current frame side by side with their keypoints
/// and the matches between them.
#[derive(Debug, Clone)]
pub struct MatchVisualizer {
    dir: PathBuf,
}

impl MatchVisualizer {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Previous frame on the left, current frame on the right
    pub fn render(prev: &Frame, cur: &Frame) -> RgbImage {
        let (pw, ph) = prev.image.dimensions();
        let (cw, ch) = cur.image.dimensions();
        let mut canvas = RgbImage::new(pw + cw, ph.max(ch));
        let left = image::DynamicImage::ImageLuma8(prev.image.clone()).to_rgb8();
        let right = image::DynamicImage::ImageLuma8(cur.image.clone()).to_rgb8();
        imageops::replace(&mut canvas, &left, 0, 0);
        imageops::replace(&mut canvas, &right, pw as i64, 0);

        let offset = pw as f32;
        for kp in &prev.keypoints {
            draw_hollow_circle_mut(&mut canvas, (kp.x as i32, kp.y as i32), radius(kp.size), KEYPOINT_COLOR);
        }
        for kp in &cur.keypoints {
            draw_hollow_circle_mut(
                &mut canvas,
                ((kp.x + offset) as i32, kp.y as i32),
                radius(kp.size),
                KEYPOINT_COLOR,
            );
        }
        for m in &cur.matches_to_prev {
            let (Some(a), Some(b)) = (prev.keypoints.get(m.query_idx), cur.keypoints.get(m.train_idx)) else {
                continue;
            };
            draw_line_segment_mut(&mut canvas, (a.x, a.y), (b.x + offset, b.y), MATCH_COLOR);
        }
        canvas
    }

    /// Save the newest frame pair of `buffer`, if there is one.
    pub fn save(
        &self,
        detector: &str,
        descriptor: &str,
        index: usize,
        buffer: &FrameBuffer,
    ) -> BenchResult<Option<PathBuf>> {
        let Some((prev, cur)) = buffer.latest_pair() else {
            return Ok(None);
        };
        std::fs::create_dir_all(&self.dir)?;
        let path = self
            .dir
            .join(format!("{}_{}_{:04}.png", detector, descriptor, index));
        Self::render(prev, cur)
            .save(&path)
            .map_err(std::io::Error::other)?;
        log::debug!("wrote {}", path.display());
        Ok(Some(path))
    }
}

fn radius(size: f32) -> i32 {
    ((size / 2.0).round() as i32).max(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};
    use kpb_core::{Keypoint, Match};

    fn frame(width: u32) -> Frame {
        let mut f = Frame::new(GrayImage::from_pixel(width, 20, Luma([0])));
        f.keypoints = vec![Keypoint::new(5.0, 10.0, 4.0)];
        f
    }

    #[test]
    fn test_render_places_frames_side_by_side() {
        let prev = frame(30);
        let mut cur = frame(40);
        cur.matches_to_prev = vec![Match { query_idx: 0, train_idx: 0, distance: 0.0 }];
        let img = MatchVisualizer::render(&prev, &cur);
        assert_eq!(img.dimensions(), (70, 20));
        // midpoint of the match line between (5,10) and (35,10)
        assert_eq!(*img.get_pixel(20, 10), MATCH_COLOR);
    }

    #[test]
    fn test_save_needs_two_frames() {
        let dir = tempfile::tempdir().unwrap();
        let vis = MatchVisualizer::new(dir.path().join("vis"));
        let mut buffer = FrameBuffer::new(2);
        buffer.push(frame(30));
        assert!(vis.save("FAST", "BRIEF", 0, &buffer).unwrap().is_none());
        buffer.push(frame(30));
        let path = vis.save("FAST", "BRIEF", 1, &buffer).unwrap().unwrap();
        assert!(path.ends_with("FAST_BRIEF_0001.png"));
        assert_eq!(image::open(&path).unwrap().width(), 60);
    }
}
