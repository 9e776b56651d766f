use crate::types::FloatImage;
use image::GrayImage;
use kpb_core::Keypoint;

/// Post-processing shared by the detectors: suppression, ranking,
/// orientation and subpixel refinement.
pub struct KeypointRefinement;

impl KeypointRefinement {
    /// Refine a response-map peak to subpixel accuracy with a quadratic fit
    /// over its 3x3 neighbourhood. Returns the (dx, dy) offset in [-0.5, 0.5].
    pub fn subpixel_offset(map: &FloatImage, x: usize, y: usize) -> (f32, f32) {
        if x < 1 || y < 1 || x + 1 >= map.width || y + 1 >= map.height {
            return (0.0, 0.0);
        }
        let dx = (map.get(x + 1, y) - map.get(x - 1, y)) / 2.0;
        let dy = (map.get(x, y + 1) - map.get(x, y - 1)) / 2.0;
        let dxx = map.get(x + 1, y) - 2.0 * map.get(x, y) + map.get(x - 1, y);
        let dyy = map.get(x, y + 1) - 2.0 * map.get(x, y) + map.get(x, y - 1);
        let dxy = (map.get(x + 1, y + 1) - map.get(x - 1, y + 1) - map.get(x + 1, y - 1)
            + map.get(x - 1, y - 1))
            / 4.0;

        let det = dxx * dyy - dxy * dxy;
        if det.abs() < 1e-6 {
            return (0.0, 0.0);
        }
        let offset_x = -(dyy * dx - dxy * dy) / det;
        let offset_y = -(dxx * dy - dxy * dx) / det;
        (offset_x.clamp(-0.5, 0.5), offset_y.clamp(-0.5, 0.5))
    }

    /// Orientation by the intensity centroid of a circular patch of
    /// diameter `patch_size` centred on (x, y).
    pub fn intensity_centroid_angle(img: &GrayImage, x: f32, y: f32, patch_size: usize) -> f32 {
        let half = (patch_size / 2) as i32;
        let (w, h) = (img.width() as i32, img.height() as i32);
        let (cx, cy) = (x.round() as i32, y.round() as i32);
        let raw = img.as_raw();
        let mut m10 = 0i64;
        let mut m01 = 0i64;
        for dy in -half..=half {
            // chord of the disc at this row
            let span = (((half * half - dy * dy) as f32).sqrt()) as i32;
            let py = (cy + dy).clamp(0, h - 1);
            for dx in -span..=span {
                let px = (cx + dx).clamp(0, w - 1);
                let v = raw[(py * w + px) as usize] as i64;
                m10 += dx as i64 * v;
                m01 += dy as i64 * v;
            }
        }
        if m10 == 0 && m01 == 0 {
            0.0
        } else {
            (m01 as f32).atan2(m10 as f32)
        }
    }

    /// Greedy radius suppression: strongest first, a candidate closer than
    /// `min_distance` to any kept keypoint is dropped.
    pub fn non_maximum_suppression(keypoints: &[Keypoint], min_distance: f32) -> Vec<Keypoint> {
        if keypoints.is_empty() {
            return Vec::new();
        }

        let mut sorted_keypoints = keypoints.to_vec();
        sorted_keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));

        let mut kept: Vec<Keypoint> = Vec::new();
        let min_distance_sq = min_distance * min_distance;

        for candidate in sorted_keypoints {
            let is_local_max = kept.iter().all(|existing| {
                let dx = candidate.x - existing.x;
                let dy = candidate.y - existing.y;
                dx * dx + dy * dy >= min_distance_sq
            });
            if is_local_max {
                kept.push(candidate);
            }
        }
        kept
    }

    /// Area overlap of the two keypoint discs relative to their union,
    /// 0 when disjoint and the area ratio when one contains the other.
    pub fn overlap(a: &Keypoint, b: &Keypoint) -> f32 {
        let ra = a.size * 0.5;
        let rb = b.size * 0.5;
        let (ra2, rb2) = (ra * ra, rb * rb);
        let c = ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt();

        if ra.min(rb) + c <= ra.max(rb) {
            return ra2.min(rb2) / ra2.max(rb2);
        }
        if c >= ra + rb {
            return 0.0;
        }
        let c2 = c * c;
        let cos_alpha = ((rb2 + c2 - ra2) / (b.size * c)).clamp(-1.0, 1.0);
        let cos_beta = ((ra2 + c2 - rb2) / (a.size * c)).clamp(-1.0, 1.0);
        let alpha = cos_alpha.acos();
        let beta = cos_beta.acos();

        let segment_a = ra2 * beta;
        let segment_b = rb2 * alpha;
        let triangle_a = ra2 * beta.sin() * cos_beta;
        let triangle_b = rb2 * alpha.sin() * cos_alpha;
        let intersection = segment_a + segment_b - triangle_a - triangle_b;
        let union = (ra2 + rb2) * std::f32::consts::PI - intersection;
        intersection / union
    }

    /// Incremental overlap suppression in scan order. A keypoint that
    /// overlaps a kept one by more than `max_overlap` replaces it only when
    /// its response is higher.
    pub fn overlap_suppression(candidates: Vec<Keypoint>, max_overlap: f32) -> Vec<Keypoint> {
        let mut kept: Vec<Keypoint> = Vec::new();
        for candidate in candidates {
            let mut overlapped = false;
            for existing in kept.iter_mut() {
                if Self::overlap(&candidate, existing) > max_overlap {
                    overlapped = true;
                    if candidate.response > existing.response {
                        *existing = candidate;
                        break;
                    }
                }
            }
            if !overlapped {
                kept.push(candidate);
            }
        }
        kept
    }

    /// Keeps the `n` strongest keypoints, stable for equal responses.
    pub fn retain_best(keypoints: &mut Vec<Keypoint>, n: usize) {
        if keypoints.len() <= n {
            return;
        }
        keypoints.sort_by(|a, b| b.response.total_cmp(&a.response));
        keypoints.truncate(n);
    }

    /// Drops keypoints within `border` pixels of the image edge.
    pub fn remove_border(keypoints: &mut Vec<Keypoint>, width: u32, height: u32, border: f32) {
        let (w, h) = (width as f32, height as f32);
        keypoints.retain(|kp| kp.x >= border && kp.y >= border && kp.x < w - border && kp.y < h - border);
    }
}
