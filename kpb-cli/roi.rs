use kpb_core::{Keypoint, Rect};

/// Region around the preceding vehicle in the KITTI sequence
pub const VEHICLE_RECT: Rect = Rect::new(535, 180, 180, 150);

/// Keeps keypoints inside a rectangle (edges inclusive), or everything when
/// no rectangle is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RegionFilter {
    rect: Option<Rect>,
}

impl RegionFilter {
    pub fn new(rect: Option<Rect>) -> Self {
        Self { rect }
    }

    pub fn disabled() -> Self {
        Self { rect: None }
    }

    pub fn rect(&self) -> Option<Rect> {
        self.rect
    }

    /// Order-preserving filter
    pub fn apply(&self, keypoints: Vec<Keypoint>) -> Vec<Keypoint> {
        match self.rect {
            Some(rect) => keypoints.into_iter().filter(|kp| rect.contains(kp.x, kp.y)).collect(),
            None => keypoints,
        }
    }
}

impl Default for RegionFilter {
    fn default() -> Self {
        Self::new(Some(VEHICLE_RECT))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_default_rect_edges() {
        let filter = RegionFilter::default();
        let kps = vec![
            Keypoint::new(535.0, 180.0, 7.0),
            Keypoint::new(715.0, 330.0, 7.0),
            Keypoint::new(534.0, 200.0, 7.0),
            Keypoint::new(600.0, 331.0, 7.0),
        ];
        let kept = filter.apply(kps);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[1].x, 715.0);
    }

    #[test]
    fn test_disabled_keeps_everything() {
        let kps = vec![Keypoint::new(-5.0, 1e4, 7.0)];
        assert_eq!(RegionFilter::disabled().apply(kps.clone()), kps);
    }

    proptest! {
        #[test]
        fn prop_kept_points_are_inside(points in prop::collection::vec((0.0f32..1000.0, 0.0f32..500.0), 0..50)) {
            let kps: Vec<Keypoint> = points.iter().map(|&(x, y)| Keypoint::new(x, y, 7.0)).collect();
            let kept = RegionFilter::default().apply(kps.clone());
            for kp in &kept {
                prop_assert!(kp.x >= 535.0 && kp.x <= 715.0 && kp.y >= 180.0 && kp.y <= 330.0);
            }
            let expected: Vec<Keypoint> = kps.into_iter().filter(|kp| VEHICLE_RECT.contains(kp.x, kp.y)).collect();
            prop_assert_eq!(kept, expected);
        }
    }
}
