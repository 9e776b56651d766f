use image::GrayImage;
use kpb_core::{Descriptors, Keypoint, Match};
use std::collections::VecDeque;

/// One camera image and everything computed for it so far
#[derive(Debug, Clone)]
pub struct Frame {
    pub image: GrayImage,
    pub keypoints: Vec<Keypoint>,
    /// Row `i` describes `keypoints[i]` once set
    pub descriptors: Option<Descriptors>,
    /// Matches against the frame before this one; query = previous frame
    pub matches_to_prev: Vec<Match>,
}

impl Frame {
    pub fn new(image: GrayImage) -> Self {
        Self {
            image,
            keypoints: Vec::new(),
            descriptors: None,
            matches_to_prev: Vec::new(),
        }
    }
}

/// Bounded ring buffer of the most recent frames.
///
/// Pushing into a full buffer evicts the oldest frame in the same call, so
/// the length never exceeds the capacity.
#[derive(Debug)]
pub struct FrameBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
}

impl FrameBuffer {
    pub const DEFAULT_CAPACITY: usize = 2;

    /// A capacity of zero is raised to one
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append a frame, returning the evicted oldest frame when full
    pub fn push(&mut self, frame: Frame) -> Option<Frame> {
        let evicted = if self.frames.len() >= self.capacity {
            self.frames.pop_front()
        } else {
            None
        };
        self.frames.push_back(frame);
        evicted
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn latest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    pub fn latest_mut(&mut self) -> Option<&mut Frame> {
        self.frames.back_mut()
    }

    /// The newest frame mutably together with the one before it
    pub fn latest_pair_mut(&mut self) -> Option<(&Frame, &mut Frame)> {
        let n = self.frames.len();
        if n < 2 {
            return None;
        }
        let (older, newest) = self.frames.make_contiguous().split_at_mut(n - 1);
        Some((&older[n - 2], &mut newest[0]))
    }

    pub fn latest_pair(&self) -> Option<(&Frame, &Frame)> {
        let n = self.frames.len();
        Some((self.frames.get(n.checked_sub(2)?)?, self.frames.get(n - 1)?))
    }

    /// Oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Frame> + '_ {
        self.frames.iter()
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use proptest::prelude::*;

    fn frame(tag: u8) -> Frame {
        Frame::new(GrayImage::from_pixel(2, 2, Luma([tag])))
    }

    fn tag(f: &Frame) -> u8 {
        f.image.get_pixel(0, 0)[0]
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut buf = FrameBuffer::new(2);
        assert!(buf.push(frame(1)).is_none());
        assert!(buf.push(frame(2)).is_none());
        let evicted = buf.push(frame(3)).unwrap();
        assert_eq!(tag(&evicted), 1);
        assert_eq!(buf.iter().map(tag).collect::<Vec<_>>(), vec![2, 3]);
    }

    #[test]
    fn test_latest_pair() {
        let mut buf = FrameBuffer::default();
        buf.push(frame(1));
        assert!(buf.latest_pair_mut().is_none());
        buf.push(frame(2));
        let (prev, cur) = buf.latest_pair_mut().unwrap();
        assert_eq!((tag(prev), tag(cur)), (1, 2));
        cur.keypoints.push(Keypoint::new(0.0, 0.0, 1.0));
        assert_eq!(buf.latest().unwrap().keypoints.len(), 1);
    }

    #[test]
    fn test_zero_capacity_holds_one_frame() {
        let mut buf = FrameBuffer::new(0);
        buf.push(frame(1));
        buf.push(frame(2));
        assert_eq!(buf.len(), 1);
        assert_eq!(tag(buf.latest().unwrap()), 2);
    }

    proptest! {
        #[test]
        fn prop_length_never_exceeds_capacity(capacity in 1usize..6, pushes in 0usize..20) {
            let mut buf = FrameBuffer::new(capacity);
            for i in 0..pushes {
                buf.push(frame(i as u8));
                prop_assert!(buf.len() <= capacity);
            }
            prop_assert_eq!(buf.len(), pushes.min(capacity));
            let expected: Vec<u8> = (pushes.saturating_sub(capacity)..pushes).map(|i| i as u8).collect();
            prop_assert_eq!(buf.iter().map(tag).collect::<Vec<_>>(), expected);
        }
    }
}
