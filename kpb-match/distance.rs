use bitarray::BitArray;

/// Hamming distance between equally long bit strings. The common 32 and
/// 64 byte widths go through [`BitArray`].
fn hamming(a: &[u8], b: &[u8]) -> u32 {
    if let (Ok(a), Ok(b)) = (<[u8; 32]>::try_from(a), <[u8; 32]>::try_from(b)) {
        return BitArray::new(a).distance(&BitArray::new(b));
    }
    if let (Ok(a), Ok(b)) = (<[u8; 64]>::try_from(a), <[u8; 64]>::try_from(b)) {
        return BitArray::new(a).distance(&BitArray::new(b));
    }
    a.iter().zip(b).map(|(x, y)| (x ^ y).count_ones()).sum()
}

/// Element type of a descriptor row and the distance it implies.
///
/// `u8` rows are bit strings compared by Hamming distance, `f32` rows are
/// vectors compared by Euclidean distance.
pub trait DescriptorElement: Copy + Default + Send + Sync + 'static {
    fn distance(a: &[Self], b: &[Self]) -> f32;

    /// Appends the row as coordinates of a point whose squared Euclidean
    /// distance relates to [`distance`](Self::distance) through
    /// [`from_squared`](Self::from_squared).
    fn expand(row: &[Self], out: &mut Vec<f32>);

    /// Converts a squared Euclidean distance between expanded points into
    /// this element's distance.
    fn from_squared(sq: f32) -> f32;
}

impl DescriptorElement for u8 {
    #[inline]
    fn distance(a: &[u8], b: &[u8]) -> f32 {
        hamming(a, b) as f32
    }

    fn expand(row: &[u8], out: &mut Vec<f32>) {
        for byte in row {
            for bit in 0..8 {
                out.push(((byte >> bit) & 1) as f32);
            }
        }
    }

    /// For 0/1 coordinates the squared distance is the Hamming distance
    #[inline]
    fn from_squared(sq: f32) -> f32 {
        sq
    }
}

impl DescriptorElement for f32 {
    #[inline]
    fn distance(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum::<f32>().sqrt()
    }

    fn expand(row: &[f32], out: &mut Vec<f32>) {
        out.extend_from_slice(row);
    }

    #[inline]
    fn from_squared(sq: f32) -> f32 {
        sq.sqrt()
    }
}

/// Neighbour candidate ordered by distance, then by training index
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Candidate {
    pub distance: f32,
    pub index: usize,
}

impl Candidate {
    #[inline]
    fn precedes(&self, other: &Candidate) -> bool {
        self.distance
            .total_cmp(&other.distance)
            .then(self.index.cmp(&other.index))
            .is_lt()
    }
}

/// The `k` best candidates seen so far, kept sorted
pub(crate) struct Neighbors {
    k: usize,
    best: Vec<Candidate>,
}

impl Neighbors {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            best: Vec::with_capacity(k + 1),
        }
    }

    #[inline]
    pub fn offer(&mut self, c: Candidate) {
        if self.best.len() == self.k && !c.precedes(&self.best[self.k - 1]) {
            return;
        }
        let pos = self.best.iter().position(|b| c.precedes(b)).unwrap_or(self.best.len());
        self.best.insert(pos, c);
        self.best.truncate(self.k);
    }

    /// Distance a new candidate must not exceed to be kept
    pub fn worst(&self) -> Option<f32> {
        (self.best.len() == self.k).then(|| self.best[self.k - 1].distance)
    }

    pub fn into_vec(self) -> Vec<Candidate> {
        self.best
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_counts_differing_bits() {
        assert_eq!(u8::distance(&[0b1010_1010, 0xFF], &[0b0101_0101, 0xFF]), 8.0);
        assert_eq!(u8::distance(&[7], &[7]), 0.0);
        let (a, mut b) = ([0xAAu8; 32], [0xAAu8; 32]);
        b[31] = 0x55;
        assert_eq!(u8::distance(&a, &b), 8.0);
        let (a, b) = ([0u8; 64], [0xFFu8; 64]);
        assert_eq!(u8::distance(&a, &b), 512.0);
        let (a, b) = ([0u8; 61], [1u8; 61]);
        assert_eq!(u8::distance(&a, &b), 61.0);
    }

    #[test]
    fn test_expanded_bits_square_to_hamming() {
        let (a, b) = ([0b1100_0011u8, 0x0F], [0b0000_0011u8, 0xF0]);
        let (mut pa, mut pb) = (Vec::new(), Vec::new());
        u8::expand(&a, &mut pa);
        u8::expand(&b, &mut pb);
        let sq: f32 = pa.iter().zip(&pb).map(|(x, y)| (x - y) * (x - y)).sum();
        assert_eq!(u8::from_squared(sq), u8::distance(&a, &b));
    }

    #[test]
    fn test_euclidean() {
        assert_eq!(f32::distance(&[0.0, 3.0], &[4.0, 0.0]), 5.0);
    }

    #[test]
    fn test_neighbors_break_ties_by_index() {
        let mut n = Neighbors::new(2);
        for (index, distance) in [(0, 5.0), (1, 3.0), (2, 3.0), (3, 1.0), (4, 1.0)] {
            n.offer(Candidate { distance, index });
        }
        let best: Vec<usize> = n.into_vec().iter().map(|c| c.index).collect();
        assert_eq!(best, vec![3, 4]);
    }
}
