/// Distance a descriptor family is meant to be compared with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DistanceMetric {
    /// Number of differing bits, for binary descriptors
    Hamming,
    /// Euclidean distance, for floating-point descriptors
    L2,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DistanceMetric::Hamming => write!(f, "hamming"),
            DistanceMetric::L2 => write!(f, "l2"),
        }
    }
}

/// Row-major descriptor matrix; row `i` belongs to keypoint `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorMatrix<T> {
    cols: usize,
    data: Vec<T>,
}

impl<T: Copy> DescriptorMatrix<T> {
    pub fn new(cols: usize) -> Self {
        Self {
            cols,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(cols: usize, rows: usize) -> Self {
        Self {
            cols,
            data: Vec::with_capacity(cols * rows),
        }
    }

    /// Build from rows that all have length `cols`; `None` if any row differs.
    pub fn from_rows<R: AsRef<[T]>>(cols: usize, rows: &[R]) -> Option<Self> {
        let mut m = Self::with_capacity(cols, rows.len());
        for row in rows {
            if row.as_ref().len() != cols {
                return None;
            }
            m.data.extend_from_slice(row.as_ref());
        }
        Some(m)
    }

    /// Append a row. The slice is truncated or zero-extended to `cols`.
    pub fn push_row(&mut self, row: &[T])
    where
        T: Default,
    {
        let n = row.len().min(self.cols);
        self.data.extend_from_slice(&row[..n]);
        self.data
            .extend(std::iter::repeat(T::default()).take(self.cols - n));
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn rows(&self) -> usize {
        if self.cols == 0 {
            0
        } else {
            self.data.len() / self.cols
        }
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[T]> + '_ {
        self.data.chunks_exact(self.cols.max(1))
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

/// Descriptor set of one frame. The variant fixes the matching metric.
#[derive(Debug, Clone, PartialEq)]
pub enum Descriptors {
    Binary(DescriptorMatrix<u8>),
    Float(DescriptorMatrix<f32>),
}

impl Descriptors {
    pub fn rows(&self) -> usize {
        match self {
            Descriptors::Binary(m) => m.rows(),
            Descriptors::Float(m) => m.rows(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Row width in elements (bytes for binary, floats otherwise)
    pub fn cols(&self) -> usize {
        match self {
            Descriptors::Binary(m) => m.cols(),
            Descriptors::Float(m) => m.cols(),
        }
    }

    pub fn metric(&self) -> DistanceMetric {
        match self {
            Descriptors::Binary(_) => DistanceMetric::Hamming,
            Descriptors::Float(_) => DistanceMetric::L2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rows_follow_pushes() {
        let mut m = DescriptorMatrix::<u8>::new(4);
        assert_eq!(m.rows(), 0);
        m.push_row(&[1, 2, 3, 4]);
        m.push_row(&[5, 6]);
        assert_eq!(m.rows(), 2);
        assert_eq!(m.row(1), &[5, 6, 0, 0]);
        assert_eq!(m.iter_rows().count(), 2);
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let ok = DescriptorMatrix::from_rows(2, &[[1.0f32, 2.0], [3.0, 4.0]]);
        assert_eq!(ok.map(|m| m.rows()), Some(2));
        let ragged: Vec<Vec<u8>> = vec![vec![1, 2], vec![3]];
        assert!(DescriptorMatrix::from_rows(2, &ragged).is_none());
    }

    #[test]
    fn test_metric_follows_variant() {
        let bin = Descriptors::Binary(DescriptorMatrix::new(32));
        let flt = Descriptors::Float(DescriptorMatrix::new(128));
        assert_eq!(bin.metric(), DistanceMetric::Hamming);
        assert_eq!(flt.metric(), DistanceMetric::L2);
        assert!(bin.is_empty());
        assert_eq!(flt.cols(), 128);
    }
}
