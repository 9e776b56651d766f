use crate::distance::{Candidate, DescriptorElement, Neighbors};
use kpb_core::DescriptorMatrix;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

const LEAF_SIZE: usize = 4;

enum Node {
    Leaf(Vec<usize>),
    Split {
        dim: usize,
        cut: f32,
        left: usize,
        right: usize,
    },
}

/// Branch waiting in the best-bin-first queue, smallest bound on top
struct Branch {
    bound: f32,
    node: usize,
}

impl PartialEq for Branch {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Branch {}

impl PartialOrd for Branch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Branch {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .bound
            .total_cmp(&self.bound)
            .then_with(|| other.node.cmp(&self.node))
    }
}

/// Kd-tree over the training rows, split on the dimension of highest
/// variance at its mean.
///
/// Binary rows are indexed as 0/1 bit vectors so squared Euclidean distance
/// between points equals the Hamming distance between rows.
pub(crate) struct KdTree<'a, T> {
    train: &'a DescriptorMatrix<T>,
    points: Vec<f32>,
    dims: usize,
    nodes: Vec<Node>,
}

impl<'a, T: DescriptorElement> KdTree<'a, T> {
    pub fn build(train: &'a DescriptorMatrix<T>) -> Self {
        let mut points = Vec::new();
        for row in train.iter_rows() {
            T::expand(row, &mut points);
        }
        let dims = if train.rows() == 0 { 0 } else { points.len() / train.rows() };
        let mut tree = Self {
            train,
            points,
            dims,
            nodes: Vec::new(),
        };
        if train.rows() > 0 {
            let mut indices: Vec<usize> = (0..train.rows()).collect();
            tree.split(&mut indices);
        }
        log::trace!("kd-tree with {} nodes over {} rows", tree.nodes.len(), train.rows());
        tree
    }

    #[inline]
    fn point(&self, i: usize) -> &[f32] {
        &self.points[i * self.dims..(i + 1) * self.dims]
    }

    /// Builds the subtree over `indices` and returns its node id
    fn split(&mut self, indices: &mut [usize]) -> usize {
        let id = self.nodes.len();
        if indices.len() <= LEAF_SIZE {
            self.nodes.push(Node::Leaf(indices.to_vec()));
            return id;
        }

        let n = indices.len() as f32;
        let mut best = (0usize, 0.0f32, 0.0f32);
        for dim in 0..self.dims {
            let mean = indices.iter().map(|&i| self.point(i)[dim]).sum::<f32>() / n;
            let var = indices.iter().map(|&i| (self.point(i)[dim] - mean).powi(2)).sum::<f32>();
            if var > best.2 {
                best = (dim, mean, var);
            }
        }
        let (dim, cut, var) = best;
        if var <= 0.0 {
            // identical points cannot be separated
            self.nodes.push(Node::Leaf(indices.to_vec()));
            return id;
        }

        let mut mid = 0;
        for i in 0..indices.len() {
            if self.point(indices[i])[dim] < cut {
                indices.swap(i, mid);
                mid += 1;
            }
        }
        if mid == 0 || mid == indices.len() {
            self.nodes.push(Node::Leaf(indices.to_vec()));
            return id;
        }

        self.nodes.push(Node::Leaf(Vec::new()));
        let (lo, hi) = indices.split_at_mut(mid);
        let left = self.split(lo);
        let right = self.split(hi);
        self.nodes[id] = Node::Split { dim, cut, left, right };
        id
    }

    /// Best-bin-first search examining at most `checks` training rows.
    ///
    /// Distances are computed on the original rows, so they are always
    /// exact; only recall depends on `checks`.
    pub fn knn_one(&self, query: &[T], k: usize, checks: usize) -> Vec<Candidate> {
        let mut neighbors = Neighbors::new(k);
        if self.nodes.is_empty() {
            return neighbors.into_vec();
        }
        let mut q = Vec::with_capacity(self.dims);
        T::expand(query, &mut q);

        let mut queue = BinaryHeap::new();
        queue.push(Branch { bound: 0.0, node: 0 });
        let mut checked = 0usize;
        while let Some(branch) = queue.pop() {
            if checked >= checks {
                break;
            }
            if neighbors.worst().is_some_and(|w| T::from_squared(branch.bound) > w) {
                break;
            }
            let mut node = branch.node;
            loop {
                match &self.nodes[node] {
                    Node::Split { dim, cut, left, right } => {
                        let diff = q[*dim] - cut;
                        let (near, far) = if diff < 0.0 { (*left, *right) } else { (*right, *left) };
                        queue.push(Branch {
                            bound: branch.bound.max(diff * diff),
                            node: far,
                        });
                        node = near;
                    }
                    Node::Leaf(indices) => {
                        for &index in indices {
                            neighbors.offer(Candidate {
                                distance: T::distance(query, self.train.row(index)),
                                index,
                            });
                            checked += 1;
                        }
                        break;
                    }
                }
            }
        }
        neighbors.into_vec()
    }
}

/// Approximate k-nearest-neighbour search for every query row
pub(crate) fn knn<T: DescriptorElement>(
    query: &DescriptorMatrix<T>,
    train: &DescriptorMatrix<T>,
    k: usize,
    checks: usize,
) -> Vec<Vec<Candidate>> {
    let tree = KdTree::build(train);
    (0..query.rows())
        .into_par_iter()
        .map(|qi| tree.knn_one(query.row(qi), k, checks))
        .collect()
}
