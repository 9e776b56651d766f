use crate::distance::{Candidate, DescriptorElement};
use kpb_core::DescriptorMatrix;
use rayon::prelude::*;
use space::{Knn, LinearKnn, Metric};

/// Descriptor row tagged with its training index
#[derive(Clone, Copy)]
struct Row<'a, T> {
    index: u32,
    data: &'a [T],
}

const QUERY_INDEX: u32 = u32::MAX;

/// Orders rows by distance, then by training index.
///
/// The high half of the unit holds the bits of the non-negative distance,
/// which sort like the float itself; the low half holds the training index,
/// so no two training rows share a unit.
struct RowMetric;

impl<'a, T: DescriptorElement> Metric<Row<'a, T>> for RowMetric {
    type Unit = u64;

    fn distance(&self, a: &Row<'a, T>, b: &Row<'a, T>) -> u64 {
        let d = T::distance(a.data, b.data).to_bits();
        (u64::from(d) << 32) | u64::from(a.index.min(b.index))
    }
}

/// Exhaustive k-nearest-neighbour search. Ties keep the lower training
/// index.
pub(crate) fn knn<T: DescriptorElement>(
    query: &DescriptorMatrix<T>,
    train: &DescriptorMatrix<T>,
    k: usize,
) -> Vec<Vec<Candidate>> {
    if k == 0 {
        return vec![Vec::new(); query.rows()];
    }
    let rows: Vec<(Row<T>, ())> = train
        .iter_rows()
        .enumerate()
        .map(|(i, data)| (Row { index: i as u32, data }, ()))
        .collect();

    (0..query.rows())
        .into_par_iter()
        .map(|qi| {
            let q = Row {
                index: QUERY_INDEX,
                data: query.row(qi),
            };
            LinearKnn {
                metric: RowMetric,
                points: rows.iter(),
            }
            .knn(&q, k)
            .into_iter()
            .map(|(n, _, _)| Candidate {
                distance: f32::from_bits((n.distance >> 32) as u32),
                index: n.index,
            })
            .collect()
        })
        .collect()
}
