use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use kpb_core::{DescriptorMatrix, Descriptors, Keypoint};
use kpb_match::{match_descriptors, MatcherConfig, MatcherKind, SelectorKind};

/// Pseudo-random binary descriptors, reproducible across runs
fn binary_rows(seed: u64, rows: usize, cols: usize) -> Descriptors {
    let mut s = seed | 1;
    let mut m = DescriptorMatrix::with_capacity(cols, rows);
    let mut row = vec![0u8; cols];
    for _ in 0..rows {
        for b in row.iter_mut() {
            s ^= s << 13;
            s ^= s >> 7;
            s ^= s << 17;
            *b = s as u8;
        }
        m.push_row(&row);
    }
    Descriptors::Binary(m)
}

fn float_rows(seed: u64, rows: usize, cols: usize) -> Descriptors {
    let Descriptors::Binary(bytes) = binary_rows(seed, rows, cols) else {
        unreachable!()
    };
    let floats: Vec<Vec<f32>> = bytes.iter_rows().map(|r| r.iter().map(|&b| b as f32).collect()).collect();
    Descriptors::Float(DescriptorMatrix::from_rows(cols, &floats).unwrap())
}

fn keypoints(n: usize) -> Vec<Keypoint> {
    (0..n).map(|i| Keypoint::new(i as f32, 0.0, 7.0)).collect()
}

/// Brute force against kd-tree for both descriptor families
fn bench_matchers(c: &mut Criterion) {
    let mut group = c.benchmark_group("matchers");
    group.sample_size(20);

    for &n in &[200usize, 1000] {
        let kps = keypoints(n);
        let families = [
            ("binary32", binary_rows(1, n, 32), binary_rows(2, n, 32)),
            ("float128", float_rows(3, n, 128), float_rows(4, n, 128)),
        ];
        for (family, prev, cur) in &families {
            for kind in [MatcherKind::BruteForce, MatcherKind::Flann] {
                let cfg = MatcherConfig {
                    kind,
                    selector: SelectorKind::KNearest,
                    ..MatcherConfig::default()
                };
                group.bench_with_input(
                    BenchmarkId::new(format!("{}/{}", kind, family), n),
                    &(prev, cur),
                    |b, (prev, cur)| {
                        b.iter(|| black_box(match_descriptors(&kps, &kps, black_box(prev), black_box(cur), &cfg).unwrap()))
                    },
                );
            }
        }
    }

    group.finish();
}

criterion_group!(benches, bench_matchers);
criterion_main!(benches);
