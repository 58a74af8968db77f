use proptest::prelude::*;
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::sync::Mutex;
use strided_transpose::{
    transpose, transpose_blocked, transpose_naive, transpose_recursive,
    transpose_recursive_observed, BlockSize, MatrixView, MatrixViewMut, RegionPair, Strategy,
    TaskObserver, TransposeConfig, TransposeError,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn random_matrix(rows: usize, cols: usize, seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..rows * cols).map(|_| rng.gen_range(-1e6..1e6)).collect()
}

fn run(strategy: Strategy, src: &[f64], m: usize, n: usize, config: &TransposeConfig) -> Vec<f64> {
    let src = MatrixView::row_major(src, m, n).unwrap();
    let mut out = vec![f64::NAN; m * n];
    let mut dst = MatrixViewMut::row_major(&mut out, n, m).unwrap();
    transpose(strategy, &src, &mut dst, config).unwrap();
    out
}

fn fixed(k: usize) -> TransposeConfig {
    TransposeConfig::new().with_block_size(BlockSize::Fixed(k))
}

/// Bitwise comparison, so NaN left in an unwritten cell is caught.
fn assert_bits_eq(a: &[f64], b: &[f64], ctx: &str) {
    assert_eq!(a.len(), b.len(), "{ctx}");
    for (idx, (x, y)) in a.iter().zip(b.iter()).enumerate() {
        assert_eq!(x.to_bits(), y.to_bits(), "{ctx}: element {idx}");
    }
}

#[test]
fn test_square_4x4_all_strategies() {
    init_logging();
    let src: Vec<f64> = (1..=16).map(|x| x as f64).collect();
    let expected = vec![
        1.0, 5.0, 9.0, 13.0, //
        2.0, 6.0, 10.0, 14.0, //
        3.0, 7.0, 11.0, 15.0, //
        4.0, 8.0, 12.0, 16.0,
    ];
    for k in [1, 2, 3, 4, 128] {
        for strategy in Strategy::ALL {
            let out = run(strategy, &src, 4, 4, &fixed(k));
            assert_eq!(out, expected, "{strategy} k={k}");
        }
    }
}

#[test]
fn test_rectangular_2x3_all_strategies() {
    let src = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    let expected = vec![1.0, 4.0, 2.0, 5.0, 3.0, 6.0];
    for k in [1, 2, 128] {
        for strategy in Strategy::ALL {
            assert_eq!(run(strategy, &src, 2, 3, &fixed(k)), expected, "{strategy}");
        }
    }
}

#[test]
fn test_default_entry_points() {
    init_logging();
    let (m, n) = (33, 65);
    let src_data = random_matrix(m, n, 1);
    let src = MatrixView::row_major(&src_data, m, n).unwrap();

    let mut a = vec![0.0; m * n];
    let mut b = vec![0.0; m * n];
    let mut c = vec![0.0; m * n];
    transpose_naive(&src, &mut MatrixViewMut::row_major(&mut a, n, m).unwrap()).unwrap();
    transpose_blocked(&src, &mut MatrixViewMut::row_major(&mut b, n, m).unwrap()).unwrap();
    transpose_recursive(&src, &mut MatrixViewMut::row_major(&mut c, n, m).unwrap()).unwrap();

    assert_bits_eq(&a, &b, "blocked");
    assert_bits_eq(&a, &c, "recursive");
}

#[test]
fn test_equivalence_edge_shapes() {
    let shapes = [
        (1, 1),
        (1, 9),
        (9, 1),
        (1, 1000),
        (1000, 1),
        (16, 16),
        (17, 17),
        (31, 5),
        (5, 31),
        (100, 3),
        (128, 130),
    ];
    for (m, n) in shapes {
        let src = random_matrix(m, n, (m * 1000 + n) as u64);
        let reference = run(Strategy::Naive, &src, m, n, &fixed(1));
        for k in [1, 2, 3, 8, 16, 1024] {
            let config = fixed(k);
            let blocked = run(Strategy::Blocked, &src, m, n, &config);
            let recursive = run(Strategy::Recursive, &src, m, n, &config);
            assert_bits_eq(&reference, &blocked, &format!("blocked {m}x{n} k={k}"));
            assert_bits_eq(&reference, &recursive, &format!("recursive {m}x{n} k={k}"));
        }
    }
}

#[test]
fn test_involution() {
    for (m, n) in [(1, 1), (3, 8), (8, 3), (40, 40), (57, 23)] {
        let src = random_matrix(m, n, 7);
        for strategy in Strategy::ALL {
            let config = fixed(4);
            let once = run(strategy, &src, m, n, &config);
            let twice = run(strategy, &once, n, m, &config);
            assert_bits_eq(&src, &twice, &format!("{strategy} {m}x{n}"));
        }
    }
}

#[test]
fn test_threshold_clamped_to_one() {
    // A degenerate cache reading resolves to K = 1 and must still terminate.
    for capacity in [0, -1, 1] {
        let config = TransposeConfig::new().with_block_size(BlockSize::FromCache(capacity));
        assert_eq!(config.resolve_block_size().unwrap(), 1);
        let src = random_matrix(37, 19, 3);
        let reference = run(Strategy::Naive, &src, 37, 19, &config);
        for strategy in [Strategy::Blocked, Strategy::Recursive] {
            assert_bits_eq(
                &reference,
                &run(strategy, &src, 37, 19, &config),
                &format!("{strategy} capacity={capacity}"),
            );
        }
    }
}

#[test]
fn test_blocked_ragged_edge_tiles() {
    // 10 and 7 are not multiples of 4: the last tile row and column are partial.
    let (m, n) = (10, 7);
    let src: Vec<f64> = (0..m * n).map(|x| x as f64).collect();
    let out = run(Strategy::Blocked, &src, m, n, &fixed(4));
    for i in 0..m {
        for j in 0..n {
            assert_eq!(out[j * m + i], src[i * n + j], "({i}, {j})");
        }
    }
}

struct DisjointnessChecker {
    m: usize,
    n: usize,
    owner: Mutex<Vec<Option<usize>>>,
    leaves: Mutex<usize>,
}

impl DisjointnessChecker {
    fn new(m: usize, n: usize) -> Self {
        Self {
            m,
            n,
            owner: Mutex::new(vec![None; m * n]),
            leaves: Mutex::new(0),
        }
    }
}

impl TaskObserver for DisjointnessChecker {
    fn on_leaf(&self, region: &RegionPair) {
        assert!(region.is_consistent(), "{region:?}");
        assert!(region.dst_rows.end <= self.n && region.dst_cols.end <= self.m);
        let id = {
            let mut leaves = self.leaves.lock().unwrap();
            *leaves += 1;
            *leaves
        };
        let mut owner = self.owner.lock().unwrap();
        for i in region.dst_rows.clone() {
            for j in region.dst_cols.clone() {
                let cell = &mut owner[i * self.m + j];
                assert!(cell.is_none(), "cell ({i}, {j}) written by two tasks");
                *cell = Some(id);
            }
        }
    }
}

#[test]
fn test_recursive_tasks_write_disjoint_regions() {
    init_logging();
    for (m, n, k) in [(1, 1000, 8), (1000, 1, 8), (1, 1000, 1), (257, 129, 16), (64, 64, 1)] {
        let src_data = random_matrix(m, n, 11);
        let mut dst_data = vec![f64::NAN; m * n];
        let src = MatrixView::row_major(&src_data, m, n).unwrap();
        let mut dst = MatrixViewMut::row_major(&mut dst_data, n, m).unwrap();

        let checker = DisjointnessChecker::new(m, n);
        let config = fixed(k).with_num_threads(4);
        transpose_recursive_observed(&src, &mut dst, &config, &checker).unwrap();

        let owner = checker.owner.into_inner().unwrap();
        assert!(owner.iter().all(Option::is_some), "{m}x{n}: uncovered cells");
        for i in 0..m {
            for j in 0..n {
                assert_eq!(dst_data[j * m + i], src_data[i * n + j]);
            }
        }
    }
}

#[test]
fn test_shape_mismatch_rejected_before_writes() {
    let src_data = random_matrix(3, 4, 5);
    let src = MatrixView::row_major(&src_data, 3, 4).unwrap();
    for strategy in Strategy::ALL {
        let mut dst_data = vec![42.0; 12];
        let mut dst = MatrixViewMut::row_major(&mut dst_data, 3, 4).unwrap();
        let err = transpose(strategy, &src, &mut dst, &fixed(2)).unwrap_err();
        assert!(matches!(err, TransposeError::ShapeMismatch(_, _)), "{strategy}");
        assert!(dst_data.iter().all(|&x| x == 42.0), "{strategy}");
    }
}

#[test]
fn test_wrapping_strides_never_reach_a_kernel() {
    // 4 * 2^62 wraps isize; such views must not be constructible.
    let mut small = vec![0.0; 2];
    let err = MatrixViewMut::new(&mut small, [2, 5], [1, 1 << 62], 0).unwrap_err();
    assert!(matches!(err, TransposeError::OutOfBounds { len: 2, .. }));

    let src_data = vec![0.0; 2];
    let err = MatrixView::new(&src_data, [5, 2], [1 << 62, 1], 0).unwrap_err();
    assert!(matches!(err, TransposeError::OutOfBounds { len: 2, .. }));
    assert_eq!(small, vec![0.0; 2]);
}

#[test]
fn test_strided_destination_sub_block() {
    // Write a 5x3 transpose into the middle of a 7x6 buffer; the rest stays untouched.
    let (m, n) = (3, 5);
    let src_data = random_matrix(m, n, 9);
    let src = MatrixView::row_major(&src_data, m, n).unwrap();
    for strategy in Strategy::ALL {
        let mut buf = vec![-7.0; 7 * 6];
        let offset = 6 + 2;
        {
            let mut dst = MatrixViewMut::new(&mut buf, [n, m], [6, 1], offset).unwrap();
            transpose(strategy, &src, &mut dst, &fixed(2)).unwrap();
        }
        for r in 0..7 {
            for c in 0..6 {
                let inside = (1..1 + n).contains(&r) && (2..2 + m).contains(&c);
                let value = buf[r * 6 + c];
                if inside {
                    assert_eq!(value, src_data[(c - 2) * n + (r - 1)], "{strategy}");
                } else {
                    assert_eq!(value, -7.0, "{strategy} wrote outside at ({r}, {c})");
                }
            }
        }
    }
}

#[test]
fn test_transposed_source_view() {
    // Feeding a transposed view back in reproduces the original layout.
    let (m, n) = (6, 9);
    let data = random_matrix(m, n, 13);
    let view = MatrixView::row_major(&data, m, n).unwrap().t();
    for strategy in Strategy::ALL {
        let mut out = vec![0.0; m * n];
        let mut dst = MatrixViewMut::row_major(&mut out, m, n).unwrap();
        transpose(strategy, &view, &mut dst, &fixed(4)).unwrap();
        assert_bits_eq(&data, &out, strategy.name());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_strategies_agree(m in 1usize..60, n in 1usize..60, k in 1usize..20, seed in any::<u64>()) {
        let src = random_matrix(m, n, seed);
        let config = fixed(k);
        let reference = run(Strategy::Naive, &src, m, n, &config);
        for strategy in [Strategy::Blocked, Strategy::Recursive] {
            let out = run(strategy, &src, m, n, &config);
            prop_assert!(
                reference.iter().zip(out.iter()).all(|(a, b)| a.to_bits() == b.to_bits()),
                "{} differs for {}x{} k={}", strategy, m, n, k
            );
        }
    }

    #[test]
    fn prop_split_tree_partitions(m in 1usize..200, n in 1usize..200, k in 1usize..32) {
        let mut covered = 0usize;
        let mut stack = vec![RegionPair::full(m, n)];
        while let Some(region) = stack.pop() {
            prop_assert!(region.is_consistent());
            match region.split(k) {
                None => {
                    prop_assert!(region.src_rows.len() <= k && region.src_cols.len() <= k);
                    covered += region.src_rows.len() * region.src_cols.len();
                }
                Some((a, b)) => {
                    prop_assert!(!a.src_rows.is_empty() && !a.src_cols.is_empty());
                    prop_assert!(!b.src_rows.is_empty() && !b.src_cols.is_empty());
                    let parent = region.src_rows.len() * region.src_cols.len();
                    let children = a.src_rows.len() * a.src_cols.len()
                        + b.src_rows.len() * b.src_cols.len();
                    prop_assert_eq!(parent, children);
                    stack.push(a);
                    stack.push(b);
                }
            }
        }
        prop_assert_eq!(covered, m * n);
    }

    #[test]
    fn prop_involution(m in 1usize..40, n in 1usize..40, k in 1usize..10) {
        let src = random_matrix(m, n, (m * n + k) as u64);
        let config = fixed(k);
        for strategy in Strategy::ALL {
            let back = run(strategy, &run(strategy, &src, m, n, &config), n, m, &config);
            prop_assert_eq!(&back, &src);
        }
    }
}
