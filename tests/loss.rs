use nbseq::{
    SeqError,
    loss::{d_seq2seq_cross_entropy, seq2seq_cross_entropy},
};
use ndarray::{Array2, array};
use ndarray_rand::{RandomExt, rand_distr::Uniform};

fn manual_cross_entropy(logits: &Array2<f64>, targets: &[usize]) -> f64 {
    let total = targets
        .iter()
        .enumerate()
        .map(|(row, &y)| {
            let norm = logits.row(row).iter().map(|v| v.exp()).sum::<f64>().ln();
            norm - logits[[row, y]]
        })
        .sum::<f64>();

    total / targets.len() as f64
}

#[test]
fn cross_entropy_averages_over_valid_positions() {
    let logits = array![[2., 0.5, -1.], [0., 0., 3.], [1., 2., 0.]];
    let labels = array![[0usize, 2], [1, 0]];

    let loss = seq2seq_cross_entropy(&logits, &labels, &[2, 1], None).unwrap();
    let expected = manual_cross_entropy(&logits, &[0, 2, 1]);

    assert!((loss - expected).abs() < 1e-12, "{loss} != {expected}");
}

#[test]
fn uniform_logits_give_log_vocab() {
    let logits = Array2::zeros((6, 5));
    let labels = array![[0usize, 1, 2, 3], [4, 0, 0, 0]];

    let loss = seq2seq_cross_entropy(&logits, &labels, &[4, 2], None).unwrap();

    assert!((loss - 5f64.ln()).abs() < 1e-12, "{loss} != ln 5");
}

#[test]
fn chunking_does_not_change_loss() {
    let logits = Array2::random((9, 7), Uniform::new(-3., 3.));
    let labels = Array2::from_shape_fn((3, 4), |(b, t)| (b + 2 * t) % 7);
    let lengths = [4, 3, 2];

    let whole = seq2seq_cross_entropy(&logits, &labels, &lengths, None).unwrap();

    for chunks in [1, 2, 4, 9, 20] {
        let chunked = seq2seq_cross_entropy(&logits, &labels, &lengths, Some(chunks)).unwrap();
        assert!((whole - chunked).abs() < 1e-12, "{whole} != {chunked} with {chunks} chunks");
    }
}

#[test]
fn padding_labels_are_ignored() {
    let logits = Array2::random((3, 4), Uniform::new(-1., 1.));
    let clean = array![[1usize, 2], [3, 0]];
    let noisy = array![[1usize, 2], [3, 99]];

    let a = seq2seq_cross_entropy(&logits, &clean, &[2, 1], None).unwrap();
    let b = seq2seq_cross_entropy(&logits, &noisy, &[2, 1], None).unwrap();

    assert_eq!(a, b);
}

#[test]
fn cross_entropy_rejects_bad_input() {
    let logits = Array2::zeros((3, 4));
    let labels = array![[1usize, 2], [3, 0]];

    assert!(matches!(
        seq2seq_cross_entropy(&logits, &labels, &[2, 2], None),
        Err(SeqError::RowCount {
            expected: 4,
            actual: 3
        })
    ));
    assert!(matches!(
        seq2seq_cross_entropy(&logits, &array![[1usize, 4], [0, 0]], &[2, 1], None),
        Err(SeqError::LabelOutOfRange {
            row: 1,
            label: 4,
            classes: 4
        })
    ));
    assert!(matches!(
        seq2seq_cross_entropy(&Array2::zeros((0, 4)), &labels, &[0, 0], None),
        Err(SeqError::EmptyBatch)
    ));
}

#[test]
fn gradient_matches_finite_differences() {
    let logits = Array2::random((5, 4), Uniform::new(-2., 2.));
    let labels = array![[0usize, 3, 1], [2, 2, 0]];
    let lengths = [3, 2];

    let grad = d_seq2seq_cross_entropy(&logits, &labels, &lengths).unwrap();

    let eps = 1e-6;
    for ((row, col), &g) in grad.indexed_iter() {
        let mut plus = logits.clone();
        plus[[row, col]] += eps;
        let mut minus = logits.clone();
        minus[[row, col]] -= eps;

        let numeric = (seq2seq_cross_entropy(&plus, &labels, &lengths, None).unwrap()
            - seq2seq_cross_entropy(&minus, &labels, &lengths, None).unwrap())
            / (2. * eps);

        assert!(
            (numeric - g).abs() < 1e-6,
            "gradient mismatch at ({row}, {col}): analytic={g} numeric={numeric}"
        );
    }
}
