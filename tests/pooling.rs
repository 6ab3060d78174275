use nbseq::{
    SeqError,
    nn::{MaxAlongTime, max_along_time, max_along_time_list},
};
use ndarray::{Array2, Array3, array, s};
use ndarray_rand::{RandomExt, rand_distr::Uniform};

#[test]
fn max_along_time_ignores_padding() {
    let mut x = Array3::random((3, 5, 4), Uniform::new(-1., 1.));
    let lengths = [5, 2, 3];

    for (b, &l) in lengths.iter().enumerate() {
        x.slice_mut(s![b, l.., ..]).fill(100.);
    }

    let pooled = max_along_time(&x, &lengths).unwrap();

    assert_eq!(pooled.dim(), (3, 4));
    assert!(pooled.iter().all(|&v| v < 1.));

    for (b, &l) in lengths.iter().enumerate() {
        for d in 0..4 {
            let expected = x
                .slice(s![b, 0..l, d])
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max);
            assert_eq!(pooled[[b, d]], expected);
        }
    }
}

#[test]
fn max_along_time_small_example() {
    let x = array![[[1., -2.], [3., -1.], [9., 9.]], [[0., 5.], [-1., 4.], [7., 7.]]];
    let pooled = max_along_time(&x, &[2, 1]).unwrap();

    assert_eq!(pooled, array![[3., -1.], [0., 5.]]);
}

#[test]
fn max_along_time_skips_nan() {
    let x = array![[[f64::NAN, 1.], [2., f64::NAN], [9., 9.]]];

    let pooled = max_along_time(&x, &[2]).unwrap();
    assert_eq!(pooled, array![[2., 1.]]);

    let x = array![[[f64::NAN, 1.], [f64::NAN, 3.]]];

    let pooled = max_along_time(&x, &[2]).unwrap();
    assert!(pooled[[0, 0]].is_nan(), "all-NaN column should pool to NaN");
    assert_eq!(pooled[[0, 1]], 3.);
}

#[test]
fn list_and_padded_versions_agree() {
    let seqs = vec![
        Array2::random((3, 2), Uniform::new(-1., 1.)),
        Array2::random((1, 2), Uniform::new(-1., 1.)),
        Array2::random((4, 2), Uniform::new(-1., 1.)),
    ];

    let mut padded = Array3::zeros((3, 4, 2));
    for (b, x) in seqs.iter().enumerate() {
        padded.slice_mut(s![b, 0..x.nrows(), ..]).assign(x);
    }

    assert_eq!(
        max_along_time_list(&seqs).unwrap(),
        max_along_time(&padded, &[3, 1, 4]).unwrap()
    );
}

#[test]
fn max_along_time_rejects_empty_sequences() {
    let x = Array3::<f64>::zeros((2, 3, 1));

    assert!(matches!(
        max_along_time(&x, &[3, 0]),
        Err(SeqError::EmptySequence { index: 1 })
    ));
    assert!(matches!(
        max_along_time_list(&[Array2::zeros((2, 1)), Array2::zeros((0, 1))]),
        Err(SeqError::EmptySequence { index: 1 })
    ));
    assert!(matches!(max_along_time_list(&[]), Err(SeqError::EmptyBatch)));
}

#[test]
fn layer_forward_matches_function_and_routes_gradient() {
    let x = Array3::random((2, 4, 3), Uniform::new(-1., 1.));
    let lengths = [4, 2];

    let mut pool = MaxAlongTime::new();
    let pooled = pool.forward(x.clone(), &lengths, true).unwrap();
    assert_eq!(pooled, max_along_time(&x, &lengths).unwrap());

    let d_loss = Array2::random((2, 3), Uniform::new(0.5, 1.));
    let d_x = pool.backward(d_loss.clone());

    assert_eq!(d_x.dim(), x.dim());
    assert!((d_x.sum() - d_loss.sum()).abs() < 1e-12);
    assert!(d_x.slice(s![1, 2.., ..]).iter().all(|&v| v == 0.));

    for b in 0..2 {
        for d in 0..3 {
            let hits = (0..4).filter(|&t| d_x[[b, t, d]] != 0.).collect::<Vec<_>>();
            assert_eq!(hits.len(), 1);
            assert_eq!(x[[b, hits[0], d]], pooled[[b, d]]);
            assert_eq!(d_x[[b, hits[0], d]], d_loss[[b, d]]);
        }
    }
}
