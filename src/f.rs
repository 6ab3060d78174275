use ndarray::{Array2, ArrayView2, Axis};
use ndarray_rand::{RandomExt, rand_distr::Uniform};
use ndarray_stats::QuantileExt;

// ACTIVATIONS

pub fn tanh(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| v.tanh())
}

pub fn sigmoid(x: &Array2<f64>) -> Array2<f64> {
    x.mapv(|v| 1.0 / (1.0 + (-v).exp()))
}

pub fn softmax(x: ArrayView2<f64>) -> Array2<f64> {
    let maxes = row_maxes(x);

    let mut d = &x - &maxes;

    d.mapv_inplace(|x| x.exp());

    let sums = d.map_axis(Axis(1), |row| row.sum()).insert_axis(Axis(1));

    d / &sums
}

pub fn log_softmax(x: ArrayView2<f64>) -> Array2<f64> {
    let maxes = row_maxes(x);

    let d = &x - &maxes;
    let sums = d
        .map_axis(Axis(1), |row| row.exp().sum())
        .insert_axis(Axis(1));

    &d - sums.ln()
}

fn row_maxes(x: ArrayView2<f64>) -> Array2<f64> {
    x.map_axis(Axis(1), |row| row.max().cloned().unwrap_or(1e-4))
        .insert_axis(Axis(1))
}

// INITIALIZATION

pub fn xavier(shape: (usize, usize)) -> Array2<f64> {
    let bound = (6. / (shape.0 as f64 + shape.1 as f64)).sqrt();
    Array2::random(shape, Uniform::new(-bound, bound))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn log_softmax_matches_log_of_softmax() {
        let x = array![[1., 2., 3.], [10., 10., 0.]];

        let lhs = log_softmax(x.view());
        let rhs = softmax(x.view()).ln();

        assert!((&lhs - &rhs).iter().all(|d| d.abs() < 1e-9));

        let sums = softmax(x.view()).sum_axis(Axis(1));
        assert!(sums.iter().all(|s| (s - 1.).abs() < 1e-12));
    }
}
