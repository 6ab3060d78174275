use ndarray::{Array1, Array2, Array3, Axis, concatenate, s};
use serde::{Deserialize, Serialize};

use crate::{f, seq::PackedSequence};

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct LSTM {
    d_in: usize,
    d_model: usize,

    w_i: Array2<f64>,
    w_r: Array2<f64>,
    b: Array1<f64>,
}

impl LSTM {
    pub fn new(d_in: usize, d_model: usize) -> Self {
        Self {
            d_in,
            d_model,

            w_i: f::xavier((d_in, 4 * d_model)),
            w_r: f::xavier((d_model, 4 * d_model)),
            b: concatenate![
                Axis(0),
                Array1::ones(d_model).view(),
                Array1::zeros(d_model * 3).view()
            ],
        }
    }

    pub fn d_in(&self) -> usize {
        self.d_in
    }

    pub fn d_model(&self) -> usize {
        self.d_model
    }

    /// Runs the full padded batch `[B, T, d_in]` from a zero state. Every
    /// step is processed, padding included.
    pub fn forward(&self, x: &Array3<f64>) -> Array3<f64> {
        let (batch_size, seq_len, features) = x.dim();

        assert!(
            features == self.d_in,
            "dimension mismatch, d_in={} d_x={:?}",
            self.d_in,
            x.dim()
        );

        let mut state = Array2::zeros((batch_size, self.d_model));
        let mut cell = Array2::zeros((batch_size, self.d_model));
        let mut output = Array3::zeros((batch_size, seq_len, self.d_model));

        for t in 0..seq_len {
            let x_t = x.slice(s![.., t, ..]).to_owned();
            self.step(&x_t, &mut state, &mut cell);
            output.slice_mut(s![.., t, ..]).assign(&state);
        }

        output
    }

    pub fn step(&self, x: &Array2<f64>, h: &mut Array2<f64>, cell: &mut Array2<f64>) {
        assert!(
            self.d_in == x.dim().1
                && h.dim() == (x.dim().0, self.d_model)
                && h.dim() == cell.dim(),
            "dimension mismatch, d_in={} d_model={} d_x={:?} d_h={:?} d_cell={:?}",
            self.d_in,
            self.d_model,
            x.dim(),
            h.dim(),
            cell.dim()
        );

        let preactivations = x.dot(&self.w_i) + h.dot(&self.w_r) + &self.b;

        let d = self.d_model;
        let forget_gate = f::sigmoid(&preactivations.slice(s![.., 0..d]).to_owned());
        let input_gate = f::sigmoid(&preactivations.slice(s![.., d..(2 * d)]).to_owned());
        let cell_gate = f::tanh(&preactivations.slice(s![.., (2 * d)..(3 * d)]).to_owned());
        let output_gate = f::sigmoid(&preactivations.slice(s![.., (3 * d)..]).to_owned());

        *cell = &(*cell) * &forget_gate + (&input_gate * &cell_gate);
        *h = &output_gate * f::tanh(cell);
    }

    /// Runs a packed batch. At step `t` only the first `batch_sizes[t]` rows
    /// are advanced, so each row's final state is the one at its own last
    /// step. With `reverse`, steps run from last to first and a row picks up
    /// its initial state at the step where it becomes active.
    pub fn forward_packed(
        &self,
        packed: &PackedSequence,
        h0: &Array2<f64>,
        c0: &Array2<f64>,
        reverse: bool,
    ) -> (PackedSequence, Array2<f64>, Array2<f64>) {
        assert!(
            packed.features() == self.d_in
                && h0.dim() == (packed.batch_size(), self.d_model)
                && h0.dim() == c0.dim(),
            "dimension mismatch, d_in={} d_model={} packed features={} batch={} d_h0={:?} d_c0={:?}",
            self.d_in,
            self.d_model,
            packed.features(),
            packed.batch_size(),
            h0.dim(),
            c0.dim()
        );

        let mut h = h0.clone();
        let mut cell = c0.clone();
        let mut output = Array2::zeros((packed.data().nrows(), self.d_model));

        let offsets = packed.offsets();
        let mut steps = (0..packed.max_len()).collect::<Vec<_>>();
        if reverse {
            steps.reverse();
        }

        for t in steps {
            let n = packed.batch_sizes()[t];
            let rows = offsets[t]..(offsets[t] + n);

            let x_t = packed.data().slice(s![rows.clone(), ..]).to_owned();
            let mut h_t = h.slice(s![0..n, ..]).to_owned();
            let mut cell_t = cell.slice(s![0..n, ..]).to_owned();

            self.step(&x_t, &mut h_t, &mut cell_t);

            h.slice_mut(s![0..n, ..]).assign(&h_t);
            cell.slice_mut(s![0..n, ..]).assign(&cell_t);
            output.slice_mut(s![rows, ..]).assign(&h_t);
        }

        (packed.with_data(output), h, cell)
    }
}
