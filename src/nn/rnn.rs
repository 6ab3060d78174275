use ndarray::{Array3, Axis, concatenate};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    error::{Result, SeqError},
    nn::LSTM,
    seq::{Layout, PackedSequence, pack_for_rnn_seq, unpack_from_rnn_seq},
};

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct RnnConfig {
    pub input_size: usize,
    pub hidden_size: usize,
    pub num_layers: usize,
    pub bidirectional: bool,
}

impl Default for RnnConfig {
    fn default() -> Self {
        Self {
            input_size: 1,
            hidden_size: 1,
            num_layers: 1,
            bidirectional: false,
        }
    }
}

impl RnnConfig {
    pub fn new(input_size: usize, hidden_size: usize) -> Self {
        Self {
            input_size,
            hidden_size,
            ..Default::default()
        }
    }

    pub fn with_num_layers(mut self, num_layers: usize) -> Self {
        self.num_layers = num_layers;
        self
    }

    pub fn with_bidirectional(mut self, bidirectional: bool) -> Self {
        self.bidirectional = bidirectional;
        self
    }
}

/// Stacked, optionally bidirectional LSTM over packed sequences.
///
/// Each layer feeds the next; in bidirectional mode the forward and
/// backward outputs are concatenated on the feature axis, so layers past
/// the first see `2 * hidden_size` features.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Rnn {
    config: RnnConfig,
    layers: Vec<Vec<LSTM>>,
}

impl Rnn {
    pub fn new(config: RnnConfig) -> Self {
        assert!(
            config.num_layers > 0 && config.hidden_size > 0 && config.input_size > 0,
            "invalid rnn config {:?}",
            config
        );

        let directions = if config.bidirectional { 2 } else { 1 };
        let layers = (0..config.num_layers)
            .map(|l| {
                let d_in = if l == 0 {
                    config.input_size
                } else {
                    config.hidden_size * directions
                };
                (0..directions)
                    .map(|_| LSTM::new(d_in, config.hidden_size))
                    .collect()
            })
            .collect();

        Self { config, layers }
    }

    pub fn config(&self) -> &RnnConfig {
        &self.config
    }

    pub fn num_layers(&self) -> usize {
        self.config.num_layers
    }

    pub fn hidden_size(&self) -> usize {
        self.config.hidden_size
    }

    pub fn bidirectional(&self) -> bool {
        self.config.bidirectional
    }

    pub fn output_size(&self) -> usize {
        if self.bidirectional() {
            2 * self.hidden_size()
        } else {
            self.hidden_size()
        }
    }

    /// Runs every layer over `packed`. `h0` and `c0` are shaped
    /// `(num_layers * directions, batch, hidden)` in packed batch order;
    /// the returned final states share that shape.
    pub fn forward_packed(
        &self,
        packed: &PackedSequence,
        h0: &Array3<f64>,
        c0: &Array3<f64>,
    ) -> Result<(PackedSequence, (Array3<f64>, Array3<f64>))> {
        let expected = get_state_shape(self, packed.batch_size(), self.bidirectional());

        for state in [h0, c0] {
            if state.dim() != expected {
                return Err(SeqError::StateShape {
                    expected,
                    actual: state.dim(),
                });
            }
        }

        let mut h_n = Array3::zeros(expected);
        let mut c_n = Array3::zeros(expected);
        let mut input = packed.clone();

        for (l, directions) in self.layers.iter().enumerate() {
            let mut outputs = Vec::with_capacity(directions.len());

            for (d, lstm) in directions.iter().enumerate() {
                let k = l * directions.len() + d;
                let (out, h, cell) = lstm.forward_packed(
                    &input,
                    &h0.index_axis(Axis(0), k).to_owned(),
                    &c0.index_axis(Axis(0), k).to_owned(),
                    d == 1,
                );

                h_n.index_axis_mut(Axis(0), k).assign(&h);
                c_n.index_axis_mut(Axis(0), k).assign(&cell);
                outputs.push(out.into_data());
            }

            let views = outputs.iter().map(|o| o.view()).collect::<Vec<_>>();
            input = input.with_data(concatenate(Axis(1), &views)?);
        }

        Ok((input, (h_n, c_n)))
    }
}

/// State shape for `rnn`: `(num_layers * directions, batch_size, hidden_size)`.
pub fn get_state_shape(rnn: &Rnn, batch_size: usize, bidirectional: bool) -> (usize, usize, usize) {
    if bidirectional {
        (rnn.num_layers() * 2, batch_size, rnn.hidden_size())
    } else {
        (rnn.num_layers(), batch_size, rnn.hidden_size())
    }
}

/// Runs `rnn` over a padded batch with zero initial state, sorting and
/// packing on the way in and restoring batch order and layout on the way
/// out. Output is `[B, T_max, output_size]` (or time first), where
/// `T_max = max(lengths)` and steps past each length are zero.
pub fn auto_rnn(
    rnn: &Rnn,
    seqs: &Array3<f64>,
    lengths: &[usize],
    layout: Layout,
) -> Result<Array3<f64>> {
    let batch_size = seqs.len_of(Axis(layout.batch_axis()));
    let state_shape = get_state_shape(rnn, batch_size, rnn.bidirectional());

    let h0 = Array3::zeros(state_shape);
    let c0 = Array3::zeros(state_shape);

    let (packed, reverse_indices) = pack_for_rnn_seq(seqs, lengths, layout)?;
    debug!(
        batch_size,
        steps = packed.max_len(),
        layers = rnn.num_layers(),
        "running rnn over packed batch"
    );

    let (output, _) = rnn.forward_packed(&packed, &h0, &c0)?;
    unpack_from_rnn_seq(&output, &reverse_indices, layout)
}
