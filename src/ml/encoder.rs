// ============================================================
// Layer 5 — Bidirectional GRU Sequence Encoder
// ============================================================
// A reusable encoder for padded, variable-length sequences:
// independent forward and backward recurrent passes over
// [batch, seq_len, features], concatenated per position into
// [batch, seq_len, 2 * hidden].
//
// Two variants implement the same SequenceEncode contract and are
// selected at construction time by EncoderKind:
//
//   Native — per-step scan that freezes each row's state once its
//            true length is exhausted and zeroes the outputs past
//            it; the backward pass reverses only the valid prefix.
//            Exact on padding, used unconditionally for the
//            character encoder.
//   Fused  — whole-tensor scan with no per-step masking; the
//            backward pass flips the full padded axis. Fewer mask
//            ops per step, relies on downstream masking.
//
// Every encoder instance owns its own weights; sharing weights
// between call sites means calling the same instance, never an
// implicit lookup.

use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation,
};

// ─── EncoderKind ──────────────────────────────────────────────────────────────
/// Which encoder variant a call site constructs.
#[derive(Config, Debug, PartialEq)]
pub enum EncoderKind {
    Native,
    Fused,
}

impl std::str::FromStr for EncoderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "native" => Ok(EncoderKind::Native),
            "fused"  => Ok(EncoderKind::Fused),
            other => Err(anyhow::anyhow!(
                "Unknown encoder kind '{other}' — expected 'native' or 'fused'"
            )),
        }
    }
}

// ─── GruCell ──────────────────────────────────────────────────────────────────
/// A single gated-recurrent step. Both gate blocks are computed with
/// one input projection and one state projection of width 3 * hidden,
/// then split into reset / update / candidate parts.
#[derive(Module, Debug)]
pub struct GruCell<B: Backend> {
    input_proj: Linear<B>,
    state_proj: Linear<B>,
    hidden:     usize,
}

#[derive(Config, Debug)]
pub struct GruCellConfig {
    pub input_size:  usize,
    pub hidden_size: usize,
}

impl GruCellConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> GruCell<B> {
        GruCell {
            input_proj: LinearConfig::new(self.input_size, 3 * self.hidden_size).init(device),
            state_proj: LinearConfig::new(self.hidden_size, 3 * self.hidden_size).init(device),
            hidden:     self.hidden_size,
        }
    }
}

impl<B: Backend> GruCell<B> {
    pub fn hidden_size(&self) -> usize {
        self.hidden
    }

    /// One step. x: [N, input], state: [N, hidden] → [N, hidden]
    pub fn step(&self, x: Tensor<B, 2>, state: Tensor<B, 2>) -> Tensor<B, 2> {
        let from_x = self.input_proj.forward(x).chunk(3, 1);
        let from_h = self.state_proj.forward(state.clone()).chunk(3, 1);

        let reset     = activation::sigmoid(from_x[0].clone() + from_h[0].clone());
        let update    = activation::sigmoid(from_x[1].clone() + from_h[1].clone());
        let candidate = (from_x[2].clone() + reset * from_h[2].clone()).tanh();

        // update == 1 keeps the previous state
        update.clone() * state + (update.neg().add_scalar(1.0)) * candidate
    }
}

// ─── SequenceEncode ───────────────────────────────────────────────────────────
/// Contextual outputs for one direction pair, plus the concatenated
/// forward-final / backward-final state.
pub struct Encoded<B: Backend> {
    /// [N, L, 2 * hidden]
    pub outputs: Tensor<B, 3>,
    /// [N, 2 * hidden]
    pub final_state: Tensor<B, 2>,
}

/// The encoder contract shared by both variants.
pub trait SequenceEncode<B: Backend> {
    /// input: [N, L, F], lengths: [N] → Encoded
    fn encode(&self, input: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Encoded<B>;
}

// ─── NativeGruEncoder ─────────────────────────────────────────────────────────
/// Length-exact scan: rows stop updating at their true length and
/// report zeros past it, so a zero-length row keeps the all-zero
/// initial state end to end.
#[derive(Module, Debug)]
pub struct NativeGruEncoder<B: Backend> {
    forward_cell:  GruCell<B>,
    backward_cell: GruCell<B>,
    dropout:       Dropout,
    hidden:        usize,
}

#[derive(Config, Debug)]
pub struct NativeGruEncoderConfig {
    pub input_size:  usize,
    pub hidden_size: usize,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl NativeGruEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> NativeGruEncoder<B> {
        NativeGruEncoder {
            forward_cell:  GruCellConfig::new(self.input_size, self.hidden_size).init(device),
            backward_cell: GruCellConfig::new(self.input_size, self.hidden_size).init(device),
            dropout:       DropoutConfig::new(self.dropout).init(),
            hidden:        self.hidden_size,
        }
    }
}

impl<B: Backend> SequenceEncode<B> for NativeGruEncoder<B> {
    fn encode(&self, input: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Encoded<B> {
        let [n, l, f] = input.dims();
        let device = input.device();

        let (fw_out, fw_final) = scan_masked(&self.forward_cell, input.clone(), lengths.clone());

        // Reverse each row's valid prefix, scan forward, restore order.
        let rev = reverse_indices(lengths.clone(), n, l, &device);
        let rev_in  = rev.clone().unsqueeze_dim::<3>(2).expand([n, l, f]);
        let rev_out = rev.unsqueeze_dim::<3>(2).expand([n, l, self.hidden]);

        let reversed = input.gather(1, rev_in);
        let (bw_rev, bw_final) = scan_masked(&self.backward_cell, reversed, lengths);
        let bw_out = bw_rev.gather(1, rev_out);

        let outputs = Tensor::cat(vec![fw_out, bw_out], 2);
        Encoded {
            outputs:     self.dropout.forward(outputs),
            final_state: Tensor::cat(vec![fw_final, bw_final], 1),
        }
    }
}

// ─── FusedGruEncoder ──────────────────────────────────────────────────────────
/// Whole-sequence scan over the padded tensor; padding positions run
/// through the cells and downstream masks discount them. The final
/// state is taken at the padded boundary, so call sites that need an
/// exact final state use the Native variant.
#[derive(Module, Debug)]
pub struct FusedGruEncoder<B: Backend> {
    forward_cell:  GruCell<B>,
    backward_cell: GruCell<B>,
    dropout:       Dropout,
}

#[derive(Config, Debug)]
pub struct FusedGruEncoderConfig {
    pub input_size:  usize,
    pub hidden_size: usize,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl FusedGruEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> FusedGruEncoder<B> {
        FusedGruEncoder {
            forward_cell:  GruCellConfig::new(self.input_size, self.hidden_size).init(device),
            backward_cell: GruCellConfig::new(self.input_size, self.hidden_size).init(device),
            dropout:       DropoutConfig::new(self.dropout).init(),
        }
    }
}

impl<B: Backend> SequenceEncode<B> for FusedGruEncoder<B> {
    fn encode(&self, input: Tensor<B, 3>, _lengths: Tensor<B, 1, Int>) -> Encoded<B> {
        let (fw_out, fw_final) = scan_plain(&self.forward_cell, input.clone());
        let (bw_rev, bw_final) = scan_plain(&self.backward_cell, input.flip([1]));
        let bw_out = bw_rev.flip([1]);

        let outputs = Tensor::cat(vec![fw_out, bw_out], 2);
        Encoded {
            outputs:     self.dropout.forward(outputs),
            final_state: Tensor::cat(vec![fw_final, bw_final], 1),
        }
    }
}

// ─── SequenceEncoder ──────────────────────────────────────────────────────────
/// The construction-time choice between the two variants.
#[derive(Module, Debug)]
pub enum SequenceEncoder<B: Backend> {
    Native(NativeGruEncoder<B>),
    Fused(FusedGruEncoder<B>),
}

#[derive(Config, Debug)]
pub struct SequenceEncoderConfig {
    pub input_size:  usize,
    pub hidden_size: usize,
    pub kind:        EncoderKind,
    #[config(default = 0.0)]
    pub dropout: f64,
}

impl SequenceEncoderConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> SequenceEncoder<B> {
        match self.kind {
            EncoderKind::Native => SequenceEncoder::Native(
                NativeGruEncoderConfig::new(self.input_size, self.hidden_size)
                    .with_dropout(self.dropout)
                    .init(device),
            ),
            EncoderKind::Fused => SequenceEncoder::Fused(
                FusedGruEncoderConfig::new(self.input_size, self.hidden_size)
                    .with_dropout(self.dropout)
                    .init(device),
            ),
        }
    }
}

impl<B: Backend> SequenceEncode<B> for SequenceEncoder<B> {
    fn encode(&self, input: Tensor<B, 3>, lengths: Tensor<B, 1, Int>) -> Encoded<B> {
        match self {
            SequenceEncoder::Native(enc) => enc.encode(input, lengths),
            SequenceEncoder::Fused(enc)  => enc.encode(input, lengths),
        }
    }
}

// ─── Scan primitives ──────────────────────────────────────────────────────────

/// Length-aware scan. At step t a row is alive while t < length;
/// dead rows keep their frozen state and emit zeros.
fn scan_masked<B: Backend>(
    cell:    &GruCell<B>,
    input:   Tensor<B, 3>,
    lengths: Tensor<B, 1, Int>,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let [n, l, f] = input.dims();
    let hidden = cell.hidden_size();
    let device = input.device();

    let mut state = Tensor::<B, 2>::zeros([n, hidden], &device);
    let mut steps = Vec::with_capacity(l);

    for t in 0..l {
        let x_t = input.clone().slice([0..n, t..t + 1, 0..f]).squeeze::<2>(1);
        let next = cell.step(x_t, state.clone());

        let alive = lengths
            .clone()
            .greater_elem(t as i64)
            .reshape([n, 1])
            .expand([n, hidden]);

        state = state.mask_where(alive.clone(), next);
        steps.push(state.clone().mask_fill(alive.bool_not(), 0.0));
    }

    (Tensor::stack::<3>(steps, 1), state)
}

/// Plain scan over the full padded axis, no per-step masking.
fn scan_plain<B: Backend>(
    cell:  &GruCell<B>,
    input: Tensor<B, 3>,
) -> (Tensor<B, 3>, Tensor<B, 2>) {
    let [n, l, f] = input.dims();
    let hidden = cell.hidden_size();
    let device = input.device();

    let mut state = Tensor::<B, 2>::zeros([n, hidden], &device);
    let mut steps = Vec::with_capacity(l);

    for t in 0..l {
        let x_t = input.clone().slice([0..n, t..t + 1, 0..f]).squeeze::<2>(1);
        state = cell.step(x_t, state);
        steps.push(state.clone());
    }

    (Tensor::stack::<3>(steps, 1), state)
}

/// Index map that reverses each row's valid prefix and leaves the
/// padded tail in place: idx(i) = len - 1 - i for i < len, else i.
fn reverse_indices<B: Backend>(
    lengths: Tensor<B, 1, Int>,
    n:       usize,
    l:       usize,
    device:  &B::Device,
) -> Tensor<B, 2, Int> {
    let pos = Tensor::<B, 1, Int>::arange(0..l as i64, device)
        .reshape([1, l])
        .expand([n, l]);
    let len = lengths.reshape([n, 1]).expand([n, l]);

    let reversed = len.clone().sub(pos.clone()).sub_scalar(1);
    let in_prefix = pos.clone().lower(len);
    pos.mask_where(in_prefix, reversed)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::ndarray::NdArrayDevice;

    type TB = burn::backend::NdArray;

    fn device() -> NdArrayDevice {
        NdArrayDevice::Default
    }

    fn lengths_of(values: [i64; 2]) -> Tensor<TB, 1, Int> {
        Tensor::from_ints(values, &device())
    }

    #[test]
    fn test_native_encoder_zero_length_row_stays_zero() {
        let enc = NativeGruEncoderConfig::new(3, 4).init::<TB>(&device());
        let input = Tensor::<TB, 3>::ones([2, 5, 3], &device());
        let out = enc.encode(input, lengths_of([5, 0]));

        let outputs: Vec<f32> = out.outputs.into_data().iter::<f32>().collect();
        // second row: positions 5..10 of the [2, 5, 8] output block
        let second_row = &outputs[5 * 8..];
        assert!(second_row.iter().all(|v| *v == 0.0));

        let finals: Vec<f32> = out.final_state.into_data().iter::<f32>().collect();
        assert!(finals[8..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_native_encoder_zeroes_outputs_past_true_length() {
        let enc = NativeGruEncoderConfig::new(3, 4).init::<TB>(&device());
        let input = Tensor::<TB, 3>::ones([2, 5, 3], &device());
        let out = enc.encode(input, lengths_of([5, 2]));

        let outputs: Vec<f32> = out.outputs.into_data().iter::<f32>().collect();
        let row = &outputs[5 * 8..];
        assert!(row[..2 * 8].iter().any(|v| *v != 0.0));
        assert!(row[2 * 8..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_native_encoder_ignores_padding_content() {
        // Two rows with identical valid prefixes but different padding
        // content must encode the valid region identically.
        let enc = NativeGruEncoderConfig::new(2, 3).init::<TB>(&device());
        let a = Tensor::<TB, 3>::from_floats(
            [[[1.0, 2.0], [3.0, 4.0], [0.0, 0.0]]],
            &device(),
        );
        let b = Tensor::<TB, 3>::from_floats(
            [[[1.0, 2.0], [3.0, 4.0], [9.0, -9.0]]],
            &device(),
        );
        let lengths = Tensor::<TB, 1, Int>::from_ints([2], &device());

        let out_a: Vec<f32> = enc
            .encode(a, lengths.clone())
            .outputs
            .into_data()
            .iter::<f32>()
            .collect();
        let out_b: Vec<f32> = enc.encode(b, lengths).outputs.into_data().iter::<f32>().collect();
        assert_eq!(out_a, out_b);
    }

    #[test]
    fn test_encoder_output_width_is_twice_hidden() {
        for kind in [EncoderKind::Native, EncoderKind::Fused] {
            let enc = SequenceEncoderConfig::new(3, 4, kind).init::<TB>(&device());
            let input = Tensor::<TB, 3>::ones([2, 5, 3], &device());
            let out = enc.encode(input, lengths_of([5, 3]));
            assert_eq!(out.outputs.dims(), [2, 5, 8]);
            assert_eq!(out.final_state.dims(), [2, 8]);
        }
    }

    #[test]
    fn test_reverse_indices_reverse_prefix_only() {
        let idx = reverse_indices::<TB>(
            Tensor::from_ints([3], &device()),
            1,
            5,
            &device(),
        );
        let idx: Vec<i64> = idx.into_data().iter::<i64>().collect();
        assert_eq!(idx, vec![2, 1, 0, 3, 4]);
    }

    #[test]
    fn test_gru_cell_step_shape() {
        let cell = GruCellConfig::new(3, 4).init::<TB>(&device());
        let out = cell.step(
            Tensor::<TB, 2>::ones([2, 3], &device()),
            Tensor::<TB, 2>::zeros([2, 4], &device()),
        );
        assert_eq!(out.dims(), [2, 4]);
    }
}
