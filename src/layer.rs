use faer::prelude::*;
use rand::{Rng, distr::uniform::SampleRange};

use crate::{
    Error, PrettyPrintLayer, Result, Scalar, TransferFunction,
    error::check_len,
};

/// One fully-connected transform followed by a transfer function.
///
/// Parameters live in a single flat store of `(n_inputs + 1) * n_outputs` scalars. Each output
/// unit owns a contiguous run: its bias, then one weight per input. So the bias of output `o` is
/// at `o * (n_inputs + 1)` and the weight from input `i` to output `o` at
/// `o * (n_inputs + 1) + i + 1`.
///
/// `S` is the storage: a boxed slice by default, but any `AsRef<[T]> + AsMut<[T]>` of the right
/// length works (a `Vec`, a fixed-size array, a borrowed slice).
#[derive(Debug, Clone)]
pub struct Layer<T: Scalar, S = Box<[T]>> {
    n_inputs: usize,
    n_outputs: usize,
    phi: TransferFunction<T>,
    w: S,
}

impl<T: Scalar> Layer<T> {
    /// Creates a layer with all weights and biases zeroed.
    pub fn new(
        n_inputs: usize,
        n_outputs: usize,
        phi: impl Into<TransferFunction<T>>,
    ) -> Result<Self> {
        if n_inputs == 0 || n_outputs == 0 {
            return Err(Error::EmptyTopology);
        }
        let w: Box<[T]> = bytemuck::zeroed_slice_box(Self::store_len(n_inputs, n_outputs));
        Ok(Self {
            n_inputs,
            n_outputs,
            phi: phi.into(),
            w,
        })
    }
}

impl<T: Scalar, S: AsRef<[T]> + AsMut<[T]>> Layer<T, S> {
    /// Wraps caller-provided parameter storage laid out as described on [`Layer`].
    pub fn from_storage(
        n_inputs: usize,
        n_outputs: usize,
        phi: impl Into<TransferFunction<T>>,
        storage: S,
    ) -> Result<Self> {
        if n_inputs == 0 || n_outputs == 0 {
            return Err(Error::EmptyTopology);
        }
        check_len(
            "weight storage",
            Self::store_len(n_inputs, n_outputs),
            storage.as_ref().len(),
        )?;
        Ok(Self {
            n_inputs,
            n_outputs,
            phi: phi.into(),
            w: storage,
        })
    }

    pub fn into_storage(self) -> S {
        self.w
    }

    const fn store_len(n_inputs: usize, n_outputs: usize) -> usize {
        (n_inputs + 1) * n_outputs
    }

    #[inline(always)]
    fn stride(&self) -> usize {
        self.n_inputs + 1
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Length of the flat parameter store, biases included.
    pub fn n_weights(&self) -> usize {
        self.w.as_ref().len()
    }

    pub fn transfer_function(&self) -> TransferFunction<T> {
        self.phi
    }

    /// Flat access into the parameter store.
    #[track_caller]
    pub fn weight(&self, index: usize) -> T {
        self.w.as_ref()[index]
    }

    #[track_caller]
    pub fn weight_mut(&mut self, index: usize) -> &mut T {
        &mut self.w.as_mut()[index]
    }

    /// Weight from input `i_in` to output `i_out`.
    #[track_caller]
    pub fn weight_at(&self, i_in: usize, i_out: usize) -> T {
        assert!(i_in < self.n_inputs, "input index {i_in} out of range");
        self.w.as_ref()[i_out * self.stride() + i_in + 1]
    }

    #[track_caller]
    pub fn weight_at_mut(&mut self, i_in: usize, i_out: usize) -> &mut T {
        assert!(i_in < self.n_inputs, "input index {i_in} out of range");
        let index = i_out * self.stride() + i_in + 1;
        &mut self.w.as_mut()[index]
    }

    #[track_caller]
    pub fn bias(&self, i_out: usize) -> T {
        assert!(i_out < self.n_outputs, "output index {i_out} out of range");
        self.w.as_ref()[i_out * self.stride()]
    }

    #[track_caller]
    pub fn bias_mut(&mut self, i_out: usize) -> &mut T {
        assert!(i_out < self.n_outputs, "output index {i_out} out of range");
        let index = i_out * self.stride();
        &mut self.w.as_mut()[index]
    }

    /// Direct access to the parameter store.
    /// Useful for dumping/loading params from file.
    pub fn as_slice(&self) -> &[T] {
        self.w.as_ref()
    }

    /// Direct access to the parameter store.
    /// Useful for dumping/loading params from file.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        self.w.as_mut()
    }

    /// `n_outputs × n_inputs` view of the weights, biases skipped.
    pub fn weights_mat(&self) -> MatRef<'_, T> {
        let w = self.w.as_ref();
        // Safety: row `o` starts at `o * stride + 1` and spans `n_inputs` elements, the last one
        // ending at `n_outputs * stride`, which is the length of the store.
        unsafe {
            MatRef::from_raw_parts(
                w.as_ptr().add(1),
                self.n_outputs,
                self.n_inputs,
                self.stride() as isize,
                1,
            )
        }
    }

    /// Column of biases, one per output unit.
    pub fn biases_col(&self) -> ColRef<'_, T> {
        let w = self.w.as_ref();
        // Safety: the last bias sits at `(n_outputs - 1) * stride`, inside the store.
        unsafe { ColRef::from_raw_parts(w.as_ptr(), self.n_outputs, self.stride() as isize) }
    }

    pub fn randomize(&mut self, range: impl SampleRange<T> + Clone) {
        self.randomize_with(&mut rand::rng(), range);
    }

    pub fn randomize_with(&mut self, rng: &mut impl Rng, range: impl SampleRange<T> + Clone) {
        for p in self.as_mut_slice() {
            *p = rng.random_range(range.clone());
        }
    }

    pub fn pretty_print(&self, i_layer: usize) -> PrettyPrintLayer<'_, T> {
        PrettyPrintLayer::new(i_layer, self.n_inputs, self.n_outputs, self.phi, self.as_slice())
    }

    /// Evaluates the layer: `output[o] = transfer(bias(o) + Σ input[i] * weight(i, o))`.
    pub fn compute(&self, input: &[T], output: &mut [T]) -> Result<()> {
        check_len("layer input", self.n_inputs, input.len())?;
        check_len("layer output", self.n_outputs, output.len())?;
        self.compute_unchecked(input, output);
        Ok(())
    }

    /// [`Layer::compute`] without the length checks.
    /// Slices longer than the layer's shape are read/written only up to that shape.
    #[inline]
    pub(crate) fn compute_unchecked(&self, input: &[T], output: &mut [T]) {
        debug_assert!(input.len() >= self.n_inputs);
        debug_assert!(output.len() >= self.n_outputs);
        let input = &input[..self.n_inputs];
        for (unit, out) in self.w.as_ref().chunks_exact(self.stride()).zip(output) {
            let (bias, weights) = (unit[0], &unit[1..]);
            let mut v = bias;
            for (&x, &w) in input.iter().zip(weights) {
                v = v + x * w;
            }
            *out = self.phi.transfer(v);
        }
    }

    /// One step of gradient descent given this layer's `input`/`output` from a prior
    /// [`Layer::compute`] and one `target` per output unit.
    ///
    /// For every output unit `delta = derivative(output) * (output - target)`; its bias and
    /// weights move by `-rate * delta` (times the input for weights). `back` receives
    /// `input[i] - Σ_o delta_o * weight(i, o)`, summed over the weights as they were before this
    /// step. Fed back as the previous layer's `target`, that makes the previous layer's delta
    /// `derivative · Σ delta · weight`, i.e. ordinary backpropagation.
    pub fn train(
        &mut self,
        rate: T,
        input: &[T],
        output: &[T],
        target: &[T],
        back: &mut [T],
    ) -> Result<()> {
        check_len("layer input", self.n_inputs, input.len())?;
        check_len("layer output", self.n_outputs, output.len())?;
        check_len("layer target", self.n_outputs, target.len())?;
        check_len("layer back signal", self.n_inputs, back.len())?;
        self.train_unchecked(rate, input, output, target, back);
        Ok(())
    }

    /// [`Layer::train`] without the length checks.
    #[inline]
    pub(crate) fn train_unchecked(
        &mut self,
        rate: T,
        input: &[T],
        output: &[T],
        target: &[T],
        back: &mut [T],
    ) {
        debug_assert!(input.len() >= self.n_inputs);
        debug_assert!(output.len() >= self.n_outputs);
        debug_assert!(target.len() >= self.n_outputs);
        debug_assert!(back.len() >= self.n_inputs);
        let n_inputs = self.n_inputs;
        let stride = self.stride();
        let phi = self.phi;
        let input = &input[..n_inputs];
        let back = &mut back[..n_inputs];
        back.copy_from_slice(input);
        let units = self.w.as_mut().chunks_exact_mut(stride);
        for ((unit, &y), &t) in units.zip(output).zip(target) {
            let delta = phi.derivative(y) * (y - t);
            let (bias, weights) = unit.split_at_mut(1);
            bias[0] = bias[0] - rate * delta;
            for ((w, &x), b) in weights.iter_mut().zip(input).zip(back.iter_mut()) {
                *b = *b - delta * *w;
                *w = *w - rate * delta * x;
            }
        }
    }
}
