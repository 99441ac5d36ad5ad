use derive_more::{Deref, DerefMut};

use crate::{ComputeBuffer, Scalar};

/// One [`ComputeBuffer`] per network layer, kept across a whole training step.
///
/// After the forward pass slot `k`'s `a` holds layer `k`'s outputs. During the backward pass
/// slot `k`'s `b`, sized to layer `k`'s input count, receives the signal layer `k - 1` trains
/// against.
#[derive(Debug, Clone, Default, Deref, DerefMut)]
pub struct TrainBuffer<T>(Vec<ComputeBuffer<T>>);

impl<T: Scalar> TrainBuffer<T> {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Grows the buffer to at least `n_layers` slots and returns the first `n_layers`.
    pub fn begin(&mut self, n_layers: usize) -> &mut [ComputeBuffer<T>] {
        if self.0.len() < n_layers {
            tracing::trace!(from = self.0.len(), to = n_layers, "growing train buffer");
            self.0.resize_with(n_layers, ComputeBuffer::new);
        }
        &mut self.0[..n_layers]
    }

    /// Outputs of layer `i_layer` from the last training step, or `None` if no step has used
    /// that many layers yet.
    pub fn layer_output(&self, i_layer: usize, n_outputs: usize) -> Option<&[T]> {
        self.0.get(i_layer)?.a.get(..n_outputs)
    }
}
