//! Reusable scratch memory for [`Network`](crate::Network) inference and training.
//!
//! Buffers only ever grow, so one buffer can be handed to many calls on networks of any shape
//! without reallocating once it has reached the largest size seen.

mod compute_buffer;
mod train_buffer;

pub use compute_buffer::ComputeBuffer;
pub use train_buffer::TrainBuffer;

/// Grows `v` to at least `n` elements and returns its first `n`.
///
/// Elements past the previous length are zeroed; everything else keeps whatever the last user
/// left there.
#[inline]
pub(crate) fn grow<T: crate::Scalar>(v: &mut Vec<T>, n: usize) -> &mut [T] {
    if v.len() < n {
        tracing::trace!(from = v.len(), to = n, "growing scratch buffer");
        v.resize(n, T::zero());
    }
    &mut v[..n]
}
