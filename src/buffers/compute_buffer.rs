use crate::{Scalar, buffers::grow};

/// A pair of scratch vectors that inference ping-pongs between.
#[derive(Debug, Clone, Default)]
pub struct ComputeBuffer<T> {
    pub(crate) a: Vec<T>,
    pub(crate) b: Vec<T>,
}

impl<T: Scalar> ComputeBuffer<T> {
    pub fn new() -> Self {
        Self {
            a: Vec::new(),
            b: Vec::new(),
        }
    }

    /// Pre-sizes both halves, e.g. to the widest layer of a network.
    pub fn with_len(n: usize) -> Self {
        Self {
            a: vec![T::zero(); n],
            b: vec![T::zero(); n],
        }
    }

    /// Grows `a` to at least `n` and returns its first `n` elements for writing.
    pub fn begin_a(&mut self, n: usize) -> &mut [T] {
        grow(&mut self.a, n)
    }

    /// Grows `b` to at least `n` and returns its first `n` elements for writing.
    pub fn begin_b(&mut self, n: usize) -> &mut [T] {
        grow(&mut self.b, n)
    }

    /// Everything `a` holds, including elements past the last write.
    pub fn a(&self) -> &[T] {
        &self.a
    }

    /// Everything `b` holds, including elements past the last write.
    pub fn b(&self) -> &[T] {
        &self.b
    }
}
