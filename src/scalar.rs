use std::fmt::Debug;

use bytemuck::Zeroable;
use num_traits::Float;
use rand::distr::uniform::SampleUniform;

/// Numeric type the engine computes in.
///
/// Blanket-implemented, so `f32` and `f64` both qualify.
pub trait Scalar: Float + Zeroable + SampleUniform + Debug + Send + Sync + 'static {}

impl<T> Scalar for T where T: Float + Zeroable + SampleUniform + Debug + Send + Sync + 'static {}
