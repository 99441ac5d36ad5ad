pub use faer;

mod activation;
mod buffers;
mod error;
mod layer;
mod nn;
mod pretty_print;
mod scalar;

pub use activation::*;
pub use buffers::*;
pub use error::{Error, Result};
pub use layer::*;
pub use nn::*;
pub use pretty_print::*;
pub use scalar::*;
