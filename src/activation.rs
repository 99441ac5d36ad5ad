use std::fmt::{self, Debug};

use crate::{Error, Result, Scalar};

/// A neuron's nonlinearity as a plain value: activation, derivative and an optional inverse.
///
/// `derivative` takes the *output* `y = transfer(x)` rather than `x`, so training never has to
/// keep the weighted sums around.
#[derive(Clone, Copy)]
pub struct TransferFunction<T> {
    name: &'static str,
    transfer: fn(T) -> T,
    derivative: fn(T) -> T,
    inverse: Option<fn(T) -> T>,
}

impl<T> Debug for TransferFunction<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Debug::fmt(self.name, f)
    }
}

impl<T: Scalar> TransferFunction<T> {
    pub fn new<Phi: ActivationFunction>(_: Phi) -> Self {
        Self {
            name: Phi::NAME,
            transfer: Phi::transfer::<T>,
            derivative: Phi::derivative::<T>,
            inverse: Phi::inverse::<T>(),
        }
    }

    pub const fn from_fns(
        name: &'static str,
        transfer: fn(T) -> T,
        derivative: fn(T) -> T,
        inverse: Option<fn(T) -> T>,
    ) -> Self {
        Self {
            name,
            transfer,
            derivative,
            inverse,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline(always)]
    pub fn transfer(&self, x: T) -> T {
        (self.transfer)(x)
    }

    /// Derivative of `transfer` at the point whose output is `y`.
    #[inline(always)]
    pub fn derivative(&self, y: T) -> T {
        (self.derivative)(y)
    }

    /// Recovers the weighted sum from an activation.
    pub fn inverse(&self, y: T) -> Result<T> {
        match self.inverse {
            Some(inverse) => Ok(inverse(y)),
            None => Err(Error::UnsupportedOperation {
                operation: "inverse",
                function: self.name,
            }),
        }
    }

    pub fn has_inverse(&self) -> bool {
        self.inverse.is_some()
    }

    /// Applies `transfer` element-wise.
    pub fn transfer_slice(&self, xs: &[T], ys: &mut [T]) -> Result<()> {
        crate::error::check_len("transfer output", xs.len(), ys.len())?;
        for (y, &x) in ys.iter_mut().zip(xs) {
            *y = self.transfer(x);
        }
        Ok(())
    }
}

impl<T: Scalar> Default for TransferFunction<T> {
    fn default() -> Self {
        Self::new(Sigmoid)
    }
}

/// A statically known transfer function, usable for any [`Scalar`].
pub trait ActivationFunction: Copy + Send + Sync + 'static {
    const NAME: &'static str;

    fn transfer<T: Scalar>(x: T) -> T;

    fn derivative<T: Scalar>(y: T) -> T;

    fn inverse<T: Scalar>() -> Option<fn(T) -> T> {
        None
    }
}

macro_rules! impl_into_transfer_function {
    ($($phi:ident),* $(,)?) => {
        $(
            impl<T: Scalar> From<$phi> for TransferFunction<T> {
                fn from(phi: $phi) -> Self {
                    Self::new(phi)
                }
            }
        )*
    };
}

impl_into_transfer_function!(Identity, Sigmoid, Heaviside, HyperbolicTangent);

pub use activation_functions::*;

pub mod activation_functions {
    use super::ActivationFunction;
    use crate::Scalar;

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Identity;
    impl ActivationFunction for Identity {
        const NAME: &'static str = "identity";

        fn transfer<T: Scalar>(x: T) -> T {
            x
        }

        fn derivative<T: Scalar>(_: T) -> T {
            T::one()
        }

        fn inverse<T: Scalar>() -> Option<fn(T) -> T> {
            Some(|y| y)
        }
    }

    /// Logistic sigmoid, `1 / (1 + e^-x)`.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Sigmoid;
    impl ActivationFunction for Sigmoid {
        const NAME: &'static str = "sigmoid";

        fn transfer<T: Scalar>(x: T) -> T {
            T::one() / (T::one() + (-x).exp())
        }

        fn derivative<T: Scalar>(y: T) -> T {
            y * (T::one() - y)
        }

        fn inverse<T: Scalar>() -> Option<fn(T) -> T> {
            Some(|y| (-y / (y - T::one())).ln())
        }
    }

    /// Unit step, `1` for `x >= 0` and `0` otherwise.
    ///
    /// The derivative is the constant `1` so the step can be trained with the same update rule;
    /// there is no inverse.
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct Heaviside;
    impl ActivationFunction for Heaviside {
        const NAME: &'static str = "heaviside";

        fn transfer<T: Scalar>(x: T) -> T {
            if x >= T::zero() { T::one() } else { T::zero() }
        }

        fn derivative<T: Scalar>(_: T) -> T {
            T::one()
        }
    }

    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct HyperbolicTangent;
    impl ActivationFunction for HyperbolicTangent {
        const NAME: &'static str = "tanh";

        fn transfer<T: Scalar>(x: T) -> T {
            x.tanh()
        }

        fn derivative<T: Scalar>(y: T) -> T {
            T::one() - y * y
        }

        fn inverse<T: Scalar>() -> Option<fn(T) -> T> {
            Some(|y| y.atanh())
        }
    }
}
