use derive_more::{Display, Error};

/// Precondition failures reported by layers, networks and transfer functions.
///
/// Every fallible operation checks its arguments before touching any state, so an `Err` means
/// nothing was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum Error {
    /// A buffer's length disagrees with the shape it is used against.
    #[display("dimension mismatch for {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
    /// The transfer function does not provide the requested operation.
    #[display("`{function}` does not support {operation}")]
    UnsupportedOperation {
        operation: &'static str,
        function: &'static str,
    },
    /// A network without layers, or a layer with a zero dimension.
    #[display("topology has no layers or a layer of size zero")]
    EmptyTopology,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Fails with [`Error::DimensionMismatch`] unless `actual == expected`.
#[inline]
pub(crate) fn check_len(what: &'static str, expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(Error::DimensionMismatch {
            what,
            expected,
            actual,
        })
    }
}
