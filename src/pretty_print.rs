use std::fmt::{self, Debug, Display};

use crate::{Scalar, TransferFunction};

/// Renders a layer as `a_k = phi([w] a_{k-1} + [b])`, one row per output unit.
pub struct PrettyPrintLayer<'a, T> {
    i_layer: usize,
    n_inputs: usize,
    n_outputs: usize,
    phi: TransferFunction<T>,
    params: &'a [T],
}

impl<'a, T: Scalar> PrettyPrintLayer<'a, T> {
    pub(crate) fn new(
        i_layer: usize,
        n_inputs: usize,
        n_outputs: usize,
        phi: TransferFunction<T>,
        params: &'a [T],
    ) -> Self {
        Self {
            i_layer,
            n_inputs,
            n_outputs,
            phi,
            params,
        }
    }
}

impl<T: Scalar> Debug for PrettyPrintLayer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        Display::fmt(self, f)
    }
}

fn n_digits(u: usize) -> usize {
    match u {
        0 => 1,
        u => ((u as f32).log10() + 1.0) as usize,
    }
}

fn write_element<T: Scalar>(f: &mut fmt::Formatter, element: T) -> fmt::Result {
    if element.is_sign_positive() {
        write!(f, " {:.04?}", element)
    } else {
        write!(f, "{:.04?}", element)
    }
}

impl<T: Scalar> Display for PrettyPrintLayer<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let center_line = self.n_outputs / 2;
        let phi = self.phi.name();
        let i_layer = self.i_layer;
        let i_layer_length = n_digits(i_layer);
        let previous_name_length = match i_layer.checked_sub(1) {
            None => 1, // "x"
            Some(i_previous) => 2 + n_digits(i_previous),
        };
        for (i_line, unit) in self.params.chunks_exact(self.n_inputs + 1).enumerate() {
            let (bias, weights) = (unit[0], &unit[1..]);
            if i_line == center_line {
                write!(f, "a_{i_layer} = {phi}(")?;
            } else {
                write!(f, "{:width$}", "", width = 6 + phi.len() + i_layer_length)?;
            }
            write!(f, "[")?;
            for (i, &element) in weights.iter().enumerate() {
                if i != 0 {
                    write!(f, " ")?;
                }
                write_element(f, element)?;
            }
            write!(f, "]")?;
            if i_line == center_line {
                match i_layer.checked_sub(1) {
                    None => write!(f, " x + ")?,
                    Some(i_previous) => write!(f, " a_{i_previous} + ")?,
                }
            } else {
                write!(f, "{:width$}", "", width = 4 + previous_name_length)?;
            }
            write!(f, "[")?;
            write_element(f, bias)?;
            write!(f, "]")?;
            if i_line == center_line {
                write!(f, ")")?;
            }
            if i_line != self.n_outputs - 1 {
                writeln!(f)?;
            }
        }
        Ok(())
    }
}
