use std::iter;

use rand::{Rng, distr::uniform::SampleRange};
use rayon::prelude::*;
use tracing::{debug, trace_span};

use crate::{
    ComputeBuffer, Error, Layer, Result, Scalar, TrainBuffer, TransferFunction,
    buffers::grow,
    error::check_len,
};

#[derive(Debug, Clone)]
pub struct Topology<T: Scalar> {
    n_inputs: usize,
    layer_descriptions: Vec<LayerDescription<T>>,
}

impl<T: Scalar> Topology<T> {
    /// Fails with [`Error::EmptyTopology`] if there are no layers or any size is zero.
    pub fn new(n_inputs: usize, layer_descriptions: Vec<LayerDescription<T>>) -> Result<Self> {
        if n_inputs == 0
            || layer_descriptions.is_empty()
            || layer_descriptions.iter().any(|layer| layer.n_neurons == 0)
        {
            return Err(Error::EmptyTopology);
        }
        Ok(Self {
            n_inputs,
            layer_descriptions,
        })
    }

    /// Every layer uses the same transfer function.
    pub fn uniform(
        n_inputs: usize,
        layer_sizes: &[usize],
        phi: impl Into<TransferFunction<T>>,
    ) -> Result<Self> {
        let phi = phi.into();
        let layer_descriptions = layer_sizes
            .iter()
            .map(|&n_neurons| LayerDescription::new(n_neurons, phi))
            .collect();
        Self::new(n_inputs, layer_descriptions)
    }

    pub fn n_inputs(&self) -> usize {
        self.n_inputs
    }

    pub fn n_outputs(&self) -> usize {
        self.layer_descriptions
            .last()
            .map_or(self.n_inputs, |last_layer| last_layer.n_neurons)
    }

    pub fn layer_descriptions(&self) -> &[LayerDescription<T>] {
        &self.layer_descriptions
    }

    pub fn n_layers(&self) -> usize {
        self.layer_descriptions().len()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LayerDescription<T: Scalar> {
    pub n_neurons: usize,
    pub phi: TransferFunction<T>,
}

impl<T: Scalar> LayerDescription<T> {
    pub fn new(n_neurons: usize, phi: impl Into<TransferFunction<T>>) -> Self {
        Self {
            n_neurons,
            phi: phi.into(),
        }
    }
}

/// A chain of fully-connected layers, layer `k`'s outputs feeding layer `k + 1`'s inputs.
#[derive(Debug, Clone)]
pub struct Network<T: Scalar, S = Box<[T]>> {
    layers: Vec<Layer<T, S>>,
}

impl<T: Scalar> Network<T> {
    /// `layer_sizes` lists each layer's output count; the first layer reads `n_inputs` values.
    pub fn new(
        n_inputs: usize,
        layer_sizes: &[usize],
        phi: impl Into<TransferFunction<T>>,
    ) -> Result<Self> {
        Self::from_topology(&Topology::uniform(n_inputs, layer_sizes, phi)?)
    }

    pub fn from_topology(topology: &Topology<T>) -> Result<Self> {
        let mut n_previous = topology.n_inputs();
        let mut layers = Vec::with_capacity(topology.n_layers());
        for layer_description in topology.layer_descriptions() {
            let n = layer_description.n_neurons;
            layers.push(Layer::new(n_previous, n, layer_description.phi)?);
            n_previous = n;
        }
        debug!(
            n_inputs = topology.n_inputs(),
            n_outputs = topology.n_outputs(),
            n_layers = topology.n_layers(),
            "created network"
        );
        Ok(Self { layers })
    }
}

impl<T: Scalar, S: AsRef<[T]> + AsMut<[T]>> Network<T, S> {
    /// Chains already-built layers, checking that each one reads what the previous one writes.
    pub fn from_layers(layers: Vec<Layer<T, S>>) -> Result<Self> {
        if layers.is_empty() {
            return Err(Error::EmptyTopology);
        }
        for pair in layers.windows(2) {
            check_len("layer inputs", pair[0].n_outputs(), pair[1].n_inputs())?;
        }
        Ok(Self { layers })
    }

    pub fn into_layers(self) -> Vec<Layer<T, S>> {
        self.layers
    }

    pub fn n_inputs(&self) -> usize {
        self.first_layer().n_inputs()
    }

    pub fn n_outputs(&self) -> usize {
        self.last_layer().n_outputs()
    }

    pub fn n_layers(&self) -> usize {
        self.layers.len()
    }

    fn first_layer(&self) -> &Layer<T, S> {
        &self.layers[0]
    }

    fn last_layer(&self) -> &Layer<T, S> {
        &self.layers[self.layers.len() - 1]
    }

    /// Returns `None` if `index` is out of range.
    pub fn layer(&self, index: usize) -> Option<&Layer<T, S>> {
        self.layers.get(index)
    }

    /// Returns `None` if `index` is out of range.
    pub fn layer_mut(&mut self, index: usize) -> Option<&mut Layer<T, S>> {
        self.layers.get_mut(index)
    }

    pub fn layers(&self) -> &[Layer<T, S>] {
        &self.layers
    }

    /// Number of values in the widest layer, input included.
    /// A [`ComputeBuffer`] of this length never needs to grow.
    pub fn max_width(&self) -> usize {
        self.layers
            .iter()
            .map(Layer::n_outputs)
            .fold(self.n_inputs(), usize::max)
    }

    pub fn randomize_params(&mut self, range: impl SampleRange<T> + Clone) {
        self.randomize_params_with(&mut rand::rng(), range);
    }

    pub fn randomize_params_with(
        &mut self,
        rng: &mut impl Rng,
        range: impl SampleRange<T> + Clone,
    ) {
        for layer in &mut self.layers {
            layer.randomize_with(rng, range.clone());
        }
    }

    /// Forward pass with a throwaway scratch buffer.
    pub fn compute(&self, input: &[T], output: &mut [T]) -> Result<()> {
        self.compute_buffered(input, output, &mut ComputeBuffer::new())
    }

    /// Forward pass reusing `buffer` as scratch.
    ///
    /// Intermediate activations alternate between `buffer`'s two halves; the last layer writes
    /// straight into `output`.
    pub fn compute_buffered(
        &self,
        input: &[T],
        output: &mut [T],
        buffer: &mut ComputeBuffer<T>,
    ) -> Result<()> {
        check_len("network input", self.n_inputs(), input.len())?;
        check_len("network output", self.n_outputs(), output.len())?;
        self.compute_unchecked(input, output, buffer);
        Ok(())
    }

    fn compute_unchecked(&self, input: &[T], output: &mut [T], buffer: &mut ComputeBuffer<T>) {
        let (last, rest) = match self.layers.split_last() {
            Some((last, [])) => {
                last.compute_unchecked(input, output);
                return;
            }
            Some((last, rest)) => (last, rest),
            None => unreachable!("network without layers"),
        };
        let (first, hidden) = (&rest[0], &rest[1..]);
        first.compute_unchecked(input, buffer.begin_a(first.n_outputs()));
        // Whether the most recent activations are in `a`.
        let mut in_a = true;
        for layer in hidden {
            let ComputeBuffer { a, b } = &mut *buffer;
            let (source, destination) = if in_a { (a, b) } else { (b, a) };
            layer.compute_unchecked(&source[..], grow(destination, layer.n_outputs()));
            in_a = !in_a;
        }
        let source = if in_a { &buffer.a } else { &buffer.b };
        last.compute_unchecked(&source[..], output);
    }

    /// Forward pass over many inputs at once, spread across the rayon thread pool.
    ///
    /// `inputs` holds `n_inputs` values per sample back to back, `outputs` receives `n_outputs`
    /// values per sample. Each worker keeps its own [`ComputeBuffer`].
    pub fn compute_many(&self, inputs: &[T], outputs: &mut [T]) -> Result<()>
    where
        S: Sync,
    {
        let (n_inputs, n_outputs) = (self.n_inputs(), self.n_outputs());
        let n_samples = inputs.len() / n_inputs;
        check_len("network inputs", n_samples * n_inputs, inputs.len())?;
        check_len("network outputs", n_samples * n_outputs, outputs.len())?;
        let width = self.max_width();
        inputs
            .par_chunks_exact(n_inputs)
            .zip(outputs.par_chunks_exact_mut(n_outputs))
            .for_each_init(
                || ComputeBuffer::with_len(width),
                |buffer, (input, output)| self.compute_unchecked(input, output, buffer),
            );
        Ok(())
    }

    /// Sum of squared errors over `samples`, laid out as rows of `n_inputs` inputs followed by
    /// `n_outputs` targets.
    pub fn loss(&self, samples: &[T], buffer: &mut ComputeBuffer<T>) -> Result<T> {
        let (n_inputs, n_outputs) = (self.n_inputs(), self.n_outputs());
        let row = n_inputs + n_outputs;
        check_len("samples", samples.len() / row * row, samples.len())?;
        let mut output = vec![T::zero(); n_outputs];
        let mut loss = T::zero();
        for sample in samples.chunks_exact(row) {
            let (x, y) = sample.split_at(n_inputs);
            self.compute_unchecked(x, &mut output, buffer);
            loss = loss
                + iter::zip(&output, y)
                    .map(|(&ak, &yk)| (ak - yk).powi(2))
                    .fold(T::zero(), |sum, e| sum + e);
        }
        Ok(loss)
    }

    /// One training step with a throwaway buffer.
    pub fn train(&mut self, rate: T, input: &[T], target: &[T]) -> Result<()> {
        self.train_buffered(rate, input, target, &mut TrainBuffer::new())
    }

    /// One step of online gradient descent on a single sample, reusing `buffer`.
    ///
    /// A forward pass records every layer's output in `buffer`, then layers are trained from
    /// last to first, each one against the signal the following layer sent back.
    pub fn train_buffered(
        &mut self,
        rate: T,
        input: &[T],
        target: &[T],
        buffer: &mut TrainBuffer<T>,
    ) -> Result<()> {
        check_len("network input", self.n_inputs(), input.len())?;
        check_len("network target", self.n_outputs(), target.len())?;
        self.train_unchecked(rate, input, target, buffer);
        Ok(())
    }

    fn train_unchecked(&mut self, rate: T, input: &[T], target: &[T], buffer: &mut TrainBuffer<T>) {
        let n_layers = self.n_layers();
        let slots = buffer.begin(n_layers);

        let forward_span = trace_span!("forward", n_layers).entered();
        for (u, layer) in self.layers.iter().enumerate() {
            let (before, after) = slots.split_at_mut(u);
            let a_prev: &[T] = match before.last() {
                None => input,
                Some(previous) => &previous.a[..],
            };
            layer.compute_unchecked(a_prev, after[0].begin_a(layer.n_outputs()));
        }
        drop(forward_span);

        let _backward_span = trace_span!("backward", n_layers).entered();
        for (u, layer) in self.layers.iter_mut().enumerate().rev() {
            let (before, rest) = slots.split_at_mut(u);
            let (current, after) = rest.split_at_mut(1);
            let a_prev: &[T] = match before.last() {
                None => input,
                Some(previous) => &previous.a[..],
            };
            // The last layer trains against the real target, every other one against the
            // signal the next layer just sent back.
            let target: &[T] = match after.first() {
                None => target,
                Some(next) => &next.b[..],
            };
            let ComputeBuffer { a, b } = &mut current[0];
            let back = grow(b, layer.n_inputs());
            layer.train_unchecked(rate, a_prev, &a[..], target, back);
        }
    }

    /// One online pass over `samples` (rows of inputs followed by targets), training on each
    /// row in order.
    pub fn train_epoch(&mut self, rate: T, samples: &[T], buffer: &mut TrainBuffer<T>) -> Result<()> {
        let n_inputs = self.n_inputs();
        let row = n_inputs + self.n_outputs();
        check_len("samples", samples.len() / row * row, samples.len())?;
        for sample in samples.chunks_exact(row) {
            let (x, y) = sample.split_at(n_inputs);
            self.train_unchecked(rate, x, y, buffer);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::{HyperbolicTangent, Identity, Sigmoid};

    fn seeded(n_inputs: usize, layer_sizes: &[usize], seed: u64) -> Network<f64> {
        let mut nn = Network::new(n_inputs, layer_sizes, Sigmoid).unwrap();
        nn.randomize_params_with(&mut StdRng::seed_from_u64(seed), -1.0..1.0);
        nn
    }

    #[test]
    fn shape() {
        let nn = Network::<f32>::new(3, &[5, 4, 2], Sigmoid).unwrap();
        assert_eq!(nn.n_inputs(), 3);
        assert_eq!(nn.n_outputs(), 2);
        assert_eq!(nn.n_layers(), 3);
        assert_eq!(nn.max_width(), 5);
        let shapes: Vec<_> = nn
            .layers()
            .iter()
            .map(|layer| (layer.n_inputs(), layer.n_outputs()))
            .collect();
        assert_eq!(shapes, [(3, 5), (5, 4), (4, 2)]);
        assert!(nn.layer(3).is_none());
    }

    #[test]
    fn empty_topologies() {
        assert_eq!(
            Network::<f32>::new(3, &[], Sigmoid).unwrap_err(),
            Error::EmptyTopology
        );
        assert_eq!(
            Network::<f32>::new(3, &[2, 0, 1], Sigmoid).unwrap_err(),
            Error::EmptyTopology
        );
        assert_eq!(
            Network::<f32, Box<[f32]>>::from_layers(Vec::new()).unwrap_err(),
            Error::EmptyTopology
        );
    }

    #[test]
    fn from_layers_checks_chaining() {
        let layers = vec![
            Layer::<f32>::new(2, 3, Sigmoid).unwrap(),
            Layer::<f32>::new(4, 1, Sigmoid).unwrap(),
        ];
        assert_eq!(
            Network::from_layers(layers).unwrap_err(),
            Error::DimensionMismatch {
                what: "layer inputs",
                expected: 3,
                actual: 4,
            }
        );
    }

    #[test]
    fn mixed_transfer_functions() {
        let topology = Topology::new(
            2,
            vec![
                LayerDescription::new(3, HyperbolicTangent),
                LayerDescription::new(1, Identity),
            ],
        )
        .unwrap();
        assert_eq!(topology.n_outputs(), 1);
        let nn = Network::<f64>::from_topology(&topology).unwrap();
        assert_eq!(nn.layer(0).unwrap().transfer_function().name(), "tanh");
        assert_eq!(nn.layer(1).unwrap().transfer_function().name(), "identity");
    }

    #[test]
    fn chaining_matches_manual_composition() {
        let nn = seeded(3, &[4, 2], 11);
        let input = [0.5, -0.25, 1.0];

        let mut hidden = [0.0; 4];
        let mut expected = [0.0; 2];
        nn.layer(0).unwrap().compute(&input, &mut hidden).unwrap();
        nn.layer(1).unwrap().compute(&hidden, &mut expected).unwrap();

        let mut output = [0.0; 2];
        nn.compute(&input, &mut output).unwrap();
        assert_eq!(output, expected);
    }

    #[test]
    fn deep_ping_pong_matches_manual_composition() {
        let nn = seeded(2, &[3, 5, 1, 4, 2], 5);
        let input = [0.3, 0.7];

        let mut expected = input.to_vec();
        for layer in nn.layers() {
            let mut next = vec![0.0; layer.n_outputs()];
            layer.compute(&expected, &mut next).unwrap();
            expected = next;
        }

        let mut buffer = ComputeBuffer::new();
        let mut output = [0.0; 2];
        nn.compute_buffered(&input, &mut output, &mut buffer).unwrap();
        assert_eq!(output.to_vec(), expected);
        // Never more than two scratch vectors, each as wide as the layers that used it.
        assert_eq!(buffer.a().len(), 3);
        assert_eq!(buffer.b().len(), 5);
    }

    #[test]
    fn compute_checks_lengths() {
        let nn = seeded(2, &[3, 1], 0);
        let mut output = [0.0; 1];
        assert!(matches!(
            nn.compute(&[1.0], &mut output),
            Err(Error::DimensionMismatch { what: "network input", .. })
        ));
        assert!(matches!(
            nn.compute(&[1.0, 2.0], &mut [0.0; 2]),
            Err(Error::DimensionMismatch { what: "network output", .. })
        ));
    }

    #[test]
    fn train_checks_lengths_without_mutating() {
        let mut nn = seeded(2, &[3, 1], 0);
        let before = nn.clone();
        assert!(matches!(
            nn.train(0.5, &[1.0, 2.0], &[0.0, 1.0]),
            Err(Error::DimensionMismatch { what: "network target", .. })
        ));
        assert!(matches!(
            nn.train_epoch(0.5, &[1.0, 2.0, 0.0, 1.0], &mut TrainBuffer::new()),
            Err(Error::DimensionMismatch { what: "samples", .. })
        ));
        for (layer, original) in nn.layers().iter().zip(before.layers()) {
            assert_eq!(layer.as_slice(), original.as_slice());
        }
    }

    #[test]
    fn single_layer_network_equals_layer() {
        let mut nn = seeded(3, &[2], 3);
        let mut layer = nn.layer(0).unwrap().clone();
        let input = [0.1, 0.2, 0.3];
        let target = [1.0, 0.0];

        let mut expected = [0.0; 2];
        layer.compute(&input, &mut expected).unwrap();
        let mut output = [0.0; 2];
        nn.compute(&input, &mut output).unwrap();
        assert_eq!(output, expected);

        let mut back = [0.0; 3];
        layer
            .train(0.3, &input, &expected, &target, &mut back)
            .unwrap();
        let mut buffer = TrainBuffer::new();
        nn.train_buffered(0.3, &input, &target, &mut buffer).unwrap();
        assert_eq!(nn.layer(0).unwrap().as_slice(), layer.as_slice());
        assert_eq!(&buffer[0].b()[..3], &back);
    }

    #[test]
    fn train_buffer_holds_activations() {
        let mut nn = seeded(2, &[3, 2], 9);
        let input = [0.4, 0.6];
        let mut hidden = [0.0; 3];
        let mut output = [0.0; 2];
        nn.layer(0).unwrap().compute(&input, &mut hidden).unwrap();
        nn.layer(1).unwrap().compute(&hidden, &mut output).unwrap();

        let mut buffer = TrainBuffer::new();
        nn.train_buffered(0.1, &input, &[0.0, 1.0], &mut buffer)
            .unwrap();
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.layer_output(0, 3), Some(&hidden[..]));
        assert_eq!(buffer.layer_output(1, 2), Some(&output[..]));
        assert_eq!(buffer[1].b().len(), 3);
        assert_eq!(buffer[0].b().len(), 2);
    }

    /// Plain backpropagation on a two-layer sigmoid network, written out by hand.
    fn reference_step(nn: &Network<f64>, rate: f64, x: &[f64], t: &[f64]) -> Vec<Vec<f64>> {
        let (l0, l1) = (nn.layer(0).unwrap(), nn.layer(1).unwrap());
        let sigmoid = |v: f64| 1.0 / (1.0 + (-v).exp());
        let h: Vec<f64> = (0..l0.n_outputs())
            .map(|o| {
                sigmoid(l0.bias(o) + (0..l0.n_inputs()).map(|i| x[i] * l0.weight_at(i, o)).sum::<f64>())
            })
            .collect();
        let y: Vec<f64> = (0..l1.n_outputs())
            .map(|o| {
                sigmoid(l1.bias(o) + (0..l1.n_inputs()).map(|i| h[i] * l1.weight_at(i, o)).sum::<f64>())
            })
            .collect();
        let delta1: Vec<f64> = (0..y.len()).map(|o| y[o] * (1.0 - y[o]) * (y[o] - t[o])).collect();
        let delta0: Vec<f64> = (0..h.len())
            .map(|i| {
                let error: f64 = (0..y.len()).map(|o| delta1[o] * l1.weight_at(i, o)).sum();
                h[i] * (1.0 - h[i]) * error
            })
            .collect();

        let mut new0 = l0.as_slice().to_vec();
        for o in 0..l0.n_outputs() {
            let stride = l0.n_inputs() + 1;
            new0[o * stride] -= rate * delta0[o];
            for i in 0..l0.n_inputs() {
                new0[o * stride + i + 1] -= rate * delta0[o] * x[i];
            }
        }
        let mut new1 = l1.as_slice().to_vec();
        for o in 0..l1.n_outputs() {
            let stride = l1.n_inputs() + 1;
            new1[o * stride] -= rate * delta1[o];
            for i in 0..l1.n_inputs() {
                new1[o * stride + i + 1] -= rate * delta1[o] * h[i];
            }
        }
        vec![new0, new1]
    }

    #[test]
    fn backward_pass_matches_reference_backpropagation() {
        let mut nn = seeded(3, &[4, 2], 21);
        let (x, t) = ([0.9, -0.3, 0.2], [0.0, 1.0]);
        let expected = reference_step(&nn, 0.7, &x, &t);
        nn.train(0.7, &x, &t).unwrap();
        for (layer, expected) in nn.layers().iter().zip(&expected) {
            for (&p, &e) in layer.as_slice().iter().zip(expected) {
                assert_relative_eq!(p, e, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn interior_layers_train_against_next_back_signal() {
        let mut nn = seeded(2, &[3, 3, 1], 4);
        let (x, t) = ([0.2, 0.8], [1.0]);

        // Replay the step layer by layer.
        let mut layers: Vec<_> = nn.layers().to_vec();
        let mut a = vec![x.to_vec()];
        for layer in &layers {
            let mut next = vec![0.0; layer.n_outputs()];
            layer.compute(a.last().unwrap(), &mut next).unwrap();
            a.push(next);
        }
        let mut signal = t.to_vec();
        for (u, layer) in layers.iter_mut().enumerate().rev() {
            let mut back = vec![0.0; layer.n_inputs()];
            layer
                .train(0.5, &a[u], &a[u + 1], &signal, &mut back)
                .unwrap();
            signal = back;
        }

        nn.train(0.5, &x, &t).unwrap();
        for (layer, expected) in nn.layers().iter().zip(&layers) {
            assert_eq!(layer.as_slice(), expected.as_slice());
        }
    }

    #[test]
    fn compute_many_matches_sequential() {
        let nn = seeded(3, &[6, 2], 8);
        let inputs: Vec<f64> = (0..3 * 17).map(|i| (i as f64 * 0.37).sin()).collect();
        let mut parallel = vec![0.0; 2 * 17];
        nn.compute_many(&inputs, &mut parallel).unwrap();

        let mut buffer = ComputeBuffer::new();
        for (input, output) in inputs.chunks(3).zip(parallel.chunks(2)) {
            let mut expected = [0.0; 2];
            nn.compute_buffered(input, &mut expected, &mut buffer).unwrap();
            assert_eq!(output, expected);
        }

        assert!(nn.compute_many(&inputs[1..], &mut parallel).is_err());
        assert!(nn.compute_many(&inputs, &mut parallel[1..]).is_err());
    }

    #[test]
    fn loss_sums_squared_errors() {
        let mut nn = Network::<f64>::new(1, &[1], Identity).unwrap();
        *nn.layer_mut(0).unwrap().weight_at_mut(0, 0) = 2.0;
        let samples = [1.0, 2.5, 3.0, 5.0];
        let loss = nn.loss(&samples, &mut ComputeBuffer::new()).unwrap();
        assert_relative_eq!(loss, 0.25 + 1.0);
        assert!(nn.loss(&samples[..3], &mut ComputeBuffer::new()).is_err());
    }

    #[test]
    fn training_reduces_loss() {
        let samples = [
            0.0, 0.0, 0.1, //
            0.0, 1.0, 0.9, //
            1.0, 0.0, 0.9, //
            1.0, 1.0, 0.9, //
        ];
        let mut nn = seeded(2, &[3, 1], 13);
        let mut compute_buffer = ComputeBuffer::new();
        let mut train_buffer = TrainBuffer::new();
        let initial = nn.loss(&samples, &mut compute_buffer).unwrap();
        for _ in 0..5000 {
            nn.train_epoch(0.5, &samples, &mut train_buffer).unwrap();
        }
        let trained = nn.loss(&samples, &mut compute_buffer).unwrap();
        assert!(trained < initial);
        assert!(trained < 0.05, "loss after training: {trained}");
    }
}
