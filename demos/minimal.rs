use ffnn::{Network, Sigmoid, TrainBuffer};

fn main() {
    let training_samples: &[f32] = &[
        // A NOT gate.
        0., 1., //
        1., 0., //
    ];

    let mut nn = Network::<f32>::new(1, &[1], Sigmoid).unwrap();
    nn.randomize_params(-0.1..0.1);

    let mut buffer = TrainBuffer::new();
    for _ in 0..100_000 {
        nn.train_epoch(0.5, training_samples, &mut buffer).unwrap();
    }

    println!("{}", nn.layer(0).unwrap().pretty_print(0));
    let mut output = [0.0];
    for sample in training_samples.chunks(2) {
        nn.compute(&sample[..1], &mut output).unwrap();
        println!("not {} = {}", sample[0], output[0]);
    }
}
