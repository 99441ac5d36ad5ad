use std::{
    hint::black_box,
    io::{Write, stdout},
    time::Instant,
};

use ffnn::{ComputeBuffer, Network, Scalar, Sigmoid};

fn benchmark<T: Scalar>(type_name: &str, n_times: u32) {
    let mut nn = Network::<T>::new(4, &[8, 8, 1], Sigmoid).unwrap();
    nn.randomize_params(-T::one()..T::one());
    let input = [T::zero(); 4];
    let mut output = [T::zero(); 1];
    let mut buffer = ComputeBuffer::with_len(nn.max_width());

    print!("benchmarking {type_name} ...");
    stdout().flush().unwrap();
    let before = Instant::now();
    for i in 0..n_times {
        if i % (n_times / n_times.min(10)) == 0 || i == n_times - 1 {
            let percentage = (i as f32) / (n_times as f32) * 100.0;
            print!(" {percentage:.0}%");
            stdout().flush().unwrap();
        }
        nn.compute_buffered(black_box(&input), &mut output, &mut buffer)
            .unwrap();
        black_box(&output);
    }
    let time = before.elapsed();
    let time_per_forward = time / n_times;
    println!(" ... {time:.4?} total, {time_per_forward:.0?} per forward");

    let n_samples = n_times as usize / 10;
    let inputs = vec![T::zero(); 4 * n_samples];
    let mut outputs = vec![T::zero(); n_samples];
    let before = Instant::now();
    nn.compute_many(&inputs, &mut outputs).unwrap();
    let time = before.elapsed();
    println!(
        "compute_many over {n_samples} samples on {} cpus: {time:.4?}",
        num_cpus::get()
    );
}

fn main() {
    let n_times = 10_000_000u32;

    println!("Test neural network: 4(inputs)*8*8*1, sigmoid activation");
    println!("Forward function {n_times} times");

    benchmark::<f32>("f32", n_times);
    benchmark::<f64>("f64", n_times);
}
