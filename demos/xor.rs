use std::time::{Duration, Instant};

use chrono::Local;
use clap::Parser;
use ffnn::{ComputeBuffer, Network, Sigmoid, TrainBuffer};
use gnuplot::{AxesCommon, ColorType, Figure, PlotOption};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;
use tracing_subscriber::{filter::EnvFilter, fmt::format};

/// Trains a small network to be an XOR gate.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of passes over the four samples.
    #[arg(long, default_value_t = 20_000)]
    epochs: usize,
    /// Learning rate.
    #[arg(long, default_value_t = 0.5)]
    eta: f64,
    /// Neurons in the hidden layer.
    #[arg(long, default_value_t = 4)]
    hidden: usize,
    /// Seed for the initial weights.
    #[arg(long, default_value_t = 1)]
    seed: u64,
    /// Plot the loss curve to this SVG file; `auto` picks a timestamped name.
    #[arg(long)]
    plot: Option<String>,
}

struct LossRecords {
    i_epochs_records: Vec<f32>,
    loss_records: Vec<f32>,
}

fn time<T>(f: impl FnOnce() -> T) -> (Duration, T) {
    let before = Instant::now();
    let result = f();
    (before.elapsed(), result)
}

fn plot_loss(records: &LossRecords, output_path: &str) {
    info!("plotting loss progress to {output_path:?}");
    let mut figure = Figure::new();
    figure.axes2d().set_y_log(Some(10.0)).lines(
        &records.i_epochs_records,
        &records.loss_records,
        &[
            PlotOption::Caption("Loss"),
            PlotOption::Color(ColorType::Black),
        ],
    );
    figure.set_title("Loss");
    figure.set_terminal("svg", output_path);
    if let Err(error) = figure.show_and_keep_running() {
        tracing::error!("failed to plot: {error:?}");
    }
}

fn train(args: &Args, samples: &[f64], nn: &mut Network<f64>) -> LossRecords {
    let n_logs = 20;
    let n_records = 1000;
    let n_epochs = args.epochs.max(1);

    let mut i_epochs_records = Vec::with_capacity(n_records);
    let mut loss_records = Vec::with_capacity(n_records);

    let mut train_buffer = TrainBuffer::new();
    let mut compute_buffer = ComputeBuffer::with_len(nn.max_width());

    for i_epoch in 0..n_epochs {
        nn.train_epoch(args.eta, samples, &mut train_buffer)
            .expect("samples match the network shape");
        let is_last = i_epoch == n_epochs - 1;
        let log = i_epoch % (n_epochs / n_epochs.min(n_logs)) == 0 || is_last;
        let record = i_epoch % (n_epochs / n_epochs.min(n_records)) == 0 || is_last;
        if !(log || record) {
            continue;
        }
        let loss = nn
            .loss(samples, &mut compute_buffer)
            .expect("samples match the network shape");
        if log {
            let percentage = (i_epoch as f32) / (n_epochs as f32) * 100.0;
            info!("[{percentage:.0}%] L = {loss}");
        }
        if record {
            i_epochs_records.push(i_epoch as f32);
            loss_records.push(loss as f32);
        }
    }

    LossRecords {
        i_epochs_records,
        loss_records,
    }
}

fn main() {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .event_format(format().with_target(false).without_time())
        .init();

    let samples: &[f64] = &[
        // An XOR gate.
        0., 0., 0., //
        0., 1., 1., //
        1., 0., 1., //
        1., 1., 0., //
    ];

    let mut nn = Network::new(2, &[args.hidden, 1], Sigmoid).expect("valid topology");
    nn.randomize_params_with(&mut StdRng::seed_from_u64(args.seed), -1.0..1.0);

    let (training_duration, records) = time(|| train(&args, samples, &mut nn));
    info!("training took {training_duration:?}");

    for i_layer in 0..nn.n_layers() {
        println!(
            "=== Layer #{i_layer} ===\n{}\n",
            nn.layer(i_layer).unwrap().pretty_print(i_layer)
        );
    }

    let mut output = [0.0];
    for sample in samples.chunks(3) {
        nn.compute(&sample[0..2], &mut output).unwrap();
        println!("{} xor {} = {:.4}", sample[0], sample[1], output[0]);
    }

    match args.plot.as_deref() {
        None => {}
        Some("auto") => {
            let path = format!("loss_{}.svg", Local::now().format("%Y%m%d_%H%M%S"));
            plot_loss(&records, &path);
        }
        Some(path) => plot_loss(&records, path),
    }
}
