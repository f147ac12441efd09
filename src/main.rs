//! Trains a small MLP on the two moons dataset with a max-margin loss
//! using the library provided by `scalar_grad`
//!
//! # Usage
//! Runnable via
//! ```sh
//! cargo run -- -h
//! RUST_LOG=info cargo run
//! ```
//!
//! Supports custom network sizes, learning rate schedule, momentum, batch size, etc.

use std::error::Error;

use scalar_grad::{
    dataloader::DataLoader,
    datasets::{make_moons, plot_data, plot_decision_boundary},
    loss::{L2Regularization, MaxMarginLoss, accuracy},
    nn::{Activation, MLP, Module},
    optim::{Optim, SGD, linear_decay},
};

use clap::Parser;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

#[derive(Parser)]
struct Args {
    #[clap(short, long, default_value_t = 100)]
    samples: usize,
    #[clap(short, long, default_value_t = 0.1)]
    noise: f64,
    /// Output sizes of the hidden layers, a single output layer is appended
    #[clap(long, value_delimiter = ',', default_value = "16,16")]
    hidden: Vec<usize>,
    #[clap(short, long, value_enum, default_value_t = Activation::ReLU)]
    activation: Activation,
    #[clap(short, long, default_value_t = 100)]
    epochs: usize,
    /// Full batch when omitted
    #[clap(short, long)]
    batch_size: Option<usize>,
    #[clap(long, default_value_t = 1.0)]
    lr_start: f64,
    #[clap(long, default_value_t = 0.1)]
    lr_end: f64,
    #[clap(short, long, default_value_t = 0.0)]
    momentum: f64,
    /// L2 regularization strength
    #[clap(long, default_value_t = 1e-4)]
    alpha: f64,
    #[clap(long, default_value_t = 1337)]
    seed: u64,
    #[clap(short, long, default_value_t = 10)]
    print_epochs: usize,
    #[clap(short, long, default_value_t = format!("output"))]
    output_dir: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let args = Args::parse();
    let mut rng = Pcg64Mcg::seed_from_u64(args.seed);

    let (data, targets) = make_moons(args.samples, args.noise, &mut rng)?;
    std::fs::create_dir_all(&args.output_dir)?;
    plot_data(
        &data,
        &targets,
        &format!("{}/dataset_moons.png", args.output_dir),
    )?;

    let layer_sizes = args
        .hidden
        .iter()
        .copied()
        .chain(std::iter::once(1))
        .collect::<Vec<_>>();
    let mut activations = vec![args.activation; args.hidden.len()];
    activations.push(Activation::Linear);
    let model = MLP::new(2, &layer_sizes, Some(activations.as_slice()), &mut rng)?;
    log::info!("{}", model);
    log::info!("Number of parameters: {}", model.parameters().len());

    let mut optim = SGD::new(model.parameters(), args.lr_start, args.momentum);
    let batch_size = args.batch_size.unwrap_or(data.len()).max(1);
    let data_loader = DataLoader::new(data.clone(), targets.clone(), batch_size, true)?;
    let print_every = args.print_epochs.max(1);

    for epoch in 0..args.epochs {
        optim.set_lr(linear_decay(args.lr_start, args.lr_end, epoch, args.epochs));
        let mut epoch_loss = 0.0;
        let mut epoch_correct = 0.0;

        for (batch_data, batch_targets) in data_loader.iter_with_rng(&mut rng) {
            // the output layer has a single unit, its value is the score
            let mut scores = Vec::with_capacity(batch_data.len());
            for x in batch_data {
                scores.extend(model.forward(x)?.into_iter().take(1));
            }
            let data_loss = MaxMarginLoss::call(&scores, &batch_targets);
            let reg_loss = L2Regularization::call(&model.parameters(), args.alpha);
            let total_loss = &data_loss + &reg_loss;

            optim.zero_grad();
            total_loss.backward();
            optim.step();

            epoch_loss += total_loss.data() * scores.len() as f64;
            epoch_correct += accuracy(&scores, &batch_targets) * scores.len() as f64;
        }

        if epoch % print_every == 0 || epoch == args.epochs - 1 {
            let n = data_loader.len().max(1) as f64;
            log::info!(
                "epoch: {} | loss: {:.6} | accuracy: {:.1}% | lr: {:.3}",
                epoch + 1,
                epoch_loss / n,
                epoch_correct / n * 100.0,
                optim.lr()
            );
        }
    }

    plot_decision_boundary(
        &model,
        &format!("{}/decision_boundary_moons.png", args.output_dir),
        &data,
        &targets,
    )?;
    Ok(())
}
