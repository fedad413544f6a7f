use std::env;

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::SeedableRng;

use ff_classifier::evaluate::sample_predictions;
use ff_classifier::{data, evaluate, TrainConfig, Trainer};

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 3 || args.len() > 4 {
        bail!("usage: {} <train.csv> <test.csv> [config.json]", args[0]);
    }

    let config = match args.get(3) {
        Some(path) => TrainConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path))?,
        None => TrainConfig::default(),
    };
    let (train_set, test_set) =
        data::load_mnist(&args[1], &args[2]).context("loading datasets")?;

    let report = Trainer::new(config.clone())
        .train(&train_set.x.view(), &train_set.y.view())
        .context("training")?;
    let eval = evaluate(&test_set.x.view(), &test_set.y.view(), &report.network)
        .context("evaluating")?;

    let mins = (report.total_time / 60.0).floor() as u64;
    let secs = (report.total_time - mins as f64 * 60.0) as u64;
    println!();
    println!(" FINAL STATE: {:?}", report.state);
    println!(" TOTAL TRAINING TIME: {}m : {}s", mins, secs);
    println!(" AVG. CYCLE TIME: {:.2}s", report.avg_cycle_time);
    println!(" TRAINING ACCURACY DELTA: {:.2}%", report.accuracy_delta);
    if let (Some(first), Some(last)) = (report.history.cost().first(), report.history.cost().last()) {
        println!(" COST DECREASE: {:.4}", first - last);
    }
    println!(" TEST ACCURACY: {:.5}%", eval.accuracy);

    let mut rng = StdRng::seed_from_u64(config.seed.unwrap_or_default());
    let picks = sample_predictions(&eval.predictions.view(), 15, &mut rng);
    let truth = test_set.labels();
    println!();
    for (row, predicted) in picks {
        println!("  test row {:>5}: predicted {} (label {})", row, predicted, truth[row]);
    }
    Ok(())
}
