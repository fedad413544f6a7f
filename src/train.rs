use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use ndarray::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::batch;
use crate::config::TrainConfig;
use crate::error::{Error, Result};
use crate::metrics::{accuracy, mean_squared_error, History};
use crate::network::Network;

/// Shared flag that stops a running `Trainer` before its next cycle or batch.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Where a training run is, or how it ended. Cycles are 0-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainState {
    NotStarted,
    Running { cycle: usize },
    /// `cycle` reached 100% accuracy and the remaining cycles were skipped.
    Converged { cycle: usize },
    /// All configured cycles ran.
    Exhausted,
    /// Stopped by a `CancelToken`; `cycle` was not recorded.
    Cancelled { cycle: usize },
}

#[derive(Debug, Clone)]
pub struct TrainReport {
    pub history: History,
    /// Seconds from the first cycle to the end of training.
    pub total_time: f64,
    pub avg_cycle_time: f64,
    /// Last minus first cycle accuracy, in percentage points.
    pub accuracy_delta: f64,
    pub state: TrainState,
    pub network: Network,
}

/// Called after every recorded cycle with the 0-based cycle index.
pub type CycleCallback = Box<dyn Fn(usize, &History) + Send + Sync>;

pub struct Trainer {
    config: TrainConfig,
    cancel: CancelToken,
    on_cycle: Option<CycleCallback>,
}

impl Trainer {
    pub fn new(config: TrainConfig) -> Self {
        Self {
            config,
            cancel: CancelToken::new(),
            on_cycle: None,
        }
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Registers a hook that sees the history after each completed cycle.
    pub fn on_cycle<F>(mut self, callback: F) -> Self
    where
        F: Fn(usize, &History) + Send + Sync + 'static,
    {
        self.on_cycle = Some(Box::new(callback));
        self
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn config(&self) -> &TrainConfig {
        &self.config
    }

    /// Trains with a generator seeded from the config.
    pub fn train(&self, x: &ArrayView2<f64>, y: &ArrayView2<f64>) -> Result<TrainReport> {
        let mut rng = match self.config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        self.train_with_rng(x, y, &mut rng)
    }

    /// Builds a fresh network from the config and trains it on `(x, y)`.
    ///
    /// `rng` drives both weight initialization and the per-cycle shuffles.
    pub fn train_with_rng<R: Rng + ?Sized>(
        &self,
        x: &ArrayView2<f64>,
        y: &ArrayView2<f64>,
        rng: &mut R,
    ) -> Result<TrainReport> {
        let config = &self.config;
        config.validate()?;
        if x.nrows() != y.nrows() {
            return Err(Error::config(format!(
                "X has {} rows but Y has {}",
                x.nrows(),
                y.nrows()
            )));
        }
        if x.nrows() == 0 {
            return Err(Error::config("dataset is empty"));
        }

        log::info!(
            "Initializing network... (cycles={}, learning rate={})",
            config.cycles,
            config.learning_rate
        );
        let mut network = Network::with_classes(x.ncols(), &config.hidden_layers, y.ncols(), rng)?;
        let batches = batch::batch(x, y, config.batch_size, config.cycles, rng)?;

        let print_freq = ((config.cycles as f64 * 0.1).round() as usize).max(1);
        let mut history = History::new();
        let mut state = TrainState::NotStarted;

        log::info!("Training...");
        let train_start = Instant::now();
        for (cycle, current_batches) in batches.iter().enumerate() {
            if cycle > 0 && history.last_accuracy().map_or(false, |acc| acc >= 100.0) {
                state = TrainState::Converged { cycle: cycle - 1 };
                break;
            }
            if self.cancel.is_cancelled() {
                log::warn!("Training cancelled before cycle {}", cycle + 1);
                state = TrainState::Cancelled { cycle };
                break;
            }
            state = TrainState::Running { cycle };

            let cycle_start = Instant::now();
            let (mut cost, mut acc) = (0.0, 0.0);
            for batch in current_batches {
                if self.cancel.is_cancelled() {
                    state = TrainState::Cancelled { cycle };
                    break;
                }
                let output = network.forward(&batch.x.view())?;
                let error = &output - &batch.y;
                network.backward(&batch.x.view(), &error.view(), config.learning_rate)?;
                cost += mean_squared_error(&error.view());
                acc += accuracy(&output.view(), &batch.y.view());
            }
            if let TrainState::Cancelled { cycle } = state {
                log::warn!("Training cancelled during cycle {}", cycle + 1);
                break;
            }

            let batch_count = current_batches.len() as f64;
            let cost = cost / batch_count;
            if !cost.is_finite() {
                return Err(Error::NumericInstability {
                    stage: "cost",
                    detail: format!("cycle {} cost is {}", cycle + 1, cost),
                });
            }
            history.push(cost, acc * 100.0 / batch_count, cycle_start.elapsed().as_secs_f64());

            if cycle == 0 || (cycle + 1) % print_freq == 0 || cycle == config.cycles - 1 {
                log::info!(
                    "{:>4}/{} >> Duration: {:.2}s / Accuracy: {:.5}%",
                    cycle + 1,
                    config.cycles,
                    history.duration()[cycle],
                    history.accuracy()[cycle]
                );
            }
            if let Some(on_cycle) = &self.on_cycle {
                on_cycle(cycle, &history);
            }
        }
        if let TrainState::Running { .. } = state {
            state = TrainState::Exhausted;
        }

        let total_time = train_start.elapsed().as_secs_f64();
        let report = TrainReport {
            total_time,
            avg_cycle_time: history.avg_duration(),
            accuracy_delta: history.accuracy_delta(),
            history,
            state,
            network,
        };
        let mins = (total_time / 60.0).floor() as u64;
        let secs = (total_time - mins as f64 * 60.0) as u64;
        log::info!(
            "Total training time: {}m : {}s, avg. cycle time: {:.2}s",
            mins,
            secs,
            report.avg_cycle_time
        );
        Ok(report)
    }
}

/// Trains a fresh network with `config` and no cancellation.
pub fn train(x: &ArrayView2<f64>, y: &ArrayView2<f64>, config: &TrainConfig) -> Result<TrainReport> {
    Trainer::new(config.clone()).train(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::one_hot;

    fn tiny() -> (Array2<f64>, Array2<f64>) {
        let labels: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let x = Array2::from_shape_fn((20, 3), |(r, c)| if labels[r] == 0 { c as f64 } else { -(c as f64) });
        (x, one_hot(&labels, 2).unwrap())
    }

    fn config(cycles: usize) -> TrainConfig {
        TrainConfig {
            hidden_layers: vec![4],
            cycles,
            learning_rate: 0.05,
            batch_size: 5,
            seed: Some(1),
        }
    }

    #[test]
    fn histories_have_one_entry_per_cycle() {
        let (x, y) = tiny();
        let report = train(&x.view(), &y.view(), &config(3)).unwrap();
        let h = &report.history;
        assert_eq!(h.cost().len(), h.accuracy().len());
        assert_eq!(h.accuracy().len(), h.duration().len());
        match report.state {
            TrainState::Exhausted => assert_eq!(h.len(), 3),
            TrainState::Converged { cycle } => assert_eq!(h.len(), cycle + 1),
            other => panic!("unexpected state {:?}", other),
        }
        assert_eq!(report.network.dimensions(), vec![(3, 4), (4, 2)]);
    }

    #[test]
    fn same_seed_same_run() {
        let (x, y) = tiny();
        let a = train(&x.view(), &y.view(), &config(2)).unwrap();
        let b = train(&x.view(), &y.view(), &config(2)).unwrap();
        assert_eq!(a.history.cost(), b.history.cost());
        assert_eq!(a.network.weights(), b.network.weights());
    }

    #[test]
    fn configuration_is_checked_before_training() {
        let (x, y) = tiny();
        let mut bad = config(2);
        bad.batch_size = 0;
        assert!(matches!(train(&x.view(), &y.view(), &bad), Err(Error::Configuration(_))));

        let short_y = y.slice(s![..10, ..]).to_owned();
        assert!(matches!(
            train(&x.view(), &short_y.view(), &config(2)),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn cancelled_before_start_records_nothing() {
        let (x, y) = tiny();
        let trainer = Trainer::new(config(5));
        trainer.cancel_token().cancel();
        let report = trainer.train(&x.view(), &y.view()).unwrap();
        assert_eq!(report.state, TrainState::Cancelled { cycle: 0 });
        assert!(report.history.is_empty());
    }

    #[test]
    fn cancelled_between_cycles_keeps_trained_weights() {
        // constant inputs with alternating labels never reach 100%
        let x = Array2::from_elem((20, 3), 0.5);
        let labels: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let y = one_hot(&labels, 2).unwrap();

        let cancel = CancelToken::new();
        let hook = cancel.clone();
        let trainer = Trainer::new(config(5))
            .with_cancel_token(cancel)
            .on_cycle(move |cycle, _| {
                if cycle == 1 {
                    hook.cancel();
                }
            });
        let report = trainer.train(&x.view(), &y.view()).unwrap();

        assert_eq!(report.state, TrainState::Cancelled { cycle: 2 });
        assert_eq!(report.history.len(), 2);
        let initial = Network::with_classes(3, &[4], 2, &mut StdRng::seed_from_u64(1)).unwrap();
        assert_ne!(report.network.weights(), initial.weights());
    }

    #[test]
    fn callback_sees_every_recorded_cycle() {
        use std::sync::Mutex;

        let x = Array2::from_elem((20, 3), 0.5);
        let labels: Vec<usize> = (0..20).map(|i| i % 2).collect();
        let y = one_hot(&labels, 2).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let report = Trainer::new(config(3))
            .on_cycle(move |cycle, history| sink.lock().unwrap().push((cycle, history.len())))
            .train(&x.view(), &y.view())
            .unwrap();

        assert_eq!(report.state, TrainState::Exhausted);
        assert_eq!(*seen.lock().unwrap(), vec![(0, 1), (1, 2), (2, 3)]);
    }
}
