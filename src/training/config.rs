//! Hyperparameters of a training run.

use super::Loss;

/// How [`fit`](super::fit) trains a compiled model.
#[derive(Debug, Clone)]
pub struct TrainingConfig {
    pub epochs: usize,
    /// Adam step size.
    pub learning_rate: f64,
    /// Samples per optimizer step; the last batch of an epoch may be smaller.
    pub batch_size: usize,
    pub loss: Loss,
    /// Log metrics at `info` level after every epoch.
    pub verbose: bool,
    /// Append a softmax head sized to the dataset's class count when the
    /// layer list does not already end in one.
    pub auto_output_layer: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 10,
            learning_rate: 0.001,
            batch_size: 32,
            loss: Loss::CategoricalCrossEntropy,
            verbose: true,
            auto_output_layer: true,
        }
    }
}

impl TrainingConfig {
    /// Creates a configuration with the default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of epochs.
    pub fn epochs(mut self, epochs: usize) -> Self {
        self.epochs = epochs;
        self
    }

    /// Sets the Adam learning rate.
    pub fn learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Sets the mini-batch size.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Sets the loss function.
    pub fn loss(mut self, loss: Loss) -> Self {
        self.loss = loss;
        self
    }

    /// Enables or disables per-epoch logging.
    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Enables or disables appending a classification head.
    pub fn auto_output_layer(mut self, enabled: bool) -> Self {
        self.auto_output_layer = enabled;
        self
    }
}
