//! Training driver for compiled models.
//!
//! This module provides:
//! - Loss functions (categorical/binary cross entropy, MSE)
//! - Training configuration and datasets
//! - Classification-head auto-repair
//! - An epoch loop with the Adam optimizer that reports each epoch as an event

mod config;
mod dataset;
mod loss;
mod repair;
mod trainer;

pub use config::TrainingConfig;
pub use dataset::{Dataset, one_hot};
pub use loss::Loss;
pub use repair::ensure_classification_head;
pub use trainer::{EpochReport, TrainingEvent, TrainingReport, fit, train_model};
