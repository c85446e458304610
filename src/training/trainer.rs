//! Training loop implementation.

use std::ops::ControlFlow;

use burn::{
    module::AutodiffModule,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        ElementConversion, Tensor,
        backend::{AutodiffBackend, Backend},
    },
};

use super::{Dataset, Loss, TrainingConfig, ensure_classification_head};
use crate::errors::ModelError;
use crate::graph::{CompiledModel, ModelSession, Network, TensorBatch};
use crate::layer_spec::LayerList;

/// Metrics of one finished epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct EpochReport {
    /// 1-based epoch number.
    pub epoch: usize,
    pub epochs: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub val_accuracy: f32,
}

/// Progress emitted to the caller while training.
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingEvent {
    /// A classification head was appended before compiling.
    OutputLayerAppended { units: usize },
    EpochEnd(EpochReport),
}

/// Outcome of a training run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingReport {
    pub history: Vec<EpochReport>,
    pub output_layer_appended: bool,
    /// The event callback asked to stop before the last epoch.
    pub stopped_early: bool,
}

impl TrainingReport {
    pub fn final_epoch(&self) -> Option<&EpochReport> {
        self.history.last()
    }
}

/// Repairs the classification head if needed, compiles `layers` in `session`
/// and trains the new model on `dataset`.
///
/// Returning [`ControlFlow::Break`] from `on_event` stops training after the
/// current event; the weights learned so far are kept.
pub fn fit<B, F>(
    session: &mut ModelSession<B>,
    layers: &LayerList,
    dataset: &Dataset<B>,
    config: &TrainingConfig,
    mut on_event: F,
) -> Result<TrainingReport, ModelError>
where
    B: AutodiffBackend,
    F: FnMut(&TrainingEvent) -> ControlFlow<()>,
{
    let num_classes = dataset.num_classes();
    let (layers, appended) = if config.auto_output_layer {
        ensure_classification_head(layers, num_classes)?
    } else {
        (layers.clone(), false)
    };

    if appended {
        let event = TrainingEvent::OutputLayerAppended { units: num_classes };
        if on_event(&event).is_break() {
            return Ok(TrainingReport {
                output_layer_appended: true,
                stopped_early: true,
                ..TrainingReport::default()
            });
        }
    }

    let model = session.compile(&layers)?;
    let mut report = train_model(model, dataset, config, on_event)?;
    report.output_layer_appended = appended;
    Ok(report)
}

/// Trains `model` in place with Adam over mini-batches.
///
/// After every epoch the test split is evaluated with dropout disabled and an
/// [`TrainingEvent::EpochEnd`] is emitted.
pub fn train_model<B, F>(
    model: &mut CompiledModel<B>,
    dataset: &Dataset<B>,
    config: &TrainingConfig,
    mut on_event: F,
) -> Result<TrainingReport, ModelError>
where
    B: AutodiffBackend,
    F: FnMut(&TrainingEvent) -> ControlFlow<()>,
{
    let outputs = model.output_shape().num_elements();
    if outputs != dataset.num_classes() {
        return Err(ModelError::DatasetMismatch {
            message: format!(
                "model produces {outputs} outputs but labels have {} classes",
                dataset.num_classes()
            ),
        });
    }

    let train_inputs = dataset.train_inputs.clone().reshape_samples(model.input_shape())?;
    let test_inputs = dataset
        .test_inputs
        .clone()
        .reshape_samples(model.input_shape())?
        .inner();
    let test_labels = dataset.test_labels.clone().inner();

    let num_samples = train_inputs.batch_size();
    let batch_size = config.batch_size.max(1);

    let mut optimizer = AdamConfig::new().init();
    let mut network = model.network().clone();
    let mut report = TrainingReport::default();

    for epoch in 1..=config.epochs {
        let mut total_loss = 0.0;
        let mut batches = 0;

        for start in (0..num_samples).step_by(batch_size) {
            let end = (start + batch_size).min(num_samples);
            let inputs = train_inputs.slice_batch(start..end);
            let targets = dataset.train_labels.clone().slice([start..end]);

            let predictions = network.forward(inputs).into_flat();
            let loss = config.loss.compute(predictions, targets);
            let loss_value: f32 = loss.clone().into_scalar().elem();
            total_loss += loss_value;
            batches += 1;

            let grads = loss.backward();
            let grads_params = GradientsParams::from_grads(grads, &network);
            network = optimizer.step(config.learning_rate, network, grads_params);
        }

        let (val_loss, val_accuracy) = evaluate(
            &network.valid(),
            &test_inputs,
            &test_labels,
            config.loss,
            batch_size,
        );
        let epoch_report = EpochReport {
            epoch,
            epochs: config.epochs,
            train_loss: total_loss / batches.max(1) as f32,
            val_loss,
            val_accuracy,
        };

        if config.verbose {
            log::info!(
                "Epoch {}/{}: loss = {:.6}, val_loss = {:.6}, val_accuracy = {:.4}",
                epoch,
                config.epochs,
                epoch_report.train_loss,
                val_loss,
                val_accuracy
            );
        }

        let flow = on_event(&TrainingEvent::EpochEnd(epoch_report.clone()));
        report.history.push(epoch_report);
        if flow.is_break() {
            report.stopped_early = epoch < config.epochs;
            break;
        }
    }

    model.replace_network(network);
    Ok(report)
}

/// Mean loss and argmax accuracy over a labelled split.
fn evaluate<B: Backend>(
    network: &Network<B>,
    inputs: &TensorBatch<B>,
    labels: &Tensor<B, 2>,
    loss: Loss,
    batch_size: usize,
) -> (f32, f32) {
    let num_samples = inputs.batch_size();
    if num_samples == 0 {
        return (0.0, 0.0);
    }

    let mut loss_sum = 0.0;
    let mut correct = 0.0;
    for start in (0..num_samples).step_by(batch_size) {
        let end = (start + batch_size).min(num_samples);
        let predictions = network.forward(inputs.slice_batch(start..end)).into_flat();
        let targets = labels.clone().slice([start..end]);

        let batch_loss: f32 = loss
            .compute(predictions.clone(), targets.clone())
            .into_scalar()
            .elem();
        loss_sum += batch_loss * (end - start) as f32;

        let hits: f32 = predictions
            .argmax(1)
            .equal(targets.argmax(1))
            .int()
            .sum()
            .into_scalar()
            .elem();
        correct += hits;
    }

    let n = num_samples as f32;
    (loss_sum / n, correct / n)
}
