//! Ready-made layer lists for common starting points.

use serde_json::json;

use crate::layer_spec::{LayerKind, LayerList, LayerSpec};

/// A multilayer perceptron over flat inputs.
pub fn mlp(input_size: usize, hidden: &[usize], num_classes: usize) -> LayerList {
    let mut layers = LayerList::with_input(&[input_size]);
    for units in hidden {
        layers.push(LayerSpec::with_params(
            LayerKind::Dense,
            json!({"units": units, "activation": "relu"}),
        ));
    }
    layers.layer(LayerSpec::with_params(
        LayerKind::Output,
        json!({"units": num_classes, "activation": "softmax"}),
    ))
}

/// A small CNN for 28x28 grayscale digits.
pub fn mnist_cnn() -> LayerList {
    LayerList::with_input(&[28, 28])
        .layer(LayerSpec::with_params(
            LayerKind::Conv2d,
            json!({"filters": 32, "kernelSize": 3, "padding": "same", "activation": "relu"}),
        ))
        .layer(LayerSpec::with_params(LayerKind::Maxpool2d, json!({"poolSize": 2})))
        .layer(LayerSpec::with_params(
            LayerKind::Conv2d,
            json!({"filters": 64, "kernelSize": 3, "activation": "relu"}),
        ))
        .layer(LayerSpec::with_params(LayerKind::Maxpool2d, json!({"poolSize": 2})))
        .layer(LayerSpec::new(LayerKind::Flatten))
        .layer(LayerSpec::with_params(LayerKind::Dropout, json!({"rate": 0.5})))
        .layer(LayerSpec::with_params(
            LayerKind::Dense,
            json!({"units": 128, "activation": "relu"}),
        ))
        .layer(LayerSpec::with_params(
            LayerKind::Output,
            json!({"units": 10, "activation": "softmax"}),
        ))
}

/// Embedding, positional encoding and one transformer block over token ids.
pub fn text_classifier(
    sequence_length: usize,
    vocab_size: usize,
    embedding_dim: usize,
    num_classes: usize,
) -> LayerList {
    LayerList::with_input(&[sequence_length])
        .layer(LayerSpec::with_params(
            LayerKind::Embedding,
            json!({"inputDim": vocab_size, "outputDim": embedding_dim}),
        ))
        .layer(LayerSpec::with_params(
            LayerKind::PositionalEncoding,
            json!({"maxLength": sequence_length}),
        ))
        .layer(LayerSpec::with_params(
            LayerKind::TransformerBlock,
            json!({"numHeads": 4, "ffDim": embedding_dim * 2, "dropout": 0.1}),
        ))
        .layer(LayerSpec::new(LayerKind::GlobalAvgPool1d))
        .layer(LayerSpec::with_params(LayerKind::Dropout, json!({"rate": 0.1})))
        .layer(LayerSpec::with_params(
            LayerKind::Output,
            json!({"units": num_classes, "activation": "softmax"}),
        ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{ShapeVector, propagate_shapes};
    use crate::validation::validate_spec;

    #[test]
    fn test_templates_are_valid() {
        for layers in [mlp(784, &[128, 64], 10), mnist_cnn(), text_classifier(32, 1000, 16, 2)] {
            for layer in layers.iter() {
                assert!(validate_spec(layer).is_valid(), "{} is invalid", layer.layer_type());
            }
            assert!(propagate_shapes(&layers).is_ok());
        }
    }

    #[test]
    fn test_mnist_cnn_shapes() {
        let shapes = propagate_shapes(&mnist_cnn()).unwrap();
        assert_eq!(shapes[1], ShapeVector::from([28, 28, 32]));
        assert_eq!(shapes[2], ShapeVector::from([14, 14, 32]));
        assert_eq!(shapes[3], ShapeVector::from([12, 12, 64]));
        assert_eq!(shapes[4], ShapeVector::from([6, 6, 64]));
        assert_eq!(shapes[5], ShapeVector::from([2304]));
        assert_eq!(shapes.last(), Some(&ShapeVector::from([10])));
    }

    #[test]
    fn test_text_classifier_shapes() {
        let shapes = propagate_shapes(&text_classifier(20, 500, 32, 4)).unwrap();
        assert_eq!(shapes[1], ShapeVector::from([20, 32]));
        assert_eq!(shapes[3], ShapeVector::from([20, 32]));
        assert_eq!(shapes[4], ShapeVector::from([32]));
        assert_eq!(shapes.last(), Some(&ShapeVector::from([4])));
    }
}
