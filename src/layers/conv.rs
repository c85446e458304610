//! 2-D convolution and max pooling over channels-last batches.
//!
//! burn's convolution modules work on `[batch, channels, height, width]`, so
//! both layers permute on the way in and out. `same` padding is applied
//! explicitly and may be asymmetric, which keeps the runtime output size equal
//! to `ceil(input / stride)` for every kernel and stride.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
    },
    tensor::{Tensor, backend::Backend},
};

use crate::graph::TensorBatch;
use crate::layers::Activation;
use crate::shape::same_padding;

/// Padding mode of a sliding-window layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Padding {
    /// No padding; windows must fit entirely inside the input.
    #[default]
    Valid,
    /// Pad so that the output keeps `ceil(input / stride)` positions.
    Same,
}

impl Padding {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "valid" => Some(Padding::Valid),
            "same" => Some(Padding::Same),
            _ => None,
        }
    }

    /// `(top, bottom, left, right)` padding for an input of `[height, width]`.
    fn amounts(&self, [height, width]: [usize; 2], window: [usize; 2], strides: [usize; 2]) -> [usize; 4] {
        match self {
            Padding::Valid => [0; 4],
            Padding::Same => {
                // Shape propagation rejects extents that overflow.
                let (top, bottom) = same_padding(height, window[0], strides[0]).unwrap_or_default();
                let (left, right) = same_padding(width, window[1], strides[1]).unwrap_or_default();
                [top, bottom, left, right]
            }
        }
    }
}

/// Parameters of a `conv2d` layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Conv2dParams {
    pub filters: usize,
    pub kernel_size: [usize; 2],
    pub strides: [usize; 2],
    pub padding: Padding,
    pub activation: Activation,
    pub use_bias: bool,
}

impl Conv2dParams {
    /// Initializes the layer for inputs of `[height, width, channels]`.
    pub fn init<B: Backend>(&self, input: [usize; 3], device: &B::Device) -> Conv2dLayer<B> {
        let [height, width, channels] = input;
        let conv = Conv2dConfig::new([channels, self.filters], self.kernel_size)
            .with_stride(self.strides)
            .with_bias(self.use_bias)
            .init(device);
        let [pad_top, pad_bottom, pad_left, pad_right] =
            self.padding
                .amounts([height, width], self.kernel_size, self.strides);

        Conv2dLayer {
            conv,
            input_height: height,
            input_width: width,
            input_channels: channels,
            pad_top,
            pad_bottom,
            pad_left,
            pad_right,
            activation_id: self.activation.to_id(),
        }
    }
}

/// Convolution over `[batch, height, width, channels]` batches.
#[derive(Module, Debug)]
pub struct Conv2dLayer<B: Backend> {
    conv: Conv2d<B>,
    input_height: usize,
    input_width: usize,
    input_channels: usize,
    pad_top: usize,
    pad_bottom: usize,
    pad_left: usize,
    pad_right: usize,
    activation_id: u8,
}

impl<B: Backend> Conv2dLayer<B> {
    pub fn forward(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let x = input
            .into_spatial([self.input_height, self.input_width, self.input_channels])
            .permute([0, 3, 1, 2]);
        let x = pad_spatial(
            x,
            [self.pad_top, self.pad_bottom, self.pad_left, self.pad_right],
            0.0,
        );
        let output = self.conv.forward(x).permute([0, 2, 3, 1]);
        TensorBatch::Spatial(Activation::from_id(self.activation_id).apply(output))
    }
}

/// Parameters of a `maxpool2d` layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaxPool2dParams {
    pub pool_size: [usize; 2],
    pub strides: [usize; 2],
    pub padding: Padding,
}

impl MaxPool2dParams {
    /// Initializes the layer for inputs of `[height, width, channels]`.
    pub fn init(&self, input: [usize; 3]) -> MaxPool2dLayer {
        let [height, width, channels] = input;
        let pool = MaxPool2dConfig::new(self.pool_size)
            .with_strides(self.strides)
            .init();
        let [pad_top, pad_bottom, pad_left, pad_right] =
            self.padding
                .amounts([height, width], self.pool_size, self.strides);

        MaxPool2dLayer {
            pool,
            input_height: height,
            input_width: width,
            channels,
            pad_top,
            pad_bottom,
            pad_left,
            pad_right,
        }
    }
}

/// Max pooling over `[batch, height, width, channels]` batches.
#[derive(Module, Clone, Debug)]
pub struct MaxPool2dLayer {
    pool: MaxPool2d,
    input_height: usize,
    input_width: usize,
    channels: usize,
    pad_top: usize,
    pad_bottom: usize,
    pad_left: usize,
    pad_right: usize,
}

impl MaxPool2dLayer {
    pub fn forward<B: Backend>(&self, input: TensorBatch<B>) -> TensorBatch<B> {
        let x = input
            .into_spatial([self.input_height, self.input_width, self.channels])
            .permute([0, 3, 1, 2]);
        // Padded cells must never win the max.
        let x = pad_spatial(
            x,
            [self.pad_top, self.pad_bottom, self.pad_left, self.pad_right],
            f32::NEG_INFINITY,
        );
        TensorBatch::Spatial(self.pool.forward(x).permute([0, 2, 3, 1]))
    }
}

/// Pads the two trailing axes of a `[batch, channels, height, width]` tensor.
fn pad_spatial<B: Backend>(x: Tensor<B, 4>, [top, bottom, left, right]: [usize; 4], value: f32) -> Tensor<B, 4> {
    if top + bottom + left + right == 0 {
        return x;
    }
    let device = x.device();

    let [batch, channels, _, width] = x.dims();
    let mut rows = Vec::with_capacity(3);
    if top > 0 {
        rows.push(Tensor::full([batch, channels, top, width], value, &device));
    }
    rows.push(x);
    if bottom > 0 {
        rows.push(Tensor::full([batch, channels, bottom, width], value, &device));
    }
    let x = Tensor::cat(rows, 2);

    let [batch, channels, height, _] = x.dims();
    let mut columns = Vec::with_capacity(3);
    if left > 0 {
        columns.push(Tensor::full([batch, channels, height, left], value, &device));
    }
    columns.push(x);
    if right > 0 {
        columns.push(Tensor::full([batch, channels, height, right], value, &device));
    }
    Tensor::cat(columns, 3)
}
