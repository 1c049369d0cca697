use burn::{
    nn::{Linear, LinearConfig, Relu},
    prelude::*,
};

use crate::dataset::{HEIGHT, NUM_CLASSES, WIDTH};

#[derive(Config, Debug)]
pub struct ModelConfig {
    #[config(default = "WIDTH * HEIGHT")]
    pub input_size: usize,
    #[config(default = 256)]
    pub hidden_size: usize,
    #[config(default = "NUM_CLASSES")]
    pub num_classes: usize,
}

/// Whether a model tracks gradients.
///
/// A model on an autodiff backend is in training mode; the model returned by
/// [valid](burn::module::AutodiffModule::valid) lives on the inner backend and never
/// records a graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Train,
    Eval,
}

/// Three fully-connected layers with ReLU activations between them.
#[derive(Module, Debug)]
pub struct Model<B: Backend> {
    fc1: Linear<B>,
    fc2: Linear<B>,
    fc3: Linear<B>,
    activation: Relu,
}

impl ModelConfig {
    /// Returns the initialized model.
    pub fn init<B: Backend>(&self, device: &B::Device) -> Model<B> {
        Model {
            fc1: LinearConfig::new(self.input_size, self.hidden_size).init(device),
            fc2: LinearConfig::new(self.hidden_size, self.hidden_size).init(device),
            fc3: LinearConfig::new(self.hidden_size, self.num_classes).init(device),
            activation: Relu::new(),
        }
    }
}

impl<B: Backend> Model<B> {
    /// # Shapes
    ///   - Images [batch_size, height, width]
    ///   - Output [batch_size, num_classes]
    pub fn forward(&self, images: Tensor<B, 3>) -> Tensor<B, 2> {
        // Each image becomes a single row of `input_size` features.
        let x = images.flatten::<2>(1, 2);

        let x = self.fc1.forward(x);
        let x = self.activation.forward(x);
        let x = self.fc2.forward(x);
        let x = self.activation.forward(x);

        self.fc3.forward(x)
    }

    pub fn mode(&self) -> Mode {
        match B::ad_enabled() {
            true => Mode::Train,
            false => Mode::Eval,
        }
    }
}
