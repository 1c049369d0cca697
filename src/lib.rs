//! Fashion-MNIST classification with a three-layer feed-forward network.
//!
//! The network (784 → 256 → 256 → 10, ReLU between layers) is trained with stochastic gradient
//! descent with momentum on mean-reduced cross-entropy, and evaluated after every epoch on the
//! held-out partition with sum-reduced cross-entropy.

pub mod data;
pub mod dataset;
pub mod error;
pub mod inference;
pub mod loss;
pub mod metric;
pub mod model;
pub mod optim;
pub mod training;

mod logger;
mod network;

pub use error::Error;

#[cfg(test)]
pub(crate) mod tests {
    use crate::dataset::{FashionMnistItem, HEIGHT, NUM_CLASSES, WIDTH};
    use crate::model::ModelConfig;
    use crate::optim::OptimizerConfig;
    use crate::training::TrainingConfig;

    pub type TestBackend = burn::backend::NdArray<f32>;
    pub type TestAutodiffBackend = burn::backend::Autodiff<TestBackend>;

    /// Items whose class is drawn as a bright band of rows over a faint texture.
    pub fn synthetic_items(count: usize) -> Vec<FashionMnistItem> {
        (0..count)
            .map(|n| {
                let label = n % NUM_CLASSES;
                let mut image = [[0f32; WIDTH]; HEIGHT];
                for (row, pixels) in image.iter_mut().enumerate() {
                    for (col, pixel) in pixels.iter_mut().enumerate() {
                        *pixel = match row / 2 == label {
                            true => 255.0,
                            false => ((n * 7 + row * 13 + col * 17) % 32) as f32,
                        };
                    }
                }

                FashionMnistItem {
                    image,
                    label: label as u8,
                }
            })
            .collect()
    }

    /// The default hyper-parameters on fixed-seed subsets of 640 train and 640 test samples.
    pub fn config(num_epochs: usize) -> TrainingConfig {
        TrainingConfig::new(ModelConfig::new(), OptimizerConfig::new())
            .with_num_epochs(num_epochs)
            .with_train_subset(Some(640))
            .with_test_subset(Some(640))
    }
}
