use std::sync::Arc;

use burn::{
    data::{
        dataloader::{batcher::Batcher, DataLoader, DataLoaderBuilder},
        dataset::{
            transform::{PartialDataset, ShuffledDataset},
            Dataset,
        },
    },
    prelude::*,
};

use crate::dataset::{FashionMnistItem, HEIGHT, WIDTH};
use crate::training::TrainingConfig;

/// Mean pixel intensity used to normalize the images, after scaling to `[0, 1]`.
pub const MEAN: f32 = 0.1307;
/// Standard deviation used to normalize the images, after scaling to `[0, 1]`.
pub const STD: f32 = 0.3081;

#[derive(Clone, Debug)]
pub struct FashionMnistBatcher<B: Backend> {
    device: B::Device,
}

#[derive(Clone, Debug)]
pub struct FashionMnistBatch<B: Backend> {
    /// Normalized images, `[batch_size, 28, 28]`.
    pub images: Tensor<B, 3>,
    /// Class labels, `[batch_size]`.
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> FashionMnistBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }
}

impl<B: Backend> Batcher<FashionMnistItem, FashionMnistBatch<B>> for FashionMnistBatcher<B> {
    fn batch(&self, items: Vec<FashionMnistItem>) -> FashionMnistBatch<B> {
        let images = items
            .iter()
            .map(|item| TensorData::from(item.image).convert::<B::FloatElem>())
            .map(|data| Tensor::<B, 2>::from_data(data, &self.device))
            .map(|tensor| tensor.reshape([1, HEIGHT, WIDTH]))
            .map(normalize)
            .collect();

        let targets = items
            .iter()
            .map(|item| {
                Tensor::<B, 1, Int>::from_data(
                    [(item.label as i64).elem::<B::IntElem>()],
                    &self.device,
                )
            })
            .collect();

        let images = Tensor::cat(images, 0);
        let targets = Tensor::cat(targets, 0);

        FashionMnistBatch { images, targets }
    }
}

/// Scales raw intensities to `[0, 1]`, then standardizes them with [MEAN] and [STD].
pub fn normalize<B: Backend, const D: usize>(tensor: Tensor<B, D>) -> Tensor<B, D> {
    ((tensor / 255) - MEAN) / STD
}

/// Fixed-seed selection of at most `size` items of a dataset, the whole dataset when `None`.
pub fn subset<D>(
    dataset: D,
    size: Option<usize>,
    seed: u64,
) -> PartialDataset<ShuffledDataset<D, FashionMnistItem>, FashionMnistItem>
where
    D: Dataset<FashionMnistItem>,
{
    let len = size.map_or(dataset.len(), |size| size.min(dataset.len()));
    let shuffled = ShuffledDataset::with_seed(dataset, seed);

    PartialDataset::new(shuffled, 0, len)
}

/// Dataloader over the training partition, re-shuffled at every pass.
pub fn train_dataloader<B, D>(
    config: &TrainingConfig,
    device: B::Device,
    dataset: D,
) -> Arc<dyn DataLoader<FashionMnistBatch<B>>>
where
    B: Backend,
    D: Dataset<FashionMnistItem> + 'static,
{
    let builder = DataLoaderBuilder::new(FashionMnistBatcher::<B>::new(device))
        .batch_size(config.batch_size)
        .shuffle(config.seed);
    let builder = match config.num_workers {
        0 | 1 => builder,
        num_workers => builder.num_workers(num_workers),
    };

    builder.build(subset(dataset, config.train_subset, config.seed))
}

/// Dataloader over the test partition, in a fixed order.
pub fn test_dataloader<B, D>(
    config: &TrainingConfig,
    device: B::Device,
    dataset: D,
) -> Arc<dyn DataLoader<FashionMnistBatch<B>>>
where
    B: Backend,
    D: Dataset<FashionMnistItem> + 'static,
{
    let builder =
        DataLoaderBuilder::new(FashionMnistBatcher::<B>::new(device)).batch_size(config.batch_size);
    let builder = match config.num_workers {
        0 | 1 => builder,
        num_workers => builder.num_workers(num_workers),
    };

    builder.build(subset(dataset, config.test_subset, config.seed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::{synthetic_items, TestBackend};
    use burn::data::dataset::InMemDataset;

    #[test]
    fn batch_is_normalized_and_shaped() {
        let device = Default::default();
        let mut item = synthetic_items(1).remove(0);
        item.image[0][0] = 0.0;
        item.image[27][27] = 255.0;
        item.label = 7;

        let batch = FashionMnistBatcher::<TestBackend>::new(device).batch(vec![item.clone(), item]);

        assert_eq!(batch.images.dims(), [2, HEIGHT, WIDTH]);
        assert_eq!(batch.targets.dims(), [2]);

        let pixels = batch.images.into_data().to_vec::<f32>().unwrap();
        let black = (0.0 - MEAN) / STD;
        let white = (1.0 - MEAN) / STD;
        assert!((pixels[0] - black).abs() < 1e-5);
        assert!((pixels[HEIGHT * WIDTH - 1] - white).abs() < 1e-5);

        batch
            .targets
            .into_data()
            .assert_eq(&TensorData::from([7i64, 7]), false);
    }

    #[test]
    fn subset_is_deterministic_and_bounded() {
        let items = synthetic_items(50);

        let first = subset(InMemDataset::new(items.clone()), Some(20), 42);
        let second = subset(InMemDataset::new(items.clone()), Some(20), 42);
        let full = subset(InMemDataset::new(items.clone()), None, 42);
        let larger = subset(InMemDataset::new(items), Some(500), 42);

        assert_eq!(first.len(), 20);
        assert_eq!(full.len(), 50);
        assert_eq!(larger.len(), 50);
        for index in 0..first.len() {
            let (a, b) = (first.get(index).unwrap(), second.get(index).unwrap());
            assert_eq!(a.label, b.label);
            assert_eq!(a.image, b.image);
        }
    }

    #[test]
    fn dataloaders_cover_the_partition() {
        let device: <TestBackend as Backend>::Device = Default::default();
        let config = crate::tests::config(10);

        let train = train_dataloader::<TestBackend, _>(
            &config,
            device.clone(),
            InMemDataset::new(synthetic_items(150)),
        );
        let test =
            test_dataloader::<TestBackend, _>(&config, device, InMemDataset::new(synthetic_items(150)));

        assert_eq!(train.num_items(), 150);
        assert_eq!(test.num_items(), 150);

        let sizes: Vec<usize> = train.iter().map(|batch| batch.targets.dims()[0]).collect();
        assert_eq!(sizes, vec![64, 64, 22]);
    }

    fn first_batch_targets(loader: &dyn DataLoader<FashionMnistBatch<TestBackend>>) -> Vec<i64> {
        let batch = loader.iter().next().unwrap();
        batch.targets.into_data().to_vec::<i64>().unwrap()
    }

    #[test]
    fn train_order_changes_every_pass_and_test_order_never_does() {
        let device: <TestBackend as Backend>::Device = Default::default();
        let config = crate::tests::config(10);

        let train = train_dataloader::<TestBackend, _>(
            &config,
            device.clone(),
            InMemDataset::new(synthetic_items(150)),
        );
        let test =
            test_dataloader::<TestBackend, _>(&config, device, InMemDataset::new(synthetic_items(150)));

        assert_ne!(
            first_batch_targets(train.as_ref()),
            first_batch_targets(train.as_ref())
        );
        assert_eq!(
            first_batch_targets(test.as_ref()),
            first_batch_targets(test.as_ref())
        );
    }
}
