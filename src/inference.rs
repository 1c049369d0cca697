use std::path::Path;

use burn::{data::dataloader::batcher::Batcher, prelude::*};

use crate::{
    data::FashionMnistBatcher,
    dataset::{FashionClass, FashionMnistItem},
    error::Error,
    training::{ModelRecorder, TrainingConfig},
};

/// Outcome of classifying one item.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Prediction {
    pub predicted: FashionClass,
    pub expected: FashionClass,
}

/// Reloads the configuration and the trained model saved in `artifact_dir` and classifies `item`.
pub fn infer<B: Backend>(
    artifact_dir: &str,
    device: B::Device,
    item: FashionMnistItem,
) -> Result<Prediction, Error> {
    let artifact_dir = Path::new(artifact_dir);
    let config = TrainingConfig::load(artifact_dir.join("config.json"))?;
    let model = config.model.init::<B>(&device).load_file(
        artifact_dir.join("model"),
        &ModelRecorder::new(),
        &device,
    )?;

    let label = item.label;
    let batcher = FashionMnistBatcher::<B>::new(device);
    let batch = batcher.batch(vec![item]);
    let output = model.forward(batch.images);
    let predicted = output.argmax(1).flatten::<1>(0, 1).into_scalar();

    let predicted = class_of(predicted.elem::<i64>() as usize)?;
    let expected = class_of(label as usize)?;

    Ok(Prediction {
        predicted,
        expected,
    })
}

fn class_of(label: usize) -> Result<FashionClass, Error> {
    FashionClass::from_label(label).ok_or(Error::UnknownLabel(label))
}
