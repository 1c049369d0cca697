use std::path::Path;

use burn::{
    data::dataloader::DataLoader,
    module::AutodiffModule,
    nn::loss::Reduction,
    prelude::*,
    record::{FullPrecisionSettings, NamedMpkFileRecorder},
    tensor::backend::AutodiffBackend,
};

use crate::{
    data::{test_dataloader, train_dataloader, FashionMnistBatch},
    dataset::FashionMnistDataset,
    error::Error,
    logger::install_file_logger,
    loss::cross_entropy,
    metric::{EvaluationAccumulator, EvaluationSummary, TrainingProgress},
    model::{Model, ModelConfig},
    optim::{MomentumSgd, OptimizerConfig},
};

/// Recorder of the trained model, full precision so a reloaded model predicts identically.
pub type ModelRecorder = NamedMpkFileRecorder<FullPrecisionSettings>;

#[derive(Config, Debug)]
pub struct TrainingConfig {
    pub model: ModelConfig,
    pub optimizer: OptimizerConfig,
    #[config(default = 10)]
    pub num_epochs: usize,
    #[config(default = 64)]
    pub batch_size: usize,
    /// Report the training loss every `log_interval` batches, never when zero.
    #[config(default = 100)]
    pub log_interval: usize,
    #[config(default = 1)]
    pub num_workers: usize,
    #[config(default = 42)]
    pub seed: u64,
    /// Train on a fixed-seed subset of this many samples instead of the whole partition.
    #[config(default = "None")]
    pub train_subset: Option<usize>,
    /// Evaluate on a fixed-seed subset of this many samples instead of the whole partition.
    #[config(default = "None")]
    pub test_subset: Option<usize>,
}

/// Everything a training run needs: configuration, model and optimizer.
pub struct Trainer<B: AutodiffBackend> {
    config: TrainingConfig,
    model: Model<B>,
    optim: MomentumSgd<Model<B>, B>,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Seeds the backend and initializes a fresh model and optimizer on `device`.
    pub fn new(config: TrainingConfig, device: &B::Device) -> Self {
        B::seed(config.seed);

        let model = config.model.init::<B>(device);
        let optim = config.optimizer.init::<B, Model<B>>();

        Self {
            config,
            model,
            optim,
        }
    }

    pub fn model(&self) -> &Model<B> {
        &self.model
    }

    pub fn into_model(self) -> Model<B> {
        self.model
    }

    /// Trains for `num_epochs`, evaluating on the test partition after every epoch.
    pub fn fit(
        &mut self,
        dataloader_train: &dyn DataLoader<FashionMnistBatch<B>>,
        dataloader_test: &dyn DataLoader<FashionMnistBatch<B::InnerBackend>>,
    ) -> Vec<EvaluationSummary> {
        log::info!(
            "Training for {} epochs on {} samples, evaluating on {} samples",
            self.config.num_epochs,
            dataloader_train.num_items(),
            dataloader_test.num_items()
        );

        (1..=self.config.num_epochs)
            .map(|epoch| {
                self.train_epoch(epoch, dataloader_train);
                let summary = self.evaluate(dataloader_test);

                println!("{summary}");
                log::info!(
                    "Epoch {epoch}: test loss {:.4}, accuracy {:.2}%",
                    summary.average_loss,
                    summary.accuracy()
                );

                summary
            })
            .collect()
    }

    /// One pass over the training partition.
    ///
    /// Returns the progress reported every `log_interval` batches, each one is also printed.
    pub fn train_epoch(
        &mut self,
        epoch: usize,
        dataloader: &dyn DataLoader<FashionMnistBatch<B>>,
    ) -> Vec<TrainingProgress> {
        let items_total = dataloader.num_items();
        let num_batches = items_total.div_ceil(self.config.batch_size.max(1));
        let mut reports = Vec::new();

        for (batch_index, batch) in dataloader.iter().enumerate() {
            let [batch_size, ..] = batch.images.dims();

            self.optim.zero_grad();
            let output = self.model.forward(batch.images);
            let loss = cross_entropy(output, batch.targets, Reduction::Mean);
            let loss_value = loss.clone().into_scalar().elem::<f64>();
            self.optim.backward(&self.model, loss);

            let model = self.model.clone();
            self.model = self.optim.step(model);

            if batch_index.checked_rem(self.config.log_interval) == Some(0) {
                let progress = TrainingProgress {
                    epoch,
                    batch_index,
                    samples_seen: batch_index * batch_size,
                    items_total,
                    num_batches,
                    loss: loss_value,
                };
                println!("{progress}");
                log::info!("{progress}");
                reports.push(progress);
            }
        }

        reports
    }

    /// One pass over the test partition with the evaluation-mode model.
    ///
    /// No gradient is tracked: the model runs on the inner backend.
    pub fn evaluate(
        &self,
        dataloader: &dyn DataLoader<FashionMnistBatch<B::InnerBackend>>,
    ) -> EvaluationSummary {
        evaluate(&self.model.valid(), dataloader)
    }
}

/// Accumulates the sum-reduced loss and the top-1 hits over a whole dataloader.
pub fn evaluate<B: Backend>(
    model: &Model<B>,
    dataloader: &dyn DataLoader<FashionMnistBatch<B>>,
) -> EvaluationSummary {
    let mut accumulator = EvaluationAccumulator::new();

    for batch in dataloader.iter() {
        let output = model.forward(batch.images);
        let loss = cross_entropy(output.clone(), batch.targets.clone(), Reduction::Sum);

        accumulator.update(loss.into_scalar().elem::<f64>(), output, batch.targets);
    }

    accumulator.summary()
}

fn create_artifact_dir(artifact_dir: &Path) -> Result<(), Error> {
    // Remove existing artifacts so the experiment log only holds this run.
    if artifact_dir.exists() {
        std::fs::remove_dir_all(artifact_dir)?;
    }
    std::fs::create_dir_all(artifact_dir)?;

    Ok(())
}

/// Downloads the dataset into `data_dir`, trains, evaluates after every epoch and saves the
/// configuration and the trained model into `artifact_dir`.
pub fn run<B: AutodiffBackend>(
    artifact_dir: &str,
    data_dir: &str,
    config: TrainingConfig,
    device: B::Device,
) -> Result<Model<B>, Error> {
    let artifact_path = Path::new(artifact_dir);
    create_artifact_dir(artifact_path)?;
    install_file_logger(&artifact_path.join("experiment.log"));

    config.save(artifact_path.join("config.json"))?;

    let dataset_train = FashionMnistDataset::train(data_dir)?;
    let dataset_test = FashionMnistDataset::test(data_dir)?;

    let dataloader_train = train_dataloader::<B, _>(&config, device.clone(), dataset_train);
    let dataloader_test =
        test_dataloader::<B::InnerBackend, _>(&config, device.clone(), dataset_test);

    let mut trainer = Trainer::new(config, &device);
    trainer.fit(dataloader_train.as_ref(), dataloader_test.as_ref());

    let model = trainer.into_model();
    model
        .clone()
        .save_file(artifact_path.join("model"), &ModelRecorder::new())?;
    log::info!("Saved the trained model to {artifact_dir}");

    Ok(model)
}
