use std::fmt;

use burn::prelude::*;

/// Progress of the training pass, reported every `log_interval` batches.
#[derive(Clone, Debug, PartialEq)]
pub struct TrainingProgress {
    /// Epoch number, starting at 1.
    pub epoch: usize,
    /// Zero-based position of the batch within the epoch.
    pub batch_index: usize,
    /// Samples processed before this batch.
    pub samples_seen: usize,
    /// Samples in the training partition.
    pub items_total: usize,
    /// Batches in the training partition.
    pub num_batches: usize,
    /// Mean loss of the current batch.
    pub loss: f64,
}

impl TrainingProgress {
    pub fn percent(&self) -> f64 {
        if self.num_batches == 0 {
            return 0.0;
        }
        100.0 * self.batch_index as f64 / self.num_batches as f64
    }
}

impl fmt::Display for TrainingProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Train Epoch: {} [{}/{} ({:.0}%)]\tLoss: {:.6}",
            self.epoch,
            self.samples_seen,
            self.items_total,
            self.percent(),
            self.loss
        )
    }
}

/// Accumulates the sum-reduced loss and top-1 hits over an evaluation pass.
#[derive(Clone, Debug, Default)]
pub struct EvaluationAccumulator {
    loss_sum: f64,
    correct: usize,
    total: usize,
}

impl EvaluationAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one batch: its summed loss, its logits and its targets.
    pub fn update<B: Backend>(
        &mut self,
        loss_sum: f64,
        output: Tensor<B, 2>,
        targets: Tensor<B, 1, Int>,
    ) {
        let [batch_size, _] = output.dims();

        self.loss_sum += loss_sum;
        self.correct += num_correct(output, targets);
        self.total += batch_size;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn summary(&self) -> EvaluationSummary {
        let average_loss = match self.total {
            0 => 0.0,
            total => self.loss_sum / total as f64,
        };

        EvaluationSummary {
            average_loss,
            correct: self.correct,
            total: self.total,
        }
    }
}

/// Number of samples whose highest-scoring class is the target.
pub fn num_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let predictions = output.argmax(1).squeeze::<1>(1);

    predictions
        .equal(targets)
        .int()
        .sum()
        .into_scalar()
        .elem::<i64>() as usize
}

/// Result of an evaluation pass over the test partition.
#[derive(Clone, Debug, PartialEq)]
pub struct EvaluationSummary {
    pub average_loss: f64,
    pub correct: usize,
    pub total: usize,
}

impl EvaluationSummary {
    /// Top-1 accuracy in percent, `100 * correct / total`.
    pub fn accuracy(&self) -> f64 {
        match self.total {
            0 => 0.0,
            total => 100.0 * self.correct as f64 / total as f64,
        }
    }
}

impl fmt::Display for EvaluationSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "\nTest set: Average loss: {:.4}, Accuracy: {}/{} ({:.0}%)\n",
            self.average_loss,
            self.correct,
            self.total,
            self.accuracy()
        )
    }
}
