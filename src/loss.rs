use burn::{nn::loss::Reduction, prelude::*, tensor::activation::log_softmax};

/// Categorical cross-entropy between logits and class indices.
///
/// The loss of a sample is the negative log of the softmax probability assigned to its target
/// class. [Reduction::Sum] adds the per-sample losses, so they can be accumulated over a whole
/// partition and divided once; [Reduction::Mean] and [Reduction::Auto] average them over the batch.
///
/// # Shapes
///   - Logits [batch_size, num_classes]
///   - Targets [batch_size]
///   - Output [1]
pub fn cross_entropy<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
    reduction: Reduction,
) -> Tensor<B, 1> {
    let losses = cross_entropy_no_reduction(logits, targets);

    match reduction {
        Reduction::Mean | Reduction::Auto => losses.mean(),
        Reduction::Sum => losses.sum(),
    }
}

/// Per-sample cross-entropy, `[batch_size]`.
pub fn cross_entropy_no_reduction<B: Backend>(
    logits: Tensor<B, 2>,
    targets: Tensor<B, 1, Int>,
) -> Tensor<B, 1> {
    let [batch_size, _] = logits.dims();
    let log_probs = log_softmax(logits, 1);

    log_probs
        .gather(1, targets.reshape([batch_size, 1]))
        .reshape([batch_size])
        .neg()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::TestBackend;
    use burn::{nn::loss::CrossEntropyLossConfig, tensor::Distribution};

    fn logits_and_targets(
        device: &<TestBackend as Backend>::Device,
    ) -> (Tensor<TestBackend, 2>, Tensor<TestBackend, 1, Int>) {
        let logits = Tensor::from_data(
            TensorData::from([
                [2.0f32, -1.0, 0.5, 0.0],
                [0.1, 0.2, 0.3, 0.4],
                [-3.0, 4.0, 1.0, -0.5],
            ]),
            device,
        );
        let targets = Tensor::from_data(TensorData::from([0i64, 3, 2]), device);

        (logits, targets)
    }

    #[test]
    fn mean_reduction_matches_framework_cross_entropy() {
        let device = Default::default();
        let (logits, targets) = logits_and_targets(&device);

        let expected = CrossEntropyLossConfig::new()
            .init(&device)
            .forward(logits.clone(), targets.clone());
        let loss = cross_entropy(logits, targets, Reduction::Mean);

        loss.into_data().assert_approx_eq(&expected.into_data(), 5);
    }

    #[test]
    fn sum_reduction_is_batch_size_times_mean() {
        let device = Default::default();
        let (logits, targets) = logits_and_targets(&device);

        let mean = cross_entropy(logits.clone(), targets.clone(), Reduction::Mean).into_scalar();
        let sum = cross_entropy(logits, targets, Reduction::Sum).into_scalar();

        assert!((sum - 3.0 * mean).abs() < 1e-5);
    }

    #[test]
    fn uniform_logits_cost_log_of_class_count() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::zeros([4, 10], &device);
        let targets =
            Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([0i64, 3, 9, 5]), &device);

        let loss = cross_entropy(logits, targets, Reduction::Mean).into_scalar();

        assert!((loss - 10f32.ln()).abs() < 1e-5);
    }

    #[test]
    fn loss_is_never_negative() {
        let device = Default::default();
        let logits =
            Tensor::<TestBackend, 2>::random([32, 10], Distribution::Normal(0.0, 2.0), &device);
        let targets = Tensor::<TestBackend, 1, Int>::from_data(
            TensorData::new((0..32i64).map(|i| i % 10).collect::<Vec<_>>(), [32]),
            &device,
        );

        let losses = cross_entropy_no_reduction(logits, targets)
            .into_data()
            .to_vec::<f32>()
            .unwrap();

        assert_eq!(losses.len(), 32);
        // Rounding of the log-sum-exp may leave a dominant class a hair under zero.
        assert!(losses.iter().all(|loss| *loss >= -1e-6));
    }

    #[test]
    fn confident_correct_prediction_costs_almost_nothing() {
        let device = Default::default();
        let logits = Tensor::<TestBackend, 2>::from_data(
            TensorData::from([[50.0f32, 0.0, 0.0]]),
            &device,
        );
        let targets = Tensor::<TestBackend, 1, Int>::from_data(TensorData::from([0i64]), &device);

        let loss = cross_entropy(logits, targets, Reduction::Mean).into_scalar();

        assert!(loss.abs() < 1e-6);
    }
}
