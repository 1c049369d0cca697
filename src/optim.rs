use burn::{
    module::AutodiffModule,
    optim::{
        adaptor::OptimizerAdaptor, momentum::MomentumConfig, GradientsAccumulator,
        GradientsParams, Optimizer, Sgd, SgdConfig,
    },
    prelude::*,
    tensor::backend::AutodiffBackend,
    LearningRate,
};

/// Configuration to create a [momentum SGD](MomentumSgd) optimizer.
#[derive(Config, Debug)]
pub struct OptimizerConfig {
    /// Step size applied to the velocity.
    #[config(default = 0.01)]
    pub learning_rate: LearningRate,
    /// Weight of the previous velocity.
    #[config(default = 0.5)]
    pub momentum: f64,
}

impl OptimizerConfig {
    /// Initialize the optimizer for a module.
    pub fn init<B, M>(&self) -> MomentumSgd<M, B>
    where
        B: AutodiffBackend,
        M: AutodiffModule<B>,
    {
        // No dampening: the velocity is `momentum * velocity + gradient`.
        let momentum = MomentumConfig::new()
            .with_momentum(self.momentum)
            .with_dampening(0.0)
            .with_nesterov(false);
        let optim = SgdConfig::new().with_momentum(Some(momentum)).init();

        MomentumSgd {
            optim,
            grads: GradientsAccumulator::new(),
            learning_rate: self.learning_rate,
        }
    }
}

/// Stochastic gradient descent with momentum.
///
/// Gradients are accumulated by [backward](MomentumSgd::backward) until
/// [zero_grad](MomentumSgd::zero_grad) clears them, and [step](MomentumSgd::step) applies
///
/// ```text
/// velocity = momentum * velocity + gradient
/// parameter = parameter - learning_rate * velocity
/// ```
///
/// The velocity of every parameter starts at zero.
pub struct MomentumSgd<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    optim: OptimizerAdaptor<Sgd<B::InnerBackend>, M, B>,
    grads: GradientsAccumulator<M>,
    learning_rate: LearningRate,
}

impl<M, B> MomentumSgd<M, B>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>,
{
    /// Clear the accumulated gradients.
    pub fn zero_grad(&mut self) {
        self.grads = GradientsAccumulator::new();
    }

    /// Compute the gradients of `loss` with respect to every parameter of `module` and add them
    /// to the accumulated ones.
    pub fn backward(&mut self, module: &M, loss: Tensor<B, 1>) {
        let grads = GradientsParams::from_grads(loss.backward(), module);
        self.grads.accumulate::<B>(module, grads);
    }

    /// Update the module with the accumulated gradients.
    ///
    /// The accumulator is left empty.
    pub fn step(&mut self, module: M) -> M {
        let grads = self.grads.grads();
        self.optim.step(self.learning_rate, module, grads)
    }
}
