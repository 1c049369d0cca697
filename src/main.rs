use burn::{backend::Autodiff, data::dataset::Dataset};
use fashion_mnist::{
    dataset::FashionMnistDataset,
    inference,
    model::ModelConfig,
    optim::OptimizerConfig,
    training::{self, TrainingConfig},
    Error,
};

const ARTIFACT_DIR: &str = "/tmp/fashion-mnist";
const DATA_DIR: &str = "./.data";

#[cfg(not(feature = "wgpu"))]
mod backend {
    use burn::backend::{ndarray::NdArrayDevice, NdArray};

    pub type Backend = NdArray<f32>;

    pub fn device() -> NdArrayDevice {
        NdArrayDevice::Cpu
    }
}

#[cfg(feature = "wgpu")]
mod backend {
    use burn::backend::{wgpu::WgpuDevice, Wgpu};

    pub type Backend = Wgpu;

    pub fn device() -> WgpuDevice {
        WgpuDevice::default()
    }
}

fn main() -> Result<(), Error> {
    let device = backend::device();
    let config = TrainingConfig::new(ModelConfig::new(), OptimizerConfig::new());

    training::run::<Autodiff<backend::Backend>>(ARTIFACT_DIR, DATA_DIR, config, device.clone())?;

    let dataset = FashionMnistDataset::test(DATA_DIR)?;
    if let Some(item) = dataset.get(42) {
        let prediction = inference::infer::<backend::Backend>(ARTIFACT_DIR, device, item)?;
        println!(
            "Predicted {} Expected {}",
            prediction.predicted, prediction.expected
        );
    }

    Ok(())
}
