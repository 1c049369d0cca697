use burn::{config::ConfigError, record::RecorderError};

use crate::dataset::DatasetError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to load the configuration: {0:?}")]
    Config(ConfigError),

    #[error("failed to save or load the model: {0:?}")]
    Record(RecorderError),

    #[error("label {0} is not a Fashion-MNIST class")]
    UnknownLabel(usize),
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

impl From<RecorderError> for Error {
    fn from(err: RecorderError) -> Self {
        Self::Record(err)
    }
}
