use std::path::Path;

use tracing_core::{Level, LevelFilter, Metadata};
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{registry, Layer};

/// Records of this crate are kept from `info`, dependencies only from `warn`.
fn keep(metadata: &Metadata<'_>) -> bool {
    let ours = metadata
        .module_path()
        .is_some_and(|path| path.starts_with(env!("CARGO_CRATE_NAME")));

    ours || *metadata.level() <= Level::WARN
}

/// Sends the run's log records to `log_path`, the experiment log of the artifact directory.
///
/// Nothing happens when a global subscriber is already installed, e.g. by a previous run in the
/// same process.
pub(crate) fn install_file_logger(log_path: &Path) {
    let Some(file_name) = log_path.file_name() else {
        eprintln!("Not logging to '{}': not a file path", log_path.display());
        return;
    };
    let directory = log_path.parent().unwrap_or_else(|| Path::new("."));

    let layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_target(false)
        .with_writer(tracing_appender::rolling::never(directory, file_name))
        .with_filter(LevelFilter::INFO)
        .with_filter(filter_fn(keep));

    if registry().with(layer).try_init().is_ok() {
        report_panics_to(log_path);
    }
}

fn report_panics_to(log_path: &Path) {
    let previous = std::panic::take_hook();
    let log_path = log_path.display().to_string();

    std::panic::set_hook(Box::new(move |info| {
        log::error!("Training aborted: {info}");
        eprintln!("Training aborted, the experiment log is at '{log_path}'");
        previous(info);
    }));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_written_to_the_experiment_log() {
        let artifact_dir = tempfile::tempdir().unwrap();
        let log_path = artifact_dir.path().join("experiment.log");

        install_file_logger(&log_path);
        log::info!("epoch 1 done");

        let content = std::fs::read_to_string(&log_path).unwrap();
        assert!(content.contains("epoch 1 done"));
    }
}
