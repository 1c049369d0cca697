use std::fmt::Write;

use indicatif::{ProgressBar, ProgressState, ProgressStyle};

/// Download the file at the specified url to a bytes vector.
///
/// File download progress is reported with the help of a [progress bar](indicatif).
pub fn download_file_as_bytes(url: &str, message: &str) -> Result<Vec<u8>, reqwest::Error> {
    let mut response = reqwest::blocking::get(url)?.error_for_status()?;
    let total_size = response.content_length().unwrap_or(0);

    let progress_bar = ProgressBar::new(total_size);
    let style = ProgressStyle::with_template(
        "{msg}\n    {wide_bar:.cyan/blue} {bytes}/{total_bytes} ({eta})",
    )
    .map(|style| {
        style
            .with_key("eta", |state: &ProgressState, w: &mut dyn Write| {
                write!(w, "{:.1}s", state.eta().as_secs_f64()).ok();
            })
            .progress_chars("▬  ")
    })
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    progress_bar.set_style(style);
    progress_bar.set_message(format!("Downloading {message}"));

    let mut bytes: Vec<u8> = Vec::with_capacity(total_size as usize);
    response.copy_to(&mut progress_bar.wrap_write(&mut bytes))?;

    progress_bar.finish_with_message(format!("Downloaded {message}"));

    Ok(bytes)
}
