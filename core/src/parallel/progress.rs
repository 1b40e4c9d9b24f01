use indicatif::{ProgressBar, ProgressStyle};

const TEMPLATE: &str = "{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})";

/// Creates a progress bar for a batch of `len` items
///
/// Returns a hidden bar when `visible` is false so callers can update it
/// unconditionally.
pub fn batch_bar(len: usize, label: &str, visible: bool) -> ProgressBar {
    if !visible {
        return ProgressBar::hidden();
    }

    let bar = ProgressBar::new(len as u64);
    match ProgressStyle::default_bar().template(TEMPLATE) {
        Ok(style) => bar.set_style(style.progress_chars("=> ")),
        Err(e) => log::debug!("Falling back to default progress style: {}", e),
    }
    bar.set_message(label.to_string());
    bar
}
