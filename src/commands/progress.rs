//! Progress bars for long transfers

use indicatif::{ProgressBar, ProgressStyle};
use spi2ahb_core::TransferProgress;

/// Transfers shorter than this finish without a bar
const MIN_BAR_BYTES: usize = 4096;

/// [`TransferProgress`] drawn as an indicatif bar
pub struct BarProgress {
    bar: Option<ProgressBar>,
    message: &'static str,
}

impl BarProgress {
    /// Create an observer that prints `message` when the transfer completes
    pub fn new(message: &'static str) -> Self {
        Self { bar: None, message }
    }
}

impl TransferProgress for BarProgress {
    fn started(&mut self, total_bytes: usize) {
        if total_bytes < MIN_BAR_BYTES {
            return;
        }

        let pb = ProgressBar::new(total_bytes as u64);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
            .map(|s| s.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
        pb.set_style(style);
        self.bar = Some(pb);
    }

    fn advanced(&mut self, bytes_done: usize) {
        if let Some(pb) = &self.bar {
            pb.set_position(bytes_done as u64);
        }
    }

    fn finished(&mut self) {
        if let Some(pb) = self.bar.take() {
            pb.finish_with_message(self.message);
        }
    }
}
