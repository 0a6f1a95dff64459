//! Progress reporting using indicatif progress bars

use indicatif::{ProgressBar, ProgressStyle};
use picprog_core::flash::{Operation, ProgressSink};

/// Create a progress bar with the operation name as its message
fn create_progress_bar(total: u64, operation: Operation) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} {msg:<15} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}, {eta})")
        .map(|style| style.progress_chars("#>-"));
    if let Ok(style) = style {
        pb.set_style(style);
    }
    pb.set_message(operation.name());
    pb
}

/// Progress sink drawing one bar per operation
#[derive(Default)]
pub struct IndicatifProgress {
    current: Option<(Operation, ProgressBar)>,
}

impl IndicatifProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ProgressSink for IndicatifProgress {
    fn report(&mut self, operation: Operation, done: usize, total: usize) {
        if total == 0 {
            return;
        }

        let stale = matches!(&self.current, Some((op, _)) if *op != operation);
        if stale {
            if let Some((_, pb)) = self.current.take() {
                pb.abandon();
            }
        }
        let (_, pb) = self
            .current
            .get_or_insert_with(|| (operation, create_progress_bar(total as u64, operation)));

        pb.set_position(done as u64);
        if done >= total {
            pb.finish_with_message(format!("{} done", operation.name()));
            self.current = None;
        }
    }
}
