use gradient::Progress;
use indicatif::{ProgressBar, ProgressStyle};

/// A terminal progress bar driven by the pipeline.
pub struct Job(ProgressBar);

impl Job {
    /// Counter for the counting pass, where no total is known yet.
    pub fn spinner(header: &str) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_prefix(header.to_owned());
        pb.set_style(
            ProgressStyle::with_template("{prefix}... {pos} {spinner}")
                .expect("incorrect progress bar format string"),
        );
        Self(pb)
    }

    pub fn bar(header: &str, length: u64) -> Self {
        let pb = ProgressBar::new(length);
        pb.set_prefix(header.to_owned());
        pb.set_style(
            ProgressStyle::with_template("{prefix}...\n[{wide_bar:.cyan/blue}] {pos}/{len}")
                .expect("incorrect progress bar format string")
                .progress_chars("#>-"),
        );
        Self(pb)
    }

    pub fn finish(&self) {
        self.0.finish();
    }
}

impl Progress for Job {
    fn inc(&self) {
        self.0.inc(1);
    }
}
