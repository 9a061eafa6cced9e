#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the crime insight binaries.
//!
//! [`TaskProgress`] renders a worker pool task as a single line that starts
//! as a spinner while the task waits for an execution unit and turns into a
//! percentage bar once it is dispatched. [`init_logger`] routes `log` output
//! through the same [`MultiProgress`] so the two never interleave.

use std::sync::Arc;
use std::time::Duration;

use crime_insight_worker::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use log::LevelFilter;

pub use indicatif::MultiProgress;

const WAITING_TEMPLATE: &str = "{spinner:.yellow} {prefix:.bold} {msg:.dim}";
const RUNNING_TEMPLATE: &str =
    "{spinner:.cyan} {prefix:.bold} [{bar:32.cyan/blue}] {percent:>3}% {elapsed:>4} {msg}";
const DONE_TEMPLATE: &str = "  {prefix:.bold} {msg} ({elapsed})";

fn style(template: &str) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Progress line for one analytics task.
pub struct TaskProgress {
    bar: ProgressBar,
}

impl TaskProgress {
    /// Adds a waiting spinner labelled `job` to `multi`.
    #[must_use]
    pub fn task_bar(multi: &MultiProgress, job: &str) -> Arc<dyn ProgressCallback> {
        let bar = multi.add(ProgressBar::new_spinner().with_style(style(WAITING_TEMPLATE)));
        bar.set_prefix(job.to_string());
        bar.set_message("waiting for a worker");
        bar.enable_steady_tick(Duration::from_millis(120));
        Arc::new(Self { bar })
    }
}

impl ProgressCallback for TaskProgress {
    // The pool calls this on dispatch, so this is where the spinner becomes a bar.
    fn set_total(&self, total: u64) {
        self.bar.reset_elapsed();
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(style(RUNNING_TEMPLATE).progress_chars("=> "));
    }

    fn set_position(&self, pos: u64) {
        self.bar.set_position(pos);
    }

    fn set_message(&self, msg: String) {
        self.bar.set_message(msg);
    }

    fn finish(&self, msg: String) {
        self.bar.set_style(style(DONE_TEMPLATE));
        self.bar.finish_with_message(msg);
    }

    fn finish_and_clear(&self) {
        self.bar.finish_and_clear();
    }
}

/// Installs `pretty_env_logger` behind `indicatif-log-bridge` and returns
/// the [`MultiProgress`] every progress line has to join.
///
/// Logs at `info` unless `RUST_LOG` says otherwise. A second call keeps the
/// logger that is already installed.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(LevelFilter::Info)
        .parse_env("RUST_LOG")
        .build();
    let max_level = logger.filter();

    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(max_level);
    }

    multi
}
