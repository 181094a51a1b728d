use std::cmp::min;
use std::fmt::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressState, ProgressStyle};

use crate::shutdown::DelegatedShutdownListener;

/// What the progress bar counts towards.
#[derive(Debug, Clone)]
pub(crate) enum ProgressTarget {
    /// A time bounded run, the bar fills as the planned runtime elapses.
    Duration(Duration),
    /// An iteration bounded run, the bar fills as virtual users complete behaviour runs.
    Iterations {
        total: usize,
        completed: Arc<AtomicUsize>,
    },
}

/// Displays a progress bar while the test is running to show the user how much is left.
pub(crate) fn start_progress(
    target: ProgressTarget,
    mut shutdown_listener: DelegatedShutdownListener,
) {
    let spawned = std::thread::Builder::new()
        .name("progress".to_string())
        .spawn(move || {
            let start_time = Instant::now();
            let pb = match &target {
                ProgressTarget::Duration(planned_runtime) => duration_bar(*planned_runtime),
                ProgressTarget::Iterations { total, .. } => iterations_bar(*total),
            };

            loop {
                if shutdown_listener.should_shutdown() {
                    log::trace!("Progress thread shutting down");
                    pb.finish_and_clear();
                    break;
                }

                let position = match &target {
                    ProgressTarget::Duration(planned_runtime) => {
                        min(start_time.elapsed().as_secs(), planned_runtime.as_secs())
                    }
                    ProgressTarget::Iterations { total, completed } => {
                        min(completed.load(Ordering::Relaxed), *total) as u64
                    }
                };
                pb.set_position(position);
                std::thread::sleep(Duration::from_millis(500));
            }
        });

    if let Err(e) = spawned {
        log::warn!("Failed to start progress thread, continuing without it: {e:?}");
    }
}

fn duration_bar(planned_runtime: Duration) -> ProgressBar {
    let hours = planned_runtime.as_secs() / 3600;
    let minutes = (planned_runtime.as_secs() % 3600) / 60;
    let seconds = planned_runtime.as_secs() % 60;

    let pb = ProgressBar::new(planned_runtime.as_secs());
    match ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] [{elapsed_precise} / {planned_runtime}]",
    ) {
        Ok(style) => pb.set_style(
            style
                .with_key(
                    "planned_runtime",
                    move |_state: &ProgressState, w: &mut dyn Write| {
                        let _ = write!(w, "{:02}:{:02}:{:02}", hours, minutes, seconds);
                    },
                )
                .progress_chars("#>-"),
        ),
        Err(e) => log::debug!("Using default progress style: {e}"),
    }
    pb
}

fn iterations_bar(total: usize) -> ProgressBar {
    let pb = ProgressBar::new(total as u64);
    match ProgressStyle::with_template(
        "{spinner:.green} [{wide_bar:.cyan/blue}] {pos}/{len} journeys [{elapsed_precise}]",
    ) {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Using default progress style: {e}"),
    }
    pb
}
