use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// One bar per dispatched phase; a new label replaces the previous bar.
pub(crate) struct HumanProgress {
    inner: Mutex<Option<PhaseBar>>,
}

struct PhaseBar {
    label: String,
    pb: ProgressBar,
}

impl HumanProgress {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    pub(crate) fn update(&self, label: &str, total: u64, completed: u64, message: String) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if inner.as_ref().is_some_and(|b| b.label != label)
            && let Some(old) = inner.take()
        {
            old.pb.finish_and_clear();
        }

        let bar = inner.get_or_insert_with(|| {
            let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stderr_with_hz(5));
            pb.set_style(bar_style());
            pb.set_prefix(label.to_string());
            PhaseBar {
                label: label.to_string(),
                pb,
            }
        });

        bar.pb.set_length(total);
        bar.pb.set_position(completed.min(total));
        bar.pb.set_message(message);
    }

    /// Prints a line above the bar without tearing it.
    pub(crate) fn println(&self, line: String) {
        let inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        match inner.as_ref() {
            Some(bar) => bar.pb.println(line),
            None => eprintln!("{line}"),
        }
    }

    pub(crate) fn finish(&self) {
        let mut inner = self
            .inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(bar) = inner.take() {
            bar.pb.finish_and_clear();
        }
    }
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{prefix} [ {bar:20.cyan/blue} ] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█░")
}
