//! Terminal UI: a spinner which follows the pipeline, and a log writer which
//! stays out of its way.

use std::{
    io::{self, Write as _},
    sync::Arc,
    time::Duration,
};

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use receipt_digitizer::pipeline::PipelineState;
use tokio::{sync::watch, task::JoinHandle};

/// Application UI state.
#[derive(Clone)]
pub struct Ui {
    /// Our progress bars.
    multi_progress: Arc<MultiProgress>,
}

impl Ui {
    /// Create a new UI.
    pub fn init() -> Ui {
        let multi_progress = Arc::new(MultiProgress::new());
        Ui { multi_progress }
    }

    /// Hide all our progress bars completely, for when we're writing actual
    /// output to `stdout`.
    pub fn hide_progress_bars(&self) {
        self.multi_progress
            .set_draw_target(ProgressDrawTarget::hidden());
    }

    /// Get a writer that can be used to write to stderr, for use with `tracing`
    /// and other output code.
    pub fn get_stderr_writer(&self) -> SafeStderrWriter {
        SafeStderrWriter { ui: self.clone() }
    }

    /// Get a reference to our progress bars.
    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi_progress
    }

    /// Create a new spinner with default settings.
    pub fn new_spinner(&self, emoji: &str, msg: &str) -> ProgressBar {
        let sp = ProgressBar::new_spinner().with_style(default_spinner_style());
        let sp = self.multi_progress.add(sp);
        sp.set_prefix(emoji.to_owned());
        sp.set_message(msg.to_owned());
        sp.enable_steady_tick(Duration::from_millis(250));
        sp
    }

    /// Show a spinner which follows pipeline state changes until the
    /// controller is dropped.
    pub fn follow_pipeline(
        &self,
        mut state_rx: watch::Receiver<PipelineState>,
    ) -> JoinHandle<()> {
        let sp = self.new_spinner(&state_emoji(&state_rx.borrow()), "starting");
        tokio::spawn(async move {
            loop {
                let state = state_rx.borrow_and_update().clone();
                sp.set_prefix(state_emoji(&state));
                sp.set_message(state.to_string());
                if state_rx.changed().await.is_err() {
                    break;
                }
            }
            sp.finish();
        })
    }
}

/// A little picture for each state.
fn state_emoji(state: &PipelineState) -> String {
    let emoji = match state {
        PipelineState::Idle => "💤",
        PipelineState::CapturingImage => "📷",
        PipelineState::RecognizingText => "🔍",
        PipelineState::StructuringData => "🧾",
        PipelineState::Ready => "✅",
        PipelineState::Failed(_) => "❌",
    };
    emoji.to_owned()
}

fn default_spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner} {prefix:3}{msg}")
        .expect("bad progress bar template")
}

/// Log output for `tracing`. Each write pauses the pipeline spinner, so log
/// lines never land in the middle of it.
#[derive(Clone)]
pub struct SafeStderrWriter {
    ui: Ui,
}

impl SafeStderrWriter {
    /// Run `f` against stderr with the spinner hidden.
    fn suspend<R>(&self, f: impl FnOnce(&mut io::Stderr) -> R) -> R {
        self.ui.multi_progress().suspend(|| f(&mut io::stderr()))
    }
}

// `write` alone would be enough, but a formatted log line arrives in several
// pieces unless `write_all` and `write_fmt` are handled in one go.
impl io::Write for SafeStderrWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.suspend(|stderr| stderr.write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.suspend(|stderr| stderr.flush())
    }

    fn write_vectored(&mut self, bufs: &[io::IoSlice<'_>]) -> io::Result<usize> {
        self.suspend(|stderr| stderr.write_vectored(bufs))
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.suspend(|stderr| stderr.write_all(buf))
    }

    fn write_fmt(&mut self, fmt: std::fmt::Arguments<'_>) -> io::Result<()> {
        self.suspend(|stderr| stderr.write_fmt(fmt))
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for SafeStderrWriter {
    type Writer = SafeStderrWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
