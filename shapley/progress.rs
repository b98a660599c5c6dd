use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::fmt;
use std::io::IsTerminal;

/// Stages reported while estimating Shapley effects.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShapleyStage {
    DesignConstruction,
    ModelEvaluation,
    EffectEstimation,
}

impl ShapleyStage {
    pub fn describe(self) -> &'static str {
        match self {
            Self::DesignConstruction => "design construction",
            Self::ModelEvaluation => "model evaluation",
            Self::EffectEstimation => "effect estimation",
        }
    }
}

impl fmt::Display for ShapleyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// Observer for reporting incremental progress of an estimate.
///
/// The design and estimation stages advance once per permutation; model
/// evaluation is a single step.
pub trait ShapleyProgressObserver {
    fn on_stage_start(&mut self, stage: ShapleyStage, total: usize) {
        let _ = (stage, total);
    }
    fn on_stage_advance(&mut self, stage: ShapleyStage, processed: usize) {
        let _ = (stage, processed);
    }
    fn on_stage_finish(&mut self, stage: ShapleyStage) {
        let _ = stage;
    }
}

#[derive(Default)]
pub struct NoopShapleyProgress;

impl ShapleyProgressObserver for NoopShapleyProgress {}

/// Progress bars on stderr, hidden when stderr is not a terminal.
#[derive(Default)]
pub struct ConsoleProgress {
    bar: Option<ProgressBar>,
}

impl ConsoleProgress {
    pub fn new() -> Self {
        Self::default()
    }
}

fn create_progress_bar(len: u64, message: &str) -> ProgressBar {
    let draw_target = if std::io::stderr().is_terminal() {
        ProgressDrawTarget::stderr_with_hz(20)
    } else {
        ProgressDrawTarget::hidden()
    };

    let pb = ProgressBar::with_draw_target(Some(len), draw_target);
    let style = ProgressStyle::with_template(
        "> [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
    )
    .map(|style| style.progress_chars("█▉▊▋▌▍▎▏  "))
    .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_message(message.to_string());

    pb
}

impl ShapleyProgressObserver for ConsoleProgress {
    fn on_stage_start(&mut self, stage: ShapleyStage, total: usize) {
        if let Some(previous) = self.bar.take() {
            previous.finish_and_clear();
        }
        self.bar = Some(create_progress_bar(total as u64, stage.describe()));
    }

    fn on_stage_advance(&mut self, _: ShapleyStage, processed: usize) {
        if let Some(bar) = &self.bar {
            bar.set_position(processed as u64);
        }
    }

    fn on_stage_finish(&mut self, stage: ShapleyStage) {
        if let Some(bar) = self.bar.take() {
            bar.finish_with_message(format!("{stage} complete"));
        }
    }
}
