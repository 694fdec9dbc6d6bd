//! The `scan` subcommand.

use std::{str::FromStr, sync::Arc};

use clap::Args;
use receipt_digitizer::{
    capture::{CaptureOptions, FileImageSource},
    config::OcrConfig,
    ocr::vision::VisionOcrEngine,
    pipeline::{CycleOutcome, PipelineController, PipelineServices},
    prelude::*,
    structuring::{StructuringOpts, openai::OpenAiStructuringDriver, prompt::ReceiptPrompt},
};

use crate::ui::Ui;

/// A quantity change to apply once the receipt is loaded, such as `2:+1` or
/// `0:-3`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Adjustment {
    /// The item to change.
    pub index: usize,
    /// How many units to add (or remove, if negative).
    pub delta: i64,
}

impl FromStr for Adjustment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (index, delta) = s
            .split_once(':')
            .ok_or_else(|| anyhow!("expected INDEX:DELTA, like 2:+1, got {s:?}"))?;
        let index = index
            .trim()
            .parse()
            .with_context(|| format!("bad item index in {s:?}"))?;
        let delta = delta
            .trim()
            .trim_start_matches('+')
            .parse()
            .with_context(|| format!("bad quantity change in {s:?}"))?;
        Ok(Self { index, delta })
    }
}

/// Scan command line arguments.
#[derive(Debug, Args)]
pub struct ScanOpts {
    /// A photo of a receipt.
    pub image_path: PathBuf,

    /// Change an item's quantity after scanning, as `INDEX:DELTA`. May be
    /// repeated. Item indices start at 0.
    #[clap(long = "adjust", value_name = "INDEX:DELTA", allow_hyphen_values = true)]
    pub adjustments: Vec<Adjustment>,

    /// A custom structuring prompt. Use `{{{ocr_text}}}` to mark where the
    /// receipt text goes; otherwise it's added at the end.
    #[clap(long = "prompt")]
    pub prompt_path: Option<PathBuf>,

    /// Where to write the receipt JSON. Defaults to stdout.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,

    #[clap(flatten)]
    pub capture_opts: CaptureOptions,

    #[clap(flatten)]
    pub structuring_opts: StructuringOpts,
}

/// Run the `scan` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_scan(ui: Ui, opts: &ScanOpts) -> Result<()> {
    let ocr_config = OcrConfig::from_env()?;
    debug!(?ocr_config, "OCR configuration");
    let prompt = match &opts.prompt_path {
        Some(path) => ReceiptPrompt::from_path(path).await?,
        None => ReceiptPrompt::default(),
    };

    let services = PipelineServices {
        image_source: Arc::new(FileImageSource::new(Some(opts.image_path.clone()))),
        ocr: Arc::new(VisionOcrEngine::new(ocr_config)),
        structuring: Arc::new(OpenAiStructuringDriver::new(
            prompt,
            opts.structuring_opts.clone(),
        )),
    };
    let controller = PipelineController::new(services, opts.capture_opts.clone());
    let spinner = ui.follow_pipeline(controller.subscribe());

    match controller.start_capture().await {
        CycleOutcome::Ready(_) => {}
        CycleOutcome::Cancelled => {
            return Err(anyhow!(
                "no image was captured from {}",
                opts.image_path.display()
            ));
        }
        CycleOutcome::Failed(failure) => return Err(failure.into()),
        CycleOutcome::Superseded => {
            return Err(anyhow!("scan was interrupted by another scan"));
        }
    }

    for adjustment in &opts.adjustments {
        apply_adjustment(&controller, *adjustment)?;
    }
    let receipt = controller.receipt();

    // Dropping the controller closes the state channel, which stops the
    // spinner.
    drop(controller);
    spinner.await.context("could not join spinner task")?;

    super::write_json(opts.output_path.as_deref(), &receipt).await
}

/// Apply a single adjustment through the cart.
fn apply_adjustment(controller: &PipelineController, adjustment: Adjustment) -> Result<()> {
    let Adjustment { index, delta } = adjustment;
    let item = controller.adjust_quantity(index, delta)?;
    debug!(index, delta, quantity = item.quantity, "Applied adjustment");
    Ok(())
}
