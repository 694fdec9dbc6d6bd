use std::str::FromStr;

use clap::{Parser, Subcommand};
use receipt_digitizer::{config::load_dotenv, prelude::*};
use tracing_subscriber::{
    EnvFilter, Layer as _, filter::Directive, fmt::format::FmtSpan, layer::SubscriberExt,
    util::SubscriberInitExt as _,
};

use self::ui::Ui;

mod cmd;
mod ui;

/// Turn photographed receipts into editable, itemized carts.
#[derive(Debug, Parser)]
#[clap(
    version,
    author,
    after_help = r#"
Environment Variables:
  - OCR_API_KEY: Bearer token for the OCR service.
  - OCR_PROJECT_ID (optional): Project to bill OCR requests to.
  - OCR_API_BASE (optional): Override the OCR server URL.
  - OPENAI_API_BASE (optional): Override the structuring server URL.
  - OPENAI_API_KEY: The OpenAI key to use.

  These variables may be set in a standard `.env` file.
"#
)]
struct Opts {
    #[clap(subcommand)]
    subcmd: Cmd,
}

/// The subcommands we support.
#[derive(Debug, Subcommand)]
enum Cmd {
    /// Scan a photo of a receipt, and print the itemized receipt.
    Scan(cmd::scan::ScanOpts),
    /// Validate raw structuring-service output, and print the normalized receipt.
    Validate(cmd::validate::ValidateOpts),
    /// Print schemas for our output formats.
    Schema(cmd::schema::SchemaOpts),
    /// Print the built-in structuring prompt.
    Prompt(cmd::prompt::PromptOpts),
}

impl Cmd {
    /// Are we using stdout for output?
    fn using_stdout_for_output(&self) -> bool {
        match self {
            Cmd::Scan(opts) => opts.output_path.is_none(),
            Cmd::Validate(opts) => opts.output_path.is_none(),
            Cmd::Schema(opts) => opts.output_path.is_none(),
            Cmd::Prompt(opts) => opts.output_path.is_none(),
        }
    }
}

/// Our entry point, which can return an error. [`anyhow::Result`] will
/// automatically print a nice error message with optional backtrace.
#[tokio::main]
async fn main() -> Result<()> {
    let ui = Ui::init();

    // Initialize tracing.
    let directive =
        Directive::from_str("info").expect("built-in directive should be valid");
    let env_filter = EnvFilter::builder()
        .with_default_directive(directive)
        .from_env_lossy();

    let subscriber = tracing_subscriber::fmt::layer()
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_writer(ui.get_stderr_writer())
        .with_filter(env_filter);
    tracing_subscriber::registry().with(subscriber).init();

    real_main(ui).await
}

/// Our real entry point.
#[instrument(level = "debug", name = "main", skip_all)]
async fn real_main(ui: Ui) -> Result<()> {
    load_dotenv();

    let opts = Opts::parse();
    debug!("Parsed options: {:?}", opts);

    // Progress output only makes sense when stdout is free. Scans written to
    // a file still get a spinner.
    if opts.subcmd.using_stdout_for_output() {
        ui.hide_progress_bars();
    }

    match &opts.subcmd {
        Cmd::Scan(opts) => cmd::scan::cmd_scan(ui, opts).await?,
        Cmd::Validate(opts) => cmd::validate::cmd_validate(opts).await?,
        Cmd::Schema(opts) => cmd::schema::cmd_schema(opts).await?,
        Cmd::Prompt(opts) => cmd::prompt::cmd_prompt(opts).await?,
    }
    Ok(())
}
