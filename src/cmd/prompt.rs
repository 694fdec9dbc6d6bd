//! The `prompt` subcommand.

use clap::Args;
use receipt_digitizer::{prelude::*, structuring::prompt::ReceiptPrompt};
use tokio::io::AsyncWriteExt as _;

/// Prompt command line arguments.
#[derive(Debug, Args)]
pub struct PromptOpts {
    /// The output path to write the prompt to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// Print our built-in structuring prompt, as a starting point for custom
/// prompts.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_prompt(opts: &PromptOpts) -> Result<()> {
    let prompt = ReceiptPrompt::default();
    let mut wtr = super::create_writer(opts.output_path.as_deref()).await?;
    wtr.write_all(prompt.template().as_bytes())
        .await
        .context("failed to write prompt")?;
    wtr.write_all(b"\n").await.context("failed to write prompt")?;
    wtr.flush().await.context("failed to flush prompt")?;
    Ok(())
}
