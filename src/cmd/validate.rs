//! The `validate` subcommand.

use clap::Args;
use receipt_digitizer::{
    prelude::*,
    validator::{self, RawModelOutput},
};

/// Validate command line arguments.
#[derive(Debug, Args)]
pub struct ValidateOpts {
    /// Raw structuring-service output to validate. Defaults to stdin.
    pub input_path: Option<PathBuf>,

    /// Where to write the normalized receipt JSON. Defaults to stdout.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// Run the `validate` subcommand. This runs only the validator, which is
/// handy for checking a prompt's output without calling any services.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_validate(opts: &ValidateOpts) -> Result<()> {
    let raw = RawModelOutput(super::read_to_string(opts.input_path.as_deref()).await?);
    let receipt = validator::parse(&raw)?;
    super::write_json(opts.output_path.as_deref(), &receipt).await
}
