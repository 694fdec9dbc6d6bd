//! The `schema` subcommand.

use clap::{Args, ValueEnum};
use receipt_digitizer::{
    prelude::*,
    receipt::{LineItem, Receipt},
};
use schemars::schema_for;

/// The different schema types we support.
///
/// We parse these as PascalCase, because they represent type names.
#[derive(Debug, Clone, Copy, ValueEnum)]
#[clap(rename_all = "PascalCase")]
pub enum SchemaType {
    /// A normalized receipt, as written by `scan` and `validate`.
    Receipt,
    /// A single line item.
    LineItem,
}

/// Schema command line arguments.
#[derive(Debug, Args)]
pub struct SchemaOpts {
    /// The schema type to generate.
    #[clap(value_enum, value_name = "TYPE")]
    pub schema_type: SchemaType,

    /// The output path to write the schema to.
    #[clap(short = 'o', long = "out")]
    pub output_path: Option<PathBuf>,
}

/// The `schema` subcommand.
#[instrument(level = "debug", skip_all)]
pub async fn cmd_schema(schema_opts: &SchemaOpts) -> Result<()> {
    let schema = match schema_opts.schema_type {
        SchemaType::Receipt => schema_for!(Receipt),
        SchemaType::LineItem => schema_for!(LineItem),
    };
    super::write_json(schema_opts.output_path.as_deref(), &schema).await
}
