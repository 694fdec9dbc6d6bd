//! Command-line entry points.

use tokio::io::{AsyncRead, AsyncReadExt as _, AsyncWrite, AsyncWriteExt as _};

use receipt_digitizer::prelude::*;

pub mod prompt;
pub mod scan;
pub mod schema;
pub mod validate;

/// Open `path` for writing, or stdout if `path` is `None`.
pub async fn create_writer(
    path: Option<&Path>,
) -> Result<Box<dyn AsyncWrite + Unpin + Send>> {
    match path {
        Some(path) => {
            let file = tokio::fs::File::create(path)
                .await
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(file))
        }
        None => Ok(Box::new(tokio::io::stdout())),
    }
}

/// Read all of `path`, or stdin if `path` is `None`.
pub async fn read_to_string(path: Option<&Path>) -> Result<String> {
    let (description, mut rdr): (String, Box<dyn AsyncRead + Unpin + Send>) = match path
    {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open {}", path.display()))?;
            (path.display().to_string(), Box::new(file))
        }
        None => ("stdin".to_owned(), Box::new(tokio::io::stdin())),
    };
    let mut text = String::new();
    rdr.read_to_string(&mut text)
        .await
        .with_context(|| format!("failed to read {description}"))?;
    Ok(text)
}

/// Write a value as pretty-printed JSON, followed by a newline.
pub async fn write_json<T: Serialize>(path: Option<&Path>, value: &T) -> Result<()> {
    let mut wtr = create_writer(path).await?;
    let mut json = serde_json::to_string_pretty(value).context("failed to serialize")?;
    json.push('\n');
    wtr.write_all(json.as_bytes())
        .await
        .context("failed to write output")?;
    wtr.flush().await.context("failed to flush output")?;
    Ok(())
}
