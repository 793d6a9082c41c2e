//! JsonLinesStore - appends one JSON document per record to a file

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use contracts::{ContractError, LogStore, RequestLog};
use serde::Serialize;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{error, instrument};

/// Append-only JSON lines file
///
/// The file is opened in append mode per write, so each record lands as one
/// `write` call and concurrent workers never interleave lines.
pub struct JsonLinesStore<R = RequestLog> {
    name: String,
    path: PathBuf,
    _record: PhantomData<fn(&R)>,
}

impl<R> JsonLinesStore<R> {
    /// Create a store writing to `path`, creating parent directories
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> std::io::Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        Ok(Self {
            name: name.into(),
            path,
            _record: PhantomData,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<R> JsonLinesStore<R>
where
    R: Serialize,
{
    async fn append(&self, record: &R) -> std::io::Result<()> {
        let mut line = serde_json::to_vec(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        line.push(b'\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

impl<R> LogStore for JsonLinesStore<R>
where
    R: Serialize + Send + Sync + 'static,
{
    type Record = R;

    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "json_lines_store_persist",
        skip(self, record),
        fields(store = %self.name)
    )]
    async fn persist(&self, record: &R) -> Result<(), ContractError> {
        self.append(record).await.map_err(|e| {
            error!(store = %self.name, path = %self.path.display(), error = %e, "append failed");
            ContractError::store_write(&self.name, e.to_string())
        })
    }
}
