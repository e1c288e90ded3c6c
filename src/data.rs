//! Binary payload storage behind `/video/{id}/data`.
//!
//! The HTTP layer only talks to [`VideoDataManager`]; which backend sits
//! behind it is picked once at startup.

use std::{
    collections::HashMap,
    io::{self, Cursor},
    path::{Path, PathBuf},
    pin::Pin,
};

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use futures_util::StreamExt;
use parking_lot::RwLock;
use tempfile::NamedTempFile;
use tokio::{
    fs::{self, File},
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    task,
};
use tokio_util::io::StreamReader;
use tracing::debug;

/// Extension used for payload files on disk.
pub const DATA_FILE_EXT: &str = "mpg";

pub type DataReader = Pin<Box<dyn AsyncRead + Send>>;

#[async_trait]
pub trait VideoDataManager: Send + Sync + 'static {
    /// Consumes `reader` and stores it as the payload of `video_id`,
    /// replacing any earlier upload. Returns the number of bytes stored.
    async fn save_data(&self, video_id: u64, reader: DataReader) -> io::Result<u64>;

    async fn has_data(&self, video_id: u64) -> bool;

    /// Opens the stored payload for streaming.
    async fn open_data(&self, video_id: u64) -> io::Result<DataReader>;

    /// Writes the stored payload into `sink`.
    async fn copy_data(
        &self,
        video_id: u64,
        sink: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> io::Result<u64> {
        let mut reader = self.open_data(video_id).await?;
        let copied = tokio::io::copy(&mut reader, &mut *sink).await?;
        sink.flush().await?;
        Ok(copied)
    }
}

fn missing(video_id: u64) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("Missing data for video [{video_id}]"),
    )
}

/// Stores each payload as `<root>/video<ID>.mpg`.
#[derive(Debug, Clone)]
pub struct FileDataManager {
    root: PathBuf,
}

impl FileDataManager {
    /// Creates the root directory if it does not exist yet.
    pub async fn new(root: impl AsRef<Path>) -> io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn data_path(&self, video_id: u64) -> PathBuf {
        self.root.join(format!("video{video_id}.{DATA_FILE_EXT}"))
    }
}

#[async_trait]
impl VideoDataManager for FileDataManager {
    async fn save_data(&self, video_id: u64, mut reader: DataReader) -> io::Result<u64> {
        let target = self.data_path(video_id);
        // Each upload gets its own temp file in the data root and is renamed
        // over the target once complete. Dropping `temp` on any error path
        // deletes it.
        let root = self.root.clone();
        let temp = task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&format!("video{video_id}."))
                .suffix(".part")
                .tempfile_in(root)
        })
        .await
        .map_err(io::Error::other)??;

        let mut file = File::from_std(temp.as_file().try_clone()?);
        let written = tokio::io::copy(&mut reader, &mut file).await?;
        file.sync_all().await?;
        drop(file);

        let path = target.clone();
        task::spawn_blocking(move || persist(temp, &path))
            .await
            .map_err(io::Error::other)??;
        debug!(video_id, bytes = written, path = %target.display(), "stored video data");
        Ok(written)
    }

    async fn has_data(&self, video_id: u64) -> bool {
        fs::try_exists(self.data_path(video_id))
            .await
            .unwrap_or(false)
    }

    async fn open_data(&self, video_id: u64) -> io::Result<DataReader> {
        let file = File::open(self.data_path(video_id))
            .await
            .map_err(|err| match err.kind() {
                io::ErrorKind::NotFound => missing(video_id),
                _ => err,
            })?;
        let reader: DataReader = Box::pin(file);
        Ok(reader)
    }
}

fn persist(temp: NamedTempFile, target: &Path) -> io::Result<()> {
    temp.persist(target).map(drop).map_err(|err| err.error)
}

/// Keeps payloads in memory. Everything is lost with the process.
#[derive(Debug, Default)]
pub struct MemoryDataManager {
    payloads: RwLock<HashMap<u64, Bytes>>,
}

impl MemoryDataManager {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoDataManager for MemoryDataManager {
    async fn save_data(&self, video_id: u64, mut reader: DataReader) -> io::Result<u64> {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        let len = buf.len() as u64;
        self.payloads.write().insert(video_id, Bytes::from(buf));
        Ok(len)
    }

    async fn has_data(&self, video_id: u64) -> bool {
        self.payloads.read().contains_key(&video_id)
    }

    async fn open_data(&self, video_id: u64) -> io::Result<DataReader> {
        let payload = self
            .payloads
            .read()
            .get(&video_id)
            .cloned()
            .ok_or_else(|| missing(video_id))?;
        Ok(reader_from_bytes(payload))
    }
}

/// Wraps an in-memory body so it can be handed to [`VideoDataManager::save_data`].
pub fn reader_from_bytes(bytes: Bytes) -> DataReader {
    Box::pin(Cursor::new(bytes))
}

/// Streams a request body into a [`DataReader`] without buffering it.
///
/// Reading fails with [`io::ErrorKind::FileTooLarge`] as soon as more than
/// `limit` bytes have arrived.
pub fn reader_from_body(body: Body, limit: usize) -> DataReader {
    let limit = limit as u64;
    let mut received: u64 = 0;
    let chunks = body.into_data_stream().map(move |chunk| {
        let chunk = chunk.map_err(io::Error::other)?;
        received = received.saturating_add(chunk.len() as u64);
        if received > limit {
            return Err(io::Error::new(
                io::ErrorKind::FileTooLarge,
                format!("upload exceeds {limit} bytes"),
            ));
        }
        Ok(chunk)
    });
    let reader: DataReader = Box::pin(StreamReader::new(chunks));
    reader
}
