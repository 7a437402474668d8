use std::io::{ErrorKind, SeekFrom};
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio::sync::Mutex;

use super::range_reader::{check_range, RangeReader};
use crate::error::IoError;

/// Range reader over a local slide file.
///
/// The file handle is shared behind a mutex; each read seeks and reads
/// under the lock. Wrap it in a [`BlockCache`](super::BlockCache) so the
/// many small reads of TIFF parsing collapse into a few block reads.
pub struct FileRangeReader {
    file: Mutex<File>,
    size: u64,
    path: String,
}

impl FileRangeReader {
    /// Open `path` and record its size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, IoError> {
        let path = path.as_ref();
        let display = path.display().to_string();

        let file = File::open(path)
            .await
            .map_err(|e| file_error(&display, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| file_error(&display, e))?
            .len();

        Ok(Self {
            file: Mutex::new(file),
            size,
            path: display,
        })
    }
}

fn file_error(path: &str, err: std::io::Error) -> IoError {
    match err.kind() {
        ErrorKind::NotFound => IoError::NotFound(path.to_string()),
        _ => IoError::File {
            path: path.to_string(),
            message: err.to_string(),
        },
    }
}

#[async_trait]
impl RangeReader for FileRangeReader {
    async fn read_exact_at(&self, offset: u64, len: usize) -> Result<Bytes, IoError> {
        check_range(offset, len, self.size)?;
        if len == 0 {
            return Ok(Bytes::new());
        }

        let mut buf = vec![0u8; len];
        let mut file = self.file.lock().await;
        file.seek(SeekFrom::Start(offset))
            .await
            .map_err(|e| file_error(&self.path, e))?;
        file.read_exact(&mut buf)
            .await
            .map_err(|e| file_error(&self.path, e))?;

        Ok(Bytes::from(buf))
    }

    fn size(&self) -> u64 {
        self.size
    }

    fn identifier(&self) -> &str {
        &self.path
    }
}
