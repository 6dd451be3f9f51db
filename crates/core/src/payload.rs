//! Re-readable payload sources
//!
//! A single-request upload re-reads its payload from the start on every
//! attempt, so sources must support [`PayloadSource::rewind`].

use std::io::{self, SeekFrom};
use std::path::Path;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Data to upload
#[async_trait]
pub trait PayloadSource: Send {
    /// Restart reading from the first byte
    async fn rewind(&mut self) -> io::Result<()>;

    /// Read up to `max` bytes; `None` at end of input.
    ///
    /// Returns fewer than `max` bytes only at end of input.
    async fn read_chunk(&mut self, max: usize) -> io::Result<Option<Bytes>>;

    /// Total size in bytes, when known up front
    fn size_hint(&self) -> Option<u64>;
}

/// In-memory payload
#[derive(Debug, Clone)]
pub struct BytesSource {
    data: Bytes,
    pos: usize,
}

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            pos: 0,
        }
    }
}

#[async_trait]
impl PayloadSource for BytesSource {
    async fn rewind(&mut self) -> io::Result<()> {
        self.pos = 0;
        Ok(())
    }

    async fn read_chunk(&mut self, max: usize) -> io::Result<Option<Bytes>> {
        if self.pos >= self.data.len() || max == 0 {
            return Ok(None);
        }
        let end = (self.pos + max).min(self.data.len());
        let chunk = self.data.slice(self.pos..end);
        self.pos = end;
        Ok(Some(chunk))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.data.len() as u64)
    }
}

/// Payload read from a local file
#[derive(Debug)]
pub struct FileSource {
    file: File,
    size: u64,
}

impl FileSource {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        let size = file.metadata().await?.len();
        Ok(Self { file, size })
    }
}

#[async_trait]
impl PayloadSource for FileSource {
    async fn rewind(&mut self) -> io::Result<()> {
        self.file.seek(SeekFrom::Start(0)).await.map(|_| ())
    }

    async fn read_chunk(&mut self, max: usize) -> io::Result<Option<Bytes>> {
        let mut buf = BytesMut::zeroed(max);
        let mut filled = 0;
        while filled < max {
            let n = self.file.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf.freeze()))
    }

    fn size_hint(&self) -> Option<u64> {
        Some(self.size)
    }
}

/// Read everything left in `source`
pub async fn read_to_end(source: &mut dyn PayloadSource) -> io::Result<Bytes> {
    const READ_SIZE: usize = 1024 * 1024;

    let mut out = BytesMut::new();
    if let Some(size) = source.size_hint() {
        out.reserve(usize::try_from(size).unwrap_or(0));
    }
    while let Some(chunk) = source.read_chunk(READ_SIZE).await? {
        out.extend_from_slice(&chunk);
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[tokio::test]
    async fn test_bytes_source_chunks_and_rewind() {
        let mut source = BytesSource::new("abcdefg");
        assert_eq!(source.size_hint(), Some(7));
        assert_eq!(source.read_chunk(3).await.unwrap().unwrap(), "abc");
        assert_eq!(source.read_chunk(3).await.unwrap().unwrap(), "def");
        assert_eq!(source.read_chunk(3).await.unwrap().unwrap(), "g");
        assert!(source.read_chunk(3).await.unwrap().is_none());

        source.rewind().await.unwrap();
        assert_eq!(read_to_end(&mut source).await.unwrap(), "abcdefg");
    }

    #[tokio::test]
    async fn test_file_source() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        tmp.flush().unwrap();

        let mut source = FileSource::open(tmp.path()).await.unwrap();
        assert_eq!(source.size_hint(), Some(10));
        assert_eq!(source.read_chunk(4).await.unwrap().unwrap(), "0123");
        assert_eq!(read_to_end(&mut source).await.unwrap(), "456789");
        assert!(source.read_chunk(4).await.unwrap().is_none());

        source.rewind().await.unwrap();
        assert_eq!(read_to_end(&mut source).await.unwrap(), "0123456789");
    }

    #[tokio::test]
    async fn test_empty_source() {
        let mut source = BytesSource::new(Bytes::new());
        assert!(source.read_chunk(16).await.unwrap().is_none());
        assert!(read_to_end(&mut source).await.unwrap().is_empty());
    }
}
