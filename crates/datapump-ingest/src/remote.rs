//! Random-access reads over a remote object
//!
//! [`RemoteFile`] presents `std::io::Read + Seek` over an object held in a
//! remote store, fetching only the byte ranges requested. This is what
//! lets a zip archive reader walk an archive's central directory without
//! the whole object ever being downloaded.

use datapump_common::{PumpError, Result};
use std::io::{Cursor, Read, Seek, SeekFrom};

/// Byte-range access to a remote object store.
///
/// `get_range` bounds are inclusive. Implementations perform one network
/// fetch per call; `RemoteFile` adds no caching or read-ahead on top.
pub trait ObjectStore: Send + Sync {
    /// Total byte length of the object. Fails with
    /// [`PumpError::ObjectNotFound`] if the reference is invalid.
    fn size(&self, bucket: &str, key: &str) -> Result<u64>;

    /// Fetch `[start, end]` inclusive.
    fn get_range(&self, bucket: &str, key: &str, start: u64, end: u64) -> Result<Vec<u8>>;

    /// Fetch from `start` through end-of-object in one call.
    fn get_from(&self, bucket: &str, key: &str, start: u64) -> Result<Vec<u8>>;

    /// Sequential reader over the whole object. The default buffers the
    /// body; network-backed stores override this to stream it.
    fn get_reader(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.get_from(bucket, key, 0)?)))
    }
}

/// A `bucket` + `key` pair addressing one remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteLocation {
    pub bucket: String,
    pub key: String,
}

impl RemoteLocation {
    /// Parse `scheme://bucket/key...` — the bucket ends at the first `/`
    /// after the scheme separator.
    pub fn parse(path: &str) -> Result<Self> {
        let (_, rest) = path
            .split_once("://")
            .ok_or_else(|| PumpError::Parse(format!("'{path}' is not a remote path")))?;
        let (bucket, key) = rest
            .split_once('/')
            .ok_or_else(|| PumpError::Parse(format!("'{path}' has no object key")))?;
        if bucket.is_empty() || key.is_empty() {
            return Err(PumpError::Parse(format!(
                "'{path}' is missing a bucket or object key"
            )));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.to_string(),
        })
    }
}

/// Everything before the first `://`, or `None` for local paths.
pub fn path_scheme(path: &str) -> Option<&str> {
    path.split_once("://").map(|(scheme, _)| scheme)
}

/// Seekable, range-fetching view of one remote object.
///
/// A read of `n` bytes fetches exactly the range `[cursor, cursor+n-1]`,
/// except when `cursor + n` reaches the object size: the call then degrades
/// to a read-to-end and returns every remaining byte. Archive readers rely
/// on that rule to detect end-of-stream. Seeks past the end are allowed and
/// surface as reads returning zero bytes.
pub struct RemoteFile<'a> {
    store: &'a dyn ObjectStore,
    location: RemoteLocation,
    position: u64,
    // Size is queried once for cursor math; object bytes are never cached.
    size: Option<u64>,
}

impl<'a> RemoteFile<'a> {
    pub fn new(store: &'a dyn ObjectStore, location: RemoteLocation) -> Self {
        Self {
            store,
            location,
            position: 0,
            size: None,
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn size(&mut self) -> Result<u64> {
        if let Some(size) = self.size {
            return Ok(size);
        }
        let size = self.store.size(&self.location.bucket, &self.location.key)?;
        self.size = Some(size);
        Ok(size)
    }

    /// Read from the cursor to end-of-object in one remote fetch and leave
    /// the cursor at the end.
    pub fn read_remaining(&mut self) -> Result<Vec<u8>> {
        let size = self.size()?;
        if self.position >= size {
            self.position = size;
            return Ok(Vec::new());
        }
        let data = self
            .store
            .get_from(&self.location.bucket, &self.location.key, self.position)?;
        self.position = size;
        Ok(data)
    }
}

impl Read for RemoteFile<'_> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let size = self.size().map_err(std::io::Error::other)?;
        if self.position >= size {
            return Ok(0);
        }

        let n = buf.len() as u64;
        let data = if self.position + n >= size {
            // Degrade to read-to-end: the remainder fits in `buf` because
            // size - position <= n here.
            self.read_remaining().map_err(std::io::Error::other)?
        } else {
            let end = self.position + n - 1;
            let data = self
                .store
                .get_range(&self.location.bucket, &self.location.key, self.position, end)
                .map_err(std::io::Error::other)?;
            self.position += n;
            data
        };

        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl Seek for RemoteFile<'_> {
    fn seek(&mut self, pos: SeekFrom) -> std::io::Result<u64> {
        let target = match pos {
            SeekFrom::Start(offset) => offset as i128,
            SeekFrom::Current(offset) => self.position as i128 + offset as i128,
            SeekFrom::End(offset) => {
                let size = self.size().map_err(std::io::Error::other)?;
                size as i128 + offset as i128
            },
        };
        // Past-end positions are valid (reads just return 0 bytes);
        // negative ones are not.
        if target < 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "seek before start of object",
            ));
        }
        self.position = target as u64;
        Ok(self.position)
    }
}
