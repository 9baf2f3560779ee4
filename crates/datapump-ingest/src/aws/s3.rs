//! S3-backed object store

use crate::remote::ObjectStore;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use datapump_common::{PumpError, Result};
use std::io::Read;
use tokio::runtime::Handle;
use tracing::debug;

/// Byte-range access to S3 objects over blocking calls.
pub struct S3ObjectStore {
    client: Client,
    handle: Handle,
}

impl S3ObjectStore {
    pub fn new(client: Client, handle: Handle) -> Self {
        Self { client, handle }
    }

    fn fetch(&self, bucket: &str, key: &str, range: Option<String>) -> Result<Vec<u8>> {
        self.handle.block_on(async {
            let mut request = self.client.get_object().bucket(bucket).key(key);
            if let Some(ref range) = range {
                request = request.range(range.clone());
            }
            let response = request.send().await.map_err(|e| {
                let service = e.into_service_error();
                if service.is_no_such_key() {
                    PumpError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    PumpError::RemoteRead(service.to_string())
                }
            })?;
            debug!(bucket, key, range = range.as_deref(), "fetched object range");
            let data = response
                .body
                .collect()
                .await
                .map_err(|e| PumpError::RemoteRead(e.to_string()))?;
            Ok(data.into_bytes().to_vec())
        })
    }
}

impl ObjectStore for S3ObjectStore {
    fn size(&self, bucket: &str, key: &str) -> Result<u64> {
        let head = self
            .handle
            .block_on(self.client.head_object().bucket(bucket).key(key).send())
            .map_err(|e| {
                let service = e.into_service_error();
                if service.is_not_found() {
                    PumpError::ObjectNotFound {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    }
                } else {
                    PumpError::RemoteRead(service.to_string())
                }
            })?;
        head.content_length()
            .map(|len| len as u64)
            .ok_or_else(|| {
                PumpError::RemoteRead(format!("no content length for s3://{bucket}/{key}"))
            })
    }

    fn get_range(&self, bucket: &str, key: &str, start: u64, end: u64) -> Result<Vec<u8>> {
        self.fetch(bucket, key, Some(format!("bytes={start}-{end}")))
    }

    fn get_from(&self, bucket: &str, key: &str, start: u64) -> Result<Vec<u8>> {
        self.fetch(bucket, key, Some(format!("bytes={start}-")))
    }

    fn get_reader(&self, bucket: &str, key: &str) -> Result<Box<dyn Read + Send>> {
        let body = self.handle.block_on(async {
            self.client
                .get_object()
                .bucket(bucket)
                .key(key)
                .send()
                .await
                .map_err(|e| {
                    let service = e.into_service_error();
                    if service.is_no_such_key() {
                        PumpError::ObjectNotFound {
                            bucket: bucket.to_string(),
                            key: key.to_string(),
                        }
                    } else {
                        PumpError::RemoteRead(service.to_string())
                    }
                })
                .map(|response| response.body)
        })?;
        Ok(Box::new(BodyReader {
            handle: self.handle.clone(),
            body,
            chunk: Vec::new(),
            offset: 0,
        }))
    }
}

/// Pulls body chunks on demand so gzip decoding of a large object never
/// holds the whole compressed body in memory.
struct BodyReader {
    handle: Handle,
    body: ByteStream,
    chunk: Vec<u8>,
    offset: usize,
}

impl Read for BodyReader {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        while self.offset >= self.chunk.len() {
            match self.handle.block_on(self.body.try_next()) {
                Ok(Some(bytes)) => {
                    self.chunk = bytes.to_vec();
                    self.offset = 0;
                },
                Ok(None) => return Ok(0),
                Err(err) => return Err(std::io::Error::other(err)),
            }
        }
        let n = buf.len().min(self.chunk.len() - self.offset);
        buf[..n].copy_from_slice(&self.chunk[self.offset..self.offset + n]);
        self.offset += n;
        Ok(n)
    }
}
