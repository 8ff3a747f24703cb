use super::{BackendError, BackendResult, BlobObject, BlobStore, StoredBlob};
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use percent_encoding::{NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

const FILENAME_METADATA: &str = "filename";

/// Blobs stored as objects in an S3-compatible bucket, keyed by blob id.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

fn storage_error(op: &str, e: impl std::fmt::Display) -> BackendError {
    BackendError::Storage(format!("{} failed: {}", op, e))
}

impl S3BlobStore {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Creates the bucket when it does not exist yet.
    pub async fn ensure_bucket(&self) -> anyhow::Result<()> {
        if self
            .client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .is_ok()
        {
            return Ok(());
        }

        tracing::info!("🪣 Creating bucket {}", self.bucket);
        self.client
            .create_bucket()
            .bucket(&self.bucket)
            .send()
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn create_file(&self, id: &str, name: &str, data: Bytes) -> BackendResult<StoredBlob> {
        let size = data.len() as i64;
        // Object metadata must be ASCII
        let encoded_name = utf8_percent_encode(name, NON_ALPHANUMERIC).to_string();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(id)
            .metadata(FILENAME_METADATA, encoded_name)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| storage_error("put_object", e.into_service_error()))?;

        Ok(StoredBlob {
            id: id.to_string(),
            name: name.to_string(),
            size,
        })
    }

    async fn delete_file(&self, id: &str) -> BackendResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| storage_error("delete_object", e.into_service_error()))?;
        Ok(())
    }

    async fn get_file(&self, id: &str) -> BackendResult<BlobObject> {
        let object = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    BackendError::NotFound(format!("blob {}", id))
                } else {
                    storage_error("get_object", service_error)
                }
            })?;

        let name = object
            .metadata()
            .and_then(|m| m.get(FILENAME_METADATA))
            .map(|n| percent_decode_str(n).decode_utf8_lossy().into_owned())
            .unwrap_or_else(|| id.to_string());

        let data = object
            .body
            .collect()
            .await
            .map_err(|e| storage_error("read object body", e))?
            .into_bytes();

        Ok(BlobObject {
            id: id.to_string(),
            name,
            data,
        })
    }
}
