//! Photo storage.
//!
//! [`PhotoStorage`] is the narrow upload/delete contract. [`S3PhotoStorage`]
//! is used in production; [`MemoryPhotoStorage`] keeps objects in process for
//! local runs and tests.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use bytes::Bytes;
use pageant_core::StoredPhoto;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};
use uuid::Uuid;

/// Per-file upload limit
pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
/// Gallery photos accepted in one request
pub const MAX_GALLERY_UPLOAD: usize = 5;

pub const PROFILE_FOLDER: &str = "profile-photos";
pub const GALLERY_FOLDER: &str = "competition-photos";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Not an image! Please upload only images.")]
    NotAnImage,

    #[error("File too large: {size} bytes exceeds the {limit} byte limit")]
    TooLarge { size: usize, limit: usize },

    #[error("Storage error: {0}")]
    Storage(String),
}

/// One uploaded file, already read into memory
#[derive(Debug, Clone)]
pub struct UploadFile {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Bytes,
}

impl UploadFile {
    /// Reject anything that is not `image/*` or exceeds [`MAX_PHOTO_BYTES`]
    pub fn validate(&self) -> Result<(), MediaError> {
        if !self.content_type.starts_with("image/") {
            return Err(MediaError::NotAnImage);
        }
        if self.bytes.len() > MAX_PHOTO_BYTES {
            return Err(MediaError::TooLarge {
                size: self.bytes.len(),
                limit: MAX_PHOTO_BYTES,
            });
        }
        Ok(())
    }

    /// Object key under `folder`, keeping the original extension when sane
    fn object_key(&self, folder: &str) -> String {
        let extension = self
            .file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));

        match extension {
            Some(ext) => format!("{folder}/{}.{ext}", Uuid::new_v4()),
            None => format!("{folder}/{}", Uuid::new_v4()),
        }
    }
}

#[async_trait]
pub trait PhotoStorage: Send + Sync {
    async fn upload(&self, folder: &str, file: UploadFile) -> Result<StoredPhoto, MediaError>;
    async fn delete(&self, id: &str) -> Result<(), MediaError>;
}

pub struct S3PhotoStorage {
    client: S3Client,
    bucket: String,
    public_url: String,
}

impl S3PhotoStorage {
    pub async fn from_env(bucket: String, public_url: String) -> Self {
        let aws_config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self {
            client: S3Client::new(&aws_config),
            bucket,
            public_url,
        }
    }
}

#[async_trait]
impl PhotoStorage for S3PhotoStorage {
    async fn upload(&self, folder: &str, file: UploadFile) -> Result<StoredPhoto, MediaError> {
        let key = file.object_key(folder);
        let size = file.bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&file.content_type)
            .body(ByteStream::from(file.bytes))
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        info!(bucket = %self.bucket, key = %key, size, "Photo stored in S3");

        Ok(StoredPhoto {
            url: format!("{}/{key}", self.public_url),
            id: key,
        })
    }

    async fn delete(&self, id: &str) -> Result<(), MediaError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(id)
            .send()
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        info!(bucket = %self.bucket, key = %id, "Photo deleted from S3");
        Ok(())
    }
}

/// In-process photo storage
#[derive(Default)]
pub struct MemoryPhotoStorage {
    objects: Mutex<HashMap<String, UploadFile>>,
}

impl MemoryPhotoStorage {
    pub const BASE_URL: &'static str = "memory://photos";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.objects
            .lock()
            .map(|objects| objects.contains_key(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().map(|objects| objects.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl PhotoStorage for MemoryPhotoStorage {
    async fn upload(&self, folder: &str, file: UploadFile) -> Result<StoredPhoto, MediaError> {
        let key = file.object_key(folder);
        self.objects
            .lock()
            .map_err(|_| MediaError::Storage("photo store lock poisoned".to_string()))?
            .insert(key.clone(), file);

        debug!(key = %key, "Photo stored in memory");

        Ok(StoredPhoto {
            url: format!("{}/{key}", Self::BASE_URL),
            id: key,
        })
    }

    async fn delete(&self, id: &str) -> Result<(), MediaError> {
        self.objects
            .lock()
            .map_err(|_| MediaError::Storage("photo store lock poisoned".to_string()))?
            .remove(id);
        Ok(())
    }
}
