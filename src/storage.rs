//! File-backed object storage for symptom photos and message attachments.
//!
//! Objects live under `<root>/<bucket>/<owner>/...`. The first segment of an
//! object path names its owner: only that identity may write or delete it.
//! Reads are public. Each bucket is a `PathBoundary`; every object path is
//! resolved with `strict_join`, so symlinks and traversal cannot leave the
//! bucket.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strict_path::{PathBoundary, StrictPath, StrictPathError};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Bucket {
    SymptomPhotos,
    MessageAttachments,
}

impl Bucket {
    pub const ALL: [Bucket; 2] = [Bucket::SymptomPhotos, Bucket::MessageAttachments];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SymptomPhotos => "symptom-photos",
            Self::MessageAttachments => "message-attachments",
        }
    }
}

impl FromStr for Bucket {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| StorageError::UnknownBucket(s.to_string()))
    }
}

impl fmt::Display for Bucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a stored object, rendered as `bucket/path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub bucket: Bucket,
    pub path: String,
}

impl Locator {
    /// Identity named by the first path segment.
    pub fn owner(&self) -> Option<Uuid> {
        let (first, rest) = self.path.split_once('/')?;
        if rest.is_empty() {
            return None;
        }
        Uuid::parse_str(first).ok()
    }

    pub fn is_owned_by(&self, identity: &Uuid) -> bool {
        self.owner().as_ref() == Some(identity)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.path)
    }
}

impl FromStr for Locator {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (bucket, path) = s
            .split_once('/')
            .ok_or_else(|| StorageError::InvalidPath(s.to_string()))?;
        let bucket = bucket.parse()?;
        validate_segments(path)?;
        Ok(Self {
            bucket,
            path: path.to_string(),
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),
    #[error("Invalid object path: {0}")]
    InvalidPath(String),
    #[error("Object path must start with the uploader's id")]
    NotOwner,
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Bucket boundary error: {0}")]
    Boundary(#[from] StrictPathError),
    #[error("Storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Marker for paths confined to a storage bucket.
pub struct BucketDir;

/// Object store rooted at a directory.
#[derive(Debug, Clone)]
pub struct ObjectStore {
    root: PathBuf,
    symptom_photos: PathBoundary<BucketDir>,
    message_attachments: PathBoundary<BucketDir>,
}

impl ObjectStore {
    /// Open the store, creating the bucket directories if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        let symptom_photos = PathBoundary::try_new_create(root.join(Bucket::SymptomPhotos.as_str()))?;
        let message_attachments =
            PathBoundary::try_new_create(root.join(Bucket::MessageAttachments.as_str()))?;
        tracing::debug!(root = %root.display(), "Object store ready");
        Ok(Self {
            root,
            symptom_photos,
            message_attachments,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn boundary(&self, bucket: Bucket) -> &PathBoundary<BucketDir> {
        match bucket {
            Bucket::SymptomPhotos => &self.symptom_photos,
            Bucket::MessageAttachments => &self.message_attachments,
        }
    }

    /// Write (or overwrite) an object owned by `requester`.
    pub fn upload(
        &self,
        requester: &Uuid,
        bucket: Bucket,
        path: &str,
        bytes: &[u8],
    ) -> Result<Locator, StorageError> {
        let segments = owned_segments(requester, bucket, path)?;

        // Every existing ancestor must be a directory, the target must not be one.
        for depth in 1..segments.len() {
            let ancestor = self.join(bucket, &segments[..depth].join("/"))?;
            if ancestor.exists() && !ancestor.is_dir() {
                return Err(StorageError::InvalidPath(path.to_string()));
            }
        }
        let target = self.join(bucket, path)?;
        if target.is_dir() {
            return Err(StorageError::InvalidPath(path.to_string()));
        }

        target.create_parent_dir_all()?;
        target.write(bytes)?;
        let locator = Locator {
            bucket,
            path: path.to_string(),
        };
        tracing::info!(owner = %requester, locator = %locator, size = bytes.len(), "Object stored");
        Ok(locator)
    }

    /// Public read.
    pub fn read(&self, bucket: Bucket, path: &str) -> Result<Vec<u8>, StorageError> {
        validate_segments(path)?;
        let target = self.join(bucket, path)?;
        if !target.is_file() {
            return Err(StorageError::NotFound(format!("{bucket}/{path}")));
        }
        match target.read() {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete an object owned by `requester`.
    pub fn delete(&self, requester: &Uuid, bucket: Bucket, path: &str) -> Result<(), StorageError> {
        owned_segments(requester, bucket, path)?;
        let target = self.join(bucket, path)?;
        if !target.is_file() {
            return Err(StorageError::NotFound(format!("{bucket}/{path}")));
        }
        match target.remove_file() {
            Ok(()) => {
                tracing::info!(owner = %requester, bucket = %bucket, path, "Object deleted");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(format!("{bucket}/{path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Resolve `path` inside the bucket boundary.
    fn join(&self, bucket: Bucket, path: &str) -> Result<StrictPath<BucketDir>, StorageError> {
        self.boundary(bucket).strict_join(path).map_err(|e| match e {
            StrictPathError::InvalidRestriction { .. } => StorageError::Boundary(e),
            other => {
                tracing::warn!(bucket = %bucket, path, "Object path rejected: {other}");
                StorageError::InvalidPath(path.to_string())
            }
        })
    }
}

/// Validated segments of a path whose first segment is `requester`.
fn owned_segments<'p>(
    requester: &Uuid,
    bucket: Bucket,
    path: &'p str,
) -> Result<Vec<&'p str>, StorageError> {
    let segments = validate_segments(path)?;
    if segments.len() < 2 || segments[0] != requester.to_string() {
        tracing::warn!(requester = %requester, bucket = %bucket, path, "Object write outside own prefix");
        return Err(StorageError::NotOwner);
    }
    Ok(segments)
}

fn validate_segments(path: &str) -> Result<Vec<&str>, StorageError> {
    let segments: Vec<&str> = path.split('/').collect();
    let bad = segments.iter().any(|s| {
        s.is_empty() || *s == "." || *s == ".." || s.contains('\\') || s.contains('\0')
    });
    if bad {
        return Err(StorageError::InvalidPath(path.to_string()));
    }
    Ok(segments)
}
