//! Attaching a cover image to an existing record.
//!
//! An upload is three strictly sequential steps against two services:
//! ask the record API for a grant, `PUT` the bytes to the pre-signed URL it
//! returned, then write the grant's storage key back onto the record. Every
//! failure short-circuits the remaining steps and is reported through
//! [`UploadOutcome`]; nothing is retried or rolled back here.

use std::{fmt, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, Client};
use shared::domain::ResourceRef;
use thiserror::Error;
use tracing::{error, info, warn};
use url::Url;

use crate::error::ensure_success;

pub const GRANT_REQUEST_FAILED: &str = "grant request failed";
pub const OBJECT_TRANSFER_FAILED: &str = "object transfer failed";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UploadRequestError {
    #[error("resource id must not be empty")]
    MissingResourceId,
    #[error("cover file is empty")]
    EmptyFile,
    #[error("content type must not be empty")]
    MissingContentType,
}

/// A cover upload for a record that already exists.
///
/// The record is not looked up before the upload starts; a missing record
/// surfaces as a failed grant request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    resource: ResourceRef,
    file_bytes: Vec<u8>,
    content_type: String,
}

impl UploadRequest {
    pub fn new(
        resource: ResourceRef,
        file_bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Result<Self, UploadRequestError> {
        let content_type = content_type.into();
        if resource.id.trim().is_empty() {
            return Err(UploadRequestError::MissingResourceId);
        }
        if file_bytes.is_empty() {
            return Err(UploadRequestError::EmptyFile);
        }
        if content_type.trim().is_empty() {
            return Err(UploadRequestError::MissingContentType);
        }
        Ok(Self {
            resource,
            file_bytes,
            content_type,
        })
    }

    pub fn resource(&self) -> &ResourceRef {
        &self.resource
    }

    pub fn file_bytes(&self) -> &[u8] {
        &self.file_bytes
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Single-use write capability for one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadGrant {
    pub upload_url: String,
    pub storage_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    /// The record now points at this key. Empty when the grant carried no
    /// key and the link step was skipped.
    Linked(String),
    /// Nothing durable references the upload; retrying is safe.
    UploadFailed(String),
    /// The object is stored but the record does not reference it.
    LinkFailed(String),
}

impl UploadOutcome {
    pub fn is_linked(&self) -> bool {
        matches!(self, UploadOutcome::Linked(_))
    }

    pub fn storage_key(&self) -> Option<&str> {
        match self {
            UploadOutcome::Linked(key) => Some(key.as_str()),
            _ => None,
        }
    }

    /// True when storage holds an object no record references.
    pub fn leaves_orphan(&self) -> bool {
        matches!(self, UploadOutcome::LinkFailed(_))
    }
}

impl fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadOutcome::Linked(key) if key.is_empty() => {
                f.write_str("cover uploaded (no storage key to link)")
            }
            UploadOutcome::Linked(key) => write!(f, "cover linked as {key}"),
            UploadOutcome::UploadFailed(reason) => write!(f, "cover upload failed: {reason}"),
            UploadOutcome::LinkFailed(reason) => {
                write!(f, "record saved, but failed to link cover image: {reason}")
            }
        }
    }
}

#[async_trait]
pub trait RecordApi: Send + Sync {
    async fn request_upload_grant(
        &self,
        resource: &ResourceRef,
        content_type: &str,
    ) -> Result<UploadGrant>;
    async fn link_cover(&self, resource: &ResourceRef, storage_key: &str) -> Result<()>;
}

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, upload_url: &str, content_type: &str, body: &[u8]) -> Result<()>;
}

/// Writes straight to pre-signed URLs. No credentials are attached; the URL
/// carries the authorization.
#[derive(Debug, Clone, Default)]
pub struct HttpObjectStore {
    http: Client,
}

impl HttpObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build object store HTTP client")?;
        Ok(Self { http })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn put_object(&self, upload_url: &str, content_type: &str, body: &[u8]) -> Result<()> {
        let url = Url::parse(upload_url)
            .with_context(|| format!("invalid upload url '{upload_url}'"))?;
        let response = self
            .http
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .body(body.to_vec())
            .send()
            .await
            .context("object store request failed")?;
        ensure_success(response)
            .await
            .context("object store rejected upload")?;
        Ok(())
    }
}

/// Runs one grant, transfer, link cycle.
///
/// Each call requests its own grant, so a failed attempt leaves nothing the
/// next call depends on.
pub async fn upload_cover(
    api: &dyn RecordApi,
    store: &dyn ObjectStore,
    request: &UploadRequest,
) -> UploadOutcome {
    let resource = request.resource();

    let grant = match api
        .request_upload_grant(resource, request.content_type())
        .await
    {
        Ok(grant) => grant,
        Err(err) => {
            warn!("cover upload: grant request failed resource={resource}: {err:#}");
            return UploadOutcome::UploadFailed(GRANT_REQUEST_FAILED.to_string());
        }
    };
    info!(
        "cover upload: grant issued resource={resource} storage_key={}",
        grant.storage_key
    );

    if let Err(err) = store
        .put_object(&grant.upload_url, request.content_type(), request.file_bytes())
        .await
    {
        warn!("cover upload: object transfer failed resource={resource}: {err:#}");
        return UploadOutcome::UploadFailed(OBJECT_TRANSFER_FAILED.to_string());
    }
    info!(
        "cover upload: stored {} bytes resource={resource}",
        request.file_bytes().len()
    );

    if grant.storage_key.is_empty() {
        warn!("cover upload: grant carried no storage key, link skipped resource={resource}");
        return UploadOutcome::Linked(String::new());
    }

    match api.link_cover(resource, &grant.storage_key).await {
        Ok(()) => {
            info!(
                "cover upload: linked resource={resource} storage_key={}",
                grant.storage_key
            );
            UploadOutcome::Linked(grant.storage_key)
        }
        Err(err) => {
            error!(
                "cover upload: link failed, object orphaned resource={resource} storage_key={}: {err:#}",
                grant.storage_key
            );
            UploadOutcome::LinkFailed(format!("{err:#}"))
        }
    }
}

/// Holds the two collaborators so callers can share one coordinator across
/// concurrent uploads.
#[derive(Clone)]
pub struct CoverUploadCoordinator {
    api: Arc<dyn RecordApi>,
    store: Arc<dyn ObjectStore>,
}

impl CoverUploadCoordinator {
    pub fn new(api: Arc<dyn RecordApi>, store: Arc<dyn ObjectStore>) -> Self {
        Self { api, store }
    }

    pub async fn upload(&self, request: &UploadRequest) -> UploadOutcome {
        upload_cover(self.api.as_ref(), self.store.as_ref(), request).await
    }
}

#[cfg(test)]
#[path = "tests/cover_upload_tests.rs"]
mod tests;
