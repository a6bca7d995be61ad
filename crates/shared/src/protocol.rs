use serde::{Deserialize, Serialize};

use crate::domain::{Author, AuthorId, Book};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorList {
    #[serde(default)]
    pub authors: Vec<Author>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookList {
    #[serde(default)]
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAuthorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub author_id: AuthorId,
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateBookResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub book: Book,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverUploadUrlQuery {
    pub content_type: String,
}

/// Grant issued by `GET /{resource}/{id}/cover-upload-url`.
///
/// Deployed APIs name the key `coverImageS3Key`; either spelling (or both)
/// may be present.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverUploadUrlResponse {
    pub upload_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_key: Option<String>,
    #[serde(
        default,
        rename = "coverImageS3Key",
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_image_s3_key: Option<String>,
}

impl CoverUploadUrlResponse {
    /// `storageKey` wins over `coverImageS3Key`; empty when neither is set.
    pub fn resolved_storage_key(&self) -> String {
        self.storage_key
            .clone()
            .or_else(|| self.cover_image_s3_key.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkCoverRequest {
    #[serde(rename = "coverImageS3Key")]
    pub cover_image_s3_key: String,
}
