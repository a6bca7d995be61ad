use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use shared::{
    domain::{Author, AuthorDraft, AuthorId, Book, BookDraft, BookId, ResourceRef},
    protocol::{
        AuthorList, BookList, CoverUploadUrlQuery, CoverUploadUrlResponse, CreateAuthorResponse,
        CreateBookResponse, LinkCoverRequest,
    },
};
use tracing::{info, warn};

pub mod cover_upload;
pub mod error;

pub use cover_upload::{
    upload_cover, CoverUploadCoordinator, HttpObjectStore, ObjectStore, RecordApi, UploadGrant,
    UploadOutcome, UploadRequest, UploadRequestError,
};
pub use error::ApiStatusError;

use error::ensure_success;

/// Cover image picked alongside a book form.
#[derive(Debug, Clone)]
pub struct CoverFile {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// A book together with its author, when the author could be found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookDetails {
    pub book: Book,
    pub author: Option<Author>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorDetails {
    pub author: Author,
    pub books: Vec<Book>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedBook {
    pub id: BookId,
    pub created: bool,
    /// `None` when no cover was supplied.
    pub cover: Option<UploadOutcome>,
}

/// Client for the authors/books record API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    http: Client,
    api_base_url: String,
}

impl CatalogClient {
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self::with_http(Client::new(), api_base_url)
    }

    pub fn with_timeout(api_base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build record API HTTP client")?;
        Ok(Self::with_http(http, api_base_url))
    }

    fn with_http(http: Client, api_base_url: impl Into<String>) -> Self {
        let api_base_url: String = api_base_url.into();
        Self {
            http,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resource_url(&self, resource: &ResourceRef) -> String {
        format!("{}/{}/{}", self.api_base_url, resource.kind, resource.id)
    }

    pub async fn list_authors(&self) -> Result<Vec<Author>> {
        let list: AuthorList = self
            .get_json(format!("{}/authors", self.api_base_url))
            .await
            .context("failed to fetch authors")?;
        Ok(list.authors)
    }

    pub async fn get_author(&self, id: &AuthorId) -> Result<Author> {
        self.get_json(self.resource_url(&ResourceRef::author(id)))
            .await
            .with_context(|| format!("failed to fetch author {id}"))
    }

    pub async fn create_author(&self, draft: &AuthorDraft) -> Result<AuthorId> {
        draft.validate()?;
        let response = self
            .http
            .post(format!("{}/authors", self.api_base_url))
            .json(draft)
            .send()
            .await
            .context("failed to create author")?;
        let created: CreateAuthorResponse = ensure_success(response)
            .await
            .context("failed to create author")?
            .json()
            .await
            .context("invalid create author response")?;
        info!("catalog: created author id={}", created.author_id);
        Ok(created.author_id)
    }

    pub async fn update_author(&self, id: &AuthorId, draft: &AuthorDraft) -> Result<()> {
        draft.validate()?;
        let response = self
            .http
            .put(self.resource_url(&ResourceRef::author(id)))
            .json(draft)
            .send()
            .await
            .with_context(|| format!("failed to update author {id}"))?;
        ensure_success(response)
            .await
            .with_context(|| format!("failed to update author {id}"))?;
        Ok(())
    }

    pub async fn delete_author(&self, id: &AuthorId) -> Result<()> {
        self.delete(&ResourceRef::author(id)).await
    }

    /// The author plus every book whose `author` field points at them.
    pub async fn author_details(&self, id: &AuthorId) -> Result<AuthorDetails> {
        let author = self.get_author(id).await?;
        let books = self
            .list_books()
            .await?
            .into_iter()
            .filter(|book| &book.author == id)
            .collect();
        Ok(AuthorDetails { author, books })
    }

    pub async fn list_books(&self) -> Result<Vec<Book>> {
        let list: BookList = self
            .get_json(format!("{}/books", self.api_base_url))
            .await
            .context("failed to fetch books")?;
        Ok(list.books)
    }

    pub async fn get_book(&self, id: &BookId) -> Result<Book> {
        self.get_json(self.resource_url(&ResourceRef::book(id)))
            .await
            .with_context(|| format!("failed to fetch book {id}"))
    }

    /// Fetches the book, then its author. An author lookup the API answers
    /// with a non-2xx status leaves `author` empty; transport errors still fail.
    pub async fn book_details(&self, id: &BookId) -> Result<BookDetails> {
        let book = self.get_book(id).await?;
        if book.author.as_str().is_empty() {
            return Ok(BookDetails { book, author: None });
        }
        let author = match self.get_author(&book.author).await {
            Ok(author) => Some(author),
            Err(err) if err.root_cause().is::<ApiStatusError>() => {
                warn!("catalog: author {} of book {id} unavailable: {err:#}", book.author);
                None
            }
            Err(err) => return Err(err),
        };
        Ok(BookDetails { book, author })
    }

    pub async fn create_book(&self, draft: &BookDraft) -> Result<Book> {
        draft.validate()?;
        let response = self
            .http
            .post(format!("{}/books", self.api_base_url))
            .json(draft)
            .send()
            .await
            .context("failed to create book")?;
        let created: CreateBookResponse = ensure_success(response)
            .await
            .context("failed to create book")?
            .json()
            .await
            .context("invalid create book response")?;
        info!("catalog: created book id={}", created.book.id);
        Ok(created.book)
    }

    pub async fn update_book(&self, id: &BookId, draft: &BookDraft) -> Result<()> {
        draft.validate()?;
        let response = self
            .http
            .put(self.resource_url(&ResourceRef::book(id)))
            .json(draft)
            .send()
            .await
            .with_context(|| format!("failed to update book {id}"))?;
        ensure_success(response)
            .await
            .with_context(|| format!("failed to update book {id}"))?;
        Ok(())
    }

    pub async fn delete_book(&self, id: &BookId) -> Result<()> {
        self.delete(&ResourceRef::book(id)).await
    }

    /// Saves the book (creating it when `existing` is `None`) and then, if a
    /// cover was picked, attaches it to the saved record.
    ///
    /// A failed save is an error. A failed cover is not: the book exists
    /// either way and the outcome is returned for display.
    pub async fn save_book_with_cover(
        &self,
        store: &dyn ObjectStore,
        existing: Option<&BookId>,
        draft: &BookDraft,
        cover: Option<CoverFile>,
    ) -> Result<SavedBook> {
        let (id, created) = match existing {
            Some(id) => {
                self.update_book(id, draft).await?;
                (id.clone(), false)
            }
            None => (self.create_book(draft).await?.id, true),
        };

        let cover = match cover {
            Some(file) => {
                let request =
                    UploadRequest::new(ResourceRef::book(&id), file.bytes, file.content_type)?;
                Some(upload_cover(self, store, &request).await)
            }
            None => None,
        };

        Ok(SavedBook { id, created, cover })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: String) -> Result<T> {
        let body = self
            .send_checked(self.http.get(url))
            .await?
            .json()
            .await
            .context("invalid record API response")?;
        Ok(body)
    }

    async fn delete(&self, resource: &ResourceRef) -> Result<()> {
        let response = self
            .http
            .delete(self.resource_url(resource))
            .send()
            .await
            .with_context(|| format!("failed to delete {resource}"))?;
        ensure_success(response)
            .await
            .with_context(|| format!("failed to delete {resource}"))?;
        info!("catalog: deleted {resource}");
        Ok(())
    }

    async fn send_checked(&self, request: reqwest::RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        Ok(ensure_success(response).await?)
    }
}

#[async_trait]
impl RecordApi for CatalogClient {
    async fn request_upload_grant(
        &self,
        resource: &ResourceRef,
        content_type: &str,
    ) -> Result<UploadGrant> {
        let request = self
            .http
            .get(format!("{}/cover-upload-url", self.resource_url(resource)))
            .query(&CoverUploadUrlQuery {
                content_type: content_type.to_string(),
            });
        let grant: CoverUploadUrlResponse = self
            .send_checked(request)
            .await
            .with_context(|| format!("cover upload url request failed for {resource}"))?
            .json()
            .await
            .with_context(|| format!("invalid cover upload url response for {resource}"))?;
        Ok(UploadGrant {
            storage_key: grant.resolved_storage_key(),
            upload_url: grant.upload_url,
        })
    }

    async fn link_cover(&self, resource: &ResourceRef, storage_key: &str) -> Result<()> {
        let request = self
            .http
            .put(self.resource_url(resource))
            .json(&LinkCoverRequest {
                cover_image_s3_key: storage_key.to_string(),
            });
        self.send_checked(request)
            .await
            .with_context(|| format!("failed to link cover for {resource}"))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
