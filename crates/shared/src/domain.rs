use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::ValidationError;

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

id_newtype!(AuthorId);
id_newtype!(BookId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Authors,
    Books,
}

impl ResourceKind {
    /// Collection segment used by the record API (`/authors`, `/books`).
    pub fn path_segment(self) -> &'static str {
        match self {
            ResourceKind::Authors => "authors",
            ResourceKind::Books => "books",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path_segment())
    }
}

/// A record addressed generically, e.g. the target of a cover upload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub kind: ResourceKind,
    pub id: String,
}

impl ResourceRef {
    pub fn new(kind: ResourceKind, id: impl Into<String>) -> Self {
        Self {
            kind,
            id: id.into(),
        }
    }

    pub fn book(id: &BookId) -> Self {
        Self::new(ResourceKind::Books, id.as_str())
    }

    pub fn author(id: &AuthorId) -> Self {
        Self::new(ResourceKind::Authors, id.as_str())
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(rename = "_id")]
    pub id: AuthorId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    #[serde(rename = "_id")]
    pub id: BookId,
    pub title: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub author: AuthorId,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    #[serde(
        default,
        rename = "coverImageS3Key",
        skip_serializing_if = "Option::is_none"
    )]
    pub cover_image_s3_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image_url: Option<String>,
}

/// Stored records may carry `null` where a value is optional.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorDraft {
    pub name: String,
}

impl AuthorDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::Empty { field: "name" });
        }
        Ok(())
    }
}

/// Body of `POST /books` and `PUT /books/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookDraft {
    pub title: String,
    pub author: AuthorId,
    pub description: String,
    pub publish_date: NaiveDate,
    pub page_count: u32,
}

impl BookDraft {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::Empty { field: "title" });
        }
        if self.author.as_str().trim().is_empty() {
            return Err(ValidationError::Empty { field: "author" });
        }
        if self.page_count == 0 {
            return Err(ValidationError::NotPositive { field: "pageCount" });
        }
        Ok(())
    }
}
