//! Post model and pagination.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A single bulletin-board post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: i64,
    /// Post title.
    pub name: String,
    /// Post body (HTML produced by the page editor).
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Soft-delete marker. Hidden posts stay in the table but are never listed.
    pub visible: bool,
}

/// User-supplied content for creating or updating a post.
#[derive(Debug, Clone, Deserialize)]
pub struct PostDraft {
    pub name: String,
    pub text: String,
}

impl PostDraft {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Reject drafts without a title.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::Validation("post name must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Pagination metadata for a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_posts: u32,
}

/// One page of visible posts, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<Post>,
    pub pagination: Pagination,
}

/// Slice `posts` into the requested page.
///
/// `page` is 1-based; values below 1 are treated as 1. Pages past the end
/// yield an empty slice with the real `total_pages`.
pub fn paginate(posts: &[Post], page: u32, page_size: u32) -> PostPage {
    let page = page.max(1);
    let page_size = page_size.max(1) as usize;
    let total = posts.len();
    let total_pages = total.div_ceil(page_size);

    let start = (page as usize - 1).saturating_mul(page_size);
    let slice = if start < total {
        let end = (start + page_size).min(total);
        posts[start..end].to_vec()
    } else {
        Vec::new()
    };

    PostPage {
        posts: slice,
        pagination: Pagination {
            current_page: page,
            total_pages: total_pages as u32,
            total_posts: total as u32,
        },
    }
}
