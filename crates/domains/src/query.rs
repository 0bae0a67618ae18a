//! Ordering and paging of message listings.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;
use crate::models::Message;

/// Hard ceiling on a page of root messages.
pub const MAX_PAGE_SIZE: u32 = 50;
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortField {
    #[default]
    CreatedAt,
    LikeCount,
    DislikeCount,
}

impl SortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortField::CreatedAt => "createdAt",
            SortField::LikeCount => "likeCount",
            SortField::DislikeCount => "dislikeCount",
        }
    }
}

impl FromStr for SortField {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "createdAt" => Ok(SortField::CreatedAt),
            // "likes"/"dislikes" are the field names older clients send
            "likeCount" | "likes" => Ok(SortField::LikeCount),
            "dislikeCount" | "dislikes" => Ok(SortField::DislikeCount),
            other => Err(DomainError::validation(format!(
                "invalid sort field {other:?}, expected createdAt, likeCount or dislikeCount"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(DomainError::validation(format!(
                "invalid sort direction {other:?}, expected asc or desc"
            ))),
        }
    }
}

/// Sort applied to a listing. Ties on the field fall back to the id, which is
/// time ordered, in the same direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessageSort {
    pub field: SortField,
    pub direction: SortDirection,
}

impl MessageSort {
    pub fn new(field: SortField, direction: SortDirection) -> Self {
        Self { field, direction }
    }

    /// Parses optional query values; absent values use `createdAt desc`.
    pub fn parse(field: Option<&str>, direction: Option<&str>) -> Result<Self, DomainError> {
        Ok(Self {
            field: field.map(SortField::from_str).transpose()?.unwrap_or_default(),
            direction: direction
                .map(SortDirection::from_str)
                .transpose()?
                .unwrap_or_default(),
        })
    }

    pub fn compare(&self, a: &Message, b: &Message) -> Ordering {
        let by_field = match self.field {
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::LikeCount => a.votes.like_count().cmp(&b.votes.like_count()),
            SortField::DislikeCount => a.votes.dislike_count().cmp(&b.votes.dislike_count()),
        };
        let ordering = by_field.then_with(|| a.id.cmp(&b.id));
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }
}

impl fmt::Display for MessageSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field.as_str(), self.direction.as_str())
    }
}

/// A clamped page request. Construction never fails: out-of-range values are
/// pulled back into range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    page_size: u32,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: page.clamp(1, i64::from(u32::MAX)) as u32,
            page_size: page_size.clamp(1, i64::from(MAX_PAGE_SIZE)) as u32,
        }
    }

    /// Fills absent values with page 1 and `default_size`.
    pub fn from_query(page: Option<i64>, page_size: Option<i64>, default_size: u32) -> Self {
        Self::new(
            page.unwrap_or(1),
            page_size.unwrap_or(i64::from(default_size)),
        )
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, i64::from(DEFAULT_PAGE_SIZE))
    }
}

/// One page of results plus what a client needs to render a pager.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub page_size: u32,
    pub total_pages: u64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: u64, request: PageRequest) -> Self {
        Self {
            items,
            total,
            page: request.page(),
            page_size: request.page_size(),
            total_pages: total.div_ceil(u64::from(request.page_size())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_request_is_clamped() {
        let req = PageRequest::new(0, 500);
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), MAX_PAGE_SIZE);

        let req = PageRequest::new(-4, -1);
        assert_eq!(req.page(), 1);
        assert_eq!(req.page_size(), 1);

        let req = PageRequest::new(3, 20);
        assert_eq!(req.offset(), 40);
    }

    #[test]
    fn page_defaults() {
        let req = PageRequest::from_query(None, None, DEFAULT_PAGE_SIZE);
        assert_eq!(req, PageRequest::default());
        assert_eq!(req.offset(), 0);
    }

    #[test]
    fn total_pages_rounds_up() {
        let page: Page<u8> = Page::new(vec![], 21, PageRequest::new(1, 10));
        assert_eq!(page.total_pages, 3);
        let empty: Page<u8> = Page::new(vec![], 0, PageRequest::new(1, 10));
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn sort_parsing() {
        assert_eq!(MessageSort::parse(None, None).unwrap(), MessageSort::default());
        let sort = MessageSort::parse(Some("likes"), Some("asc")).unwrap();
        assert_eq!(sort, MessageSort::new(SortField::LikeCount, SortDirection::Asc));
        assert!(MessageSort::parse(Some("content"), None).is_err());
        assert!(MessageSort::parse(None, Some("sideways")).is_err());
    }
}
