//! Page arithmetic for call listings

use serde::{Deserialize, Serialize};
use validator::Validate;

/// Largest page size the backend will serve
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Page request parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Validate)]
pub struct PageRequest {
    /// Page number (1-based)
    #[validate(range(min = 1))]
    pub page: u32,

    /// Number of items per page
    #[validate(range(min = 1, max = 1000))]
    pub limit: u32,
}

impl PageRequest {
    /// Create a validated page request
    ///
    /// # Errors
    ///
    /// Returns a validation error when `page` is 0 or `limit` is outside `1..=1000`.
    pub fn new(page: u32, limit: u32) -> crate::Result<Self> {
        let request = Self { page, limit };
        request
            .validate()
            .map_err(|e| crate::Error::validation("pagination", e.to_string()))?;
        Ok(request)
    }

    /// Offset of the first row of the page
    #[must_use]
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.limit)
    }

    /// Inclusive row range `(first, last)` covered by the page
    #[must_use]
    pub fn row_range(&self) -> (u64, u64) {
        let first = self.offset();
        (first, first + u64::from(self.limit).saturating_sub(1))
    }

    /// Check if there's a next page
    #[must_use]
    pub fn has_next(&self, total_items: u64) -> bool {
        self.offset() + u64::from(self.limit) < total_items
    }

    /// Check if there's a previous page
    #[must_use]
    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self { page: 1, limit: 10 }
    }
}

/// `ceil(total / limit)`; a zero limit yields zero pages
#[must_use]
pub fn total_pages(total_items: u64, limit: u32) -> u64 {
    if limit == 0 {
        return 0;
    }
    total_items.div_ceil(u64::from(limit))
}

/// One page of results with totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    /// The data items
    pub items: Vec<T>,

    /// Page that was requested (1-based, not clamped)
    pub page: u32,

    /// Items per page
    pub limit: u32,

    /// Total number of items across all pages
    pub total_count: u64,

    /// Total number of pages
    pub total_pages: u64,
}

impl<T> Page<T> {
    /// Build a page and derive its page count
    #[must_use]
    pub fn new(items: Vec<T>, request: PageRequest, total_count: u64) -> Self {
        Self {
            items,
            page: request.page,
            limit: request.limit,
            total_count,
            total_pages: total_pages(total_count, request.limit),
        }
    }

    /// The request this page answers
    #[must_use]
    pub const fn request(&self) -> PageRequest {
        PageRequest {
            page: self.page,
            limit: self.limit,
        }
    }

    /// Whether the requested page lies past the last page
    #[must_use]
    pub fn is_past_end(&self) -> bool {
        u64::from(self.page) > self.total_pages
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(23, 5, 5)]
    #[case(25, 5, 5)]
    #[case(26, 5, 6)]
    #[case(0, 5, 0)]
    #[case(1, 1000, 1)]
    fn test_total_pages(#[case] total: u64, #[case] limit: u32, #[case] expected: u64) {
        assert_eq!(total_pages(total, limit), expected);
    }

    #[test]
    fn test_page_request_validation() {
        assert!(PageRequest::new(0, 10).is_err());
        assert!(PageRequest::new(1, 0).is_err());
        assert!(PageRequest::new(1, MAX_PAGE_SIZE + 1).is_err());
        assert!(PageRequest::new(3, 20).is_ok());
    }

    #[test]
    fn test_offset_and_range() {
        let request = PageRequest::new(3, 20).unwrap();

        assert_eq!(request.offset(), 40);
        assert_eq!(request.row_range(), (40, 59));
        assert!(request.has_prev());
        assert!(request.has_next(61));
        assert!(!request.has_next(60));
    }

    #[test]
    fn test_page_beyond_end_is_not_clamped() {
        let request = PageRequest::new(9, 5).unwrap();
        let page: Page<u8> = Page::new(Vec::new(), request, 23);

        assert_eq!(page.page, 9);
        assert_eq!(page.total_pages, 5);
        assert!(page.is_past_end());
    }

    #[test]
    fn test_page_navigation() {
        let request = PageRequest::new(2, 10).unwrap();
        let page: Page<u8> = Page::new(Vec::new(), request, 27);

        assert_eq!(page.request(), request);
        assert!(page.request().has_prev());
        assert!(page.request().has_next(page.total_count));
    }

    #[test]
    fn test_default_request() {
        let request = PageRequest::default();
        assert_eq!(request.offset(), 0);
        assert!(!request.has_prev());
    }
}
