/// Pagination input and paged results
///
/// Page numbers start at 1. A missing or non-positive page becomes 1; a
/// missing, non-positive or oversized page size becomes [`DEFAULT_PAGE_SIZE`].

use serde::{Deserialize, Serialize};

/// Page size used when none (or an invalid one) is requested
pub const DEFAULT_PAGE_SIZE: i64 = 10;

/// Largest page size a caller may request
pub const MAX_PAGE_SIZE: i64 = 100;

/// Raw pagination parameters as supplied by a caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

impl PageRequest {
    pub fn new(page: i64, page_size: i64) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// Normalized 1-based page number
    pub fn page(&self) -> i64 {
        match self.page {
            Some(page) if page > 0 => page,
            _ => 1,
        }
    }

    /// Normalized page size
    pub fn page_size(&self) -> i64 {
        match self.page_size {
            Some(size) if size > 0 && size <= MAX_PAGE_SIZE => size,
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    /// Row offset of the first item on this page
    pub fn offset(&self) -> i64 {
        (self.page() - 1).saturating_mul(self.page_size())
    }

    pub fn limit(&self) -> i64 {
        self.page_size()
    }
}

/// Position of a page within the full result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub page: i64,
    pub page_size: i64,
    pub total: i64,
}

/// One page of results plus the total number of matches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub list: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> Page<T> {
    pub fn new(list: Vec<T>, request: &PageRequest, total: i64) -> Self {
        Self {
            list,
            page_info: PageInfo {
                page: request.page(),
                page_size: request.page_size(),
                total,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_absent() {
        let request = PageRequest::default();
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(request.offset(), 0);
    }

    #[test]
    fn test_invalid_values_reset() {
        let request = PageRequest::new(0, 101);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 10);

        let request = PageRequest::new(-3, -1);
        assert_eq!(request.page(), 1);
        assert_eq!(request.page_size(), 10);
    }

    #[test]
    fn test_offset() {
        let request = PageRequest::new(3, 20);
        assert_eq!(request.offset(), 40);
        assert_eq!(request.limit(), 20);

        let request = PageRequest::new(2, MAX_PAGE_SIZE);
        assert_eq!(request.offset(), 100);
    }

    #[test]
    fn test_page_info_uses_normalized_values() {
        let page = Page::new(vec![1, 2, 3], &PageRequest::new(0, 500), 3);
        assert_eq!(page.page_info.page, 1);
        assert_eq!(page.page_info.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.page_info.total, 3);
    }
}
