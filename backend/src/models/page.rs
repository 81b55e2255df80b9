use serde::{Deserialize, Serialize};

/// Page request, 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, per_page: u32) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.per_page)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.per_page)
    }
}

/// A slice of a larger ordered result, with enough metadata to page through it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, request: PageRequest, total: i64) -> Self {
        let per_page = i64::from(request.per_page.max(1));
        let pages = (total.max(0) + per_page - 1) / per_page;
        Self {
            data,
            current_page: request.page,
            per_page: request.per_page,
            total,
            last_page: u32::try_from(pages.max(1)).unwrap_or(u32::MAX),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_request_clamps_to_first_page() {
        let request = PageRequest::new(Some(0), 15);
        assert_eq!(request.page, 1);
        assert_eq!(request.offset(), 0);

        let request = PageRequest::new(Some(3), 15);
        assert_eq!(request.offset(), 30);
        assert_eq!(request.limit(), 15);
    }

    #[test]
    fn test_last_page_rounds_up() {
        let page: Page<u8> = Page::new(vec![], PageRequest::new(None, 15), 31);
        assert_eq!(page.last_page, 3);

        let empty: Page<u8> = Page::new(vec![], PageRequest::new(None, 15), 0);
        assert_eq!(empty.last_page, 1);
    }
}
