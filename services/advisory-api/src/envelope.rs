//! Uniform response envelope and pagination.

use crate::errors::{ApiError, Result};
use actix_web::HttpResponse;
use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 300;

/// Serializes as `{}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Empty {}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T = Empty> {
    pub success: bool,
    pub msg: String,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            msg: String::new(),
            data,
        }
    }

    pub fn ok_msg(msg: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            msg: msg.into(),
            data,
        }
    }

    pub fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().json(self)
    }
}

impl Envelope<Empty> {
    pub fn fail(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            msg: msg.into(),
            data: Empty {},
        }
    }

    pub fn done() -> Self {
        Envelope::ok(Empty {})
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub count: i64,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            count: self.count,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    /// Pages are 1-based; the size is clamped to `max_size`.
    pub fn from_query(
        page: Option<u32>,
        page_size: Option<u32>,
        default_size: u32,
        max_size: u32,
    ) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ApiError::Validation("invalid page".to_string()));
        }
        let page_size = match page_size {
            Some(0) => return Err(ApiError::Validation("invalid page_size".to_string())),
            Some(size) => size.min(max_size),
            None => default_size,
        };
        Ok(Self { page, page_size })
    }

    pub fn first(limit: u32) -> Self {
        Self { page: 1, page_size: limit }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.page_size as i64
    }

    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    /// Cuts one page out of an already ordered, fully materialized list.
    pub fn slice<T: Clone>(&self, items: &[T]) -> Page<T> {
        let start = (self.offset() as usize).min(items.len());
        let end = (start + self.page_size as usize).min(items.len());
        Page {
            count: items.len() as i64,
            results: items[start..end].to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_envelope_shape() {
        let json = serde_json::to_value(Envelope::fail("bad mobile")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "msg": "bad mobile", "data": {}}));
    }

    #[test]
    fn test_page_defaults_and_clamp() {
        let page = PageRequest::from_query(None, None, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE).unwrap();
        assert_eq!(page, PageRequest::default());

        let page = PageRequest::from_query(Some(3), Some(1000), 10, 300).unwrap();
        assert_eq!(page.page_size, 300);
        assert_eq!(page.offset(), 600);

        assert!(PageRequest::from_query(Some(0), None, 10, 300).is_err());
        assert!(PageRequest::from_query(None, Some(0), 10, 300).is_err());
    }

    #[test]
    fn test_slice_past_end_is_empty() {
        let items: Vec<i32> = (1..=5).collect();
        let page = PageRequest { page: 2, page_size: 2 }.slice(&items);
        assert_eq!(page.results, vec![3, 4]);
        assert_eq!(page.count, 5);

        let page = PageRequest { page: 9, page_size: 2 }.slice(&items);
        assert!(page.results.is_empty());
        assert_eq!(page.count, 5);
    }
}
