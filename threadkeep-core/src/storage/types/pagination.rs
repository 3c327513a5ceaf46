//! Cursor pagination types

use serde::{Deserialize, Serialize};

/// Page request: `first` items starting at the opaque `cursor`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub first: usize,
    pub cursor: Option<String>,
}

impl Pagination {
    pub fn first(first: usize) -> Self {
        Self { first, cursor: None }
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub has_next_page: bool,
    /// The cursor this page was requested with
    pub start_cursor: Option<String>,
    /// Cursor for the next page, present only when `has_next_page`
    pub end_cursor: Option<String>,
}

impl PageInfo {
    pub fn empty() -> Self {
        Self {
            has_next_page: false,
            start_cursor: None,
            end_cursor: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub page_info: PageInfo,
}

impl<T> PaginatedResponse<T> {
    pub fn empty() -> Self {
        Self {
            data: Vec::new(),
            page_info: PageInfo::empty(),
        }
    }
}
