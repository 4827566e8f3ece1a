//! Page-number pagination over an already ordered collection.

use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageRequest {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl PageRequest {
    pub fn new(page: usize, page_size: usize) -> Self {
        Self {
            page: Some(page),
            page_size: Some(page_size),
        }
    }

    /// Requested size; zero or missing falls back to the default, oversize is capped.
    pub fn size(&self) -> usize {
        match self.page_size {
            Some(0) | None => DEFAULT_PAGE_SIZE,
            Some(n) => n.min(MAX_PAGE_SIZE),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Page<T> {
    pub current_page: usize,
    pub next_page: Option<usize>,
    pub previous_page: Option<usize>,
    pub total_pages: usize,
    pub total_count: usize,
    pub page_count: usize,
    pub page_size: usize,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            current_page: self.current_page,
            next_page: self.next_page,
            previous_page: self.previous_page,
            total_pages: self.total_pages,
            total_count: self.total_count,
            page_count: self.page_count,
            page_size: self.page_size,
            results: self.results.into_iter().map(f).collect(),
        }
    }
}

/// Slice `items` into the requested page. An empty collection still has a
/// first page; any other page outside `1..=total_pages` is `NotFound`.
pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> AppResult<Page<T>> {
    let page_size = request.size();
    let total_count = items.len();
    let total_pages = total_count.div_ceil(page_size).max(1);
    let current_page = request.page.unwrap_or(1);
    if current_page == 0 || current_page > total_pages {
        return Err(AppError::NotFound);
    }

    let results: Vec<T> = items
        .into_iter()
        .skip((current_page - 1) * page_size)
        .take(page_size)
        .collect();

    Ok(Page {
        current_page,
        next_page: (current_page < total_pages).then_some(current_page + 1),
        previous_page: (current_page > 1).then(|| current_page - 1),
        total_pages,
        total_count,
        page_count: results.len(),
        page_size,
        results,
    })
}
