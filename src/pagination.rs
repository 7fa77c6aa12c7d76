use serde::Serialize;

/// Listings shown per page on the index.
pub const LISTINGS_PER_PAGE: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: usize,
    pub per_page: usize,
}

impl Pagination {
    /// Rows to skip, saturating at `i64::MAX` for absurd page numbers.
    pub fn offset(&self) -> i64 {
        let offset = (self.page.max(1) - 1).saturating_mul(self.per_page);
        i64::try_from(offset).unwrap_or(i64::MAX)
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }
}

/// Number of pages needed to show `total` rows.
pub fn total_pages(total: usize, per_page: usize) -> usize {
    if per_page == 0 {
        return 0;
    }
    total.div_ceil(per_page)
}

/// Clamp a user supplied page number into `[1, total_pages]`.
///
/// With no rows at all the only valid page is 1.
pub fn clamp_page(requested: i64, total_pages: usize) -> usize {
    let last = total_pages.max(1) as i64;
    requested.clamp(1, last) as usize
}

/// One page of items plus the numbers the template needs to draw pager links.
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub page: usize,
    pub total_pages: usize,
    pub total: usize,
    pub pages: Vec<usize>,
}

impl<T> Paginated<T> {
    pub fn new(items: Vec<T>, page: usize, total_pages: usize, total: usize) -> Self {
        Self {
            items,
            page,
            total_pages,
            total,
            pages: (1..=total_pages).collect(),
        }
    }
}
