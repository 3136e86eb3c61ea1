//! Paged search requests and results.

use serde::{Deserialize, Serialize};

use crate::memoizer::Memoizable;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchDirection {
    #[default]
    Ascending,
    Descending,
}

/// A search request, filled in with results by `page`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Search<T> {
    pub elapsed_ms: u64,
    pub count: i64,
    pub page: i64,
    pub page_rows: i64,
    pub max_page: i64,
    /// Return every row instead of one page.
    pub infinite: bool,
    pub groups: Vec<String>,
    pub results: Vec<T>,
    /// Sort key matched against [`OrderBy::when`] entries.
    pub order: Option<String>,
    pub direction: SearchDirection,
}

impl<T> Default for Search<T> {
    fn default() -> Self {
        Self {
            elapsed_ms: 0,
            count: 0,
            page: 1,
            page_rows: 60,
            max_page: 0,
            infinite: false,
            groups: Vec::new(),
            results: Vec::new(),
            order: None,
            direction: SearchDirection::Ascending,
        }
    }
}

impl<T> Search<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, page: i64) -> Self {
        self.page = page;
        self
    }

    pub fn page_rows(mut self, rows: i64) -> Self {
        self.page_rows = rows;
        self
    }

    pub fn infinite(mut self) -> Self {
        self.infinite = true;
        self
    }

    pub fn order(mut self, key: impl Into<String>, direction: SearchDirection) -> Self {
        self.order = Some(key.into());
        self.direction = direction;
        self
    }

    /// Carries the request and paging state over to another result type.
    pub fn with_results<U>(self, results: Vec<U>) -> Search<U> {
        Search {
            elapsed_ms: self.elapsed_ms,
            count: self.count,
            page: self.page,
            page_rows: self.page_rows,
            max_page: self.max_page,
            infinite: self.infinite,
            groups: self.groups,
            results,
            order: self.order,
            direction: self.direction,
        }
    }
}

impl<T> Memoizable for Search<T> {
    fn is_cacheable(&self) -> bool {
        self.count > 0
    }
}

/// Maps search order keys to `ORDER BY` expressions.
#[derive(Clone, Debug)]
pub struct OrderBy<'a> {
    order: Option<&'a str>,
    direction: SearchDirection,
    cases: Vec<(String, String, String)>,
}

impl<'a, T> From<&'a Search<T>> for OrderBy<'a> {
    fn from(search: &'a Search<T>) -> Self {
        Self {
            order: search.order.as_deref(),
            direction: search.direction,
            cases: Vec::new(),
        }
    }
}

impl<'a> OrderBy<'a> {
    pub fn when(mut self, key: &str, asc: &str, desc: &str) -> Self {
        self.cases
            .push((key.to_string(), asc.to_string(), desc.to_string()));
        self
    }

    /// Shorthand for `field ASC` / `field DESC`.
    pub fn when_field(self, key: &str, field: &str) -> Self {
        let asc = format!("{field} ASC");
        let desc = format!("{field} DESC");
        self.when(key, &asc, &desc)
    }

    /// The expression for the first matching key, or `None`.
    pub fn render(&self) -> Option<String> {
        let order = self.order?;
        self.cases
            .iter()
            .find(|(key, _, _)| key == order)
            .map(|(_, asc, desc)| match self.direction {
                SearchDirection::Ascending => asc.clone(),
                SearchDirection::Descending => desc.clone(),
            })
    }
}

/// Resolved paging window for one search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageWindow {
    pub page: i64,
    pub page_rows: i64,
    pub max_page: i64,
    pub skip: i64,
    /// `None` for infinite searches.
    pub limit: Option<i64>,
}

impl PageWindow {
    /// `max_page = total / rows + 1`; the page is clamped into `[1, max_page]`.
    pub fn resolve(total: i64, page: i64, page_rows: i64, infinite: bool) -> Self {
        let page_rows = page_rows.max(1);
        let max_page = total.max(0) / page_rows + 1;
        let page = page.clamp(1, max_page);
        if infinite {
            return Self {
                page,
                page_rows,
                max_page,
                skip: 0,
                limit: None,
            };
        }
        Self {
            page,
            page_rows,
            max_page,
            skip: (page - 1) * page_rows,
            limit: Some(page_rows),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_clamps_page() {
        let w = PageWindow::resolve(95, 0, 60, false);
        assert_eq!((w.page, w.max_page, w.skip, w.limit), (1, 2, 0, Some(60)));

        let w = PageWindow::resolve(95, 5, 60, false);
        assert_eq!((w.page, w.skip), (2, 60));
    }

    #[test]
    fn test_window_normalizes_rows() {
        let w = PageWindow::resolve(3, 2, 0, false);
        assert_eq!((w.page_rows, w.max_page, w.page, w.skip), (1, 4, 2, 1));
    }

    #[test]
    fn test_window_infinite() {
        let w = PageWindow::resolve(500, 3, 60, true);
        assert_eq!((w.skip, w.limit), (0, None));
    }

    #[test]
    fn test_order_by_direction() {
        let search: Search<()> = Search::new().order("name", SearchDirection::Descending);
        let rendered = OrderBy::from(&search)
            .when_field("created", "x.created_at")
            .when_field("name", "x.name")
            .render();
        assert_eq!(rendered.as_deref(), Some("x.name DESC"));
    }

    #[test]
    fn test_order_by_unmatched() {
        let search: Search<()> = Search::new().order("rank", SearchDirection::Ascending);
        assert!(OrderBy::from(&search).when_field("name", "x.name").render().is_none());
        assert!(OrderBy::from(&Search::<()>::new()).when_field("name", "x.name").render().is_none());
    }
}
