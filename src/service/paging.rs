//! Offset pagination over a counted base query.

use std::time::Instant;

use serde::de::DeserializeOwned;

use super::GraphService;
use crate::cypher::CypherQuery;
use crate::errors::GraphMapError;
use crate::search::{PageWindow, Search};
use crate::session::{fetch_column, first_column, GraphSession};

impl<S: GraphSession> GraphService<S> {
    /// Counts and pages the rows of `base`.
    ///
    /// `base` is a query without `RETURN`; `selector` is the projection of one
    /// result (decoded as `T`) and `start_var` the variable counted distinctly.
    /// The requested page is clamped into `[1, max_page]`.
    pub async fn page<T: DeserializeOwned>(
        &self,
        mut search: Search<T>,
        base: CypherQuery,
        selector: &str,
        order_by: Option<String>,
        start_var: &str,
    ) -> Result<Search<T>, GraphMapError> {
        let started = Instant::now();
        let count = base
            .clone()
            .return_(format!("count(distinct {start_var}) AS total"))
            .build();
        let total: i64 = first_column(self.session(), &count, "total")
            .await?
            .unwrap_or(0);
        let window = PageWindow::resolve(total, search.page, search.page_rows, search.infinite);

        let mut query = base.return_(format!("{selector} AS row"));
        if let Some(order) = order_by {
            query = query.order_by(order);
        }
        if let Some(limit) = window.limit {
            query = query.skip(window.skip).limit(limit);
        }
        search.results = fetch_column(self.session(), &query.build(), "row").await?;
        search.count = total;
        search.page = window.page;
        search.page_rows = window.page_rows;
        search.max_page = window.max_page;
        search.elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        tracing::debug!(
            target: "cyphervector::service",
            total,
            page = window.page,
            max_page = window.max_page,
            elapsed_ms = search.elapsed_ms,
            "service.page"
        );
        Ok(search)
    }
}
