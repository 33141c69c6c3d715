//! Forward-only row cursor over a paginated result set.
//!
//! [`Rows`] holds one page at a time and fetches the next page when the
//! buffered rows run out. Column metadata comes from the first page and is
//! available as soon as the cursor exists.

use crate::error::{DriverError, Result};
use crate::observability::Observability;
use crate::query::cost::QueryCost;
use crate::transport::{AthenaApi, ColumnInfo, RawRow, ResultPage};
use crate::types::{Coercer, Value};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

/// Name of the single column of synthetic results.
pub const SYNTHETIC_COLUMN_NAME: &str = "_col0";

/// Declared type of synthetic and padding columns.
pub const SYNTHETIC_COLUMN_TYPE: &str = "string";

/// Column name the service uses for a bare update count.
const UPDATE_COUNT_COLUMN: &str = "rows";

/// Cursor lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    AwaitingFirstPage,
    HasRows,
    AwaitingNextPage,
    Exhausted,
    Closed,
}

/// Rows of one query execution.
pub struct Rows {
    client: Option<Arc<dyn AthenaApi>>,
    query_id: String,
    columns: Vec<ColumnInfo>,
    buffer: VecDeque<RawRow>,
    next_token: Option<String>,
    update_count: Option<i64>,
    page_count: usize,
    state: CursorState,
    coercer: Coercer,
    observability: Observability,
    cost: Option<QueryCost>,
}

impl Rows {
    /// Open a cursor on a succeeded execution, fetching its first page.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError` if the first page cannot be fetched.
    pub async fn open(
        client: Arc<dyn AthenaApi>,
        query_id: &str,
        coercer: Coercer,
        observability: Observability,
    ) -> Result<Self> {
        let mut rows = Self {
            client: Some(client),
            query_id: query_id.to_string(),
            columns: Vec::new(),
            buffer: VecDeque::new(),
            next_token: None,
            update_count: None,
            page_count: 0,
            state: CursorState::AwaitingFirstPage,
            coercer,
            observability,
            cost: None,
        };
        rows.fetch_page(None).await?;
        Ok(rows)
    }

    /// A one-row, one-column result holding `value`.
    pub fn synthetic(query_id: &str, value: &str, coercer: Coercer) -> Self {
        let mut buffer = VecDeque::new();
        buffer.push_back(vec![Some(value.to_string())]);
        Self {
            client: None,
            query_id: query_id.to_string(),
            columns: vec![ColumnInfo::new(SYNTHETIC_COLUMN_NAME, SYNTHETIC_COLUMN_TYPE)],
            buffer,
            next_token: None,
            update_count: None,
            page_count: 1,
            state: CursorState::HasRows,
            coercer,
            observability: Observability::disabled(),
            cost: None,
        }
    }

    pub(crate) fn with_cost(mut self, cost: Option<QueryCost>) -> Self {
        self.cost = cost;
        self
    }

    pub fn query_id(&self) -> &str {
        &self.query_id
    }

    pub fn columns(&self) -> &[ColumnInfo] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Declared type name of column `index`.
    pub fn column_type(&self, index: usize) -> Option<&str> {
        self.columns.get(index).map(|c| c.type_name.as_str())
    }

    /// Rows affected, for data-manipulation statements.
    pub fn update_count(&self) -> Option<i64> {
        self.update_count
    }

    /// Pages fetched so far.
    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Cost estimate, when the connection tracks costs.
    pub fn cost(&self) -> Option<&QueryCost> {
        self.cost.as_ref()
    }

    /// Advance to the next row.
    ///
    /// Returns `Ok(None)` at the end of the data, and keeps doing so on
    /// every later call.
    ///
    /// # Errors
    ///
    /// - `RemoteError` if fetching the next page fails; the cursor is then exhausted
    /// - `ConversionError` if a cell does not fit its column type
    pub async fn next_row(&mut self) -> Result<Option<Vec<Value>>> {
        loop {
            if matches!(self.state, CursorState::Exhausted | CursorState::Closed) {
                return Ok(None);
            }

            if let Some(raw) = self.buffer.pop_front() {
                self.state = if self.buffer.is_empty() {
                    CursorState::AwaitingNextPage
                } else {
                    CursorState::HasRows
                };
                return self.convert(raw).map(Some);
            }

            match self.next_token.take() {
                Some(token) => self.fetch_page(Some(token)).await?,
                None => {
                    self.state = CursorState::Exhausted;
                    return Ok(None);
                }
            }
        }
    }

    /// Drain the cursor.
    ///
    /// # Errors
    ///
    /// Returns the first error raised by [`Rows::next_row`].
    pub async fn fetch_all(&mut self) -> Result<Vec<Vec<Value>>> {
        let mut all = Vec::new();
        while let Some(row) = self.next_row().await? {
            all.push(row);
        }
        Ok(all)
    }

    /// Stop reading. Pending pages are discarded; the remote execution is untouched.
    pub fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        if self.next_token.is_some() {
            self.observability.warn(&format!(
                "rows of query {} closed prematurely, {} page(s) read",
                self.query_id, self.page_count
            ));
            self.observability.count("rows.premature_close");
        }
        self.discard();
    }

    /// Close without reporting pending pages, for results read only for their update count.
    pub(crate) fn discard(&mut self) {
        self.buffer.clear();
        self.next_token = None;
        self.state = CursorState::Closed;
    }

    fn convert(&self, raw: RawRow) -> Result<Vec<Value>> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, column)| {
                let cell = raw.get(i).and_then(|c| c.as_deref());
                self.coercer.coerce(column, cell).map_err(DriverError::from)
            })
            .collect()
    }

    async fn fetch_page(&mut self, token: Option<String>) -> Result<()> {
        let Some(client) = self.client.as_ref() else {
            self.state = CursorState::Exhausted;
            return Ok(());
        };

        let started = Instant::now();
        let page = match client.get_results_page(&self.query_id, token).await {
            Ok(page) => page,
            Err(err) => {
                self.state = CursorState::Exhausted;
                self.buffer.clear();
                self.observability.error(&format!(
                    "fetching results of query {} failed: {}",
                    self.query_id, err
                ));
                self.observability.count("page.fetch_failed");
                return Err(err.into());
            }
        };
        self.observability.time("page.fetch", started.elapsed());
        self.observability.count("page.fetched");

        let first_page = self.page_count == 0;
        self.page_count += 1;
        self.next_token = page.next_token.clone();
        if page.update_count.is_some() {
            self.update_count = page.update_count;
        }

        let rows = if first_page {
            let (columns, rows) = reconcile_first_page(page);
            self.columns = columns;
            rows
        } else {
            let width = self.columns.len();
            let rows = reconcile_rows(page.rows, width);
            let dropped: usize = rows.iter().map(|r| r.len().saturating_sub(width)).sum();
            if dropped > 0 {
                self.observability.warn(&format!(
                    "query {} page {}: dropped {} field(s) beyond the {} column(s)",
                    self.query_id, self.page_count, dropped, width
                ));
                self.observability.count("page.dropped_fields");
            }
            rows
        };

        self.observability.debug(&format!(
            "query {} page {}: {} row(s), more pages: {}",
            self.query_id,
            self.page_count,
            rows.len(),
            self.next_token.is_some()
        ));

        self.buffer = rows.into();
        self.state = if !self.buffer.is_empty() {
            CursorState::HasRows
        } else if self.next_token.is_some() {
            CursorState::AwaitingNextPage
        } else {
            CursorState::Exhausted
        };
        Ok(())
    }
}

impl Drop for Rows {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Rows {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rows")
            .field("query_id", &self.query_id)
            .field("columns", &self.columns)
            .field("buffered", &self.buffer.len())
            .field("state", &self.state)
            .field("page_count", &self.page_count)
            .finish()
    }
}

/// Establish columns from the first page and clean up its rows.
fn reconcile_first_page(page: ResultPage) -> (Vec<ColumnInfo>, Vec<RawRow>) {
    let ResultPage {
        columns,
        mut rows,
        update_count,
        ..
    } = page;

    let mut columns = match columns {
        Some(columns) => columns,
        None if rows.is_empty() && update_count.is_some() => {
            vec![ColumnInfo::new(UPDATE_COUNT_COLUMN, "bigint")]
        }
        None => Vec::new(),
    };

    // Extra fields become padding columns
    let width = rows.first().map_or(0, Vec::len);
    for i in columns.len()..width {
        columns.push(ColumnInfo::new(format!("_col{}", i), SYNTHETIC_COLUMN_TYPE));
    }

    rows = reconcile_rows(rows, columns.len());

    if rows.is_empty() && columns.len() == 1 && columns[0].name == UPDATE_COUNT_COLUMN {
        if let Some(count) = update_count.filter(|c| *c > 0) {
            rows.push(vec![Some(count.to_string())]);
        }
    }

    let echoes_header = rows.first().map_or(false, |first| {
        !columns.is_empty()
            && first.len() == columns.len()
            && first
                .iter()
                .zip(&columns)
                .all(|(cell, column)| cell.as_deref() == Some(column.name.as_str()))
    });
    if echoes_header {
        rows.remove(0);
    }

    (columns, rows)
}

/// Split single-field rows packed with tabs back into `width` fields.
fn reconcile_rows(rows: Vec<RawRow>, width: usize) -> Vec<RawRow> {
    let packed = width > 1 && rows.first().map_or(false, |r| r.len() == 1);
    if !packed {
        return rows;
    }
    rows.into_iter()
        .map(|row| {
            let split: Option<RawRow> = row.first().and_then(|cell| cell.as_deref()).and_then(|cell| {
                let items: Vec<&str> = cell.split('\t').collect();
                (items.len() == width)
                    .then(|| items.iter().map(|s| Some(s.trim().to_string())).collect())
            });
            split.unwrap_or(row)
        })
        .collect()
}
