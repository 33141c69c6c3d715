//! Query-ID cache: remembers which execution answered a query so identical
//! read queries can reuse its results instead of scanning again.
//!
//! Entries are invalidated by table modification times recorded by the
//! caller: an entry is usable only if it is at least as recent as the last
//! recorded modification of every table the query reads.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

/// A remembered execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub query_id: String,
    pub data_scanned_bytes: i64,
    pub recorded_at: DateTime<Utc>,
}

/// Store mapping normalized query text to execution IDs.
///
/// Implementations may be in-process or backed by an external cache service.
#[async_trait]
pub trait QueryIdCache: Send + Sync {
    async fn put(
        &self,
        query: &str,
        query_id: &str,
        data_scanned_bytes: i64,
        recorded_at: DateTime<Utc>,
    );

    async fn get_by_query(&self, query: &str) -> Option<CacheEntry>;

    async fn get_by_query_id(&self, query_id: &str) -> Option<String>;

    /// Forget the entry for `query_id`.
    async fn invalidate(&self, query_id: &str);

    async fn record_table_modified(&self, table: &str, modified_at: DateTime<Utc>);

    async fn table_modified(&self, table: &str) -> Option<DateTime<Utc>>;

    async fn record_table_location(&self, table: &str, uri: &str);

    async fn table_location(&self, table: &str) -> Option<String>;

    /// Execution ID for `query`, if one is cached and none of `tables` changed since.
    async fn valid_query_id(&self, query: &str, tables: &[String]) -> Option<String> {
        let entry = self.get_by_query(query).await?;
        for table in tables {
            if let Some(modified_at) = self.table_modified(table).await {
                if entry.recorded_at < modified_at {
                    return None;
                }
            }
        }
        Some(entry.query_id)
    }
}

/// In-process [`QueryIdCache`].
#[derive(Debug, Default)]
pub struct InMemoryQueryIdCache {
    by_query: DashMap<String, CacheEntry>,
    by_query_id: DashMap<String, String>,
    table_modified: DashMap<String, DateTime<Utc>>,
    table_location: DashMap<String, String>,
}

impl InMemoryQueryIdCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.by_query.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_query.is_empty()
    }
}

#[async_trait]
impl QueryIdCache for InMemoryQueryIdCache {
    async fn put(
        &self,
        query: &str,
        query_id: &str,
        data_scanned_bytes: i64,
        recorded_at: DateTime<Utc>,
    ) {
        let entry = CacheEntry {
            query_id: query_id.to_string(),
            data_scanned_bytes,
            recorded_at,
        };
        if let Some(previous) = self.by_query.insert(query.to_string(), entry) {
            self.by_query_id.remove(&previous.query_id);
        }
        self.by_query_id
            .insert(query_id.to_string(), query.to_string());
    }

    async fn get_by_query(&self, query: &str) -> Option<CacheEntry> {
        self.by_query.get(query).map(|entry| entry.clone())
    }

    async fn get_by_query_id(&self, query_id: &str) -> Option<String> {
        self.by_query_id.get(query_id).map(|query| query.clone())
    }

    async fn invalidate(&self, query_id: &str) {
        if let Some((_, query)) = self.by_query_id.remove(query_id) {
            self.by_query
                .remove_if(&query, |_, entry| entry.query_id == query_id);
        }
    }

    async fn record_table_modified(&self, table: &str, modified_at: DateTime<Utc>) {
        self.table_modified
            .insert(table.to_lowercase(), modified_at);
    }

    async fn table_modified(&self, table: &str) -> Option<DateTime<Utc>> {
        self.table_modified
            .get(&table.to_lowercase())
            .map(|t| *t)
    }

    async fn record_table_location(&self, table: &str, uri: &str) {
        self.table_location
            .insert(table.to_lowercase(), uri.to_string());
    }

    async fn table_location(&self, table: &str) -> Option<String> {
        self.table_location
            .get(&table.to_lowercase())
            .map(|uri| uri.clone())
    }
}

/// Canonical cache key: whitespace outside quoted literals collapsed,
/// trailing semicolons dropped. Literal contents are kept verbatim.
pub fn normalize_query(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut quote: Option<char> = None;
    let mut pending_space = false;
    let mut chars = sql.trim().chars();

    while let Some(c) = chars.next() {
        match quote {
            Some(q) => {
                out.push(c);
                if c == '\\' {
                    if let Some(escaped) = chars.next() {
                        out.push(escaped);
                    }
                } else if c == q {
                    quote = None;
                }
            }
            None if c.is_whitespace() => pending_space = true,
            None => {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                if c == '\'' || c == '"' {
                    quote = Some(c);
                }
                out.push(c);
            }
        }
    }

    out.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

/// Lowercased names following `FROM` and `JOIN`. Subqueries are skipped.
pub fn referenced_tables(sql: &str) -> Vec<String> {
    let mut tables: Vec<String> = Vec::new();
    let mut tokens = sql.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        let keyword = token.to_ascii_lowercase();
        if keyword != "from" && keyword != "join" {
            continue;
        }
        let Some(next) = tokens.peek() else { break };
        if next.starts_with('(') {
            continue;
        }
        let name: String = next
            .chars()
            .filter(|c| *c != '"' && *c != '`')
            .collect::<String>()
            .trim_end_matches(|c| c == ',' || c == ';' || c == ')')
            .to_lowercase();
        if !name.is_empty() && !tables.contains(&name) {
            tables.push(name);
        }
    }
    tables
}
