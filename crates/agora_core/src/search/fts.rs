//! SQLite FTS5-based blog search.
//!
//! # Responsibility
//! - Provide keyword search over blog post titles and content.
//! - Return typed hits with stable IDs.
//!
//! # Invariants
//! - Only published posts are returned.
//! - Result ordering is deterministic by rank, `published_at` and id.

use crate::db::DbError;
use crate::model::blog::BlogPostId;
use rusqlite::{params, Connection, Row};
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// Result type for search APIs.
pub type SearchResult<T> = Result<T, SearchError>;

/// Search-layer error for query parsing and DB interaction.
#[derive(Debug)]
pub enum SearchError {
    /// Query text was rejected by the FTS5 parser.
    InvalidQuery { query: String, message: String },
    Db(DbError),
}

impl Display for SearchError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidQuery { query, message } => {
                write!(f, "invalid full-text query `{query}`: {message}")
            }
            Self::Db(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SearchError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::InvalidQuery { .. } => None,
            Self::Db(err) => Some(err),
        }
    }
}

impl From<DbError> for SearchError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for SearchError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Search options.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    pub text: String,
    /// Maximum number of hits to return.
    pub limit: u32,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

/// Single search hit returned by [`search_posts`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchHit {
    pub post_id: BlogPostId,
    pub title: String,
    pub slug: String,
    pub snippet: String,
}

/// Searches published blog posts and returns ranked hits.
///
/// Every whitespace-separated term is quoted and the terms are AND-ed, so
/// user input never reaches the FTS5 query grammar. Blank queries return
/// an empty list.
pub fn search_posts(conn: &Connection, query: &SearchQuery) -> SearchResult<Vec<SearchHit>> {
    let Some(match_expr) = build_match_expression(&query.text) else {
        return Ok(Vec::new());
    };
    if query.limit == 0 {
        return Ok(Vec::new());
    }

    let mut stmt = conn.prepare(
        "SELECT
            bp.id AS id,
            bp.title AS title,
            bp.slug AS slug,
            snippet(blog_posts_fts, 1, '[', ']', ' ... ', 10) AS snippet
         FROM blog_posts_fts
         INNER JOIN blog_posts bp ON bp.id = blog_posts_fts.rowid
         WHERE blog_posts_fts MATCH ?1
           AND bp.status = 'published'
         ORDER BY bm25(blog_posts_fts), bp.published_at DESC, bp.id DESC
         LIMIT ?2",
    )?;
    let mut rows = stmt
        .query(params![match_expr, i64::from(query.limit)])
        .map_err(|err| map_query_error(err, &match_expr))?;
    let mut hits = Vec::new();
    while let Some(row) = rows
        .next()
        .map_err(|err| map_query_error(err, &match_expr))?
    {
        hits.push(parse_search_hit(row)?);
    }
    Ok(hits)
}

fn parse_search_hit(row: &Row<'_>) -> SearchResult<SearchHit> {
    Ok(SearchHit {
        post_id: row.get("id")?,
        title: row.get("title")?,
        slug: row.get("slug")?,
        snippet: row.get("snippet")?,
    })
}

fn build_match_expression(text: &str) -> Option<String> {
    let terms = text
        .split_whitespace()
        .map(escape_fts_term)
        .collect::<Vec<_>>();
    if terms.is_empty() {
        return None;
    }
    Some(terms.join(" AND "))
}

fn escape_fts_term(raw: &str) -> String {
    let escaped = raw.replace('"', "\"\"");
    format!("\"{escaped}\"")
}

fn map_query_error(err: rusqlite::Error, query: &str) -> SearchError {
    if is_match_syntax_error(&err) {
        return SearchError::InvalidQuery {
            query: query.to_string(),
            message: err.to_string(),
        };
    }
    SearchError::Db(DbError::Sqlite(err))
}

fn is_match_syntax_error(err: &rusqlite::Error) -> bool {
    match err {
        rusqlite::Error::SqliteFailure(_, Some(message)) => {
            let msg = message.to_lowercase();
            (msg.contains("fts5") && msg.contains("syntax"))
                || msg.contains("malformed match expression")
                || msg.contains("unterminated")
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::build_match_expression;

    #[test]
    fn terms_are_quoted_and_joined() {
        assert_eq!(
            build_match_expression("rust  \"async\""),
            Some("\"rust\" AND \"\"\"async\"\"\"".to_string())
        );
        assert_eq!(build_match_expression("   "), None);
    }
}
