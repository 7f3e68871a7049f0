//! Full-text search entry points.
//!
//! # Responsibility
//! - Expose query APIs backed by the `blog_posts_fts` FTS5 index.
//! - Keep search result shaping inside core.

pub mod fts;
