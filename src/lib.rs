//! # proofmark: writing-assistant overlay core
//!
//! Analyzes free text through a rate-limited completion provider, caches the
//! results, and renders the reported issues as non-destructive underline
//! markers with positioned tooltips.
//!
//! ## Architecture
//!
//! - **[`config`]**: Configuration loading, validation and defaults
//! - **[`models`]**: Issues, analysis results and options
//! - **[`cache`]**: TTL + LRU result cache with similarity invalidation and persistence
//! - **[`provider`]**: Completion provider trait (HTTP and mock implementations)
//! - **[`detector`]**: Response parsing, normalization and suggestion ranking
//! - **[`analyzer`]**: Chunking, prompting, rate limiting and the request queue
//! - **[`engine`]**: Validation, cache orchestration, statistics and debouncing
//! - **[`dom`]**: Arena document model and text layout
//! - **[`render`]**: Underline markers and issue events
//! - **[`overlay`]**: Tooltip placement and frame-coalesced tracking

pub mod analyzer;
pub mod cache;
pub mod clock;
pub mod config;
pub mod detector;
pub mod dom;
pub mod engine;
pub mod geometry;
pub mod models;
pub mod overlay;
pub mod provider;
pub mod render;
pub mod text;
