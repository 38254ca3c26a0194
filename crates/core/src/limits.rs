//! Paging and pipeline limits.
//!
//! Field length limits live on [`crate::ClientInput`] because the
//! `#[validate]` derive macro requires literal values in attributes.

// === Paging ===

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PER_PAGE: u32 = 15;

/// Upper bound on a requested page size.
pub const MAX_PER_PAGE: u32 = 100;

/// Maximum results returned by a search.
pub const MAX_SEARCH_RESULTS: u32 = 15;

// === Pipeline ===

/// Default trailing extraction window in minutes.
pub const DEFAULT_EXTRACT_WINDOW_MINUTES: u64 = 5;

/// Clamp a requested page size into `1..=MAX_PER_PAGE`.
pub fn clamp_per_page(per_page: Option<u32>) -> u32 {
    per_page.unwrap_or(DEFAULT_PER_PAGE).clamp(1, MAX_PER_PAGE)
}
