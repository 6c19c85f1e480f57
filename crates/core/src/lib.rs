//! # HIE Core
//!
//! Business logic over normalized gateway responses.
//!
//! This crate works on responses already produced by the `ihe` normalizer:
//! - Error categorization into an ordered, first-match taxonomy
//! - Cross-gateway aggregation (patient discovery counts with vendor attribution, binary
//!   success/failure for document query and retrieval)
//! - Per-request success-rate reports and their summaries
//!
//! **No I/O**: sending requests, fan-out scheduling, persistence and logging setup belong to the
//! embedding application. Everything here is synchronous and side-effect free apart from
//! `tracing` diagnostics.

pub mod aggregator;
pub mod categorizer;
pub mod report;

pub use aggregator::{
    DocumentStats, ErrorGroup, ErrorOccurrence, PatientDiscoveryStats, Vendor, VendorCounts,
    VendorCoverage, VendorStats,
};
pub use categorizer::{
    categorize, classify, classify_issues_with, classify_with, CategoryGroup, ErrorCategory,
    CATEGORY_RULES,
};
pub use report::{ErrorDetail, ErrorOid, ReportSummary, RequestReport, SimplifiedReport};
