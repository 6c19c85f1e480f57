//! # HIE Outbound
//!
//! Outbound cross-gateway transaction core: normalize what each remote gateway sent back, then
//! categorize the errors and aggregate the results for the whole fan-out.
//!
//! The workspace is split the same way the data flows:
//! - `hie-types`: identifier primitives (`Oid`, URN prefix stripping)
//! - `fhir`: output models (`OperationOutcome`, `DocumentReference`, patient fragments)
//! - `ihe`: XML readers and the [`Normalizer`]
//! - `hie-core`: categorization, aggregation and reports
//!
//! This crate only re-exports their public surface.

pub use fhir::{
    DocumentReference, Issue, IssueSeverity, OperationOutcome, HTTP_ERROR_CODE,
    NOT_FOUND_CODE, NO_DOCUMENTS_FOUND_CODE, SCHEMA_ERROR_CODE,
};
pub use hie_core::{
    CategoryGroup, DocumentStats, ErrorCategory, PatientDiscoveryStats, ReportSummary,
    RequestReport, Vendor, VendorCounts, VendorCoverage, CATEGORY_RULES, classify, classify_with,
};
pub use hie_types::Oid;
pub use ihe::{
    DocumentQueryResponse, DocumentRetrievalResponse, ErrorListPolicy, Gateway, GatewayOutcome,
    GatewayReply, GatewayResponse, Normalizer, NormalizerConfig, OutboundRequest,
    PatientDiscoveryResponse, ReplyBody,
};
