//! FHIR-aligned output models for the outbound HIE gateway.
//!
//! This crate provides the **result vocabulary** every normalized gateway response is expressed
//! in, independent of the IHE wire format it was read from:
//! - `OperationOutcome` / `Issue` for problems reported by (or about) a remote gateway
//! - `DocumentReference` / `Coding` for document metadata found by XCA queries and retrievals
//! - patient-resource fragments for XCPD matches
//!
//! This crate focuses on:
//! - FHIR semantic alignment (field names follow the IHE gateway JSON shape, camelCase)
//! - serialisation/deserialisation with invariants enforced at the boundary
//!
//! It does not know about SOAP, ebXML or HL7v3; that translation lives in the `ihe` crate.

pub mod document;
pub mod outcome;
pub mod patient;

pub use document::{Coding, DocumentReference};
pub use outcome::{
    Issue, IssueDetails, IssueSeverity, OperationOutcome, HTTP_ERROR_CODE,
    NO_DOCUMENTS_FOUND_CODE, NO_DOCUMENTS_FOUND_TEXT, NOT_FOUND_CODE, SCHEMA_ERROR_CODE,
};
pub use patient::{
    AdministrativeGender, ContactPoint, ExternalGatewayPatient, HumanName, PatientAddress,
    PatientResource, PersonalIdentifier,
};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;
