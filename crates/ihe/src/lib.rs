//! IHE cross-gateway wire boundary.
//!
//! This crate reads the SOAP/XML replies remote gateways send back for the three outbound
//! cross-community transactions and normalizes them into typed responses:
//! - ITI-38 Cross Gateway Query (XCA document query)
//! - ITI-39 Cross Gateway Retrieve (XCA document retrieval)
//! - ITI-55 Cross Gateway Patient Discovery (XCPD)
//!
//! The entry point is [`Normalizer`]. It never fails on data-shaped problems: transport failures,
//! registry errors, empty results and unreadable XML all become a typed [`GatewayOutcome`]
//! variant. Only explicit parsing helpers (`from_json`, `from_yaml`) return [`IheError`].
//!
//! Building requests, signing, sending and retrying are handled elsewhere.

pub mod config;
pub mod gateway;
pub mod normalizer;
pub mod response;

mod hl7;
mod iti38;
mod iti39;
mod iti55;
mod registry;
mod xml;

pub use config::{ErrorListPolicy, NormalizerConfig};
pub use gateway::{Gateway, GatewayReply, OutboundRequest, ReplyBody};
pub use normalizer::Normalizer;
pub use response::{
    DocumentQueryResponse, DocumentRetrievalResponse, GatewayOutcome, GatewayResponse,
    PatientDiscoveryResponse, PatientMatch,
};

/// Errors returned by the IHE boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum IheError {
    #[error("malformed XML: {0}")]
    Xml(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("malformed registry error entry: {0}")]
    MalformedEntry(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("translation error: {0}")]
    Translation(String),

    #[error(transparent)]
    Fhir(#[from] fhir::FhirError),

    #[error(transparent)]
    Types(#[from] hie_types::TypesError),
}

/// Type alias for Results that can fail with an [`IheError`].
pub type IheResult<T> = Result<T, IheError>;
