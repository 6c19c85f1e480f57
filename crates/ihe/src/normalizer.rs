//! Per-gateway response normalization.
//!
//! Each entry point takes one reply for one (request, gateway) pair and always returns a typed
//! response. The decision procedure for XCA replies is, in order:
//!
//! 1. transport failure → one `http-error` issue; the body is never inspected
//! 2. unreadable XML or missing envelope → one `schema-error` issue
//! 3. `Success`/`PartialSuccess` with at least one entry → the documents that could be read,
//!    possibly none (any error list sent alongside is dropped)
//! 4. an error list → one issue per `RegistryError`
//! 5. otherwise → one informational `no-documents-found` issue
//!
//! XCPD replies follow the acknowledgement/query-response decision in the ITI-55 reader.

use crate::config::{ErrorListPolicy, NormalizerConfig};
use crate::gateway::{Gateway, GatewayReply, OutboundRequest, ReplyBody};
use crate::iti55::Discovery;
use crate::response::{
    DocumentQueryResponse, DocumentRetrievalResponse, GatewayOutcome, PatientDiscoveryResponse,
    PatientMatch,
};
use crate::xml::XmlElement;
use crate::{iti38, iti39, iti55, registry, IheResult};
use fhir::{
    DocumentReference, Issue, OperationOutcome, HTTP_ERROR_CODE, NO_DOCUMENTS_FOUND_CODE,
    NO_DOCUMENTS_FOUND_TEXT, NOT_FOUND_CODE, SCHEMA_ERROR_CODE,
};

type DocumentOutcome = GatewayOutcome<Vec<DocumentReference>>;

/// Turns raw gateway replies into normalized responses.
///
/// Holds only configuration, so one instance can be shared freely and calls have no side
/// effects beyond logging.
#[derive(Clone, Debug, Default)]
pub struct Normalizer {
    config: NormalizerConfig,
}

impl Normalizer {
    pub fn new(config: NormalizerConfig) -> Self {
        Self { config }
    }

    /// Normalize an ITI-38 Cross Gateway Query reply.
    pub fn document_query(
        &self,
        reply: &GatewayReply,
        request: &OutboundRequest,
        gateway: &Gateway,
    ) -> DocumentQueryResponse {
        let outcome = match &reply.body {
            ReplyBody::TransportError { error } => transport_error(request, error),
            ReplyBody::Xml(xml) => self
                .query_outcome(xml, request, gateway)
                .unwrap_or_else(|err| schema_error(request, gateway, &err.to_string())),
        };
        DocumentQueryResponse::new(request, gateway, reply, outcome)
    }

    /// Normalize an ITI-39 Cross Gateway Retrieve reply.
    pub fn document_retrieval(
        &self,
        reply: &GatewayReply,
        request: &OutboundRequest,
        gateway: &Gateway,
    ) -> DocumentRetrievalResponse {
        let outcome = match &reply.body {
            ReplyBody::TransportError { error } => transport_error(request, error),
            ReplyBody::Xml(xml) => self
                .retrieval_outcome(xml, request, gateway)
                .unwrap_or_else(|err| schema_error(request, gateway, &err.to_string())),
        };
        DocumentRetrievalResponse::new(request, gateway, reply, outcome)
    }

    /// Normalize an ITI-55 Cross Gateway Patient Discovery reply.
    pub fn patient_discovery(
        &self,
        reply: &GatewayReply,
        request: &OutboundRequest,
        gateway: &Gateway,
    ) -> PatientDiscoveryResponse {
        let outcome = match &reply.body {
            ReplyBody::TransportError { error } => transport_error(request, error),
            ReplyBody::Xml(xml) => {
                let discovery = XmlElement::parse(xml).and_then(|root| iti55::read(&root));
                discovery_outcome(discovery, request, gateway)
            }
        };
        PatientDiscoveryResponse::new(request, gateway, reply, outcome)
    }

    fn query_outcome(
        &self,
        xml: &str,
        request: &OutboundRequest,
        gateway: &Gateway,
    ) -> IheResult<DocumentOutcome> {
        let root = XmlElement::parse(xml)?;
        let response = iti38::query_response(&root)?;

        let entries = if registry::is_success_status(registry::status(response)) {
            iti38::extrinsic_objects(response)
        } else {
            Vec::new()
        };
        if entries.is_empty() {
            return Ok(self.error_list_outcome(registry::error_list(response), request, gateway));
        }

        let defaults = iti38::EntryDefaults {
            home_community_id: gateway.home_community_id.as_str(),
            repository_id_fallback: self.config.repository_id_fallback,
        };
        let mut documents = Vec::with_capacity(entries.len());
        for entry in entries {
            match iti38::document_reference(entry, &defaults) {
                Ok(document) => documents.push(document),
                Err(field) => tracing::warn!(
                    "skipping document entry without {} from {} (request {})",
                    field,
                    gateway.url,
                    request.id
                ),
            }
        }
        tracing::debug!("{} documents from {}", documents.len(), gateway.url);
        Ok(GatewayOutcome::Success(documents))
    }

    fn retrieval_outcome(
        &self,
        xml: &str,
        request: &OutboundRequest,
        gateway: &Gateway,
    ) -> IheResult<DocumentOutcome> {
        let root = XmlElement::parse(xml)?;
        let response = iti39::retrieve_response(&root)?;
        let registry_response = iti39::registry_response(response)?;

        let entries = if registry::is_success_status(registry::status(registry_response)) {
            iti39::document_responses(response)
        } else {
            Vec::new()
        };
        if entries.is_empty() {
            let error_list = registry::error_list(registry_response);
            return Ok(self.error_list_outcome(error_list, request, gateway));
        }

        let mut documents = Vec::with_capacity(entries.len());
        for entry in entries {
            match iti39::document_reference(entry, gateway.home_community_id.as_str()) {
                Ok(document) => documents.push(document),
                Err(field) => tracing::warn!(
                    "skipping retrieved document without {} from {} (request {})",
                    field,
                    gateway.url,
                    request.id
                ),
            }
        }
        tracing::debug!("{} retrieved documents from {}", documents.len(), gateway.url);
        Ok(GatewayOutcome::Success(documents))
    }

    /// Steps 4 and 5 of the XCA decision procedure.
    fn error_list_outcome(
        &self,
        error_list: Option<&XmlElement>,
        request: &OutboundRequest,
        gateway: &Gateway,
    ) -> DocumentOutcome {
        if let Some(list) = error_list {
            match registry::map_error_list(list) {
                Ok(issues) => {
                    if let Some(outcome) = outcome_from_issues(request, issues) {
                        tracing::debug!("registry error from {}", gateway.url);
                        return GatewayOutcome::RegistryError(outcome);
                    }
                }
                Err(err) => {
                    tracing::warn!(
                        "failed to map registry error list from {}: {}",
                        gateway.url,
                        err
                    );
                    if self.config.error_list_policy == ErrorListPolicy::Diagnostic {
                        return schema_error(request, gateway, &err.to_string());
                    }
                }
            }
        }

        GatewayOutcome::Empty(
            OperationOutcome::single(Issue::information(
                NO_DOCUMENTS_FOUND_CODE,
                NO_DOCUMENTS_FOUND_TEXT,
            ))
            .with_id(&request.id),
        )
    }
}

fn discovery_outcome(
    discovery: IheResult<Discovery>,
    request: &OutboundRequest,
    gateway: &Gateway,
) -> GatewayOutcome<PatientMatch> {
    match discovery {
        Ok(Discovery::Match(found)) => {
            tracing::debug!("patient match at {}", gateway.url);
            GatewayOutcome::Success(found)
        }
        Ok(Discovery::NoMatch { query_response_code }) => GatewayOutcome::Empty(
            OperationOutcome::single(Issue::information(NOT_FOUND_CODE, query_response_code))
                .with_id(&request.id),
        ),
        Ok(Discovery::Rejected(issues)) => outcome_from_issues(request, issues)
            .map(GatewayOutcome::RegistryError)
            .unwrap_or_else(|| schema_error(request, gateway, "rejection carried no issues")),
        Err(err) => schema_error(request, gateway, &err.to_string()),
    }
}

fn outcome_from_issues(request: &OutboundRequest, issues: Vec<Issue>) -> Option<OperationOutcome> {
    OperationOutcome::from_issues(issues).map(|outcome| outcome.with_id(&request.id))
}

fn transport_error<T>(request: &OutboundRequest, error: &str) -> GatewayOutcome<T> {
    GatewayOutcome::TransportError(
        OperationOutcome::single(Issue::error(HTTP_ERROR_CODE, error)).with_id(&request.id),
    )
}

fn schema_error<T>(request: &OutboundRequest, gateway: &Gateway, text: &str) -> GatewayOutcome<T> {
    tracing::warn!("unreadable reply from {}: {}", gateway.url, text);
    GatewayOutcome::SchemaError(
        OperationOutcome::single(Issue::error(SCHEMA_ERROR_CODE, text)).with_id(&request.id),
    )
}
