//! Normalized per-gateway responses.
//!
//! Responsibilities:
//! - Model the four reply shapes (success, registry error, benign empty, failure) as one sum type
//! - Carry request/gateway context alongside the outcome
//! - Translate to and from the flat JSON shape consumed by persistence and webhooks
//!
//! Notes:
//! - On the wire a response carries either its payload field or `operationOutcome`, never both.
//!   Reading JSON back rebuilds the variant from the outcome's first issue code.

use crate::gateway::{Gateway, GatewayReply, OutboundRequest};
use crate::{IheError, IheResult};
use chrono::{DateTime, Utc};
use fhir::{
    DocumentReference, ExternalGatewayPatient, IssueSeverity, OperationOutcome, PatientResource,
    HTTP_ERROR_CODE, NO_DOCUMENTS_FOUND_CODE, NOT_FOUND_CODE, SCHEMA_ERROR_CODE,
};
use hie_types::Oid;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

// ============================================================================
// Public domain-level types
// ============================================================================

/// The result of one gateway call, one variant per branch of normalization.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GatewayOutcome<T> {
    /// Usable results.
    Success(T),
    /// The gateway rejected the request and said why.
    RegistryError(OperationOutcome),
    /// The gateway answered cleanly with nothing to return. Not a failure.
    Empty(OperationOutcome),
    /// The reply could not be read.
    SchemaError(OperationOutcome),
    /// The call never produced a reply.
    TransportError(OperationOutcome),
}

impl<T> GatewayOutcome<T> {
    pub fn payload(&self) -> Option<&T> {
        match self {
            Self::Success(payload) => Some(payload),
            _ => None,
        }
    }

    pub fn operation_outcome(&self) -> Option<&OperationOutcome> {
        match self {
            Self::Success(_) => None,
            Self::RegistryError(outcome)
            | Self::Empty(outcome)
            | Self::SchemaError(outcome)
            | Self::TransportError(outcome) => Some(outcome),
        }
    }

    /// True for every variant that represents a failed call.
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::RegistryError(_) | Self::SchemaError(_) | Self::TransportError(_)
        )
    }

    /// Rebuilds the variant an outcome was produced by.
    fn from_outcome(outcome: OperationOutcome) -> Self {
        let first = outcome.first_issue();
        let benign = first.severity == IssueSeverity::Information
            && (first.code == NO_DOCUMENTS_FOUND_CODE || first.code == NOT_FOUND_CODE);
        if first.code == HTTP_ERROR_CODE {
            Self::TransportError(outcome)
        } else if first.code == SCHEMA_ERROR_CODE {
            Self::SchemaError(outcome)
        } else if benign {
            Self::Empty(outcome)
        } else {
            Self::RegistryError(outcome)
        }
    }
}

/// Common view over the three normalized response types.
pub trait GatewayResponse {
    fn request_id(&self) -> &str;
    fn gateway(&self) -> &Gateway;
    fn operation_outcome(&self) -> Option<&OperationOutcome>;
    fn is_error(&self) -> bool;

    /// Success for aggregation purposes: usable results or a benign empty answer.
    fn is_success(&self) -> bool {
        !self.is_error()
    }
}

/// Normalized XCA document query (ITI-38) reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentQueryResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub gateway: Gateway,
    pub patient_id: Option<String>,
    pub outcome: GatewayOutcome<Vec<DocumentReference>>,
}

/// Normalized XCA document retrieval (ITI-39) reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRetrievalResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub gateway: Gateway,
    pub patient_id: Option<String>,
    pub outcome: GatewayOutcome<Vec<DocumentReference>>,
}

/// A positive XCPD match.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientMatch {
    pub external_gateway_patient: ExternalGatewayPatient,
    pub patient_resource: PatientResource,
}

/// Normalized XCPD patient discovery (ITI-55) reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PatientDiscoveryResponse {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub gateway: Gateway,
    pub patient_id: Option<String>,
    pub outcome: GatewayOutcome<PatientMatch>,
}

impl PatientDiscoveryResponse {
    pub(crate) fn new(
        request: &OutboundRequest,
        gateway: &Gateway,
        reply: &GatewayReply,
        outcome: GatewayOutcome<PatientMatch>,
    ) -> Self {
        Self {
            id: request.id.clone(),
            timestamp: request.timestamp,
            response_timestamp: reply.received_at,
            gateway: gateway.clone(),
            patient_id: request.patient_id.clone(),
            outcome,
        }
    }

    /// Whether the gateway found the patient.
    pub fn is_match(&self) -> bool {
        matches!(self.outcome, GatewayOutcome::Success(_))
    }

    pub fn to_json(&self) -> IheResult<String> {
        let wire = PatientDiscoveryWire::from(self);
        serde_json::to_string(&wire).map_err(|err| IheError::Fhir(err.into()))
    }

    /// Read a response back from JSON produced by [`Self::to_json`] (or the gateway SDK).
    ///
    /// # Errors
    ///
    /// Returns [`IheError::Translation`] naming the failing field path on a shape mismatch, or
    /// when neither a matched patient nor an outcome is present.
    pub fn from_json(json_text: &str) -> IheResult<Self> {
        let wire: PatientDiscoveryWire = parse_json("PatientDiscoveryResponse", json_text)?;
        wire.try_into()
    }
}

macro_rules! document_response_impl {
    ($ty:ident, $label:literal) => {
        impl $ty {
            pub(crate) fn new(
                request: &OutboundRequest,
                gateway: &Gateway,
                reply: &GatewayReply,
                outcome: GatewayOutcome<Vec<DocumentReference>>,
            ) -> Self {
                Self {
                    id: request.id.clone(),
                    timestamp: request.timestamp,
                    response_timestamp: reply.received_at,
                    gateway: gateway.clone(),
                    patient_id: request.patient_id.clone(),
                    outcome,
                }
            }

            /// Documents found, or an empty slice for any non-success outcome.
            pub fn documents(&self) -> &[DocumentReference] {
                self.outcome.payload().map(Vec::as_slice).unwrap_or_default()
            }

            pub fn to_json(&self) -> IheResult<String> {
                let wire = DocumentResponseWire {
                    id: self.id.clone(),
                    timestamp: self.timestamp,
                    response_timestamp: self.response_timestamp,
                    gateway: self.gateway.clone(),
                    patient_id: self.patient_id.clone(),
                    document_reference: self.outcome.payload().cloned(),
                    operation_outcome: self.outcome.operation_outcome().cloned(),
                };
                serde_json::to_string(&wire).map_err(|err| IheError::Fhir(err.into()))
            }

            /// Read a response back from JSON.
            ///
            /// # Errors
            ///
            /// Returns [`IheError::Translation`] naming the failing field path on a shape
            /// mismatch, or when the JSON carries both or neither of `documentReference` and
            /// `operationOutcome`.
            pub fn from_json(json_text: &str) -> IheResult<Self> {
                let wire: DocumentResponseWire = parse_json($label, json_text)?;
                let outcome = wire.outcome($label)?;
                Ok(Self {
                    id: wire.id,
                    timestamp: wire.timestamp,
                    response_timestamp: wire.response_timestamp,
                    gateway: wire.gateway,
                    patient_id: wire.patient_id,
                    outcome,
                })
            }
        }

        impl GatewayResponse for $ty {
            fn request_id(&self) -> &str {
                &self.id
            }

            fn gateway(&self) -> &Gateway {
                &self.gateway
            }

            fn operation_outcome(&self) -> Option<&OperationOutcome> {
                self.outcome.operation_outcome()
            }

            fn is_error(&self) -> bool {
                self.outcome.is_error()
            }
        }
    };
}

document_response_impl!(DocumentQueryResponse, "DocumentQueryResponse");
document_response_impl!(DocumentRetrievalResponse, "DocumentRetrievalResponse");

impl GatewayResponse for PatientDiscoveryResponse {
    fn request_id(&self) -> &str {
        &self.id
    }

    fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    fn operation_outcome(&self) -> Option<&OperationOutcome> {
        self.outcome.operation_outcome()
    }

    fn is_error(&self) -> bool {
        self.outcome.is_error()
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

fn parse_json<T: DeserializeOwned>(label: &str, json_text: &str) -> IheResult<T> {
    let mut deserializer = serde_json::Deserializer::from_str(json_text);
    serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
        let path = err.path().to_string();
        let path = if path.is_empty() || path == "." {
            "<root>".to_string()
        } else {
            path
        };
        IheError::Translation(format!(
            "{label} schema mismatch at {path}: {}",
            err.into_inner()
        ))
    })
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DocumentResponseWire {
    id: String,
    timestamp: DateTime<Utc>,
    response_timestamp: DateTime<Utc>,
    gateway: Gateway,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    document_reference: Option<Vec<DocumentReference>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation_outcome: Option<OperationOutcome>,
}

impl DocumentResponseWire {
    fn outcome(&self, label: &str) -> IheResult<GatewayOutcome<Vec<DocumentReference>>> {
        match (&self.document_reference, &self.operation_outcome) {
            (Some(documents), None) => Ok(GatewayOutcome::Success(documents.clone())),
            (None, Some(outcome)) => Ok(GatewayOutcome::from_outcome(outcome.clone())),
            (Some(_), Some(_)) => Err(IheError::Translation(format!(
                "{label} carries both documentReference and operationOutcome"
            ))),
            (None, None) => Err(IheError::Translation(format!(
                "{label} carries neither documentReference nor operationOutcome"
            ))),
        }
    }
}

/// XCPD gateways are serialized with `oid` rather than `homeCommunityId`.
#[derive(Debug, Serialize, Deserialize)]
struct XcpdGatewayWire {
    url: String,
    #[serde(alias = "homeCommunityId")]
    oid: Oid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PatientDiscoveryWire {
    id: String,
    timestamp: DateTime<Utc>,
    response_timestamp: DateTime<Utc>,
    gateway: XcpdGatewayWire,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patient_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patient_match: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    external_gateway_patient: Option<ExternalGatewayPatient>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    patient_resource: Option<PatientResource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    operation_outcome: Option<OperationOutcome>,
}

impl From<&PatientDiscoveryResponse> for PatientDiscoveryWire {
    fn from(response: &PatientDiscoveryResponse) -> Self {
        let (patient_match, external_gateway_patient, patient_resource) = match &response.outcome
        {
            GatewayOutcome::Success(found) => (
                Some(true),
                Some(found.external_gateway_patient.clone()),
                Some(found.patient_resource.clone()),
            ),
            GatewayOutcome::Empty(_) => (Some(false), None, None),
            _ => (None, None, None),
        };
        Self {
            id: response.id.clone(),
            timestamp: response.timestamp,
            response_timestamp: response.response_timestamp,
            gateway: XcpdGatewayWire {
                url: response.gateway.url.clone(),
                oid: response.gateway.home_community_id.clone(),
                id: response.gateway.id.clone(),
            },
            patient_id: response.patient_id.clone(),
            patient_match,
            external_gateway_patient,
            patient_resource,
            operation_outcome: response.outcome.operation_outcome().cloned(),
        }
    }
}

impl TryFrom<PatientDiscoveryWire> for PatientDiscoveryResponse {
    type Error = IheError;

    fn try_from(wire: PatientDiscoveryWire) -> Result<Self, Self::Error> {
        let outcome = match (wire.external_gateway_patient, wire.operation_outcome) {
            (Some(external_gateway_patient), None) if wire.patient_match != Some(false) => {
                GatewayOutcome::Success(PatientMatch {
                    external_gateway_patient,
                    patient_resource: wire.patient_resource.unwrap_or_default(),
                })
            }
            (None, Some(outcome)) => GatewayOutcome::from_outcome(outcome),
            _ => {
                return Err(IheError::Translation(
                    "PatientDiscoveryResponse must carry either a matched patient or an \
                     operationOutcome"
                        .into(),
                ))
            }
        };
        Ok(Self {
            id: wire.id,
            timestamp: wire.timestamp,
            response_timestamp: wire.response_timestamp,
            gateway: Gateway {
                url: wire.gateway.url,
                home_community_id: wire.gateway.oid,
                id: wire.gateway.id,
            },
            patient_id: wire.patient_id,
            outcome,
        })
    }
}
