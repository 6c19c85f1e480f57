//! Cross-gateway aggregation for one end-user request.
//!
//! Responsibilities:
//! - Count patient discovery outcomes, split errors by failure type and attribute matches to
//!   vendors
//! - Reduce document query and retrieval responses to a binary success/failure split
//! - Break patient discovery coverage down per vendor with grouped error details
//!
//! Notes:
//! - Input arrays may be shorter than the number of gateways queried. Missing responses are
//!   invisible here and never count as failures.
//! - Vendor attribution is a case-insensitive substring match on the gateway URL and is not
//!   exclusive: one URL can increment several vendors.

use chrono::{DateTime, Utc};
use fhir::{HTTP_ERROR_CODE, SCHEMA_ERROR_CODE};
use ihe::{
    DocumentQueryResponse, DocumentRetrievalResponse, GatewayResponse, PatientDiscoveryResponse,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// Error key used when a failed response carries no detail text.
pub const NO_ERROR_TEXT: &str = "No error text";

// ============================================================================
// Vendors
// ============================================================================

/// Known networks and EHR vendors, identified by a substring of their gateway URLs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Vendor {
    Surescripts,
    Epic,
    EHealthExchange,
    Athena,
    Kno2,
    Ntst,
    Medent,
    CommonWellAlliance,
}

impl Vendor {
    pub const ALL: [Vendor; 8] = [
        Vendor::Surescripts,
        Vendor::Epic,
        Vendor::EHealthExchange,
        Vendor::Athena,
        Vendor::Kno2,
        Vendor::Ntst,
        Vendor::Medent,
        Vendor::CommonWellAlliance,
    ];

    /// The vendor key, as it appears in reports.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Surescripts => "Surescripts",
            Self::Epic => "Epic",
            Self::EHealthExchange => "ehealthexchange",
            Self::Athena => "Athena",
            Self::Kno2 => "Kno2",
            Self::Ntst => "Ntst",
            Self::Medent => "Medent",
            Self::CommonWellAlliance => "commonwellalliance",
        }
    }

    /// Every vendor whose key occurs in the URL. Case-insensitive.
    pub fn attribute(url: &str) -> impl Iterator<Item = Vendor> + '_ {
        let url = url.to_lowercase();
        Self::ALL
            .into_iter()
            .filter(move |vendor| url.contains(&vendor.key().to_lowercase()))
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

impl Serialize for Vendor {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.key())
    }
}

/// One counter per known vendor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCounts {
    pub surescripts: u32,
    pub epic: u32,
    pub ehealthexchange: u32,
    pub athena: u32,
    pub kno2: u32,
    pub ntst: u32,
    pub medent: u32,
    pub commonwellalliance: u32,
}

impl VendorCounts {
    pub fn get(&self, vendor: Vendor) -> u32 {
        match vendor {
            Vendor::Surescripts => self.surescripts,
            Vendor::Epic => self.epic,
            Vendor::EHealthExchange => self.ehealthexchange,
            Vendor::Athena => self.athena,
            Vendor::Kno2 => self.kno2,
            Vendor::Ntst => self.ntst,
            Vendor::Medent => self.medent,
            Vendor::CommonWellAlliance => self.commonwellalliance,
        }
    }

    fn slot(&mut self, vendor: Vendor) -> &mut u32 {
        match vendor {
            Vendor::Surescripts => &mut self.surescripts,
            Vendor::Epic => &mut self.epic,
            Vendor::EHealthExchange => &mut self.ehealthexchange,
            Vendor::Athena => &mut self.athena,
            Vendor::Kno2 => &mut self.kno2,
            Vendor::Ntst => &mut self.ntst,
            Vendor::Medent => &mut self.medent,
            Vendor::CommonWellAlliance => &mut self.commonwellalliance,
        }
    }

    /// Increments every vendor matching the URL.
    pub fn attribute(&mut self, url: &str) {
        for vendor in Vendor::attribute(url) {
            *self.slot(vendor) += 1;
        }
    }

    /// Sum over all vendors. Can exceed the number of responses attributed.
    pub fn total(&self) -> u32 {
        Vendor::ALL.iter().map(|vendor| self.get(*vendor)).sum()
    }
}

// ============================================================================
// Patient discovery
// ============================================================================

/// Counters for one patient discovery fan-out.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PatientDiscoveryStats {
    pub total: u32,
    pub non_error_count: u32,
    pub error_count: u32,
    pub match_count: u32,
    pub no_match_count: u32,
    pub http_error_count: u32,
    pub schema_error_count: u32,
    pub specific_error_count: u32,
    pub vendor_counts: VendorCounts,
}

impl PatientDiscoveryStats {
    /// Aggregates patient discovery responses.
    ///
    /// Matched responses are attributed to vendors. Erroring responses are split by their first
    /// issue code: `http-error`, `schema-error`, or anything else as a specific error.
    pub fn aggregate<'a, I>(responses: I) -> Self
    where
        I: IntoIterator<Item = &'a PatientDiscoveryResponse>,
    {
        let mut stats = Self::default();
        for response in responses {
            stats.total += 1;
            if !response.is_error() {
                stats.non_error_count += 1;
                if response.is_match() {
                    stats.match_count += 1;
                    stats.vendor_counts.attribute(&response.gateway.url);
                } else {
                    stats.no_match_count += 1;
                }
                continue;
            }

            stats.error_count += 1;
            let code = response
                .operation_outcome()
                .map(|outcome| outcome.first_issue().code.as_str());
            match code {
                Some(HTTP_ERROR_CODE) => stats.http_error_count += 1,
                Some(SCHEMA_ERROR_CODE) => stats.schema_error_count += 1,
                _ => stats.specific_error_count += 1,
            }
        }
        tracing::debug!(
            "patient discovery: {} responses, {} matched, {} errors",
            stats.total,
            stats.match_count,
            stats.error_count
        );
        stats
    }
}

// ============================================================================
// Document query / retrieval
// ============================================================================

/// Binary success/failure counters for document query or retrieval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentStats {
    pub total: u32,
    pub success_count: u32,
    pub failure_count: u32,
    /// Documents returned across all successful responses.
    pub document_count: u32,
}

impl DocumentStats {
    /// Aggregates document query responses. A benign empty answer counts as a success.
    pub fn from_queries<'a, I>(responses: I) -> Self
    where
        I: IntoIterator<Item = &'a DocumentQueryResponse>,
    {
        let mut stats = Self::default();
        for response in responses {
            stats.record(response.is_success(), response.documents().len());
        }
        stats
    }

    /// Aggregates document retrieval responses. A benign empty answer counts as a success.
    pub fn from_retrievals<'a, I>(responses: I) -> Self
    where
        I: IntoIterator<Item = &'a DocumentRetrievalResponse>,
    {
        let mut stats = Self::default();
        for response in responses {
            stats.record(response.is_success(), response.documents().len());
        }
        stats
    }

    fn record(&mut self, success: bool, documents: usize) {
        self.total += 1;
        if success {
            self.success_count += 1;
            self.document_count += u32::try_from(documents).unwrap_or(u32::MAX);
        } else {
            self.failure_count += 1;
        }
    }

    pub fn all_failed(&self) -> bool {
        self.total > 0 && self.success_count == 0
    }
}

// ============================================================================
// Vendor coverage
// ============================================================================

/// Where and when one failed response came from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOccurrence {
    pub gateway_url: String,
    pub gateway_oid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub request_id: String,
}

impl ErrorOccurrence {
    fn from_response(response: &PatientDiscoveryResponse) -> Self {
        Self {
            gateway_url: response.gateway.url.clone(),
            gateway_oid: response.gateway.home_community_id.to_string(),
            gateway_id: response.gateway.id.clone(),
            timestamp: response.timestamp,
            response_timestamp: response.response_timestamp,
            request_id: response.id.clone(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ErrorGroup {
    pub count: u32,
    pub details: Vec<ErrorOccurrence>,
}

/// Coverage for one vendor (or for the unattributed remainder).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VendorStats {
    pub total: u32,
    pub success: u32,
    /// Failed responses keyed by their first issue's detail text.
    pub errors: BTreeMap<String, ErrorGroup>,
}

impl VendorStats {
    fn record(&mut self, response: &PatientDiscoveryResponse) {
        self.total += 1;
        if !response.is_error() {
            self.success += 1;
            return;
        }
        let text = response
            .operation_outcome()
            .map(|outcome| outcome.first_issue().text())
            .filter(|text| !text.is_empty())
            .unwrap_or(NO_ERROR_TEXT);
        let group = self.errors.entry(text.to_string()).or_default();
        group.count += 1;
        group.details.push(ErrorOccurrence::from_response(response));
    }
}

/// Per-vendor patient discovery coverage.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VendorCoverage {
    pub vendors: BTreeMap<Vendor, VendorStats>,
    /// Responses whose gateway matched no known vendor.
    pub unattributed: VendorStats,
    /// Responses skipped because their URL matched an exclusion.
    pub excluded: u32,
}

impl VendorCoverage {
    /// Breaks responses down by vendor.
    ///
    /// A response whose URL contains any `exclude` entry (case-insensitive) is skipped. Every
    /// known vendor appears in the result, even with a zero total.
    pub fn analyze<'a, I>(responses: I, exclude: &[&str]) -> Self
    where
        I: IntoIterator<Item = &'a PatientDiscoveryResponse>,
    {
        let exclude: Vec<String> = exclude.iter().map(|e| e.to_lowercase()).collect();
        let mut coverage = Self {
            vendors: Vendor::ALL
                .into_iter()
                .map(|vendor| (vendor, VendorStats::default()))
                .collect(),
            ..Default::default()
        };

        for response in responses {
            let url = response.gateway.url.to_lowercase();
            if exclude.iter().any(|e| url.contains(e.as_str())) {
                coverage.excluded += 1;
                continue;
            }
            let mut attributed = false;
            for vendor in Vendor::attribute(&url) {
                attributed = true;
                coverage.vendors.entry(vendor).or_default().record(response);
            }
            if !attributed {
                coverage.unattributed.record(response);
            }
        }
        coverage
    }

    pub fn vendor(&self, vendor: Vendor) -> Option<&VendorStats> {
        self.vendors.get(&vendor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use fhir::{
        ExternalGatewayPatient, Issue, OperationOutcome, PatientResource, NOT_FOUND_CODE,
        NO_DOCUMENTS_FOUND_CODE,
    };
    use hie_types::Oid;
    use ihe::{Gateway, GatewayOutcome, PatientMatch};

    fn at(second: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, second).unwrap()
    }

    fn gateway(url: &str) -> Gateway {
        Gateway::new(url, Oid::parse("2.16.840.1.113883.3.1").expect("oid"))
    }

    fn discovery(url: &str, outcome: GatewayOutcome<PatientMatch>) -> PatientDiscoveryResponse {
        PatientDiscoveryResponse {
            id: "req-pd".into(),
            timestamp: at(0),
            response_timestamp: at(3),
            gateway: gateway(url),
            patient_id: Some("patient-1".into()),
            outcome,
        }
    }

    fn matched(url: &str) -> PatientDiscoveryResponse {
        discovery(
            url,
            GatewayOutcome::Success(PatientMatch {
                external_gateway_patient: ExternalGatewayPatient {
                    id: "ext-1".into(),
                    system: "1.2.3".into(),
                },
                patient_resource: PatientResource::default(),
            }),
        )
    }

    fn failed(url: &str, issue: Issue) -> PatientDiscoveryResponse {
        let code = issue.code.clone();
        let outcome = OperationOutcome::single(issue);
        let outcome = match code.as_str() {
            HTTP_ERROR_CODE => GatewayOutcome::TransportError(outcome),
            SCHEMA_ERROR_CODE => GatewayOutcome::SchemaError(outcome),
            _ => GatewayOutcome::RegistryError(outcome),
        };
        discovery(url, outcome)
    }

    fn query(outcome: GatewayOutcome<Vec<fhir::DocumentReference>>) -> DocumentQueryResponse {
        DocumentQueryResponse {
            id: "req-dq".into(),
            timestamp: at(0),
            response_timestamp: at(1),
            gateway: gateway("https://gw.example.org"),
            patient_id: None,
            outcome,
        }
    }

    #[test]
    fn eleven_matches_attribute_vendors_case_insensitively() {
        let mut responses = vec![
            matched("https://fhir.epic.com/xcpd"),
            matched("https://gateway.EPIC.org/iti55"),
            matched("https://xcpd.athenahealth.com/gw"),
        ];
        for i in 0..8 {
            responses.push(matched(&format!("https://hospital-{i}.example.net/xcpd")));
        }

        let stats = PatientDiscoveryStats::aggregate(&responses);
        assert_eq!(stats.total, 11);
        assert_eq!(stats.non_error_count, 11);
        assert_eq!(stats.match_count, 11);
        assert_eq!(stats.error_count, 0);
        assert_eq!(stats.vendor_counts.epic, 2);
        assert_eq!(stats.vendor_counts.athena, 1);
        assert_eq!(stats.vendor_counts.total(), 3);
    }

    #[test]
    fn one_url_can_increment_several_vendors() {
        let responses = [matched("https://epic-via-commonwellalliance.example.org")];
        let stats = PatientDiscoveryStats::aggregate(&responses);
        assert_eq!(stats.vendor_counts.get(Vendor::Epic), 1);
        assert_eq!(stats.vendor_counts.get(Vendor::CommonWellAlliance), 1);
        assert_eq!(stats.match_count, 1);
    }

    #[test]
    fn errors_are_split_by_first_issue_code() {
        let responses = [
            failed("https://a.example.org", Issue::error(HTTP_ERROR_CODE, "ETIMEDOUT")),
            failed("https://b.example.org", Issue::error(SCHEMA_ERROR_CODE, "no envelope")),
            failed(
                "https://c.example.org",
                Issue::error("InternalError", "Too many results found"),
            ),
            discovery(
                "https://d.epic.com",
                GatewayOutcome::Empty(OperationOutcome::single(Issue::information(
                    NOT_FOUND_CODE,
                    "NF",
                ))),
            ),
        ];
        let stats = PatientDiscoveryStats::aggregate(&responses);

        assert_eq!(stats.total, 4);
        assert_eq!(stats.error_count, 3);
        assert_eq!(stats.http_error_count, 1);
        assert_eq!(stats.schema_error_count, 1);
        assert_eq!(stats.specific_error_count, 1);
        assert_eq!(stats.non_error_count, 1);
        assert_eq!(stats.no_match_count, 1);
        assert_eq!(stats.vendor_counts.epic, 0, "no-match is not attributed");
    }

    #[test]
    fn transport_timeout_is_http_error_not_specific() {
        let responses = [failed(
            "https://gw.example.org",
            Issue::error(HTTP_ERROR_CODE, "ETIMEDOUT"),
        )];
        let stats = PatientDiscoveryStats::aggregate(&responses);
        assert_eq!(stats.http_error_count, 1);
        assert_eq!(stats.specific_error_count, 0);
    }

    #[test]
    fn benign_empty_query_counts_as_success() {
        let doc = fhir::DocumentReference {
            home_community_id: "1.2.3".into(),
            repository_unique_id: "1.2.3".into(),
            doc_unique_id: "4.5.6".into(),
            ..Default::default()
        };
        let responses = [
            query(GatewayOutcome::Empty(OperationOutcome::single(Issue::information(
                NO_DOCUMENTS_FOUND_CODE,
                "",
            )))),
            query(GatewayOutcome::Success(vec![doc.clone(), doc])),
            query(GatewayOutcome::RegistryError(OperationOutcome::single(Issue::error(
                "XDSRegistryError",
                "boom",
            )))),
        ];
        let stats = DocumentStats::from_queries(&responses);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.success_count, 2);
        assert_eq!(stats.failure_count, 1);
        assert_eq!(stats.document_count, 2);
        assert!(!stats.all_failed());
    }

    #[test]
    fn empty_input_yields_zero_counters() {
        let none: [DocumentRetrievalResponse; 0] = [];
        let stats = DocumentStats::from_retrievals(&none);
        assert_eq!(stats, DocumentStats::default());
        assert!(!stats.all_failed());
        assert_eq!(
            PatientDiscoveryStats::aggregate(&[] as &[PatientDiscoveryResponse]),
            PatientDiscoveryStats::default()
        );
    }

    #[test]
    fn coverage_groups_errors_by_text_per_vendor() {
        let responses = [
            matched("https://fhir.epic.com/a"),
            failed("https://fhir.epic.com/b", Issue::error("x", "ECONNRESET")),
            failed("https://fhir.epic.com/c", Issue::error("x", "ECONNRESET")),
            failed("https://fhir.epic.com/d", Issue::error("x", "")),
            failed("https://unknown.example.org", Issue::error("x", "socket hang up")),
            matched("https://kno2.example.org/skip-me"),
        ];
        let coverage = VendorCoverage::analyze(&responses, &["SKIP-ME"]);

        let epic = coverage.vendor(Vendor::Epic).expect("epic present");
        assert_eq!(epic.total, 4);
        assert_eq!(epic.success, 1);
        assert_eq!(epic.errors["ECONNRESET"].count, 2);
        assert_eq!(epic.errors["ECONNRESET"].details[1].gateway_url, "https://fhir.epic.com/c");
        assert_eq!(epic.errors[NO_ERROR_TEXT].count, 1);

        assert_eq!(coverage.vendor(Vendor::Kno2).map(|s| s.total), Some(0));
        assert_eq!(coverage.excluded, 1);
        assert_eq!(coverage.unattributed.total, 1);
        assert_eq!(coverage.unattributed.errors["socket hang up"].count, 1);

        let value = serde_json::to_value(&coverage).expect("serialize");
        assert_eq!(value["vendors"]["Epic"]["success"], 1);
        assert_eq!(
            value["vendors"]["Epic"]["errors"]["ECONNRESET"]["details"][0]["gatewayOid"],
            "2.16.840.1.113883.3.1"
        );
    }
}
