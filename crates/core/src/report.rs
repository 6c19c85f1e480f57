//! Success-rate reports over stored gateway responses.
//!
//! A [`RequestReport`] covers every response collected for one outbound request. A
//! [`ReportSummary`] rolls many of those up, averaging the percentages and counting how often
//! each gateway failed with the same error.

use ihe::GatewayResponse;
use serde::Serialize;
use std::collections::BTreeMap;

/// One failed gateway within a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorOid {
    pub oid: String,
    /// Detail text of every issue, joined with `", "`. Empty when there was no outcome.
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestReport {
    pub request_id: String,
    pub total: u32,
    pub success_percentage: f64,
    pub failure_percentage: f64,
    pub error_oids: Vec<ErrorOid>,
}

impl RequestReport {
    /// Builds the report for one request.
    ///
    /// Success uses the aggregation predicate, so a benign empty answer (no documents, or no
    /// patient match) is a success. Percentages are `0.0` when there are no responses.
    ///
    /// # Arguments
    ///
    /// * `request_id` - The outbound request the responses belong to.
    /// * `responses` - Every response stored for that request, of one transaction type.
    pub fn for_request<'a, R, I>(request_id: impl Into<String>, responses: I) -> Self
    where
        R: GatewayResponse + 'a,
        I: IntoIterator<Item = &'a R>,
    {
        let mut total = 0u32;
        let mut successes = 0u32;
        let mut error_oids = Vec::new();

        for response in responses {
            total += 1;
            if response.is_success() {
                successes += 1;
                continue;
            }
            let error = response
                .operation_outcome()
                .map(|outcome| {
                    outcome
                        .issues()
                        .iter()
                        .map(|issue| issue.text())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
                .unwrap_or_default();
            error_oids.push(ErrorOid {
                oid: response.gateway().home_community_id.to_string(),
                error,
            });
        }

        let failures = total - successes;
        Self {
            request_id: request_id.into(),
            total,
            success_percentage: percentage(successes, total),
            failure_percentage: percentage(failures, total),
            error_oids,
        }
    }
}

fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        return 0.0;
    }
    f64::from(part) / f64::from(total) * 100.0
}

/// A [`RequestReport`] without its per-gateway errors.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimplifiedReport {
    pub request_id: String,
    pub total: u32,
    pub success_percentage: f64,
    pub failure_percentage: f64,
}

impl From<&RequestReport> for SimplifiedReport {
    fn from(report: &RequestReport) -> Self {
        Self {
            request_id: report.request_id.clone(),
            total: report.total,
            success_percentage: report.success_percentage,
            failure_percentage: report.failure_percentage,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ErrorDetail {
    pub count: u32,
    pub details: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub reports: Vec<SimplifiedReport>,
    pub average_success_percentage: f64,
    pub average_failure_percentage: f64,
    /// Keyed by `"<oid>:<error>"`.
    pub error_details: BTreeMap<String, ErrorDetail>,
}

impl ReportSummary {
    /// Summarizes request reports. Averages are `0.0` for an empty input.
    pub fn summarize(reports: &[RequestReport]) -> Self {
        let mut error_details: BTreeMap<String, ErrorDetail> = BTreeMap::new();
        for error in reports.iter().flat_map(|report| &report.error_oids) {
            error_details
                .entry(format!("{}:{}", error.oid, error.error))
                .and_modify(|detail| detail.count += 1)
                .or_insert_with(|| ErrorDetail {
                    count: 1,
                    details: error.error.clone(),
                });
        }

        Self {
            reports: reports.iter().map(SimplifiedReport::from).collect(),
            average_success_percentage: average(reports.iter().map(|r| r.success_percentage)),
            average_failure_percentage: average(reports.iter().map(|r| r.failure_percentage)),
            error_details,
        }
    }
}

fn average(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 {
        0.0
    } else {
        sum / f64::from(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use fhir::{
        Issue, OperationOutcome, HTTP_ERROR_CODE, NOT_FOUND_CODE, NO_DOCUMENTS_FOUND_CODE,
    };
    use hie_types::Oid;
    use ihe::{DocumentQueryResponse, Gateway, GatewayOutcome, PatientDiscoveryResponse};

    fn query(
        oid: &str,
        outcome: GatewayOutcome<Vec<fhir::DocumentReference>>,
    ) -> DocumentQueryResponse {
        DocumentQueryResponse {
            id: "req-1".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            response_timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 2).unwrap(),
            gateway: Gateway::new("https://gw.example.org", Oid::parse(oid).expect("oid")),
            patient_id: None,
            outcome,
        }
    }

    fn registry_error(texts: &[&str]) -> GatewayOutcome<Vec<fhir::DocumentReference>> {
        let issues = texts.iter().map(|t| Issue::error("XDSRegistryError", *t)).collect();
        GatewayOutcome::RegistryError(OperationOutcome::from_issues(issues).expect("issues"))
    }

    #[test]
    fn request_report_counts_benign_empty_as_success() {
        let responses = [
            query("1.1", GatewayOutcome::Success(Vec::new())),
            query(
                "1.2",
                GatewayOutcome::Empty(OperationOutcome::single(Issue::information(
                    NO_DOCUMENTS_FOUND_CODE,
                    "",
                ))),
            ),
            query("1.3", registry_error(&["XDSRegistryBusy", "try later"])),
            query(
                "1.4",
                GatewayOutcome::TransportError(OperationOutcome::single(Issue::error(
                    HTTP_ERROR_CODE,
                    "ETIMEDOUT",
                ))),
            ),
        ];
        let report = RequestReport::for_request("req-1", &responses);

        assert_eq!(report.total, 4);
        assert_eq!(report.success_percentage, 50.0);
        assert_eq!(report.failure_percentage, 50.0);
        assert_eq!(
            report.error_oids,
            vec![
                ErrorOid {
                    oid: "1.3".into(),
                    error: "XDSRegistryBusy, try later".into()
                },
                ErrorOid {
                    oid: "1.4".into(),
                    error: "ETIMEDOUT".into()
                },
            ]
        );
    }

    #[test]
    fn patient_no_match_is_a_success() {
        let response = PatientDiscoveryResponse {
            id: "req-2".into(),
            timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
            response_timestamp: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 1).unwrap(),
            gateway: Gateway::new("https://gw.example.org", Oid::parse("1.9").expect("oid")),
            patient_id: None,
            outcome: GatewayOutcome::Empty(OperationOutcome::single(Issue::information(
                NOT_FOUND_CODE,
                "NF",
            ))),
        };
        let report = RequestReport::for_request("req-2", [&response]);
        assert_eq!(report.success_percentage, 100.0);
        assert!(report.error_oids.is_empty());
    }

    #[test]
    fn empty_request_has_zero_percentages() {
        let none: [&DocumentQueryResponse; 0] = [];
        let report = RequestReport::for_request("req-0", none);
        assert_eq!(report.total, 0);
        assert_eq!(report.success_percentage, 0.0);
        assert_eq!(report.failure_percentage, 0.0);
    }

    #[test]
    fn summary_averages_and_groups_errors_by_oid_and_text() {
        let first = RequestReport::for_request(
            "req-a",
            &[
                query("1.3", registry_error(&["XDSRegistryBusy"])),
                query("1.1", GatewayOutcome::Success(Vec::new())),
            ],
        );
        let second = RequestReport::for_request(
            "req-b",
            &[
                query("1.3", registry_error(&["XDSRegistryBusy"])),
                query("1.5", registry_error(&["XDSRegistryBusy"])),
            ],
        );
        let summary = ReportSummary::summarize(&[first, second]);

        assert_eq!(summary.reports.len(), 2);
        assert_eq!(summary.reports[1].request_id, "req-b");
        assert_eq!(summary.average_success_percentage, 25.0);
        assert_eq!(summary.average_failure_percentage, 75.0);
        assert_eq!(summary.error_details["1.3:XDSRegistryBusy"].count, 2);
        assert_eq!(summary.error_details["1.5:XDSRegistryBusy"].count, 1);
        assert_eq!(summary.error_details["1.5:XDSRegistryBusy"].details, "XDSRegistryBusy");

        let value = serde_json::to_value(&summary).expect("serialize");
        assert_eq!(value["averageSuccessPercentage"], 25.0);
        assert_eq!(value["reports"][0]["successPercentage"], 50.0);
    }

    #[test]
    fn summary_of_nothing_is_zero() {
        let summary = ReportSummary::summarize(&[]);
        assert_eq!(summary.average_success_percentage, 0.0);
        assert_eq!(summary.average_failure_percentage, 0.0);
        assert!(summary.error_details.is_empty());
    }
}
