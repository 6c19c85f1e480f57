//! FHIR-aligned `OperationOutcome` model.
//!
//! Responsibilities:
//! - Define the issue vocabulary (`IssueSeverity`, `Issue`) shared by all transactions
//! - Guarantee that an `OperationOutcome` always carries at least one issue
//! - Provide JSON parse/render helpers with field-path error reporting
//!
//! Notes:
//! - "No outcome" is modelled as `Option<OperationOutcome>::None`, never as an outcome with an
//!   empty issue list. [`OperationOutcome::from_issues`] is the only way to build one from a
//!   list, and it returns `None` for an empty list.

use crate::{FhirError, FhirResult};
use serde::{Deserialize, Serialize};

/// Issue code for a gateway call that failed before any XML arrived.
pub const HTTP_ERROR_CODE: &str = "http-error";

/// Issue code for a reply that could not be read as the expected SOAP/XML shape.
pub const SCHEMA_ERROR_CODE: &str = "schema-error";

/// Issue code for an XCA reply with no documents and no errors.
pub const NO_DOCUMENTS_FOUND_CODE: &str = "no-documents-found";

/// Detail text carried by the `no-documents-found` issue.
pub const NO_DOCUMENTS_FOUND_TEXT: &str = "No documents found";

/// Issue code for an XCPD reply that found no matching patient.
pub const NOT_FOUND_CODE: &str = "not-found";

const RESOURCE_TYPE: &str = "OperationOutcome";

// ============================================================================
// Public domain-level types
// ============================================================================

/// Severity of a single issue.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Fatal,
    Error,
    Warning,
    Information,
}

impl IssueSeverity {
    /// Reads a severity as senders write it on the wire.
    ///
    /// Any URI prefix is dropped (`urn:oasis:...:ErrorSeverityType:Error` becomes `error`) and the
    /// remainder is compared case-insensitively. Unrecognised values are treated as
    /// [`IssueSeverity::Error`], since the sender reported them inside an error list.
    pub fn from_wire(value: &str) -> Self {
        let local = value
            .trim()
            .rsplit([':', '/', '#'])
            .next()
            .unwrap_or_default()
            .to_lowercase();
        match local.as_str() {
            "fatal" => Self::Fatal,
            "warning" => Self::Warning,
            "information" | "info" => Self::Information,
            _ => Self::Error,
        }
    }

    /// Returns the lowercase FHIR code for this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Information => "information",
        }
    }
}

/// Free-text details attached to an issue.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueDetails {
    #[serde(default)]
    pub text: String,
}

/// One normalized problem reported by (or about) a remote gateway.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub severity: IssueSeverity,
    pub code: String,
    #[serde(default)]
    pub details: IssueDetails,
}

impl Issue {
    /// Creates an issue from its parts.
    pub fn new(severity: IssueSeverity, code: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            severity,
            code: code.into(),
            details: IssueDetails { text: text.into() },
        }
    }

    /// Convenience constructor for an `error` severity issue.
    pub fn error(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, code, text)
    }

    /// Convenience constructor for an `information` severity issue.
    pub fn information(code: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Information, code, text)
    }

    /// The detail text used for categorisation.
    pub fn text(&self) -> &str {
        &self.details.text
    }
}

/// A non-empty collection of issues.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "OperationOutcomeWire", into = "OperationOutcomeWire")]
pub struct OperationOutcome {
    id: Option<String>,
    issue: Vec<Issue>,
}

impl OperationOutcome {
    /// Builds an outcome from a list of issues, or `None` when the list is empty.
    pub fn from_issues(issues: Vec<Issue>) -> Option<Self> {
        if issues.is_empty() {
            return None;
        }
        Some(Self {
            id: None,
            issue: issues,
        })
    }

    /// Builds an outcome holding exactly one issue.
    pub fn single(issue: Issue) -> Self {
        Self {
            id: None,
            issue: vec![issue],
        }
    }

    /// Sets the resource id (conventionally the outbound request id).
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// All issues, in the order the sender reported them. Never empty.
    pub fn issues(&self) -> &[Issue] {
        &self.issue
    }

    /// The first issue. Always present because outcomes are never empty.
    pub fn first_issue(&self) -> &Issue {
        &self.issue[0]
    }

    /// Parse an outcome from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] naming the failing field path if the JSON does not match
    /// the outcome shape, including when `issue` is empty or `resourceType` is not
    /// `OperationOutcome`.
    pub fn parse_json(json_text: &str) -> FhirResult<Self> {
        let mut deserializer = serde_json::Deserializer::from_str(json_text);
        serde_path_to_error::deserialize(&mut deserializer).map_err(|err| {
            let path = err.path().to_string();
            let path = if path.is_empty() || path == "." {
                "<root>".to_string()
            } else {
                path
            };
            FhirError::Translation(format!(
                "OperationOutcome schema mismatch at {path}: {}",
                err.into_inner()
            ))
        })
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationOutcomeWire {
    #[serde(default = "default_resource_type")]
    resource_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    issue: Vec<Issue>,
}

fn default_resource_type() -> String {
    RESOURCE_TYPE.to_string()
}

impl TryFrom<OperationOutcomeWire> for OperationOutcome {
    type Error = FhirError;

    fn try_from(wire: OperationOutcomeWire) -> Result<Self, Self::Error> {
        if wire.resource_type != RESOURCE_TYPE {
            return Err(FhirError::InvalidInput(format!(
                "expected resourceType {RESOURCE_TYPE}, got {}",
                wire.resource_type
            )));
        }
        let outcome = OperationOutcome::from_issues(wire.issue).ok_or_else(|| {
            FhirError::InvalidInput("OperationOutcome must contain at least one issue".into())
        })?;
        Ok(match wire.id {
            Some(id) => outcome.with_id(id),
            None => outcome,
        })
    }
}

impl From<OperationOutcome> for OperationOutcomeWire {
    fn from(outcome: OperationOutcome) -> Self {
        Self {
            resource_type: default_resource_type(),
            id: outcome.id,
            issue: outcome.issue,
        }
    }
}
