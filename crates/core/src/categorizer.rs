//! Ordered, first-match error categorization.
//!
//! Free-text issue details from dozens of vendors are bucketed by substring containment against
//! an ordered rule list. The first rule whose needle occurs in the text wins, so a rule whose
//! needle contains another rule's needle must come first (`Request failed with status code 503`
//! before `Request failed with status code`). Anything unmatched lands in the fallback category.

use fhir::Issue;
use ihe::GatewayResponse;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// The built-in error taxonomy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    UnknownPatientId,
    UnknownCommunity,
    MissingHomeCommunityId,
    RegistryNotAvailable,
    RegistryBusy,
    RepositoryError,
    RegistryError,
    TooManyResults,
    AnswerNotAvailable,
    InvalidSecurity,
    TimedOut,
    Timeout,
    ConnectionRefused,
    ConnectionReset,
    SocketHangUp,
    Certificate,
    Http500,
    Http502,
    Http503,
    Http504,
    HttpStatus,
    InternalServerError,
    Other,
}

impl ErrorCategory {
    /// The display label. For every category other than [`ErrorCategory::Other`] this is also
    /// the substring it matches.
    pub fn label(&self) -> &'static str {
        match self {
            Self::UnknownPatientId => "XDSUnknownPatientId",
            Self::UnknownCommunity => "XDSUnknownCommunity",
            Self::MissingHomeCommunityId => "XDSMissingHomeCommunityId",
            Self::RegistryNotAvailable => "XDSRegistryNotAvailable",
            Self::RegistryBusy => "XDSRegistryBusy",
            Self::RepositoryError => "XDSRepositoryError",
            Self::RegistryError => "XDSRegistryError",
            Self::TooManyResults => "Too many results found",
            Self::AnswerNotAvailable => "AnswerNotAvailable",
            Self::InvalidSecurity => "InvalidSecurity",
            Self::TimedOut => "ETIMEDOUT",
            Self::Timeout => "timeout of",
            Self::ConnectionRefused => "ECONNREFUSED",
            Self::ConnectionReset => "ECONNRESET",
            Self::SocketHangUp => "socket hang up",
            Self::Certificate => "certificate",
            Self::Http500 => "Request failed with status code 500",
            Self::Http502 => "Request failed with status code 502",
            Self::Http503 => "Request failed with status code 503",
            Self::Http504 => "Request failed with status code 504",
            Self::HttpStatus => "Request failed with status code",
            Self::InternalServerError => "Internal Server Error",
            Self::Other => "Other",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for ErrorCategory {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Built-in rules, most specific first. Order matters.
pub const CATEGORY_RULES: &[(&str, ErrorCategory)] = &[
    ("XDSUnknownPatientId", ErrorCategory::UnknownPatientId),
    ("XDSUnknownCommunity", ErrorCategory::UnknownCommunity),
    ("XDSMissingHomeCommunityId", ErrorCategory::MissingHomeCommunityId),
    ("XDSRegistryNotAvailable", ErrorCategory::RegistryNotAvailable),
    ("XDSRegistryBusy", ErrorCategory::RegistryBusy),
    ("XDSRepositoryError", ErrorCategory::RepositoryError),
    ("XDSRegistryError", ErrorCategory::RegistryError),
    ("Too many results found", ErrorCategory::TooManyResults),
    ("AnswerNotAvailable", ErrorCategory::AnswerNotAvailable),
    ("InvalidSecurity", ErrorCategory::InvalidSecurity),
    ("ETIMEDOUT", ErrorCategory::TimedOut),
    ("timeout of", ErrorCategory::Timeout),
    ("ECONNREFUSED", ErrorCategory::ConnectionRefused),
    ("ECONNRESET", ErrorCategory::ConnectionReset),
    ("socket hang up", ErrorCategory::SocketHangUp),
    ("certificate", ErrorCategory::Certificate),
    ("Request failed with status code 500", ErrorCategory::Http500),
    ("Request failed with status code 502", ErrorCategory::Http502),
    ("Request failed with status code 503", ErrorCategory::Http503),
    ("Request failed with status code 504", ErrorCategory::Http504),
    ("Request failed with status code", ErrorCategory::HttpStatus),
    ("Internal Server Error", ErrorCategory::InternalServerError),
];

/// Issues grouped by category.
///
/// Categories appear in the order they were first used and issues keep their discovery order
/// within a category. Categories with no issues are absent.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryGroup<C> {
    buckets: Vec<(C, Vec<Issue>)>,
}

impl<C: PartialEq> CategoryGroup<C> {
    fn new() -> Self {
        Self {
            buckets: Vec::new(),
        }
    }

    fn push(&mut self, category: C, issue: Issue) {
        match self.buckets.iter_mut().find(|(c, _)| *c == category) {
            Some((_, issues)) => issues.push(issue),
            None => self.buckets.push((category, vec![issue])),
        }
    }

    /// Issues in a category, or `None` if nothing was classified into it.
    pub fn get(&self, category: &C) -> Option<&[Issue]> {
        self.buckets
            .iter()
            .find(|(c, _)| c == category)
            .map(|(_, issues)| issues.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&C, &[Issue])> {
        self.buckets
            .iter()
            .map(|(category, issues)| (category, issues.as_slice()))
    }

    pub fn categories(&self) -> impl Iterator<Item = &C> {
        self.buckets.iter().map(|(category, _)| category)
    }

    /// Number of non-empty categories.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Total issues across all categories.
    pub fn issue_count(&self) -> usize {
        self.buckets.iter().map(|(_, issues)| issues.len()).sum()
    }
}

impl<C: Serialize> Serialize for CategoryGroup<C> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.buckets.len()))?;
        for (category, issues) in &self.buckets {
            map.serialize_entry(category, issues)?;
        }
        map.end()
    }
}

/// First matching category for a detail text, else the fallback.
pub fn categorize<C: Copy>(rules: &[(&str, C)], fallback: C, text: &str) -> C {
    rules
        .iter()
        .find(|(needle, _)| text.contains(needle))
        .map(|(_, category)| *category)
        .unwrap_or(fallback)
}

/// Classifies every issue from every response with the built-in taxonomy.
pub fn classify<'a, R, I>(responses: I) -> CategoryGroup<ErrorCategory>
where
    R: GatewayResponse + 'a,
    I: IntoIterator<Item = &'a R>,
{
    classify_with(CATEGORY_RULES, ErrorCategory::Other, responses)
}

/// Classifies every issue from every response with a caller-supplied ordered rule list.
///
/// Issues are flattened in response order, then issue order. Responses without an outcome
/// contribute nothing.
pub fn classify_with<'a, C, R, I>(
    rules: &[(&str, C)],
    fallback: C,
    responses: I,
) -> CategoryGroup<C>
where
    C: Copy + PartialEq,
    R: GatewayResponse + 'a,
    I: IntoIterator<Item = &'a R>,
{
    classify_issues_with(
        rules,
        fallback,
        responses
            .into_iter()
            .filter_map(|response| response.operation_outcome())
            .flat_map(|outcome| outcome.issues()),
    )
}

/// Classifies a flat sequence of issues.
pub fn classify_issues_with<'a, C, I>(
    rules: &[(&str, C)],
    fallback: C,
    issues: I,
) -> CategoryGroup<C>
where
    C: Copy + PartialEq,
    I: IntoIterator<Item = &'a Issue>,
{
    let mut group = CategoryGroup::new();
    for issue in issues {
        group.push(categorize(rules, fallback, issue.text()), issue.clone());
    }
    group
}
