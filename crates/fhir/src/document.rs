//! Document metadata returned by cross-community document queries and retrievals.
//!
//! Every field apart from the three identifiers is best-effort: remote registries omit slots
//! freely, and absence of an optional value must never fail extraction. Optional values are
//! skipped on serialisation rather than written as `null`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A coded value (class code, type code, format code, ...).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    /// Whether no part of the coding was populated.
    pub fn is_empty(&self) -> bool {
        self.system.is_none() && self.code.is_none() && self.display.is_none()
    }
}

/// Metadata describing one document held by a remote community.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentReference {
    pub home_community_id: String,
    pub repository_unique_id: String,
    pub doc_unique_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Size in bytes as reported by the sender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_stop_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_person: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author_institution: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_coding: Option<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_coding: Option<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format_coding: Option<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidentiality_coding: Option<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub practice_setting_coding: Option<Coding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcare_facility_type_coding: Option<Coding>,

    // Retrieval only. Set when the responding repository re-identified the document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_document_unique_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_repository_unique_id: Option<String>,
}
