//! ITI-38 Cross Gateway Query reply reader.
//!
//! Reads `AdhocQueryResponse/RegistryObjectList/ExtrinsicObject` entries into
//! [`DocumentReference`]s. Field lookups go through the well-known XDS DocumentEntry slot names
//! and classification/identification scheme ids below.

use crate::hl7::parse_dtm;
use crate::xml::XmlElement;
use crate::{IheError, IheResult};
use fhir::{Coding, DocumentReference};
use hie_types::strip_urn_prefix;

pub(crate) const RESPONSE_ELEMENT: &str = "AdhocQueryResponse";

// XDS DocumentEntry scheme ids.
const UNIQUE_ID_SCHEME: &str = "urn:uuid:2e82c1f6-a085-4c72-9da3-8640a32e42ab";
const CLASS_CODE_SCHEME: &str = "urn:uuid:41a5887f-8865-4c09-adf7-e362475b143a";
const TYPE_CODE_SCHEME: &str = "urn:uuid:f0306f51-975f-434e-a61c-c59651d33983";
const FORMAT_CODE_SCHEME: &str = "urn:uuid:a09d5840-386c-46f2-b5ad-9c3699a4309d";
const CONFIDENTIALITY_CODE_SCHEME: &str = "urn:uuid:f4f85eac-e6cb-4883-b524-f2705394840f";
const PRACTICE_SETTING_CODE_SCHEME: &str = "urn:uuid:cccf5598-8b07-4b77-a05e-ae952c785ead";
const FACILITY_TYPE_CODE_SCHEME: &str = "urn:uuid:f33fb8ac-18af-42cc-ae0e-ed0b0bdb91e1";
const AUTHOR_SCHEME: &str = "urn:uuid:93606bcf-9494-43ec-9b4e-a7748d1a838d";

const LOINC_OID: &str = "2.16.840.1.113883.6.1";
const SNOMED_OID: &str = "2.16.840.1.113883.6.96";
const CONFIDENTIALITY_OID: &str = "2.16.840.1.113883.5.25";
const FORMAT_CODE_OID: &str = "1.3.6.1.4.1.19376.1.2.3";

/// Coding system URI for a classification scheme, where one is known.
fn code_system_for_scheme(scheme: &str) -> Option<String> {
    let oid = match scheme {
        CLASS_CODE_SCHEME | TYPE_CODE_SCHEME => LOINC_OID,
        FORMAT_CODE_SCHEME => FORMAT_CODE_OID,
        CONFIDENTIALITY_CODE_SCHEME => CONFIDENTIALITY_OID,
        PRACTICE_SETTING_CODE_SCHEME | FACILITY_TYPE_CODE_SCHEME => SNOMED_OID,
        _ => return None,
    };
    Some(match oid {
        LOINC_OID => "http://loinc.org".to_string(),
        SNOMED_OID => "http://snomed.info/sct".to_string(),
        other => format!("urn:oid:{other}"),
    })
}

/// Locates the query response element anywhere under the SOAP envelope.
pub(crate) fn query_response(root: &XmlElement) -> IheResult<&XmlElement> {
    root.find(RESPONSE_ELEMENT)
        .ok_or_else(|| IheError::Schema(format!("reply has no {RESPONSE_ELEMENT} element")))
}

/// All `ExtrinsicObject` entries; empty when there is no `RegistryObjectList`.
pub(crate) fn extrinsic_objects(response: &XmlElement) -> Vec<&XmlElement> {
    response
        .child("RegistryObjectList")
        .map(|list| list.children("ExtrinsicObject").collect())
        .unwrap_or_default()
}

/// Defaults applied while reading one entry.
pub(crate) struct EntryDefaults<'a> {
    /// Used when the entry has no `home` attribute.
    pub(crate) home_community_id: &'a str,
    /// Use the home community id when there is no `repositoryUniqueId` slot.
    pub(crate) repository_id_fallback: bool,
}

/// Reads one `ExtrinsicObject`.
///
/// Returns `Err` naming the missing field when the entry cannot be used to retrieve a document
/// later (no unique id, or no repository id with fallback disabled). Every other field is
/// best-effort.
pub(crate) fn document_reference(
    entry: &XmlElement,
    defaults: &EntryDefaults<'_>,
) -> Result<DocumentReference, &'static str> {
    let doc_unique_id = external_identifier(entry, UNIQUE_ID_SCHEME)
        .map(strip_urn_prefix)
        .filter(|id| !id.is_empty())
        .ok_or("docUniqueId")?;

    let home_community_id = entry
        .attr_non_empty("home")
        .map(strip_urn_prefix)
        .unwrap_or(defaults.home_community_id)
        .to_string();

    let repository_unique_id = match slot_value(entry, "repositoryUniqueId") {
        Some(id) => strip_urn_prefix(id).to_string(),
        None if defaults.repository_id_fallback => home_community_id.clone(),
        None => return Err("repositoryUniqueId"),
    };

    let creation_time = slot_value(entry, "creationTime");
    let service_start = slot_value(entry, "serviceStartTime");
    let service_stop = slot_value(entry, "serviceStopTime");

    Ok(DocumentReference {
        home_community_id,
        repository_unique_id,
        doc_unique_id: doc_unique_id.to_string(),
        content_type: entry.attr_non_empty("mimeType").map(str::to_string),
        language: slot_value(entry, "languageCode").map(str::to_string),
        size: slot_value(entry, "size").and_then(|s| s.parse().ok()),
        title: classification(entry, CLASS_CODE_SCHEME)
            .and_then(localized_name)
            .map(str::to_string),
        creation: creation_time
            .or(service_start)
            .or(service_stop)
            .and_then(parse_dtm),
        service_start_time: service_start.and_then(parse_dtm),
        service_stop_time: service_stop.and_then(parse_dtm),
        author_person: classification(entry, AUTHOR_SCHEME)
            .and_then(|c| slot_value(c, "authorPerson"))
            .map(str::to_string),
        author_institution: classification(entry, AUTHOR_SCHEME)
            .and_then(|c| slot_value(c, "authorInstitution"))
            .map(str::to_string),
        class_coding: coding(entry, CLASS_CODE_SCHEME),
        type_coding: coding(entry, TYPE_CODE_SCHEME),
        format_coding: coding(entry, FORMAT_CODE_SCHEME),
        confidentiality_coding: coding(entry, CONFIDENTIALITY_CODE_SCHEME),
        practice_setting_coding: coding(entry, PRACTICE_SETTING_CODE_SCHEME),
        healthcare_facility_type_coding: coding(entry, FACILITY_TYPE_CODE_SCHEME),
        new_document_unique_id: None,
        new_repository_unique_id: None,
    })
}

// ============================================================================
// ebXML accessors
// ============================================================================

fn same_scheme(a: &str, b: &str) -> bool {
    strip_urn_prefix(a).eq_ignore_ascii_case(strip_urn_prefix(b))
}

/// First `Slot[@name]/ValueList/Value` text.
fn slot_value<'a>(element: &'a XmlElement, name: &str) -> Option<&'a str> {
    element
        .children("Slot")
        .find(|slot| slot.attr("name") == Some(name))?
        .child("ValueList")?
        .children("Value")
        .find_map(XmlElement::text)
}

fn external_identifier<'a>(element: &'a XmlElement, scheme: &str) -> Option<&'a str> {
    element
        .children("ExternalIdentifier")
        .find(|id| {
            id.attr("identificationScheme")
                .is_some_and(|s| same_scheme(s, scheme))
        })?
        .attr_non_empty("value")
}

fn classification<'a>(element: &'a XmlElement, scheme: &str) -> Option<&'a XmlElement> {
    element.children("Classification").find(|c| {
        c.attr("classificationScheme")
            .is_some_and(|s| same_scheme(s, scheme))
    })
}

/// `Name/LocalizedString@value`.
fn localized_name(element: &XmlElement) -> Option<&str> {
    element
        .path(&["Name", "LocalizedString"])?
        .attr_non_empty("value")
}

fn coding(entry: &XmlElement, scheme: &str) -> Option<Coding> {
    let classification = classification(entry, scheme)?;
    let code = classification.attr_non_empty("nodeRepresentation");
    let display = localized_name(classification);
    if code.is_none() && display.is_none() {
        return None;
    }
    Some(Coding {
        system: code_system_for_scheme(scheme),
        code: code.map(str::to_string),
        display: display.map(str::to_string),
    })
}
