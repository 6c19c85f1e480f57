//! ITI-39 Cross Gateway Retrieve reply reader.
//!
//! Status and errors live on `RetrieveDocumentSetResponse/RegistryResponse`; each retrieved
//! document is a `DocumentResponse` sibling. Document bytes are only measured, never kept.

use crate::hl7::parse_dtm;
use crate::xml::XmlElement;
use crate::{IheError, IheResult};
use base64::{engine::general_purpose, Engine as _};
use fhir::DocumentReference;
use hie_types::{strip_brackets, strip_urn_prefix};

pub(crate) const RESPONSE_ELEMENT: &str = "RetrieveDocumentSetResponse";

/// Locates the retrieve response element anywhere under the SOAP envelope.
pub(crate) fn retrieve_response(root: &XmlElement) -> IheResult<&XmlElement> {
    root.find(RESPONSE_ELEMENT)
        .ok_or_else(|| IheError::Schema(format!("reply has no {RESPONSE_ELEMENT} element")))
}

/// The nested `RegistryResponse` carrying status and errors.
pub(crate) fn registry_response(response: &XmlElement) -> IheResult<&XmlElement> {
    response.child("RegistryResponse").ok_or_else(|| {
        IheError::Schema(format!("{RESPONSE_ELEMENT} has no RegistryResponse element"))
    })
}

pub(crate) fn document_responses(response: &XmlElement) -> Vec<&XmlElement> {
    response.children("DocumentResponse").collect()
}

/// Reads one `DocumentResponse`.
///
/// Missing home community and repository ids fall back to the gateway's home community id.
/// Returns `Err("docUniqueId")` when the document has no unique id.
pub(crate) fn document_reference(
    entry: &XmlElement,
    gateway_home_community_id: &str,
) -> Result<DocumentReference, &'static str> {
    let doc_unique_id = child_text(entry, "DocumentUniqueId")
        .map(|id| strip_brackets(strip_urn_prefix(id)))
        .filter(|id| !id.is_empty())
        .ok_or("docUniqueId")?;

    let id_or_gateway = |name: &str| {
        child_text(entry, name)
            .map(strip_urn_prefix)
            .unwrap_or(gateway_home_community_id)
            .to_string()
    };

    Ok(DocumentReference {
        home_community_id: id_or_gateway("HomeCommunityId"),
        repository_unique_id: id_or_gateway("RepositoryUniqueId"),
        doc_unique_id: doc_unique_id.to_string(),
        content_type: child_text(entry, "mimeType").map(str::to_string),
        language: child_text(entry, "language").map(str::to_string),
        size: child_text(entry, "size")
            .and_then(|s| s.parse().ok())
            .or_else(|| entry.child("Document").and_then(inline_document_size)),
        title: child_text(entry, "title").map(str::to_string),
        creation: child_text(entry, "creation").and_then(parse_dtm),
        new_document_unique_id: child_text(entry, "NewDocumentUniqueId")
            .map(|id| strip_brackets(strip_urn_prefix(id)).to_string()),
        new_repository_unique_id: child_text(entry, "NewRepositoryUniqueId")
            .map(|id| strip_urn_prefix(id).to_string()),
        ..Default::default()
    })
}

fn child_text<'a>(element: &'a XmlElement, name: &str) -> Option<&'a str> {
    element.child(name).and_then(XmlElement::text)
}

/// Decoded length of an inline base64 `Document`. MTOM `Include` references have no inline
/// bytes and yield `None`, as does text that is not valid base64.
fn inline_document_size(document: &XmlElement) -> Option<u64> {
    if document.child("Include").is_some() {
        return None;
    }
    let encoded: String = document.text()?.split_whitespace().collect();
    let decoded = general_purpose::STANDARD.decode(encoded).ok()?;
    u64::try_from(decoded.len()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_ids_and_measures_inline_document() {
        // "hello world" base64-encoded, wrapped across lines as some senders do.
        let entry = XmlElement::parse(
            r#"<DocumentResponse>
                 <HomeCommunityId>urn:oid:1.2.3</HomeCommunityId>
                 <RepositoryUniqueId>1.2.3.4</RepositoryUniqueId>
                 <DocumentUniqueId>urn:oid:&lt;5.6.7&gt;</DocumentUniqueId>
                 <NewDocumentUniqueId>[8.9]</NewDocumentUniqueId>
                 <mimeType>text/plain</mimeType>
                 <Document>aGVsbG8g
                   d29ybGQ=</Document>
               </DocumentResponse>"#,
        )
        .expect("fixture");

        let doc = document_reference(&entry, "9.9.9").expect("usable entry");
        assert_eq!(doc.home_community_id, "1.2.3");
        assert_eq!(doc.repository_unique_id, "1.2.3.4");
        assert_eq!(doc.doc_unique_id, "5.6.7");
        assert_eq!(doc.new_document_unique_id.as_deref(), Some("8.9"));
        assert_eq!(doc.content_type.as_deref(), Some("text/plain"));
        assert_eq!(doc.size, Some(11));
    }

    #[test]
    fn falls_back_to_gateway_ids_and_skips_size_for_mtom() {
        let entry = XmlElement::parse(
            r#"<DocumentResponse xmlns:xop="http://www.w3.org/2004/08/xop/include">
                 <DocumentUniqueId>5.6.7</DocumentUniqueId>
                 <Document><xop:Include href="cid:doc1@example.org"/></Document>
               </DocumentResponse>"#,
        )
        .expect("fixture");

        let doc = document_reference(&entry, "9.9.9").expect("usable entry");
        assert_eq!(doc.home_community_id, "9.9.9");
        assert_eq!(doc.repository_unique_id, "9.9.9");
        assert_eq!(doc.size, None);
    }

    #[test]
    fn explicit_size_wins_over_inline_document() {
        let entry = XmlElement::parse(
            "<DocumentResponse><DocumentUniqueId>1</DocumentUniqueId><size>99</size><Document>aGk=</Document></DocumentResponse>",
        )
        .expect("fixture");
        assert_eq!(document_reference(&entry, "9").expect("entry").size, Some(99));
    }

    #[test]
    fn missing_unique_id_is_unusable() {
        let entry = XmlElement::parse("<DocumentResponse><mimeType>text/xml</mimeType></DocumentResponse>")
            .expect("fixture");
        assert_eq!(
            document_reference(&entry, "9.9.9").expect_err("no id"),
            "docUniqueId"
        );
    }

    #[test]
    fn registry_response_is_required() {
        let response = XmlElement::parse("<RetrieveDocumentSetResponse/>").expect("fixture");
        let err = registry_response(&response).expect_err("missing registry response");
        match err {
            IheError::Schema(msg) => assert!(msg.contains("RegistryResponse")),
            other => panic!("expected Schema error, got {other:?}"),
        }
    }
}
